mod automation;
mod driver;
mod error;

pub use automation::{BrowserAutomation, BrowserContext, BrowserLauncher};
pub use driver::{CdpDriver, ElementShape, Locator, NodeId, PageDriver, Scope};
pub use error::{BrowserError, BrowserResult};
