pub mod browser;
pub mod config;
pub mod error;
pub mod scraper;
pub mod trace;

pub use config::{
    load_config, BrowserSection, GoogleKnown, GoogleKnownTexts, GoogleTarget, KnownSample,
    MarketplaceTarget, RevlensConfig, SiteTarget, WebTarget,
};
pub use error::{ConfigError, Result};
pub use scraper::{
    filter_reviews, scrape_targets, CdpDriverFactory, DriverFactory, IgnoreRules, Provider, Review,
};
pub use trace::{
    standard_format, EchoFormatter, EntryFormatter, ErrorOnlyFormatter, StandardFormatter,
    TraceLog, Tracer,
};
