pub mod actions;
pub mod extract;
pub mod infer;
pub mod providers;
pub mod review;
pub mod runner;

pub use actions::PageActions;
pub use extract::{AuthorSource, ExtractionPlan, RatingSource};
pub use infer::{infer_selectors, InferredSelectors};
pub use providers::{run_pipeline, Provider};
pub use review::{filter_reviews, IgnoreRules, Review};
pub use runner::{scrape_targets, CdpDriverFactory, DriverFactory};
