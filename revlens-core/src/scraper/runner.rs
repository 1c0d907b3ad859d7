use async_trait::async_trait;
use chrono::Local;
use tracing::{info, warn};

use crate::browser::{
    BrowserAutomation, BrowserError, BrowserResult, CdpDriver, PageDriver,
};
use crate::config::WebTarget;
use crate::trace::Tracer;

use super::actions::PageActions;
use super::providers::run_pipeline;
use super::review::{filter_reviews, Review};

/// Opens a fresh page for a target. The indirection keeps the runner
/// testable against a scripted driver.
#[async_trait(?Send)]
pub trait DriverFactory {
    async fn create(&self, target: &WebTarget) -> BrowserResult<Box<dyn PageDriver>>;
}

pub struct CdpDriverFactory<'a> {
    automation: &'a BrowserAutomation,
}

impl<'a> CdpDriverFactory<'a> {
    pub fn new(automation: &'a BrowserAutomation) -> Self {
        Self { automation }
    }
}

#[async_trait(?Send)]
impl DriverFactory for CdpDriverFactory<'_> {
    async fn create(&self, _target: &WebTarget) -> BrowserResult<Box<dyn PageDriver>> {
        let context = self.automation.new_context().await?;
        Ok(Box::new(CdpDriver::new(context)))
    }
}

/// Scrapes every active target in configuration order. One target must
/// fully complete (success or caught failure) before the next starts, so
/// the trace interleaving across targets stays deterministic. A failing
/// target contributes no reviews and never aborts the run.
pub async fn scrape_targets(
    tracer: &Tracer,
    loop_tracer: &Tracer,
    drivers: &dyn DriverFactory,
    targets: &[WebTarget],
) -> Vec<Review> {
    let mut reviews = Vec::new();
    for target in targets {
        if !target.activate {
            continue;
        }
        reviews.extend(scrape_target(tracer, loop_tracer, drivers, target).await);
    }
    reviews
}

async fn scrape_target(
    tracer: &Tracer,
    loop_tracer: &Tracer,
    drivers: &dyn DriverFactory,
    target: &WebTarget,
) -> Vec<Review> {
    let start = Local::now();
    tracer.note(&format!("######## Start {} ########", target.title));
    tracer.note(&format!("Starting at: {}", start.format("%Y-%m-%d %H:%M:%S")));
    tracer.note("");

    match run_target(tracer, loop_tracer, drivers, target).await {
        Ok(kept) => {
            let finish = Local::now();
            tracer.note("");
            tracer.note(&format!("Finished at: {}", finish.format("%Y-%m-%d %H:%M:%S")));
            tracer.note(&format!(
                "Duration: {} seconds",
                (finish - start).num_seconds()
            ));
            tracer.note(&format!("######## Finish {} ########", target.title));
            tracer.note("");
            info!(site = %target.title, reviews = kept.len(), "target scraped");
            kept
        }
        Err(err) => {
            report_failure(tracer, target, &err);
            Vec::new()
        }
    }
}

async fn run_target(
    tracer: &Tracer,
    loop_tracer: &Tracer,
    drivers: &dyn DriverFactory,
    target: &WebTarget,
) -> BrowserResult<Vec<Review>> {
    let driver = drivers.create(target).await?;
    let actions = PageActions::new(
        driver.as_ref(),
        tracer.clone(),
        target.timeout(),
        target.max_scroll_iterations,
    );
    let loop_actions = actions.with_tracer(loop_tracer.clone());
    let raw = run_pipeline(target, &actions, &loop_actions).await?;
    Ok(filter_reviews(raw, &target.ignore_reviews))
}

fn report_failure(tracer: &Tracer, target: &WebTarget, err: &BrowserError) {
    let provider = target.provider();
    match err {
        BrowserError::ElementNotFound { html, .. } => {
            tracer.note(&format!(
                "There was an error scraping the {provider} provider: {err} and the content of the page is this:"
            ));
            tracer.note(html);
        }
        _ => {
            tracer.note(&format!(
                "There was an error scraping the {provider} provider: {err}"
            ));
        }
    }
    warn!(site = %target.title, %provider, error = %err, "target scrape failed");
}
