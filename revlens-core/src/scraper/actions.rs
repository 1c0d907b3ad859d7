use std::time::Duration;

use futures::future::LocalBoxFuture;

use crate::browser::{BrowserError, BrowserResult, Locator, NodeId, PageDriver, Scope};
use crate::trace::Tracer;

/// Tracing-wrapped page action primitives. Every interaction delegates to
/// the driver and records a start/finish/error entry whose description
/// embeds the locator and a caller-supplied reason, so the trace reads as a
/// narrative of what was attempted and why.
pub struct PageActions<'d> {
    driver: &'d dyn PageDriver,
    tracer: Tracer,
    timeout: Duration,
    max_scroll_iterations: usize,
}

impl<'d> PageActions<'d> {
    pub fn new(
        driver: &'d dyn PageDriver,
        tracer: Tracer,
        timeout: Duration,
        max_scroll_iterations: usize,
    ) -> Self {
        Self {
            driver,
            tracer,
            timeout,
            max_scroll_iterations,
        }
    }

    /// The same driver under a different tracer. Used to run the
    /// per-element loop with error-only wording while sharing the page.
    pub fn with_tracer(&self, tracer: Tracer) -> PageActions<'d> {
        PageActions {
            driver: self.driver,
            tracer,
            timeout: self.timeout,
            max_scroll_iterations: self.max_scroll_iterations,
        }
    }

    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    pub fn driver(&self) -> &dyn PageDriver {
        self.driver
    }

    pub async fn navigate(&self, url: &str) -> BrowserResult<()> {
        self.tracer
            .trace(format!("Navigate to {url}"), self.driver.navigate(url))
            .await
    }

    /// Recoverable absence: a missing element yields `None` and the caller
    /// decides what happens next.
    pub async fn find_one(
        &self,
        reason: &str,
        scope: Scope,
        locator: &Locator,
    ) -> BrowserResult<Option<NodeId>> {
        self.tracer
            .trace(
                format!("Find one element with locator {locator} {reason}"),
                self.driver.find_one(scope, locator),
            )
            .await
    }

    /// Fatal absence: a missing element aborts the pipeline with a snapshot
    /// of the rendered markup attached for post-mortem diagnosis.
    pub async fn find_one_or_fail(
        &self,
        reason: &str,
        scope: Scope,
        locator: &Locator,
    ) -> BrowserResult<NodeId> {
        self.tracer
            .trace(
                format!("Find or fail one element with locator {locator} {reason}"),
                async {
                    match self.driver.find_one(scope, locator).await? {
                        Some(node) => Ok(node),
                        None => {
                            let html = match scope {
                                Scope::Page => self.driver.page_content().await?,
                                Scope::Node(node) => self.driver.outer_html(node).await?,
                            };
                            Err(BrowserError::ElementNotFound {
                                locator: locator.to_string(),
                                html,
                            })
                        }
                    }
                },
            )
            .await
    }

    pub async fn find_all(
        &self,
        reason: &str,
        scope: Scope,
        locator: &Locator,
    ) -> BrowserResult<Vec<NodeId>> {
        self.tracer
            .trace(
                format!("Find all elements with locator {locator} {reason}"),
                self.driver.find_all(scope, locator),
            )
            .await
    }

    pub async fn click(&self, reason: &str, node: NodeId) -> BrowserResult<()> {
        self.tracer
            .trace(
                format!("Click on element previously found {reason}"),
                self.driver.click(node),
            )
            .await
    }

    pub async fn click_if_present(
        &self,
        reason: &str,
        node: Option<NodeId>,
    ) -> BrowserResult<()> {
        self.tracer
            .trace(
                format!("Click on element previously found if is present {reason}"),
                async {
                    match node {
                        Some(node) => self.driver.click(node).await,
                        None => Ok(()),
                    }
                },
            )
            .await
    }

    pub async fn press_key(&self, reason: &str, key: &str) -> BrowserResult<()> {
        self.tracer
            .trace(
                format!("Press the {key} key {reason}"),
                self.driver.press_key(key),
            )
            .await
    }

    pub async fn wait_for_network_idle(&self) -> BrowserResult<()> {
        self.driver.wait_for_network_idle(self.timeout).await
    }

    /// Scroll until the predicate over the page state holds: press the
    /// move-to-end key, wait for the network to settle, check, repeat. The
    /// iteration budget guards against a predicate that can never become
    /// true (content gone after a redesign); exhausting it is a typed
    /// failure, not a hang.
    pub async fn scroll_until<'p, F>(&self, condition: &str, predicate: F) -> BrowserResult<()>
    where
        F: Fn() -> LocalBoxFuture<'p, BrowserResult<bool>>,
    {
        for step in 1..=self.max_scroll_iterations {
            self.tracer
                .trace(format!("to do scroll step number {step}"), async {
                    self.press_key("to go at the end of the content", "End")
                        .await?;
                    self.wait_for_network_idle().await
                })
                .await?;
            if predicate().await? {
                return Ok(());
            }
        }
        Err(BrowserError::ConvergenceTimeout {
            iterations: self.max_scroll_iterations,
            condition: condition.to_string(),
        })
    }
}
