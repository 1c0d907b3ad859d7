use thiserror::Error;

pub type BrowserResult<T> = Result<T, BrowserError>;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("chromium launch failed: {0}")]
    Launch(String),
    #[error("cdp error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("timeout waiting for {0}")]
    Timeout(String),
    /// Fatal absence of an element the pipeline cannot continue without.
    /// Carries a snapshot of the rendered markup so the failure is
    /// diagnosable without re-running the browser.
    #[error("the element was expected to be found with locator {locator}")]
    ElementNotFound { locator: String, html: String },
    #[error("selector inference failed: {0}")]
    SelectorInference(String),
    /// The scroll-until-stable loop exhausted its iteration budget without
    /// the stop condition holding.
    #[error("gave up waiting for {condition} after {iterations} scroll steps")]
    ConvergenceTimeout { iterations: usize, condition: String },
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("script evaluation failed: {0}")]
    Evaluate(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl From<tokio::task::JoinError> for BrowserError {
    fn from(err: tokio::task::JoinError) -> Self {
        BrowserError::Unexpected(err.to_string())
    }
}
