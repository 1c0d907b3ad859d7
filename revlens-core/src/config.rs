use std::path::Path;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{ConfigError, Result};
use crate::scraper::providers::Provider;
use crate::scraper::review::IgnoreRules;

#[derive(Debug, Clone, Deserialize)]
pub struct RevlensConfig {
    #[serde(default)]
    pub browser: BrowserSection,
    #[serde(default)]
    pub webs: Vec<WebTarget>,
}

impl RevlensConfig {
    pub fn active_targets(&self) -> impl Iterator<Item = &WebTarget> {
        self.webs.iter().filter(|target| target.activate)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserSection {
    pub browser_language: String,
    pub headless: bool,
    pub sandbox: bool,
    pub disable_setuid_sandbox: bool,
    pub dumpio: bool,
    pub executable_path: Option<String>,
    pub timeout_ms: u64,
}

impl Default for BrowserSection {
    fn default() -> Self {
        Self {
            browser_language: "en-US".to_string(),
            headless: true,
            sandbox: true,
            disable_setuid_sandbox: false,
            dumpio: true,
            executable_path: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

/// One configured site to scrape. Immutable once parsed.
#[derive(Debug, Clone, Deserialize)]
pub struct WebTarget {
    pub title: String,
    #[serde(default = "default_true")]
    pub activate: bool,
    pub url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_scroll_iterations")]
    pub max_scroll_iterations: usize,
    #[serde(default)]
    pub ignore_reviews: IgnoreRules,
    #[serde(flatten)]
    pub site: SiteTarget,
}

impl WebTarget {
    pub fn provider(&self) -> Provider {
        match &self.site {
            SiteTarget::Google(_) => Provider::Google,
            SiteTarget::Marketplace(_) => Provider::Marketplace,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Provider-specific target configuration. The `provider` tag selects the
/// variant during deserialization, so an unknown provider is rejected at
/// config load, before any browser interaction begins.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum SiteTarget {
    Google(GoogleTarget),
    Marketplace(MarketplaceTarget),
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleTarget {
    pub known: GoogleKnown,
    #[serde(default)]
    pub translated_content: bool,
}

/// Verified texts taken from the live page. Selector inference and the
/// full-load check stop working when these drift out of sync with the site.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleKnown {
    pub review: KnownSample,
    pub texts: GoogleKnownTexts,
    pub oldest_review_author_name: String,
}

/// One real review's exact author and content, used only to bootstrap
/// selector inference. Never persisted as output.
#[derive(Debug, Clone, Deserialize)]
pub struct KnownSample {
    pub author_name: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleKnownTexts {
    pub reject_cookies_button_text: String,
    pub view_more_button_text: String,
    pub view_untranslated_content_button_text: String,
    pub reviews_section_button_text: String,
    pub sorting_button_text: String,
    pub by_newest_option_button_text: String,
    pub stars: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MarketplaceTarget {}

const DEFAULT_TIMEOUT_MS: u64 = 30_000;

fn default_true() -> bool {
    true
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_max_scroll_iterations() -> usize {
    50
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<RevlensConfig> {
    let path = path.as_ref();
    let config: RevlensConfig = load_toml(path)?;
    for target in &config.webs {
        if let Err(err) = url::Url::parse(&target.url) {
            return Err(ConfigError::Invalid {
                path: path.to_path_buf(),
                message: format!("target \"{}\" has an invalid url: {err}", target.title),
            });
        }
    }
    Ok(config)
}

fn load_toml<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}
