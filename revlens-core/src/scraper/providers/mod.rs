use std::fmt;

use crate::browser::BrowserResult;
use crate::config::{SiteTarget, WebTarget};

use super::actions::PageActions;
use super::review::Review;

mod google;
mod marketplace;

/// Supported review providers. Adding a variant forces every dispatch site
/// to handle it; the config layer rejects unknown tags before any browser
/// interaction starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Google,
    Marketplace,
}

impl Provider {
    pub fn tag(&self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::Marketplace => "marketplace",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Runs the target's provider-specific navigation pipeline on the current
/// page. Transitions are strictly sequential and fail-fast: any failing
/// step aborts the whole pipeline for this target.
pub async fn run_pipeline(
    target: &WebTarget,
    actions: &PageActions<'_>,
    loop_actions: &PageActions<'_>,
) -> BrowserResult<Vec<Review>> {
    match &target.site {
        SiteTarget::Google(site) => google::scrape(actions, loop_actions, target, site).await,
        SiteTarget::Marketplace(site) => {
            marketplace::scrape(actions, loop_actions, target, site).await
        }
    }
}
