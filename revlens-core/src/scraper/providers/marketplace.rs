//! The marketplace-site pipeline. Storefront pages lazy-load reviews while
//! scrolling, so convergence is a simple scroll-to-footer; the markup uses
//! stable, human-named classes, so the locators are fixed instead of
//! inferred.

use futures::FutureExt;

use crate::browser::{BrowserResult, Locator, Scope};
use crate::config::{MarketplaceTarget, WebTarget};

use super::super::actions::PageActions;
use super::super::extract::{
    extract_reviews, AuthorSource, ExtractionPlan, RatingSource,
};
use super::super::review::Review;
use super::Provider;

const REVIEW_SELECTOR: &str = ".storefrontReviewsTileSubpage";
const AUTHOR_NAME_SELECTOR: &str = ".storefrontReviewsTileInfo";
const RATING_SELECTOR: &str = ".rating__count";
const CONTENT_SELECTOR: &str = ".app-full-description";

pub(super) async fn scrape(
    actions: &PageActions<'_>,
    loop_actions: &PageActions<'_>,
    target: &WebTarget,
    _site: &MarketplaceTarget,
) -> BrowserResult<Vec<Review>> {
    actions.navigate(&target.url).await?;
    load_all_reviews(actions).await?;
    extract_reviews(actions, loop_actions, "get the reviews data", &extraction_plan()).await
}

async fn load_all_reviews(actions: &PageActions<'_>) -> BrowserResult<()> {
    actions
        .tracer()
        .trace("Load all the reviews", async {
            let footer = Locator::css("footer");
            let footer = &footer;
            actions
                .scroll_until("the page footer to be reached", || {
                    async move {
                        Ok(actions
                            .find_one(
                                "to see if we arrived to the bottom of the page",
                                Scope::Page,
                                footer,
                            )
                            .await?
                            .is_some())
                    }
                    .boxed_local()
                })
                .await
        })
        .await
}

fn extraction_plan() -> ExtractionPlan {
    ExtractionPlan {
        provider: Provider::Marketplace,
        review_locator: Locator::css(REVIEW_SELECTOR),
        author_locator: Locator::css(AUTHOR_NAME_SELECTOR),
        content_locator: Locator::css(CONTENT_SELECTOR),
        rating_locator: Locator::css(RATING_SELECTOR),
        rating: RatingSource::TextNumber,
        author: AuthorSource::FirstChildText,
        trim_content: true,
        view_more_text: None,
        view_untranslated_text: None,
    }
}
