//! The maps-site pipeline: reject cookies, open the reviews section, sort
//! by newest, scroll until the oldest known review is loaded, infer the
//! review locators from the known sample, then extract every review.

use futures::FutureExt;

use crate::browser::{BrowserResult, Locator, Scope};
use crate::config::{GoogleKnownTexts, GoogleTarget, WebTarget};

use super::super::actions::PageActions;
use super::super::extract::{
    extract_reviews, AuthorSource, ExtractionPlan, RatingSource,
};
use super::super::infer::{infer_selectors, InferredSelectors};
use super::super::review::Review;
use super::Provider;

pub(super) async fn scrape(
    actions: &PageActions<'_>,
    loop_actions: &PageActions<'_>,
    target: &WebTarget,
    site: &GoogleTarget,
) -> BrowserResult<Vec<Review>> {
    let texts = &site.known.texts;

    actions.navigate(&target.url).await?;
    reject_cookies(actions, texts).await?;
    go_to_reviews_tab(actions, texts).await?;
    sort_by_newest(actions, texts).await?;
    load_all_reviews(actions, &site.known.oldest_review_author_name).await?;
    let selectors = infer_selectors(actions, &site.known.review).await?;

    let description = format!(
        "get the reviews data with {}translated content",
        if site.translated_content { "" } else { "un" }
    );
    let plan = extraction_plan(&selectors, site);
    extract_reviews(actions, loop_actions, &description, &plan).await
}

async fn reject_cookies(
    actions: &PageActions<'_>,
    texts: &GoogleKnownTexts,
) -> BrowserResult<()> {
    actions
        .tracer()
        .trace("to reject cookies", async {
            let button = actions
                .find_one_or_fail(
                    "to get the reject cookies button",
                    Scope::Page,
                    &Locator::text("button", texts.reject_cookies_button_text.as_str()),
                )
                .await?;
            actions.click("to reject cookies", button).await?;
            actions.wait_for_network_idle().await
        })
        .await
}

async fn go_to_reviews_tab(
    actions: &PageActions<'_>,
    texts: &GoogleKnownTexts,
) -> BrowserResult<()> {
    actions
        .tracer()
        .trace("Find the reviews tab", async {
            let tab = actions
                .find_one_or_fail(
                    "to find the reviews tab",
                    Scope::Page,
                    &Locator::text("button", texts.reviews_section_button_text.as_str()),
                )
                .await?;
            actions.click("to click on reviews tab", tab).await?;
            actions.wait_for_network_idle().await
        })
        .await
}

async fn sort_by_newest(
    actions: &PageActions<'_>,
    texts: &GoogleKnownTexts,
) -> BrowserResult<()> {
    actions
        .tracer()
        .trace("Sort by newest", async {
            let sorting = actions
                .find_one_or_fail(
                    "to find the sorting options button",
                    Scope::Page,
                    &Locator::text("button", texts.sorting_button_text.as_str()),
                )
                .await?;
            actions
                .click("to open the sorting options menu", sorting)
                .await?;
            actions.wait_for_network_idle().await?;

            let newest = actions
                .find_one_or_fail(
                    "to find the order by newest option",
                    Scope::Page,
                    &Locator::text("", texts.by_newest_option_button_text.as_str()),
                )
                .await?;
            actions
                .click("to select the order by newest option", newest)
                .await?;
            actions.wait_for_network_idle().await
        })
        .await
}

async fn load_all_reviews(
    actions: &PageActions<'_>,
    oldest_review_author_name: &str,
) -> BrowserResult<()> {
    actions
        .tracer()
        .trace("Load all the reviews", async {
            actions
                .tracer()
                .trace("Scroll down until all the reviews are loaded", async {
                    actions
                        .press_key("to focus on reviews list", "Tab")
                        .await?;
                    let anchor = Locator::text("", oldest_review_author_name);
                    let anchor = &anchor;
                    actions
                        .scroll_until("the oldest known review to be loaded", || {
                            async move {
                                Ok(actions
                                    .find_one(
                                        "to check if have arrived to the last review",
                                        Scope::Page,
                                        anchor,
                                    )
                                    .await?
                                    .is_some())
                            }
                            .boxed_local()
                        })
                        .await
                })
                .await
        })
        .await
}

fn extraction_plan(selectors: &InferredSelectors, site: &GoogleTarget) -> ExtractionPlan {
    let texts = &site.known.texts;
    ExtractionPlan {
        provider: Provider::Google,
        review_locator: Locator::css(selectors.review.as_str()),
        author_locator: Locator::css(selectors.author_name.as_str()),
        content_locator: Locator::css(selectors.content.as_str()),
        rating_locator: Locator::css(format!("[aria-label~=\"{}\"]", texts.stars)),
        rating: RatingSource::AttributeDigits("aria-label".to_string()),
        author: AuthorSource::TitleCasedInnerText,
        trim_content: false,
        view_more_text: Some(texts.view_more_button_text.clone()),
        view_untranslated_text: (!site.translated_content)
            .then(|| texts.view_untranslated_content_button_text.clone()),
    }
}
