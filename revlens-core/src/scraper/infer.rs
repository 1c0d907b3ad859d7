use crate::browser::{BrowserError, BrowserResult, Locator, Scope};
use crate::config::KnownSample;

use super::actions::PageActions;

/// Locators derived from a known sample review, valid for the remainder of
/// the current page load. Providers emit auto-generated class names that
/// are stable within one render but not across renders, so these are
/// recomputed on every fresh navigation and never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferredSelectors {
    pub review: String,
    pub author_name: String,
    pub content: String,
}

/// Derives the per-page locators from the sample's exact author and content
/// text: the smallest element whose visible text matches yields the field
/// locators, and the element carrying the author's aria-label yields the
/// review container. Requires the sample to still be present and correctly
/// worded in configuration.
pub async fn infer_selectors(
    actions: &PageActions<'_>,
    known: &KnownSample,
) -> BrowserResult<InferredSelectors> {
    let content = first_class_selector(
        actions,
        "to get the class to get the content",
        Locator::text("", known.content.as_str()),
    )
    .await?;
    let author_name = first_class_selector(
        actions,
        "to get the class to get the author name",
        Locator::text("", known.author_name.as_str()),
    )
    .await?;
    let review = first_class_selector(
        actions,
        "to get the class to find each review",
        Locator::css(format!("[aria-label=\"{}\"]", known.author_name)),
    )
    .await?;

    Ok(InferredSelectors {
        review,
        author_name,
        content,
    })
}

async fn first_class_selector(
    actions: &PageActions<'_>,
    reason: &str,
    locator: Locator,
) -> BrowserResult<String> {
    actions
        .tracer()
        .trace(
            format!("Get the first class name of the element with locator {locator} {reason}"),
            async {
                let found = actions.driver().find_one(Scope::Page, &locator).await?;
                let node = found.ok_or_else(|| {
                    BrowserError::SelectorInference(format!(
                        "the element with locator {locator} was not found"
                    ))
                })?;
                let shape = actions.driver().describe(node).await?;
                Ok(shape.selector())
            },
        )
        .await
}
