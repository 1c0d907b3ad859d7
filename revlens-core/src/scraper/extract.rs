use std::sync::OnceLock;

use futures::future::join_all;
use regex::Regex;

use crate::browser::{BrowserResult, Locator, NodeId, Scope};

use super::actions::PageActions;
use super::providers::Provider;
use super::review::Review;

/// Where a review's rating is read from.
#[derive(Debug, Clone)]
pub enum RatingSource {
    /// Digits-only extraction of an attribute value, e.g. an accessibility
    /// label like "5 stars".
    AttributeDigits(String),
    /// The element's text parsed as a number and rounded, e.g. "4.8".
    TextNumber,
}

/// How a review's author name is read.
#[derive(Debug, Clone, Copy)]
pub enum AuthorSource {
    /// Inner text, lower-cased then title-cased per word.
    TitleCasedInnerText,
    /// The element's first child text node, trimmed.
    FirstChildText,
}

/// Everything the generic extractor needs to pull reviews out of the
/// current page: the per-page locators plus provider-specific field
/// handling.
#[derive(Debug, Clone)]
pub struct ExtractionPlan {
    pub provider: Provider,
    pub review_locator: Locator,
    pub author_locator: Locator,
    pub content_locator: Locator,
    pub rating_locator: Locator,
    pub rating: RatingSource,
    pub author: AuthorSource,
    pub trim_content: bool,
    /// Text of the control expanding truncated content, clicked when
    /// present before reading the content element.
    pub view_more_text: Option<String>,
    /// Text of the control switching back to the untranslated content,
    /// clicked when present.
    pub view_untranslated_text: Option<String>,
}

/// Extracts a review from every located container. The fan-out over
/// elements is the one place of true concurrency in a run; the in-loop
/// tracer is expected to be error-only, so interleaving stays harmless.
/// Any element failing fatally aborts the whole extraction.
pub async fn extract_reviews(
    actions: &PageActions<'_>,
    loop_actions: &PageActions<'_>,
    description: &str,
    plan: &ExtractionPlan,
) -> BrowserResult<Vec<Review>> {
    actions
        .tracer()
        .trace(description, async {
            let containers = actions
                .find_all(
                    "to find all the reviews elements",
                    Scope::Page,
                    &plan.review_locator,
                )
                .await?;
            let extracted = join_all(
                containers
                    .into_iter()
                    .map(|node| extract_one(loop_actions, plan, node)),
            )
            .await;
            extracted.into_iter().collect::<BrowserResult<Vec<_>>>()
        })
        .await
}

async fn extract_one(
    actions: &PageActions<'_>,
    plan: &ExtractionPlan,
    node: NodeId,
) -> BrowserResult<Review> {
    let rating = extract_rating(actions, plan, node).await?;
    let author_name = extract_author(actions, plan, node).await?;
    let content = extract_content(actions, plan, node).await?;
    Ok(Review {
        provider: plan.provider.tag().to_string(),
        author_name,
        rating,
        content,
    })
}

async fn extract_rating(
    actions: &PageActions<'_>,
    plan: &ExtractionPlan,
    node: NodeId,
) -> BrowserResult<u8> {
    let found = actions
        .find_one("to get the rating element", Scope::Node(node), &plan.rating_locator)
        .await?;
    let raw = match found {
        None => String::new(),
        Some(element) => match &plan.rating {
            RatingSource::AttributeDigits(attribute) => actions
                .driver()
                .attribute(element, attribute)
                .await?
                .unwrap_or_default(),
            RatingSource::TextNumber => actions.driver().inner_text(element).await?,
        },
    };
    Ok(match plan.rating {
        RatingSource::AttributeDigits(_) => parse_rating_digits(&raw),
        RatingSource::TextNumber => parse_rating_number(&raw),
    })
}

async fn extract_author(
    actions: &PageActions<'_>,
    plan: &ExtractionPlan,
    node: NodeId,
) -> BrowserResult<String> {
    let found = actions
        .find_one(
            "to get the author name element",
            Scope::Node(node),
            &plan.author_locator,
        )
        .await?;
    let Some(element) = found else {
        return Ok(String::new());
    };
    Ok(match plan.author {
        AuthorSource::TitleCasedInnerText => {
            title_case(&actions.driver().inner_text(element).await?)
        }
        AuthorSource::FirstChildText => actions
            .driver()
            .first_child_text(element)
            .await?
            .trim()
            .to_string(),
    })
}

async fn extract_content(
    actions: &PageActions<'_>,
    plan: &ExtractionPlan,
    node: NodeId,
) -> BrowserResult<String> {
    if let Some(text) = &plan.view_untranslated_text {
        let toggle = actions
            .find_one(
                "to get the clickable element to view the untranslated content",
                Scope::Node(node),
                &Locator::text("span", text.as_str()),
            )
            .await?;
        actions
            .click_if_present("to view the untranslated content", toggle)
            .await?;
        actions.wait_for_network_idle().await?;
    }
    if let Some(text) = &plan.view_more_text {
        let expand = actions
            .find_one(
                "to get the clickable element to expand the content",
                Scope::Node(node),
                &Locator::text("button", text.as_str()),
            )
            .await?;
        actions
            .click_if_present("to view the entire content", expand)
            .await?;
        actions.wait_for_network_idle().await?;
    }

    let found = actions
        .find_one("to get the content", Scope::Node(node), &plan.content_locator)
        .await?;
    let content = match found {
        None => String::new(),
        Some(element) => actions.driver().inner_text(element).await?,
    };
    Ok(if plan.trim_content {
        content.trim().to_string()
    } else {
        content
    })
}

fn non_digits() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\D").unwrap())
}

/// Digits-only extraction of an accessibility label, capped so the result
/// stays inside the 0-5 rating range even when the label carries more than
/// one digit run.
pub(crate) fn parse_rating_digits(raw: &str) -> u8 {
    let digits = non_digits().replace_all(raw, "");
    let value: u64 = digits.parse().unwrap_or(0);
    value.min(5) as u8
}

pub(crate) fn parse_rating_number(raw: &str) -> u8 {
    let value: f64 = raw.trim().parse().unwrap_or(0.0);
    (value.round().clamp(0.0, 5.0)) as u8
}

pub(crate) fn title_case(raw: &str) -> String {
    raw.to_lowercase()
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_digits_come_from_accessibility_labels() {
        assert_eq!(parse_rating_digits("5 stars"), 5);
        assert_eq!(parse_rating_digits("Rated 3 stars"), 3);
        assert_eq!(parse_rating_digits(""), 0);
        assert_eq!(parse_rating_digits("no digits here"), 0);
        // A label with several digit runs concatenates past 5 and is capped.
        assert_eq!(parse_rating_digits("4,5 stars"), 5);
    }

    #[test]
    fn rating_numbers_round_and_clamp() {
        assert_eq!(parse_rating_number("4.8"), 5);
        assert_eq!(parse_rating_number(" 3.2 "), 3);
        assert_eq!(parse_rating_number("abc"), 0);
        assert_eq!(parse_rating_number("9.7"), 5);
    }

    #[test]
    fn author_names_are_title_cased_per_word() {
        assert_eq!(title_case("JANE FOE"), "Jane Foe");
        assert_eq!(title_case("maría del mar"), "María Del Mar");
        assert_eq!(title_case(""), "");
        // Double spaces survive, matching a word-wise split and rejoin.
        assert_eq!(title_case("a  b"), "A  B");
    }
}
