use serde::{Deserialize, Serialize};

/// One extracted review record. Created per DOM element, filtered, and
/// either kept in the output collection or dropped; never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub provider: String,
    pub author_name: String,
    pub rating: u8,
    pub content: String,
}

/// Per-target filter thresholds applied after extraction.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IgnoreRules {
    pub by_author_name: Vec<String>,
    pub by_minimum_rating: u8,
    pub by_minimum_characters_count_in_content: usize,
}

impl IgnoreRules {
    pub fn keeps(&self, review: &Review) -> bool {
        review.rating >= self.by_minimum_rating
            && review.content.chars().count() >= self.by_minimum_characters_count_in_content
            && !self
                .by_author_name
                .iter()
                .any(|name| name == &review.author_name)
    }
}

/// Order-preserving filter over extracted reviews. Pure and idempotent:
/// re-filtering an already filtered list is a no-op.
pub fn filter_reviews(reviews: Vec<Review>, rules: &IgnoreRules) -> Vec<Review> {
    reviews
        .into_iter()
        .filter(|review| rules.keeps(review))
        .collect()
}
