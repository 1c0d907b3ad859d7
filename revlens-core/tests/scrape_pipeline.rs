use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;

use revlens_core::browser::{
    BrowserError, BrowserResult, ElementShape, Locator, NodeId, PageDriver, Scope,
};
use revlens_core::config::{
    GoogleKnown, GoogleKnownTexts, GoogleTarget, KnownSample, MarketplaceTarget, SiteTarget,
    WebTarget,
};
use revlens_core::scraper::{
    filter_reviews, infer_selectors, run_pipeline, scrape_targets, DriverFactory, IgnoreRules,
    InferredSelectors, PageActions, Review,
};
use revlens_core::trace::{ErrorOnlyFormatter, StandardFormatter, TraceLog, Tracer};

const MOCK_PAGE_HTML: &str = "<html><body>the mock page</body></html>";

/// One element of the scripted page. `text` is the element's whole visible
/// text (descendants included), `visible_after` the number of scroll steps
/// needed before the element exists, which models lazy-loaded content.
#[derive(Clone)]
struct MockNode {
    id: u64,
    parent: Option<u64>,
    tag: &'static str,
    class: Option<&'static str>,
    text: &'static str,
    aria_label: Option<&'static str>,
    first_child_text: Option<&'static str>,
    visible_after: usize,
}

fn el(
    id: u64,
    parent: Option<u64>,
    tag: &'static str,
    class: Option<&'static str>,
    text: &'static str,
) -> MockNode {
    MockNode {
        id,
        parent,
        tag,
        class,
        text,
        aria_label: None,
        first_child_text: None,
        visible_after: 0,
    }
}

struct MockDriver {
    nodes: Vec<MockNode>,
    scrolls: Cell<usize>,
    navigations: RefCell<Vec<String>>,
    clicks: RefCell<Vec<u64>>,
    keys: RefCell<Vec<String>>,
}

impl MockDriver {
    fn new(nodes: Vec<MockNode>) -> Self {
        Self {
            nodes,
            scrolls: Cell::new(0),
            navigations: RefCell::new(Vec::new()),
            clicks: RefCell::new(Vec::new()),
            keys: RefCell::new(Vec::new()),
        }
    }

    fn node(&self, id: NodeId) -> BrowserResult<&MockNode> {
        self.nodes
            .iter()
            .find(|node| node.id == id.0)
            .ok_or_else(|| BrowserError::Unexpected(format!("stale element handle {id}")))
    }

    fn visible(&self, node: &MockNode) -> bool {
        node.visible_after <= self.scrolls.get()
    }

    fn in_scope(&self, node: &MockNode, scope: Scope) -> bool {
        match scope {
            Scope::Page => true,
            Scope::Node(root) => {
                let mut current = node.parent;
                while let Some(parent) = current {
                    if parent == root.0 {
                        return true;
                    }
                    current = self
                        .nodes
                        .iter()
                        .find(|candidate| candidate.id == parent)
                        .and_then(|candidate| candidate.parent);
                }
                false
            }
        }
    }

    fn is_ancestor_of(&self, ancestor: u64, descendant: u64) -> bool {
        let mut current = self
            .nodes
            .iter()
            .find(|node| node.id == descendant)
            .and_then(|node| node.parent);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self
                .nodes
                .iter()
                .find(|node| node.id == parent)
                .and_then(|node| node.parent);
        }
        false
    }

    fn matches_css(node: &MockNode, selector: &str) -> bool {
        if let Some(rest) = selector.strip_prefix("[aria-label~=\"") {
            let word = rest.trim_end_matches("\"]");
            node.aria_label
                .map_or(false, |label| label.split_whitespace().any(|w| w == word))
        } else if let Some(rest) = selector.strip_prefix("[aria-label=\"") {
            let value = rest.trim_end_matches("\"]");
            node.aria_label == Some(value)
        } else if let Some(class) = selector.strip_prefix('.') {
            node.class == Some(class)
        } else if let Some((tag, class)) = selector.split_once('.') {
            node.tag == tag && node.class == Some(class)
        } else {
            selector == "*" || node.tag == selector
        }
    }

    /// Finds visible nodes under the scope matching the locator, in
    /// document order. Text locators keep only minimal matches, mirroring
    /// the real driver's smallest-element semantics.
    fn find(&self, scope: Scope, locator: &Locator) -> Vec<u64> {
        let matched: Vec<u64> = self
            .nodes
            .iter()
            .filter(|node| self.visible(node) && self.in_scope(node, scope))
            .filter(|node| match locator {
                Locator::Css(css) => Self::matches_css(node, css),
                Locator::Text { css, text } => {
                    (css.is_empty() || Self::matches_css(node, css))
                        && node.text.contains(text.as_str())
                }
            })
            .map(|node| node.id)
            .collect();

        if matches!(locator, Locator::Text { .. }) {
            matched
                .iter()
                .copied()
                .filter(|id| {
                    !matched
                        .iter()
                        .any(|other| other != id && self.is_ancestor_of(*id, *other))
                })
                .collect()
        } else {
            matched
        }
    }
}

#[async_trait(?Send)]
impl PageDriver for MockDriver {
    async fn navigate(&self, url: &str) -> BrowserResult<()> {
        self.navigations.borrow_mut().push(url.to_string());
        Ok(())
    }

    async fn find_one(&self, scope: Scope, locator: &Locator) -> BrowserResult<Option<NodeId>> {
        Ok(self.find(scope, locator).first().map(|id| NodeId(*id)))
    }

    async fn find_all(&self, scope: Scope, locator: &Locator) -> BrowserResult<Vec<NodeId>> {
        Ok(self.find(scope, locator).into_iter().map(NodeId).collect())
    }

    async fn click(&self, node: NodeId) -> BrowserResult<()> {
        self.node(node)?;
        self.clicks.borrow_mut().push(node.0);
        Ok(())
    }

    async fn press_key(&self, key: &str) -> BrowserResult<()> {
        if key == "End" {
            self.scrolls.set(self.scrolls.get() + 1);
        }
        self.keys.borrow_mut().push(key.to_string());
        Ok(())
    }

    async fn wait_for_network_idle(&self, _timeout: Duration) -> BrowserResult<()> {
        Ok(())
    }

    async fn inner_text(&self, node: NodeId) -> BrowserResult<String> {
        Ok(self.node(node)?.text.to_string())
    }

    async fn first_child_text(&self, node: NodeId) -> BrowserResult<String> {
        let node = self.node(node)?;
        Ok(node.first_child_text.unwrap_or(node.text).to_string())
    }

    async fn attribute(&self, node: NodeId, name: &str) -> BrowserResult<Option<String>> {
        let node = self.node(node)?;
        Ok(match name {
            "aria-label" => node.aria_label.map(str::to_string),
            _ => None,
        })
    }

    async fn describe(&self, node: NodeId) -> BrowserResult<ElementShape> {
        let node = self.node(node)?;
        Ok(ElementShape {
            tag: node.tag.to_string(),
            first_class: node.class.map(str::to_string),
        })
    }

    async fn page_content(&self) -> BrowserResult<String> {
        Ok(MOCK_PAGE_HTML.to_string())
    }

    async fn outer_html(&self, node: NodeId) -> BrowserResult<String> {
        let node = self.node(node)?;
        Ok(format!("<{0}>{1}</{0}>", node.tag, node.text))
    }
}

/// The maps-site page: consent and navigation chrome plus three reviews,
/// the oldest of which only appears after two scroll steps.
fn google_dom() -> Vec<MockNode> {
    vec![
        el(1, None, "button", None, "Reject all"),
        el(2, None, "button", None, "Reviews"),
        el(3, None, "button", None, "Sort"),
        el(4, None, "div", Some("fxNQSd"), "Newest first"),
        MockNode {
            aria_label: Some("John Doe"),
            ..el(10, None, "div", Some("jftiEf"), "John Doe 5 stars Great service here More")
        },
        el(11, Some(10), "div", Some("d4r55"), "John Doe"),
        MockNode {
            aria_label: Some("5 stars"),
            ..el(12, Some(10), "span", Some("kvMYJc"), "")
        },
        el(13, Some(10), "span", Some("wiI7pd"), "Great service here"),
        el(14, Some(10), "button", None, "More"),
        MockNode {
            aria_label: Some("Jane Foe"),
            ..el(20, None, "div", Some("jftiEf"), "Jane Foe 5 stars Wonderful place")
        },
        el(21, Some(20), "div", Some("d4r55"), "Jane Foe"),
        MockNode {
            aria_label: Some("5 stars"),
            ..el(22, Some(20), "span", Some("kvMYJc"), "")
        },
        el(23, Some(20), "span", Some("wiI7pd"), "Wonderful place"),
        MockNode {
            visible_after: 2,
            aria_label: Some("Ann"),
            ..el(30, None, "div", Some("jftiEf"), "Ann 2 stars Nice enough experience")
        },
        MockNode {
            visible_after: 2,
            ..el(31, Some(30), "div", Some("d4r55"), "Ann")
        },
        MockNode {
            visible_after: 2,
            aria_label: Some("2 stars"),
            ..el(32, Some(30), "span", Some("kvMYJc"), "")
        },
        MockNode {
            visible_after: 2,
            ..el(33, Some(30), "span", Some("wiI7pd"), "Nice enough experience")
        },
    ]
}

fn marketplace_dom() -> Vec<MockNode> {
    vec![
        MockNode {
            visible_after: 1,
            ..el(5, None, "footer", None, "About us")
        },
        el(
            40,
            None,
            "div",
            Some("storefrontReviewsTileSubpage"),
            "Carmen 4.8 Everything was perfect on our wedding day",
        ),
        MockNode {
            first_child_text: Some("Carmen  "),
            ..el(41, Some(40), "div", Some("storefrontReviewsTileInfo"), "Carmen Married in June")
        },
        el(42, Some(40), "span", Some("rating__count"), "4.8"),
        el(
            43,
            Some(40),
            "div",
            Some("app-full-description"),
            "  Everything was perfect on our wedding day  ",
        ),
        el(50, None, "div", Some("storefrontReviewsTileSubpage"), "Luis 2.1 Meh"),
        MockNode {
            first_child_text: Some("Luis"),
            ..el(51, Some(50), "div", Some("storefrontReviewsTileInfo"), "Luis Married in May")
        },
        el(52, Some(50), "span", Some("rating__count"), "2.1"),
        el(53, Some(50), "div", Some("app-full-description"), "Meh"),
    ]
}

fn google_texts() -> GoogleKnownTexts {
    GoogleKnownTexts {
        reject_cookies_button_text: "Reject all".to_string(),
        view_more_button_text: "More".to_string(),
        view_untranslated_content_button_text: "See original".to_string(),
        reviews_section_button_text: "Reviews".to_string(),
        sorting_button_text: "Sort".to_string(),
        by_newest_option_button_text: "Newest first".to_string(),
        stars: "stars".to_string(),
    }
}

fn known_sample() -> KnownSample {
    KnownSample {
        author_name: "Jane Foe".to_string(),
        content: "Wonderful place".to_string(),
    }
}

fn google_target(
    title: &str,
    oldest_review_author_name: &str,
    max_scroll_iterations: usize,
    ignore_reviews: IgnoreRules,
) -> WebTarget {
    WebTarget {
        title: title.to_string(),
        activate: true,
        url: "https://maps.example.com/business".to_string(),
        timeout_ms: 500,
        max_scroll_iterations,
        ignore_reviews,
        site: SiteTarget::Google(GoogleTarget {
            known: GoogleKnown {
                review: known_sample(),
                texts: google_texts(),
                oldest_review_author_name: oldest_review_author_name.to_string(),
            },
            translated_content: false,
        }),
    }
}

fn marketplace_target(title: &str) -> WebTarget {
    WebTarget {
        title: title.to_string(),
        activate: true,
        url: "https://marketplace.example.com/storefront".to_string(),
        timeout_ms: 500,
        max_scroll_iterations: 5,
        ignore_reviews: IgnoreRules::default(),
        site: SiteTarget::Marketplace(MarketplaceTarget::default()),
    }
}

fn actions_pair<'d>(
    driver: &'d MockDriver,
    log: &TraceLog,
    max_scroll_iterations: usize,
) -> (PageActions<'d>, PageActions<'d>) {
    let tracer = Tracer::new(StandardFormatter, log.clone());
    let loop_tracer = tracer.with_formatter(ErrorOnlyFormatter);
    let actions = PageActions::new(
        driver,
        tracer,
        Duration::from_millis(50),
        max_scroll_iterations,
    );
    let loop_actions = actions.with_tracer(loop_tracer);
    (actions, loop_actions)
}

fn scroll_steps(log: &TraceLog) -> usize {
    log.entries()
        .iter()
        .filter(|line| line.starts_with("Start: to do scroll step number"))
        .count()
}

#[tokio::test]
async fn google_pipeline_extracts_reviews_in_document_order() {
    let driver = MockDriver::new(google_dom());
    let log = TraceLog::new();
    let (actions, loop_actions) = actions_pair(&driver, &log, 10);
    let target = google_target("Mock business", "Ann", 10, IgnoreRules::default());

    let reviews = run_pipeline(&target, &actions, &loop_actions).await.unwrap();

    assert_eq!(
        reviews,
        vec![
            Review {
                provider: "google".to_string(),
                author_name: "John Doe".to_string(),
                rating: 5,
                content: "Great service here".to_string(),
            },
            Review {
                provider: "google".to_string(),
                author_name: "Jane Foe".to_string(),
                rating: 5,
                content: "Wonderful place".to_string(),
            },
            Review {
                provider: "google".to_string(),
                author_name: "Ann".to_string(),
                rating: 2,
                content: "Nice enough experience".to_string(),
            },
        ]
    );
    assert_eq!(
        driver.navigations.borrow().as_slice(),
        ["https://maps.example.com/business"]
    );
    // Cookies, reviews tab, sorting menu, newest option, plus the expand
    // control inside the first review.
    assert!(driver.clicks.borrow().len() >= 5);
}

#[tokio::test]
async fn ignore_rules_keep_only_the_clean_review() {
    let driver = MockDriver::new(google_dom());
    let log = TraceLog::new();
    let (actions, loop_actions) = actions_pair(&driver, &log, 10);
    let rules = IgnoreRules {
        by_author_name: vec!["John Doe".to_string()],
        by_minimum_rating: 4,
        by_minimum_characters_count_in_content: 10,
    };
    let target = google_target("Mock business", "Ann", 10, rules.clone());

    let raw = run_pipeline(&target, &actions, &loop_actions).await.unwrap();
    let kept = filter_reviews(raw, &rules);

    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].author_name, "Jane Foe");
    assert_eq!(kept[0].rating, 5);
}

#[tokio::test]
async fn convergence_performs_exactly_the_needed_iterations() {
    let driver = MockDriver::new(google_dom());
    let log = TraceLog::new();
    let (actions, loop_actions) = actions_pair(&driver, &log, 10);
    let target = google_target("Mock business", "Ann", 10, IgnoreRules::default());

    run_pipeline(&target, &actions, &loop_actions).await.unwrap();

    // The oldest review appears after two scroll steps, so the loop runs
    // exactly twice.
    assert_eq!(scroll_steps(&log), 2);
    let keys = driver.keys.borrow();
    assert_eq!(keys.iter().filter(|key| *key == "End").count(), 2);
    assert_eq!(keys.iter().filter(|key| *key == "Tab").count(), 1);
}

#[tokio::test]
async fn convergence_gives_up_with_a_typed_error() {
    let driver = MockDriver::new(google_dom());
    let log = TraceLog::new();
    let (actions, loop_actions) = actions_pair(&driver, &log, 4);
    let target = google_target("Mock business", "Mr. T", 4, IgnoreRules::default());

    let err = run_pipeline(&target, &actions, &loop_actions)
        .await
        .unwrap_err();

    match err {
        BrowserError::ConvergenceTimeout { iterations, .. } => assert_eq!(iterations, 4),
        other => panic!("expected a convergence timeout, got: {other}"),
    }
    assert_eq!(scroll_steps(&log), 4);
}

#[tokio::test]
async fn inferred_selectors_rematch_the_known_sample() {
    let driver = MockDriver::new(google_dom());
    let log = TraceLog::new();
    let (actions, _) = actions_pair(&driver, &log, 10);

    let selectors = infer_selectors(&actions, &known_sample()).await.unwrap();
    assert_eq!(
        selectors,
        InferredSelectors {
            review: "div.jftiEf".to_string(),
            author_name: "div.d4r55".to_string(),
            content: "span.wiI7pd".to_string(),
        }
    );

    let authors = driver.find(Scope::Page, &Locator::css(selectors.author_name.as_str()));
    let mut author_texts = Vec::new();
    for id in authors {
        author_texts.push(driver.inner_text(NodeId(id)).await.unwrap());
    }
    assert!(author_texts.iter().any(|text| text == "Jane Foe"));

    let contents = driver.find(Scope::Page, &Locator::css(selectors.content.as_str()));
    let mut content_texts = Vec::new();
    for id in contents {
        content_texts.push(driver.inner_text(NodeId(id)).await.unwrap());
    }
    assert!(content_texts.iter().any(|text| text == "Wonderful place"));
}

#[tokio::test]
async fn missing_sample_text_fails_inference_with_a_description() {
    let driver = MockDriver::new(google_dom());
    let log = TraceLog::new();
    let (actions, _) = actions_pair(&driver, &log, 10);
    let sample = KnownSample {
        author_name: "Nobody Here".to_string(),
        content: "Text that was reworded long ago".to_string(),
    };

    let err = infer_selectors(&actions, &sample).await.unwrap_err();
    match err {
        BrowserError::SelectorInference(message) => {
            assert!(message.contains("was not found"));
        }
        other => panic!("expected a selector inference failure, got: {other}"),
    }
}

#[tokio::test]
async fn fatal_absence_carries_the_page_snapshot() {
    let dom: Vec<MockNode> = google_dom()
        .into_iter()
        .filter(|node| node.id != 1)
        .collect();
    let driver = MockDriver::new(dom);
    let log = TraceLog::new();
    let (actions, loop_actions) = actions_pair(&driver, &log, 10);
    let target = google_target("Mock business", "Ann", 10, IgnoreRules::default());

    let err = run_pipeline(&target, &actions, &loop_actions)
        .await
        .unwrap_err();

    match err {
        BrowserError::ElementNotFound { locator, html } => {
            assert!(locator.contains("Reject all"));
            assert_eq!(html, MOCK_PAGE_HTML);
        }
        other => panic!("expected an element not found error, got: {other}"),
    }
}

#[tokio::test]
async fn per_element_entries_are_matched_pairs_even_when_interleaved() {
    let driver = MockDriver::new(google_dom());
    let log = TraceLog::new();
    let (actions, _) = actions_pair(&driver, &log, 10);
    // A verbose in-loop tracer, to observe the fan-out entries.
    let loop_actions = actions.with_tracer(Tracer::new(StandardFormatter, log.clone()));
    let target = google_target("Mock business", "Ann", 10, IgnoreRules::default());

    run_pipeline(&target, &actions, &loop_actions).await.unwrap();

    let entries = log.entries();
    let starts = entries
        .iter()
        .filter(|line| line.starts_with("Start:") && line.contains("to get the rating element"))
        .count();
    let finishes = entries
        .iter()
        .filter(|line| line.starts_with("Finish:") && line.contains("to get the rating element"))
        .count();
    // Three review elements, one start and one finish each; ordering across
    // elements is not guaranteed.
    assert_eq!(starts, 3);
    assert_eq!(finishes, 3);
}

#[tokio::test]
async fn marketplace_pipeline_scrolls_to_the_footer_and_extracts() {
    let driver = MockDriver::new(marketplace_dom());
    let log = TraceLog::new();
    let (actions, loop_actions) = actions_pair(&driver, &log, 5);
    let target = marketplace_target("Marketplace storefront");

    let reviews = run_pipeline(&target, &actions, &loop_actions).await.unwrap();

    assert_eq!(
        reviews,
        vec![
            Review {
                provider: "marketplace".to_string(),
                author_name: "Carmen".to_string(),
                rating: 5,
                content: "Everything was perfect on our wedding day".to_string(),
            },
            Review {
                provider: "marketplace".to_string(),
                author_name: "Luis".to_string(),
                rating: 2,
                content: "Meh".to_string(),
            },
        ]
    );
    assert_eq!(scroll_steps(&log), 1);
}

struct MockFactory {
    doms: RefCell<VecDeque<Vec<MockNode>>>,
    created: Cell<usize>,
}

impl MockFactory {
    fn new(doms: Vec<Vec<MockNode>>) -> Self {
        Self {
            doms: RefCell::new(doms.into()),
            created: Cell::new(0),
        }
    }
}

#[async_trait(?Send)]
impl DriverFactory for MockFactory {
    async fn create(&self, _target: &WebTarget) -> BrowserResult<Box<dyn PageDriver>> {
        let dom = self
            .doms
            .borrow_mut()
            .pop_front()
            .expect("more targets scraped than scripted pages");
        self.created.set(self.created.get() + 1);
        Ok(Box::new(MockDriver::new(dom)))
    }
}

#[tokio::test]
async fn a_failed_target_is_logged_and_the_run_continues() {
    let broken_google_dom: Vec<MockNode> = google_dom()
        .into_iter()
        .filter(|node| node.id != 1)
        .collect();
    let factory = MockFactory::new(vec![broken_google_dom, marketplace_dom()]);

    let mut skipped = google_target("Inactive target", "Ann", 10, IgnoreRules::default());
    skipped.activate = false;
    let targets = vec![
        skipped,
        google_target("Broken maps target", "Ann", 10, IgnoreRules::default()),
        marketplace_target("Marketplace storefront"),
    ];

    let log = TraceLog::new();
    let tracer = Tracer::new(StandardFormatter, log.clone());
    let loop_tracer = tracer.with_formatter(ErrorOnlyFormatter);

    let reviews = scrape_targets(&tracer, &loop_tracer, &factory, &targets).await;

    // Only the marketplace target contributed reviews.
    assert_eq!(reviews.len(), 2);
    assert!(reviews.iter().all(|review| review.provider == "marketplace"));
    // The inactive target never opened a page.
    assert_eq!(factory.created.get(), 2);

    let entries = log.entries();
    assert!(entries
        .iter()
        .any(|line| line.contains("######## Start Broken maps target ########")));
    assert!(entries
        .iter()
        .any(|line| line.contains("There was an error scraping the google provider")));
    assert!(entries.iter().any(|line| line == MOCK_PAGE_HTML));
    assert!(entries
        .iter()
        .any(|line| line.contains("######## Finish Marketplace storefront ########")));
    assert!(!entries
        .iter()
        .any(|line| line.contains("######## Finish Broken maps target ########")));
}
