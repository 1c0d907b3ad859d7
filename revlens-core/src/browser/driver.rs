use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::trace;

use crate::trace::TraceValue;

use super::automation::BrowserContext;
use super::error::{BrowserError, BrowserResult};

/// Opaque handle to a DOM element located by a previous find call. Valid for
/// the current page load only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TraceValue for NodeId {}

/// Where a find operation searches: the whole page or the descendants of a
/// previously found element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Page,
    Node(NodeId),
}

/// How an element is addressed: a CSS selector, or the minimal elements
/// whose visible text contains a given string (optionally constrained by a
/// CSS selector; an empty selector means any element).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Css(String),
    Text { css: String, text: String },
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn text(css: impl Into<String>, text: impl Into<String>) -> Self {
        Locator::Text {
            css: css.into(),
            text: text.into(),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(css) => write!(f, "{css}"),
            Locator::Text { css, text } if css.is_empty() => write!(f, "::text({text})"),
            Locator::Text { css, text } => write!(f, "{css} ::text({text})"),
        }
    }
}

/// Tag name and first CSS class of an element, the building block of
/// inferred selectors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementShape {
    pub tag: String,
    pub first_class: Option<String>,
}

impl ElementShape {
    pub fn selector(&self) -> String {
        match &self.first_class {
            Some(class) => format!("{}.{}", self.tag, class),
            None => self.tag.clone(),
        }
    }
}

impl fmt::Display for ElementShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.selector())
    }
}

/// The narrow boundary to the rendering capability. The engine submits
/// selectors and pure extraction requests; the implementation executes them
/// in page context and returns plain data. Nothing above this trait touches
/// CDP types, which is also what makes the pipelines testable against a
/// scripted fake.
#[async_trait(?Send)]
pub trait PageDriver {
    async fn navigate(&self, url: &str) -> BrowserResult<()>;
    async fn find_one(&self, scope: Scope, locator: &Locator) -> BrowserResult<Option<NodeId>>;
    async fn find_all(&self, scope: Scope, locator: &Locator) -> BrowserResult<Vec<NodeId>>;
    async fn click(&self, node: NodeId) -> BrowserResult<()>;
    async fn press_key(&self, key: &str) -> BrowserResult<()>;
    async fn wait_for_network_idle(&self, timeout: Duration) -> BrowserResult<()>;
    async fn inner_text(&self, node: NodeId) -> BrowserResult<String>;
    async fn first_child_text(&self, node: NodeId) -> BrowserResult<String>;
    async fn attribute(&self, node: NodeId, name: &str) -> BrowserResult<Option<String>>;
    async fn describe(&self, node: NodeId) -> BrowserResult<ElementShape>;
    async fn page_content(&self) -> BrowserResult<String>;
    async fn outer_html(&self, node: NodeId) -> BrowserResult<String>;
}

/// `PageDriver` over a live Chromium page. Found elements are tagged with a
/// `data-rl-node` attribute from inside the evaluated script and addressed
/// by attribute selector afterwards; every read comes back as JSON.
pub struct CdpDriver {
    context: BrowserContext,
    next_node: AtomicU64,
}

impl CdpDriver {
    pub fn new(context: BrowserContext) -> Self {
        Self {
            context,
            next_node: AtomicU64::new(1),
        }
    }

    pub fn context(&self) -> &BrowserContext {
        &self.context
    }

    async fn eval_value<T: DeserializeOwned>(&self, script: &str) -> BrowserResult<T> {
        self.context
            .page()
            .evaluate(script)
            .await?
            .into_value()
            .map_err(|err| BrowserError::Evaluate(err.to_string()))
    }

    /// Builds the find script: query candidates under the scope root, filter
    /// by contained text keeping only minimal matches, then tag up to
    /// `limit` elements with consecutive `data-rl-node` ids starting at
    /// `base`. Returns how many were tagged.
    fn find_script(&self, scope: Scope, locator: &Locator, base: u64, limit: u64) -> String {
        let (css, text) = match locator {
            Locator::Css(css) => (css.clone(), None),
            Locator::Text { css, text } => {
                let css = if css.is_empty() { "*".to_string() } else { css.clone() };
                (css, Some(text.clone()))
            }
        };
        let scope_selector = match scope {
            Scope::Page => None,
            Scope::Node(node) => Some(format!("[data-rl-node=\"{node}\"]")),
        };
        let cfg = json!({
            "scope": scope_selector,
            "css": css,
            "text": text,
            "base": base,
            "limit": limit,
        });
        format!(
            r#"(() => {{
    const cfg = {cfg};
    const root = cfg.scope === null ? document : document.querySelector(cfg.scope);
    if (root === null) {{
        return 0;
    }}
    let matches = Array.from(root.querySelectorAll(cfg.css));
    if (cfg.text !== null) {{
        matches = matches.filter(el => (el.innerText || el.textContent || '').includes(cfg.text));
        matches = matches.filter(el => !matches.some(other => other !== el && el.contains(other)));
    }}
    let id = cfg.base;
    const tagged = matches.slice(0, cfg.limit);
    tagged.forEach(el => el.setAttribute('data-rl-node', String(id++)));
    return tagged.length;
}})()"#
        )
    }

    fn node_script(node: NodeId, body: &str) -> String {
        format!(
            r#"(() => {{
    const el = document.querySelector('[data-rl-node="{node}"]');
    if (el === null) {{
        return null;
    }}
    {body}
}})()"#
        )
    }

    fn stale(node: NodeId) -> BrowserError {
        BrowserError::Unexpected(format!("stale element handle {node}"))
    }
}

#[async_trait(?Send)]
impl PageDriver for CdpDriver {
    async fn navigate(&self, url: &str) -> BrowserResult<()> {
        self.context.goto(url).await
    }

    async fn find_one(&self, scope: Scope, locator: &Locator) -> BrowserResult<Option<NodeId>> {
        let base = self.next_node.fetch_add(1, Ordering::Relaxed);
        let script = self.find_script(scope, locator, base, 1);
        let tagged: u64 = self.eval_value(&script).await?;
        trace!(%locator, tagged, "find_one");
        Ok((tagged > 0).then_some(NodeId(base)))
    }

    async fn find_all(&self, scope: Scope, locator: &Locator) -> BrowserResult<Vec<NodeId>> {
        const MAX_MATCHES: u64 = 4096;
        let base = self.next_node.fetch_add(MAX_MATCHES, Ordering::Relaxed);
        let script = self.find_script(scope, locator, base, MAX_MATCHES);
        let tagged: u64 = self.eval_value(&script).await?;
        trace!(%locator, tagged, "find_all");
        Ok((0..tagged).map(|offset| NodeId(base + offset)).collect())
    }

    async fn click(&self, node: NodeId) -> BrowserResult<()> {
        let script = Self::node_script(node, "el.click();\n    return true;");
        let clicked: Option<bool> = self.eval_value(&script).await?;
        match clicked {
            Some(true) => Ok(()),
            _ => Err(Self::stale(node)),
        }
    }

    async fn press_key(&self, key: &str) -> BrowserResult<()> {
        let virtual_key = match key {
            "Tab" => 9,
            "Enter" => 13,
            "End" => 35,
            "Home" => 36,
            _ => 0,
        };
        for event_type in [DispatchKeyEventType::RawKeyDown, DispatchKeyEventType::KeyUp] {
            let event = DispatchKeyEventParams::builder()
                .r#type(event_type)
                .key(key)
                .code(key)
                .windows_virtual_key_code(virtual_key)
                .native_virtual_key_code(virtual_key)
                .build()
                .map_err(BrowserError::Configuration)?;
            self.context.page().execute(event).await?;
        }
        Ok(())
    }

    /// Chromium exposes no stable network-idle signal over this CDP surface,
    /// so idleness is probed in page context: the resource entry count must
    /// stay unchanged for one second, bounded by the caller's timeout.
    async fn wait_for_network_idle(&self, timeout: Duration) -> BrowserResult<()> {
        #[derive(Deserialize)]
        struct IdleProbe {
            ok: bool,
        }

        let timeout_ms = timeout.as_millis().min(u128::from(u64::MAX)) as u64;
        let script = format!(
            r#"(async () => {{
    const timeoutMs = {timeout_ms};
    const idleMs = 1000;
    const interval = 250;
    const start = Date.now();
    let lastCount = performance.getEntriesByType('resource').length;
    let stableMs = 0;
    while (Date.now() - start < timeoutMs) {{
        await new Promise(resolve => setTimeout(resolve, interval));
        const count = performance.getEntriesByType('resource').length;
        if (document.readyState === 'complete' && count === lastCount) {{
            stableMs += interval;
            if (stableMs >= idleMs) {{
                return {{ ok: true }};
            }}
        }} else {{
            stableMs = 0;
        }}
        lastCount = count;
    }}
    return {{ ok: false }};
}})()"#
        );
        let probe: IdleProbe = self.eval_value(&script).await?;
        if probe.ok {
            Ok(())
        } else {
            Err(BrowserError::Timeout("network idle".to_string()))
        }
    }

    async fn inner_text(&self, node: NodeId) -> BrowserResult<String> {
        let script = Self::node_script(node, "return el.innerText || el.textContent || '';");
        let text: Option<String> = self.eval_value(&script).await?;
        text.ok_or_else(|| Self::stale(node))
    }

    async fn first_child_text(&self, node: NodeId) -> BrowserResult<String> {
        let script = Self::node_script(
            node,
            "return el.firstChild === null ? '' : (el.firstChild.textContent || '');",
        );
        let text: Option<String> = self.eval_value(&script).await?;
        text.ok_or_else(|| Self::stale(node))
    }

    async fn attribute(&self, node: NodeId, name: &str) -> BrowserResult<Option<String>> {
        let body = format!("return el.getAttribute({});", json!(name));
        let script = Self::node_script(node, &body);
        let value: Option<String> = self.eval_value(&script).await?;
        Ok(value)
    }

    async fn describe(&self, node: NodeId) -> BrowserResult<ElementShape> {
        #[derive(Deserialize)]
        struct ShapeProbe {
            tag: String,
            class: Option<String>,
        }

        let script = Self::node_script(
            node,
            r#"return {
        tag: el.nodeName.toLowerCase(),
        class: el.classList.length > 0 ? el.classList[0] : null,
    };"#,
        );
        let probe: Option<ShapeProbe> = self.eval_value(&script).await?;
        let probe = probe.ok_or_else(|| Self::stale(node))?;
        Ok(ElementShape {
            tag: probe.tag,
            first_class: probe.class,
        })
    }

    async fn page_content(&self) -> BrowserResult<String> {
        Ok(self.context.page().content().await?)
    }

    async fn outer_html(&self, node: NodeId) -> BrowserResult<String> {
        let script = Self::node_script(node, "return el.outerHTML;");
        let html: Option<String> = self.eval_value(&script).await?;
        html.ok_or_else(|| Self::stale(node))
    }
}
