//! Element tagging — assigns sequential integer tags to the visible
//! interactive elements of the current page and maps each tag to an
//! XPath locator.
//!
//! The primary path draws numbered badges over the page before the
//! screenshot is taken, so the model sees the same ids it is asked to
//! reference. When badge injection fails (CSP, exotic frameworks), the
//! plain DOM-query fallback produces the same listing without visuals.
//! Tags are valid for one snapshot only.

use crate::browser::Browser;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Result of tagging one page snapshot.
#[derive(Debug, Clone)]
pub struct TaggedPage {
    /// Text listing, one element per line: `[#1] Username`, `[@2] Reports`,
    /// `[$3] Save`. `#` marks inputs, `@` links, `$` everything else.
    pub listing: String,
    /// Tag id → XPath locator.
    pub tags: HashMap<u32, String>,
    /// PNG screenshot, annotated when the overlay path succeeded.
    pub screenshot: Vec<u8>,
}

#[derive(Deserialize)]
struct TagScriptResult {
    elements: String,
    xpaths: HashMap<String, String>,
}

/// Shared collection logic: walk interactive elements, compute XPaths,
/// emit the listing. `ANNOTATE` toggles badge drawing.
const COLLECT_JS: &str = r#"
(annotate) => {
    function xpathOf(el) {
        if (el.id) return '//*[@id="' + el.id + '"]';
        const parts = [];
        let node = el;
        while (node && node.nodeType === 1 && node !== document.body) {
            let index = 1;
            let sibling = node.previousElementSibling;
            while (sibling) {
                if (sibling.tagName === node.tagName) index++;
                sibling = sibling.previousElementSibling;
            }
            parts.unshift(node.tagName.toLowerCase() + '[' + index + ']');
            node = node.parentElement;
        }
        return '/html/body/' + parts.join('/');
    }

    const selector = 'a, button, input, textarea, select, [onclick], ' +
        '[role="button"], [type="submit"]';
    const lines = [];
    const xpaths = {};
    let id = 1;

    document.querySelectorAll(selector).forEach(el => {
        const style = window.getComputedStyle(el);
        if (style.display === 'none' || style.visibility === 'hidden') return;
        const rect = el.getBoundingClientRect();
        if (rect.width === 0 && rect.height === 0) return;

        const tag = el.tagName.toLowerCase();
        let text = (el.textContent || '').trim() || el.value || el.placeholder ||
            el.title || el.getAttribute('aria-label') || '';
        text = text.replace(/\s+/g, ' ').substring(0, 60);
        if (!text && tag !== 'input' && tag !== 'textarea' && tag !== 'select') return;

        let prefix = '$';
        if (tag === 'a') prefix = '@';
        else if (tag === 'input' || tag === 'textarea') prefix = '#';

        lines.push('[' + prefix + id + '] ' + (text || '[' + tag + ']'));
        xpaths[id] = xpathOf(el);

        if (annotate) {
            const badge = document.createElement('span');
            badge.setAttribute('data-sitemind-tag', id);
            badge.textContent = prefix + id;
            badge.style.cssText =
                'position:absolute;z-index:2147483647;background:#d32f2f;' +
                'color:#fff;font:bold 11px monospace;padding:1px 3px;' +
                'border-radius:2px;pointer-events:none;' +
                'left:' + (rect.left + window.scrollX) + 'px;' +
                'top:' + (rect.top + window.scrollY) + 'px;';
            document.body.appendChild(badge);
        }
        id++;
    });

    return { elements: lines.join('\n'), xpaths: xpaths };
}
"#;

/// Page tagger. Stateless; tags are recomputed per snapshot.
pub struct Tagger;

impl Tagger {
    pub fn new() -> Self {
        Tagger
    }

    /// Tag the current page and capture a screenshot.
    pub async fn tag_page(&self, browser: &dyn Browser) -> Result<TaggedPage> {
        let result = match self.run_collect(browser, true).await {
            Ok(result) => result,
            Err(e) => {
                warn!("overlay tagging failed ({e:#}), using query-only fallback");
                self.run_collect(browser, false).await?
            }
        };

        let screenshot = browser.screenshot().await.context("tag screenshot failed")?;

        let tags: HashMap<u32, String> = result
            .xpaths
            .into_iter()
            .filter_map(|(k, v)| k.parse::<u32>().ok().map(|id| (id, v)))
            .collect();
        debug!(count = tags.len(), "page tagged");

        Ok(TaggedPage {
            listing: result.elements,
            tags,
            screenshot,
        })
    }

    async fn run_collect(&self, browser: &dyn Browser, annotate: bool) -> Result<TagScriptResult> {
        let script = format!("({COLLECT_JS})({annotate})");
        let value = browser.evaluate(&script).await?;
        serde_json::from_value(value).context("tag script returned unexpected shape")
    }

    /// Remove overlay badges left by `tag_page`.
    pub async fn clear_tags(&self, browser: &dyn Browser) {
        let script = r#"
            document.querySelectorAll('[data-sitemind-tag]')
                .forEach(el => el.remove()); true
        "#;
        if let Err(e) = browser.evaluate(script).await {
            debug!("clearing tags failed: {e:#}");
        }
    }
}

impl Default for Tagger {
    fn default() -> Self {
        Self::new()
    }
}
