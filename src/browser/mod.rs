//! Browser driver abstraction.
//!
//! XPath is the canonical locator scheme (it is what the tagger emits).
//! Interactions are performed through injected JavaScript, so any engine
//! that can evaluate scripts in the page can implement [`Browser`].

pub mod chromium;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// A live browser page.
#[async_trait]
pub trait Browser: Send + Sync {
    /// Navigate and wait for the load to settle.
    async fn navigate(&self, url: &str) -> Result<()>;
    async fn current_url(&self) -> Result<String>;
    async fn title(&self) -> Result<String>;
    /// PNG screenshot of the viewport.
    async fn screenshot(&self) -> Result<Vec<u8>>;
    /// Evaluate JavaScript in the page and return the JSON result.
    async fn evaluate(&self, script: &str) -> Result<Value>;
    /// Click the element at `xpath`, waiting up to `timeout` for it to
    /// become visible first.
    async fn click(&self, xpath: &str, timeout: Duration) -> Result<()>;
    /// Clear and fill the input at `xpath`.
    async fn fill(&self, xpath: &str, text: &str, timeout: Duration) -> Result<()>;
    /// Whether the element at `xpath` is visible, polling up to `timeout`.
    async fn is_visible(&self, xpath: &str, timeout: Duration) -> Result<bool>;
    /// Click the first interactive element whose visible text contains
    /// `text` — the fallback when a stored locator has gone stale.
    async fn click_by_text(&self, text: &str, timeout: Duration) -> Result<()>;
    /// Scroll the window vertically by `dy` pixels.
    async fn scroll_by(&self, dy: i64) -> Result<()>;
    /// Send an Escape key signal to the page.
    async fn press_escape(&self) -> Result<()>;
}

/// Escape a value for injection into a JS string literal. Covers quote
/// breakouts, newlines and `</script>` reflection.
pub(crate) fn js_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 8);
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '`' => out.push_str("\\`"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => {}
            '<' => out.push_str("\\x3c"),
            '>' => out.push_str("\\x3e"),
            _ => out.push(ch),
        }
    }
    out
}

/// Script resolving an XPath to a node and reporting visibility.
pub(crate) fn visibility_script(xpath: &str) -> String {
    format!(
        r#"(() => {{
            const el = document.evaluate('{}', document, null,
                XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue;
            if (!el) return false;
            const style = window.getComputedStyle(el);
            if (style.display === 'none' || style.visibility === 'hidden') return false;
            const rect = el.getBoundingClientRect();
            return rect.width > 0 && rect.height > 0;
        }})()"#,
        js_string(xpath)
    )
}

/// Script clicking the node at an XPath.
pub(crate) fn click_script(xpath: &str) -> String {
    format!(
        r#"(() => {{
            const el = document.evaluate('{}', document, null,
                XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue;
            if (!el) return {{ ok: false, reason: 'not found' }};
            el.scrollIntoView({{ block: 'center' }});
            el.click();
            return {{ ok: true }};
        }})()"#,
        js_string(xpath)
    )
}

/// Script clearing and filling the input at an XPath.
pub(crate) fn fill_script(xpath: &str, text: &str) -> String {
    format!(
        r#"(() => {{
            const el = document.evaluate('{}', document, null,
                XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue;
            if (!el) return {{ ok: false, reason: 'not found' }};
            el.focus();
            el.value = '{}';
            el.dispatchEvent(new Event('input', {{ bubbles: true }}));
            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            return {{ ok: true }};
        }})()"#,
        js_string(xpath),
        js_string(text)
    )
}

/// Script clicking the first interactive element whose text contains the
/// given needle.
pub(crate) fn click_by_text_script(text: &str) -> String {
    format!(
        r#"(() => {{
            const needle = '{}';
            const candidates = [...document.querySelectorAll(
                'a, button, [role="button"], input[type="submit"], [onclick]')];
            const hit = candidates.find(el =>
                ((el.textContent || el.value || '').trim()).includes(needle));
            if (!hit) return {{ ok: false, reason: 'no text match' }};
            hit.scrollIntoView({{ block: 'center' }});
            hit.click();
            return {{ ok: true }};
        }})()"#,
        js_string(text)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_js_string_escapes_breakouts() {
        assert_eq!(js_string("plain"), "plain");
        assert_eq!(js_string("it's"), "it\\'s");
        assert!(!js_string("</script>").contains("</script>"));
        assert_eq!(js_string("a\0b"), "ab");
    }

    #[test]
    fn test_scripts_embed_escaped_locator() {
        let script = click_script("//button[@id='save']");
        assert!(script.contains("\\'save\\'"));
        assert!(script.contains("document.evaluate"));
    }
}
