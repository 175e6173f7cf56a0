//! Chromium driver using chromiumoxide.

use super::{
    click_by_text_script, click_script, fill_script, visibility_script, Browser,
};
use crate::config::BrowserConfig;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpBrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use serde_json::Value;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::debug;

/// Locate a Chromium binary: explicit config/env path, then
/// `~/.sitemind/chromium/`, then the system PATH.
pub fn find_chromium(configured: Option<&PathBuf>) -> Option<PathBuf> {
    if let Some(path) = configured {
        if path.exists() {
            return Some(path.clone());
        }
    }

    if let Some(home) = dirs::home_dir() {
        let candidates = [
            home.join(".sitemind/chromium/chrome-linux64/chrome"),
            home.join(".sitemind/chromium/chrome"),
        ];
        for candidate in candidates {
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    if cfg!(target_os = "macos") {
        let common = PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// A launched Chromium instance with one page.
pub struct ChromiumBrowser {
    _browser: CdpBrowser,
    page: Page,
}

impl ChromiumBrowser {
    /// Launch Chromium and open a blank page.
    pub async fn launch(config: &BrowserConfig) -> Result<Self> {
        let chrome_path = find_chromium(config.chromium_path.as_ref())
            .context("Chromium not found. Set SITEMIND_CHROMIUM_PATH or install google-chrome.")?;

        let mut builder = CdpBrowserConfig::builder()
            .chrome_executable(chrome_path)
            .window_size(config.width, config.height)
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking");
        if config.headless {
            builder = builder.arg("--headless=new");
        } else {
            builder = builder.with_head();
        }
        let cdp_config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = CdpBrowser::launch(cdp_config)
            .await
            .context("failed to launch Chromium")?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .context("failed to open page")?;
        debug!("chromium launched");

        Ok(Self {
            _browser: browser,
            page,
        })
    }

    async fn eval_ok(&self, script: &str, timeout: Duration) -> Result<()> {
        let result = tokio::time::timeout(timeout, self.page.evaluate(script))
            .await
            .map_err(|_| anyhow::anyhow!("script timed out after {timeout:?}"))?
            .context("script failed")?;
        let value: Value = result
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to read script result: {e:?}"))?;

        if value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false) {
            Ok(())
        } else {
            let reason = value
                .get("reason")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");
            bail!("element interaction failed: {reason}")
        }
    }
}

#[async_trait]
impl Browser for ChromiumBrowser {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .with_context(|| format!("navigation to {url} failed"))?;
        let _ = self.page.wait_for_navigation().await;
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        let url = self
            .page
            .url()
            .await
            .context("failed to read URL")?
            .map(|u| u.to_string())
            .unwrap_or_default();
        Ok(url)
    }

    async fn title(&self) -> Result<String> {
        Ok(self
            .page
            .get_title()
            .await
            .context("failed to read title")?
            .unwrap_or_default())
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        self.page
            .screenshot(
                ScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Png)
                    .build(),
            )
            .await
            .context("screenshot failed")
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .context("JS evaluation failed")?;
        result
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to convert JS result: {e:?}"))
    }

    async fn click(&self, xpath: &str, timeout: Duration) -> Result<()> {
        if !self.is_visible(xpath, timeout).await? {
            bail!("element not visible: {xpath}");
        }
        self.eval_ok(&click_script(xpath), timeout).await
    }

    async fn fill(&self, xpath: &str, text: &str, timeout: Duration) -> Result<()> {
        if !self.is_visible(xpath, timeout).await? {
            bail!("element not visible: {xpath}");
        }
        self.eval_ok(&fill_script(xpath, text), timeout).await
    }

    async fn is_visible(&self, xpath: &str, timeout: Duration) -> Result<bool> {
        let script = visibility_script(xpath);
        let deadline = Instant::now() + timeout;

        loop {
            let visible = self
                .evaluate(&script)
                .await
                .ok()
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            if visible {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }

    async fn click_by_text(&self, text: &str, timeout: Duration) -> Result<()> {
        self.eval_ok(&click_by_text_script(text), timeout).await
    }

    async fn scroll_by(&self, dy: i64) -> Result<()> {
        self.evaluate(&format!("window.scrollBy(0, {dy}); true"))
            .await?;
        Ok(())
    }

    async fn press_escape(&self) -> Result<()> {
        self.evaluate(
            r#"(() => {
                const opts = { key: 'Escape', code: 'Escape', keyCode: 27, bubbles: true };
                document.dispatchEvent(new KeyboardEvent('keydown', opts));
                document.dispatchEvent(new KeyboardEvent('keyup', opts));
                return true;
            })()"#,
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_navigate_and_interact() {
        let config = BrowserConfig {
            headless: true,
            width: 1280,
            height: 800,
            chromium_path: None,
        };
        let browser = ChromiumBrowser::launch(&config)
            .await
            .expect("failed to launch");

        browser
            .navigate("data:text/html,<h1>Hello</h1><button id='go'>Go</button>")
            .await
            .expect("navigation failed");

        assert!(browser
            .is_visible("//button[@id='go']", Duration::from_secs(2))
            .await
            .unwrap());

        browser
            .click("//button[@id='go']", Duration::from_secs(2))
            .await
            .expect("click failed");

        let shot = browser.screenshot().await.expect("screenshot failed");
        assert!(!shot.is_empty());
    }
}
