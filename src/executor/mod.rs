//! The action-command grammar produced by the model and its executor.
//!
//! Commands: `CLICK [id]`, `TYPE [id] "text"`, `SCROLL UP|DOWN`,
//! `GOTO "url"`, `WAIT [seconds]` (default 2, clamped to 30), `PAUSE`,
//! `DONE`. Unrecognized text yields a "cannot parse" outcome without
//! advancing task state.

use crate::browser::Browser;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tracing::info;

/// Default WAIT duration in seconds.
pub const WAIT_DEFAULT_SECS: u64 = 2;
/// Upper clamp for WAIT.
pub const WAIT_MAX_SECS: u64 = 30;

/// A parsed action command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Click(u32),
    Type(u32, String),
    Scroll(ScrollDirection),
    Goto(String),
    Wait(u64),
    Pause,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
}

impl Command {
    /// Parse a model response into a command. Recognition order matches
    /// execution priority: DONE and PAUSE anywhere in the text win over
    /// everything else.
    pub fn parse(text: &str) -> Option<Command> {
        let text = text.trim();

        let done = Regex::new(r"(?i)DONE").expect("done regex is valid");
        if done.is_match(text) {
            return Some(Command::Done);
        }

        let pause = Regex::new(r"(?i)PAUSE").expect("pause regex is valid");
        if pause.is_match(text) {
            return Some(Command::Pause);
        }

        let wait = Regex::new(r"(?i)WAIT\s*(\d+)?").expect("wait regex is valid");
        let click = Regex::new(r"(?i)CLICK\s*\[[@#$%]?(\d+)\]").expect("click regex is valid");
        let type_cmd = Regex::new(r#"(?i)TYPE\s*\[[@#$%]?(\d+)\]\s*["'](.+?)["']"#)
            .expect("type regex is valid");
        let scroll = Regex::new(r"(?i)SCROLL\s+(UP|DOWN)").expect("scroll regex is valid");
        let goto = Regex::new(r#"(?i)GOTO\s*["'](.+?)["']"#).expect("goto regex is valid");

        if let Some(caps) = wait.captures(text) {
            let secs = caps
                .get(1)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(WAIT_DEFAULT_SECS);
            return Some(Command::Wait(secs.min(WAIT_MAX_SECS)));
        }
        if let Some(caps) = click.captures(text) {
            return caps[1].parse().ok().map(Command::Click);
        }
        if let Some(caps) = type_cmd.captures(text) {
            let id = caps[1].parse().ok()?;
            return Some(Command::Type(id, caps[2].to_string()));
        }
        if let Some(caps) = scroll.captures(text) {
            let direction = if caps[1].eq_ignore_ascii_case("UP") {
                ScrollDirection::Up
            } else {
                ScrollDirection::Down
            };
            return Some(Command::Scroll(direction));
        }
        if let Some(caps) = goto.captures(text) {
            return Some(Command::Goto(caps[1].to_string()));
        }

        None
    }
}

/// Outcome of one executed step.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    /// The task signalled completion (DONE).
    pub done: bool,
    /// Human-readable status for this step.
    pub message: String,
}

impl StepOutcome {
    fn pending(message: impl Into<String>) -> Self {
        StepOutcome {
            done: false,
            message: message.into(),
        }
    }
}

/// Executes parsed commands against the browser. Locator and activation
/// failures are reported in the outcome, never raised — the surrounding
/// loop decides what to do with a failed step.
pub struct ActionExecutor {
    browser: Arc<dyn Browser>,
}

impl ActionExecutor {
    pub fn new(browser: Arc<dyn Browser>) -> Self {
        Self { browser }
    }

    /// Parse and execute one model response against the current tag map.
    pub async fn execute(&self, raw: &str, tags: &HashMap<u32, String>) -> StepOutcome {
        let Some(command) = Command::parse(raw) else {
            return StepOutcome::pending(format!("cannot parse action: {raw}"));
        };

        match command {
            Command::Done => StepOutcome {
                done: true,
                message: "task complete".to_string(),
            },
            Command::Pause => self.pause().await,
            Command::Wait(secs) => {
                tokio::time::sleep(Duration::from_secs(secs)).await;
                StepOutcome::pending(format!("waited {secs}s"))
            }
            Command::Click(tag) => self.click(tag, tags).await,
            Command::Type(tag, text) => self.type_text(tag, &text, tags).await,
            Command::Scroll(direction) => self.scroll(direction).await,
            Command::Goto(url) => self.goto(&url).await,
        }
    }

    async fn pause(&self) -> StepOutcome {
        info!("PAUSE requested — complete the manual step in the browser, then press Enter");
        println!("  Manual intervention needed (captcha/login). Press Enter to continue...");
        let mut line = String::new();
        let mut reader = tokio::io::BufReader::new(tokio::io::stdin());
        let _ = reader.read_line(&mut line).await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        StepOutcome::pending("manual step finished, continuing")
    }

    async fn click(&self, tag: u32, tags: &HashMap<u32, String>) -> StepOutcome {
        let Some(xpath) = tags.get(&tag) else {
            return StepOutcome::pending(format!("no element tagged [{tag}]"));
        };
        match self.browser.click(xpath, Duration::from_secs(5)).await {
            Ok(()) => {
                tokio::time::sleep(Duration::from_secs(1)).await;
                StepOutcome::pending(format!("clicked [{tag}]"))
            }
            Err(e) => StepOutcome::pending(format!("click [{tag}] failed: {e:#}")),
        }
    }

    async fn type_text(&self, tag: u32, text: &str, tags: &HashMap<u32, String>) -> StepOutcome {
        let Some(xpath) = tags.get(&tag) else {
            return StepOutcome::pending(format!("no element tagged [{tag}]"));
        };
        match self.browser.fill(xpath, text, Duration::from_secs(5)).await {
            Ok(()) => {
                tokio::time::sleep(Duration::from_millis(500)).await;
                StepOutcome::pending(format!("typed into [{tag}]"))
            }
            Err(e) => StepOutcome::pending(format!("type into [{tag}] failed: {e:#}")),
        }
    }

    async fn scroll(&self, direction: ScrollDirection) -> StepOutcome {
        let dy = match direction {
            ScrollDirection::Up => -500,
            ScrollDirection::Down => 500,
        };
        match self.browser.scroll_by(dy).await {
            Ok(()) => {
                tokio::time::sleep(Duration::from_millis(500)).await;
                StepOutcome::pending(format!(
                    "scrolled {}",
                    if dy < 0 { "up" } else { "down" }
                ))
            }
            Err(e) => StepOutcome::pending(format!("scroll failed: {e:#}")),
        }
    }

    async fn goto(&self, url: &str) -> StepOutcome {
        let url = if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("https://{url}")
        };
        match self.browser.navigate(&url).await {
            Ok(()) => {
                tokio::time::sleep(Duration::from_secs(1)).await;
                StepOutcome::pending(format!("navigated to {url}"))
            }
            Err(e) => StepOutcome::pending(format!("navigation to {url} failed: {e:#}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_click_with_optional_prefix() {
        assert_eq!(Command::parse("CLICK [12]"), Some(Command::Click(12)));
        assert_eq!(Command::parse("click [@3]"), Some(Command::Click(3)));
        assert_eq!(Command::parse("CLICK [$7]"), Some(Command::Click(7)));
    }

    #[test]
    fn test_parse_type_quoted_text() {
        assert_eq!(
            Command::parse(r#"TYPE [#2] "hello world""#),
            Some(Command::Type(2, "hello world".to_string()))
        );
        assert_eq!(
            Command::parse("TYPE [2] 'single'"),
            Some(Command::Type(2, "single".to_string()))
        );
    }

    #[test]
    fn test_parse_wait_default_and_clamp() {
        assert_eq!(Command::parse("WAIT"), Some(Command::Wait(WAIT_DEFAULT_SECS)));
        assert_eq!(Command::parse("WAIT 5"), Some(Command::Wait(5)));
        assert_eq!(Command::parse("WAIT 999"), Some(Command::Wait(WAIT_MAX_SECS)));
    }

    #[test]
    fn test_parse_scroll_and_goto() {
        assert_eq!(
            Command::parse("SCROLL UP"),
            Some(Command::Scroll(ScrollDirection::Up))
        );
        assert_eq!(
            Command::parse(r#"GOTO "https://example.com""#),
            Some(Command::Goto("https://example.com".to_string()))
        );
    }

    #[test]
    fn test_parse_done_wins_anywhere() {
        assert_eq!(
            Command::parse("The task is DONE now"),
            Some(Command::Done)
        );
    }

    #[test]
    fn test_parse_rejects_unknown_text() {
        assert_eq!(Command::parse("I think we should click somewhere"), None);
        assert_eq!(Command::parse(""), None);
    }
}
