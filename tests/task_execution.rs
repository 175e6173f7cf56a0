//! Task executor loop behavior: plan selection policy, the all-or-nothing
//! fallback from planned to live execution, and recipe recording.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use sitemind::agent::{TaskOutcome, WebAgent};
use sitemind::browser::Browser;
use sitemind::config::{
    BrowserConfig, Config, ExplorationConfig, LlmConfig, StoreBackend, StoreConfig,
};
use sitemind::memory::sqlite::SqliteStore;
use sitemind::memory::MemoryStore;
use sitemind::model::{Conversation, ModelClient};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const HOME: &str = "https://demo.test/";

/// A static one-button page.
struct StaticBrowser;

#[async_trait]
impl Browser for StaticBrowser {
    async fn navigate(&self, _url: &str) -> Result<()> {
        Ok(())
    }
    async fn current_url(&self) -> Result<String> {
        Ok(HOME.to_string())
    }
    async fn title(&self) -> Result<String> {
        Ok("Demo Home".to_string())
    }
    async fn screenshot(&self) -> Result<Vec<u8>> {
        Ok(vec![1, 2, 3])
    }
    async fn evaluate(&self, script: &str) -> Result<Value> {
        if script.contains("xpathOf") {
            return Ok(json!({
                "elements": "[@1] Reports",
                "xpaths": { "1": "//a[1]" }
            }));
        }
        Ok(Value::Bool(false))
    }
    async fn click(&self, _xpath: &str, _timeout: Duration) -> Result<()> {
        Ok(())
    }
    async fn fill(&self, _xpath: &str, _text: &str, _timeout: Duration) -> Result<()> {
        Ok(())
    }
    async fn is_visible(&self, _xpath: &str, _timeout: Duration) -> Result<bool> {
        Ok(true)
    }
    async fn click_by_text(&self, _text: &str, _timeout: Duration) -> Result<()> {
        Ok(())
    }
    async fn scroll_by(&self, _dy: i64) -> Result<()> {
        Ok(())
    }
    async fn press_escape(&self) -> Result<()> {
        Ok(())
    }
}

/// Scripted model: planner confidence and step-resolution response are
/// fixed per test; live mode always answers DONE.
struct ScriptedModel {
    confidence: f64,
    resolve_with: &'static str,
    live_with: &'static str,
    resolve_calls: AtomicUsize,
    live_calls: AtomicUsize,
}

impl ScriptedModel {
    fn new(confidence: f64, resolve_with: &'static str) -> Self {
        Self {
            confidence,
            resolve_with,
            live_with: "DONE",
            resolve_calls: AtomicUsize::new(0),
            live_calls: AtomicUsize::new(0),
        }
    }

    fn with_live_response(mut self, live_with: &'static str) -> Self {
        self.live_with = live_with;
        self
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn vision(&self, _screenshot: &[u8], _prompt: &str) -> Result<String> {
        Ok(json!({
            "page_type": "home",
            "page_description": "demo dashboard home",
            "key_features": [],
            "has_sidebar_nav": false,
            "sidebar_nav_items": []
        })
        .to_string())
    }

    async fn next_action(
        &self,
        _conversation: &mut Conversation,
        _screenshot: &[u8],
        _page_text: &str,
        _instruction: &str,
        _current_url: &str,
    ) -> Result<String> {
        self.live_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.live_with.to_string())
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        if prompt.contains("can_plan") {
            // Planner prompt
            return Ok(json!({
                "can_plan": true,
                "confidence": self.confidence,
                "plan": [{
                    "step": 1,
                    "action_type": "click",
                    "target_description": "Reports link",
                    "action_detail": "open the reports page",
                    "expected_result": "report list visible"
                }],
                "unknown_steps": []
            })
            .to_string());
        }
        // Planned-step resolution prompt
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.resolve_with.to_string())
    }
}

fn test_config() -> Config {
    Config {
        llm: LlmConfig {
            api_base: "http://unused".to_string(),
            api_key: String::new(),
            model: "test".to_string(),
        },
        browser: BrowserConfig {
            headless: true,
            width: 1280,
            height: 800,
            chromium_path: None,
        },
        store: StoreConfig {
            backend: StoreBackend::Sqlite,
            path: std::path::PathBuf::from(":memory:"),
            url: String::new(),
        },
        exploration: ExplorationConfig {
            max_pages: 10,
            max_depth: 5,
            max_actions_per_page: 10,
            screenshot_dir: std::env::temp_dir(),
        },
    }
}

async fn agent_with(model: Arc<ScriptedModel>) -> (WebAgent, Arc<dyn MemoryStore>) {
    let store: Arc<dyn MemoryStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
    let agent = WebAgent::new(
        test_config(),
        Arc::new(StaticBrowser),
        model,
        Some(Arc::clone(&store)),
        CancellationToken::new(),
    );
    (agent, store)
}

#[tokio::test(start_paused = true)]
async fn test_unresolved_step_falls_back_to_live_for_whole_task() {
    let model = Arc::new(ScriptedModel::new(0.9, "FAIL"));
    let (mut agent, store) = agent_with(Arc::clone(&model)).await;

    agent.goto(HOME).await.unwrap();
    let outcome = agent.execute_task("open the reports page").await.unwrap();

    // The plan was attempted once, failed to resolve, and the rest of
    // the task ran live.
    assert_eq!(model.resolve_calls.load(Ordering::SeqCst), 1);
    assert_eq!(model.live_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        outcome,
        TaskOutcome::Completed {
            steps: 1,
            planned: false
        }
    );

    // The successful live run was recorded as a recipe in history form.
    let site = store.get_site_by_domain("demo.test").await.unwrap().unwrap();
    let paths = store
        .get_task_paths_by_site(site.id.unwrap())
        .await
        .unwrap();
    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].success_count, 1);
    let sequence = paths[0].decode_sequence();
    assert_eq!(sequence.len(), 1);
    assert!(sequence[0].get("result").is_some());
}

#[tokio::test(start_paused = true)]
async fn test_low_confidence_plan_is_not_selected() {
    // 0.55 < 0.6: planned execution must not be attempted at all.
    let model = Arc::new(ScriptedModel::new(0.55, "DONE"));
    let (mut agent, _store) = agent_with(Arc::clone(&model)).await;

    agent.goto(HOME).await.unwrap();
    let outcome = agent.execute_task("open the reports page").await.unwrap();

    assert_eq!(model.resolve_calls.load(Ordering::SeqCst), 0);
    assert_eq!(model.live_calls.load(Ordering::SeqCst), 1);
    assert!(matches!(
        outcome,
        TaskOutcome::Completed { planned: false, .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_confident_plan_runs_and_records_recipe() {
    // 0.61 > 0.6: planned execution is selected; the resolved step says
    // DONE so the plan itself is recorded as the recipe.
    let model = Arc::new(ScriptedModel::new(0.61, "DONE"));
    let (mut agent, store) = agent_with(Arc::clone(&model)).await;

    agent.goto(HOME).await.unwrap();
    let outcome = agent.execute_task("open the reports page").await.unwrap();

    assert_eq!(model.resolve_calls.load(Ordering::SeqCst), 1);
    assert_eq!(model.live_calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        outcome,
        TaskOutcome::Completed {
            steps: 1,
            planned: true
        }
    );

    let site = store.get_site_by_domain("demo.test").await.unwrap().unwrap();
    let paths = store
        .get_task_paths_by_site(site.id.unwrap())
        .await
        .unwrap();
    assert_eq!(paths.len(), 1);
    // Plan-step form: entries carry target_description.
    let sequence = paths[0].decode_sequence();
    assert!(sequence[0].get("target_description").is_some());
}

#[tokio::test(start_paused = true)]
async fn test_live_execution_step_cap_is_an_outcome_not_an_error() {
    // The model keeps clicking and never says DONE: the loop must end
    // with an explicit max-steps outcome and no recorded recipe.
    let model = Arc::new(ScriptedModel::new(0.0, "FAIL").with_live_response("CLICK [1]"));
    let (mut agent, store) = agent_with(Arc::clone(&model)).await;

    agent.goto(HOME).await.unwrap();
    let outcome = agent.execute_task("loop forever").await.unwrap();

    assert_eq!(outcome, TaskOutcome::MaxStepsReached { steps: 20 });
    assert_eq!(model.live_calls.load(Ordering::SeqCst), 20);

    let site = store.get_site_by_domain("demo.test").await.unwrap().unwrap();
    let paths = store
        .get_task_paths_by_site(site.id.unwrap())
        .await
        .unwrap();
    assert!(paths.is_empty());
}
