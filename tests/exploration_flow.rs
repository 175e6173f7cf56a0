//! End-to-end exploration over a scripted single-page site.
//!
//! The fake site has one nav item ("Reports") and one create button
//! ("New Task") that opens a dialog. The model reports the create button
//! *first* — the engine must still activate the nav item first, because
//! drain order is derived from kind/subtype, not discovery order.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use sitemind::browser::Browser;
use sitemind::config::ExplorationConfig;
use sitemind::explorer::SiteExplorer;
use sitemind::memory::sqlite::SqliteStore;
use sitemind::memory::MemoryStore;
use sitemind::model::{Conversation, ModelClient};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const HOME: &str = "https://demo.test/";
const REPORTS: &str = "https://demo.test/reports";

#[derive(Debug)]
struct SiteState {
    url: String,
    modal_open: bool,
}

struct FakeBrowser {
    state: Arc<Mutex<SiteState>>,
}

#[async_trait]
impl Browser for FakeBrowser {
    async fn navigate(&self, url: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.url = url.to_string();
        state.modal_open = false;
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.state.lock().unwrap().url.clone())
    }

    async fn title(&self) -> Result<String> {
        let state = self.state.lock().unwrap();
        Ok(if state.url == REPORTS {
            "Reports".to_string()
        } else {
            "Demo Home".to_string()
        })
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        Ok(vec![0x89, 0x50, 0x4e, 0x47])
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        let mut state = self.state.lock().unwrap();

        // Tagger collection script
        if script.contains("xpathOf") {
            if state.url == HOME && !state.modal_open {
                return Ok(json!({
                    "elements": "[@1] Reports\n[$2] New Task",
                    "xpaths": { "1": "//a[1]", "2": "//button[1]" }
                }));
            }
            return Ok(json!({ "elements": "", "xpaths": {} }));
        }

        // Tag cleanup
        if script.contains("data-sitemind-tag") {
            return Ok(Value::Bool(true));
        }

        // Modal close buttons (checked before the container probes:
        // ".ant-modal-close" contains ".ant-modal")
        if script.contains("-close") || script.contains("__close") || script.contains("Close") {
            let was_open = state.modal_open;
            state.modal_open = false;
            return Ok(Value::Bool(was_open));
        }

        // Modal container probes
        if script.contains("querySelector") {
            return Ok(Value::Bool(state.modal_open));
        }

        Ok(Value::Bool(false))
    }

    async fn click(&self, xpath: &str, _timeout: Duration) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        match xpath {
            "//a[1]" => {
                state.url = REPORTS.to_string();
                Ok(())
            }
            "//button[1]" => {
                state.modal_open = true;
                Ok(())
            }
            _ => bail!("unknown element: {xpath}"),
        }
    }

    async fn fill(&self, _xpath: &str, _text: &str, _timeout: Duration) -> Result<()> {
        bail!("fill not expected in this scenario")
    }

    async fn is_visible(&self, xpath: &str, _timeout: Duration) -> Result<bool> {
        Ok(matches!(xpath, "//a[1]" | "//button[1]"))
    }

    async fn click_by_text(&self, text: &str, _timeout: Duration) -> Result<()> {
        bail!("text lookup not expected: {text}")
    }

    async fn scroll_by(&self, _dy: i64) -> Result<()> {
        Ok(())
    }

    async fn press_escape(&self) -> Result<()> {
        self.state.lock().unwrap().modal_open = false;
        Ok(())
    }
}

struct FakeModel {
    state: Arc<Mutex<SiteState>>,
}

#[async_trait]
impl ModelClient for FakeModel {
    async fn vision(&self, _screenshot: &[u8], prompt: &str) -> Result<String> {
        let (url, modal) = {
            let state = self.state.lock().unwrap();
            (state.url.clone(), state.modal_open)
        };

        // Element classification pass
        if prompt.contains("tag_id") {
            if url == HOME && !modal {
                // Deliberately lists the CRUD button before the nav item.
                return Ok(json!({
                    "elements": [
                        {
                            "tag_id": 2,
                            "semantic_name": "New Task",
                            "element_type": "button",
                            "text_or_hint": "New Task",
                            "importance": 8,
                            "explore_priority": 9,
                            "is_nav_menu": false,
                            "is_crud_action": true,
                            "crud_type": "create",
                            "action_suggestion": "open the task creation dialog"
                        },
                        {
                            "tag_id": 1,
                            "semantic_name": "Reports",
                            "element_type": "nav_item",
                            "text_or_hint": "Reports",
                            "importance": 9,
                            "explore_priority": 9,
                            "is_nav_menu": true,
                            "is_crud_action": false,
                            "crud_type": "none",
                            "action_suggestion": "open the reports page"
                        }
                    ]
                })
                .to_string());
            }
            return Ok(json!({ "elements": [] }).to_string());
        }

        // Page classification pass
        let (page_type, description) = if modal {
            ("form", "task creation dialog")
        } else if url == REPORTS {
            ("list", "list of generated reports")
        } else {
            ("home", "demo dashboard home")
        };
        Ok(json!({
            "page_type": page_type,
            "page_description": description,
            "key_features": ["sidebar"],
            "has_sidebar_nav": true,
            "sidebar_nav_items": ["Reports"]
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
        bail!("next_action not expected during exploration")
    }

    async fn complete(&self, _prompt: &str) -> Result<String> {
        bail!("complete not expected during exploration")
    }
}

fn exploration_config(dir: &std::path::Path) -> ExplorationConfig {
    ExplorationConfig {
        max_pages: 10,
        max_depth: 5,
        max_actions_per_page: 10,
        screenshot_dir: dir.to_path_buf(),
    }
}

#[tokio::test(start_paused = true)]
async fn test_single_page_site_exploration() {
    let shots = tempfile::tempdir().unwrap();
    let state = Arc::new(Mutex::new(SiteState {
        url: "about:blank".to_string(),
        modal_open: false,
    }));

    let store: Arc<dyn MemoryStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
    let browser = Arc::new(FakeBrowser {
        state: Arc::clone(&state),
    });
    let model = Arc::new(FakeModel {
        state: Arc::clone(&state),
    });

    let mut explorer = SiteExplorer::new(
        exploration_config(shots.path()),
        Arc::clone(&store),
        browser,
        model,
        CancellationToken::new(),
    );

    let report = explorer.explore_site(HOME, "Demo").await.unwrap();

    assert_eq!(explorer.phase(), sitemind::explorer::Phase::Done);

    // Both affordances were activated exactly once.
    assert_eq!(report.items_explored, 2);
    // Home + reports page URLs were visited.
    assert_eq!(report.pages_visited, 2);

    let site_id = report.site.id.unwrap();
    let pages = store.get_pages_by_site(site_id).await.unwrap();

    // Start page, reports page, and the dialog pseudo-page.
    assert_eq!(pages.len(), 3);
    let modal_pages: Vec<_> = pages
        .iter()
        .filter(|p| p.url_pattern.ends_with("#modal"))
        .collect();
    assert_eq!(modal_pages.len(), 1);
    assert_eq!(modal_pages[0].semantic_description, "task creation dialog");

    // Drain order: the nav item ran before the create button, even
    // though the model reported the create button first. Action rows
    // are inserted in drain order, so ids are ordered accordingly.
    let home_page = pages
        .iter()
        .find(|p| p.page_type == sitemind::memory::PageType::Home)
        .expect("home page row");
    let mut actions = store
        .get_actions_from_page(home_page.id.unwrap())
        .await
        .unwrap();
    actions.sort_by_key(|a| a.id);
    assert_eq!(actions.len(), 2);
    assert!(actions[0].notes.contains("Reports"));
    assert!(actions[1].notes.contains("New Task"));
    assert!(actions[1].notes.contains("create"));

    // Elements persisted for both passes over the home page (the home
    // page is only collected once, so exactly two rows exist).
    let elements = store
        .get_elements_by_page(home_page.id.unwrap())
        .await
        .unwrap();
    assert_eq!(elements.len(), 2);

    // The dialog was dismissed before the drain loop continued.
    assert!(!state.lock().unwrap().modal_open);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_stops_at_step_boundary() {
    let shots = tempfile::tempdir().unwrap();
    let state = Arc::new(Mutex::new(SiteState {
        url: "about:blank".to_string(),
        modal_open: false,
    }));

    let store: Arc<dyn MemoryStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
    let cancel = CancellationToken::new();
    cancel.cancel(); // cancelled before the drain loop starts

    let mut explorer = SiteExplorer::new(
        exploration_config(shots.path()),
        Arc::clone(&store),
        Arc::new(FakeBrowser {
            state: Arc::clone(&state),
        }),
        Arc::new(FakeModel {
            state: Arc::clone(&state),
        }),
        cancel,
    );

    let report = explorer.explore_site(HOME, "Demo").await.unwrap();

    // Collection ran (start page analyzed), but nothing was activated.
    assert_eq!(report.items_explored, 0);
    let pages = store
        .get_pages_by_site(report.site.id.unwrap())
        .await
        .unwrap();
    assert_eq!(pages.len(), 1);
}
