//! Breadth-first site exploration.
//!
//! The engine walks three phases: `Collecting` analyzes the current page
//! and queues candidate affordances, `Exploring` drains the queue in
//! derived-rank order (navigation before CRUD, safe CRUD before
//! destructive), and `Done` is reached when the queue empties or the item
//! budget runs out. Everything learned lands in the memory store.

pub mod analyzer;

use crate::browser::Browser;
use crate::config::ExplorationConfig;
use crate::memory::{
    ActionRecord, ActionType, CrudKind, Element, ExplorationLog, MemoryStore, Page, Site,
};
use crate::model::ModelClient;
use crate::tagger::Tagger;
use analyzer::{PageAnalyzer, PageInsight};
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;

/// Common dialog container conventions, probed after every activation.
const MODAL_SELECTORS: &[&str] = &[
    ".ant-modal",
    ".el-dialog",
    ".modal",
    "[role='dialog']",
    ".t-dialog",
    ".arco-modal",
];

/// Common close-button conventions, tried before sending Escape.
const MODAL_CLOSE_SELECTORS: &[&str] = &[
    ".ant-modal-close",
    ".el-dialog__close",
    ".modal-close",
    "[aria-label='Close']",
    ".t-dialog__close",
];

/// Exploration phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Collecting,
    Exploring,
    Done,
}

/// Affordance category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Nav,
    Crud,
    Action,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Nav => "nav",
            ItemKind::Crud => "crud",
            ItemKind::Action => "action",
        }
    }
}

/// A discovered affordance waiting to be activated.
#[derive(Debug, Clone)]
pub struct PendingItem {
    pub name: String,
    /// Opaque locator from the tagger (XPath).
    pub locator: String,
    /// Raw priority reported by the model.
    pub priority: i64,
    pub element_id: Option<i64>,
    pub source_page_id: i64,
    pub source_url: String,
    pub kind: ItemKind,
    pub crud: CrudKind,
    /// Display text, used for the text-lookup activation fallback.
    pub text: String,
}

impl PendingItem {
    /// Derived drain rank. Navigation outranks everything; among the
    /// rest, create > read/update > delete > raw priority. Structure is
    /// discovered before side effects, reversible CRUD before
    /// destructive.
    pub fn rank(&self) -> i64 {
        if self.kind == ItemKind::Nav {
            return 10;
        }
        match self.crud {
            CrudKind::Create => 9,
            CrudKind::Read | CrudKind::Update => 8,
            CrudKind::Delete => 7,
            CrudKind::None => self.priority,
        }
    }
}

/// Re-sort the queue by derived rank, descending. Stable: equal ranks
/// keep insertion order.
pub fn sort_pending(items: &mut [PendingItem]) {
    items.sort_by(|a, b| b.rank().cmp(&a.rank()));
}

/// Normalize a URL for visited-set membership: scheme + host + path,
/// query stripped. The fragment is kept (minus any embedded query) so
/// single-page-app routes stay distinct.
pub fn normalize_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(u) => {
            let mut base = format!("{}://{}", u.scheme(), u.host_str().unwrap_or_default());
            if let Some(port) = u.port() {
                base.push_str(&format!(":{port}"));
            }
            base.push_str(u.path());
            if let Some(fragment) = u.fragment() {
                if !fragment.is_empty() {
                    base.push('#');
                    base.push_str(fragment.split('?').next().unwrap_or(""));
                }
            }
            base
        }
        Err(_) => url.split('?').next().unwrap_or(url).to_string(),
    }
}

/// Summary of one exploration run.
#[derive(Debug, Clone)]
pub struct ExplorationReport {
    pub site: Site,
    pub pages_visited: usize,
    pub items_explored: usize,
    pub session_id: String,
}

/// The exploration engine.
pub struct SiteExplorer {
    exploration: ExplorationConfig,
    store: Arc<dyn MemoryStore>,
    browser: Arc<dyn Browser>,
    tagger: Tagger,
    analyzer: PageAnalyzer,
    session_id: String,
    site: Option<Site>,
    visited_urls: HashSet<String>,
    visited_items: HashSet<(i64, String)>,
    pending: Vec<PendingItem>,
    phase: Phase,
    cancel: CancellationToken,
}

impl SiteExplorer {
    pub fn new(
        exploration: ExplorationConfig,
        store: Arc<dyn MemoryStore>,
        browser: Arc<dyn Browser>,
        model: Arc<dyn ModelClient>,
        cancel: CancellationToken,
    ) -> Self {
        let session_id = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();
        Self {
            exploration,
            store,
            browser,
            tagger: Tagger::new(),
            analyzer: PageAnalyzer::new(model),
            session_id,
            site: None,
            visited_urls: HashSet::new(),
            visited_items: HashSet::new(),
            pending: Vec::new(),
            phase: Phase::Collecting,
            cancel,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn site_id(&self) -> i64 {
        self.site.as_ref().and_then(|s| s.id).unwrap_or_default()
    }

    /// Explore the site behind `start_url` breadth-first: navigation
    /// structure first, then in-page CRUD affordances.
    pub async fn explore_site(
        &mut self,
        start_url: &str,
        site_name: &str,
    ) -> Result<ExplorationReport> {
        let domain = Url::parse(start_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| start_url.to_string());

        let site = self
            .store
            .get_or_create_site(&domain, site_name, "")
            .await
            .context("creating site record")?;
        info!(domain, session = %self.session_id, "exploration started");
        println!("Exploring {domain} (session {})", self.session_id);
        self.site = Some(site.clone());

        std::fs::create_dir_all(&self.exploration.screenshot_dir).ok();

        self.browser.navigate(start_url).await?;
        settle().await;

        // Phase 1: analyze the start page, queue its affordances.
        self.phase = Phase::Collecting;
        println!("Phase 1: analyzing page structure...");
        let (page, insight) = self.analyze_and_store_page(false).await?;
        let queued = self.collect_items(&page, &insight, false).await?;
        println!("  {queued} affordances queued");

        // Phase 2: drain the queue.
        self.phase = Phase::Exploring;
        println!("Phase 2: exploring {} queued items...", self.pending.len());
        self.drain().await?;

        self.phase = Phase::Done;
        let report = ExplorationReport {
            site,
            pages_visited: self.visited_urls.len(),
            items_explored: self.visited_items.len(),
            session_id: self.session_id.clone(),
        };
        info!(
            pages = report.pages_visited,
            items = report.items_explored,
            "exploration finished"
        );
        println!(
            "Exploration complete: {} pages, {} items",
            report.pages_visited, report.items_explored
        );
        Ok(report)
    }

    /// Analyze the current browser page, persist (or refresh) its Page
    /// row, write the screenshot, and return the row with the insight.
    async fn analyze_and_store_page(&mut self, modal: bool) -> Result<(Page, PageInsight)> {
        let current_url = self.browser.current_url().await.unwrap_or_default();
        let url_key = normalize_url(&current_url);
        self.visited_urls.insert(url_key.clone());

        let screenshot = self.browser.screenshot().await.context("page screenshot")?;
        let insight = self.analyzer.analyze_page(&screenshot).await;
        let title = self.browser.title().await.unwrap_or_default();

        println!(
            "  [{}] {}",
            insight.page_type.as_str(),
            truncate(&insight.description, 70)
        );
        if insight.has_nav_menu && !insight.nav_items.is_empty() {
            println!("  nav menu: {}", insight.nav_items.join(", "));
        }

        let pattern = if modal {
            format!("{url_key}#modal")
        } else {
            url_key
        };

        // Revisits refresh the existing row instead of inserting a twin.
        // Candidates are split on the #modal marker first: a dialog row
        // must never resolve against its base page (they share a path).
        let candidates: Vec<Page> = self
            .store
            .get_pages_by_site(self.site_id())
            .await?
            .into_iter()
            .filter(|p| p.url_pattern.ends_with("#modal") == modal)
            .collect();
        let existing = crate::memory::store::match_similar_page(&candidates, &pattern, &title)
            .cloned();

        let page = match existing {
            Some(mut page) => {
                page.visit_count += 1;
                page.title_pattern = title;
                page.page_type = insight.page_type;
                page.semantic_description = insight.description.clone();
                page.key_features =
                    serde_json::to_string(&insight.key_features).unwrap_or_else(|_| "[]".into());
                page.sample_url = current_url.clone();
                self.store.save_page(page).await?
            }
            None => {
                let mut page = Page::new(self.site_id(), pattern);
                page.title_pattern = title;
                page.page_type = insight.page_type;
                page.semantic_description = insight.description.clone();
                page.key_features =
                    serde_json::to_string(&insight.key_features).unwrap_or_else(|_| "[]".into());
                page.sample_url = current_url.clone();
                page.visit_count = 1;
                self.store.save_page(page).await?
            }
        };

        self.write_screenshot(&page, &screenshot);
        Ok((page, insight))
    }

    fn write_screenshot(&self, page: &Page, screenshot: &[u8]) {
        let path = self.exploration.screenshot_dir.join(format!(
            "{}_{}.png",
            self.session_id,
            page.id.unwrap_or_default()
        ));
        if let Err(e) = std::fs::write(&path, screenshot) {
            warn!("failed to write screenshot {}: {e}", path.display());
        }
    }

    fn screenshot_path(&self, page: &Page) -> String {
        self.exploration
            .screenshot_dir
            .join(format!(
                "{}_{}.png",
                self.session_id,
                page.id.unwrap_or_default()
            ))
            .display()
            .to_string()
    }

    /// Run the collection rule against the current page: persist every
    /// analyzable element and promote the qualifying ones into the
    /// pending queue. Returns how many items were queued.
    ///
    /// `check_pending` additionally rejects items already queued for the
    /// same page (used on post-activation passes, where the same page may
    /// be analyzed more than once per run).
    async fn collect_items(
        &mut self,
        page: &Page,
        insight: &PageInsight,
        check_pending: bool,
    ) -> Result<usize> {
        let page_id = page.id.unwrap_or_default();
        let tagged = match self.tagger.tag_page(self.browser.as_ref()).await {
            Ok(t) => t,
            Err(e) => {
                warn!("tagging failed, skipping element collection: {e:#}");
                return Ok(0);
            }
        };

        let insights = self
            .analyzer
            .analyze_elements(&tagged.screenshot, &insight.description)
            .await;

        let source_url = self.browser.current_url().await.unwrap_or_default();
        let mut queued = 0usize;

        for elem in &insights {
            let locator = tagged.tags.get(&elem.tag_id).cloned();

            let mut record = Element::new(page_id, elem.semantic_name.clone());
            record.element_type = elem.element_type;
            record.semantic_description = elem.suggestion.clone();
            record.text_content = elem.text.clone();
            record.importance = elem.importance;
            record.locator_hint = locator.clone().unwrap_or_default();
            let record = self.store.save_element(record).await?;

            let key = (page_id, elem.semantic_name.clone());
            let qualifies = (elem.is_nav || elem.is_crud || elem.priority >= 7)
                && locator.is_some()
                && !self.visited_items.contains(&key);
            let already_pending = check_pending
                && self
                    .pending
                    .iter()
                    .any(|p| p.name == elem.semantic_name && p.source_page_id == page_id);

            if qualifies && !already_pending {
                let kind = if elem.is_crud {
                    ItemKind::Crud
                } else if elem.is_nav {
                    ItemKind::Nav
                } else {
                    ItemKind::Action
                };
                self.pending.push(PendingItem {
                    name: elem.semantic_name.clone(),
                    locator: locator.unwrap_or_default(),
                    priority: elem.priority,
                    element_id: record.id,
                    source_page_id: page_id,
                    source_url: source_url.clone(),
                    kind,
                    crud: elem.crud,
                    text: elem.text.clone(),
                });
                queued += 1;
            }
        }

        if queued > 0 {
            sort_pending(&mut self.pending);
        }
        self.tagger.clear_tags(self.browser.as_ref()).await;
        Ok(queued)
    }

    /// Drain the pending queue in rank order until it empties, the item
    /// budget is exhausted, or cancellation is requested.
    async fn drain(&mut self) -> Result<()> {
        let max_items = self.exploration.max_pages * 3;
        let mut explored = 0usize;

        while explored < max_items {
            if self.cancel.is_cancelled() {
                info!("exploration cancelled");
                println!("Cancelled; stopping at the step boundary.");
                break;
            }
            if self.pending.is_empty() {
                break;
            }
            let item = self.pending.remove(0);

            let key = (item.source_page_id, item.name.clone());
            if self.visited_items.contains(&key) {
                continue;
            }
            self.visited_items.insert(key);
            explored += 1;

            println!(
                "[{explored}/{max_items}] {} {} ({})",
                item.kind.as_str(),
                item.name,
                item.crud.as_str()
            );

            self.ensure_on_source_page(&item).await;

            if self.activate_item(&item).await {
                settle().await;
                self.analyze_after_activation(&item).await?;
            }
        }
        Ok(())
    }

    /// Navigate back to the item's source page when the session drifted.
    async fn ensure_on_source_page(&self, item: &PendingItem) {
        if item.source_url.is_empty() {
            return;
        }
        let current = self.browser.current_url().await.unwrap_or_default();
        if normalize_url(&current) != normalize_url(&item.source_url) {
            println!("  returning to {}", truncate(&item.source_url, 60));
            if let Err(e) = self.browser.navigate(&item.source_url).await {
                warn!("return navigation failed: {e:#}");
                return;
            }
            settle().await;
        }
    }

    /// Activate an item via its locator, falling back to a text lookup
    /// when the locator is no longer visible. Failure is non-fatal.
    async fn activate_item(&self, item: &PendingItem) -> bool {
        self.tagger.clear_tags(self.browser.as_ref()).await;

        let visible = self
            .browser
            .is_visible(&item.locator, Duration::from_secs(3))
            .await
            .unwrap_or(false);

        let result = if visible {
            self.browser.click(&item.locator, Duration::from_secs(5)).await
        } else {
            let text = if item.text.is_empty() {
                &item.name
            } else {
                &item.text
            };
            println!("  locator stale, retrying by text: {text}");
            self.browser.click_by_text(text, Duration::from_secs(5)).await
        };

        match result {
            Ok(()) => {
                println!("  activated");
                true
            }
            Err(e) => {
                println!("  activation failed: {e:#}");
                false
            }
        }
    }

    /// Post-activation analysis: detect a modal, persist the resulting
    /// page, the action edge, and the log entry; collect further items
    /// from new pages/modals; dismiss any modal before continuing.
    async fn analyze_after_activation(&mut self, item: &PendingItem) -> Result<()> {
        let current_url = self.browser.current_url().await.unwrap_or_default();
        let url_key = normalize_url(&current_url);

        let has_modal = self.detect_modal().await;
        let is_new_page = !self.visited_urls.contains(&url_key);

        println!(
            "  result: {} {}",
            if has_modal { "modal on" } else { "page" },
            truncate(&current_url, 60)
        );

        let (page, insight) = self.analyze_and_store_page(has_modal).await?;

        let mut action = ActionRecord::new(self.site_id(), item.source_page_id);
        action.element_id = item.element_id;
        action.action_type = ActionType::Click;
        action.target_page_id = page.id;
        action.notes = format!(
            "{}: {} ({})",
            item.kind.as_str().to_uppercase(),
            item.name,
            item.crud.as_str()
        );
        self.store.save_action(action).await?;

        let mut log = ExplorationLog::new(self.site_id(), self.session_id.clone());
        log.page_id = page.id;
        log.action_taken = format!("{}: {}", item.kind.as_str().to_uppercase(), item.name);
        log.result = format!(
            "{}: {}",
            if has_modal { "modal" } else { "page" },
            page.title_pattern
        );
        log.screenshot_path = self.screenshot_path(&page);
        self.store.save_exploration_log(log).await?;

        if is_new_page || has_modal {
            let queued = self.collect_items(&page, &insight, true).await?;
            if queued > 0 {
                println!("  {queued} new affordances queued");
            }
        }

        if has_modal {
            self.dismiss_modal().await;
        }
        Ok(())
    }

    /// Probe the fixed list of dialog container conventions. Each probe
    /// is individually time-bounded.
    async fn detect_modal(&self) -> bool {
        for selector in MODAL_SELECTORS {
            let script = format!(
                r#"(() => {{
                    const el = document.querySelector("{selector}");
                    if (!el) return false;
                    const style = window.getComputedStyle(el);
                    if (style.display === 'none' || style.visibility === 'hidden') return false;
                    return el.getBoundingClientRect().width > 0;
                }})()"#
            );
            let probe = tokio::time::timeout(
                Duration::from_secs(1),
                self.browser.evaluate(&script),
            )
            .await;
            if let Ok(Ok(value)) = probe {
                if value.as_bool().unwrap_or(false) {
                    return true;
                }
            }
        }
        false
    }

    /// Close an open dialog: known close buttons, then Cancel/Close text
    /// buttons, then an Escape signal.
    async fn dismiss_modal(&self) {
        for selector in MODAL_CLOSE_SELECTORS {
            let script = format!(
                r#"(() => {{
                    const el = document.querySelector("{selector}");
                    if (!el) return false;
                    el.click();
                    return true;
                }})()"#
            );
            let probe = tokio::time::timeout(
                Duration::from_secs(1),
                self.browser.evaluate(&script),
            )
            .await;
            if let Ok(Ok(value)) = probe {
                if value.as_bool().unwrap_or(false) {
                    println!("  modal dismissed");
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    return;
                }
            }
        }

        for label in ["Cancel", "Close"] {
            if self
                .browser
                .click_by_text(label, Duration::from_secs(1))
                .await
                .is_ok()
            {
                println!("  modal dismissed via {label}");
                tokio::time::sleep(Duration::from_millis(500)).await;
                return;
            }
        }

        if self.browser.press_escape().await.is_ok() {
            println!("  modal dismissed via Escape");
        }
    }
}

/// Let the page settle after navigation or activation.
async fn settle() {
    tokio::time::sleep(Duration::from_secs(2)).await;
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
