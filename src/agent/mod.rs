//! The task executor loop.
//!
//! Two execution modes per task: *planned* (replay a memory-derived
//! plan step by step) and *live* (ask the model for one action at a
//! time). A plan is all-or-nothing — the first step the model cannot
//! resolve onto a concrete element sends the remainder of the task to
//! live execution.

use crate::browser::Browser;
use crate::config::Config;
use crate::executor::ActionExecutor;
use crate::explorer::analyzer::PageAnalyzer;
use crate::explorer::{ExplorationReport, SiteExplorer};
use crate::memory::{MemoryStore, Page, Site, TaskPath};
use crate::model::{Conversation, ModelClient};
use crate::planner::{MemoryPlanner, Plan};
use crate::tagger::Tagger;
use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;

/// A plan is used only above this confidence (strictly greater).
pub const PLAN_CONFIDENCE_FLOOR: f64 = 0.6;

/// Step cap for live execution.
pub const MAX_LIVE_STEPS: usize = 20;

/// Selection policy for planned execution. Lives here, not in the
/// planner: the planner reports, the executor decides.
pub fn plan_is_usable(plan: &Plan) -> bool {
    plan.can_plan && plan.confidence > PLAN_CONFIDENCE_FLOOR
}

/// Terminal state of one task.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    /// The task signalled DONE after `steps` steps.
    Completed { steps: usize, planned: bool },
    /// Every planned step ran but none signalled DONE.
    PlanExhausted { steps: usize },
    /// Live execution hit the step cap without completing.
    MaxStepsReached { steps: usize },
    /// Cancellation was requested between steps.
    Cancelled { steps: usize },
}

impl std::fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskOutcome::Completed { steps, planned: true } => {
                write!(f, "task completed in {steps} steps (from memory)")
            }
            TaskOutcome::Completed { steps, planned: false } => {
                write!(f, "task completed in {steps} steps")
            }
            TaskOutcome::PlanExhausted { steps } => {
                write!(f, "executed all {steps} planned steps")
            }
            TaskOutcome::MaxStepsReached { steps } => {
                write!(f, "max steps reached ({steps}), task not completed")
            }
            TaskOutcome::Cancelled { steps } => {
                write!(f, "cancelled after {steps} steps")
            }
        }
    }
}

/// One executed step, recorded into live-execution history.
#[derive(Debug, Clone, Serialize)]
struct StepRecord {
    step: usize,
    url: String,
    action: String,
    result: String,
}

/// Memory overview for the `memory` command.
#[derive(Debug, Clone)]
pub struct MemoryStats {
    pub domain: String,
    pub pages: Vec<Page>,
    pub task_paths: Vec<TaskPath>,
}

/// The web agent: one browser, one model client, one optional memory
/// store, driven by exactly one task at a time.
pub struct WebAgent {
    config: Config,
    browser: Arc<dyn Browser>,
    model: Arc<dyn ModelClient>,
    tagger: Tagger,
    executor: ActionExecutor,
    analyzer: PageAnalyzer,
    store: Option<Arc<dyn MemoryStore>>,
    planner: Option<MemoryPlanner>,
    site: Option<Site>,
    cancel: CancellationToken,
}

impl WebAgent {
    /// Build an agent. Passing no store disables memory: exploration is
    /// unavailable and every task runs live.
    pub fn new(
        config: Config,
        browser: Arc<dyn Browser>,
        model: Arc<dyn ModelClient>,
        store: Option<Arc<dyn MemoryStore>>,
        cancel: CancellationToken,
    ) -> Self {
        let planner = store
            .as_ref()
            .map(|s| MemoryPlanner::new(Arc::clone(&model), Arc::clone(s)));
        Self {
            config,
            executor: ActionExecutor::new(Arc::clone(&browser)),
            analyzer: PageAnalyzer::new(Arc::clone(&model)),
            browser,
            model,
            tagger: Tagger::new(),
            store,
            planner,
            site: None,
            cancel,
        }
    }

    pub fn browser(&self) -> &Arc<dyn Browser> {
        &self.browser
    }

    pub fn current_site(&self) -> Option<&Site> {
        self.site.as_ref()
    }

    /// Navigate and switch the current site to the URL's domain.
    pub async fn goto(&mut self, url: &str) -> Result<()> {
        self.browser.navigate(url).await?;

        if let Some(store) = &self.store {
            if let Some(domain) = Url::parse(url)
                .ok()
                .and_then(|u| u.host_str().map(str::to_string))
            {
                self.site = Some(store.get_or_create_site(&domain, "", "").await?);
            }
        }
        println!("navigated to {url}");
        Ok(())
    }

    /// Explore a site and learn its structure. Requires memory.
    pub async fn explore(&mut self, url: &str, site_name: &str) -> Result<ExplorationReport> {
        let store = self
            .store
            .as_ref()
            .context("exploration requires the memory store")?;

        let mut explorer = SiteExplorer::new(
            self.config.exploration.clone(),
            Arc::clone(store),
            Arc::clone(&self.browser),
            Arc::clone(&self.model),
            self.cancel.clone(),
        );
        let report = explorer.explore_site(url, site_name).await?;
        self.site = Some(report.site.clone());
        Ok(report)
    }

    /// Execute a natural-language task, preferring memory when it is
    /// confident enough.
    pub async fn execute_task(&self, instruction: &str) -> Result<TaskOutcome> {
        let mut conversation = Conversation::new();

        if let (Some(site), Some(planner)) = (self.site.as_ref(), self.planner.as_ref()) {
            println!("consulting memory...");
            let screenshot = self.browser.screenshot().await?;
            let page_info = self.analyzer.analyze_page(&screenshot).await;
            let current_url = self.browser.current_url().await.unwrap_or_default();

            let plan = planner
                .plan_task(site, instruction, &current_url, &page_info.description)
                .await;

            if plan_is_usable(&plan) {
                println!(
                    "memory match, confidence {:.0}%:",
                    plan.confidence * 100.0
                );
                for step in &plan.steps {
                    println!("  {}. {}", step.step, step.action_detail);
                }
                return self.run_planned(plan, instruction, &mut conversation).await;
            }

            println!("memory insufficient, running live analysis");
            if !plan.unknown_steps.is_empty() {
                println!("  needs exploration: {}", plan.unknown_steps.join("; "));
            }
        }

        self.run_live(instruction, &mut conversation).await
    }

    /// Replay a memory-derived plan. The first unresolvable step falls
    /// the whole remainder of the task back to live execution.
    async fn run_planned(
        &self,
        plan: Plan,
        instruction: &str,
        conversation: &mut Conversation,
    ) -> Result<TaskOutcome> {
        let total = plan.steps.len();

        for step_info in &plan.steps {
            if self.cancel.is_cancelled() {
                return Ok(TaskOutcome::Cancelled {
                    steps: step_info.step.saturating_sub(1) as usize,
                });
            }

            println!("[step {}] {}", step_info.step, step_info.action_detail);

            let tagged = self
                .tagger
                .tag_page(self.browser.as_ref())
                .await
                .context("tagging failed during planned execution")?;

            let prompt = format!(
                "Current page elements:\n{listing}\n\n\
                 I need to: {detail}\n\
                 Target element: {target}\n\n\
                 Respond with exactly one command:\n\
                 - CLICK [ID]\n\
                 - TYPE [ID] \"text\"\n\
                 - FAIL if the target element is not present",
                listing = tagged.listing,
                detail = step_info.action_detail,
                target = step_info.target_description,
            );

            let response = self.model.complete(&prompt).await?;
            println!("  model: {response}");

            if response.to_uppercase().contains("FAIL") {
                warn!("planned step could not be resolved, falling back to live execution");
                println!("  target not found, switching to live analysis");
                return self.run_live(instruction, conversation).await;
            }

            let outcome = self.executor.execute(&response, &tagged.tags).await;
            println!("  {}", outcome.message);

            if outcome.done {
                self.record_planned_task(instruction, &plan).await;
                return Ok(TaskOutcome::Completed {
                    steps: step_info.step as usize,
                    planned: true,
                });
            }

            tokio::time::sleep(Duration::from_millis(500)).await;
        }

        Ok(TaskOutcome::PlanExhausted { steps: total })
    }

    /// Live execution: one model-chosen action per iteration, bounded by
    /// [`MAX_LIVE_STEPS`].
    async fn run_live(
        &self,
        instruction: &str,
        conversation: &mut Conversation,
    ) -> Result<TaskOutcome> {
        let mut history: Vec<StepRecord> = Vec::new();

        for step in 1..=MAX_LIVE_STEPS {
            if self.cancel.is_cancelled() {
                return Ok(TaskOutcome::Cancelled { steps: step - 1 });
            }

            let current_url = self.browser.current_url().await.unwrap_or_default();
            let tagged = self
                .tagger
                .tag_page(self.browser.as_ref())
                .await
                .context("tagging failed during live execution")?;

            let action = self
                .model
                .next_action(
                    conversation,
                    &tagged.screenshot,
                    &tagged.listing,
                    instruction,
                    &current_url,
                )
                .await?;
            println!("[step {step}] model: {action}");

            let outcome = self.executor.execute(&action, &tagged.tags).await;
            println!("[step {step}] {}", outcome.message);

            history.push(StepRecord {
                step,
                url: current_url,
                action,
                result: outcome.message.clone(),
            });

            if outcome.done {
                self.record_task_history(instruction, &history).await;
                return Ok(TaskOutcome::Completed {
                    steps: step,
                    planned: false,
                });
            }

            tokio::time::sleep(Duration::from_millis(500)).await;
        }

        info!(steps = MAX_LIVE_STEPS, "live execution hit the step cap");
        Ok(TaskOutcome::MaxStepsReached {
            steps: MAX_LIVE_STEPS,
        })
    }

    /// Persist a successfully executed plan as a task recipe. Recording
    /// failures are logged and swallowed — the task itself did succeed.
    async fn record_planned_task(&self, instruction: &str, plan: &Plan) {
        let (Some(store), Some(site)) = (&self.store, &self.site) else {
            return;
        };
        let mut path = TaskPath::new(site.id.unwrap_or_default(), instruction);
        path.action_sequence =
            serde_json::to_string(&plan.steps).unwrap_or_else(|_| "[]".into());
        path.success_count = 1;
        match store.save_task_path(path).await {
            Ok(_) => println!("task recipe recorded"),
            Err(e) => warn!("failed to record task recipe: {e}"),
        }
    }

    /// Persist a live-execution history as a task recipe.
    async fn record_task_history(&self, instruction: &str, history: &[StepRecord]) {
        let (Some(store), Some(site)) = (&self.store, &self.site) else {
            return;
        };
        let mut path = TaskPath::new(site.id.unwrap_or_default(), instruction);
        path.action_sequence = serde_json::to_string(history).unwrap_or_else(|_| "[]".into());
        path.success_count = 1;
        match store.save_task_path(path).await {
            Ok(_) => println!("task recipe recorded"),
            Err(e) => warn!("failed to record task recipe: {e}"),
        }
    }

    /// Memory overview for the current site.
    pub async fn memory_stats(&self) -> Result<Option<MemoryStats>> {
        let (Some(store), Some(site)) = (&self.store, &self.site) else {
            return Ok(None);
        };
        let site_id = site.id.unwrap_or_default();
        Ok(Some(MemoryStats {
            domain: site.domain.clone(),
            pages: store.get_pages_by_site(site_id).await?,
            task_paths: store.get_task_paths_by_site(site_id).await?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan_with(can_plan: bool, confidence: f64) -> Plan {
        Plan {
            can_plan,
            confidence,
            steps: Vec::new(),
            unknown_steps: Vec::new(),
        }
    }

    #[test]
    fn test_confidence_gate_is_strictly_greater() {
        assert!(!plan_is_usable(&plan_with(true, 0.55)));
        assert!(!plan_is_usable(&plan_with(true, 0.6)));
        assert!(plan_is_usable(&plan_with(true, 0.61)));
    }

    #[test]
    fn test_unplannable_never_usable() {
        assert!(!plan_is_usable(&plan_with(false, 0.99)));
    }

    #[test]
    fn test_outcome_display() {
        let outcome = TaskOutcome::MaxStepsReached { steps: 20 };
        assert_eq!(
            outcome.to_string(),
            "max steps reached (20), task not completed"
        );
        let outcome = TaskOutcome::Completed {
            steps: 3,
            planned: true,
        };
        assert!(outcome.to_string().contains("from memory"));
    }
}
