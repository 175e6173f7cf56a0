//! Memory-based task planning.
//!
//! The planner renders a bounded digest of what the store knows about a
//! site and asks the model whether that memory is enough to plan the
//! task. The model's answer is trusted as-is; feasibility is not
//! re-verified here. Whether a plan is *used* is the executor's call.

use crate::memory::{MemoryStore, Site};
use crate::model::parse::extract_json_object;
use crate::model::ModelClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// Digest bounds: how much memory is rendered into the prompt.
const MAX_PAGES: usize = 20;
const MAX_ACTION_PAGES: usize = 10;
const MAX_ACTIONS_PER_PAGE: usize = 5;
const MAX_TASK_PATHS: usize = 10;

/// One planned step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanStep {
    #[serde(default)]
    pub step: u32,
    #[serde(default)]
    pub action_type: String,
    #[serde(default)]
    pub target_description: String,
    #[serde(default)]
    pub action_detail: String,
    #[serde(default)]
    pub expected_result: String,
}

/// The planner's verdict on a task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub can_plan: bool,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default, rename = "plan")]
    pub steps: Vec<PlanStep>,
    #[serde(default)]
    pub unknown_steps: Vec<String>,
}

impl Plan {
    /// The canonical "cannot plan" value, used for every degradation.
    pub fn cannot(reason: &str) -> Self {
        Plan {
            can_plan: false,
            confidence: 0.0,
            steps: Vec::new(),
            unknown_steps: vec![reason.to_string()],
        }
    }
}

fn plan_prompt(
    site: &Site,
    pages: &str,
    actions: &str,
    task_paths: &str,
    task: &str,
    current_url: &str,
    current_page_desc: &str,
) -> String {
    format!(
        "You are a website operation expert. Plan the user's task from the \
site memory below.

## Site
Domain: {domain}
Known pages:
{pages}

Known transitions:
{actions}

Learned task recipes:
{task_paths}

## Task
{task}

## Current page
URL: {current_url}
Description: {current_page_desc}

Answer with a JSON plan:
{{
    \"can_plan\": true/false,
    \"confidence\": 0.0-1.0,
    \"plan\": [
        {{
            \"step\": 1,
            \"action_type\": \"click/type/navigate\",
            \"target_description\": \"element to act on\",
            \"action_detail\": \"what to do\",
            \"expected_result\": \"what should happen\"
        }}
    ],
    \"unknown_steps\": [\"steps that need live exploration\"]
}}

If memory is insufficient, set can_plan=false and say what is missing.",
        domain = site.domain,
    )
}

/// Plans tasks against stored memory.
pub struct MemoryPlanner {
    model: Arc<dyn ModelClient>,
    store: Arc<dyn MemoryStore>,
}

impl MemoryPlanner {
    pub fn new(model: Arc<dyn ModelClient>, store: Arc<dyn MemoryStore>) -> Self {
        Self { model, store }
    }

    /// Produce a plan for `task`. Never fails: store or model trouble
    /// degrades to the canonical cannot-plan result.
    pub async fn plan_task(
        &self,
        site: &Site,
        task: &str,
        current_url: &str,
        current_page_desc: &str,
    ) -> Plan {
        let digest = match self.render_digest(site).await {
            Ok(d) => d,
            Err(e) => {
                warn!("memory digest failed: {e:#}");
                return Plan::cannot("memory unavailable");
            }
        };
        let (pages, actions, task_paths) = digest;

        let prompt = plan_prompt(
            site,
            &pages,
            &actions,
            &task_paths,
            task,
            current_url,
            current_page_desc,
        );

        let response = match self.model.complete(&prompt).await {
            Ok(r) => r,
            Err(e) => {
                warn!("planning request failed: {e:#}");
                return Plan::cannot("result unparseable");
            }
        };

        extract_json_object(&response)
            .and_then(|block| serde_json::from_str::<Plan>(block).ok())
            .unwrap_or_else(|| {
                warn!("planning response had no usable JSON");
                Plan::cannot("result unparseable")
            })
    }

    /// Render the bounded memory digest: first 20 pages, the outgoing
    /// actions of the first 10 pages (5 each), and the first 10 task
    /// paths.
    async fn render_digest(
        &self,
        site: &Site,
    ) -> Result<(String, String, String), crate::memory::StoreError> {
        let site_id = site.id.unwrap_or_default();
        let pages = self.store.get_pages_by_site(site_id).await?;

        let pages_desc = pages
            .iter()
            .take(MAX_PAGES)
            .map(|p| {
                format!(
                    "- [{}] {} ({})",
                    p.page_type.as_str(),
                    p.semantic_description,
                    p.url_pattern
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        let mut action_lines = Vec::new();
        for page in pages.iter().take(MAX_ACTION_PAGES) {
            let actions = self
                .store
                .get_actions_from_page(page.id.unwrap_or_default())
                .await?;
            for action in actions.iter().take(MAX_ACTIONS_PER_PAGE) {
                action_lines.push(format!("- {} -> {}", p_desc(page), action.notes));
            }
        }

        let task_paths = self.store.get_task_paths_by_site(site_id).await?;
        let paths_desc = task_paths
            .iter()
            .take(MAX_TASK_PATHS)
            .map(|tp| format!("- {}", tp.task_description))
            .collect::<Vec<_>>()
            .join("\n");

        Ok((
            or_empty(pages_desc),
            or_empty(action_lines.join("\n")),
            or_empty(paths_desc),
        ))
    }
}

fn p_desc(page: &crate::memory::Page) -> &str {
    if page.semantic_description.is_empty() {
        &page.url_pattern
    } else {
        &page.semantic_description
    }
}

fn or_empty(s: String) -> String {
    if s.is_empty() {
        "(no records)".to_string()
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_deserializes_model_shape() {
        let raw = r#"{
            "can_plan": true,
            "confidence": 0.8,
            "plan": [
                {"step": 1, "action_type": "click", "target_description": "Reports link",
                 "action_detail": "open the reports page", "expected_result": "report list"}
            ],
            "unknown_steps": []
        }"#;
        let plan: Plan = serde_json::from_str(raw).unwrap();
        assert!(plan.can_plan);
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].target_description, "Reports link");
    }

    #[test]
    fn test_plan_tolerates_missing_fields() {
        let plan: Plan = serde_json::from_str(r#"{"can_plan": false}"#).unwrap();
        assert!(!plan.can_plan);
        assert_eq!(plan.confidence, 0.0);
        assert!(plan.steps.is_empty());
    }

    #[test]
    fn test_cannot_plan_is_canonical() {
        let plan = Plan::cannot("result unparseable");
        assert!(!plan.can_plan);
        assert_eq!(plan.confidence, 0.0);
        assert_eq!(plan.unknown_steps, vec!["result unparseable".to_string()]);
    }
}
