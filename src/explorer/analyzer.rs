//! Semantic page/element analysis through the vision model.
//!
//! Both entry points degrade on bad model output instead of failing:
//! an unreadable page classifies as `unknown` with empty lists, an
//! unreadable element response yields no elements. Exploration keeps
//! going either way.

use crate::memory::{CrudKind, ElementType, PageType};
use crate::model::parse::extract_json_object;
use crate::model::ModelClient;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

const ANALYZE_PAGE_PROMPT: &str = "\
Analyze this web page screenshot and answer with a JSON object:

{
    \"page_type\": \"one of: login/home/list/detail/form/search/settings/error/auth/dashboard/unknown\",
    \"page_description\": \"one sentence describing what this page does\",
    \"key_features\": [\"notable features, e.g. search box, data table, sidebar\"],
    \"has_sidebar_nav\": true/false,
    \"sidebar_nav_items\": [\"names of sidebar navigation entries\"]
}

Notes:
1. Use page_type \"auth\" for captcha/QR/verification pages.
2. If a sidebar navigation menu exists, set has_sidebar_nav and list every entry.";

fn analyze_elements_prompt(page_description: &str) -> String {
    format!(
        "This screenshot has its interactive elements tagged:
- [#ID]: text input
- [@ID]: hyperlink
- [$ID]: button or other interactive element

Page description: {page_description}

Classify the tagged elements and answer with JSON:
{{
    \"elements\": [
        {{
            \"tag_id\": numeric tag id,
            \"semantic_name\": \"what the element means, e.g. Login button\",
            \"element_type\": \"button/link/input/select/nav_item/other\",
            \"text_or_hint\": \"visible text or placeholder\",
            \"importance\": 1-10,
            \"explore_priority\": 1-10,
            \"is_nav_menu\": true/false,
            \"is_crud_action\": true/false,
            \"crud_type\": \"create/read/update/delete/none\",
            \"action_suggestion\": \"suggested interaction\"
        }}
    ]
}}

Rules:
1. Sidebar and top navigation entries: is_nav_menu=true, explore_priority 9-10.
2. CRUD buttons must be identified:
   - new/create/add => crud_type=\"create\", explore_priority 9
   - view/detail/search => crud_type=\"read\", explore_priority 8
   - edit/modify/update => crud_type=\"update\", explore_priority 8
   - delete/remove/void => crud_type=\"delete\", explore_priority 7
3. Row-level action buttons in list pages are high priority.
4. Plain links and cosmetic buttons get explore_priority 3-5.
5. Only include elements worth exploring; skip decoration."
    )
}

/// Page-level classification result.
#[derive(Debug, Clone)]
pub struct PageInsight {
    pub page_type: PageType,
    pub description: String,
    pub key_features: Vec<String>,
    pub has_nav_menu: bool,
    pub nav_items: Vec<String>,
}

impl PageInsight {
    /// The documented default when the model output is unusable.
    pub fn unreadable() -> Self {
        PageInsight {
            page_type: PageType::Unknown,
            description: "page could not be analyzed".to_string(),
            key_features: Vec::new(),
            has_nav_menu: false,
            nav_items: Vec::new(),
        }
    }
}

#[derive(Deserialize)]
struct RawPageInsight {
    #[serde(default)]
    page_type: String,
    #[serde(default)]
    page_description: String,
    #[serde(default)]
    key_features: Vec<String>,
    #[serde(default)]
    has_sidebar_nav: bool,
    #[serde(default)]
    sidebar_nav_items: Vec<String>,
}

/// One analyzable element as reported by the model.
#[derive(Debug, Clone)]
pub struct ElementInsight {
    pub tag_id: u32,
    pub semantic_name: String,
    pub element_type: ElementType,
    pub text: String,
    pub importance: i64,
    pub priority: i64,
    pub is_nav: bool,
    pub is_crud: bool,
    pub crud: CrudKind,
    pub suggestion: String,
}

/// Model responses put numbers and numeric strings in the same fields
/// interchangeably.
fn as_u32(value: Option<&Value>) -> Option<u32> {
    match value? {
        Value::Number(n) => n.as_u64().map(|v| v as u32),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_i64_or(value: Option<&Value>, default: i64) -> i64 {
    match value {
        Some(Value::Number(n)) => n.as_i64().unwrap_or(default),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
        _ => default,
    }
}

fn as_str(value: Option<&Value>) -> String {
    value
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

fn element_from_value(value: &Value) -> Option<ElementInsight> {
    let tag_id = as_u32(value.get("tag_id"))?;
    Some(ElementInsight {
        tag_id,
        semantic_name: as_str(value.get("semantic_name")),
        element_type: ElementType::parse(&as_str(value.get("element_type"))),
        text: as_str(value.get("text_or_hint")),
        importance: as_i64_or(value.get("importance"), 5),
        priority: as_i64_or(value.get("explore_priority"), 5),
        is_nav: value
            .get("is_nav_menu")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
        is_crud: value
            .get("is_crud_action")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
        crud: CrudKind::parse(&as_str(value.get("crud_type"))),
        suggestion: as_str(value.get("action_suggestion")),
    })
}

/// Drives page/element classification through the vision model.
pub struct PageAnalyzer {
    model: Arc<dyn ModelClient>,
}

impl PageAnalyzer {
    pub fn new(model: Arc<dyn ModelClient>) -> Self {
        Self { model }
    }

    /// Classify the page shown in `screenshot`.
    pub async fn analyze_page(&self, screenshot: &[u8]) -> PageInsight {
        let response = match self.model.vision(screenshot, ANALYZE_PAGE_PROMPT).await {
            Ok(r) => r,
            Err(e) => {
                warn!("page analysis request failed: {e:#}");
                return PageInsight::unreadable();
            }
        };

        let Some(block) = extract_json_object(&response) else {
            warn!("page analysis response had no JSON object");
            return PageInsight::unreadable();
        };
        let Ok(raw) = serde_json::from_str::<RawPageInsight>(block) else {
            warn!("page analysis JSON did not deserialize");
            return PageInsight::unreadable();
        };

        PageInsight {
            page_type: PageType::parse(&raw.page_type),
            description: raw.page_description,
            key_features: raw.key_features,
            has_nav_menu: raw.has_sidebar_nav,
            nav_items: raw.sidebar_nav_items,
        }
    }

    /// Classify the tagged elements of the page.
    pub async fn analyze_elements(
        &self,
        screenshot: &[u8],
        page_description: &str,
    ) -> Vec<ElementInsight> {
        let prompt = analyze_elements_prompt(page_description);
        let response = match self.model.vision(screenshot, &prompt).await {
            Ok(r) => r,
            Err(e) => {
                warn!("element analysis request failed: {e:#}");
                return Vec::new();
            }
        };

        let elements = extract_json_object(&response)
            .and_then(|block| serde_json::from_str::<Value>(block).ok())
            .and_then(|v| v.get("elements").and_then(|e| e.as_array()).cloned())
            .unwrap_or_default();

        elements.iter().filter_map(element_from_value).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_from_value_tolerates_string_numbers() {
        let value: Value = serde_json::json!({
            "tag_id": "7",
            "semantic_name": "New Task button",
            "element_type": "button",
            "importance": "9",
            "is_crud_action": true,
            "crud_type": "create"
        });
        let insight = element_from_value(&value).unwrap();
        assert_eq!(insight.tag_id, 7);
        assert_eq!(insight.importance, 9);
        assert_eq!(insight.priority, 5); // default
        assert_eq!(insight.crud, CrudKind::Create);
    }

    #[test]
    fn test_element_without_tag_id_is_dropped() {
        let value: Value = serde_json::json!({ "semantic_name": "mystery" });
        assert!(element_from_value(&value).is_none());
    }
}
