//! Memory entities: sites, pages, elements, actions, task paths and
//! exploration logs.
//!
//! Enum values arrive as free strings from the model; every enum parses
//! defensively, mapping unrecognized input to its unknown/other member.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Semantic page category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageType {
    Login,
    Home,
    List,
    Detail,
    Form,
    Search,
    Settings,
    Error,
    Auth,
    Dashboard,
    Unknown,
}

impl PageType {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "login" => PageType::Login,
            "home" => PageType::Home,
            "list" => PageType::List,
            "detail" => PageType::Detail,
            "form" => PageType::Form,
            "search" => PageType::Search,
            "settings" => PageType::Settings,
            "error" => PageType::Error,
            "auth" => PageType::Auth,
            "dashboard" => PageType::Dashboard,
            _ => PageType::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PageType::Login => "login",
            PageType::Home => "home",
            PageType::List => "list",
            PageType::Detail => "detail",
            PageType::Form => "form",
            PageType::Search => "search",
            PageType::Settings => "settings",
            PageType::Error => "error",
            PageType::Auth => "auth",
            PageType::Dashboard => "dashboard",
            PageType::Unknown => "unknown",
        }
    }
}

/// Semantic kind of an interactive element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementType {
    Button,
    Link,
    Input,
    Select,
    Checkbox,
    Radio,
    Textarea,
    Image,
    Menu,
    Tab,
    Icon,
    NavItem,
    Other,
}

impl ElementType {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "button" => ElementType::Button,
            "link" => ElementType::Link,
            "input" => ElementType::Input,
            "select" => ElementType::Select,
            "checkbox" => ElementType::Checkbox,
            "radio" => ElementType::Radio,
            "textarea" => ElementType::Textarea,
            "image" => ElementType::Image,
            "menu" => ElementType::Menu,
            "tab" => ElementType::Tab,
            "icon" => ElementType::Icon,
            "nav_item" => ElementType::NavItem,
            _ => ElementType::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ElementType::Button => "button",
            ElementType::Link => "link",
            ElementType::Input => "input",
            ElementType::Select => "select",
            ElementType::Checkbox => "checkbox",
            ElementType::Radio => "radio",
            ElementType::Textarea => "textarea",
            ElementType::Image => "image",
            ElementType::Menu => "menu",
            ElementType::Tab => "tab",
            ElementType::Icon => "icon",
            ElementType::NavItem => "nav_item",
            ElementType::Other => "other",
        }
    }
}

/// Kind of recorded transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Click,
    Type,
    Select,
    Hover,
    Scroll,
    Navigate,
}

impl ActionType {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "type" => ActionType::Type,
            "select" => ActionType::Select,
            "hover" => ActionType::Hover,
            "scroll" => ActionType::Scroll,
            "navigate" => ActionType::Navigate,
            _ => ActionType::Click,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Click => "click",
            ActionType::Type => "type",
            ActionType::Select => "select",
            ActionType::Hover => "hover",
            ActionType::Scroll => "scroll",
            ActionType::Navigate => "navigate",
        }
    }
}

/// CRUD subtype of a discovered affordance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrudKind {
    Create,
    Read,
    Update,
    Delete,
    None,
}

impl CrudKind {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "create" => CrudKind::Create,
            "read" => CrudKind::Read,
            "update" => CrudKind::Update,
            "delete" => CrudKind::Delete,
            _ => CrudKind::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CrudKind::Create => "create",
            CrudKind::Read => "read",
            CrudKind::Update => "update",
            CrudKind::Delete => "delete",
            CrudKind::None => "none",
        }
    }
}

/// One row per distinct domain. Never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    pub id: Option<i64>,
    pub domain: String,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Site {
    pub fn new(domain: impl Into<String>) -> Self {
        let now = Utc::now();
        Site {
            id: None,
            domain: domain.into(),
            name: String::new(),
            description: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A semantic page or modal snapshot.
///
/// `url_pattern` is the normalized URL (query stripped, SPA fragment kept);
/// a `#modal` suffix marks a dialog rather than a navigation target. The
/// store permits duplicate patterns — "same page" is decided at read time
/// by `find_similar_page`, because `/order/123` and `/order/456` must
/// resolve to one logical page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub id: Option<i64>,
    pub site_id: i64,
    pub url_pattern: String,
    pub title_pattern: String,
    pub page_type: PageType,
    pub semantic_description: String,
    /// JSON array of short descriptors, opaque to the engine.
    pub key_features: String,
    pub sample_url: String,
    pub visit_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Page {
    pub fn new(site_id: i64, url_pattern: impl Into<String>) -> Self {
        let now = Utc::now();
        Page {
            id: None,
            site_id,
            url_pattern: url_pattern.into(),
            title_pattern: String::new(),
            page_type: PageType::Unknown,
            semantic_description: String::new(),
            key_features: "[]".to_string(),
            sample_url: String::new(),
            visit_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One semantic interactive control on a page.
///
/// Re-analysis always inserts fresh rows; elements are never deduplicated
/// against earlier passes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Element {
    pub id: Option<i64>,
    pub page_id: i64,
    pub element_type: ElementType,
    pub semantic_name: String,
    pub semantic_description: String,
    pub text_content: String,
    pub aria_label: String,
    pub placeholder: String,
    /// Locator hint from the tagger (XPath). Not stable across sessions.
    pub locator_hint: String,
    pub position_hint: String,
    /// 1-10.
    pub importance: i64,
    pub created_at: DateTime<Utc>,
}

impl Element {
    pub fn new(page_id: i64, semantic_name: impl Into<String>) -> Self {
        Element {
            id: None,
            page_id,
            element_type: ElementType::Other,
            semantic_name: semantic_name.into(),
            semantic_description: String::new(),
            text_content: String::new(),
            aria_label: String::new(),
            placeholder: String::new(),
            locator_hint: String::new(),
            position_hint: String::new(),
            importance: 5,
            created_at: Utc::now(),
        }
    }
}

/// A recorded transition: source page → target page through an element.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    pub id: Option<i64>,
    pub site_id: i64,
    pub source_page_id: i64,
    pub element_id: Option<i64>,
    pub action_type: ActionType,
    /// Opaque JSON parameters (e.g. typed text).
    pub action_params: String,
    pub target_page_id: Option<i64>,
    pub success_rate: f64,
    pub execution_count: i64,
    pub avg_duration_ms: i64,
    /// Free-text intent: nav/crud classification and subtype.
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ActionRecord {
    pub fn new(site_id: i64, source_page_id: i64) -> Self {
        let now = Utc::now();
        ActionRecord {
            id: None,
            site_id,
            source_page_id,
            element_id: None,
            action_type: ActionType::Click,
            action_params: "{}".to_string(),
            target_page_id: None,
            success_rate: 1.0,
            execution_count: 1,
            avg_duration_ms: 0,
            notes: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A learned recipe mapping a natural-language task to an action sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskPath {
    pub id: Option<i64>,
    pub site_id: i64,
    pub task_description: String,
    /// Whitespace-joined keywords used for retrieval.
    pub task_keywords: String,
    /// Serialized ordered sequence — either planner steps or executed-step
    /// history records. Readers must accept both forms.
    pub action_sequence: String,
    pub start_page_id: Option<i64>,
    pub end_page_id: Option<i64>,
    pub success_count: i64,
    pub fail_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskPath {
    pub fn new(site_id: i64, task_description: impl Into<String>) -> Self {
        let description = task_description.into();
        let keywords = description.split_whitespace().collect::<Vec<_>>().join(" ");
        let now = Utc::now();
        TaskPath {
            id: None,
            site_id,
            task_description: description,
            task_keywords: keywords,
            action_sequence: "[]".to_string(),
            start_page_id: None,
            end_page_id: None,
            success_count: 0,
            fail_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Decode the stored sequence. Both stored forms (planner steps and
    /// step-history records) deserialize to a JSON array; a scalar or
    /// malformed payload yields an empty sequence.
    pub fn decode_sequence(&self) -> Vec<serde_json::Value> {
        serde_json::from_str::<serde_json::Value>(&self.action_sequence)
            .ok()
            .and_then(|v| v.as_array().cloned())
            .unwrap_or_default()
    }
}

/// Append-only audit record of one exploration step. Never read by the
/// planner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorationLog {
    pub id: Option<i64>,
    pub site_id: i64,
    pub session_id: String,
    pub page_id: Option<i64>,
    pub action_taken: String,
    pub result: String,
    pub screenshot_path: String,
    pub timestamp: DateTime<Utc>,
}

impl ExplorationLog {
    pub fn new(site_id: i64, session_id: impl Into<String>) -> Self {
        ExplorationLog {
            id: None,
            site_id,
            session_id: session_id.into(),
            page_id: None,
            action_taken: String::new(),
            result: String::new(),
            screenshot_path: String::new(),
            timestamp: Utc::now(),
        }
    }
}
