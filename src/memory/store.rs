//! The `MemoryStore` trait, the matching rules shared by every backend,
//! and the backend factory.
//!
//! Matching (URL patterns, title fallback, task-keyword scoring) lives
//! here as free functions over fetched rows, so the embedded and the
//! client/server backend behave identically by construction.

use super::postgres::PostgresStore;
use super::sqlite::SqliteStore;
use super::types::{ActionRecord, Element, ExplorationLog, Page, Site, TaskPath};
use crate::config::{StoreBackend, StoreConfig};
use async_trait::async_trait;
use thiserror::Error;
use url::Url;

/// Store failures. These must propagate to the caller — a silently
/// dropped write would corrupt the memory model.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("postgres error: {0}")]
    Postgres(#[from] sqlx::Error),
    #[error("store i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store mutex poisoned")]
    Poisoned,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Durable site memory. Save operations insert when `id` is unset and
/// update by id otherwise; bulk reads are unordered within the owning id.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Return the Site for `domain`, creating it on first visit.
    /// Idempotent: repeated calls with one domain yield one row.
    async fn get_or_create_site(
        &self,
        domain: &str,
        name: &str,
        description: &str,
    ) -> StoreResult<Site>;

    async fn get_site_by_domain(&self, domain: &str) -> StoreResult<Option<Site>>;

    async fn save_page(&self, page: Page) -> StoreResult<Page>;
    async fn get_pages_by_site(&self, site_id: i64) -> StoreResult<Vec<Page>>;
    /// Exact match on normalized url_pattern or sample_url.
    async fn get_page_by_url(&self, site_id: i64, url: &str) -> StoreResult<Option<Page>>;
    /// Pattern-based resolution of "the same logical page"; see
    /// [`match_similar_page`].
    async fn find_similar_page(
        &self,
        site_id: i64,
        url: &str,
        title: &str,
    ) -> StoreResult<Option<Page>>;

    async fn save_element(&self, element: Element) -> StoreResult<Element>;
    async fn get_elements_by_page(&self, page_id: i64) -> StoreResult<Vec<Element>>;
    async fn find_element_by_semantic(
        &self,
        page_id: i64,
        semantic_name: &str,
    ) -> StoreResult<Option<Element>>;

    async fn save_action(&self, action: ActionRecord) -> StoreResult<ActionRecord>;
    async fn get_actions_from_page(&self, page_id: i64) -> StoreResult<Vec<ActionRecord>>;
    async fn get_action_to_page(
        &self,
        source_page_id: i64,
        target_page_id: i64,
    ) -> StoreResult<Option<ActionRecord>>;

    async fn save_task_path(&self, path: TaskPath) -> StoreResult<TaskPath>;
    async fn get_task_paths_by_site(&self, site_id: i64) -> StoreResult<Vec<TaskPath>>;
    /// Keyword-overlap retrieval; see [`best_task_path`].
    async fn find_task_path(
        &self,
        site_id: i64,
        task_description: &str,
    ) -> StoreResult<Option<TaskPath>>;

    async fn save_exploration_log(&self, log: ExplorationLog) -> StoreResult<ExplorationLog>;
}

/// Open the configured backend.
pub async fn open_store(config: &StoreConfig) -> StoreResult<Box<dyn MemoryStore>> {
    match config.backend {
        StoreBackend::Sqlite => Ok(Box::new(SqliteStore::open(&config.path)?)),
        StoreBackend::Postgres => Ok(Box::new(PostgresStore::connect(&config.url).await?)),
    }
}

/// Path component of a URL-ish string, query and fragment ignored.
fn url_path(s: &str) -> String {
    if let Ok(u) = Url::parse(s) {
        return u.path().to_string();
    }
    // Not an absolute URL; strip any scheme://host prefix and trailing
    // query/fragment by hand.
    let rest = match s.find("://") {
        Some(idx) => {
            let after = &s[idx + 3..];
            match after.find('/') {
                Some(slash) => &after[slash..],
                None => "",
            }
        }
        None => s,
    };
    rest.split(['?', '#']).next().unwrap_or("").to_string()
}

fn is_numeric_segment(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Whether `url` matches the stored `pattern`.
///
/// Both are split into `/`-delimited path segments; counts must match and
/// each pair must be equal, or the pattern segment is `*`, or both parse
/// as integers (numeric path ids are interchangeable, so `/order/123`
/// matches a stored `/order/456`). Intentionally approximate; kept as-is
/// for compatibility with existing stored patterns.
pub fn url_matches_pattern(url: &str, pattern: &str) -> bool {
    if pattern.is_empty() {
        return false;
    }

    let upath = url_path(url);
    let ppath = url_path(pattern);

    let url_parts: Vec<&str> = upath.trim_matches('/').split('/').collect();
    let pattern_parts: Vec<&str> = ppath.trim_matches('/').split('/').collect();

    if url_parts.len() != pattern_parts.len() {
        return false;
    }

    url_parts.iter().zip(pattern_parts.iter()).all(|(&u, &p)| {
        p == "*" || p == u || (is_numeric_segment(u) && is_numeric_segment(p))
    })
}

/// First page whose url_pattern matches `url`; when none does, first page
/// whose title_pattern contains `title` case-insensitively. Iteration
/// order decides ties — no ranking.
pub fn match_similar_page<'a>(pages: &'a [Page], url: &str, title: &str) -> Option<&'a Page> {
    if let Some(page) = pages
        .iter()
        .find(|p| url_matches_pattern(url, &p.url_pattern))
    {
        return Some(page);
    }

    if title.is_empty() {
        return None;
    }
    let title_lower = title.to_lowercase();
    pages.iter().find(|p| {
        !p.title_pattern.is_empty() && p.title_pattern.to_lowercase().contains(&title_lower)
    })
}

/// Count how many whitespace tokens of `task` occur as substrings of the
/// stored keywords.
pub fn score_keywords(task: &str, keywords: &str) -> usize {
    let keywords_lower = keywords.to_lowercase();
    task.to_lowercase()
        .split_whitespace()
        .filter(|token| keywords_lower.contains(*token))
        .count()
}

/// Highest-scoring task path with score > 0. A strictly higher score wins;
/// ties keep the first-encountered path (store iteration order).
pub fn best_task_path<'a>(paths: &'a [TaskPath], task: &str) -> Option<&'a TaskPath> {
    let mut best: Option<&TaskPath> = None;
    let mut best_score = 0usize;

    for path in paths {
        let score = score_keywords(task, &path.task_keywords);
        if score > best_score {
            best_score = score;
            best = Some(path);
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_matches_exact_segments() {
        assert!(url_matches_pattern(
            "https://app.example.com/orders/list",
            "https://app.example.com/orders/list"
        ));
    }

    #[test]
    fn test_url_matches_numeric_segments_interchangeable() {
        assert!(url_matches_pattern(
            "https://app.example.com/order/123",
            "https://app.example.com/order/456"
        ));
        assert!(url_matches_pattern(
            "https://app.example.com/order/123",
            "https://app.example.com/order/*"
        ));
    }

    #[test]
    fn test_url_mismatch_on_non_numeric_segment() {
        assert!(!url_matches_pattern(
            "https://app.example.com/order/detail",
            "https://app.example.com/order/summary"
        ));
    }

    #[test]
    fn test_url_mismatch_on_segment_count() {
        assert!(!url_matches_pattern(
            "https://app.example.com/order/123/items",
            "https://app.example.com/order/123"
        ));
    }

    #[test]
    fn test_url_empty_pattern_never_matches() {
        assert!(!url_matches_pattern("https://a.com/x", ""));
    }

    #[test]
    fn test_modal_suffix_compares_by_path_only() {
        // Fragments are not part of the path comparison; a modal pattern
        // still resolves against its base URL.
        assert!(url_matches_pattern(
            "https://a.com/tasks",
            "https://a.com/tasks#modal"
        ));
    }

    #[test]
    fn test_score_keywords_counts_token_overlap() {
        assert_eq!(score_keywords("create new report", "create a new report"), 3);
        assert_eq!(score_keywords("delete user", "create a new report"), 0);
        // Substring containment, not token equality
        assert_eq!(score_keywords("port", "create a new report"), 1);
    }

    fn path_with_keywords(id: i64, keywords: &str) -> TaskPath {
        let mut p = TaskPath::new(1, keywords);
        p.id = Some(id);
        p
    }

    #[test]
    fn test_best_task_path_zero_overlap_is_none() {
        let paths = vec![path_with_keywords(1, "open settings page")];
        assert!(best_task_path(&paths, "delete the last invoice").is_none());
    }

    #[test]
    fn test_best_task_path_highest_score_wins() {
        let paths = vec![
            path_with_keywords(1, "open the settings page"),
            path_with_keywords(2, "create a new report now"),
        ];
        let found = best_task_path(&paths, "create new report").unwrap();
        assert_eq!(found.id, Some(2));
    }

    #[test]
    fn test_best_task_path_tie_keeps_first() {
        let paths = vec![
            path_with_keywords(1, "export report"),
            path_with_keywords(2, "export report"),
        ];
        let found = best_task_path(&paths, "export report").unwrap();
        assert_eq!(found.id, Some(1));
    }

    #[test]
    fn test_match_similar_page_prefers_url_then_title() {
        let mut by_title = Page::new(1, "https://a.com/other");
        by_title.title_pattern = "Order History".to_string();
        let by_url = Page::new(1, "https://a.com/order/*");

        let pages = vec![by_title.clone(), by_url.clone()];
        let hit = match_similar_page(&pages, "https://a.com/order/42", "order").unwrap();
        assert_eq!(hit.url_pattern, "https://a.com/order/*");

        let pages = vec![by_title];
        let hit = match_similar_page(&pages, "https://a.com/nowhere/1/2", "order").unwrap();
        assert_eq!(hit.title_pattern, "Order History");
    }
}
