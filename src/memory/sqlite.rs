//! Embedded store backend — a single SQLite file.

use super::store::{
    best_task_path, match_similar_page, MemoryStore, StoreError, StoreResult,
};
use super::types::{
    ActionRecord, ActionType, Element, ElementType, ExplorationLog, Page, PageType, Site,
    TaskPath,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;
use url::Url;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS sites (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    domain TEXT UNIQUE NOT NULL,
    name TEXT DEFAULT '',
    description TEXT DEFAULT '',
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS pages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    site_id INTEGER NOT NULL,
    url_pattern TEXT NOT NULL,
    title_pattern TEXT DEFAULT '',
    page_type TEXT DEFAULT 'unknown',
    semantic_description TEXT DEFAULT '',
    key_features TEXT DEFAULT '[]',
    sample_url TEXT DEFAULT '',
    visit_count INTEGER DEFAULT 0,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (site_id) REFERENCES sites(id)
);

CREATE TABLE IF NOT EXISTS elements (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    page_id INTEGER NOT NULL,
    element_type TEXT DEFAULT 'other',
    semantic_name TEXT NOT NULL,
    semantic_description TEXT DEFAULT '',
    text_content TEXT DEFAULT '',
    aria_label TEXT DEFAULT '',
    placeholder TEXT DEFAULT '',
    locator_hint TEXT DEFAULT '',
    position_hint TEXT DEFAULT '',
    importance INTEGER DEFAULT 5,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (page_id) REFERENCES pages(id)
);

CREATE TABLE IF NOT EXISTS actions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    site_id INTEGER NOT NULL,
    source_page_id INTEGER NOT NULL,
    element_id INTEGER,
    action_type TEXT NOT NULL,
    action_params TEXT DEFAULT '{}',
    target_page_id INTEGER,
    success_rate REAL DEFAULT 1.0,
    execution_count INTEGER DEFAULT 1,
    avg_duration_ms INTEGER DEFAULT 0,
    notes TEXT DEFAULT '',
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (site_id) REFERENCES sites(id),
    FOREIGN KEY (source_page_id) REFERENCES pages(id),
    FOREIGN KEY (element_id) REFERENCES elements(id),
    FOREIGN KEY (target_page_id) REFERENCES pages(id)
);

CREATE TABLE IF NOT EXISTS task_paths (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    site_id INTEGER NOT NULL,
    task_description TEXT NOT NULL,
    task_keywords TEXT DEFAULT '',
    action_sequence TEXT DEFAULT '[]',
    start_page_id INTEGER,
    end_page_id INTEGER,
    success_count INTEGER DEFAULT 0,
    fail_count INTEGER DEFAULT 0,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (site_id) REFERENCES sites(id)
);

CREATE TABLE IF NOT EXISTS exploration_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    site_id INTEGER NOT NULL,
    session_id TEXT NOT NULL,
    page_id INTEGER,
    action_taken TEXT DEFAULT '',
    result TEXT DEFAULT '',
    screenshot_path TEXT DEFAULT '',
    timestamp TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (site_id) REFERENCES sites(id)
);

CREATE INDEX IF NOT EXISTS idx_pages_site ON pages(site_id);
CREATE INDEX IF NOT EXISTS idx_pages_url ON pages(url_pattern);
CREATE INDEX IF NOT EXISTS idx_elements_page ON elements(page_id);
CREATE INDEX IF NOT EXISTS idx_elements_semantic ON elements(semantic_name);
CREATE INDEX IF NOT EXISTS idx_actions_source ON actions(source_page_id);
CREATE INDEX IF NOT EXISTS idx_task_paths_site ON task_paths(site_id);
";

/// SQLite-backed memory store. One connection per session, guarded by a
/// mutex because the engine's control flow is strictly sequential.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and bootstrap the schema.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        // The pragma returns a result row; failure to switch modes is fine.
        conn.execute_batch("PRAGMA journal_mode=WAL;").ok();
        conn.execute_batch(SCHEMA)?;
        debug!("sqlite store opened at {}", path.display());

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

/// SQLite's CURRENT_TIMESTAMP is `YYYY-MM-DD HH:MM:SS` in UTC.
fn parse_ts(s: Option<String>) -> DateTime<Utc> {
    s.and_then(|raw| {
        NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M:%S")
            .map(|naive| naive.and_utc())
            .ok()
            .or_else(|| DateTime::parse_from_rfc3339(&raw).map(|dt| dt.with_timezone(&Utc)).ok())
    })
    .unwrap_or_else(Utc::now)
}

fn row_to_site(row: &Row<'_>) -> rusqlite::Result<Site> {
    Ok(Site {
        id: Some(row.get("id")?),
        domain: row.get("domain")?,
        name: row.get("name")?,
        description: row.get("description")?,
        created_at: parse_ts(row.get("created_at")?),
        updated_at: parse_ts(row.get("updated_at")?),
    })
}

fn row_to_page(row: &Row<'_>) -> rusqlite::Result<Page> {
    let page_type: String = row.get("page_type")?;
    Ok(Page {
        id: Some(row.get("id")?),
        site_id: row.get("site_id")?,
        url_pattern: row.get("url_pattern")?,
        title_pattern: row.get("title_pattern")?,
        page_type: PageType::parse(&page_type),
        semantic_description: row.get("semantic_description")?,
        key_features: row.get("key_features")?,
        sample_url: row.get("sample_url")?,
        visit_count: row.get("visit_count")?,
        created_at: parse_ts(row.get("created_at")?),
        updated_at: parse_ts(row.get("updated_at")?),
    })
}

fn row_to_element(row: &Row<'_>) -> rusqlite::Result<Element> {
    let element_type: String = row.get("element_type")?;
    Ok(Element {
        id: Some(row.get("id")?),
        page_id: row.get("page_id")?,
        element_type: ElementType::parse(&element_type),
        semantic_name: row.get("semantic_name")?,
        semantic_description: row.get("semantic_description")?,
        text_content: row.get("text_content")?,
        aria_label: row.get("aria_label")?,
        placeholder: row.get("placeholder")?,
        locator_hint: row.get("locator_hint")?,
        position_hint: row.get("position_hint")?,
        importance: row.get("importance")?,
        created_at: parse_ts(row.get("created_at")?),
    })
}

fn row_to_action(row: &Row<'_>) -> rusqlite::Result<ActionRecord> {
    let action_type: String = row.get("action_type")?;
    Ok(ActionRecord {
        id: Some(row.get("id")?),
        site_id: row.get("site_id")?,
        source_page_id: row.get("source_page_id")?,
        element_id: row.get("element_id")?,
        action_type: ActionType::parse(&action_type),
        action_params: row.get("action_params")?,
        target_page_id: row.get("target_page_id")?,
        success_rate: row.get("success_rate")?,
        execution_count: row.get("execution_count")?,
        avg_duration_ms: row.get("avg_duration_ms")?,
        notes: row.get("notes")?,
        created_at: parse_ts(row.get("created_at")?),
        updated_at: parse_ts(row.get("updated_at")?),
    })
}

fn row_to_task_path(row: &Row<'_>) -> rusqlite::Result<TaskPath> {
    Ok(TaskPath {
        id: Some(row.get("id")?),
        site_id: row.get("site_id")?,
        task_description: row.get("task_description")?,
        task_keywords: row.get("task_keywords")?,
        action_sequence: row.get("action_sequence")?,
        start_page_id: row.get("start_page_id")?,
        end_page_id: row.get("end_page_id")?,
        success_count: row.get("success_count")?,
        fail_count: row.get("fail_count")?,
        created_at: parse_ts(row.get("created_at")?),
        updated_at: parse_ts(row.get("updated_at")?),
    })
}

#[async_trait]
impl MemoryStore for SqliteStore {
    async fn get_or_create_site(
        &self,
        domain: &str,
        name: &str,
        description: &str,
    ) -> StoreResult<Site> {
        let conn = self.lock()?;

        let existing = conn
            .query_row(
                "SELECT * FROM sites WHERE domain = ?1",
                params![domain],
                row_to_site,
            )
            .optional()?;
        if let Some(site) = existing {
            return Ok(site);
        }

        let name = if name.is_empty() { domain } else { name };
        conn.execute(
            "INSERT INTO sites (domain, name, description) VALUES (?1, ?2, ?3)",
            params![domain, name, description],
        )?;
        let id = conn.last_insert_rowid();
        debug!(domain, id, "site created");

        Ok(Site {
            id: Some(id),
            domain: domain.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
    }

    async fn get_site_by_domain(&self, domain: &str) -> StoreResult<Option<Site>> {
        let conn = self.lock()?;
        Ok(conn
            .query_row(
                "SELECT * FROM sites WHERE domain = ?1",
                params![domain],
                row_to_site,
            )
            .optional()?)
    }

    async fn save_page(&self, mut page: Page) -> StoreResult<Page> {
        let conn = self.lock()?;
        match page.id {
            Some(id) => {
                conn.execute(
                    "UPDATE pages SET
                        url_pattern=?1, title_pattern=?2, page_type=?3,
                        semantic_description=?4, key_features=?5, sample_url=?6,
                        visit_count=?7, updated_at=CURRENT_TIMESTAMP
                     WHERE id=?8",
                    params![
                        page.url_pattern,
                        page.title_pattern,
                        page.page_type.as_str(),
                        page.semantic_description,
                        page.key_features,
                        page.sample_url,
                        page.visit_count,
                        id
                    ],
                )?;
            }
            None => {
                conn.execute(
                    "INSERT INTO pages (site_id, url_pattern, title_pattern, page_type,
                        semantic_description, key_features, sample_url, visit_count)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        page.site_id,
                        page.url_pattern,
                        page.title_pattern,
                        page.page_type.as_str(),
                        page.semantic_description,
                        page.key_features,
                        page.sample_url,
                        page.visit_count
                    ],
                )?;
                page.id = Some(conn.last_insert_rowid());
            }
        }
        Ok(page)
    }

    async fn get_pages_by_site(&self, site_id: i64) -> StoreResult<Vec<Page>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT * FROM pages WHERE site_id = ?1")?;
        let pages = stmt
            .query_map(params![site_id], row_to_page)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(pages)
    }

    async fn get_page_by_url(&self, site_id: i64, url: &str) -> StoreResult<Option<Page>> {
        let base = match Url::parse(url) {
            Ok(u) => format!(
                "{}://{}{}",
                u.scheme(),
                u.host_str().unwrap_or_default(),
                u.path()
            ),
            Err(_) => url.to_string(),
        };
        let conn = self.lock()?;
        Ok(conn
            .query_row(
                "SELECT * FROM pages WHERE site_id = ?1 AND (url_pattern = ?2 OR sample_url = ?3)",
                params![site_id, base, url],
                row_to_page,
            )
            .optional()?)
    }

    async fn find_similar_page(
        &self,
        site_id: i64,
        url: &str,
        title: &str,
    ) -> StoreResult<Option<Page>> {
        let pages = self.get_pages_by_site(site_id).await?;
        Ok(match_similar_page(&pages, url, title).cloned())
    }

    async fn save_element(&self, mut element: Element) -> StoreResult<Element> {
        let conn = self.lock()?;
        match element.id {
            Some(id) => {
                conn.execute(
                    "UPDATE elements SET
                        element_type=?1, semantic_name=?2, semantic_description=?3,
                        text_content=?4, aria_label=?5, placeholder=?6,
                        locator_hint=?7, position_hint=?8, importance=?9
                     WHERE id=?10",
                    params![
                        element.element_type.as_str(),
                        element.semantic_name,
                        element.semantic_description,
                        element.text_content,
                        element.aria_label,
                        element.placeholder,
                        element.locator_hint,
                        element.position_hint,
                        element.importance,
                        id
                    ],
                )?;
            }
            None => {
                conn.execute(
                    "INSERT INTO elements (page_id, element_type, semantic_name,
                        semantic_description, text_content, aria_label, placeholder,
                        locator_hint, position_hint, importance)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    params![
                        element.page_id,
                        element.element_type.as_str(),
                        element.semantic_name,
                        element.semantic_description,
                        element.text_content,
                        element.aria_label,
                        element.placeholder,
                        element.locator_hint,
                        element.position_hint,
                        element.importance
                    ],
                )?;
                element.id = Some(conn.last_insert_rowid());
            }
        }
        Ok(element)
    }

    async fn get_elements_by_page(&self, page_id: i64) -> StoreResult<Vec<Element>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT * FROM elements WHERE page_id = ?1")?;
        let elements = stmt
            .query_map(params![page_id], row_to_element)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(elements)
    }

    async fn find_element_by_semantic(
        &self,
        page_id: i64,
        semantic_name: &str,
    ) -> StoreResult<Option<Element>> {
        let needle = format!("%{semantic_name}%");
        let conn = self.lock()?;
        Ok(conn
            .query_row(
                "SELECT * FROM elements WHERE page_id = ?1
                 AND (semantic_name LIKE ?2 OR semantic_description LIKE ?2)",
                params![page_id, needle],
                row_to_element,
            )
            .optional()?)
    }

    async fn save_action(&self, mut action: ActionRecord) -> StoreResult<ActionRecord> {
        let conn = self.lock()?;
        match action.id {
            Some(id) => {
                conn.execute(
                    "UPDATE actions SET
                        element_id=?1, action_type=?2, action_params=?3,
                        target_page_id=?4, success_rate=?5, execution_count=?6,
                        avg_duration_ms=?7, notes=?8, updated_at=CURRENT_TIMESTAMP
                     WHERE id=?9",
                    params![
                        action.element_id,
                        action.action_type.as_str(),
                        action.action_params,
                        action.target_page_id,
                        action.success_rate,
                        action.execution_count,
                        action.avg_duration_ms,
                        action.notes,
                        id
                    ],
                )?;
            }
            None => {
                conn.execute(
                    "INSERT INTO actions (site_id, source_page_id, element_id, action_type,
                        action_params, target_page_id, success_rate, execution_count,
                        avg_duration_ms, notes)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    params![
                        action.site_id,
                        action.source_page_id,
                        action.element_id,
                        action.action_type.as_str(),
                        action.action_params,
                        action.target_page_id,
                        action.success_rate,
                        action.execution_count,
                        action.avg_duration_ms,
                        action.notes
                    ],
                )?;
                action.id = Some(conn.last_insert_rowid());
            }
        }
        Ok(action)
    }

    async fn get_actions_from_page(&self, page_id: i64) -> StoreResult<Vec<ActionRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT * FROM actions WHERE source_page_id = ?1")?;
        let actions = stmt
            .query_map(params![page_id], row_to_action)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(actions)
    }

    async fn get_action_to_page(
        &self,
        source_page_id: i64,
        target_page_id: i64,
    ) -> StoreResult<Option<ActionRecord>> {
        let conn = self.lock()?;
        Ok(conn
            .query_row(
                "SELECT * FROM actions WHERE source_page_id = ?1 AND target_page_id = ?2",
                params![source_page_id, target_page_id],
                row_to_action,
            )
            .optional()?)
    }

    async fn save_task_path(&self, mut path: TaskPath) -> StoreResult<TaskPath> {
        let conn = self.lock()?;
        match path.id {
            Some(id) => {
                conn.execute(
                    "UPDATE task_paths SET
                        task_description=?1, task_keywords=?2, action_sequence=?3,
                        start_page_id=?4, end_page_id=?5, success_count=?6,
                        fail_count=?7, updated_at=CURRENT_TIMESTAMP
                     WHERE id=?8",
                    params![
                        path.task_description,
                        path.task_keywords,
                        path.action_sequence,
                        path.start_page_id,
                        path.end_page_id,
                        path.success_count,
                        path.fail_count,
                        id
                    ],
                )?;
            }
            None => {
                conn.execute(
                    "INSERT INTO task_paths (site_id, task_description, task_keywords,
                        action_sequence, start_page_id, end_page_id, success_count, fail_count)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        path.site_id,
                        path.task_description,
                        path.task_keywords,
                        path.action_sequence,
                        path.start_page_id,
                        path.end_page_id,
                        path.success_count,
                        path.fail_count
                    ],
                )?;
                path.id = Some(conn.last_insert_rowid());
            }
        }
        Ok(path)
    }

    async fn get_task_paths_by_site(&self, site_id: i64) -> StoreResult<Vec<TaskPath>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT * FROM task_paths WHERE site_id = ?1")?;
        let paths = stmt
            .query_map(params![site_id], row_to_task_path)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(paths)
    }

    async fn find_task_path(
        &self,
        site_id: i64,
        task_description: &str,
    ) -> StoreResult<Option<TaskPath>> {
        let paths = self.get_task_paths_by_site(site_id).await?;
        Ok(best_task_path(&paths, task_description).cloned())
    }

    async fn save_exploration_log(&self, mut log: ExplorationLog) -> StoreResult<ExplorationLog> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO exploration_logs (site_id, session_id, page_id, action_taken,
                result, screenshot_path)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                log.site_id,
                log.session_id,
                log.page_id,
                log.action_taken,
                log.result,
                log.screenshot_path
            ],
        )?;
        log.id = Some(conn.last_insert_rowid());
        Ok(log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_or_create_site_idempotent() {
        let store = SqliteStore::open_in_memory().unwrap();

        let first = store
            .get_or_create_site("app.example.com", "Example", "")
            .await
            .unwrap();
        let second = store
            .get_or_create_site("app.example.com", "", "")
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.name, "Example");
    }

    #[tokio::test]
    async fn test_site_name_defaults_to_domain() {
        let store = SqliteStore::open_in_memory().unwrap();
        let site = store
            .get_or_create_site("bare.example.com", "", "")
            .await
            .unwrap();
        assert_eq!(site.name, "bare.example.com");
    }

    #[tokio::test]
    async fn test_save_page_insert_then_update() {
        let store = SqliteStore::open_in_memory().unwrap();
        let site = store.get_or_create_site("a.com", "", "").await.unwrap();

        let mut page = Page::new(site.id.unwrap(), "https://a.com/orders");
        page.visit_count = 1;
        let page = store.save_page(page).await.unwrap();
        let id = page.id.unwrap();

        let mut revisit = page.clone();
        revisit.visit_count = 2;
        revisit.semantic_description = "order list".to_string();
        store.save_page(revisit).await.unwrap();

        let pages = store.get_pages_by_site(site.id.unwrap()).await.unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].id, Some(id));
        assert_eq!(pages[0].visit_count, 2);
        assert_eq!(pages[0].semantic_description, "order list");
    }

    #[tokio::test]
    async fn test_find_similar_page_numeric_ids() {
        let store = SqliteStore::open_in_memory().unwrap();
        let site = store.get_or_create_site("a.com", "", "").await.unwrap();
        let site_id = site.id.unwrap();

        let mut page = Page::new(site_id, "https://a.com/order/123");
        page.title_pattern = "Order Detail".to_string();
        store.save_page(page).await.unwrap();

        let hit = store
            .find_similar_page(site_id, "https://a.com/order/987", "")
            .await
            .unwrap();
        assert!(hit.is_some());

        let miss = store
            .find_similar_page(site_id, "https://a.com/invoice/987", "nothing here")
            .await
            .unwrap();
        assert!(miss.is_none());

        let by_title = store
            .find_similar_page(site_id, "https://a.com/x/y/z", "order detail")
            .await
            .unwrap();
        assert!(by_title.is_some());
    }

    #[tokio::test]
    async fn test_find_task_path_scoring() {
        let store = SqliteStore::open_in_memory().unwrap();
        let site = store.get_or_create_site("a.com", "", "").await.unwrap();
        let site_id = site.id.unwrap();

        store
            .save_task_path(TaskPath::new(site_id, "open the settings page"))
            .await
            .unwrap();
        store
            .save_task_path(TaskPath::new(site_id, "create a new report"))
            .await
            .unwrap();

        let hit = store
            .find_task_path(site_id, "create new report")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.task_description, "create a new report");

        let miss = store
            .find_task_path(site_id, "zzz qqq")
            .await
            .unwrap();
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn test_elements_never_deduplicated() {
        let store = SqliteStore::open_in_memory().unwrap();
        let site = store.get_or_create_site("a.com", "", "").await.unwrap();
        let page = store
            .save_page(Page::new(site.id.unwrap(), "https://a.com/"))
            .await
            .unwrap();
        let page_id = page.id.unwrap();

        store
            .save_element(Element::new(page_id, "Search box"))
            .await
            .unwrap();
        store
            .save_element(Element::new(page_id, "Search box"))
            .await
            .unwrap();

        let elements = store.get_elements_by_page(page_id).await.unwrap();
        assert_eq!(elements.len(), 2);
    }

    #[tokio::test]
    async fn test_exploration_log_appends() {
        let store = SqliteStore::open_in_memory().unwrap();
        let site = store.get_or_create_site("a.com", "", "").await.unwrap();

        let mut log = ExplorationLog::new(site.id.unwrap(), "abc12345");
        log.action_taken = "NAV: Reports".to_string();
        log.result = "page: Reports".to_string();
        let saved = store.save_exploration_log(log).await.unwrap();
        assert!(saved.id.is_some());
    }
}
