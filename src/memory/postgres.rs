//! Client/server store backend — PostgreSQL over sqlx.
//!
//! Exposes the same logical schema and query semantics as the embedded
//! backend; the matching rules are shared via `memory::store`.

use super::store::{best_task_path, match_similar_page, MemoryStore, StoreResult};
use super::types::{
    ActionRecord, ActionType, Element, ElementType, ExplorationLog, Page, PageType, Site,
    TaskPath,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::debug;
use url::Url;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS sites (
        id BIGSERIAL PRIMARY KEY,
        domain TEXT UNIQUE NOT NULL,
        name TEXT NOT NULL DEFAULT '',
        description TEXT NOT NULL DEFAULT '',
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS pages (
        id BIGSERIAL PRIMARY KEY,
        site_id BIGINT NOT NULL REFERENCES sites(id),
        url_pattern TEXT NOT NULL,
        title_pattern TEXT NOT NULL DEFAULT '',
        page_type TEXT NOT NULL DEFAULT 'unknown',
        semantic_description TEXT NOT NULL DEFAULT '',
        key_features TEXT NOT NULL DEFAULT '[]',
        sample_url TEXT NOT NULL DEFAULT '',
        visit_count BIGINT NOT NULL DEFAULT 0,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS elements (
        id BIGSERIAL PRIMARY KEY,
        page_id BIGINT NOT NULL REFERENCES pages(id),
        element_type TEXT NOT NULL DEFAULT 'other',
        semantic_name TEXT NOT NULL,
        semantic_description TEXT NOT NULL DEFAULT '',
        text_content TEXT NOT NULL DEFAULT '',
        aria_label TEXT NOT NULL DEFAULT '',
        placeholder TEXT NOT NULL DEFAULT '',
        locator_hint TEXT NOT NULL DEFAULT '',
        position_hint TEXT NOT NULL DEFAULT '',
        importance BIGINT NOT NULL DEFAULT 5,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS actions (
        id BIGSERIAL PRIMARY KEY,
        site_id BIGINT NOT NULL REFERENCES sites(id),
        source_page_id BIGINT NOT NULL REFERENCES pages(id),
        element_id BIGINT REFERENCES elements(id),
        action_type TEXT NOT NULL,
        action_params TEXT NOT NULL DEFAULT '{}',
        target_page_id BIGINT REFERENCES pages(id),
        success_rate DOUBLE PRECISION NOT NULL DEFAULT 1.0,
        execution_count BIGINT NOT NULL DEFAULT 1,
        avg_duration_ms BIGINT NOT NULL DEFAULT 0,
        notes TEXT NOT NULL DEFAULT '',
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS task_paths (
        id BIGSERIAL PRIMARY KEY,
        site_id BIGINT NOT NULL REFERENCES sites(id),
        task_description TEXT NOT NULL,
        task_keywords TEXT NOT NULL DEFAULT '',
        action_sequence TEXT NOT NULL DEFAULT '[]',
        start_page_id BIGINT,
        end_page_id BIGINT,
        success_count BIGINT NOT NULL DEFAULT 0,
        fail_count BIGINT NOT NULL DEFAULT 0,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS exploration_logs (
        id BIGSERIAL PRIMARY KEY,
        site_id BIGINT NOT NULL REFERENCES sites(id),
        session_id TEXT NOT NULL,
        page_id BIGINT,
        action_taken TEXT NOT NULL DEFAULT '',
        result TEXT NOT NULL DEFAULT '',
        screenshot_path TEXT NOT NULL DEFAULT '',
        timestamp TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE INDEX IF NOT EXISTS idx_pages_site ON pages(site_id)",
    "CREATE INDEX IF NOT EXISTS idx_elements_page ON elements(page_id)",
    "CREATE INDEX IF NOT EXISTS idx_actions_source ON actions(source_page_id)",
    "CREATE INDEX IF NOT EXISTS idx_task_paths_site ON task_paths(site_id)",
];

/// PostgreSQL-backed memory store.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect and bootstrap the schema.
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .connect(database_url)
            .await?;

        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }
        debug!("postgres store connected");

        Ok(Self { pool })
    }
}

fn row_to_site(row: &PgRow) -> Result<Site, sqlx::Error> {
    Ok(Site {
        id: Some(row.try_get("id")?),
        domain: row.try_get("domain")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

fn row_to_page(row: &PgRow) -> Result<Page, sqlx::Error> {
    let page_type: String = row.try_get("page_type")?;
    Ok(Page {
        id: Some(row.try_get("id")?),
        site_id: row.try_get("site_id")?,
        url_pattern: row.try_get("url_pattern")?,
        title_pattern: row.try_get("title_pattern")?,
        page_type: PageType::parse(&page_type),
        semantic_description: row.try_get("semantic_description")?,
        key_features: row.try_get("key_features")?,
        sample_url: row.try_get("sample_url")?,
        visit_count: row.try_get("visit_count")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

fn row_to_element(row: &PgRow) -> Result<Element, sqlx::Error> {
    let element_type: String = row.try_get("element_type")?;
    Ok(Element {
        id: Some(row.try_get("id")?),
        page_id: row.try_get("page_id")?,
        element_type: ElementType::parse(&element_type),
        semantic_name: row.try_get("semantic_name")?,
        semantic_description: row.try_get("semantic_description")?,
        text_content: row.try_get("text_content")?,
        aria_label: row.try_get("aria_label")?,
        placeholder: row.try_get("placeholder")?,
        locator_hint: row.try_get("locator_hint")?,
        position_hint: row.try_get("position_hint")?,
        importance: row.try_get("importance")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

fn row_to_action(row: &PgRow) -> Result<ActionRecord, sqlx::Error> {
    let action_type: String = row.try_get("action_type")?;
    Ok(ActionRecord {
        id: Some(row.try_get("id")?),
        site_id: row.try_get("site_id")?,
        source_page_id: row.try_get("source_page_id")?,
        element_id: row.try_get("element_id")?,
        action_type: ActionType::parse(&action_type),
        action_params: row.try_get("action_params")?,
        target_page_id: row.try_get("target_page_id")?,
        success_rate: row.try_get("success_rate")?,
        execution_count: row.try_get("execution_count")?,
        avg_duration_ms: row.try_get("avg_duration_ms")?,
        notes: row.try_get("notes")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

fn row_to_task_path(row: &PgRow) -> Result<TaskPath, sqlx::Error> {
    Ok(TaskPath {
        id: Some(row.try_get("id")?),
        site_id: row.try_get("site_id")?,
        task_description: row.try_get("task_description")?,
        task_keywords: row.try_get("task_keywords")?,
        action_sequence: row.try_get("action_sequence")?,
        start_page_id: row.try_get("start_page_id")?,
        end_page_id: row.try_get("end_page_id")?,
        success_count: row.try_get("success_count")?,
        fail_count: row.try_get("fail_count")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

#[async_trait]
impl MemoryStore for PostgresStore {
    async fn get_or_create_site(
        &self,
        domain: &str,
        name: &str,
        description: &str,
    ) -> StoreResult<Site> {
        let existing = sqlx::query("SELECT * FROM sites WHERE domain = $1")
            .bind(domain)
            .fetch_optional(&self.pool)
            .await?;
        if let Some(row) = existing {
            return Ok(row_to_site(&row)?);
        }

        let name = if name.is_empty() { domain } else { name };
        let row = sqlx::query(
            "INSERT INTO sites (domain, name, description) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(domain)
        .bind(name)
        .bind(description)
        .fetch_one(&self.pool)
        .await?;
        debug!(domain, "site created");
        Ok(row_to_site(&row)?)
    }

    async fn get_site_by_domain(&self, domain: &str) -> StoreResult<Option<Site>> {
        let row = sqlx::query("SELECT * FROM sites WHERE domain = $1")
            .bind(domain)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_site).transpose()?)
    }

    async fn save_page(&self, mut page: Page) -> StoreResult<Page> {
        match page.id {
            Some(id) => {
                sqlx::query(
                    "UPDATE pages SET
                        url_pattern=$1, title_pattern=$2, page_type=$3,
                        semantic_description=$4, key_features=$5, sample_url=$6,
                        visit_count=$7, updated_at=now()
                     WHERE id=$8",
                )
                .bind(&page.url_pattern)
                .bind(&page.title_pattern)
                .bind(page.page_type.as_str())
                .bind(&page.semantic_description)
                .bind(&page.key_features)
                .bind(&page.sample_url)
                .bind(page.visit_count)
                .bind(id)
                .execute(&self.pool)
                .await?;
            }
            None => {
                let id: i64 = sqlx::query_scalar(
                    "INSERT INTO pages (site_id, url_pattern, title_pattern, page_type,
                        semantic_description, key_features, sample_url, visit_count)
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING id",
                )
                .bind(page.site_id)
                .bind(&page.url_pattern)
                .bind(&page.title_pattern)
                .bind(page.page_type.as_str())
                .bind(&page.semantic_description)
                .bind(&page.key_features)
                .bind(&page.sample_url)
                .bind(page.visit_count)
                .fetch_one(&self.pool)
                .await?;
                page.id = Some(id);
            }
        }
        Ok(page)
    }

    async fn get_pages_by_site(&self, site_id: i64) -> StoreResult<Vec<Page>> {
        let rows = sqlx::query("SELECT * FROM pages WHERE site_id = $1")
            .bind(site_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(row_to_page)
            .collect::<Result<Vec<_>, _>>()?)
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
        let row = sqlx::query(
            "SELECT * FROM pages WHERE site_id = $1 AND (url_pattern = $2 OR sample_url = $3)",
        )
        .bind(site_id)
        .bind(base)
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(row_to_page).transpose()?)
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
        match element.id {
            Some(id) => {
                sqlx::query(
                    "UPDATE elements SET
                        element_type=$1, semantic_name=$2, semantic_description=$3,
                        text_content=$4, aria_label=$5, placeholder=$6,
                        locator_hint=$7, position_hint=$8, importance=$9
                     WHERE id=$10",
                )
                .bind(element.element_type.as_str())
                .bind(&element.semantic_name)
                .bind(&element.semantic_description)
                .bind(&element.text_content)
                .bind(&element.aria_label)
                .bind(&element.placeholder)
                .bind(&element.locator_hint)
                .bind(&element.position_hint)
                .bind(element.importance)
                .bind(id)
                .execute(&self.pool)
                .await?;
            }
            None => {
                let id: i64 = sqlx::query_scalar(
                    "INSERT INTO elements (page_id, element_type, semantic_name,
                        semantic_description, text_content, aria_label, placeholder,
                        locator_hint, position_hint, importance)
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING id",
                )
                .bind(element.page_id)
                .bind(element.element_type.as_str())
                .bind(&element.semantic_name)
                .bind(&element.semantic_description)
                .bind(&element.text_content)
                .bind(&element.aria_label)
                .bind(&element.placeholder)
                .bind(&element.locator_hint)
                .bind(&element.position_hint)
                .bind(element.importance)
                .fetch_one(&self.pool)
                .await?;
                element.id = Some(id);
            }
        }
        Ok(element)
    }

    async fn get_elements_by_page(&self, page_id: i64) -> StoreResult<Vec<Element>> {
        let rows = sqlx::query("SELECT * FROM elements WHERE page_id = $1")
            .bind(page_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(row_to_element)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn find_element_by_semantic(
        &self,
        page_id: i64,
        semantic_name: &str,
    ) -> StoreResult<Option<Element>> {
        let needle = format!("%{semantic_name}%");
        let row = sqlx::query(
            "SELECT * FROM elements WHERE page_id = $1
             AND (semantic_name LIKE $2 OR semantic_description LIKE $2)
             LIMIT 1",
        )
        .bind(page_id)
        .bind(needle)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(row_to_element).transpose()?)
    }

    async fn save_action(&self, mut action: ActionRecord) -> StoreResult<ActionRecord> {
        match action.id {
            Some(id) => {
                sqlx::query(
                    "UPDATE actions SET
                        element_id=$1, action_type=$2, action_params=$3,
                        target_page_id=$4, success_rate=$5, execution_count=$6,
                        avg_duration_ms=$7, notes=$8, updated_at=now()
                     WHERE id=$9",
                )
                .bind(action.element_id)
                .bind(action.action_type.as_str())
                .bind(&action.action_params)
                .bind(action.target_page_id)
                .bind(action.success_rate)
                .bind(action.execution_count)
                .bind(action.avg_duration_ms)
                .bind(&action.notes)
                .bind(id)
                .execute(&self.pool)
                .await?;
            }
            None => {
                let id: i64 = sqlx::query_scalar(
                    "INSERT INTO actions (site_id, source_page_id, element_id, action_type,
                        action_params, target_page_id, success_rate, execution_count,
                        avg_duration_ms, notes)
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING id",
                )
                .bind(action.site_id)
                .bind(action.source_page_id)
                .bind(action.element_id)
                .bind(action.action_type.as_str())
                .bind(&action.action_params)
                .bind(action.target_page_id)
                .bind(action.success_rate)
                .bind(action.execution_count)
                .bind(action.avg_duration_ms)
                .bind(&action.notes)
                .fetch_one(&self.pool)
                .await?;
                action.id = Some(id);
            }
        }
        Ok(action)
    }

    async fn get_actions_from_page(&self, page_id: i64) -> StoreResult<Vec<ActionRecord>> {
        let rows = sqlx::query("SELECT * FROM actions WHERE source_page_id = $1")
            .bind(page_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(row_to_action)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn get_action_to_page(
        &self,
        source_page_id: i64,
        target_page_id: i64,
    ) -> StoreResult<Option<ActionRecord>> {
        let row = sqlx::query(
            "SELECT * FROM actions WHERE source_page_id = $1 AND target_page_id = $2 LIMIT 1",
        )
        .bind(source_page_id)
        .bind(target_page_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(row_to_action).transpose()?)
    }

    async fn save_task_path(&self, mut path: TaskPath) -> StoreResult<TaskPath> {
        match path.id {
            Some(id) => {
                sqlx::query(
                    "UPDATE task_paths SET
                        task_description=$1, task_keywords=$2, action_sequence=$3,
                        start_page_id=$4, end_page_id=$5, success_count=$6,
                        fail_count=$7, updated_at=now()
                     WHERE id=$8",
                )
                .bind(&path.task_description)
                .bind(&path.task_keywords)
                .bind(&path.action_sequence)
                .bind(path.start_page_id)
                .bind(path.end_page_id)
                .bind(path.success_count)
                .bind(path.fail_count)
                .bind(id)
                .execute(&self.pool)
                .await?;
            }
            None => {
                let id: i64 = sqlx::query_scalar(
                    "INSERT INTO task_paths (site_id, task_description, task_keywords,
                        action_sequence, start_page_id, end_page_id, success_count, fail_count)
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING id",
                )
                .bind(path.site_id)
                .bind(&path.task_description)
                .bind(&path.task_keywords)
                .bind(&path.action_sequence)
                .bind(path.start_page_id)
                .bind(path.end_page_id)
                .bind(path.success_count)
                .bind(path.fail_count)
                .fetch_one(&self.pool)
                .await?;
                path.id = Some(id);
            }
        }
        Ok(path)
    }

    async fn get_task_paths_by_site(&self, site_id: i64) -> StoreResult<Vec<TaskPath>> {
        let rows = sqlx::query("SELECT * FROM task_paths WHERE site_id = $1")
            .bind(site_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(row_to_task_path)
            .collect::<Result<Vec<_>, _>>()?)
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
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO exploration_logs (site_id, session_id, page_id, action_taken,
                result, screenshot_path)
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
        )
        .bind(log.site_id)
        .bind(&log.session_id)
        .bind(log.page_id)
        .bind(&log.action_taken)
        .bind(&log.result)
        .bind(&log.screenshot_path)
        .fetch_one(&self.pool)
        .await?;
        log.id = Some(id);
        Ok(log)
    }
}
