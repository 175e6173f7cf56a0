//! Durable site memory: entities, matching rules, and the two store
//! backends (embedded SQLite, client/server PostgreSQL).

pub mod postgres;
pub mod sqlite;
pub mod store;
pub mod types;

pub use store::{open_store, MemoryStore, StoreError, StoreResult};
pub use types::{
    ActionRecord, ActionType, CrudKind, Element, ElementType, ExplorationLog, Page, PageType,
    Site, TaskPath,
};
