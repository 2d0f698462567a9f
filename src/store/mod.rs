pub mod sqlite;

use crate::models::{ListOptions, NewProperty, PropertyPatch, PropertyRecord, ScrapeStatus};
use async_trait::async_trait;

pub use sqlite::SqliteStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("A property with URL {url} already exists")]
    Duplicate { url: String },
    #[error("Property {0} not found")]
    NotFound(i64),
    #[error("Stored row is unreadable: {0}")]
    Corrupt(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Keyed table of property records.
///
/// Every method is a single statement; nothing here spans a transaction.
#[async_trait]
pub trait PropertyStore: Send + Sync {
    /// Insert a record. A URL that already exists is rejected, never overwritten.
    async fn create(&self, property: NewProperty) -> Result<PropertyRecord, StoreError>;

    async fn get_by_id(&self, id: i64) -> Result<Option<PropertyRecord>, StoreError>;

    async fn get_by_url(&self, url: &str) -> Result<Option<PropertyRecord>, StoreError>;

    /// Change only the fields present in `patch`
    async fn update(&self, id: i64, patch: PropertyPatch) -> Result<PropertyRecord, StoreError>;

    async fn update_status(&self, id: i64, status: ScrapeStatus) -> Result<(), StoreError>;

    async fn delete(&self, id: i64) -> Result<(), StoreError>;

    async fn list(&self, options: &ListOptions) -> Result<Vec<PropertyRecord>, StoreError>;

    async fn count(&self, status: Option<ScrapeStatus>) -> Result<i64, StoreError>;
}
