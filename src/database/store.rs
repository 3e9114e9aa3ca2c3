//! Record store abstraction.
//!
//! [`RecordStore`] is the only way the service layer touches persistence.
//! Records are schemaless field maps grouped by collection; validation,
//! referential checks and rendering happen above this layer.
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`insert`](RecordStore::insert) | Store a new record, assigning its identifier |
//! | [`fetch`](RecordStore::fetch) | Load one record by identifier |
//! | [`select`](RecordStore::select) | Filter, sort and page a collection |
//! | [`replace`](RecordStore::replace) | Overwrite the fields of an existing record |
//! | [`delete`](RecordStore::delete) | Hard-delete one record |

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use super::manager::DatabaseError;
use super::record::{Record, RecordId};
use crate::filter::{FilterData, FilterError};
use crate::schema::IdentityKind;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Corrupt record in {collection}: {reason}")]
    Corrupt { collection: String, reason: String },

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl From<DatabaseError> for StoreError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Sqlx(e) => StoreError::Sqlx(e),
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}

impl From<FilterError> for StoreError {
    fn from(err: FilterError) -> Self {
        StoreError::Query(err.to_string())
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Short backend name for logs and the health endpoint
    fn backend(&self) -> &'static str;

    /// Insert a record; the store assigns an identifier of the given kind
    async fn insert(
        &self,
        collection: &str,
        identity: IdentityKind,
        fields: Map<String, Value>,
    ) -> Result<Record, StoreError>;

    async fn fetch(&self, collection: &str, id: &RecordId) -> Result<Option<Record>, StoreError>;

    /// Records matching `filter`, in filter order (insertion order when unsorted)
    async fn select(
        &self,
        collection: &str,
        identity: IdentityKind,
        filter: &FilterData,
    ) -> Result<Vec<Record>, StoreError>;

    /// Overwrite the stored fields. Returns None when the record does not exist.
    async fn replace(
        &self,
        collection: &str,
        id: &RecordId,
        fields: Map<String, Value>,
    ) -> Result<Option<Record>, StoreError>;

    /// Returns false when nothing was deleted
    async fn delete(&self, collection: &str, id: &RecordId) -> Result<bool, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;

    /// Release connections; called once after the server stops
    async fn close(&self);
}

/// Opaque identifier for document collections
pub fn new_object_id() -> RecordId {
    RecordId::Object(uuid::Uuid::new_v4().simple().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_ids_are_path_safe() {
        let id = new_object_id();
        let RecordId::Object(raw) = &id else {
            panic!("expected object id");
        };
        assert_eq!(raw.len(), 32);
        assert_eq!(IdentityKind::Object.parse(raw), Some(id.clone()));
        assert_ne!(new_object_id(), id);
    }
}
