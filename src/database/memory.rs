//! In-memory [`RecordStore`] used when no database is configured and by the tests.
//!
//! Each collection keeps its records in insertion order behind one
//! `tokio::sync::RwLock`; serial identifiers count up per collection and are
//! never reused after a delete.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::debug;

use super::record::{Record, RecordId};
use super::store::{new_object_id, RecordStore, StoreError};
use crate::filter::{Filter, FilterData};
use crate::schema::IdentityKind;

#[derive(Default)]
struct Collection {
    records: Vec<Record>,
    last_serial: i64,
}

impl Collection {
    fn position(&self, id: &RecordId) -> Option<usize> {
        self.records.iter().position(|r| &r.id == id)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
    closed: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Unavailable("memory store is closed".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn insert(
        &self,
        collection: &str,
        identity: IdentityKind,
        fields: Map<String, Value>,
    ) -> Result<Record, StoreError> {
        self.ensure_open()?;
        let mut collections = self.collections.write().await;
        let entry = collections.entry(collection.to_string()).or_default();

        let id = match identity {
            IdentityKind::Serial => {
                entry.last_serial += 1;
                RecordId::Serial(entry.last_serial)
            }
            IdentityKind::Object => new_object_id(),
        };

        let record = Record::new(id, fields);
        entry.records.push(record.clone());
        debug!("memory insert {}/{}", collection, record.id);
        Ok(record)
    }

    async fn fetch(&self, collection: &str, id: &RecordId) -> Result<Option<Record>, StoreError> {
        self.ensure_open()?;
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|c| c.position(id).map(|i| c.records[i].clone())))
    }

    async fn select(
        &self,
        collection: &str,
        identity: IdentityKind,
        filter: &FilterData,
    ) -> Result<Vec<Record>, StoreError> {
        self.ensure_open()?;
        let mut query = Filter::new(collection, identity)?;
        query.assign(filter.clone());

        let collections = self.collections.read().await;
        Ok(match collections.get(collection) {
            Some(c) => query.apply(&c.records),
            None => Vec::new(),
        })
    }

    async fn replace(
        &self,
        collection: &str,
        id: &RecordId,
        fields: Map<String, Value>,
    ) -> Result<Option<Record>, StoreError> {
        self.ensure_open()?;
        let mut collections = self.collections.write().await;
        let Some(entry) = collections.get_mut(collection) else {
            return Ok(None);
        };
        let Some(index) = entry.position(id) else {
            return Ok(None);
        };
        entry.records[index].fields = fields;
        Ok(Some(entry.records[index].clone()))
    }

    async fn delete(&self, collection: &str, id: &RecordId) -> Result<bool, StoreError> {
        self.ensure_open()?;
        let mut collections = self.collections.write().await;
        let Some(entry) = collections.get_mut(collection) else {
            return Ok(false);
        };
        match entry.position(id) {
            Some(index) => {
                entry.records.remove(index);
                debug!("memory delete {}/{}", collection, id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.ensure_open()
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{FilterTarget, SortDirection};
    use serde_json::json;

    fn fields(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap_or_default()
    }

    async fn label(store: &MemoryStore, name: &str) -> Record {
        store
            .insert("labels", IdentityKind::Serial, fields(json!({"name": name})))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn serial_ids_increase_and_are_not_reused() {
        let store = MemoryStore::new();
        let a = label(&store, "a").await;
        let b = label(&store, "b").await;
        assert_eq!(a.id, RecordId::Serial(1));
        assert_eq!(b.id, RecordId::Serial(2));

        assert!(store.delete("labels", &b.id).await.unwrap());
        let c = label(&store, "c").await;
        assert_eq!(c.id, RecordId::Serial(3));

        // Counters are per collection
        let other = store.insert("venues", IdentityKind::Serial, Map::new()).await.unwrap();
        assert_eq!(other.id, RecordId::Serial(1));
    }

    #[tokio::test]
    async fn replace_and_delete_unknown_ids() {
        let store = MemoryStore::new();
        let missing = RecordId::Serial(99);
        assert!(store.replace("labels", &missing, Map::new()).await.unwrap().is_none());
        assert!(!store.delete("labels", &missing).await.unwrap());
        assert!(store.fetch("labels", &missing).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn select_filters_sorts_and_pages() {
        let store = MemoryStore::new();
        for (name, genre) in [("c", "Rock"), ("a", "Jazz"), ("b", "Rock"), ("d", "Rock")] {
            let album = fields(json!({"title": name, "genre": genre}));
            store.insert("albums", IdentityKind::Serial, album).await.unwrap();
        }

        let filter = FilterData {
            limit: Some(2),
            offset: Some(1),
            ..FilterData::new()
                .where_eq(FilterTarget::field("genre"), json!("Rock"))
                .order_by(FilterTarget::field("title"), SortDirection::Asc)
        };
        let titles: Vec<Value> = store
            .select("albums", IdentityKind::Serial, &filter)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.fields["title"].clone())
            .collect();
        assert_eq!(titles, vec![json!("c"), json!("d")]);
    }

    #[tokio::test]
    async fn closed_store_is_unavailable() {
        let store = MemoryStore::new();
        assert!(store.ping().await.is_ok());
        store.close().await;
        assert!(matches!(store.ping().await, Err(StoreError::Unavailable(_))));
    }
}
