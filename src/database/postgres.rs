//! Postgres-backed [`RecordStore`].
//!
//! Every collection lives in one `records` table: the identifier in a text
//! column, the fields in a `jsonb` body. Serial identifiers come from
//! `record_sequences`, one counter row per collection.

use std::time::Instant;

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::types::Json;
use sqlx::Row;
use tracing::{debug, info, warn};

use super::manager::DatabaseManager;
use super::record::{Record, RecordId};
use super::store::{new_object_id, RecordStore, StoreError};
use crate::config::DatabaseConfig;
use crate::filter::{Filter, FilterData};
use crate::schema::IdentityKind;

const CREATE_RECORDS: &str = r#"
CREATE TABLE IF NOT EXISTS records (
    seq         BIGSERIAL PRIMARY KEY,
    collection  TEXT NOT NULL,
    id          TEXT NOT NULL,
    body        JSONB NOT NULL DEFAULT '{}'::jsonb,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
    UNIQUE (collection, id)
)"#;

const CREATE_SEQUENCES: &str = r#"
CREATE TABLE IF NOT EXISTS record_sequences (
    collection  TEXT PRIMARY KEY,
    value       BIGINT NOT NULL
)"#;

const NEXT_SERIAL: &str = "INSERT INTO record_sequences (collection, value) VALUES ($1, 1) \
     ON CONFLICT (collection) DO UPDATE SET value = record_sequences.value + 1 \
     RETURNING value";

const UPDATE_RECORD: &str =
    "UPDATE records SET body = $3, updated_at = now() WHERE collection = $1 AND id = $2";

pub struct PgStore {
    db: DatabaseManager,
    slow_query_ms: Option<u64>,
}

impl PgStore {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let db = DatabaseManager::connect(config).await?;
        Ok(Self {
            db,
            slow_query_ms: config
                .enable_slow_query_warning
                .then_some(config.slow_query_threshold_ms),
        })
    }

    /// Create the backing tables if they do not exist yet
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_RECORDS).execute(self.db.pool()).await?;
        sqlx::query(CREATE_SEQUENCES).execute(self.db.pool()).await?;
        info!("Record tables ready");
        Ok(())
    }

    async fn next_id(
        &self,
        collection: &str,
        identity: IdentityKind,
    ) -> Result<RecordId, StoreError> {
        match identity {
            IdentityKind::Serial => {
                let row = sqlx::query(NEXT_SERIAL)
                    .bind(collection)
                    .fetch_one(self.db.pool())
                    .await?;
                Ok(RecordId::Serial(row.try_get::<i64, _>("value")?))
            }
            IdentityKind::Object => Ok(new_object_id()),
        }
    }

    fn observe(&self, operation: &str, collection: &str, started: Instant) {
        let elapsed = started.elapsed().as_millis() as u64;
        match self.slow_query_ms {
            Some(threshold) if elapsed >= threshold => {
                warn!("Slow query: {} on {} took {}ms", operation, collection, elapsed)
            }
            _ => debug!("{} on {} took {}ms", operation, collection, elapsed),
        }
    }
}

fn bind_params<'q>(
    mut q: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    params: &'q [Value],
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    for p in params {
        q = q.bind(Json(p));
    }
    q
}

fn row_to_record(collection: &str, row: &PgRow, id: RecordId) -> Result<Record, StoreError> {
    let Json(body): Json<Value> = row.try_get("body")?;
    match body {
        Value::Object(fields) => Ok(Record::new(id, fields)),
        other => Err(StoreError::Corrupt {
            collection: collection.to_string(),
            reason: format!("record {} body is {} instead of an object", id, other),
        }),
    }
}

fn parse_stored_id(
    collection: &str,
    identity: IdentityKind,
    raw: &str,
) -> Result<RecordId, StoreError> {
    identity.parse(raw).ok_or_else(|| StoreError::Corrupt {
        collection: collection.to_string(),
        reason: format!("identifier {:?} does not match {:?}", raw, identity),
    })
}

#[async_trait]
impl RecordStore for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn insert(
        &self,
        collection: &str,
        identity: IdentityKind,
        fields: Map<String, Value>,
    ) -> Result<Record, StoreError> {
        let started = Instant::now();
        let id = self.next_id(collection, identity).await?;
        sqlx::query("INSERT INTO records (collection, id, body) VALUES ($1, $2, $3)")
            .bind(collection)
            .bind(id.as_key())
            .bind(Json(&fields))
            .execute(self.db.pool())
            .await?;
        self.observe("insert", collection, started);
        Ok(Record::new(id, fields))
    }

    async fn fetch(&self, collection: &str, id: &RecordId) -> Result<Option<Record>, StoreError> {
        let started = Instant::now();
        let row = sqlx::query("SELECT id, body FROM records WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id.as_key())
            .fetch_optional(self.db.pool())
            .await?;
        self.observe("fetch", collection, started);
        row.map(|row| row_to_record(collection, &row, id.clone())).transpose()
    }

    async fn select(
        &self,
        collection: &str,
        identity: IdentityKind,
        filter: &FilterData,
    ) -> Result<Vec<Record>, StoreError> {
        let mut query = Filter::new(collection, identity)?;
        let sql = query.assign(filter.clone()).to_sql();
        debug!("select {}: {}", collection, sql.query);

        let started = Instant::now();
        let q = sqlx::query(&sql.query).bind(collection);
        let rows = bind_params(q, &sql.params).fetch_all(self.db.pool()).await?;
        self.observe("select", collection, started);

        rows.iter()
            .map(|row| {
                let raw: String = row.try_get("id")?;
                let id = parse_stored_id(collection, identity, &raw)?;
                row_to_record(collection, row, id)
            })
            .collect()
    }

    async fn replace(
        &self,
        collection: &str,
        id: &RecordId,
        fields: Map<String, Value>,
    ) -> Result<Option<Record>, StoreError> {
        let started = Instant::now();
        let result = sqlx::query(UPDATE_RECORD)
            .bind(collection)
            .bind(id.as_key())
            .bind(Json(&fields))
            .execute(self.db.pool())
            .await?;
        self.observe("replace", collection, started);

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(Record::new(id.clone(), fields)))
    }

    async fn delete(&self, collection: &str, id: &RecordId) -> Result<bool, StoreError> {
        let started = Instant::now();
        let result = sqlx::query("DELETE FROM records WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id.as_key())
            .execute(self.db.pool())
            .await?;
        self.observe("delete", collection, started);
        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(self.db.health_check().await?)
    }

    async fn close(&self) {
        self.db.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_ids_must_match_identity() {
        assert_eq!(
            parse_stored_id("albums", IdentityKind::Serial, "12").unwrap(),
            RecordId::Serial(12)
        );
        assert!(matches!(
            parse_stored_id("albums", IdentityKind::Serial, "abc"),
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn schema_statements_are_idempotent() {
        assert!(CREATE_RECORDS.contains("IF NOT EXISTS"));
        assert!(CREATE_SEQUENCES.contains("IF NOT EXISTS"));
        assert!(NEXT_SERIAL.contains("RETURNING value"));
    }
}
