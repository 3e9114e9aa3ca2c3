//! Generic resource endpoint logic shared by every entity.
//!
//! Each operation runs the same pipeline: authorize, parse the identifier,
//! load, re-check row ownership, validate, write, render. Entity differences
//! live entirely in the static schema declarations.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use tracing::{debug, info};

use crate::access::{authorize, check_record, strip_privileged, Caller, Denied, RecordCheck, Scope};
use crate::api::format::{
    created_document, document_message, record_to_api_value, wanted_references, Related, NEST_DEPTH,
};
use crate::config::PaginationConfig;
use crate::database::record::{Record, RecordId};
use crate::database::store::{RecordStore, StoreError};
use crate::filter::{FilterData, FilterError, FilterTarget};
use crate::schema::validate::{apply_generated, merge_into, PendingReference};
use crate::schema::{
    registry, validate_payload, EntitySchema, FieldKind, Flavor, ValidationError, WriteMode,
};
use crate::types::Operation;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    BadRequest(String),

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Token error: {0}")]
    Token(String),

    #[error(transparent)]
    Denied(#[from] Denied),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<FilterError> for ServiceError {
    fn from(err: FilterError) -> Self {
        ServiceError::BadRequest(err.to_string())
    }
}

/// Successful result of a write, mapped to a status code by the handlers
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Ok(Value),
    Created(Value),
    NoContent,
}

#[derive(Clone)]
pub struct ResourceService {
    store: Arc<dyn RecordStore>,
    max_limit: Option<i64>,
}

impl ResourceService {
    pub fn new(store: Arc<dyn RecordStore>, pagination: &PaginationConfig) -> Self {
        Self {
            store,
            max_limit: pagination.max_limit,
        }
    }

    /// Resolve a resource path segment to its schema
    pub fn schema(&self, resource: &str) -> Result<&'static EntitySchema, ServiceError> {
        registry()
            .get(resource)
            .ok_or_else(|| ServiceError::UnknownResource(resource.to_string()))
    }

    pub async fn list(
        &self,
        caller: Option<&Caller>,
        schema: &'static EntitySchema,
        params: &HashMap<String, String>,
    ) -> Result<Vec<Value>, ServiceError> {
        let scope = authorize(caller, Operation::List, schema)?;
        let mut filter = FilterData::from_query(schema, params, self.max_limit)?;
        if let Scope::Owned { field, owner } = scope {
            filter = filter.where_eq(FilterTarget::field(field), owner);
        }

        let records = self.store.select(schema.name, schema.identity, &filter).await?;
        debug!("list {} -> {} records", schema.name, records.len());
        self.render_all(schema, &records).await
    }

    pub async fn get(
        &self,
        caller: Option<&Caller>,
        schema: &'static EntitySchema,
        raw_id: &str,
    ) -> Result<Value, ServiceError> {
        let scope = authorize(caller, Operation::Retrieve, schema)?;
        let record = self.load(&scope, Operation::Retrieve, schema, raw_id).await?;
        self.render(schema, &record).await
    }

    pub async fn create(
        &self,
        caller: Option<&Caller>,
        schema: &'static EntitySchema,
        payload: &Value,
    ) -> Result<Outcome, ServiceError> {
        authorize(caller, Operation::Create, schema)?;

        let payload = strip_privileged(caller, schema, payload);
        let validated = validate_payload(schema, &payload, WriteMode::Create)?;
        self.check_references(&validated.references).await?;

        let mut fields = validated.fields;
        apply_generated(schema, &mut fields, WriteMode::Create, caller.map(|c| &c.id), Utc::now());

        let record = self.store.insert(schema.name, schema.identity, fields).await?;
        info!("created {}/{}", schema.name, record.id);

        match schema.flavor {
            Flavor::Relational => Ok(Outcome::Created(self.render(schema, &record).await?)),
            Flavor::Document => Ok(Outcome::Created(created_document(schema, &record))),
        }
    }

    /// Partial update: present fields are validated and merged, the rest kept
    pub async fn update(
        &self,
        caller: Option<&Caller>,
        schema: &'static EntitySchema,
        raw_id: &str,
        payload: &Value,
    ) -> Result<Outcome, ServiceError> {
        let scope = authorize(caller, Operation::Update, schema)?;
        let existing = self.load(&scope, Operation::Update, schema, raw_id).await?;

        let payload = strip_privileged(caller, schema, payload);
        let validated = validate_payload(schema, &payload, WriteMode::Update)?;
        self.check_references(&validated.references).await?;

        let mut fields = existing.fields;
        merge_into(schema.fields, &mut fields, validated.fields);
        apply_generated(schema, &mut fields, WriteMode::Update, caller.map(|c| &c.id), Utc::now());

        let record = self
            .store
            .replace(schema.name, &existing.id, fields)
            .await?
            .ok_or(ServiceError::NotFound(schema.title))?;
        info!("updated {}/{}", schema.name, record.id);

        match schema.flavor {
            Flavor::Relational => Ok(Outcome::Ok(self.render(schema, &record).await?)),
            Flavor::Document => Ok(Outcome::Ok(document_message(schema, "updated"))),
        }
    }

    pub async fn delete(
        &self,
        caller: Option<&Caller>,
        schema: &'static EntitySchema,
        raw_id: &str,
    ) -> Result<Outcome, ServiceError> {
        let scope = authorize(caller, Operation::Delete, schema)?;
        let record = self.load(&scope, Operation::Delete, schema, raw_id).await?;

        self.delete_cascading(schema, record.id.clone()).await?;
        info!("deleted {}/{}", schema.name, record.id);

        match schema.flavor {
            Flavor::Relational => Ok(Outcome::NoContent),
            Flavor::Document => Ok(Outcome::Ok(document_message(schema, "deleted"))),
        }
    }

    /// Fetch one row and apply the caller's row scope to it
    async fn load(
        &self,
        scope: &Scope,
        operation: Operation,
        schema: &'static EntitySchema,
        raw_id: &str,
    ) -> Result<Record, ServiceError> {
        let id = schema.identity.parse(raw_id).ok_or(ServiceError::NotFound(schema.title))?;
        let record = self
            .store
            .fetch(schema.name, &id)
            .await?
            .ok_or(ServiceError::NotFound(schema.title))?;

        match check_record(scope, operation, schema, &record) {
            RecordCheck::Allowed => Ok(record),
            RecordCheck::Forbidden(reason) => Err(Denied::Forbidden(reason).into()),
            RecordCheck::Hidden => Err(ServiceError::NotFound(schema.title)),
        }
    }

    async fn check_references(&self, references: &[PendingReference]) -> Result<(), ServiceError> {
        let mut errors = ValidationError::default();
        for reference in references {
            if errors.field_errors.contains_key(&reference.field) {
                continue;
            }
            if self.store.fetch(reference.target, &reference.id).await?.is_none() {
                errors.field_errors.insert(
                    reference.field.clone(),
                    format!("Invalid pk \"{}\" - object does not exist.", reference.id),
                );
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.into())
        }
    }

    /// Delete a record after removing everything that depends on it: rows
    /// holding a single reference are deleted (recursively), list references
    /// drop the identifier.
    fn delete_cascading(
        &self,
        schema: &'static EntitySchema,
        id: RecordId,
    ) -> BoxFuture<'_, Result<(), ServiceError>> {
        async move {
            let reference = id.to_value();
            for (source, field) in registry().referencing(schema.name) {
                let target = FilterTarget::field(field.name);
                match field.kind {
                    FieldKind::ReferenceList { .. } => {
                        let filter = FilterData::new().where_contains(target, reference.clone());
                        let rows = self.store.select(source.name, source.identity, &filter).await?;
                        for mut row in rows {
                            if let Some(Value::Array(items)) = row.fields.get_mut(field.name) {
                                items.retain(|v| v != &reference);
                            }
                            debug!(
                                "detached {}/{} from {}/{}.{}",
                                schema.name, id, source.name, row.id, field.name
                            );
                            self.store.replace(source.name, &row.id, row.fields).await?;
                        }
                    }
                    _ => {
                        let filter = FilterData::new().where_eq(target, reference.clone());
                        let rows = self.store.select(source.name, source.identity, &filter).await?;
                        for row in rows {
                            debug!(
                                "cascade delete {}/{} via {}/{}",
                                source.name, row.id, schema.name, id
                            );
                            self.delete_cascading(source, row.id).await?;
                        }
                    }
                }
            }

            if self.store.delete(schema.name, &id).await? {
                Ok(())
            } else {
                Err(ServiceError::NotFound(schema.title))
            }
        }
        .boxed()
    }

    async fn render(
        &self,
        schema: &'static EntitySchema,
        record: &Record,
    ) -> Result<Value, ServiceError> {
        let related = self.load_related(schema, std::slice::from_ref(record)).await?;
        Ok(record_to_api_value(schema, record, &related))
    }

    async fn render_all(
        &self,
        schema: &'static EntitySchema,
        records: &[Record],
    ) -> Result<Vec<Value>, ServiceError> {
        let related = self.load_related(schema, records).await?;
        Ok(records.iter().map(|r| record_to_api_value(schema, r, &related)).collect())
    }

    /// Load every record the renderer will look up, one batched select per
    /// target collection and nesting level.
    async fn load_related(
        &self,
        schema: &'static EntitySchema,
        records: &[Record],
    ) -> Result<Related, ServiceError> {
        let mut related = Related::new();
        let mut frontier: Vec<(&'static EntitySchema, Record)> =
            records.iter().map(|r| (schema, r.clone())).collect();

        for depth in 0..=NEST_DEPTH {
            let mut wanted: BTreeMap<&'static str, Vec<Value>> = BTreeMap::new();
            let mut seen: HashSet<(&'static str, String)> = HashSet::new();
            let mut nested_targets: HashSet<&'static str> = HashSet::new();

            for (owner, record) in &frontier {
                for w in wanted_references(owner, record) {
                    // Nested references past the last level render as raw ids
                    if w.nested && depth == NEST_DEPTH {
                        continue;
                    }
                    if related.contains(w.target, &w.reference)
                        || !seen.insert((w.target, w.reference.to_string()))
                    {
                        continue;
                    }
                    if w.nested {
                        nested_targets.insert(w.target);
                    }
                    wanted.entry(w.target).or_default().push(w.reference);
                }
            }

            let mut next = Vec::new();
            for (target, ids) in wanted {
                let Some(target_schema) = registry().get(target) else {
                    continue;
                };
                let filter = FilterData::new().where_in(FilterTarget::Id, ids);
                for row in self.store.select(target, target_schema.identity, &filter).await? {
                    if nested_targets.contains(target) {
                        next.push((target_schema, row.clone()));
                    }
                    related.insert(target, row);
                }
            }

            if next.is_empty() {
                break;
            }
            frontier = next;
        }

        Ok(related)
    }
}
