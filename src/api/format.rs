use std::collections::HashMap;

use serde_json::{json, Map, Value};

use crate::database::record::Record;
use crate::schema::{registry, EntitySchema, FieldKind, Flavor, Render};

/// How many levels of `Render::Nested` references are expanded
pub const NEST_DEPTH: usize = 1;

/// Referenced records loaded for rendering, keyed by collection and identifier
#[derive(Debug, Default)]
pub struct Related {
    records: HashMap<(&'static str, String), Record>,
}

impl Related {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, collection: &'static str, record: Record) {
        self.records.insert((collection, record.id.as_key()), record);
    }

    pub fn contains(&self, collection: &'static str, reference: &Value) -> bool {
        self.get(collection, reference).is_some()
    }

    /// Look up the record a stored reference value points at
    pub fn get(&self, collection: &'static str, reference: &Value) -> Option<&Record> {
        let key = reference_key(reference)?;
        self.records.get(&(collection, key))
    }
}

/// A reference the renderer will need resolved
#[derive(Debug, Clone, PartialEq)]
pub struct WantedReference {
    pub target: &'static str,
    pub reference: Value,
    /// Expanded into the referenced entity's own rendering
    pub nested: bool,
}

fn reference_key(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

/// References of `record` that rendering it would look up
pub fn wanted_references(schema: &EntitySchema, record: &Record) -> Vec<WantedReference> {
    let mut wanted = Vec::new();
    for spec in schema.fields {
        let Some(target) = spec.reference_target() else {
            continue;
        };
        let nested = match spec.render {
            Render::Nested => true,
            Render::Lookup { .. } => false,
            Render::Plain | Render::Hidden => continue,
        };
        match record.get(spec.name) {
            Some(Value::Array(items)) => {
                wanted.extend(items.iter().map(|reference| WantedReference {
                    target,
                    reference: reference.clone(),
                    nested,
                }))
            }
            Some(Value::Null) | None => {}
            Some(reference) => wanted.push(WantedReference {
                target,
                reference: reference.clone(),
                nested,
            }),
        }
    }
    wanted
}

/// Render a stored record on the wire: identifier first, then declared
/// fields in schema order. Relational entities render every declared field
/// (missing ones as null); documents render only what is stored.
pub fn record_to_api_value(schema: &EntitySchema, record: &Record, related: &Related) -> Value {
    render(schema, record, related, NEST_DEPTH)
}

fn render(schema: &EntitySchema, record: &Record, related: &Related, depth: usize) -> Value {
    let mut out = Map::new();
    out.insert(schema.id_key().to_string(), record.id.to_value());

    for spec in schema.fields {
        let stored = record.get(spec.name);
        match spec.render {
            Render::Hidden => {}
            Render::Lookup { key, field } => {
                let looked_up = match (spec.reference_target(), stored) {
                    (Some(target), Some(reference)) => related
                        .get(target, reference)
                        .and_then(|r| r.get(field))
                        .cloned()
                        .unwrap_or(Value::Null),
                    _ => Value::Null,
                };
                out.insert(key.to_string(), looked_up);
            }
            Render::Nested if depth > 0 => {
                let value = match (spec.kind, stored) {
                    (FieldKind::ReferenceList { target }, Some(Value::Array(items))) => {
                        Value::Array(
                            items
                                .iter()
                                .map(|reference| expand(target, reference, related, depth))
                                .collect(),
                        )
                    }
                    (FieldKind::Reference { target }, Some(reference)) => {
                        expand(target, reference, related, depth)
                    }
                    (_, stored) => stored.cloned().unwrap_or(Value::Null),
                };
                out.insert(spec.name.to_string(), value);
            }
            Render::Nested | Render::Plain => match stored {
                Some(value) => {
                    out.insert(spec.name.to_string(), value.clone());
                }
                None if schema.flavor == Flavor::Relational => {
                    out.insert(spec.name.to_string(), Value::Null);
                }
                None => {}
            },
        }
    }

    Value::Object(out)
}

// Referenced entity's own rendering, or the raw reference when unavailable
fn expand(target: &'static str, reference: &Value, related: &Related, depth: usize) -> Value {
    match (registry().get(target), related.get(target, reference)) {
        (Some(schema), Some(record)) => render(schema, record, related, depth - 1),
        _ => reference.clone(),
    }
}

/// `{"_id": "..."}` body returned by document creates
pub fn created_document(schema: &EntitySchema, record: &Record) -> Value {
    json!({ schema.id_key(): record.id.to_value() })
}

/// `{"message": "User updated successfully"}`
pub fn document_message(schema: &EntitySchema, verb: &str) -> Value {
    json!({ "message": format!("{} {} successfully", schema.title, verb) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::record::RecordId;
    use crate::schema::catalog::{ALBUM, METEORITE_LANDING, MUSICIAN, RECORD_LABEL, USER};

    fn rec(id: RecordId, body: Value) -> Record {
        Record::new(id, body.as_object().cloned().unwrap_or_default())
    }

    fn keys(value: &Value) -> Vec<String> {
        value.as_object().map(|m| m.keys().cloned().collect()).unwrap_or_default()
    }

    #[test]
    fn identifier_first_then_schema_order() {
        let label = rec(
            RecordId::Serial(1),
            json!({"email": "e@x.io", "name": "Blue Note", "address": "NYC"}),
        );
        let out = record_to_api_value(&RECORD_LABEL, &label, &Related::new());
        assert_eq!(keys(&out), vec!["id", "name", "address", "email"]);
        assert_eq!(out["id"], json!(1));
    }

    #[test]
    fn album_expands_label_and_members() {
        let mut related = Related::new();
        related.insert(
            "record_labels",
            rec(RecordId::Serial(1), json!({"name": "L", "address": "A", "email": "l@x.io"})),
        );
        related.insert(
            "musicians",
            rec(
                RecordId::Serial(2),
                json!({"first_name": "M", "last_name": "D", "instrument": "tpt", "agent": "u1"}),
            ),
        );
        related.insert(
            "users",
            rec(RecordId::Object("u1".into()), json!({"username": "agent1", "password": "x"})),
        );

        let album = rec(
            RecordId::Serial(5),
            json!({
                "title": "Kind of Blue", "artist": "MD", "release_date": "1959-08-17",
                "genre": "Jazz", "label": 1, "album_members": [2, 9]
            }),
        );
        let out = record_to_api_value(&ALBUM, &album, &related);
        assert_eq!(out["label"]["name"], json!("L"));
        assert_eq!(out["album_members"][0]["agent_username"], json!("agent1"));
        assert!(out["album_members"][0].get("agent").is_none());
        // Dangling members fall back to the raw reference
        assert_eq!(out["album_members"][1], json!(9));
    }

    #[test]
    fn musician_renders_agent_username_only() {
        let musician = rec(
            RecordId::Serial(1),
            json!({"first_name": "A", "last_name": "B", "instrument": "bass"}),
        );
        let out = record_to_api_value(&MUSICIAN, &musician, &Related::new());
        assert_eq!(out["agent_username"], Value::Null);
        assert!(out.get("agent").is_none());
    }

    #[test]
    fn documents_hide_password_and_skip_missing() {
        let user = rec(
            RecordId::Object("abc".into()),
            json!({"username": "luke", "password": "digest", "roles": ["user"]}),
        );
        let out = record_to_api_value(&USER, &user, &Related::new());
        assert_eq!(keys(&out), vec!["_id", "username", "roles"]);

        let landing = rec(
            RecordId::Object("m1".into()),
            json!({"name": "Aachen", "mass (g)": 21.0}),
        );
        let out = record_to_api_value(&METEORITE_LANDING, &landing, &Related::new());
        assert_eq!(keys(&out), vec!["_id", "name", "mass (g)"]);
    }

    #[test]
    fn wanted_references_cover_nested_and_lookups() {
        let album = rec(RecordId::Serial(5), json!({"label": 1, "album_members": [2, 3]}));
        let wanted: Vec<_> = wanted_references(&ALBUM, &album)
            .into_iter()
            .map(|w| (w.target, w.reference))
            .collect();
        assert_eq!(
            wanted,
            vec![("record_labels", json!(1)), ("musicians", json!(2)), ("musicians", json!(3))]
        );

        let musician = rec(RecordId::Serial(1), json!({"agent": "u1"}));
        let wanted = wanted_references(&MUSICIAN, &musician);
        assert_eq!(wanted.len(), 1);
        assert!(!wanted[0].nested);
    }

    #[test]
    fn document_bodies() {
        let user = rec(RecordId::Object("abc".into()), json!({}));
        assert_eq!(created_document(&USER, &user), json!({"_id": "abc"}));
        assert_eq!(
            document_message(&USER, "updated"),
            json!({"message": "User updated successfully"})
        );
        assert_eq!(
            document_message(&METEORITE_LANDING, "deleted"),
            json!({"message": "Record deleted successfully"})
        );
    }
}
