//! Declarative entity schemas.
//!
//! Every entity exposed over HTTP is described by one static [`EntitySchema`]:
//! its fields and their validation rules, how its identifier is generated,
//! how it renders on the wire and which access rule guards it. The resource
//! service, the validator, the serializer and the access policy all work from
//! these declarations, so adding an entity never needs a new handler.

pub mod catalog;
pub mod validate;

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde_json::{json, Value};

use crate::database::record::RecordId;
use crate::types::Operation;

pub use validate::{validate_payload, ValidationError, WriteMode};

/// Application label prefixed to model permissions (`main_app.view_album`)
pub const APP_LABEL: &str = "main_app";

/// How the store assigns identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityKind {
    /// Auto-incrementing integer per collection, rendered as `id`
    Serial,
    /// Opaque store-generated string, rendered as `_id`
    Object,
}

impl IdentityKind {
    /// Parse a path segment into an identifier of this kind.
    /// Returns None for malformed input so callers can answer 404.
    pub fn parse(&self, raw: &str) -> Option<RecordId> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        match self {
            IdentityKind::Serial => {
                raw.parse::<i64>().ok().filter(|n| *n > 0).map(RecordId::Serial)
            }
            IdentityKind::Object => {
                if raw.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
                    Some(RecordId::Object(raw.to_string()))
                } else {
                    None
                }
            }
        }
    }

    /// Parse an identifier carried inside a JSON payload (reference fields)
    pub fn from_value(&self, value: &Value) -> Option<RecordId> {
        match (self, value) {
            (IdentityKind::Serial, Value::Number(n)) => {
                n.as_i64().filter(|n| *n > 0).map(RecordId::Serial)
            }
            (_, Value::String(s)) => self.parse(s),
            _ => None,
        }
    }
}

/// Response shape family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    /// Full serialized records on create/update, 204 on delete
    Relational,
    /// `{"_id"}` on create, message bodies on update/delete
    Document,
}

/// Access rule declared per entity; interpreted by [`crate::access`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessRule {
    Open,
    Authenticated,
    /// `Admin` sees everything, `Talent Agents` only rows they own
    AgentOwned { owner_field: &'static str },
    /// Static model permissions (`main_app.add_album`, ...)
    ModelPermission,
    /// Any authenticated caller, restricted to rows they own
    CallerOwned { owner_field: &'static str },
    /// Anyone reads and registers; a row changes only by itself or `Admin`
    SelfManaged,
}

#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    Text { max_length: Option<usize> },
    Email { max_length: usize },
    Url { max_length: usize },
    Integer,
    Float,
    Boolean,
    /// `YYYY-MM-DD`
    Date,
    /// RFC 3339
    DateTime,
    TextList,
    /// Write-only; stored as a digest
    Password,
    Reference { target: &'static str },
    ReferenceList { target: &'static str },
    Object { fields: &'static [FieldSpec] },
}

/// Values the server fills in instead of the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generated {
    /// Caller identity, stamped at create
    Caller,
    /// Timestamp at create
    CreatedAt,
    /// Timestamp at create and every update
    UpdatedAt,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue {
    Bool(bool),
    Strings(&'static [&'static str]),
}

impl DefaultValue {
    pub fn to_value(&self) -> Value {
        match self {
            DefaultValue::Bool(b) => json!(b),
            DefaultValue::Strings(items) => json!(items),
        }
    }
}

/// Wire rendering of a stored field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Render {
    Plain,
    Hidden,
    /// Replace the reference with the referenced entity's serialization
    Nested,
    /// Hide the reference, emit `key` = referenced record's `field`
    Lookup { key: &'static str, field: &'static str },
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub default: Option<DefaultValue>,
    pub generated: Option<Generated>,
    pub render: Render,
    /// Input is ignored unless the caller is in `Admin`
    pub admin_only: bool,
}

impl FieldSpec {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            default: None,
            generated: None,
            render: Render::Plain,
            admin_only: false,
        }
    }

    pub const fn text(name: &'static str, max_length: usize) -> Self {
        Self::new(name, FieldKind::Text { max_length: Some(max_length) })
    }

    pub const fn required(self) -> Self {
        Self { required: true, ..self }
    }

    pub const fn default_to(self, default: DefaultValue) -> Self {
        Self { default: Some(default), ..self }
    }

    pub const fn generated(self, generated: Generated) -> Self {
        Self { generated: Some(generated), ..self }
    }

    pub const fn render(self, render: Render) -> Self {
        Self { render, ..self }
    }

    pub const fn admin_only(self) -> Self {
        Self { admin_only: true, ..self }
    }

    /// Generated fields never accept caller input
    pub fn is_writable(&self) -> bool {
        self.generated.is_none()
    }

    pub fn reference_target(&self) -> Option<&'static str> {
        match self.kind {
            FieldKind::Reference { target } | FieldKind::ReferenceList { target } => Some(target),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct EntitySchema {
    /// Resource path segment and store collection
    pub name: &'static str,
    /// Display name used in messages ("Musician")
    pub title: &'static str,
    /// Permission codename ("album" -> `main_app.view_album`)
    pub model: &'static str,
    pub identity: IdentityKind,
    pub flavor: Flavor,
    pub access: AccessRule,
    pub fields: &'static [FieldSpec],
    /// Page size applied when the caller does not pass `limit`
    pub default_limit: Option<i64>,
}

impl EntitySchema {
    pub fn id_key(&self) -> &'static str {
        match self.identity {
            IdentityKind::Serial => "id",
            IdentityKind::Object => "_id",
        }
    }

    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Whether `name` may be used as a filter or sort key
    pub fn is_queryable(&self, name: &str) -> bool {
        name == self.id_key()
            || self
                .field(name)
                .is_some_and(|f| !matches!(f.kind, FieldKind::Password))
    }

    pub fn permission(&self, operation: Operation) -> String {
        format!("{}.{}_{}", APP_LABEL, operation.permission_verb(), self.model)
    }

    /// Article + lowercase title for reason strings ("a musician", "an album")
    pub fn noun(&self) -> String {
        let lower = self.title.to_lowercase();
        let article = match lower.chars().next() {
            Some('a' | 'e' | 'i' | 'o' | 'u') => "an",
            _ => "a",
        };
        format!("{} {}", article, lower)
    }
}

/// Lookup table over every declared entity
pub struct SchemaRegistry {
    by_name: HashMap<&'static str, &'static EntitySchema>,
    ordered: Vec<&'static EntitySchema>,
}

impl SchemaRegistry {
    pub fn new(schemas: &[&'static EntitySchema]) -> Self {
        Self {
            by_name: schemas.iter().map(|s| (s.name, *s)).collect(),
            ordered: schemas.to_vec(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&'static EntitySchema> {
        self.by_name.get(name).copied()
    }

    pub fn all(&self) -> &[&'static EntitySchema] {
        &self.ordered
    }

    /// Every (schema, field) pair whose reference points at `target`
    pub fn referencing(&self, target: &str) -> Vec<(&'static EntitySchema, &'static FieldSpec)> {
        self.ordered
            .iter()
            .flat_map(|schema| {
                schema
                    .fields
                    .iter()
                    .filter(move |f| f.reference_target() == Some(target))
                    .map(move |f| (*schema, f))
            })
            .collect()
    }
}

pub static REGISTRY: Lazy<SchemaRegistry> = Lazy::new(|| SchemaRegistry::new(catalog::ALL));

/// Convenience accessor for the global registry
pub fn registry() -> &'static SchemaRegistry {
    &REGISTRY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_ids_reject_garbage() {
        assert_eq!(IdentityKind::Serial.parse("42"), Some(RecordId::Serial(42)));
        assert_eq!(IdentityKind::Serial.parse("0"), None);
        assert_eq!(IdentityKind::Serial.parse("abc"), None);
        assert_eq!(IdentityKind::Object.parse("a1b2"), Some(RecordId::Object("a1b2".into())));
        assert_eq!(IdentityKind::Object.parse("a b"), None);
    }

    #[test]
    fn registry_resolves_every_reference_target() {
        for schema in registry().all() {
            for field in schema.fields {
                if let Some(target) = field.reference_target() {
                    assert!(
                        registry().get(target).is_some(),
                        "{}.{} -> {}",
                        schema.name,
                        field.name,
                        target
                    );
                }
            }
        }
    }

    #[test]
    fn referencing_finds_cascade_sources() {
        let sources: Vec<_> = registry()
            .referencing("record_labels")
            .into_iter()
            .map(|(s, f)| (s.name, f.name))
            .collect();
        assert_eq!(sources, vec![("albums", "label")]);
    }

    #[test]
    fn permission_codenames() {
        let album = registry().get("albums").unwrap();
        assert_eq!(album.permission(Operation::Create), "main_app.add_album");
        assert_eq!(album.permission(Operation::List), "main_app.view_album");
        assert_eq!(album.noun(), "an album");
    }
}
