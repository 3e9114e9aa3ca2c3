//! Payload validation shared by every entity, whatever store backs it.
//!
//! A payload is checked against the declared [`FieldSpec`]s: unknown keys are
//! ignored, `null` and absent keys are dropped, values are coerced to the
//! field's kind and all failures are collected into one field-keyed map.
//! Reference existence needs the store, so references are returned to the
//! caller as [`PendingReference`]s instead of being checked here.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::{Map, Number, Value};

use super::{registry, EntitySchema, FieldKind, FieldSpec, Generated, IdentityKind};
use crate::auth::hash_password;
use crate::database::record::RecordId;

const BAD_DATE: &str = "Date has wrong format. Use one of these formats instead: YYYY-MM-DD.";
const BAD_DATETIME: &str =
    "Datetime has wrong format. Use one of these formats instead: YYYY-MM-DDThh:mm:ss[.uuuuuu]Z.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Create,
    Update,
}

/// Field-keyed validation failures (nested fields use dotted paths)
#[derive(Debug, Clone, Default, PartialEq, thiserror::Error)]
#[error("Validation failed: {field_errors:?}")]
pub struct ValidationError {
    pub field_errors: HashMap<String, String>,
}

impl ValidationError {
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut field_errors = HashMap::new();
        field_errors.insert(field.into(), message.into());
        Self { field_errors }
    }

    pub fn is_empty(&self) -> bool {
        self.field_errors.is_empty()
    }

    fn add(&mut self, field: &str, message: impl Into<String>) {
        self.field_errors.entry(field.to_string()).or_insert_with(|| message.into());
    }
}

/// A reference value whose target must exist before the write goes through
#[derive(Debug, Clone, PartialEq)]
pub struct PendingReference {
    pub field: String,
    pub target: &'static str,
    pub id: RecordId,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Validated {
    pub fields: Map<String, Value>,
    pub references: Vec<PendingReference>,
}

pub fn validate_payload(
    schema: &EntitySchema,
    payload: &Value,
    mode: WriteMode,
) -> Result<Validated, ValidationError> {
    let Value::Object(input) = payload else {
        return Err(ValidationError::single(
            "non_field_errors",
            format!("Invalid data. Expected a dictionary, but got {}.", type_name(payload)),
        ));
    };

    let mut errors = ValidationError::default();
    let mut out = Validated::default();
    out.fields = validate_fields(schema.fields, input, mode, "", &mut errors, &mut out.references);

    if errors.is_empty() {
        Ok(out)
    } else {
        Err(errors)
    }
}

fn validate_fields(
    specs: &[FieldSpec],
    input: &Map<String, Value>,
    mode: WriteMode,
    prefix: &str,
    errors: &mut ValidationError,
    references: &mut Vec<PendingReference>,
) -> Map<String, Value> {
    let mut fields = Map::new();

    for spec in specs.iter().filter(|s| s.is_writable()) {
        let path = if prefix.is_empty() {
            spec.name.to_string()
        } else {
            format!("{}.{}", prefix, spec.name)
        };

        match input.get(spec.name) {
            None | Some(Value::Null) => {
                if mode == WriteMode::Create {
                    if let Some(default) = &spec.default {
                        fields.insert(spec.name.to_string(), default.to_value());
                    } else if spec.required {
                        errors.add(&path, "This field is required.");
                    }
                }
            }
            Some(value) => {
                if let Some(coerced) = coerce(spec, value, mode, &path, errors, references) {
                    fields.insert(spec.name.to_string(), coerced);
                }
            }
        }
    }

    fields
}

fn coerce(
    spec: &FieldSpec,
    value: &Value,
    mode: WriteMode,
    path: &str,
    errors: &mut ValidationError,
    references: &mut Vec<PendingReference>,
) -> Option<Value> {
    let result = match spec.kind {
        FieldKind::Text { max_length } => coerce_text(value, spec.required, max_length),
        FieldKind::Email { max_length } => coerce_checked(
            value,
            spec.required,
            max_length,
            is_valid_email,
            "Enter a valid email address.",
        ),
        FieldKind::Url { max_length } => {
            coerce_checked(value, spec.required, max_length, is_valid_url, "Enter a valid URL.")
        }
        FieldKind::Integer => coerce_integer(value),
        FieldKind::Float => coerce_float(value),
        FieldKind::Boolean => coerce_bool(value),
        FieldKind::Date => value
            .as_str()
            .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
            .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
            .ok_or_else(|| BAD_DATE.to_string()),
        FieldKind::DateTime => value
            .as_str()
            .and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok())
            .map(|dt| {
                let utc = dt.with_timezone(&Utc);
                Value::String(utc.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            })
            .ok_or_else(|| BAD_DATETIME.to_string()),
        FieldKind::TextList => match value {
            Value::Array(items) if items.iter().all(Value::is_string) => {
                Ok(Value::Array(items.clone()))
            }
            _ => Err("Expected a list of strings.".to_string()),
        },
        FieldKind::Password => match value {
            Value::String(s) if !s.is_empty() => Ok(Value::String(hash_password(s))),
            Value::String(_) => Err("This field may not be blank.".to_string()),
            _ => Err("Not a valid string.".to_string()),
        },
        FieldKind::Reference { target } => match identity_of(target).from_value(value) {
            Some(id) => {
                references.push(PendingReference {
                    field: path.to_string(),
                    target,
                    id: id.clone(),
                });
                Ok(id.to_value())
            }
            None => Err(bad_pk(value)),
        },
        FieldKind::ReferenceList { target } => match value {
            Value::Array(items) => {
                let identity = identity_of(target);
                let mut ids: Vec<RecordId> = Vec::with_capacity(items.len());
                let mut bad = None;
                for item in items {
                    match identity.from_value(item) {
                        Some(id) if !ids.contains(&id) => ids.push(id),
                        Some(_) => {}
                        None => {
                            bad = Some(bad_pk(item));
                            break;
                        }
                    }
                }
                match bad {
                    Some(msg) => Err(msg),
                    None => {
                        references.extend(ids.iter().map(|id| PendingReference {
                            field: path.to_string(),
                            target,
                            id: id.clone(),
                        }));
                        Ok(Value::Array(ids.iter().map(RecordId::to_value).collect()))
                    }
                }
            }
            other => Err(format!(
                "Expected a list of items but got type \"{}\".",
                type_name(other)
            )),
        },
        FieldKind::Object { fields } => match value {
            Value::Object(nested) => {
                let nested = validate_fields(fields, nested, mode, path, errors, references);
                Ok(Value::Object(nested))
            }
            other => Err(format!(
                "Expected a dictionary of items but got type \"{}\".",
                type_name(other)
            )),
        },
    };

    match result {
        Ok(v) => Some(v),
        Err(message) => {
            errors.add(path, message);
            None
        }
    }
}

fn bad_pk(value: &Value) -> String {
    format!("Incorrect type. Expected pk value, received {}.", type_name(value))
}

/// Text with a format check; blank optional values pass through
fn coerce_checked(
    value: &Value,
    required: bool,
    max_length: usize,
    valid: fn(&str) -> bool,
    message: &str,
) -> Result<Value, String> {
    let coerced = coerce_text(value, required, Some(max_length))?;
    let s = coerced.as_str().unwrap_or_default();
    if s.is_empty() || valid(s) {
        Ok(Value::String(s.to_string()))
    } else {
        Err(message.to_string())
    }
}

fn coerce_text(
    value: &Value,
    required: bool,
    max_length: Option<usize>,
) -> Result<Value, String> {
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return Err("Not a valid string.".to_string()),
    };
    if required && s.is_empty() {
        return Err("This field may not be blank.".to_string());
    }
    if let Some(max) = max_length {
        if s.chars().count() > max {
            return Err(format!("Ensure this field has no more than {} characters.", max));
        }
    }
    Ok(Value::String(s))
}

fn coerce_integer(value: &Value) -> Result<Value, String> {
    let parsed = match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.is_finite())
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.map(Value::from).ok_or_else(|| "A valid integer is required.".to_string())
}

fn coerce_float(value: &Value) -> Result<Value, String> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| "A valid number is required.".to_string())
}

fn coerce_bool(value: &Value) -> Result<Value, String> {
    let parsed = match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    };
    parsed.map(Value::Bool).ok_or_else(|| "Must be a valid boolean.".to_string())
}

/// Coerce a query-string value to the field's kind for equality filters.
/// Falls back to the raw string when the value does not fit the kind.
pub fn coerce_query_value(spec: Option<&FieldSpec>, identity: IdentityKind, raw: &str) -> Value {
    let raw_value = Value::String(raw.to_string());
    let Some(spec) = spec else {
        // Identifier key
        return identity.parse(raw).map(|id| id.to_value()).unwrap_or(raw_value);
    };
    let coerced = match spec.kind {
        FieldKind::Integer => coerce_integer(&raw_value).ok(),
        FieldKind::Float => coerce_float(&raw_value).ok(),
        FieldKind::Boolean => coerce_bool(&raw_value).ok(),
        FieldKind::Reference { target } | FieldKind::ReferenceList { target } => {
            identity_of(target).parse(raw).map(|id| id.to_value())
        }
        _ => None,
    };
    coerced.unwrap_or(raw_value)
}

/// Fill server-owned values: caller stamps and timestamps.
pub fn apply_generated(
    schema: &EntitySchema,
    fields: &mut Map<String, Value>,
    mode: WriteMode,
    caller_id: Option<&RecordId>,
    now: DateTime<Utc>,
) {
    let stamp = Value::String(now.to_rfc3339_opts(SecondsFormat::AutoSi, true));
    for spec in schema.fields {
        match (spec.generated, mode) {
            (Some(Generated::Caller), WriteMode::Create) => {
                if let Some(id) = caller_id {
                    fields.insert(spec.name.to_string(), id.to_value());
                }
            }
            (Some(Generated::CreatedAt), WriteMode::Create) | (Some(Generated::UpdatedAt), _) => {
                fields.insert(spec.name.to_string(), stamp.clone());
            }
            _ => {}
        }
    }
}

/// Merge validated changes into a stored field map; object fields merge key by key.
pub fn merge_into(
    specs: &[FieldSpec],
    target: &mut Map<String, Value>,
    changes: Map<String, Value>,
) {
    for (key, value) in changes {
        let nested_specs = specs.iter().find(|s| s.name == key).and_then(|s| match s.kind {
            FieldKind::Object { fields } => Some(fields),
            _ => None,
        });

        match (nested_specs, value) {
            (Some(nested), Value::Object(incoming)) => {
                let slot = target.entry(key).or_insert_with(|| Value::Object(Map::new()));
                if let Value::Object(existing) = slot {
                    merge_into(nested, existing, incoming);
                } else {
                    *slot = Value::Object(incoming);
                }
            }
            (_, value) => {
                target.insert(key, value);
            }
        }
    }
}

fn identity_of(target: &str) -> IdentityKind {
    registry().get(target).map(|s| s.identity).unwrap_or(IdentityKind::Serial)
}

fn is_valid_email(s: &str) -> bool {
    if s.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && domain.split('.').all(|label| !label.is_empty())
}

fn is_valid_url(s: &str) -> bool {
    url::Url::parse(s)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .unwrap_or(false)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::catalog::{ALBUM, EVENT, METEORITE_LANDING, RECORD_LABEL, TODO, USER, VENUE};
    use serde_json::json;

    fn message<'a>(err: &'a ValidationError, field: &str) -> Option<&'a str> {
        err.field_errors.get(field).map(String::as_str)
    }

    #[test]
    fn create_requires_declared_fields() {
        let payload = json!({"name": "Label"});
        let err = validate_payload(&RECORD_LABEL, &payload, WriteMode::Create).unwrap_err();
        assert_eq!(message(&err, "address"), Some("This field is required."));
        assert!(err.field_errors.contains_key("email"));
        assert!(!err.field_errors.contains_key("name"));
    }

    #[test]
    fn update_drops_nulls_and_absent_fields() {
        let payload = json!({"name": "New", "email": null});
        let out = validate_payload(&RECORD_LABEL, &payload, WriteMode::Update).unwrap();
        assert_eq!(Value::Object(out.fields), json!({"name": "New"}));
    }

    #[test]
    fn text_length_and_email_rules() {
        let long = "x".repeat(101);
        let err = validate_payload(
            &RECORD_LABEL,
            &json!({"name": long, "address": "a", "email": "not-an-email"}),
            WriteMode::Create,
        )
        .unwrap_err();
        assert_eq!(
            err.field_errors.get("name").map(String::as_str),
            Some("Ensure this field has no more than 100 characters.")
        );
        assert_eq!(message(&err, "email"), Some("Enter a valid email address."));
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let out = validate_payload(
            &RECORD_LABEL,
            &json!({"name": "L", "address": "A", "email": "a@b.co", "extra": 1}),
            WriteMode::Create,
        )
        .unwrap();
        assert!(!out.fields.contains_key("extra"));
    }

    #[test]
    fn album_collects_references_and_normalizes_date() {
        let out = validate_payload(
            &ALBUM,
            &json!({
                "title": "T", "artist": "A", "release_date": "2024-08-04", "genre": "Rock",
                "label": 1, "album_members": [2, 3, 2]
            }),
            WriteMode::Create,
        )
        .unwrap();
        assert_eq!(out.fields["album_members"], json!([2, 3]));
        let targets: Vec<_> = out.references.iter().map(|r| (r.target, r.id.clone())).collect();
        assert_eq!(
            targets,
            vec![
                ("record_labels", RecordId::Serial(1)),
                ("musicians", RecordId::Serial(2)),
                ("musicians", RecordId::Serial(3)),
            ]
        );
    }

    #[test]
    fn bad_date_and_reference_types() {
        let err = validate_payload(
            &ALBUM,
            &json!({
                "title": "T", "artist": "A", "release_date": "04/08/2024",
                "genre": "Rock", "label": "abc"
            }),
            WriteMode::Create,
        )
        .unwrap_err();
        assert!(err.field_errors.contains_key("release_date"));
        assert!(err.field_errors.contains_key("label"));
    }

    #[test]
    fn venue_website_must_be_http_url() {
        let err = validate_payload(&VENUE, &json!({"website": "ftp://x"}), WriteMode::Update)
            .unwrap_err();
        assert_eq!(message(&err, "website"), Some("Enter a valid URL."));
        let ok = json!({"website": "https://club.example"});
        assert!(validate_payload(&VENUE, &ok, WriteMode::Update).is_ok());
    }

    #[test]
    fn user_defaults_roles_and_hashes_password() {
        let payload = json!({"username": "luke", "password": "secret"});
        let out = validate_payload(&USER, &payload, WriteMode::Create).unwrap();
        assert_eq!(out.fields["roles"], json!(["user"]));
        assert_eq!(out.fields["password"], json!(hash_password("secret")));
        assert_ne!(out.fields["password"], json!("secret"));
    }

    #[test]
    fn nested_profile_errors_use_dotted_paths() {
        let err = validate_payload(
            &USER,
            &json!({"username": "u", "password": "p", "profile_data": {"email": "nope"}}),
            WriteMode::Create,
        )
        .unwrap_err();
        assert!(err.field_errors.contains_key("profile_data.email"));
    }

    #[test]
    fn meteorite_numbers_accept_numeric_strings() {
        let out = validate_payload(
            &METEORITE_LANDING,
            &json!({"name": "Aachen", "id": "1", "mass (g)": "21", "reclat": 50.775}),
            WriteMode::Create,
        )
        .unwrap();
        assert_eq!(out.fields["id"], json!(1));
        assert_eq!(out.fields["mass (g)"], json!(21.0));
        let payload = json!({"reclong": "east"});
        let err = validate_payload(&METEORITE_LANDING, &payload, WriteMode::Update).unwrap_err();
        assert!(err.field_errors.contains_key("reclong"));
    }

    #[test]
    fn generated_fields_are_not_writable() {
        let out = validate_payload(
            &TODO,
            &json!({"task": "t", "user": "someone-else", "timestamp": "2020-01-01T00:00:00Z"}),
            WriteMode::Create,
        )
        .unwrap();
        assert!(!out.fields.contains_key("user"));
        assert!(!out.fields.contains_key("timestamp"));
        assert_eq!(out.fields["completed"], json!(false));
    }

    #[test]
    fn apply_generated_stamps_caller_and_times() {
        let mut fields = Map::new();
        let now = Utc::now();
        let caller = RecordId::Object("abc".into());
        apply_generated(&TODO, &mut fields, WriteMode::Create, Some(&caller), now);
        assert_eq!(fields["user"], json!("abc"));
        assert!(fields.contains_key("timestamp"));
        assert!(fields.contains_key("updated"));

        let mut update = Map::new();
        apply_generated(&TODO, &mut update, WriteMode::Update, Some(&caller), now);
        assert!(!update.contains_key("user"));
        assert!(!update.contains_key("timestamp"));
        assert!(update.contains_key("updated"));
    }

    #[test]
    fn merge_keeps_untouched_nested_keys() {
        let mut stored = json!({
            "username": "u",
            "profile_data": {"first_name": "Luke", "email": "l@x.io"}
        })
        .as_object()
        .unwrap()
        .clone();
        let changes = json!({"profile_data": {"email": "new@x.io"}}).as_object().unwrap().clone();
        merge_into(USER.fields, &mut stored, changes);
        assert_eq!(stored["profile_data"], json!({"first_name": "Luke", "email": "new@x.io"}));
    }

    #[test]
    fn event_datetime_is_normalized_to_utc() {
        let payload = json!({"event_date": "2024-05-01T19:30:00+10:00"});
        let out = validate_payload(&EVENT, &payload, WriteMode::Update).unwrap();
        assert_eq!(out.fields["event_date"], json!("2024-05-01T09:30:00Z"));
    }

    #[test]
    fn query_values_follow_field_kind() {
        assert_eq!(coerce_query_value(TODO.field("completed"), TODO.identity, "true"), json!(true));
        assert_eq!(coerce_query_value(None, TODO.identity, "5"), json!(5));
        assert_eq!(coerce_query_value(TODO.field("task"), TODO.identity, "5"), json!("5"));
    }

    #[test]
    fn non_object_payload_is_rejected() {
        let err = validate_payload(&RECORD_LABEL, &json!([1, 2]), WriteMode::Create).unwrap_err();
        assert!(err.field_errors.contains_key("non_field_errors"));
    }
}
