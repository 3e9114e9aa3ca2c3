use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// Store-assigned identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordId {
    Serial(i64),
    Object(String),
}

impl RecordId {
    /// Wire representation: numbers for serial ids, strings for object ids
    pub fn to_value(&self) -> Value {
        match self {
            RecordId::Serial(n) => Value::from(*n),
            RecordId::Object(s) => Value::String(s.clone()),
        }
    }

    /// Key used in the relational store column and in cache maps
    pub fn as_key(&self) -> String {
        self.to_string()
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordId::Serial(n) => write!(f, "{}", n),
            RecordId::Object(s) => f.write_str(s),
        }
    }
}

impl Serialize for RecordId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RecordId::Serial(n) => serializer.serialize_i64(*n),
            RecordId::Object(s) => serializer.serialize_str(s),
        }
    }
}

/// A stored record: identifier plus the field map exactly as persisted
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: RecordId,
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new(id: RecordId, fields: Map<String, Value>) -> Self {
        Self { id, fields }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ids_serialize_by_kind() {
        assert_eq!(serde_json::to_value(RecordId::Serial(7)).unwrap(), json!(7));
        assert_eq!(serde_json::to_value(RecordId::Object("ab12".into())).unwrap(), json!("ab12"));
        assert_eq!(RecordId::Serial(7).to_value(), json!(7));
        assert_eq!(RecordId::Object("ab12".into()).as_key(), "ab12");
    }
}
