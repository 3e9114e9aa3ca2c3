use std::cmp::Ordering;

use serde_json::Value;

use super::error::FilterError;
use super::filter_where::{target_sql, target_value};
use super::types::{FilterOrderInfo, FilterTarget, SortDirection};
use crate::database::record::Record;

pub struct FilterOrder;

impl FilterOrder {
    /// Parse `"name desc, id"` style sort lists. Tokens without a direction
    /// use `default_sort`.
    pub fn parse_order_string(
        s: &str,
        default_sort: SortDirection,
    ) -> Result<Vec<(String, SortDirection)>, FilterError> {
        let mut out = Vec::new();
        for part in s.split(',') {
            let trimmed = part.trim();
            if trimmed.is_empty() {
                continue;
            }
            // Field names may contain spaces ("mass (g)"), so only a trailing
            // asc/desc token is treated as a direction
            let (column, sort) = match trimmed.rsplit_once(char::is_whitespace) {
                Some((col, dir)) => match SortDirection::parse(dir) {
                    Some(sort) => (col.trim(), sort),
                    None => (trimmed, default_sort),
                },
                None => (trimmed, default_sort),
            };
            out.push((column.to_string(), sort));
        }
        Ok(out)
    }

    /// `ORDER BY` clause; insertion order (`seq`) breaks ties and is the
    /// default when no sort keys are given.
    pub fn generate(infos: &[FilterOrderInfo], serial_ids: bool) -> String {
        let mut parts: Vec<String> = infos
            .iter()
            .map(|info| {
                let column = match (&info.target, serial_ids) {
                    (FilterTarget::Id, true) => "seq".to_string(),
                    (target, _) => target_sql(target),
                };
                format!("{} {}", column, info.sort.to_sql())
            })
            .collect();
        parts.push("seq ASC".to_string());
        format!("ORDER BY {}", parts.join(", "))
    }

    /// In-memory comparison with the same semantics as [`FilterOrder::generate`]
    /// minus the tiebreak, which a stable sort over insertion order supplies.
    pub fn compare(a: &Record, b: &Record, infos: &[FilterOrderInfo]) -> Ordering {
        for info in infos {
            let ordering = match info.target {
                FilterTarget::Id => a.id.cmp(&b.id),
                _ => compare_values(&target_value(&info.target, a), &target_value(&info.target, b)),
            };
            let ordering = match info.sort {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

// Missing values sort first ascending, matching NULLS FIRST
fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::String(_) => 1,
        Value::Number(_) => 2,
        Value::Bool(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Array(xs), Value::Array(ys)) => xs
            .iter()
            .zip(ys)
            .map(|(x, y)| compare_values(x, y))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or_else(|| xs.len().cmp(&ys.len())),
        (Value::Object(_), Value::Object(_)) => a.to_string().cmp(&b.to_string()),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}
