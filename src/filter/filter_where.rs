use serde_json::Value;

use super::types::{FilterOp, FilterTarget, FilterWhereInfo};
use crate::database::record::Record;

/// Compiles conditions to a parameterized SQL predicate over the `records`
/// table, and evaluates the same conditions against in-memory records.
pub struct FilterWhere {
    param_values: Vec<Value>,
    param_index: usize,
}

impl FilterWhere {
    pub fn new(starting_param_index: usize) -> Self {
        Self {
            param_values: vec![],
            param_index: starting_param_index,
        }
    }

    /// Returns the predicate (without `WHERE`) and its parameters, numbered
    /// from `starting_param_index + 1`. Every parameter binds as `jsonb`.
    pub fn generate(
        conditions: &[FilterWhereInfo],
        starting_param_index: usize,
    ) -> (String, Vec<Value>) {
        let mut filter_where = Self::new(starting_param_index);
        let sql_conditions: Vec<String> = conditions
            .iter()
            .map(|c| filter_where.build_sql_condition(c))
            .collect();
        let where_clause = if sql_conditions.is_empty() {
            "1=1".to_string()
        } else {
            sql_conditions.join(" AND ")
        };
        (where_clause, filter_where.param_values)
    }

    fn build_sql_condition(&mut self, condition: &FilterWhereInfo) -> String {
        match (&condition.target, condition.operator) {
            (FilterTarget::Id, FilterOp::In) => match &condition.data {
                Value::Array(values) if values.is_empty() => "1=0".to_string(),
                Value::Array(values) => {
                    let params: Vec<String> =
                        values.iter().map(|v| self.id_param(v.clone())).collect();
                    format!("id IN ({})", params.join(", "))
                }
                other => format!("id = {}", self.id_param(other.clone())),
            },
            (FilterTarget::Id, _) => format!("id = {}", self.id_param(condition.data.clone())),
            (target @ FilterTarget::Field(_), FilterOp::Eq) => {
                let column = target_sql(target);
                if condition.data.is_null() {
                    format!("({} IS NULL OR {} = 'null'::jsonb)", column, column)
                } else {
                    format!("{} = {}", column, self.param(condition.data.clone()))
                }
            }
            (target @ FilterTarget::Field(_), FilterOp::In) => {
                let column = target_sql(target);
                match &condition.data {
                    Value::Array(values) if values.is_empty() => "1=0".to_string(),
                    Value::Array(values) => {
                        let params: Vec<String> =
                            values.iter().map(|v| self.param(v.clone())).collect();
                        format!("{} IN ({})", column, params.join(", "))
                    }
                    other => format!("{} = {}", column, self.param(other.clone())),
                }
            }
            (target @ FilterTarget::Field(_), FilterOp::Contains) => {
                let column = target_sql(target);
                format!("{} @> {}", column, self.param(Value::Array(vec![condition.data.clone()])))
            }
        }
    }

    fn param(&mut self, value: Value) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}", self.param_index)
    }

    // Identifiers live in a text column; unwrap the jsonb scalar to text
    fn id_param(&mut self, value: Value) -> String {
        format!("({} #>> '{{}}')", self.param(value))
    }

    pub fn matches(conditions: &[FilterWhereInfo], record: &Record) -> bool {
        conditions.iter().all(|c| Self::matches_one(c, record))
    }

    fn matches_one(condition: &FilterWhereInfo, record: &Record) -> bool {
        let actual = target_value(&condition.target, record);
        match condition.operator {
            FilterOp::Eq => json_eq(&actual, &condition.data),
            FilterOp::In => match &condition.data {
                Value::Array(values) => values.iter().any(|v| json_eq(&actual, v)),
                other => json_eq(&actual, other),
            },
            FilterOp::Contains => match &actual {
                Value::Array(items) => items.iter().any(|v| json_eq(v, &condition.data)),
                _ => false,
            },
        }
    }
}

/// SQL expression for a target. Field names are embedded as escaped literals.
pub fn target_sql(target: &FilterTarget) -> String {
    match target {
        FilterTarget::Id => "id".to_string(),
        FilterTarget::Field(name) => format!("body -> {}", quote_literal(name)),
    }
}

/// Value of a target in a stored record; missing keys read as null
pub fn target_value(target: &FilterTarget, record: &Record) -> Value {
    match target {
        FilterTarget::Id => record.id.to_value(),
        FilterTarget::Field(name) => record.fields.get(name).cloned().unwrap_or(Value::Null),
    }
}

fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// JSON equality with numeric comparison by value (1 == 1.0), like jsonb
pub fn json_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| json_eq(x, y))
        }
        _ => a == b,
    }
}
