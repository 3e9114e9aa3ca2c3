use std::collections::{BTreeMap, HashMap};

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::types::{FilterData, FilterOrderInfo, FilterTarget, SortDirection, SqlResult};
use crate::database::record::Record;
use crate::schema::validate::coerce_query_value;
use crate::schema::{EntitySchema, FieldKind, IdentityKind};

/// Query parameters with a fixed meaning; every other key is a field filter
pub const RESERVED_PARAMS: &[&str] = &["sort", "order", "limit", "offset"];

/// A query against one collection, renderable as SQL or applied in memory
pub struct Filter {
    identity: IdentityKind,
    data: FilterData,
}

impl Filter {
    pub fn new(collection: impl Into<String>, identity: IdentityKind) -> Result<Self, FilterError> {
        let collection = collection.into();
        Self::validate_collection_name(&collection)?;
        Ok(Self {
            identity,
            data: FilterData::default(),
        })
    }

    pub fn assign(&mut self, data: FilterData) -> &mut Self {
        self.data = data;
        self
    }

    /// `$1` is the collection name (text); the remaining parameters bind as `jsonb`.
    pub fn to_sql(&self) -> SqlResult {
        let (where_clause, params) = FilterWhere::generate(&self.data.where_clause, 1);
        let serial = self.identity == IdentityKind::Serial;
        let order_clause = FilterOrder::generate(&self.data.order, serial);
        let limit_clause = self.build_limit_clause();

        let query = [
            "SELECT id, body FROM records".to_string(),
            format!("WHERE collection = $1 AND {}", where_clause),
            order_clause,
            limit_clause,
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        SqlResult { query, params }
    }

    /// Apply conditions, ordering and paging to records given in insertion order
    pub fn apply<'a>(&self, records: impl IntoIterator<Item = &'a Record>) -> Vec<Record> {
        let mut matched: Vec<&Record> = records
            .into_iter()
            .filter(|r| FilterWhere::matches(&self.data.where_clause, r))
            .collect();
        if !self.data.order.is_empty() {
            matched.sort_by(|a, b| FilterOrder::compare(a, b, &self.data.order));
        }

        let offset = self.data.offset.unwrap_or(0).max(0) as usize;
        let limit = self.data.limit.map(|l| l.max(0) as usize).unwrap_or(usize::MAX);
        matched.into_iter().skip(offset).take(limit).cloned().collect()
    }

    fn validate_collection_name(name: &str) -> Result<(), FilterError> {
        let valid_start = name.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        if !valid_start || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(FilterError::InvalidCollection(name.to_string()));
        }
        Ok(())
    }

    fn build_limit_clause(&self) -> String {
        match (self.data.limit, self.data.offset) {
            (Some(l), Some(o)) => format!("LIMIT {} OFFSET {}", l, o),
            (Some(l), None) => format!("LIMIT {}", l),
            (None, Some(o)) => format!("OFFSET {}", o),
            (None, None) => String::new(),
        }
    }
}

impl FilterData {
    /// Build a query from list-endpoint parameters
    /// (`field=value&sort=field&order=asc|desc&limit=n&offset=n`).
    pub fn from_query(
        schema: &EntitySchema,
        params: &HashMap<String, String>,
        max_limit: Option<i64>,
    ) -> Result<Self, FilterError> {
        let mut data = FilterData::new();

        // Sorted for a stable condition order
        let sorted: BTreeMap<&String, &String> = params.iter().collect();
        for (key, raw) in sorted {
            if RESERVED_PARAMS.contains(&key.as_str()) {
                continue;
            }
            if !schema.is_queryable(key) {
                return Err(FilterError::InvalidColumn(key.to_string()));
            }
            let spec = schema.field(key);
            let value = coerce_query_value(spec, schema.identity, raw);
            let target = target_for(schema, key);
            data = match spec.map(|s| s.kind) {
                Some(FieldKind::TextList) | Some(FieldKind::ReferenceList { .. }) => {
                    data.where_contains(target, value)
                }
                _ => data.where_eq(target, value),
            };
        }

        let default_sort = match params.get("order") {
            Some(raw) => SortDirection::parse(raw.trim())
                .ok_or_else(|| FilterError::InvalidOrder(raw.clone()))?,
            None => SortDirection::Asc,
        };
        if let Some(sort) = params.get("sort") {
            for (column, direction) in FilterOrder::parse_order_string(sort, default_sort)? {
                if !schema.is_queryable(&column) {
                    return Err(FilterError::InvalidColumn(column));
                }
                data.order.push(FilterOrderInfo {
                    target: target_for(schema, &column),
                    sort: direction,
                });
            }
        }

        let requested = match params.get("limit") {
            Some(raw) => {
                let limit = parse_non_negative(raw);
                Some(limit.ok_or_else(|| FilterError::InvalidLimit(raw.clone()))?)
            }
            None => schema.default_limit,
        };
        data.limit = match (requested, max_limit) {
            (Some(l), Some(max)) if l > max => {
                tracing::debug!("Limit {} exceeds max {}, capping to max", l, max);
                Some(max)
            }
            (l, _) => l,
        };

        if let Some(raw) = params.get("offset") {
            let offset = parse_non_negative(raw);
            data.offset = Some(offset.ok_or_else(|| FilterError::InvalidOffset(raw.clone()))?);
        }

        Ok(data)
    }
}

fn target_for(schema: &EntitySchema, key: &str) -> FilterTarget {
    if key == schema.id_key() {
        FilterTarget::Id
    } else {
        FilterTarget::field(key)
    }
}

fn parse_non_negative(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok().filter(|n| *n >= 0)
}
