use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "$eq")] Eq,
    #[serde(rename = "$in")] In,
    /// List field holds the value
    #[serde(rename = "$contains")] Contains,
}

/// What a condition or sort key points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterTarget {
    /// The store-assigned identifier
    Id,
    /// A key inside the record body
    Field(String),
}

impl FilterTarget {
    pub fn field(name: impl Into<String>) -> Self {
        FilterTarget::Field(name.into())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterWhereInfo {
    pub target: FilterTarget,
    pub operator: FilterOp,
    pub data: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC NULLS FIRST",
            SortDirection::Desc => "DESC NULLS LAST",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("asc") {
            Some(SortDirection::Asc)
        } else if s.eq_ignore_ascii_case("desc") {
            Some(SortDirection::Desc)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterOrderInfo {
    pub target: FilterTarget,
    pub sort: SortDirection,
}

/// Conditions (ANDed), sort keys and paging for one collection query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterData {
    pub where_clause: Vec<FilterWhereInfo>,
    pub order: Vec<FilterOrderInfo>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl FilterData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn where_eq(mut self, target: FilterTarget, data: Value) -> Self {
        self.where_clause.push(FilterWhereInfo { target, operator: FilterOp::Eq, data });
        self
    }

    pub fn where_in(mut self, target: FilterTarget, values: Vec<Value>) -> Self {
        self.where_clause.push(FilterWhereInfo {
            target,
            operator: FilterOp::In,
            data: Value::Array(values),
        });
        self
    }

    pub fn where_contains(mut self, target: FilterTarget, data: Value) -> Self {
        self.where_clause.push(FilterWhereInfo { target, operator: FilterOp::Contains, data });
        self
    }

    pub fn order_by(mut self, target: FilterTarget, sort: SortDirection) -> Self {
        self.order.push(FilterOrderInfo { target, sort });
        self
    }
}

#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<Value>,
}
