use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("Invalid collection name: {0}")]
    InvalidCollection(String),

    #[error("Unknown field: {0}")]
    InvalidColumn(String),

    #[error("Invalid sort order: {0}")]
    InvalidOrder(String),

    #[error("Invalid limit: {0}")]
    InvalidLimit(String),

    #[error("Invalid offset: {0}")]
    InvalidOffset(String),
}
