use std::collections::HashMap;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Extension, Json,
};
use serde_json::Value;

use crate::access::Caller;
use crate::middleware::{ApiResponse, ApiResult};
use crate::server::AppState;

/// GET /api/:resource - List records visible to the caller
///
/// Query parameters other than `sort`, `order`, `limit` and `offset` are
/// equality filters on the resource's fields.
pub async fn get(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    caller: Option<Extension<Caller>>,
) -> ApiResult<Vec<Value>> {
    let schema = state.resources.schema(&resource)?;
    let caller = caller.map(|Extension(c)| c);
    let records = state.resources.list(caller.as_ref(), schema, &params).await?;
    Ok(ApiResponse::success(records))
}

/// POST /api/:resource - Create a record
pub async fn post(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    caller: Option<Extension<Caller>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    let schema = state.resources.schema(&resource)?;
    let caller = caller.map(|Extension(c)| c);
    let Json(payload) = payload?;
    let outcome = state.resources.create(caller.as_ref(), schema, &payload).await?;
    Ok(outcome.into())
}
