use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Extension, Json,
};
use serde_json::Value;

use crate::access::Caller;
use crate::middleware::{ApiResponse, ApiResult};
use crate::server::AppState;

/// GET /api/:resource/:id - Get a single record by ID
pub async fn get(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
    caller: Option<Extension<Caller>>,
) -> ApiResult<Value> {
    let schema = state.resources.schema(&resource)?;
    let caller = caller.map(|Extension(c)| c);
    let record = state.resources.get(caller.as_ref(), schema, &id).await?;
    Ok(ApiResponse::success(record))
}

/// PUT /api/:resource/:id - Update a record by ID
///
/// Fields absent from the body keep their stored values.
pub async fn put(
    state: State<AppState>,
    path: Path<(String, String)>,
    caller: Option<Extension<Caller>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    update(state, path, caller, payload).await
}

/// PATCH /api/:resource/:id - Partially update a record by ID
pub async fn patch(
    state: State<AppState>,
    path: Path<(String, String)>,
    caller: Option<Extension<Caller>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    update(state, path, caller, payload).await
}

async fn update(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
    caller: Option<Extension<Caller>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    let schema = state.resources.schema(&resource)?;
    let caller = caller.map(|Extension(c)| c);
    let Json(payload) = payload?;
    let outcome = state.resources.update(caller.as_ref(), schema, &id, &payload).await?;
    Ok(outcome.into())
}

/// DELETE /api/:resource/:id - Delete a record by ID
///
/// Relational resources answer 204; documents answer 200 with a message.
pub async fn delete(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
    caller: Option<Extension<Caller>>,
) -> ApiResult<Value> {
    let schema = state.resources.schema(&resource)?;
    let caller = caller.map(|Extension(c)| c);
    let outcome = state.resources.delete(caller.as_ref(), schema, &id).await?;
    Ok(outcome.into())
}
