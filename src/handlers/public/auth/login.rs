use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::Deserialize;

use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::server::AppState;
use crate::services::LoginResult;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// POST /auth/login - Authenticate and receive a JWT
///
/// Expected Input:
/// ```json
/// { "username": "string", "password": "string" }
/// ```
///
/// Expected Output (Success):
/// ```json
/// {
///   "success": true,
///   "data": {
///     "token": "eyJhbGciOiJIUzI1NiI...",
///     "user": { "_id": "...", "username": "admin", "roles": ["Admin"] },
///     "expires_in": 86400
///   }
/// }
/// ```
///
/// Unknown usernames and wrong passwords both answer 401.
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<LoginResult> {
    let Json(request) = payload?;
    if request.username.trim().is_empty() || request.password.is_empty() {
        return Err(ApiError::bad_request("username and password are required"));
    }

    let result = state.accounts.login(&request.username, &request.password).await?;
    Ok(ApiResponse::success(result))
}
