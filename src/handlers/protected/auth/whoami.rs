use axum::Extension;

use crate::access::{Caller, Denied};
use crate::middleware::{ApiResponse, ApiResult};

/// GET /api/auth/whoami - The caller resolved from the bearer token
pub async fn whoami(caller: Option<Extension<Caller>>) -> ApiResult<Caller> {
    let Extension(caller) = caller.ok_or(Denied::Unauthenticated)?;
    Ok(ApiResponse::success(caller))
}
