use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::access::Caller;
use crate::auth::decode_jwt;
use crate::error::ApiError;
use crate::server::AppState;

/// Resolves the bearer token, if any, into a `Caller` request extension.
///
/// Requests without an `Authorization` header pass through anonymously and
/// are judged later by the authorization check. A header that is present
/// but malformed or carries an invalid token is rejected with 401.
pub async fn caller_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = match extract_jwt_from_headers(request.headers()) {
        Ok(Some(token)) => token,
        Ok(None) => return next.run(request).await,
        Err(msg) => return ApiError::unauthorized(msg).into_response(),
    };

    let claims = match decode_jwt(&token, &state.config.security.jwt_secret) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::debug!("rejected bearer token: {}", e);
            return ApiError::unauthorized(format!("Invalid JWT token: {}", e)).into_response();
        }
    };

    request.extensions_mut().insert(Caller::from(claims));
    next.run(request).await
}

/// Extract JWT token from Authorization header
pub fn extract_jwt_from_headers(headers: &HeaderMap) -> Result<Option<String>, String> {
    let Some(auth_header) = headers.get("authorization") else {
        return Ok(None);
    };

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format".to_string())?;

    if let Some(token) = auth_str.strip_prefix("Bearer ") {
        if token.trim().is_empty() {
            return Err("Empty JWT token".to_string());
        }
        Ok(Some(token.trim().to_string()))
    } else {
        Err("Authorization header must use Bearer token format".to_string())
    }
}
