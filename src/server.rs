use std::sync::Arc;

use axum::{
    http::{HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::{AppConfig, SecurityConfig};
use crate::database::RecordStore;
use crate::handlers::{protected, public};
use crate::middleware::caller_middleware;
use crate::services::{AccountService, ResourceService};

/// Shared per-process state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn RecordStore>,
    pub resources: ResourceService,
    pub accounts: AccountService,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn RecordStore>) -> Self {
        Self {
            resources: ResourceService::new(store.clone(), &config.pagination),
            accounts: AccountService::new(store.clone(), &config.security),
            config: Arc::new(config),
            store,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let mut app = Router::new()
        // Public
        .route("/", get(public::root))
        .route("/health", get(public::health))
        .route("/auth/login", post(public::auth::login))
        .route("/auth/login/", post(public::auth::login))
        // Resource endpoints, caller resolved from the bearer token
        .merge(api_routes(state.clone()))
        .layer(TraceLayer::new_for_http());

    if let Some(cors) = cors_layer(&state.config.security) {
        app = app.layer(cors);
    }

    app.with_state(state)
}

fn api_routes(state: AppState) -> Router<AppState> {
    use protected::{auth, data};

    let collection = || get(data::collection_get).post(data::collection_post);
    let record = || {
        get(data::record_get)
            .put(data::record_put)
            .patch(data::record_patch)
            .delete(data::record_delete)
    };

    Router::new()
        .route("/api/auth/whoami", get(auth::whoami))
        .route("/api/:resource", collection())
        .route("/api/:resource/", collection())
        .route("/api/:resource/:id", record())
        .route("/api/:resource/:id/", record())
        .layer(from_fn_with_state(state, caller_middleware))
}

fn cors_layer(security: &SecurityConfig) -> Option<CorsLayer> {
    if !security.enable_cors {
        return None;
    }
    if security.cors_origins.is_empty() || security.cors_origins.iter().any(|o| o == "*") {
        return Some(CorsLayer::permissive());
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
            .allow_headers(Any),
    )
}
