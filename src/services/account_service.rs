use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::access::{permissions_for_groups, Caller, ADMIN_GROUP};
use crate::api::format::{record_to_api_value, Related};
use crate::auth::{generate_jwt, hash_password, verify_password, Claims};
use crate::config::{BootstrapConfig, SecurityConfig};
use crate::database::record::Record;
use crate::database::store::RecordStore;
use crate::filter::{FilterData, FilterTarget};
use crate::schema::catalog::USER;

use super::resource_service::ServiceError;

#[derive(Debug, Serialize)]
pub struct LoginResult {
    pub token: String,
    pub user: Value,
    pub expires_in: i64,
}

/// Login and account bootstrap over the `users` collection
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn RecordStore>,
    security: SecurityConfig,
}

impl AccountService {
    pub fn new(store: Arc<dyn RecordStore>, security: &SecurityConfig) -> Self {
        Self {
            store,
            security: security.clone(),
        }
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<Record>, ServiceError> {
        let filter = FilterData {
            limit: Some(1),
            ..FilterData::new().where_eq(FilterTarget::field("username"), json!(username))
        };
        Ok(self.store.select(USER.name, USER.identity, &filter).await?.into_iter().next())
    }

    /// Verify credentials, refresh `last_login` and issue a token
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResult, ServiceError> {
        let Some(mut user) = self.find_by_username(username).await? else {
            warn!("login failed for unknown user {}", username);
            return Err(ServiceError::InvalidCredentials);
        };
        let digest = user.get("password").and_then(Value::as_str).unwrap_or_default();
        if !verify_password(password, digest) {
            warn!("login failed for {}: bad password", username);
            return Err(ServiceError::InvalidCredentials);
        }

        let now = Utc::now().to_rfc3339_opts(SecondsFormat::AutoSi, true);
        user.fields.insert("last_login".to_string(), Value::String(now));
        let user = self
            .store
            .replace(USER.name, &user.id, user.fields)
            .await?
            .ok_or(ServiceError::InvalidCredentials)?;

        let caller = caller_for(&user);
        let claims = Claims::new(
            user.id.as_key(),
            caller.username.clone(),
            caller.groups.clone(),
            caller.permissions.clone(),
            &self.security,
        );
        let token = generate_jwt(&claims, &self.security.jwt_secret)
            .map_err(|e| ServiceError::Token(e.to_string()))?;

        info!("user {} logged in", username);
        Ok(LoginResult {
            token,
            user: record_to_api_value(&USER, &user, &Related::new()),
            expires_in: claims.expires_in(),
        })
    }

    /// Create the configured admin account if it does not exist yet.
    /// Returns whether a user was created.
    pub async fn bootstrap(&self, bootstrap: &BootstrapConfig) -> Result<bool, ServiceError> {
        let (Some(username), Some(password)) =
            (&bootstrap.admin_username, &bootstrap.admin_password)
        else {
            return Ok(false);
        };
        if self.find_by_username(username).await?.is_some() {
            info!("bootstrap admin {} already exists", username);
            return Ok(false);
        }

        let now = Utc::now().to_rfc3339_opts(SecondsFormat::AutoSi, true);
        let fields = json!({
            "username": username,
            "password": hash_password(password),
            "roles": [ADMIN_GROUP],
            "last_login": now,
            "profile_data": {},
        });
        let fields = fields.as_object().cloned().unwrap_or_default();
        let record = self.store.insert(USER.name, USER.identity, fields).await?;
        info!("bootstrap admin {} created as {}", username, record.id);
        Ok(true)
    }
}

/// Caller identity for a stored user document; roles double as groups
pub fn caller_for(user: &Record) -> Caller {
    let groups: Vec<String> = user
        .get("roles")
        .and_then(Value::as_array)
        .map(|roles| roles.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default();
    Caller {
        id: user.id.clone(),
        username: user.get("username").and_then(Value::as_str).unwrap_or_default().to_string(),
        permissions: permissions_for_groups(&groups),
        groups,
    }
}
