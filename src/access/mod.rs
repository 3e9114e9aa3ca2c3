//! Authorization policy.
//!
//! Pure functions over a [`Caller`], an [`Operation`] and the entity's
//! declared [`AccessRule`]. Nothing here touches HTTP or the store: the
//! resource service asks [`authorize`] before any store call and
//! [`check_record`] after fetching a row, so a denied request never
//! partially executes.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::auth::Claims;
use crate::database::record::{Record, RecordId};
use crate::schema::{registry, AccessRule, EntitySchema};
use crate::types::Operation;

pub const ADMIN_GROUP: &str = "Admin";
pub const TALENT_AGENTS_GROUP: &str = "Talent Agents";

/// Authenticated identity attached to a request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Caller {
    pub id: RecordId,
    pub username: String,
    pub groups: Vec<String>,
    pub permissions: Vec<String>,
}

impl Caller {
    pub fn in_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }

    pub fn has_perm(&self, permission: &str) -> bool {
        self.in_group(ADMIN_GROUP) || self.permissions.iter().any(|p| p == permission)
    }
}

impl From<Claims> for Caller {
    fn from(claims: Claims) -> Self {
        Self {
            id: RecordId::Object(claims.sub),
            username: claims.username,
            groups: claims.groups,
            permissions: claims.permissions,
        }
    }
}

/// Rows an authorized operation may touch
#[derive(Debug, Clone, PartialEq)]
pub enum Scope {
    All,
    /// Only rows whose `field` equals `owner`
    Owned { field: &'static str, owner: Value },
    /// Only the row that is the caller's own account
    Itself(RecordId),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Denied {
    #[error("Authentication credentials were not provided.")]
    Unauthenticated,

    #[error("{0}")]
    Forbidden(String),
}

/// Outcome of checking a fetched row against the caller's scope
#[derive(Debug, Clone, PartialEq)]
pub enum RecordCheck {
    Allowed,
    Forbidden(String),
    /// Treated as if the row did not exist
    Hidden,
}

/// Decide whether `caller` may perform `operation` on the entity at all,
/// and which rows it is limited to.
pub fn authorize(
    caller: Option<&Caller>,
    operation: Operation,
    schema: &EntitySchema,
) -> Result<Scope, Denied> {
    let decision = decide(caller, operation, schema);
    match &decision {
        Ok(scope) => debug!(
            "access {} {} by {}: {:?}",
            operation,
            schema.name,
            caller.map(|c| c.username.as_str()).unwrap_or("anonymous"),
            scope
        ),
        Err(denied) => warn!(
            "access {} {} by {} denied: {}",
            operation,
            schema.name,
            caller.map(|c| c.username.as_str()).unwrap_or("anonymous"),
            denied
        ),
    }
    decision
}

fn decide(
    caller: Option<&Caller>,
    operation: Operation,
    schema: &EntitySchema,
) -> Result<Scope, Denied> {
    let public = match schema.access {
        AccessRule::Open => true,
        AccessRule::SelfManaged => !matches!(operation, Operation::Update | Operation::Delete),
        _ => false,
    };
    if public {
        return Ok(Scope::All);
    }
    let caller = caller.ok_or(Denied::Unauthenticated)?;

    match schema.access {
        AccessRule::Open | AccessRule::Authenticated => Ok(Scope::All),
        AccessRule::AgentOwned { owner_field } => {
            if caller.in_group(ADMIN_GROUP) {
                Ok(Scope::All)
            } else if caller.in_group(TALENT_AGENTS_GROUP) {
                Ok(owned_scope(operation, owner_field, caller))
            } else {
                Err(Denied::Forbidden(denial_reason(operation, schema)))
            }
        }
        AccessRule::ModelPermission => {
            if caller.has_perm(&schema.permission(operation)) {
                Ok(Scope::All)
            } else {
                Err(Denied::Forbidden(denial_reason(operation, schema)))
            }
        }
        AccessRule::CallerOwned { owner_field } => Ok(owned_scope(operation, owner_field, caller)),
        AccessRule::SelfManaged if caller.in_group(ADMIN_GROUP) => Ok(Scope::All),
        AccessRule::SelfManaged => Ok(Scope::Itself(caller.id.clone())),
    }
}

// Creates stamp the caller as owner, so there is nothing to narrow
fn owned_scope(operation: Operation, field: &'static str, caller: &Caller) -> Scope {
    match operation {
        Operation::Create => Scope::All,
        _ => Scope::Owned { field, owner: caller.id.to_value() },
    }
}

/// Re-check a fetched row against the scope returned by [`authorize`]
pub fn check_record(
    scope: &Scope,
    operation: Operation,
    schema: &EntitySchema,
    record: &Record,
) -> RecordCheck {
    let allowed = match scope {
        Scope::All => true,
        Scope::Owned { field, owner } => record.get(field) == Some(owner),
        Scope::Itself(id) => &record.id == id,
    };
    if allowed {
        return RecordCheck::Allowed;
    }
    match schema.access {
        AccessRule::AgentOwned { .. } | AccessRule::SelfManaged => {
            let reason = denial_reason(operation, schema);
            warn!("{} {}/{} denied: {}", operation, schema.name, record.id, reason);
            RecordCheck::Forbidden(reason)
        }
        _ => RecordCheck::Hidden,
    }
}

/// Drop payload keys for admin-only fields unless the caller is in `Admin`,
/// so defaults and stored values stay in place.
pub fn strip_privileged(caller: Option<&Caller>, schema: &EntitySchema, payload: &Value) -> Value {
    if caller.is_some_and(|c| c.in_group(ADMIN_GROUP)) {
        return payload.clone();
    }
    let mut payload = payload.clone();
    if let Value::Object(map) = &mut payload {
        for field in schema.fields.iter().filter(|f| f.admin_only) {
            if map.remove(field.name).is_some() {
                debug!("ignored admin-only field {}.{}", schema.name, field.name);
            }
        }
    }
    payload
}

/// "You do not have permission to view albums." / "... create an album." /
/// "... update this album."
pub fn denial_reason(operation: Operation, schema: &EntitySchema) -> String {
    let lower = schema.title.to_lowercase();
    let object = match operation {
        Operation::List => format!("{}s", lower),
        Operation::Create => schema.noun(),
        Operation::Retrieve | Operation::Update | Operation::Delete => format!("this {}", lower),
    };
    format!("You do not have permission to {} {}.", operation.reason_verb(), object)
}

/// Model permissions implied by a user's roles. `Admin` holds every model
/// permission, `Talent Agents` the musician ones; roles containing a dot are
/// direct grants.
pub fn permissions_for_groups(groups: &[String]) -> Vec<String> {
    let verbs = [Operation::Retrieve, Operation::Create, Operation::Update, Operation::Delete];
    let mut out: Vec<String> = Vec::new();

    for group in groups {
        match group.as_str() {
            ADMIN_GROUP => {
                for schema in registry().all() {
                    out.extend(verbs.iter().map(|op| schema.permission(*op)));
                }
            }
            TALENT_AGENTS_GROUP => {
                if let Some(musicians) = registry().get("musicians") {
                    out.extend(verbs.iter().map(|op| musicians.permission(*op)));
                }
            }
            grant if grant.contains('.') => out.push(grant.to_string()),
            _ => {}
        }
    }

    out.sort();
    out.dedup();
    out
}
