/// Shared types used across the codebase

use serde::{Deserialize, Serialize};

/// Resource operations exposed by every entity endpoint.
/// Used by the access policy, the resource service and the handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    List,
    Retrieve,
    Create,
    Update,
    Delete,
}

impl Operation {
    /// Model permission verb (`view`, `add`, `change`, `delete`)
    pub fn permission_verb(&self) -> &'static str {
        match self {
            Operation::List | Operation::Retrieve => "view",
            Operation::Create => "add",
            Operation::Update => "change",
            Operation::Delete => "delete",
        }
    }

    /// Verb used in human-readable denial reasons
    pub fn reason_verb(&self) -> &'static str {
        match self {
            Operation::List | Operation::Retrieve => "view",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }

    pub fn is_write(&self) -> bool {
        matches!(self, Operation::Create | Operation::Update | Operation::Delete)
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Operation::List => "list",
            Operation::Retrieve => "retrieve",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };
        f.write_str(s)
    }
}
