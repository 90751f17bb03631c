use core::str::FromStr;

use serde::{Deserialize, Serialize};

use searchsync_core::DomainError;

/// The closed set of mutations that can be propagated for an entity.
///
/// This is deliberately an enum rather than an open string: handler tables
/// are populated by enumerating [`Operation::ALL`] at startup, so a missing
/// handler is a startup-time concern, not a runtime surprise.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    /// Every operation, in a fixed order.
    pub const ALL: [Operation; 3] = [Operation::Create, Operation::Update, Operation::Delete];

    /// Wire form used as the last routing-key segment.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

impl core::fmt::Display for Operation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Operation::Create),
            "update" => Ok(Operation::Update),
            "delete" => Ok(Operation::Delete),
            other => Err(DomainError::validation(format!("unknown operation: {other:?}"))),
        }
    }
}
