//! Identifier newtypes used across the engine.
//!
//! Every durable record carries a uuid-backed id so records created by
//! different processes never collide (spec: any process may resume a
//! suspended run).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new random id.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id! {
    /// Unique identifier for a step graph.
    GraphId
}

uuid_id! {
    /// Unique identifier for a run (graph or agent).
    RunId
}

uuid_id! {
    /// Unique identifier for one step execution within a run.
    StepRunId
}

uuid_id! {
    /// Unique identifier for a pending approval request.
    ApprovalId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(RunId::new(), RunId::new());
        assert_ne!(StepRunId::new(), StepRunId::new());
        assert_ne!(ApprovalId::new(), ApprovalId::new());
    }

    #[test]
    fn test_id_round_trip() {
        let uuid = Uuid::new_v4();
        let id = GraphId::from_uuid(uuid);
        assert_eq!(id.as_uuid(), &uuid);
        assert_eq!(id.to_string(), uuid.to_string());
    }

    #[test]
    fn test_id_serde() {
        let id = RunId::new();
        let json = serde_json::to_string(&id).unwrap();
        let restored: RunId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, restored);
    }
}
