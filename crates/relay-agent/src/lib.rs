//! Bounded reasoning-loop execution for open-ended tasks.
//!
//! Where the graph executor follows a fixed plan, [`AgentExecutor`] lets an
//! [`Oracle`] choose each move against a goal, with hard safety bounds: a
//! step ceiling, a consecutive-failure circuit breaker, a per-consultation
//! deadline, and run-scoped dedup so repeated decisions never repeat side
//! effects. Progress is observable as a [`TaskStream`] of [`TaskEvent`]s.

pub mod dedup;
pub mod error;
pub mod events;
pub mod executor;
pub mod oracle;

pub use dedup::{DedupSet, canonical_json, dedup_key};
pub use error::{AgentError, OracleError};
pub use events::{TaskEvent, TaskStream};
pub use executor::{AgentConfig, AgentExecutor};
pub use oracle::{CapabilityCall, HistoryEntry, MockOracle, Oracle, OracleReply, OracleRequest};
