//! Capability layer: connectors, the registry, and the dispatcher.
//!
//! A [`Connector`] wraps one external integration behind a uniform invoke
//! surface. The [`Dispatcher`] is the single entry point execution engines
//! use; it resolves names through a [`ConnectorRegistry`], enforces the call
//! timeout, routes test-mode runs to simulations, and converts every failure
//! into a failed [`Outcome`] rather than an error.

pub mod builtins;
pub mod connector;
pub mod dispatcher;
pub mod error;
pub mod registry;

pub use builtins::{
    AppendRecordConnector, BranchConnector, CreatePaymentLinkConnector, QueryStoreConnector,
    SendMessageConnector, StartConnector, WaitConnector, builtin_registry,
};
pub use connector::{Connector, CredentialStore, InvocationContext, MockConnector, Outcome};
pub use dispatcher::{Dispatcher, DispatcherConfig};
pub use error::{CapabilityError, Result};
pub use registry::ConnectorRegistry;
