//! Supervised-unit abstractions: the [`Service`] capability trait, the
//! closure-backed [`ServiceFn`] adapter, the immutable [`ServiceSpec`]
//! metadata bundle, and the live [`ServiceState`].

mod service;
mod service_fn;
mod spec;
mod state;

pub use service::{HealthReport, RecoveryOutcome, Service, ServiceRef};
pub use service_fn::ServiceFn;
pub use spec::{ServiceKind, ServiceSpec};
pub use state::{ServiceState, ServiceStatus};
