//! Observability fan-out ([`Subscribe`], [`SubscriberSet`]) and the alert
//! boundary toward an external collaborator ([`Alerter`], [`Alert`]).

mod alert;
mod subscribe;
mod subscriber_set;

#[cfg(feature = "logging")]
mod log;

pub use alert::{Alert, AlertSeverity, Alerter};
pub use subscribe::Subscribe;
pub use subscriber_set::SubscriberSet;

#[cfg(feature = "logging")]
pub use log::{LogAlerter, LogWriter};
