//! Aggregate-health data types: the [`HealthGrade`] scale and on-demand
//! [`SystemHealthSnapshot`]s with their bounded [`SnapshotHistory`].

mod grade;
mod snapshot;

pub use grade::HealthGrade;
pub use snapshot::{ServiceSnapshot, SnapshotHistory, SystemHealthSnapshot};
