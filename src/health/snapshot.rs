//! Point-in-time view of system health.
//!
//! A [`SystemHealthSnapshot`] is derived on demand from the registry and is
//! never stored long-term beyond the aggregator's bounded ring buffer
//! ([`SnapshotHistory`]).

use std::collections::VecDeque;
use std::time::SystemTime;

use crate::health::grade::HealthGrade;
use crate::services::{ServiceKind, ServiceStatus};

/// Per-service slice of a system snapshot.
#[derive(Debug, Clone)]
pub struct ServiceSnapshot {
    /// Service name.
    pub name: String,
    /// Grouping kind from the service spec.
    pub kind: ServiceKind,
    /// Status at capture time.
    pub status: ServiceStatus,
    /// Failed checks since the last passing one.
    pub consecutive_failures: u32,
    /// Lifetime restart count.
    pub total_restarts: u64,
    /// Attempts in the current recovery cycle.
    pub recovery_attempt: u32,
    /// Detail from the last failure, if any.
    pub last_detail: Option<String>,
    /// When the status last changed.
    pub last_transition_at: SystemTime,
    /// When the last check completed, if any.
    pub last_health_check_at: Option<SystemTime>,
}

/// Aggregate health at one instant.
#[derive(Debug, Clone)]
pub struct SystemHealthSnapshot {
    /// Grade derived from `ratio`.
    pub grade: HealthGrade,
    /// `running / registered`; `1.0` for an empty registry.
    pub ratio: f64,
    /// Services currently `Running`.
    pub running: usize,
    /// All registered services, disabled included.
    pub registered: usize,
    /// Per-service detail, sorted by name.
    pub services: Vec<ServiceSnapshot>,
    /// Capture time.
    pub at: SystemTime,
}

impl SystemHealthSnapshot {
    /// Builds a snapshot from captured per-service slices.
    pub fn from_services(mut services: Vec<ServiceSnapshot>) -> Self {
        services.sort_unstable_by(|a, b| a.name.cmp(&b.name));
        let registered = services.len();
        let running = services
            .iter()
            .filter(|s| s.status == ServiceStatus::Running)
            .count();
        let ratio = if registered == 0 {
            1.0
        } else {
            running as f64 / registered as f64
        };
        Self {
            grade: HealthGrade::from_ratio(ratio),
            ratio,
            running,
            registered,
            services,
            at: SystemTime::now(),
        }
    }

    /// Names of services in a given status.
    pub fn names_with_status(&self, status: ServiceStatus) -> Vec<&str> {
        self.services
            .iter()
            .filter(|s| s.status == status)
            .map(|s| s.name.as_str())
            .collect()
    }
}

/// Bounded ring buffer of recent snapshots, oldest first.
#[derive(Debug)]
pub struct SnapshotHistory {
    buf: VecDeque<SystemHealthSnapshot>,
    capacity: usize,
}

impl SnapshotHistory {
    /// Creates a history holding at most `capacity` snapshots (min 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buf: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a snapshot, evicting the oldest when full.
    pub fn push(&mut self, snapshot: SystemHealthSnapshot) {
        if self.buf.len() == self.capacity {
            self.buf.pop_front();
        }
        self.buf.push_back(snapshot);
    }

    /// Most recent snapshot, if any.
    pub fn latest(&self) -> Option<&SystemHealthSnapshot> {
        self.buf.back()
    }

    /// Copies out the buffered snapshots, oldest first.
    pub fn to_vec(&self) -> Vec<SystemHealthSnapshot> {
        self.buf.iter().cloned().collect()
    }

    /// Number of buffered snapshots.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}
