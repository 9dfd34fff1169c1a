//! Service registry: arena of per-service entries, indexed by name.
//!
//! Each registered service gets one [`ServiceEntry`] holding its immutable
//! [`ServiceSpec`], its live [`ServiceState`], and the per-service locks the
//! rest of the runtime coordinates through:
//!
//! - `probe_flight`: serializes health checks for one service (a probe in
//!   flight makes later probes skip, never queue up);
//! - the recovery slot: at most one recovery task per service, represented
//!   by the stored [`CancellationToken`];
//! - `hurry`: lets an emergency pass cut a pending backoff sleep short.
//!
//! ## Rules
//! - Registration is the only mutation path for specs.
//! - `list` returns a point-in-time copy; it does not observe later changes.
//! - Entries live until the supervisor itself is dropped (no per-service GC).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, Notify, RwLock, RwLockWriteGuard};
use tokio_util::sync::CancellationToken;

use crate::error::SupervisorError;
use crate::health::{ServiceSnapshot, SystemHealthSnapshot};
use crate::services::{ServiceKind, ServiceSpec, ServiceState, ServiceStatus};

/// One registered service: spec, live state, and coordination locks.
pub struct ServiceEntry {
    spec: ServiceSpec,
    state: RwLock<ServiceState>,
    probe_flight: Mutex<()>,
    recovery: Mutex<Option<CancellationToken>>,
    hurry: Notify,
}

impl std::fmt::Debug for ServiceEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceEntry")
            .field("name", &self.spec.name())
            .finish_non_exhaustive()
    }
}

impl ServiceEntry {
    fn new(spec: ServiceSpec) -> Self {
        Self {
            spec,
            state: RwLock::new(ServiceState::new()),
            probe_flight: Mutex::new(()),
            recovery: Mutex::new(None),
            hurry: Notify::new(),
        }
    }

    /// Service name (from the service spec).
    pub fn name(&self) -> &str {
        self.spec.name()
    }

    /// Immutable service spec.
    pub fn spec(&self) -> &ServiceSpec {
        &self.spec
    }

    /// Point-in-time copy of the live state.
    pub async fn state(&self) -> ServiceState {
        self.state.read().await.clone()
    }

    /// Current status only.
    pub async fn status(&self) -> ServiceStatus {
        self.state.read().await.status
    }

    /// Write access for lifecycle/recovery transition paths.
    pub(crate) async fn state_mut(&self) -> RwLockWriteGuard<'_, ServiceState> {
        self.state.write().await
    }

    /// Tries to take the probe single-flight guard without waiting.
    pub(crate) fn try_probe(&self) -> Option<tokio::sync::MutexGuard<'_, ()>> {
        self.probe_flight.try_lock().ok()
    }

    /// Claims the recovery slot, returning a fresh child token, or `None`
    /// when a recovery is already in flight.
    pub(crate) async fn try_begin_recovery(
        &self,
        parent: &CancellationToken,
    ) -> Option<CancellationToken> {
        let mut slot = self.recovery.lock().await;
        if slot.is_some() {
            return None;
        }
        let token = parent.child_token();
        *slot = Some(token.clone());
        Some(token)
    }

    /// Releases the recovery slot.
    pub(crate) async fn end_recovery(&self) {
        *self.recovery.lock().await = None;
    }

    /// Cancels an in-flight recovery, if any, and wakes a pending backoff
    /// sleep so the loop observes the cancellation promptly.
    pub(crate) async fn cancel_recovery(&self) {
        if let Some(token) = self.recovery.lock().await.take() {
            token.cancel();
        }
        self.hurry.notify_waiters();
    }

    /// Whether a recovery task currently owns this service.
    pub(crate) async fn recovery_in_flight(&self) -> bool {
        self.recovery.lock().await.is_some()
    }

    /// Cuts a pending backoff sleep short without cancelling the recovery.
    pub(crate) fn hurry_recovery(&self) {
        self.hurry.notify_waiters();
    }

    /// Resolves when [`ServiceEntry::hurry_recovery`] fires.
    pub(crate) async fn hurried(&self) {
        self.hurry.notified().await;
    }

    /// Captures this entry as a snapshot slice.
    pub(crate) async fn capture(&self) -> ServiceSnapshot {
        let st = self.state.read().await;
        ServiceSnapshot {
            name: self.spec.name().to_string(),
            kind: self.spec.kind(),
            status: st.status,
            consecutive_failures: st.consecutive_failures,
            total_restarts: st.total_restarts,
            recovery_attempt: st.recovery_attempt,
            last_detail: st.last_detail.clone(),
            last_transition_at: st.last_transition_at,
            last_health_check_at: st.last_health_check_at,
        }
    }
}

/// Filter for [`Registry::list`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceFilter {
    /// Keep only services of this kind.
    pub kind: Option<ServiceKind>,
    /// Keep only services in this status.
    pub status: Option<ServiceStatus>,
    /// Drop `Disabled` services.
    pub enabled_only: bool,
}

impl ServiceFilter {
    /// Matches everything.
    pub fn any() -> Self {
        Self::default()
    }

    /// Keep only this kind.
    pub fn with_kind(mut self, kind: ServiceKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Keep only this status.
    pub fn with_status(mut self, status: ServiceStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Drop disabled services.
    pub fn enabled_only(mut self) -> Self {
        self.enabled_only = true;
        self
    }
}

/// Arena of registered services, indexed by name.
pub struct Registry {
    entries: RwLock<HashMap<String, Arc<ServiceEntry>>>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a service; the only mutation path for specs.
    pub async fn register(&self, spec: ServiceSpec) -> Result<Arc<ServiceEntry>, SupervisorError> {
        let name = spec.name().to_string();
        let mut entries = self.entries.write().await;
        if entries.contains_key(&name) {
            return Err(SupervisorError::DuplicateService { name });
        }
        let entry = Arc::new(ServiceEntry::new(spec));
        entries.insert(name, Arc::clone(&entry));
        Ok(entry)
    }

    /// Looks up a service by name.
    pub async fn get(&self, name: &str) -> Result<Arc<ServiceEntry>, SupervisorError> {
        self.entries
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| SupervisorError::UnknownService {
                name: name.to_string(),
            })
    }

    /// Point-in-time copy of every entry.
    pub async fn all(&self) -> Vec<Arc<ServiceEntry>> {
        self.entries.read().await.values().cloned().collect()
    }

    /// Point-in-time filtered copy, sorted by name.
    pub async fn list(&self, filter: &ServiceFilter) -> Vec<Arc<ServiceEntry>> {
        let mut out = Vec::new();
        for entry in self.all().await {
            if let Some(kind) = filter.kind {
                if entry.spec().kind() != kind {
                    continue;
                }
            }
            let status = entry.status().await;
            if filter.enabled_only && !status.is_enabled() {
                continue;
            }
            if let Some(want) = filter.status {
                if status != want {
                    continue;
                }
            }
            out.push(entry);
        }
        out.sort_unstable_by(|a, b| a.name().cmp(b.name()));
        out
    }

    /// Derives a full system snapshot from the current states.
    pub async fn capture_snapshot(&self) -> SystemHealthSnapshot {
        let entries = self.all().await;
        let mut services = Vec::with_capacity(entries.len());
        for entry in entries {
            services.push(entry.capture().await);
        }
        SystemHealthSnapshot::from_services(services)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{HealthReport, ServiceFn};

    fn spec(name: &'static str) -> ServiceSpec {
        ServiceSpec::new(ServiceFn::new(name, || async { HealthReport::healthy() }).arc())
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let reg = Registry::new();
        reg.register(spec("oracle")).await.expect("first");
        let err = reg.register(spec("oracle")).await.unwrap_err();
        assert!(matches!(err, SupervisorError::DuplicateService { .. }));
    }

    #[tokio::test]
    async fn unknown_lookup_fails() {
        let reg = Registry::new();
        let err = reg.get("ghost").await.unwrap_err();
        assert!(matches!(err, SupervisorError::UnknownService { .. }));
    }

    #[tokio::test]
    async fn list_filters_by_kind_and_status() {
        let reg = Registry::new();
        reg.register(spec("a").with_kind(ServiceKind::Monitor))
            .await
            .unwrap();
        reg.register(spec("b").with_kind(ServiceKind::Worker))
            .await
            .unwrap();

        let monitors = reg
            .list(&ServiceFilter::any().with_kind(ServiceKind::Monitor))
            .await;
        assert_eq!(monitors.len(), 1);
        assert_eq!(monitors[0].name(), "a");

        let stopped = reg
            .list(&ServiceFilter::any().with_status(ServiceStatus::Stopped))
            .await;
        assert_eq!(stopped.len(), 2);

        let entry = reg.get("b").await.unwrap();
        entry.state_mut().await.transition(ServiceStatus::Disabled);
        let enabled = reg.list(&ServiceFilter::any().enabled_only()).await;
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].name(), "a");
    }

    #[tokio::test]
    async fn recovery_slot_is_single_flight() {
        let reg = Registry::new();
        let entry = reg.register(spec("s")).await.unwrap();
        let parent = CancellationToken::new();

        let first = entry.try_begin_recovery(&parent).await;
        assert!(first.is_some());
        assert!(entry.try_begin_recovery(&parent).await.is_none());
        assert!(entry.recovery_in_flight().await);

        entry.end_recovery().await;
        assert!(!entry.recovery_in_flight().await);
        assert!(entry.try_begin_recovery(&parent).await.is_some());
    }

    #[tokio::test]
    async fn cancel_recovery_cancels_stored_token() {
        let reg = Registry::new();
        let entry = reg.register(spec("s")).await.unwrap();
        let parent = CancellationToken::new();

        let token = entry.try_begin_recovery(&parent).await.unwrap();
        entry.cancel_recovery().await;
        assert!(token.is_cancelled());
        assert!(!entry.recovery_in_flight().await);
    }
}
