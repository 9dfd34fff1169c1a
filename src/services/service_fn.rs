//! Closure-backed service implementation.
//!
//! [`ServiceFn`] turns plain async closures into a [`Service`] without a
//! dedicated struct: a health closure is mandatory, run and recover closures
//! are optional. Each invocation creates a fresh future, so there is no
//! hidden shared state between attempts; share state explicitly with `Arc`
//! inside the closures when needed.
//!
//! ## Example
//! ```
//! use healvisor::{HealthReport, RecoveryOutcome, ServiceFn, ServiceRef};
//!
//! let svc: ServiceRef = ServiceFn::new("seo-bot", || async {
//!     HealthReport::healthy()
//! })
//! .with_recover(|| async { RecoveryOutcome::succeeded() })
//! .arc();
//!
//! assert_eq!(svc.name(), "seo-bot");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::error::ServiceError;
use crate::services::service::{HealthReport, RecoveryOutcome, Service};

type HealthFn = Box<dyn Fn() -> BoxFuture<'static, HealthReport> + Send + Sync>;
type RunFn =
    Box<dyn Fn(CancellationToken) -> BoxFuture<'static, Result<(), ServiceError>> + Send + Sync>;
type RecoverFn = Box<dyn Fn() -> BoxFuture<'static, RecoveryOutcome> + Send + Sync>;

/// Function-backed service.
///
/// Built from a health closure; optionally extended with run and recover
/// closures through the `with_*` methods.
pub struct ServiceFn {
    name: Cow<'static, str>,
    health: HealthFn,
    run: Option<RunFn>,
    recover: Option<RecoverFn>,
}

impl ServiceFn {
    /// Creates a service from a name and a health-probe closure.
    pub fn new<H, HFut>(name: impl Into<Cow<'static, str>>, health: H) -> Self
    where
        H: Fn() -> HFut + Send + Sync + 'static,
        HFut: Future<Output = HealthReport> + Send + 'static,
    {
        Self {
            name: name.into(),
            health: Box::new(move || Box::pin(health())),
            run: None,
            recover: None,
        }
    }

    /// Sets the execution body spawned as the service's handle.
    pub fn with_run<R, RFut>(mut self, run: R) -> Self
    where
        R: Fn(CancellationToken) -> RFut + Send + Sync + 'static,
        RFut: Future<Output = Result<(), ServiceError>> + Send + 'static,
    {
        self.run = Some(Box::new(move |ctx| Box::pin(run(ctx))));
        self
    }

    /// Sets a service-specific recovery hook.
    ///
    /// Without one, recovery falls back to restarting the handle.
    pub fn with_recover<C, CFut>(mut self, recover: C) -> Self
    where
        C: Fn() -> CFut + Send + Sync + 'static,
        CFut: Future<Output = RecoveryOutcome> + Send + 'static,
    {
        self.recover = Some(Box::new(move || Box::pin(recover())));
        self
    }

    /// Wraps the service in a shared handle.
    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl Service for ServiceFn {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: CancellationToken) -> Result<(), ServiceError> {
        match &self.run {
            Some(run) => run(ctx).await,
            None => {
                ctx.cancelled().await;
                Ok(())
            }
        }
    }

    async fn check_health(&self) -> HealthReport {
        (self.health)().await
    }

    async fn recover(&self) -> Option<RecoveryOutcome> {
        match &self.recover {
            Some(recover) => Some(recover().await),
            None => None,
        }
    }
}
