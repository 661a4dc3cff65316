//! Worker: configuration plus capabilities, with event dispatch.

use std::fmt;
use std::sync::Arc;

use offline_net::{Fetcher, Request};
use tracing::{debug, info_span, Instrument};

use crate::handlers::{self, FetchOutcome};
use crate::{
    CacheStore, ClientControl, EventOutcome, NotificationSink, ServiceWorkerError, WorkerConfig,
    WorkerEvent,
};

/// Everything a handler may touch outside its own payload.
#[derive(Clone)]
pub struct Capabilities {
    pub caches: Arc<dyn CacheStore>,
    pub network: Arc<dyn Fetcher>,
    pub notifications: Arc<dyn NotificationSink>,
    pub clients: Arc<dyn ClientControl>,
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities").finish_non_exhaustive()
    }
}

/// One worker generation.
#[derive(Debug, Clone)]
pub struct OfflineWorker {
    config: Arc<WorkerConfig>,
    caps: Capabilities,
}

impl OfflineWorker {
    /// Create a worker after validating its configuration.
    pub fn new(config: WorkerConfig, caps: Capabilities) -> Result<Self, ServiceWorkerError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            caps,
        })
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    /// Route an event to its handler.
    pub async fn dispatch(&self, event: WorkerEvent) -> Result<EventOutcome, ServiceWorkerError> {
        let span = info_span!("event", kind = event.name(), cache = %self.config.cache_name);
        async move {
            debug!("Dispatching");
            let config = self.config.as_ref();
            let caps = &self.caps;
            match event {
                WorkerEvent::Install => handlers::handle_install(config, caps)
                    .await
                    .map(EventOutcome::Installed),
                WorkerEvent::Activate => handlers::handle_activate(config, caps)
                    .await
                    .map(EventOutcome::Activated),
                WorkerEvent::Fetch(request) => handlers::handle_fetch(request, config, caps)
                    .await
                    .map(EventOutcome::Fetch),
                WorkerEvent::Push(message) => handlers::handle_push(message, config, caps)
                    .await
                    .map(EventOutcome::Push),
                WorkerEvent::Sync(event) => handlers::handle_sync(event, config, caps)
                    .await
                    .map(EventOutcome::Sync),
                WorkerEvent::Message(message) => handlers::handle_message(message, config, caps)
                    .await
                    .map(EventOutcome::Message),
            }
        }
        .instrument(span)
        .await
    }

    /// Shorthand for dispatching a fetch event.
    pub async fn fetch(&self, request: Request) -> Result<FetchOutcome, ServiceWorkerError> {
        match self.dispatch(WorkerEvent::Fetch(request)).await? {
            EventOutcome::Fetch(outcome) => Ok(outcome),
            other => Err(ServiceWorkerError::StateError(format!(
                "unexpected outcome for fetch: {:?}",
                other
            ))),
        }
    }
}
