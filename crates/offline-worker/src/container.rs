//! Registration container: runs workers through install, waiting and activation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use async_trait::async_trait;
use offline_net::{Fetcher, Request};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};
use url::Url;

use crate::handlers::{FetchOutcome, MessageOutcome, SyncOutcome};
use crate::{
    CacheStore, Capabilities, Client, ClientControl, ClientMessage, Clients, EventOutcome,
    Notification, NotificationSink, OfflineWorker, PushMessage, ServiceWorkerError, SyncEvent,
    WorkerConfig, WorkerEvent,
};

// ==================== Types ====================

/// Unique identifier for a service worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceWorkerId(u64);

impl ServiceWorkerId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for ServiceWorkerId {
    fn default() -> Self {
        Self::new()
    }
}

/// Service worker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ServiceWorkerState {
    /// Created, install not started.
    #[default]
    Parsed,
    /// Install event running.
    Installing,
    /// Installed but waiting for activation.
    Installed,
    /// Activate event running.
    Activating,
    /// Active and controlling pages.
    Activated,
    /// Replaced or install failed.
    Redundant,
}

/// Position of a worker within its registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerSlot {
    Installing,
    Waiting,
    Active,
}

// ==================== Service Worker ====================

/// A service worker instance.
#[derive(Debug, Clone)]
pub struct ServiceWorker {
    pub id: ServiceWorkerId,
    pub script_url: Url,
    pub state: ServiceWorkerState,
    /// Activate as soon as installed, even if an older worker controls pages.
    pub skip_waiting: bool,
    /// Error message if install failed.
    pub error: Option<String>,
    pub state_changed_at: Instant,
    runtime: OfflineWorker,
}

impl ServiceWorker {
    fn new(id: ServiceWorkerId, script_url: Url, runtime: OfflineWorker) -> Self {
        Self {
            id,
            script_url,
            state: ServiceWorkerState::Parsed,
            skip_waiting: false,
            error: None,
            state_changed_at: Instant::now(),
            runtime,
        }
    }

    /// Set state.
    pub fn set_state(&mut self, state: ServiceWorkerState) {
        self.state = state;
        self.state_changed_at = Instant::now();
    }

    /// Check if active.
    pub fn is_active(&self) -> bool {
        self.state == ServiceWorkerState::Activated
    }

    /// Check if redundant.
    pub fn is_redundant(&self) -> bool {
        self.state == ServiceWorkerState::Redundant
    }

    /// Cache generation this worker owns.
    pub fn cache_name(&self) -> &str {
        &self.runtime.config().cache_name
    }

    pub fn runtime(&self) -> &OfflineWorker {
        &self.runtime
    }
}

// ==================== Registration ====================

/// A service worker registration.
#[derive(Debug)]
pub struct ServiceWorkerRegistration {
    pub scope: Url,
    pub installing: Option<ServiceWorker>,
    /// Installed but not active.
    pub waiting: Option<ServiceWorker>,
    pub active: Option<ServiceWorker>,
    pub last_update_check: Option<Instant>,
}

impl ServiceWorkerRegistration {
    /// Create a new registration.
    pub fn new(scope: Url) -> Self {
        Self {
            scope,
            installing: None,
            waiting: None,
            active: None,
            last_update_check: None,
        }
    }

    /// Worker in a slot.
    pub fn get(&self, slot: WorkerSlot) -> Option<&ServiceWorker> {
        match slot {
            WorkerSlot::Installing => self.installing.as_ref(),
            WorkerSlot::Waiting => self.waiting.as_ref(),
            WorkerSlot::Active => self.active.as_ref(),
        }
    }

    fn find_mut(&mut self, id: ServiceWorkerId) -> Option<&mut ServiceWorker> {
        [&mut self.installing, &mut self.waiting, &mut self.active]
            .into_iter()
            .filter_map(|slot| slot.as_mut())
            .find(|w| w.id == id)
    }

    /// Start installing a worker. Returns a previous in-progress install, now redundant.
    pub fn begin_install(&mut self, mut worker: ServiceWorker) -> Option<ServiceWorker> {
        worker.set_state(ServiceWorkerState::Installing);
        self.last_update_check = Some(Instant::now());
        let replaced = self.installing.replace(worker);
        replaced.map(|mut old| {
            old.set_state(ServiceWorkerState::Redundant);
            old
        })
    }

    /// Transition installing to waiting. Returns a previous waiting worker, now redundant.
    pub fn install_complete(&mut self) -> Option<ServiceWorker> {
        let mut worker = self.installing.take()?;
        worker.set_state(ServiceWorkerState::Installed);
        let replaced = self.waiting.replace(worker);
        replaced.map(|mut old| {
            old.set_state(ServiceWorkerState::Redundant);
            old
        })
    }

    /// Discard the installing worker.
    pub fn install_failed(&mut self, error: impl Into<String>) -> Option<ServiceWorker> {
        let mut worker = self.installing.take()?;
        worker.error = Some(error.into());
        worker.set_state(ServiceWorkerState::Redundant);
        Some(worker)
    }

    /// Move the waiting worker to active in `Activating` state.
    ///
    /// Returns the promoted worker's ID and the previous active worker, now redundant.
    pub fn promote_waiting(&mut self) -> Option<(ServiceWorkerId, Option<ServiceWorker>)> {
        let mut worker = self.waiting.take()?;
        worker.set_state(ServiceWorkerState::Activating);
        let id = worker.id;

        let old = self.active.replace(worker).map(|mut old| {
            old.set_state(ServiceWorkerState::Redundant);
            old
        });
        Some((id, old))
    }

    /// Mark the active worker `Activated` if it is still `id`.
    pub fn finish_activation(&mut self, id: ServiceWorkerId) -> bool {
        match self.active.as_mut() {
            Some(worker) if worker.id == id => {
                worker.set_state(ServiceWorkerState::Activated);
                true
            }
            _ => false,
        }
    }
}

// ==================== Events ====================

/// Container events.
#[derive(Debug, Clone, PartialEq)]
pub enum ContainerEvent {
    StateChange {
        worker_id: ServiceWorkerId,
        new_state: ServiceWorkerState,
    },
    UpdateFound {
        scope: String,
    },
    ControllerChange {
        client_id: String,
        worker_id: ServiceWorkerId,
    },
}

// ==================== Shared State ====================

#[derive(Debug)]
struct Shared {
    registration: RwLock<ServiceWorkerRegistration>,
    clients: RwLock<Clients>,
    event_tx: mpsc::UnboundedSender<ContainerEvent>,
}

impl Shared {
    fn emit(&self, event: ContainerEvent) {
        let _ = self.event_tx.send(event);
    }

    fn emit_state(&self, worker: &ServiceWorker) {
        self.emit(ContainerEvent::StateChange {
            worker_id: worker.id,
            new_state: worker.state,
        });
    }
}

/// Client control handed to one worker's handlers.
struct WorkerControl {
    worker_id: ServiceWorkerId,
    shared: Weak<Shared>,
}

impl WorkerControl {
    fn shared(&self) -> Result<Arc<Shared>, ServiceWorkerError> {
        self.shared
            .upgrade()
            .ok_or_else(|| ServiceWorkerError::StateError("container dropped".to_string()))
    }
}

#[async_trait]
impl ClientControl for WorkerControl {
    async fn claim(&self) -> Result<(), ServiceWorkerError> {
        let shared = self.shared()?;

        let scope = {
            let registration = shared.registration.read().await;
            match registration.active.as_ref() {
                Some(worker)
                    if worker.id == self.worker_id
                        && matches!(
                            worker.state,
                            ServiceWorkerState::Activating | ServiceWorkerState::Activated
                        ) => {}
                _ => {
                    return Err(ServiceWorkerError::StateError(
                        "only the active worker can claim clients".to_string(),
                    ))
                }
            }
            registration.scope.clone()
        };

        let claimed = shared.clients.write().await.claim(&scope, self.worker_id);
        for client_id in claimed {
            debug!(client = %client_id, worker = self.worker_id.raw(), "Client claimed");
            shared.emit(ContainerEvent::ControllerChange {
                client_id,
                worker_id: self.worker_id,
            });
        }
        Ok(())
    }

    async fn skip_waiting(&self) -> Result<(), ServiceWorkerError> {
        let shared = self.shared()?;
        let mut registration = shared.registration.write().await;
        if let Some(worker) = registration.find_mut(self.worker_id) {
            worker.skip_waiting = true;
        }
        Ok(())
    }
}

// ==================== Service Worker Container ====================

/// Hosts the registration for one scope and delivers events to its workers.
pub struct ServiceWorkerContainer {
    shared: Arc<Shared>,
    caches: Arc<dyn CacheStore>,
    network: Arc<dyn Fetcher>,
    notifications: Arc<dyn NotificationSink>,
}

impl ServiceWorkerContainer {
    /// Create a new container.
    pub fn new(
        scope: Url,
        caches: Arc<dyn CacheStore>,
        network: Arc<dyn Fetcher>,
        notifications: Arc<dyn NotificationSink>,
    ) -> (Self, mpsc::UnboundedReceiver<ContainerEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let shared = Arc::new(Shared {
            registration: RwLock::new(ServiceWorkerRegistration::new(scope)),
            clients: RwLock::new(Clients::new()),
            event_tx,
        });

        (
            Self {
                shared,
                caches,
                network,
                notifications,
            },
            event_rx,
        )
    }

    pub async fn scope(&self) -> Url {
        self.shared.registration.read().await.scope.clone()
    }

    /// Install a new worker generation and activate it if nothing holds it back.
    pub async fn register(
        &self,
        config: WorkerConfig,
        script_url: Url,
    ) -> Result<ServiceWorkerId, ServiceWorkerError> {
        let scope = self.scope().await;
        if config.scope != scope {
            return Err(ServiceWorkerError::Config(format!(
                "worker scope {} does not match registration scope {}",
                config.scope, scope
            )));
        }

        let worker = self.create_worker(config, script_url.clone())?;
        let id = worker.id;
        let runtime = worker.runtime.clone();

        info!(script = %script_url, cache = %runtime.config().cache_name, "Registering worker");

        {
            let mut registration = self.shared.registration.write().await;
            if let Some(old) = registration.begin_install(worker) {
                self.shared.emit_state(&old);
            }
            if let Some(installing) = registration.installing.as_ref() {
                self.shared.emit_state(installing);
            }
        }
        self.shared.emit(ContainerEvent::UpdateFound {
            scope: scope.to_string(),
        });

        if let Err(e) = runtime.dispatch(WorkerEvent::Install).await {
            warn!(error = %e, "Install failed");
            let mut registration = self.shared.registration.write().await;
            if registration.installing.as_ref().map(|w| w.id) == Some(id) {
                if let Some(failed) = registration.install_failed(e.to_string()) {
                    self.shared.emit_state(&failed);
                }
            }
            return Err(e);
        }

        {
            let mut registration = self.shared.registration.write().await;
            if registration.installing.as_ref().map(|w| w.id) != Some(id) {
                return Err(ServiceWorkerError::StateError(
                    "install superseded by a newer registration".to_string(),
                ));
            }
            if let Some(old) = registration.install_complete() {
                self.shared.emit_state(&old);
            }
            if let Some(waiting) = registration.waiting.as_ref() {
                self.shared.emit_state(waiting);
            }
        }

        self.activate_if_ready().await;
        Ok(id)
    }

    /// Build a worker wired to this container's capabilities.
    fn create_worker(
        &self,
        config: WorkerConfig,
        script_url: Url,
    ) -> Result<ServiceWorker, ServiceWorkerError> {
        let id = ServiceWorkerId::new();
        let caps = Capabilities {
            caches: self.caches.clone(),
            network: self.network.clone(),
            notifications: self.notifications.clone(),
            clients: Arc::new(WorkerControl {
                worker_id: id,
                shared: Arc::downgrade(&self.shared),
            }),
        };
        let runtime = OfflineWorker::new(config, caps)?;
        Ok(ServiceWorker::new(id, script_url, runtime))
    }

    /// Activate the waiting worker if there is no active worker, the active one
    /// controls no pages, or the waiting one asked to skip waiting.
    async fn activate_if_ready(&self) -> Option<ServiceWorkerId> {
        let (skip, active) = {
            let registration = self.shared.registration.read().await;
            let waiting = registration.waiting.as_ref()?;
            (waiting.skip_waiting, registration.active.as_ref().map(|w| w.id))
        };

        let ready = match active {
            None => true,
            Some(_) if skip => true,
            Some(active) => self
                .shared
                .clients
                .read()
                .await
                .controlled_by(active)
                .is_empty(),
        };

        if ready {
            self.activate_waiting().await
        } else {
            debug!("Worker waiting for controlled pages to close");
            None
        }
    }

    async fn activate_waiting(&self) -> Option<ServiceWorkerId> {
        let (id, runtime, old_id) = {
            let mut registration = self.shared.registration.write().await;
            let (id, old) = registration.promote_waiting()?;
            if let Some(old) = old.as_ref() {
                self.shared.emit_state(old);
            }
            let active = registration.active.as_ref()?;
            self.shared.emit_state(active);
            (id, active.runtime.clone(), old.map(|w| w.id))
        };

        if let Some(old_id) = old_id {
            let moved = self.shared.clients.write().await.hand_over(old_id, id);
            for client_id in moved {
                self.shared.emit(ContainerEvent::ControllerChange {
                    client_id,
                    worker_id: id,
                });
            }
        }

        if let Err(e) = runtime.dispatch(WorkerEvent::Activate).await {
            warn!(error = %e, "Activate handler failed");
        }

        let mut registration = self.shared.registration.write().await;
        if !registration.finish_activation(id) {
            debug!(worker = id.raw(), "Activation superseded by a newer worker");
            return None;
        }
        if let Some(active) = registration.active.as_ref() {
            self.shared.emit_state(active);
        }
        info!(worker = id.raw(), "Worker activated");
        Some(id)
    }

    async fn runtime(&self, slot: WorkerSlot) -> Option<OfflineWorker> {
        self.shared
            .registration
            .read()
            .await
            .get(slot)
            .map(|w| w.runtime.clone())
    }

    async fn active_runtime(&self) -> Result<OfflineWorker, ServiceWorkerError> {
        self.runtime(WorkerSlot::Active)
            .await
            .ok_or_else(|| ServiceWorkerError::NotFound("active worker".to_string()))
    }

    /// Snapshot of the worker in a slot.
    pub async fn worker(&self, slot: WorkerSlot) -> Option<ServiceWorker> {
        self.shared.registration.read().await.get(slot).cloned()
    }

    /// Resolve a page request. Without an active worker it goes straight to the network.
    pub async fn handle_fetch(&self, request: Request) -> Result<FetchOutcome, ServiceWorkerError> {
        match self.runtime(WorkerSlot::Active).await {
            Some(runtime) => runtime.fetch(request).await,
            None => {
                debug!(url = %request.url, "No active worker, using network");
                let response = self.network.fetch(request).await?;
                Ok(FetchOutcome::Ignored(response))
            }
        }
    }

    /// Post a message to the worker in `slot`, then activate a waiting worker
    /// that asked to skip waiting.
    pub async fn post_message(
        &self,
        slot: WorkerSlot,
        data: Value,
    ) -> Result<MessageOutcome, ServiceWorkerError> {
        let runtime = self
            .runtime(slot)
            .await
            .ok_or_else(|| ServiceWorkerError::NotFound(format!("{:?} worker", slot)))?;

        let outcome = match runtime
            .dispatch(WorkerEvent::Message(ClientMessage::new(data)))
            .await?
        {
            EventOutcome::Message(outcome) => outcome,
            other => return Err(unexpected("message", other)),
        };

        self.activate_if_ready().await;
        Ok(outcome)
    }

    /// Deliver a push message to the active worker.
    pub async fn push(&self, message: PushMessage) -> Result<Notification, ServiceWorkerError> {
        match self
            .active_runtime()
            .await?
            .dispatch(WorkerEvent::Push(message))
            .await?
        {
            EventOutcome::Push(notification) => Ok(notification),
            other => Err(unexpected("push", other)),
        }
    }

    /// Deliver a background sync to the active worker.
    pub async fn sync(&self, event: SyncEvent) -> Result<Option<SyncOutcome>, ServiceWorkerError> {
        match self
            .active_runtime()
            .await?
            .dispatch(WorkerEvent::Sync(event))
            .await?
        {
            EventOutcome::Sync(outcome) => Ok(outcome),
            other => Err(unexpected("sync", other)),
        }
    }

    /// Open a page. Pages in scope are controlled by the active worker.
    pub async fn add_client(&self, url: Url) -> Client {
        let (scope, active) = {
            let registration = self.shared.registration.read().await;
            (
                registration.scope.clone(),
                registration.active.as_ref().map(|w| w.id),
            )
        };

        let mut client = Client::new(url);
        if client.in_scope(&scope) {
            client.controller = active;
        }
        self.shared.clients.write().await.add(client.clone());
        client
    }

    /// Close a page. A waiting worker activates once no page uses the old one.
    pub async fn remove_client(&self, id: &str) -> Option<Client> {
        let removed = self.shared.clients.write().await.remove(id);
        if removed.is_some() {
            self.activate_if_ready().await;
        }
        removed
    }

    /// Snapshot of open pages.
    pub async fn clients(&self) -> Vec<Client> {
        self.shared
            .clients
            .read()
            .await
            .all()
            .into_iter()
            .cloned()
            .collect()
    }
}

fn unexpected(kind: &str, outcome: EventOutcome) -> ServiceWorkerError {
    ServiceWorkerError::StateError(format!("unexpected outcome for {}: {:?}", kind, outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeNetwork, Harness};
    use crate::{CacheStorage, FetchState, RecordingNotifier};
    use offline_net::Response;
    use serde_json::json;
    use std::sync::atomic::AtomicBool;
    use tokio::sync::Notify;

    /// Cache storage whose first `keys` call waits for `release`.
    #[derive(Default)]
    struct GatedStore {
        inner: CacheStorage,
        gate: Notify,
        held: AtomicBool,
    }

    impl GatedStore {
        fn release(&self) {
            self.gate.notify_one();
        }
    }

    #[async_trait]
    impl CacheStore for GatedStore {
        async fn open(&self, name: &str) -> Result<(), ServiceWorkerError> {
            self.inner.open(name).await
        }

        async fn put(
            &self,
            name: &str,
            request: &Request,
            response: Response,
        ) -> Result<(), ServiceWorkerError> {
            self.inner.put(name, request, response).await
        }

        async fn match_request(&self, request: &Request) -> Option<Response> {
            self.inner.match_request(request).await
        }

        async fn keys(&self) -> Vec<String> {
            if !self.held.swap(true, Ordering::SeqCst) {
                self.gate.notified().await;
            }
            self.inner.keys().await
        }

        async fn delete(&self, name: &str) -> Result<bool, ServiceWorkerError> {
            self.inner.delete(name).await
        }
    }

    fn worker(harness: &Harness) -> ServiceWorker {
        let runtime = OfflineWorker::new(harness.config.clone(), harness.caps()).unwrap();
        let script = Url::parse("http://localhost:8080/service-worker.js").unwrap();
        ServiceWorker::new(ServiceWorkerId::new(), script, runtime)
    }

    fn site() -> FakeNetwork {
        FakeNetwork::new()
            .route("http://localhost:8080/", "home")
            .route("http://localhost:8080/offline.html", "offline")
    }

    fn config(cache: &str) -> WorkerConfig {
        WorkerConfig::default()
            .with_cache_name(cache)
            .with_manifest(["/", "/offline.html"])
    }

    fn script() -> Url {
        Url::parse("http://localhost:8080/service-worker.js").unwrap()
    }

    fn container(
        network: FakeNetwork,
    ) -> (
        ServiceWorkerContainer,
        Arc<CacheStorage>,
        mpsc::UnboundedReceiver<ContainerEvent>,
    ) {
        let caches = Arc::new(CacheStorage::new());
        let (container, rx) = ServiceWorkerContainer::new(
            Url::parse("http://localhost:8080/").unwrap(),
            caches.clone(),
            Arc::new(network),
            Arc::new(RecordingNotifier::new()),
        );
        (container, caches, rx)
    }

    #[test]
    fn test_registration_lifecycle() {
        let harness = Harness::new(FakeNetwork::new());
        let mut registration =
            ServiceWorkerRegistration::new(Url::parse("http://localhost:8080/").unwrap());

        assert!(registration.begin_install(worker(&harness)).is_none());
        assert_eq!(
            registration.installing.as_ref().unwrap().state,
            ServiceWorkerState::Installing
        );

        // Installing -> Installed
        assert!(registration.install_complete().is_none());
        assert!(registration.installing.is_none());
        assert_eq!(
            registration.waiting.as_ref().unwrap().state,
            ServiceWorkerState::Installed
        );

        // Installed -> Activating -> Activated
        let (id, old) = registration.promote_waiting().unwrap();
        assert!(old.is_none());
        assert!(registration.waiting.is_none());
        assert!(registration.finish_activation(id));
        assert!(registration.active.as_ref().unwrap().is_active());
    }

    #[test]
    fn test_promote_marks_old_redundant() {
        let harness = Harness::new(FakeNetwork::new());
        let mut registration =
            ServiceWorkerRegistration::new(Url::parse("http://localhost:8080/").unwrap());
        registration.active = Some(worker(&harness));
        registration.waiting = Some(worker(&harness));

        let (_, old) = registration.promote_waiting().unwrap();
        assert!(old.unwrap().is_redundant());
    }

    #[test]
    fn test_install_failed_records_error() {
        let harness = Harness::new(FakeNetwork::new());
        let mut registration =
            ServiceWorkerRegistration::new(Url::parse("http://localhost:8080/").unwrap());
        registration.begin_install(worker(&harness));

        let failed = registration.install_failed("offline.html unreachable").unwrap();
        assert!(failed.is_redundant());
        assert_eq!(failed.error.as_deref(), Some("offline.html unreachable"));
        assert!(registration.waiting.is_none());
    }

    #[test]
    fn test_find_mut_searches_all_slots() {
        let harness = Harness::new(FakeNetwork::new());
        let mut registration =
            ServiceWorkerRegistration::new(Url::parse("http://localhost:8080/").unwrap());
        let waiting = worker(&harness);
        let id = waiting.id;
        registration.waiting = Some(waiting);

        registration.find_mut(id).unwrap().skip_waiting = true;
        assert!(registration.waiting.as_ref().unwrap().skip_waiting);
        assert!(registration.find_mut(ServiceWorkerId::new()).is_none());
    }

    #[tokio::test]
    async fn test_first_registration_activates_and_claims() {
        let (container, caches, mut rx) = container(site());
        let page = container
            .add_client(Url::parse("http://localhost:8080/").unwrap())
            .await;
        assert!(page.controller.is_none());

        let id = container.register(config("pwa-v1"), script()).await.unwrap();

        let active = container.worker(WorkerSlot::Active).await.unwrap();
        assert_eq!(active.id, id);
        assert!(active.is_active());
        assert_eq!(caches.keys().await, vec!["pwa-v1".to_string()]);
        assert_eq!(container.clients().await[0].controller, Some(id));

        let mut saw_claim = false;
        while let Ok(event) = rx.try_recv() {
            if let ContainerEvent::ControllerChange { client_id, worker_id } = event {
                saw_claim = client_id == page.id && worker_id == id;
            }
        }
        assert!(saw_claim);
    }

    #[tokio::test]
    async fn test_failed_install_keeps_previous_worker() {
        let (container, caches, _rx) = container(site());
        let v1 = container.register(config("pwa-v1"), script()).await.unwrap();

        let broken = config("pwa-v2").with_manifest(["/", "/missing.css"]);
        let result = container.register(broken, script()).await;

        assert!(matches!(result, Err(ServiceWorkerError::InstallFailed(_))));
        assert_eq!(container.worker(WorkerSlot::Active).await.unwrap().id, v1);
        assert!(container.worker(WorkerSlot::Installing).await.is_none());
        assert!(container.worker(WorkerSlot::Waiting).await.is_none());
        assert_eq!(
            caches.get("pwa-v2").await.map(|c| c.len()).unwrap_or(0),
            0
        );
    }

    #[tokio::test]
    async fn test_update_waits_while_pages_are_controlled() {
        let (container, caches, _rx) = container(site());
        let v1 = container.register(config("pwa-v1"), script()).await.unwrap();
        let page = container
            .add_client(Url::parse("http://localhost:8080/").unwrap())
            .await;
        assert_eq!(page.controller, Some(v1));

        let v2 = container.register(config("pwa-v2"), script()).await.unwrap();

        assert_eq!(container.worker(WorkerSlot::Active).await.unwrap().id, v1);
        assert_eq!(container.worker(WorkerSlot::Waiting).await.unwrap().id, v2);
        let mut names = caches.keys().await;
        names.sort();
        assert_eq!(names, vec!["pwa-v1".to_string(), "pwa-v2".to_string()]);

        // Closing the last page lets the update through.
        container.remove_client(&page.id).await;
        assert_eq!(container.worker(WorkerSlot::Active).await.unwrap().id, v2);
        assert_eq!(caches.keys().await, vec!["pwa-v2".to_string()]);
    }

    #[tokio::test]
    async fn test_skip_waiting_message_activates_update() {
        let (container, caches, _rx) = container(site());
        container.register(config("pwa-v1"), script()).await.unwrap();
        let page = container
            .add_client(Url::parse("http://localhost:8080/").unwrap())
            .await;
        let v2 = container.register(config("pwa-v2"), script()).await.unwrap();

        let outcome = container
            .post_message(WorkerSlot::Waiting, json!({"action": "skipWaiting"}))
            .await
            .unwrap();

        assert_eq!(outcome, MessageOutcome::SkipWaiting);
        assert_eq!(container.worker(WorkerSlot::Active).await.unwrap().id, v2);
        assert!(container.worker(WorkerSlot::Waiting).await.is_none());
        assert_eq!(caches.keys().await, vec!["pwa-v2".to_string()]);
        let page = container
            .clients()
            .await
            .into_iter()
            .find(|c| c.id == page.id)
            .unwrap();
        assert_eq!(page.controller, Some(v2));
    }

    #[tokio::test]
    async fn test_other_message_leaves_update_waiting() {
        let (container, _caches, _rx) = container(site());
        container.register(config("pwa-v1"), script()).await.unwrap();
        container
            .add_client(Url::parse("http://localhost:8080/").unwrap())
            .await;
        let v2 = container.register(config("pwa-v2"), script()).await.unwrap();

        let outcome = container
            .post_message(WorkerSlot::Waiting, json!({"action": "refresh"}))
            .await
            .unwrap();

        assert_eq!(outcome, MessageOutcome::Ignored);
        assert_eq!(container.worker(WorkerSlot::Waiting).await.unwrap().id, v2);
    }

    #[tokio::test]
    async fn test_fetch_without_active_worker_uses_network() {
        let (container, _caches, _rx) = container(site());

        let outcome = container
            .handle_fetch(Request::parse_get("http://localhost:8080/").unwrap())
            .await
            .unwrap();

        assert_eq!(outcome.state(), FetchState::Ignored);
        assert_eq!(outcome.response().text(), "home");
    }

    #[tokio::test]
    async fn test_push_requires_active_worker() {
        let (container, _caches, _rx) = container(site());
        let result = container.push(PushMessage::empty()).await;
        assert!(matches!(result, Err(ServiceWorkerError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_scope_mismatch_rejected() {
        let (container, _caches, _rx) = container(site());
        let other = config("pwa-v1").with_scope(Url::parse("https://elsewhere.example/").unwrap());
        assert!(matches!(
            container.register(other, script()).await,
            Err(ServiceWorkerError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_claim_rejected_for_waiting_worker() {
        let (container, _caches, _rx) = container(site());
        container.register(config("pwa-v1"), script()).await.unwrap();
        container
            .add_client(Url::parse("http://localhost:8080/").unwrap())
            .await;
        container.register(config("pwa-v2"), script()).await.unwrap();

        let waiting = container.worker(WorkerSlot::Waiting).await.unwrap();
        let result = waiting.runtime().capabilities().clients.claim().await;
        assert!(matches!(result, Err(ServiceWorkerError::StateError(_))));
    }

    #[tokio::test]
    async fn test_superseded_activation_is_not_reported() {
        let store = Arc::new(GatedStore::default());
        let (container, _rx) = ServiceWorkerContainer::new(
            Url::parse("http://localhost:8080/").unwrap(),
            store.clone(),
            Arc::new(site()),
            Arc::new(RecordingNotifier::new()),
        );

        let v1 = container.create_worker(config("pwa-v1"), script()).unwrap();
        let v1_id = v1.id;
        {
            let mut registration = container.shared.registration.write().await;
            registration.begin_install(v1);
            registration.install_complete();
        }

        // v1's activate handler stalls while v2 registers and takes over.
        let (first, v2) = tokio::join!(container.activate_waiting(), async {
            while container.worker(WorkerSlot::Active).await.map(|w| w.id) != Some(v1_id) {
                tokio::task::yield_now().await;
            }
            let v2 = container.register(config("pwa-v2"), script()).await.unwrap();
            store.release();
            v2
        });

        assert_eq!(first, None);
        let active = container.worker(WorkerSlot::Active).await.unwrap();
        assert_eq!(active.id, v2);
        assert!(active.is_active());
    }
}
