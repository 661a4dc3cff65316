//! In-memory capability fakes shared by unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use http::{Method, StatusCode};
use offline_net::{Fetcher, NetError, Request, Response, Url};

use crate::{
    CacheStorage, Capabilities, ClientControl, RecordingNotifier, ServiceWorkerError,
    WorkerConfig,
};

pub(crate) fn ok_response(url: &str, body: &'static str) -> Response {
    Response::new(Url::parse(url).unwrap(), StatusCode::OK, body)
}

/// Network that answers from a fixed route table and fails everything else.
#[derive(Default)]
pub(crate) struct FakeNetwork {
    routes: HashMap<String, Response>,
    calls: Mutex<Vec<(Method, String)>>,
}

impl FakeNetwork {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn route(mut self, url: &str, body: &'static str) -> Self {
        self.routes.insert(url.to_string(), ok_response(url, body));
        self
    }

    pub(crate) fn route_status(mut self, url: &str, status: StatusCode) -> Self {
        let response = Response::new(Url::parse(url).unwrap(), status, "");
        self.routes.insert(url.to_string(), response);
        self
    }

    pub(crate) fn calls(&self) -> Vec<(Method, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for FakeNetwork {
    async fn fetch(&self, request: Request) -> Result<Response, NetError> {
        self.calls
            .lock()
            .unwrap()
            .push((request.method.clone(), request.url.to_string()));
        self.routes
            .get(request.url.as_str())
            .cloned()
            .ok_or_else(|| NetError::RequestFailed("network unreachable".to_string()))
    }
}

/// Client control that only counts calls.
#[derive(Default)]
pub(crate) struct CountingClients {
    pub(crate) claims: AtomicUsize,
    pub(crate) skips: AtomicUsize,
}

#[async_trait]
impl ClientControl for CountingClients {
    async fn claim(&self) -> Result<(), ServiceWorkerError> {
        self.claims.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn skip_waiting(&self) -> Result<(), ServiceWorkerError> {
        self.skips.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Handles to every fake behind a [`Capabilities`] set.
pub(crate) struct Harness {
    pub(crate) config: WorkerConfig,
    pub(crate) caches: Arc<CacheStorage>,
    pub(crate) network: Arc<FakeNetwork>,
    pub(crate) notifier: Arc<RecordingNotifier>,
    pub(crate) clients: Arc<CountingClients>,
}

impl Harness {
    pub(crate) fn new(network: FakeNetwork) -> Self {
        Self {
            config: WorkerConfig::default(),
            caches: Arc::new(CacheStorage::new()),
            network: Arc::new(network),
            notifier: Arc::new(RecordingNotifier::new()),
            clients: Arc::new(CountingClients::default()),
        }
    }

    pub(crate) fn caps(&self) -> Capabilities {
        Capabilities {
            caches: self.caches.clone(),
            network: self.network.clone(),
            notifications: self.notifier.clone(),
            clients: self.clients.clone(),
        }
    }

    /// Absolute URL of `path` under the default scope.
    pub(crate) fn url(&self, path: &str) -> String {
        self.config.resolve(path).unwrap().to_string()
    }
}
