//! Clients API: the pages a worker can control.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use url::Url;

use crate::{ServiceWorkerError, ServiceWorkerId};

/// Client control capability used by the lifecycle handlers.
#[async_trait]
pub trait ClientControl: Send + Sync {
    /// Take control of every open page in scope without a reload.
    async fn claim(&self) -> Result<(), ServiceWorkerError>;

    /// Activate this worker as soon as it is waiting.
    async fn skip_waiting(&self) -> Result<(), ServiceWorkerError>;
}

/// A client (open page).
#[derive(Debug, Clone, PartialEq)]
pub struct Client {
    /// Client ID.
    pub id: String,

    /// Client URL.
    pub url: Url,

    /// Worker controlling this page, if any.
    pub controller: Option<ServiceWorkerId>,
}

impl Client {
    /// Create an uncontrolled client.
    pub fn new(url: Url) -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self {
            id: format!("client-{}", COUNTER.fetch_add(1, Ordering::Relaxed)),
            url,
            controller: None,
        }
    }

    /// Whether the page lies inside `scope`.
    ///
    /// Scope matching is a plain URL prefix, as in browser registration
    /// matching: a scope without a trailing slash such as `/app` also covers
    /// `/application`.
    pub fn in_scope(&self, scope: &Url) -> bool {
        self.url.as_str().starts_with(scope.as_str())
    }
}

/// Open pages known to a container.
#[derive(Debug, Default)]
pub struct Clients {
    clients: HashMap<String, Client>,
}

impl Clients {
    /// Create new clients manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a client by ID.
    pub fn get(&self, id: &str) -> Option<&Client> {
        self.clients.get(id)
    }

    /// All clients.
    pub fn all(&self) -> Vec<&Client> {
        self.clients.values().collect()
    }

    /// Clients controlled by `worker`.
    pub fn controlled_by(&self, worker: ServiceWorkerId) -> Vec<&Client> {
        self.clients
            .values()
            .filter(|c| c.controller == Some(worker))
            .collect()
    }

    /// Add a client.
    pub fn add(&mut self, client: Client) {
        self.clients.insert(client.id.clone(), client);
    }

    /// Remove a client.
    pub fn remove(&mut self, id: &str) -> Option<Client> {
        self.clients.remove(id)
    }

    /// Set `worker` as controller of every in-scope client it does not yet control.
    ///
    /// Returns the IDs of clients whose controller changed.
    pub fn claim(&mut self, scope: &Url, worker: ServiceWorkerId) -> Vec<String> {
        self.clients
            .values_mut()
            .filter(|c| c.in_scope(scope) && c.controller != Some(worker))
            .map(|c| {
                c.controller = Some(worker);
                c.id.clone()
            })
            .collect()
    }

    /// Move clients controlled by `from` over to `to`.
    pub fn hand_over(&mut self, from: ServiceWorkerId, to: ServiceWorkerId) -> Vec<String> {
        self.clients
            .values_mut()
            .filter(|c| c.controller == Some(from))
            .map(|c| {
                c.controller = Some(to);
                c.id.clone()
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
