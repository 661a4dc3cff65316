//! # Offline Worker
//!
//! An offline-caching service worker for a single web page.
//!
//! ## Features
//!
//! - **Install**: pre-cache a fixed manifest into one named cache generation
//! - **Activate**: delete stale generations, then claim open pages
//! - **Fetch**: cache → network → offline page fallback chain
//! - **Push / Sync**: system notifications for push messages and background sync
//! - **Upgrade**: `skipWaiting` control message activates a waiting worker
//!
//! ## Architecture
//!
//! ```text
//! ServiceWorkerContainer
//!     │
//!     └── ServiceWorkerRegistration
//!             ├── installing (ServiceWorker)
//!             ├── waiting (ServiceWorker)
//!             └── active (ServiceWorker) ── OfflineWorker
//!                                               │
//!                 WorkerEvent ──► dispatch ──► handlers (install, activate,
//!                                               fetch, push, sync, message)
//!                                               │
//!                                          Capabilities
//!             ┌───────────────┬─────────────────┼──────────────────┐
//!        CacheStore        Fetcher      NotificationSink      ClientControl
//! ```

use offline_net::NetError;
use thiserror::Error;

pub mod cache;
pub mod clients;
pub mod config;
pub mod container;
pub mod events;
pub mod handlers;
pub mod notification;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{Cache, CacheEntry, CacheStorage, CacheStore, RequestKey};
pub use clients::{Client, ClientControl, Clients};
pub use config::WorkerConfig;
pub use container::{
    ContainerEvent, ServiceWorker, ServiceWorkerContainer, ServiceWorkerId,
    ServiceWorkerRegistration, ServiceWorkerState, WorkerSlot,
};
pub use events::{ClientMessage, EventOutcome, PushMessage, SyncEvent, WorkerEvent};
pub use handlers::{
    ActivationReport, FetchOutcome, FetchState, MessageOutcome, SyncOutcome,
};
pub use notification::{LogNotifier, Notification, NotificationSink, RecordingNotifier};
pub use worker::{Capabilities, OfflineWorker};

/// Errors that can occur in service worker operations.
#[derive(Error, Debug)]
pub enum ServiceWorkerError {
    #[error("Install failed: {0}")]
    InstallFailed(String),

    #[error("Failed to delete stale caches: {}", .0.join(", "))]
    CacheCleanup(Vec<String>),

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("Network error: {0}")]
    Network(#[from] NetError),

    #[error("State error: {0}")]
    StateError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}
