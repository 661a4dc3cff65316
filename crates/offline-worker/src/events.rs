//! Events delivered to a worker and their outcomes.

use bytes::Bytes;
use offline_net::Request;
use serde_json::Value;

use crate::handlers::{ActivationReport, FetchOutcome, MessageOutcome, SyncOutcome};
use crate::Notification;

/// Payload of a push event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PushMessage {
    /// Raw payload, `None` when the push carried no data.
    pub data: Option<Bytes>,
}

impl PushMessage {
    /// Push without a payload.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Push with a raw payload.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: Some(data.into()),
        }
    }

    /// Push with a JSON payload.
    pub fn json(value: &Value) -> Self {
        Self::new(value.to_string())
    }
}

/// A background sync event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncEvent {
    pub tag: String,
    /// Whether the browser will not retry this sync again.
    pub last_chance: bool,
}

impl SyncEvent {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            last_chance: false,
        }
    }
}

/// A message posted to the worker by a page.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientMessage {
    pub data: Value,
    /// ID of the sending client, if known.
    pub source: Option<String>,
}

impl ClientMessage {
    pub fn new(data: Value) -> Self {
        Self { data, source: None }
    }

    /// The `action` field, if the message is an object carrying one.
    pub fn action(&self) -> Option<&str> {
        self.data.get("action").and_then(Value::as_str)
    }
}

/// The finite set of triggers a worker responds to.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Install,
    Activate,
    Fetch(Request),
    Push(PushMessage),
    Sync(SyncEvent),
    Message(ClientMessage),
}

impl WorkerEvent {
    /// Event type name.
    pub fn name(&self) -> &'static str {
        match self {
            WorkerEvent::Install => "install",
            WorkerEvent::Activate => "activate",
            WorkerEvent::Fetch(_) => "fetch",
            WorkerEvent::Push(_) => "push",
            WorkerEvent::Sync(_) => "sync",
            WorkerEvent::Message(_) => "message",
        }
    }
}

/// Result of handling one [`WorkerEvent`].
#[derive(Debug)]
pub enum EventOutcome {
    /// Number of manifest entries cached.
    Installed(usize),
    Activated(ActivationReport),
    Fetch(FetchOutcome),
    /// Notification shown for the push.
    Push(Notification),
    /// `None` when the sync tag is not handled.
    Sync(Option<SyncOutcome>),
    Message(MessageOutcome),
}
