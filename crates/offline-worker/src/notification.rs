//! System notifications shown by the push and sync handlers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::info;

use crate::ServiceWorkerError;

/// A notification to display. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
}

impl Notification {
    pub fn new(title: impl Into<String>, body: impl Into<String>, icon: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            icon: icon.into(),
        }
    }
}

/// Notification display capability.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Display a notification. Resolves once it is shown.
    async fn show_notification(&self, notification: Notification)
        -> Result<(), ServiceWorkerError>;
}

/// Sink that writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn show_notification(
        &self,
        notification: Notification,
    ) -> Result<(), ServiceWorkerError> {
        info!(
            title = %notification.title,
            body = %notification.body,
            icon = %notification.icon,
            "Notification"
        );
        Ok(())
    }
}

/// Sink that keeps every notification it is asked to show.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    shown: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications shown so far, oldest first.
    pub async fn shown(&self) -> Vec<Notification> {
        self.shown.lock().await.clone()
    }

    /// Remove and return the notifications shown so far.
    pub async fn drain(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.shown.lock().await)
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn show_notification(
        &self,
        notification: Notification,
    ) -> Result<(), ServiceWorkerError> {
        self.shown.lock().await.push(notification);
        Ok(())
    }
}
