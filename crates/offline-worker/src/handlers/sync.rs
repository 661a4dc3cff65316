use bytes::Bytes;
use http::StatusCode;
use offline_net::Request;
use tracing::{error, info};

use crate::{Capabilities, Notification, ServiceWorkerError, SyncEvent, WorkerConfig};

/// What happened to the sync request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The endpoint answered, with any status.
    Delivered(StatusCode),
    /// No response was obtained.
    Failed(String),
}

impl SyncOutcome {
    pub fn delivered(&self) -> bool {
        matches!(self, SyncOutcome::Delivered(_))
    }
}

/// POST to the sync endpoint, then show the completion notification.
///
/// The notification is shown whether or not the request went through.
/// Returns `None` for tags this worker does not handle.
pub async fn handle_sync(
    event: SyncEvent,
    config: &WorkerConfig,
    caps: &Capabilities,
) -> Result<Option<SyncOutcome>, ServiceWorkerError> {
    info!(tag = %event.tag, last_chance = event.last_chance, "Sync event received");

    if event.tag != config.sync_tag {
        return Ok(None);
    }

    let endpoint = config.resolve(&config.sync_endpoint)?;
    let outcome = match caps.network.fetch(Request::post(endpoint, Bytes::new())).await {
        Ok(response) => {
            info!(status = %response.status, "Sync request sent");
            SyncOutcome::Delivered(response.status)
        }
        Err(e) => {
            error!(error = %e, "Sync request failed");
            SyncOutcome::Failed(e.to_string())
        }
    };

    caps.notifications
        .show_notification(Notification::new(
            config.notification_title.clone(),
            config.sync_complete_message.clone(),
            config.notification_icon.clone(),
        ))
        .await?;

    info!("Sync event handled");
    Ok(Some(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeNetwork, Harness};
    use http::Method;

    #[tokio::test]
    async fn test_sync_posts_and_notifies() {
        let harness = Harness::new(
            FakeNetwork::new().route("http://localhost:8080/sync-endpoint", "ok"),
        );

        let outcome = handle_sync(SyncEvent::new("syncMessage"), &harness.config, &harness.caps())
            .await
            .unwrap();

        assert_eq!(outcome, Some(SyncOutcome::Delivered(StatusCode::OK)));
        assert_eq!(
            harness.network.calls(),
            vec![(Method::POST, "http://localhost:8080/sync-endpoint".to_string())]
        );
        let shown = harness.notifier.shown().await;
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].body, "Sync successful!");
    }

    #[tokio::test]
    async fn test_sync_failure_still_notifies() {
        let harness = Harness::new(FakeNetwork::new());

        let outcome = handle_sync(SyncEvent::new("syncMessage"), &harness.config, &harness.caps())
            .await
            .unwrap()
            .unwrap();

        assert!(!outcome.delivered());
        let shown = harness.notifier.shown().await;
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].title, "VESIT");
        assert_eq!(shown[0].body, "Sync successful!");
    }

    #[tokio::test]
    async fn test_server_error_counts_as_delivered() {
        let harness = Harness::new(FakeNetwork::new().route_status(
            "http://localhost:8080/sync-endpoint",
            StatusCode::INTERNAL_SERVER_ERROR,
        ));

        let outcome = handle_sync(SyncEvent::new("syncMessage"), &harness.config, &harness.caps())
            .await
            .unwrap();

        assert_eq!(
            outcome,
            Some(SyncOutcome::Delivered(StatusCode::INTERNAL_SERVER_ERROR))
        );
    }

    #[tokio::test]
    async fn test_other_tags_ignored() {
        let harness = Harness::new(FakeNetwork::new());

        let outcome = handle_sync(SyncEvent::new("outbox"), &harness.config, &harness.caps())
            .await
            .unwrap();

        assert_eq!(outcome, None);
        assert!(harness.network.calls().is_empty());
        assert!(harness.notifier.shown().await.is_empty());
    }
}
