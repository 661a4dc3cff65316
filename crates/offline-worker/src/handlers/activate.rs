use futures::future::join_all;
use tracing::{info, warn};

use crate::{Capabilities, ServiceWorkerError, WorkerConfig};

/// Stale generations removed during activation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationReport {
    pub deleted: Vec<String>,
}

/// Delete every cache generation except the current one, then claim clients.
///
/// Deletions run concurrently and are all awaited before the claim. A failed
/// deletion does not stop the others; failures are reported together after
/// clients have been claimed.
pub async fn handle_activate(
    config: &WorkerConfig,
    caps: &Capabilities,
) -> Result<ActivationReport, ServiceWorkerError> {
    info!(cache = %config.cache_name, "Activating");

    let stale: Vec<String> = caps
        .caches
        .keys()
        .await
        .into_iter()
        .filter(|name| *name != config.cache_name)
        .collect();

    let results = join_all(stale.iter().map(|name| async move {
        info!(cache = %name, "Deleting old cache");
        (name, caps.caches.delete(name).await)
    }))
    .await;

    let mut report = ActivationReport::default();
    let mut failed = Vec::new();
    for (name, result) in results {
        match result {
            Ok(true) => report.deleted.push(name.clone()),
            Ok(false) => {}
            Err(e) => {
                warn!(cache = %name, error = %e, "Failed to delete old cache");
                failed.push(name.clone());
            }
        }
    }

    caps.clients.claim().await?;
    info!("Now controlling all clients");

    if failed.is_empty() {
        Ok(report)
    } else {
        Err(ServiceWorkerError::CacheCleanup(failed))
    }
}
