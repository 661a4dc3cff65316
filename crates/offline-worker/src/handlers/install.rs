use offline_net::Request;
use tracing::{info, warn};

use crate::{Capabilities, ServiceWorkerError, WorkerConfig};

/// Open the current cache generation and pre-cache the manifest.
///
/// Fails if any manifest resource cannot be fetched; nothing is cached then.
pub async fn handle_install(
    config: &WorkerConfig,
    caps: &Capabilities,
) -> Result<usize, ServiceWorkerError> {
    info!(cache = %config.cache_name, "Installing");

    caps.caches.open(&config.cache_name).await?;

    let requests = config
        .manifest_urls()?
        .into_iter()
        .map(Request::get)
        .collect();

    info!(cache = %config.cache_name, count = config.manifest.len(), "Caching files");
    let cached = caps
        .caches
        .add_all(&config.cache_name, requests, caps.network.as_ref())
        .await
        .map_err(|e| {
            warn!(cache = %config.cache_name, error = %e, "Pre-caching failed");
            ServiceWorkerError::InstallFailed(e.to_string())
        })?;

    Ok(cached)
}
