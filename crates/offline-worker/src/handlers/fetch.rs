use http::{header, HeaderValue, StatusCode};
use offline_net::{Request, Response};
use tracing::{debug, info};
use url::Url;

use crate::{Capabilities, ServiceWorkerError, WorkerConfig};

const OFFLINE_PLACEHOLDER: &str =
    "<!DOCTYPE html><html><head><title>Offline</title></head><body><h1>You are offline</h1></body></html>";

/// Terminal state of an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    /// Not a cacheable request; sent straight to the network.
    Ignored,
    CacheHit,
    NetworkFallback,
    OfflineFallback,
}

/// Response produced by the fallback chain, tagged with how it was obtained.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Ignored(Response),
    CacheHit(Response),
    NetworkFallback(Response),
    OfflineFallback(Response),
}

impl FetchOutcome {
    pub fn state(&self) -> FetchState {
        match self {
            FetchOutcome::Ignored(_) => FetchState::Ignored,
            FetchOutcome::CacheHit(_) => FetchState::CacheHit,
            FetchOutcome::NetworkFallback(_) => FetchState::NetworkFallback,
            FetchOutcome::OfflineFallback(_) => FetchState::OfflineFallback,
        }
    }

    pub fn response(&self) -> &Response {
        match self {
            FetchOutcome::Ignored(r)
            | FetchOutcome::CacheHit(r)
            | FetchOutcome::NetworkFallback(r)
            | FetchOutcome::OfflineFallback(r) => r,
        }
    }

    pub fn into_response(self) -> Response {
        match self {
            FetchOutcome::Ignored(r)
            | FetchOutcome::CacheHit(r)
            | FetchOutcome::NetworkFallback(r)
            | FetchOutcome::OfflineFallback(r) => r,
        }
    }
}

/// Whether a request skips the cache: anything but GET, or the worker script itself.
pub fn is_passthrough(request: &Request, config: &WorkerConfig) -> bool {
    !request.is_get() || config.script_pattern.matches(&request.url)
}

/// Response served when the offline page itself is not cached.
pub fn offline_placeholder(url: Url) -> Response {
    Response::new(url, StatusCode::SERVICE_UNAVAILABLE, OFFLINE_PLACEHOLDER).with_header(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    )
}

/// Resolve a request through cache → network → offline page.
///
/// Only an ignored request can fail: its network error is returned as-is.
/// Nothing fetched here is written to the cache.
pub async fn handle_fetch(
    request: Request,
    config: &WorkerConfig,
    caps: &Capabilities,
) -> Result<FetchOutcome, ServiceWorkerError> {
    if is_passthrough(&request, config) {
        debug!(url = %request.url, method = %request.method, "Passing request through");
        let response = caps.network.fetch(request).await?;
        return Ok(FetchOutcome::Ignored(response));
    }

    debug!(url = %request.url, "Fetching");

    if let Some(response) = caps.caches.match_request(&request).await {
        info!(url = %request.url, "Fetch successful (from cache)");
        return Ok(FetchOutcome::CacheHit(response));
    }

    let url = request.url.clone();
    match caps.network.fetch(request).await {
        Ok(response) => {
            info!(url = %url, status = %response.status, "Fetch successful (from network)");
            Ok(FetchOutcome::NetworkFallback(response))
        }
        Err(e) => {
            info!(url = %url, error = %e, "Fetch failed, serving offline page");
            let offline_url = config.offline_url()?;
            let response = match caps.caches.match_request(&Request::get(offline_url.clone())).await {
                Some(response) => response,
                None => {
                    debug!(offline_url = %offline_url, "Offline page not cached");
                    offline_placeholder(offline_url)
                }
            };
            Ok(FetchOutcome::OfflineFallback(response))
        }
    }
}
