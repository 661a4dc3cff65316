//! Worker configuration

use std::path::Path;

use offline_net::UrlPattern;
use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

use crate::ServiceWorkerError;

/// Fixed configuration injected into a worker at construction time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Origin and path prefix the worker controls. Manifest paths resolve against it.
    pub scope: Url,

    /// Name of the current cache generation, embedding its version tag.
    pub cache_name: String,

    /// Paths pre-cached at install, in order.
    pub manifest: Vec<String>,

    /// Page served when both cache and network miss.
    pub offline_path: String,

    /// Requests matching this pattern target the worker script and bypass the cache.
    pub script_pattern: UrlPattern,

    /// Title of every notification.
    pub notification_title: String,

    /// Icon of every notification.
    pub notification_icon: String,

    /// Push body used when the payload carries no message.
    pub default_push_message: String,

    /// Background sync tag handled by the worker.
    pub sync_tag: String,

    /// Endpoint POSTed to on sync.
    pub sync_endpoint: String,

    /// Body of the notification shown after sync.
    pub sync_complete_message: String,

    /// `action` value of the control message that triggers skip-waiting.
    pub skip_waiting_action: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            scope: Url::parse("http://localhost:8080/").expect("static scope URL is valid"),
            cache_name: "pwa-v1".to_string(),
            manifest: [
                "/",
                "/index.html",
                "/css/bootstrap.min.css",
                "/css/font-awesome.min.css",
                "/js/bootstrap.bundle.min.js",
                "/img/profile.png",
                "/offline.html",
            ]
            .iter()
            .map(|p| p.to_string())
            .collect(),
            offline_path: "/offline.html".to_string(),
            script_pattern: UrlPattern::contains("service-worker.js"),
            notification_title: "VESIT".to_string(),
            notification_icon: "/img/profile.png".to_string(),
            default_push_message: "Default notification".to_string(),
            sync_tag: "syncMessage".to_string(),
            sync_endpoint: "/sync-endpoint".to_string(),
            sync_complete_message: "Sync successful!".to_string(),
            skip_waiting_action: "skipWaiting".to_string(),
        }
    }
}

impl WorkerConfig {
    /// Parse a JSON configuration. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ServiceWorkerError> {
        serde_json::from_str(json).map_err(|e| ServiceWorkerError::Config(e.to_string()))
    }

    /// Load a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ServiceWorkerError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| ServiceWorkerError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    /// Replace the scope.
    pub fn with_scope(mut self, scope: Url) -> Self {
        self.scope = scope;
        self
    }

    /// Replace the cache generation name.
    pub fn with_cache_name(mut self, name: impl Into<String>) -> Self {
        self.cache_name = name.into();
        self
    }

    /// Replace the manifest.
    pub fn with_manifest<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.manifest = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Check the configuration before a worker is built from it.
    pub fn validate(&self) -> Result<(), ServiceWorkerError> {
        if self.cache_name.trim().is_empty() {
            return Err(ServiceWorkerError::Config(
                "cache_name must not be empty".to_string(),
            ));
        }
        if self.scope.cannot_be_a_base() {
            return Err(ServiceWorkerError::Config(format!(
                "scope {} cannot be a base URL",
                self.scope
            )));
        }
        for path in self.manifest.iter().chain([&self.offline_path, &self.sync_endpoint]) {
            self.resolve(path)?;
        }
        if !self.manifest.contains(&self.offline_path) {
            warn!(
                offline_path = %self.offline_path,
                "Offline page is not pre-cached; offline fallback will be synthesized"
            );
        }
        Ok(())
    }

    /// Resolve a path against the scope.
    pub fn resolve(&self, path: &str) -> Result<Url, ServiceWorkerError> {
        Ok(self.scope.join(path)?)
    }

    /// Absolute URLs of the manifest, in order.
    pub fn manifest_urls(&self) -> Result<Vec<Url>, ServiceWorkerError> {
        self.manifest.iter().map(|p| self.resolve(p)).collect()
    }

    /// Absolute URL of the offline page.
    pub fn offline_url(&self) -> Result<Url, ServiceWorkerError> {
        self.resolve(&self.offline_path)
    }
}
