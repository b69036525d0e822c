use std::sync::Arc;
use std::time::Duration;

use snap_logging::{snap_debug, snap_error, snap_warn, Logger};

use crate::filename::absolute_url;
use crate::fetch::HttpTransport;
use crate::object_store::ObjectStore;
use crate::{FailureKind, FetchError, FetchOutput};

const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

#[derive(Debug, Clone)]
pub struct StagerSettings {
    /// Attempts with the primary transport before falling back.
    pub max_attempts: usize,
    /// Fixed pause between primary attempts.
    pub retry_backoff: Duration,
    pub download_timeout: Duration,
}

impl Default for StagerSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_backoff: Duration::from_secs(2),
            download_timeout: Duration::from_secs(10),
        }
    }
}

/// Copies remote media into the object store under deterministic keys.
///
/// Staging never fails its caller: every permanent failure is logged and
/// reported as `None`, leaving the reference unresolved.
pub struct MediaStager {
    primary: Arc<dyn HttpTransport>,
    fallback: Option<Arc<dyn HttpTransport>>,
    store: Arc<dyn ObjectStore>,
    settings: StagerSettings,
    log: Logger,
}

impl MediaStager {
    pub fn new(
        primary: Arc<dyn HttpTransport>,
        store: Arc<dyn ObjectStore>,
        settings: StagerSettings,
        log: Logger,
    ) -> Self {
        Self {
            primary,
            fallback: None,
            store,
            settings,
            log,
        }
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn HttpTransport>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Returns `target_key` once an object is stored there, `None` otherwise.
    pub async fn stage(&self, remote_url: &str, target_key: &str) -> Option<String> {
        if remote_url.trim().is_empty() {
            return None;
        }
        let url = absolute_url(remote_url);

        match self.store.exists(target_key).await {
            Ok(true) => {
                snap_debug!(self.log, "{} already staged, skipping download", target_key);
                return Some(target_key.to_string());
            }
            Ok(false) => {}
            Err(err) => {
                snap_warn!(self.log, "existence check for {} failed: {}", target_key, err);
            }
        }

        let output = match self.download(&url).await {
            Ok(output) => output,
            Err(err) => {
                snap_error!(self.log, "giving up on {} ({}): {}", url, target_key, err);
                return None;
            }
        };

        let content_type = output
            .metadata
            .content_type
            .clone()
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
        match self.store.put(target_key, output.bytes, &content_type).await {
            Ok(()) => Some(target_key.to_string()),
            Err(err) => {
                snap_error!(self.log, "failed to store {}: {}", target_key, err);
                None
            }
        }
    }

    async fn download(&self, url: &str) -> Result<FetchOutput, FetchError> {
        let attempts = self.settings.max_attempts.max(1);
        let mut last_err = None;

        for attempt in 1..=attempts {
            match self.primary.get(url, self.settings.download_timeout).await {
                Ok(output) => return Ok(output),
                Err(err) => {
                    snap_warn!(
                        self.log,
                        "download attempt {}/{} for {} failed: {}",
                        attempt,
                        attempts,
                        url,
                        err
                    );
                    let transient = err.is_transient();
                    last_err = Some(err);
                    if !transient {
                        break;
                    }
                    if attempt < attempts {
                        tokio::time::sleep(self.settings.retry_backoff).await;
                    }
                }
            }
        }

        if let Some(fallback) = self.fallback.as_ref() {
            snap_warn!(self.log, "retrying {} with fallback transport", url);
            return fallback.get(url, self.settings.download_timeout).await;
        }

        Err(last_err.unwrap_or_else(|| {
            FetchError::new(FailureKind::Network, "no download attempt made")
        }))
    }
}
