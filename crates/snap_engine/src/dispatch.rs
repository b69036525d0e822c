//! Delivery of processed items to the batch-ingestion API.
//!
//! One batch per run and source: `create_batch`, then one `send_chunk` per
//! chunk, then exactly one `complete_batch`, all issued in that order by a
//! single caller.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use snap_core::Source;
use snap_logging::{snap_info, snap_warn, Logger};
use thiserror::Error;

use crate::ItemPayload;

pub type BatchId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOp {
    Create,
    Send,
    Complete,
}

impl fmt::Display for DispatchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchOp::Create => write!(f, "create batch"),
            DispatchOp::Send => write!(f, "send chunk"),
            DispatchOp::Complete => write!(f, "complete batch"),
        }
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("{op}: request failed: {message}")]
    Transport {
        op: DispatchOp,
        message: String,
        timed_out: bool,
    },
    #[error("{op}: HTTP {status}")]
    Status { op: DispatchOp, status: u16 },
    #[error("{op}: malformed response: {message}")]
    Malformed { op: DispatchOp, message: String },
    #[error("failed to encode chunk: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("dispatcher misconfigured: {0}")]
    Config(String),
}

#[async_trait::async_trait]
pub trait BatchDispatcher: Send + Sync {
    async fn create_batch(&self, source: &Source) -> Result<BatchId, DispatchError>;

    async fn send_chunk(
        &self,
        batch_id: &str,
        items: &[ItemPayload],
        captured_at: &str,
    ) -> Result<(), DispatchError>;

    async fn complete_batch(
        &self,
        batch_id: &str,
        total_count: usize,
        completed_at: &str,
        error_summary: Option<&str>,
    ) -> Result<(), DispatchError>;
}

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub create_timeout: Duration,
    pub send_timeout: Duration,
    pub complete_timeout: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            create_timeout: Duration::from_secs(10),
            send_timeout: Duration::from_secs(30),
            complete_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Serialize)]
struct CreateBody<'a> {
    platform: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RawDataBody<'a> {
    /// The chunk, JSON-encoded into a string.
    raw_data: String,
    crawled_at: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CompleteBody<'a> {
    total_count: usize,
    completed_at: &'a str,
    error_message: Option<&'a str>,
}

/// Talks to `POST /batches`, `/batches/{id}/raw-data` and `/batches/{id}/complete`.
pub struct HttpBatchDispatcher {
    client: reqwest::Client,
    base_url: String,
    settings: DispatchSettings,
    log: Logger,
}

impl HttpBatchDispatcher {
    pub fn new(
        base_url: &str,
        settings: DispatchSettings,
        log: Logger,
    ) -> Result<Self, DispatchError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|err| DispatchError::Config(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            settings,
            log,
        })
    }

    async fn post<B: Serialize + Sync>(
        &self,
        op: DispatchOp,
        path: &str,
        body: &B,
        timeout: Duration,
    ) -> Result<reqwest::Response, DispatchError> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|err| DispatchError::Transport {
                op,
                timed_out: err.is_timeout(),
                message: err.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DispatchError::Status {
                op,
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

#[async_trait::async_trait]
impl BatchDispatcher for HttpBatchDispatcher {
    async fn create_batch(&self, source: &Source) -> Result<BatchId, DispatchError> {
        let op = DispatchOp::Create;
        let body = CreateBody {
            platform: source.as_str(),
        };
        let response = self
            .post(op, "/batches", &body, self.settings.create_timeout)
            .await?;
        let reply: Value = response.json().await.map_err(|err| DispatchError::Malformed {
            op,
            message: err.to_string(),
        })?;

        let batch_id = match reply.pointer("/data/batchId") {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => {
                return Err(DispatchError::Malformed {
                    op,
                    message: format!("no data.batchId in {reply}"),
                })
            }
        };
        snap_info!(self.log, "batch {} opened for {}", batch_id, source);
        Ok(batch_id)
    }

    async fn send_chunk(
        &self,
        batch_id: &str,
        items: &[ItemPayload],
        captured_at: &str,
    ) -> Result<(), DispatchError> {
        let body = RawDataBody {
            raw_data: serde_json::to_string(items)?,
            crawled_at: captured_at,
        };
        self.post(
            DispatchOp::Send,
            &format!("/batches/{batch_id}/raw-data"),
            &body,
            self.settings.send_timeout,
        )
        .await?;
        snap_info!(self.log, "batch {}: sent {} item(s)", batch_id, items.len());
        Ok(())
    }

    async fn complete_batch(
        &self,
        batch_id: &str,
        total_count: usize,
        completed_at: &str,
        error_summary: Option<&str>,
    ) -> Result<(), DispatchError> {
        let body = CompleteBody {
            total_count,
            completed_at,
            error_message: error_summary,
        };
        self.post(
            DispatchOp::Complete,
            &format!("/batches/{batch_id}/complete"),
            &body,
            self.settings.complete_timeout,
        )
        .await?;
        match error_summary {
            Some(summary) => snap_warn!(
                self.log,
                "batch {} closed with errors ({} item(s)): {}",
                batch_id,
                total_count,
                summary
            ),
            None => snap_info!(self.log, "batch {} closed ({} item(s))", batch_id, total_count),
        }
        Ok(())
    }
}

/// Logs the lifecycle instead of delivering. Batch ids are local counters.
pub struct DryRunDispatcher {
    next_id: AtomicU64,
    log: Logger,
}

impl DryRunDispatcher {
    pub fn new(log: Logger) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            log,
        }
    }
}

#[async_trait::async_trait]
impl BatchDispatcher for DryRunDispatcher {
    async fn create_batch(&self, source: &Source) -> Result<BatchId, DispatchError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        snap_info!(self.log, "[dry-run] batch dry-{} opened for {}", id, source);
        Ok(format!("dry-{id}"))
    }

    async fn send_chunk(
        &self,
        batch_id: &str,
        items: &[ItemPayload],
        captured_at: &str,
    ) -> Result<(), DispatchError> {
        let encoded = serde_json::to_string(items)?;
        snap_info!(
            self.log,
            "[dry-run] batch {}: {} item(s), {} bytes, captured {}",
            batch_id,
            items.len(),
            encoded.len(),
            captured_at
        );
        Ok(())
    }

    async fn complete_batch(
        &self,
        batch_id: &str,
        total_count: usize,
        completed_at: &str,
        error_summary: Option<&str>,
    ) -> Result<(), DispatchError> {
        snap_info!(
            self.log,
            "[dry-run] batch {} closed at {}: {} item(s), error: {}",
            batch_id,
            completed_at,
            total_count,
            error_summary.unwrap_or("none")
        );
        Ok(())
    }
}

/// Delivery strategy, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryMode {
    Batch { api_url: String },
    DryRun,
}

impl DeliveryMode {
    /// `mode` is `BATCH` (default) or `DRY_RUN`, case-insensitive.
    pub fn resolve(mode: Option<&str>, api_url: Option<&str>) -> Result<Self, DispatchError> {
        let mode = mode.map(str::trim).filter(|m| !m.is_empty()).unwrap_or("BATCH");
        match mode.to_ascii_uppercase().as_str() {
            "BATCH" => match api_url.map(str::trim).filter(|u| !u.is_empty()) {
                Some(url) => Ok(DeliveryMode::Batch {
                    api_url: url.to_string(),
                }),
                None => Err(DispatchError::Config(
                    "BATCH delivery needs BATCH_API_URL".to_string(),
                )),
            },
            "DRY_RUN" | "DRYRUN" => Ok(DeliveryMode::DryRun),
            other => Err(DispatchError::Config(format!(
                "unsupported delivery mode {other}"
            ))),
        }
    }

    pub fn build(
        &self,
        settings: DispatchSettings,
        log: Logger,
    ) -> Result<Box<dyn BatchDispatcher>, DispatchError> {
        Ok(match self {
            DeliveryMode::Batch { api_url } => {
                Box::new(HttpBatchDispatcher::new(api_url, settings, log)?)
            }
            DeliveryMode::DryRun => Box::new(DryRunDispatcher::new(log)),
        })
    }
}
