use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use snap_core::ItemId;
use snap_logging::{snap_debug, snap_warn, Logger};
use thiserror::Error;

use crate::decode::decode_output;
use crate::fetch::HttpTransport;
use crate::source::{MediaSlot, SourceAdapter};
use crate::stager::MediaStager;
use crate::{FetchError, ItemPayload};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessError {
    #[error("item {item_id}: fetch failed: {source}")]
    Fetch { item_id: ItemId, source: FetchError },
    #[error("item {item_id}: {reason}")]
    Parse { item_id: ItemId, reason: String },
}

/// Turns one discovered id into an enriched, staged payload.
#[async_trait::async_trait]
pub trait ItemProcessor: Send + Sync {
    async fn process(&self, item_id: &ItemId) -> Result<ItemPayload, ProcessError>;
}

#[derive(Debug, Clone)]
pub struct ProcessorSettings {
    pub item_timeout: Duration,
    pub related_timeout: Duration,
    /// Random pause before each item fetch, keeps the request rate humane.
    pub request_jitter: Option<Range<Duration>>,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self {
            item_timeout: Duration::from_secs(15),
            related_timeout: Duration::from_secs(10),
            request_jitter: Some(Duration::from_millis(1500)..Duration::from_millis(3500)),
        }
    }
}

pub struct SnapProcessor {
    adapter: Arc<dyn SourceAdapter>,
    transport: Arc<dyn HttpTransport>,
    stager: Arc<MediaStager>,
    settings: ProcessorSettings,
    log: Logger,
}

impl SnapProcessor {
    pub fn new(
        adapter: Arc<dyn SourceAdapter>,
        transport: Arc<dyn HttpTransport>,
        stager: Arc<MediaStager>,
        settings: ProcessorSettings,
        log: Logger,
    ) -> Self {
        Self {
            adapter,
            transport,
            stager,
            settings,
            log,
        }
    }

    /// Related-product lookup. Any failure degrades to an empty list.
    async fn related_products(&self, item_id: &ItemId, payload: &ItemPayload) -> Vec<Value> {
        let ids = self.adapter.related_ids(payload);
        let Some(url) = self.adapter.related_lookup_url(&ids) else {
            return Vec::new();
        };

        let body = match self.transport.get(&url, self.settings.related_timeout).await {
            Ok(output) => decode_output(&output),
            Err(err) => Err(err),
        };
        let parsed = body
            .map_err(|err| err.to_string())
            .and_then(|text| self.adapter.parse_related(&text).map_err(|err| err.to_string()));

        match parsed {
            Ok(related) => related,
            Err(reason) => {
                snap_warn!(
                    self.log,
                    "item {}: related lookup for {} product(s) failed, continuing without: {}",
                    item_id,
                    ids.len(),
                    reason
                );
                Vec::new()
            }
        }
    }

    async fn stage_media(&self, item_id: &ItemId, mut payload: ItemPayload) -> ItemPayload {
        for slot in self.adapter.media_slots(item_id, &payload) {
            let staged = self.stager.stage(&slot.url, &slot.target_key).await;
            if staged.is_none() {
                snap_warn!(self.log, "item {}: media {} left unresolved", item_id, slot.url);
            }
            write_slot(&mut payload, &slot, staged);
        }
        payload
    }
}

/// Writes the staged key (or `null`) next to the reference it replaces.
fn write_slot(payload: &mut ItemPayload, slot: &MediaSlot, staged: Option<String>) {
    let pointer = slot.owner.trim_start_matches('/');
    let (head, rest) = pointer.split_once('/').unwrap_or((pointer, ""));
    let owner = payload.get_mut(head).and_then(|value| {
        if rest.is_empty() {
            Some(value)
        } else {
            value.pointer_mut(&format!("/{rest}"))
        }
    });
    if let Some(owner) = owner.and_then(Value::as_object_mut) {
        owner.insert(
            slot.key_field.clone(),
            staged.map(Value::String).unwrap_or(Value::Null),
        );
    }
}

#[async_trait::async_trait]
impl ItemProcessor for SnapProcessor {
    async fn process(&self, item_id: &ItemId) -> Result<ItemPayload, ProcessError> {
        if let Some(range) = self.settings.request_jitter.as_ref() {
            tokio::time::sleep(jitter(range)).await;
        }

        let url = self.adapter.item_url(item_id);
        let page = self
            .transport
            .get(&url, self.settings.item_timeout)
            .await
            .and_then(|output| decode_output(&output))
            .map_err(|source| ProcessError::Fetch {
                item_id: item_id.clone(),
                source,
            })?;

        let mut payload =
            self.adapter
                .extract_payload(item_id, &page)
                .map_err(|err| ProcessError::Parse {
                    item_id: item_id.clone(),
                    reason: err.to_string(),
                })?;

        let related = self.related_products(item_id, &payload).await;
        snap_debug!(self.log, "item {}: {} related product(s)", item_id, related.len());
        self.adapter.attach_related(&mut payload, related);

        Ok(self.stage_media(item_id, payload).await)
    }
}

pub(crate) fn jitter(range: &Range<Duration>) -> Duration {
    let span = range.end.saturating_sub(range.start).as_millis() as u64;
    if span == 0 {
        return range.start;
    }
    range.start + Duration::from_millis(fastrand::u64(0..span))
}
