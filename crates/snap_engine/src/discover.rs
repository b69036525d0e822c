use std::future::Future;
use std::ops::Range;
use std::time::Duration;

use snap_core::{DeltaScan, DiscoveryStatus, ItemId, PassOutcome};
use snap_logging::{snap_error, snap_info, snap_warn, Logger};

use crate::processor::jitter;
use crate::render::{PageRenderer, RenderError};
use crate::source::SourceAdapter;

#[derive(Debug, Clone)]
pub struct DiscoverySettings {
    pub page_timeout: Duration,
    /// Pause after each `render_more`, drawn from this range.
    pub scroll_wait: Range<Duration>,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            page_timeout: Duration::from_secs(10),
            scroll_wait: Duration::from_millis(1500)..Duration::from_millis(3000),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredSet {
    /// Oldest first.
    pub ids: Vec<ItemId>,
    pub status: DiscoveryStatus,
    pub passes: usize,
}

impl DiscoveredSet {
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Delta crawl over a source listing.
pub struct ItemDiscoverer {
    settings: DiscoverySettings,
    log: Logger,
}

impl ItemDiscoverer {
    pub fn new(settings: DiscoverySettings, log: Logger) -> Self {
        Self { settings, log }
    }

    /// Collects ids newer than `checkpoint`, oldest first.
    ///
    /// Never fails: a listing that cannot be rendered, at the first pass or
    /// any later one, yields an empty set with
    /// [`DiscoveryStatus::Unavailable`]. Ids seen before a breakdown are
    /// dropped, since the older ones between them and the checkpoint were
    /// never reached.
    pub async fn discover(
        &self,
        adapter: &dyn SourceAdapter,
        renderer: &mut dyn PageRenderer,
        checkpoint: Option<&ItemId>,
        max_passes: usize,
    ) -> DiscoveredSet {
        let source = adapter.source();
        snap_info!(
            self.log,
            "discovering {} items newer than {}",
            source,
            checkpoint.map_or_else(|| "<none>".to_string(), ItemId::to_string)
        );

        let mut scan = DeltaScan::new(checkpoint.cloned());
        let status = self.scan(adapter, renderer, &mut scan, max_passes).await;
        renderer.close().await;

        let passes = scan.passes();
        let ids = match &status {
            DiscoveryStatus::Unavailable { reason } => {
                snap_error!(
                    self.log,
                    "{} listing unavailable, dropping {} partially collected id(s): {}",
                    source,
                    scan.len(),
                    reason
                );
                Vec::new()
            }
            _ => scan.into_oldest_first(),
        };
        snap_info!(
            self.log,
            "{} discovery finished after {} pass(es): {} new item(s), {:?}",
            source,
            passes,
            ids.len(),
            status
        );
        DiscoveredSet {
            ids,
            status,
            passes,
        }
    }

    async fn scan(
        &self,
        adapter: &dyn SourceAdapter,
        renderer: &mut dyn PageRenderer,
        scan: &mut DeltaScan,
        max_passes: usize,
    ) -> DiscoveryStatus {
        if let Err(err) = self.bounded(renderer.open(adapter.listing_url())).await {
            return unavailable(err);
        }

        for pass in 1..=max_passes {
            let links = match self.bounded(renderer.item_links()).await {
                Ok(links) => links,
                Err(err) => return unavailable(err),
            };
            let ids = links
                .iter()
                .filter_map(|href| adapter.item_id_from_href(href));

            if scan.observe_pass(ids) == PassOutcome::BoundaryReached {
                return DiscoveryStatus::BoundaryReached;
            }
            if pass == max_passes {
                break;
            }

            if let Err(err) = self.bounded(renderer.render_more()).await {
                snap_warn!(
                    self.log,
                    "rendering stopped after pass {} with {} id(s) collected",
                    pass,
                    scan.len()
                );
                return unavailable(err);
            }
            tokio::time::sleep(jitter(&self.settings.scroll_wait)).await;
        }

        DiscoveryStatus::PassesExhausted
    }

    async fn bounded<T, F>(&self, step: F) -> Result<T, RenderError>
    where
        F: Future<Output = Result<T, RenderError>>,
    {
        tokio::time::timeout(self.settings.page_timeout, step)
            .await
            .unwrap_or(Err(RenderError::Timeout(self.settings.page_timeout)))
    }
}

fn unavailable(err: RenderError) -> DiscoveryStatus {
    DiscoveryStatus::Unavailable {
        reason: err.to_string(),
    }
}
