use std::time::Duration;

use crate::discover::DiscoverySettings;
use crate::dispatch::DispatchSettings;
use crate::processor::ProcessorSettings;
use crate::render::ListingSettings;
use crate::stager::StagerSettings;

/// How a run treats the stored checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Stop discovery at the stored checkpoint.
    #[default]
    Incremental,
    /// Ignore the stored checkpoint and crawl as deep as the pass budget
    /// allows, pacing chunk delivery.
    InitialLoad,
}

#[derive(Debug, Clone)]
pub struct HarvestSettings {
    pub concurrency: usize,
    pub incremental_max_passes: usize,
    pub initial_max_passes: usize,
    pub chunk_size: usize,
    /// Pause between chunk sends during an initial load.
    pub initial_chunk_pause: Duration,
    pub discovery: DiscoverySettings,
    pub listing: ListingSettings,
    pub processor: ProcessorSettings,
    pub stager: StagerSettings,
    pub dispatch: DispatchSettings,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            concurrency: 5,
            incremental_max_passes: 5,
            initial_max_passes: 40,
            chunk_size: 20,
            initial_chunk_pause: Duration::from_millis(500),
            discovery: DiscoverySettings::default(),
            listing: ListingSettings::default(),
            processor: ProcessorSettings::default(),
            stager: StagerSettings::default(),
            dispatch: DispatchSettings::default(),
        }
    }
}

impl HarvestSettings {
    pub fn max_passes(&self, mode: RunMode) -> usize {
        match mode {
            RunMode::Incremental => self.incremental_max_passes,
            RunMode::InitialLoad => self.initial_max_passes,
        }
    }

    pub fn chunk_pause(&self, mode: RunMode) -> Duration {
        match mode {
            RunMode::Incremental => Duration::ZERO,
            RunMode::InitialLoad => self.initial_chunk_pause,
        }
    }

    /// Drops every pacing delay. Meant for tests against local servers.
    pub fn without_pacing(mut self) -> Self {
        self.initial_chunk_pause = Duration::ZERO;
        self.discovery.scroll_wait = Duration::ZERO..Duration::ZERO;
        self.processor.request_jitter = None;
        self.stager.retry_backoff = Duration::ZERO;
        self
    }
}
