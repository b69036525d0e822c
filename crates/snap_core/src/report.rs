use crate::{ItemId, RunPhase, Source};

/// How a discovery pass ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryStatus {
    /// The checkpoint item was found; everything newer was collected.
    BoundaryReached,
    /// Pass budget used up without meeting a boundary. Always the case on a
    /// first run, where there is no boundary.
    PassesExhausted,
    /// The listing never became ready, or rendering broke down mid-way.
    /// Nothing is kept: ids seen before a breakdown would skip the older
    /// ones that were never reached.
    Unavailable { reason: String },
}

/// Whether `completeBatch` was acknowledged by the remote side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Acknowledged,
    Failed { reason: String },
}

impl Completion {
    pub fn is_acknowledged(&self) -> bool {
        matches!(self, Completion::Acknowledged)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Every chunk was delivered. The batch may still have failed to close.
    Delivered {
        batch_id: String,
        items: usize,
        chunks: usize,
        completion: Completion,
    },
    /// No batch was opened; nothing was sent.
    CreateFailed { reason: String },
    /// A chunk failed; remaining chunks were not sent.
    SendFailed {
        batch_id: String,
        chunks_sent: usize,
        chunks_total: usize,
        reason: String,
        completion: Completion,
    },
}

impl DispatchOutcome {
    /// Every item reached the remote side in some reportable form.
    pub fn is_delivered(&self) -> bool {
        matches!(self, DispatchOutcome::Delivered { .. })
    }

    pub fn is_failure(&self) -> bool {
        match self {
            DispatchOutcome::Delivered { completion, .. } => !completion.is_acknowledged(),
            DispatchOutcome::CreateFailed { .. } | DispatchOutcome::SendFailed { .. } => true,
        }
    }
}

/// Summary of one orchestration cycle for one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub source: Source,
    pub phase: RunPhase,
    pub checkpoint_before: Option<ItemId>,
    pub checkpoint_after: Option<ItemId>,
    pub discovery: Option<DiscoveryStatus>,
    pub discovered: usize,
    pub processed: usize,
    pub failed: usize,
    pub dispatch: Option<DispatchOutcome>,
    /// Set when the checkpoint could not be persisted.
    pub checkpoint_error: Option<String>,
}

impl RunReport {
    pub fn new(source: Source) -> Self {
        Self {
            source,
            phase: RunPhase::default(),
            checkpoint_before: None,
            checkpoint_after: None,
            discovery: None,
            discovered: 0,
            processed: 0,
            failed: 0,
            dispatch: None,
            checkpoint_error: None,
        }
    }

    /// Failures at or above the dispatch boundary. The invoking process
    /// should exit non-zero when this is true.
    pub fn is_failure(&self) -> bool {
        self.checkpoint_error.is_some()
            || self
                .dispatch
                .as_ref()
                .is_some_and(DispatchOutcome::is_failure)
    }

    pub fn checkpoint_advanced(&self) -> bool {
        self.checkpoint_after.is_some() && self.checkpoint_after != self.checkpoint_before
    }
}
