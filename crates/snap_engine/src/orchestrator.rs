//! One harvesting cycle per source.
//!
//! `LOAD_CHECKPOINT → DISCOVER → PROCESS → AGGREGATE → DISPATCH →
//! ADVANCE_CHECKPOINT → DONE`, driven through [`snap_core::transition`].
//! Nothing here returns an error: every outcome ends up in the
//! [`RunReport`], and the caller decides the exit status from it.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use snap_core::{
    transition, ChunkPlan, Completion, DispatchOutcome, ItemId, PhaseEvent, RunPhase, RunReport,
    Source,
};
use snap_logging::{snap_error, snap_info, snap_warn, Logger};

use crate::checkpoint::{CheckpointStore, CheckpointUpdate};
use crate::config::{HarvestSettings, RunMode};
use crate::discover::ItemDiscoverer;
use crate::dispatch::BatchDispatcher;
use crate::pool::WorkerPool;
use crate::processor::ItemProcessor;
use crate::render::PageRenderer;
use crate::source::SourceAdapter;
use crate::ItemPayload;

/// Timestamp source for `crawledAt` / `completedAt`.
pub type Clock = Arc<dyn Fn() -> String + Send + Sync>;

pub fn utc_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub struct Harvester {
    dispatcher: Arc<dyn BatchDispatcher>,
    settings: HarvestSettings,
    clock: Clock,
    log: Logger,
}

impl Harvester {
    pub fn new(dispatcher: Arc<dyn BatchDispatcher>, settings: HarvestSettings, log: Logger) -> Self {
        Self {
            dispatcher,
            settings,
            clock: Arc::new(utc_now),
            log,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn settings(&self) -> &HarvestSettings {
        &self.settings
    }

    pub async fn run_source(
        &self,
        store: &mut CheckpointStore,
        adapter: &dyn SourceAdapter,
        renderer: &mut dyn PageRenderer,
        processor: Arc<dyn ItemProcessor>,
        mode: RunMode,
    ) -> RunReport {
        let source = adapter.source().clone();
        let log = self.log.child(source.as_str());
        let mut report = RunReport::new(source.clone());

        // Every chunk of this run's batch carries the run's start time.
        let crawled_at = (self.clock)();
        let checkpoint = store.get(&source);
        report.checkpoint_before = checkpoint.clone();
        report.checkpoint_after = checkpoint.clone();
        advance(&mut report, PhaseEvent::CheckpointLoaded);
        snap_info!(log, "starting {:?} run", mode);

        let boundary = match mode {
            RunMode::Incremental => checkpoint.as_ref(),
            RunMode::InitialLoad => None,
        };
        let discoverer = ItemDiscoverer::new(self.settings.discovery.clone(), log.child("discover"));
        let discovered = discoverer
            .discover(adapter, renderer, boundary, self.settings.max_passes(mode))
            .await;
        report.discovered = discovered.ids.len();
        report.discovery = Some(discovered.status.clone());
        advance(
            &mut report,
            PhaseEvent::Discovered {
                count: discovered.ids.len(),
            },
        );
        if report.phase == RunPhase::Done {
            snap_info!(log, "nothing new to harvest");
            return report;
        }

        let pool = WorkerPool::new(self.settings.concurrency, log.child("pool"));
        let outcome = pool.run(processor, discovered.ids).await;
        advance(
            &mut report,
            if outcome.aborted {
                PhaseEvent::ProcessingAborted
            } else {
                PhaseEvent::ProcessingFinished
            },
        );

        let tally = outcome.tally;
        report.processed = tally.success_count();
        report.failed = tally.failure_count();
        let candidate = tally.checkpoint_candidate();
        let processing_summary = tally.error_summary();
        advance(
            &mut report,
            PhaseEvent::Aggregated {
                successes: tally.success_count(),
            },
        );
        if report.phase == RunPhase::Done {
            snap_warn!(
                log,
                "no item processed successfully ({} failed), nothing to deliver",
                report.failed
            );
            return report;
        }

        let payloads = tally.into_payloads();
        let dispatched = self
            .dispatch(&source, &payloads, &crawled_at, processing_summary, mode, &log)
            .await;
        let delivered = dispatched.is_delivered();
        report.dispatch = Some(dispatched);
        if !delivered {
            advance(&mut report, PhaseEvent::DispatchFailed);
            snap_error!(
                log,
                "delivery incomplete, checkpoint stays at {}",
                checkpoint.as_ref().map_or("<none>".to_string(), ItemId::to_string)
            );
            advance(&mut report, PhaseEvent::ErrorReported);
            return report;
        }
        advance(&mut report, PhaseEvent::DispatchSucceeded);

        if let Some(candidate) = candidate {
            self.advance_checkpoint(store, &source, candidate, &mut report, &log);
        }
        report
    }

    fn advance_checkpoint(
        &self,
        store: &mut CheckpointStore,
        source: &Source,
        candidate: ItemId,
        report: &mut RunReport,
        log: &Logger,
    ) {
        match store.set(source, candidate.clone()) {
            Ok(CheckpointUpdate::Advanced { .. }) => {
                report.checkpoint_after = Some(candidate);
                advance(report, PhaseEvent::CheckpointAdvanced);
            }
            Ok(CheckpointUpdate::Unchanged { current }) => {
                report.checkpoint_after = Some(current);
                advance(report, PhaseEvent::CheckpointAdvanced);
            }
            Err(err) => {
                snap_error!(log, "failed to save checkpoint {}: {}", candidate, err);
                report.checkpoint_error = Some(err.to_string());
                advance(report, PhaseEvent::CheckpointFailed);
                advance(report, PhaseEvent::ErrorReported);
            }
        }
    }

    /// create, then every chunk in order, then exactly one complete for an
    /// opened batch. A failed chunk abandons the rest.
    async fn dispatch(
        &self,
        source: &Source,
        payloads: &[ItemPayload],
        crawled_at: &str,
        processing_summary: Option<String>,
        mode: RunMode,
        log: &Logger,
    ) -> DispatchOutcome {
        let batch_id = match self.dispatcher.create_batch(source).await {
            Ok(batch_id) => batch_id,
            Err(err) => {
                snap_error!(log, "could not open a batch: {}", err);
                return DispatchOutcome::CreateFailed {
                    reason: err.to_string(),
                };
            }
        };

        let plan = ChunkPlan::new(payloads.len(), self.settings.chunk_size);
        let chunks_total = plan.chunk_count();
        let pause = self.settings.chunk_pause(mode);
        let mut chunks_sent = 0;
        let mut send_failure = None;

        for (index, range) in plan.ranges().enumerate() {
            if index > 0 && !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }
            match self
                .dispatcher
                .send_chunk(&batch_id, &payloads[range], crawled_at)
                .await
            {
                Ok(()) => chunks_sent += 1,
                Err(err) => {
                    snap_error!(
                        log,
                        "batch {}: chunk {}/{} failed, abandoning the rest: {}",
                        batch_id,
                        index + 1,
                        chunks_total,
                        err
                    );
                    send_failure = Some(format!("chunk {}/{}: {}", index + 1, chunks_total, err));
                    break;
                }
            }
        }

        let error_summary = match (&send_failure, processing_summary) {
            (Some(send), Some(processing)) => Some(format!("{send}; {processing}")),
            (Some(send), None) => Some(send.clone()),
            (None, processing) => processing,
        };
        let completed_at = (self.clock)();
        let completion = match self
            .dispatcher
            .complete_batch(
                &batch_id,
                payloads.len(),
                &completed_at,
                error_summary.as_deref(),
            )
            .await
        {
            Ok(()) => Completion::Acknowledged,
            Err(err) => {
                snap_error!(log, "batch {} could not be closed: {}", batch_id, err);
                Completion::Failed {
                    reason: err.to_string(),
                }
            }
        };

        match send_failure {
            None => {
                snap_info!(
                    log,
                    "delivered {} item(s) in {} chunk(s) to batch {}",
                    payloads.len(),
                    chunks_total,
                    batch_id
                );
                DispatchOutcome::Delivered {
                    batch_id,
                    items: payloads.len(),
                    chunks: chunks_total,
                    completion,
                }
            }
            Some(reason) => DispatchOutcome::SendFailed {
                batch_id,
                chunks_sent,
                chunks_total,
                reason,
                completion,
            },
        }
    }
}

fn advance(report: &mut RunReport, event: PhaseEvent) {
    report.phase = transition(report.phase, event);
}
