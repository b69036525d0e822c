use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use snap_core::{Completion, DispatchOutcome, RunReport};
use snap_engine::sources::adapter_for;
use snap_engine::{
    BatchDispatcher, CheckpointStore, FetchSettings, FsObjectStore, Harvester, HttpListingRenderer,
    HttpTransport, ItemProcessor, MediaStager, ObjectStore, ReqwestTransport, RunMode,
    SnapProcessor,
};
use snap_logging::{snap_error, snap_info, snap_warn, Logger};

use crate::config::{HarvestConfig, RunArgs};
use crate::logging;

pub async fn run(mode: RunMode, args: &RunArgs) -> Result<ExitCode> {
    let env_file = env_file_warning(dotenvy::dotenv());
    let config = match HarvestConfig::load(|name| std::env::var(name).ok(), mode, args) {
        Ok(config) => config,
        Err(err) => {
            if let Some(warning) = env_file.as_deref() {
                eprintln!("Warning: {warning}");
            }
            return Err(err).context("Failed to load harvester configuration");
        }
    };

    logging::initialize(&config.log_dir);
    let log = Logger::new("harvester");
    if let Some(warning) = env_file {
        snap_warn!(log, "{}", warning);
    }
    snap_info!(
        log,
        "{:?} run for {} via {:?}",
        mode,
        config.sources.join(", "),
        config.delivery
    );

    let mut store = CheckpointStore::open(&config.state_file, log.child("checkpoint"))
        .with_context(|| format!("Failed to open checkpoint file {:?}", config.state_file))?;

    let dispatcher: Arc<dyn BatchDispatcher> = Arc::from(
        config
            .delivery
            .build(config.harvest.dispatch.clone(), log.child("dispatch"))
            .context("Failed to set up batch delivery")?,
    );
    let harvester = Harvester::new(dispatcher, config.harvest.clone(), log.clone());

    let transport: Arc<dyn HttpTransport> = Arc::new(
        ReqwestTransport::new(FetchSettings::browser_like())
            .context("Failed to build HTTP client")?,
    );
    let fallback: Arc<dyn HttpTransport> = Arc::new(
        ReqwestTransport::new(FetchSettings::default())
            .context("Failed to build fallback HTTP client")?,
    );
    let objects: Arc<dyn ObjectStore> = Arc::new(FsObjectStore::new(&config.media_dir));

    let mut failed = false;
    for name in &config.sources {
        let adapter = adapter_for(name).with_context(|| format!("Unknown source {name}"))?;
        let source_log = log.child(adapter.source().as_str());

        let stager = Arc::new(
            MediaStager::new(
                transport.clone(),
                objects.clone(),
                config.harvest.stager.clone(),
                source_log.child("stager"),
            )
            .with_fallback(fallback.clone()),
        );
        let processor: Arc<dyn ItemProcessor> = Arc::new(SnapProcessor::new(
            adapter.clone(),
            transport.clone(),
            stager,
            config.harvest.processor.clone(),
            source_log.child("processor"),
        ));
        let mut renderer = HttpListingRenderer::new(
            transport.clone(),
            adapter.item_link_selector(),
            config.harvest.listing.clone(),
        )
        .with_context(|| format!("Failed to set up the {name} listing renderer"))?;

        let report = harvester
            .run_source(&mut store, adapter.as_ref(), &mut renderer, processor, mode)
            .await;
        log_report(&source_log, &report);
        failed |= report.is_failure();
    }

    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// A missing `.env` file is normal; anything else about it is worth a warning.
fn env_file_warning<T>(loaded: Result<T, dotenvy::Error>) -> Option<String> {
    match loaded {
        Ok(_) => None,
        Err(err) if err.not_found() => None,
        Err(err) => Some(format!("ignoring unusable .env file: {err}")),
    }
}

fn log_report(log: &Logger, report: &RunReport) {
    let line = format!(
        "discovered {}, processed {} ok / {} failed, delivery {}, checkpoint {} -> {}",
        report.discovered,
        report.processed,
        report.failed,
        report.dispatch.as_ref().map_or("skipped".to_string(), describe),
        report
            .checkpoint_before
            .as_ref()
            .map_or("<none>".to_string(), ToString::to_string),
        report
            .checkpoint_after
            .as_ref()
            .map_or("<none>".to_string(), ToString::to_string),
    );
    if report.is_failure() {
        snap_error!(log, "run failed: {}", line);
    } else if report.failed > 0 {
        snap_warn!(log, "run finished with item failures: {}", line);
    } else {
        snap_info!(log, "run finished: {}", line);
    }
}

fn describe(outcome: &DispatchOutcome) -> String {
    let closed = |completion: &Completion| match completion {
        Completion::Acknowledged => "closed".to_string(),
        Completion::Failed { reason } => format!("not closed ({reason})"),
    };
    match outcome {
        DispatchOutcome::Delivered {
            batch_id,
            items,
            chunks,
            completion,
        } => format!(
            "batch {batch_id}: {items} item(s) in {chunks} chunk(s), {}",
            closed(completion)
        ),
        DispatchOutcome::CreateFailed { reason } => format!("no batch opened ({reason})"),
        DispatchOutcome::SendFailed {
            batch_id,
            chunks_sent,
            chunks_total,
            reason,
            completion,
        } => format!(
            "batch {batch_id}: {chunks_sent}/{chunks_total} chunk(s) sent before {reason}, {}",
            closed(completion)
        ),
    }
}
