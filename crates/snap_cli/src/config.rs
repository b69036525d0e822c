//! Environment and command-line configuration.
//!
//! Every setting has a default; the environment (optionally seeded from a
//! `.env` file) overrides defaults and command-line flags override both.

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use clap::Args;
use snap_engine::sources::{adapter_for, KNOWN_SOURCES};
use snap_engine::{DeliveryMode, DispatchError, HarvestSettings, RunMode};
use thiserror::Error;

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Discovery pass budget for this run
    #[arg(long)]
    pub max_passes: Option<usize>,

    /// Number of items processed in parallel
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Log the delivery calls instead of sending them
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name}={value:?} is invalid: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
    #[error("unknown source {0:?} (known: {known})", known = KNOWN_SOURCES.join(", "))]
    UnknownSource(String),
    #[error(transparent)]
    Delivery(#[from] DispatchError),
}

#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub harvest: HarvestSettings,
    pub state_file: PathBuf,
    pub media_dir: PathBuf,
    pub log_dir: PathBuf,
    pub sources: Vec<String>,
    pub delivery: DeliveryMode,
}

impl HarvestConfig {
    /// Builds the configuration from `lookup` (normally the process
    /// environment) and the flags of the chosen subcommand.
    pub fn load<F>(lookup: F, mode: RunMode, args: &RunArgs) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut harvest = HarvestSettings::default();
        if let Some(value) = positive(&lookup, "HARVEST_CONCURRENCY")? {
            harvest.concurrency = value;
        }
        if let Some(value) = positive(&lookup, "HARVEST_MAX_PASSES")? {
            harvest.incremental_max_passes = value;
        }
        if let Some(value) = positive(&lookup, "HARVEST_INITIAL_MAX_PASSES")? {
            harvest.initial_max_passes = value;
        }
        if let Some(value) = positive(&lookup, "HARVEST_CHUNK_SIZE")? {
            harvest.chunk_size = value;
        }
        if let Some(value) = positive(&lookup, "HARVEST_UPLOAD_MAX_RETRIES")? {
            harvest.stager.max_attempts = value;
        }
        if let Some(millis) = parsed::<u64>(&lookup, "HARVEST_UPLOAD_BACKOFF_MS")? {
            harvest.stager.retry_backoff = Duration::from_millis(millis);
        }

        if let Some(concurrency) = args.concurrency {
            harvest.concurrency = concurrency.max(1);
        }
        if let Some(passes) = args.max_passes {
            match mode {
                RunMode::Incremental => harvest.incremental_max_passes = passes.max(1),
                RunMode::InitialLoad => harvest.initial_max_passes = passes.max(1),
            }
        }

        let delivery = if args.dry_run {
            DeliveryMode::DryRun
        } else {
            DeliveryMode::resolve(
                lookup("DELIVERY_MODE").as_deref(),
                lookup("BATCH_API_URL").as_deref(),
            )?
        };

        Ok(Self {
            harvest,
            state_file: path_or(&lookup, "HARVEST_STATE_FILE", "data/crawler_state.json"),
            media_dir: path_or(&lookup, "HARVEST_MEDIA_DIR", "data/media"),
            log_dir: path_or(&lookup, "HARVEST_LOG_DIR", "logs"),
            sources: source_names(lookup("HARVEST_SOURCES").as_deref())?,
            delivery,
        })
    }
}

fn parsed<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    let Some(raw) = lookup(name).filter(|v| !v.trim().is_empty()) else {
        return Ok(None);
    };
    raw.trim()
        .parse()
        .map(Some)
        .map_err(|err: T::Err| ConfigError::Invalid {
            name,
            value: raw.clone(),
            reason: err.to_string(),
        })
}

fn positive(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<usize>, ConfigError> {
    match parsed::<usize>(lookup, name)? {
        Some(0) => Err(ConfigError::Invalid {
            name,
            value: "0".to_string(),
            reason: "must be at least 1".to_string(),
        }),
        other => Ok(other),
    }
}

fn path_or(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: &str) -> PathBuf {
    lookup(name)
        .filter(|v| !v.trim().is_empty())
        .map_or_else(|| PathBuf::from(default), |v| PathBuf::from(v.trim()))
}

fn source_names(raw: Option<&str>) -> Result<Vec<String>, ConfigError> {
    let raw = raw.filter(|v| !v.trim().is_empty()).unwrap_or("MUSINSA");
    let mut names: Vec<String> = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        if adapter_for(name).is_none() {
            return Err(ConfigError::UnknownSource(name.to_string()));
        }
        let name = name.to_ascii_uppercase();
        if !names.contains(&name) {
            names.push(name);
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    fn batch_env(extra: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let mut pairs = vec![("BATCH_API_URL", "http://ingest.local/api")];
        pairs.extend_from_slice(extra);
        env(&pairs)
    }

    #[test]
    fn defaults_apply_when_environment_is_empty() {
        let config =
            HarvestConfig::load(batch_env(&[]), RunMode::Incremental, &RunArgs::default()).unwrap();

        assert_eq!(config.harvest.concurrency, 5);
        assert_eq!(config.harvest.incremental_max_passes, 5);
        assert_eq!(config.harvest.initial_max_passes, 40);
        assert_eq!(config.harvest.chunk_size, 20);
        assert_eq!(config.harvest.stager.max_attempts, 3);
        assert_eq!(config.harvest.stager.retry_backoff, Duration::from_secs(2));
        assert_eq!(config.state_file, PathBuf::from("data/crawler_state.json"));
        assert_eq!(config.sources, vec!["MUSINSA".to_string()]);
        assert_eq!(
            config.delivery,
            DeliveryMode::Batch {
                api_url: "http://ingest.local/api".to_string()
            }
        );
    }

    #[test]
    fn environment_overrides_defaults() {
        let lookup = batch_env(&[
            ("HARVEST_CONCURRENCY", "8"),
            ("HARVEST_MAX_PASSES", "3"),
            ("HARVEST_INITIAL_MAX_PASSES", " 60 "),
            ("HARVEST_CHUNK_SIZE", "50"),
            ("HARVEST_UPLOAD_MAX_RETRIES", "5"),
            ("HARVEST_UPLOAD_BACKOFF_MS", "250"),
            ("HARVEST_STATE_FILE", "/var/lib/snaps/state.json"),
            ("HARVEST_SOURCES", "musinsa, MUSINSA"),
        ]);
        let config = HarvestConfig::load(lookup, RunMode::Incremental, &RunArgs::default()).unwrap();

        assert_eq!(config.harvest.concurrency, 8);
        assert_eq!(config.harvest.incremental_max_passes, 3);
        assert_eq!(config.harvest.initial_max_passes, 60);
        assert_eq!(config.harvest.chunk_size, 50);
        assert_eq!(config.harvest.stager.max_attempts, 5);
        assert_eq!(config.harvest.stager.retry_backoff, Duration::from_millis(250));
        assert_eq!(config.state_file, PathBuf::from("/var/lib/snaps/state.json"));
        assert_eq!(config.sources, vec!["MUSINSA".to_string()]);
    }

    #[test]
    fn flags_override_environment_for_the_chosen_mode() {
        let args = RunArgs {
            max_passes: Some(12),
            concurrency: Some(2),
            dry_run: true,
        };
        let config =
            HarvestConfig::load(env(&[("HARVEST_CONCURRENCY", "8")]), RunMode::InitialLoad, &args)
                .unwrap();

        assert_eq!(config.harvest.concurrency, 2);
        assert_eq!(config.harvest.initial_max_passes, 12);
        assert_eq!(config.harvest.incremental_max_passes, 5);
        assert_eq!(config.delivery, DeliveryMode::DryRun);
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let err = HarvestConfig::load(
            batch_env(&[("HARVEST_CHUNK_SIZE", "twenty")]),
            RunMode::Incremental,
            &RunArgs::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "HARVEST_CHUNK_SIZE", .. }));

        let err = HarvestConfig::load(
            batch_env(&[("HARVEST_CONCURRENCY", "0")]),
            RunMode::Incremental,
            &RunArgs::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "HARVEST_CONCURRENCY", .. }));
    }

    #[test]
    fn unknown_source_and_delivery_are_rejected() {
        let err = HarvestConfig::load(
            batch_env(&[("HARVEST_SOURCES", "MUSINSA,ZIGZAG")]),
            RunMode::Incremental,
            &RunArgs::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownSource(ref name) if name == "ZIGZAG"));

        let err = HarvestConfig::load(env(&[]), RunMode::Incremental, &RunArgs::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::Delivery(_)));

        let config = HarvestConfig::load(
            env(&[("DELIVERY_MODE", "DRY_RUN")]),
            RunMode::Incremental,
            &RunArgs::default(),
        )
        .unwrap();
        assert_eq!(config.delivery, DeliveryMode::DryRun);
    }
}
