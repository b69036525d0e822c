//! Process-wide logging for the harvester binary.
//!
//! Everything at info and above goes to the terminal and to
//! `<log_dir>/crawler.log`; errors are also collected in `<log_dir>/error.log`.
//! Both files are appended to across runs.

use std::fs::{self, File, OpenOptions};
use std::path::Path;

use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

pub const RUN_LOG: &str = "crawler.log";
pub const ERROR_LOG: &str = "error.log";

pub fn initialize(log_dir: &Path) {
    let level = LevelFilter::Info;
    let config = build_config();

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        config.clone(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];

    if let Err(err) = fs::create_dir_all(log_dir) {
        eprintln!("Warning: Could not create log directory {:?}: {}", log_dir, err);
    } else {
        if let Some(file) = open_log_file(&log_dir.join(RUN_LOG)) {
            loggers.push(WriteLogger::new(level, config.clone(), file));
        }
        if let Some(file) = open_log_file(&log_dir.join(ERROR_LOG)) {
            loggers.push(WriteLogger::new(LevelFilter::Error, config, file));
        }
    }

    let _ = CombinedLogger::init(loggers);
}

fn build_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        .build()
}

fn open_log_file(path: &Path) -> Option<File> {
    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => Some(file),
        Err(err) => {
            eprintln!("Warning: Could not open log file at {:?}: {}", path, err);
            None
        }
    }
}
