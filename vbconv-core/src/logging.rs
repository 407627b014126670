//! Logging setup for vbconv.
//!
//! Installs a log4rs configuration with two appenders: the console (stderr)
//! and a size-rotated log file. The file rotates at 5 MiB and keeps one
//! backup (`vbconv.log` and `vbconv.1.log`).

use std::fs;
use std::path::{Path, PathBuf};

use log::LevelFilter;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::append::rolling_file::policy::compound::roll::fixed_window::FixedWindowRoller;
use log4rs::append::rolling_file::policy::compound::trigger::size::SizeTrigger;
use log4rs::append::rolling_file::policy::compound::CompoundPolicy;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use log4rs::filter::threshold::ThresholdFilter;

use crate::error::{CoreError, CoreResult};

/// Name of the active log file inside the log directory.
pub const LOG_FILE_NAME: &str = "vbconv.log";

/// Size at which the log file is rotated.
pub const LOG_ROTATE_BYTES: u64 = 5 * 1024 * 1024;

/// Number of rotated files kept next to the active one.
pub const LOG_BACKUP_COUNT: u32 = 1;

const FILE_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S)} [{l}] [{M}:{L}] - {m}{n}";
const CONSOLE_PATTERN: &str = "{h({l})} {m}{n}";

/// Builds the log4rs configuration without installing it.
pub fn build_config(
    log_dir: &Path,
    console_level: LevelFilter,
    file_level: LevelFilter,
) -> CoreResult<(Config, PathBuf)> {
    fs::create_dir_all(log_dir)?;
    let log_file = log_dir.join(LOG_FILE_NAME);
    let archive_pattern = log_dir.join("vbconv.{}.log");

    let roller = FixedWindowRoller::builder()
        .build(&archive_pattern.to_string_lossy(), LOG_BACKUP_COUNT)
        .map_err(|e| CoreError::Config(format!("Invalid log roller: {e}")))?;
    let policy = CompoundPolicy::new(
        Box::new(SizeTrigger::new(LOG_ROTATE_BYTES)),
        Box::new(roller),
    );

    let file_appender = RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(FILE_PATTERN)))
        .build(&log_file, Box::new(policy))?;

    let console_appender = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(CONSOLE_PATTERN)))
        .build();

    let config = Config::builder()
        .appender(
            Appender::builder()
                .filter(Box::new(ThresholdFilter::new(console_level)))
                .build("console", Box::new(console_appender)),
        )
        .appender(
            Appender::builder()
                .filter(Box::new(ThresholdFilter::new(file_level)))
                .build("file", Box::new(file_appender)),
        )
        .build(
            Root::builder()
                .appender("console")
                .appender("file")
                .build(console_level.max(file_level)),
        )
        .map_err(|e| CoreError::Config(format!("Invalid logging configuration: {e}")))?;

    Ok((config, log_file))
}

/// Installs console and rotating file logging. Returns the log file path.
///
/// # Errors
///
/// Fails if the log directory cannot be created or a logger is already installed.
pub fn setup_logging(
    log_dir: &Path,
    console_level: LevelFilter,
    file_level: LevelFilter,
) -> CoreResult<PathBuf> {
    let (config, log_file) = build_config(log_dir, console_level, file_level)?;
    log4rs::init_config(config)
        .map_err(|e| CoreError::Config(format!("Failed to initialize logging: {e}")))?;
    Ok(log_file)
}
