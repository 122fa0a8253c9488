use log::LevelFilter;
use log4rs::Handle;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::Path;
use std::sync::OnceLock;

use crate::errors::{BookstoreError, Result};

const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";
const ROLL_SIZE_BYTES: u64 = 10 * 1024 * 1024;
const RETAINED_FILES: u32 = 7;

static HANDLE: OnceLock<Handle> = OnceLock::new();

/// error|warn|info|debug|trace; anything else is `info`.
#[must_use]
pub fn parse_level(level: Option<&str>) -> LevelFilter {
    match level.unwrap_or("info").to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

fn build_config(level: LevelFilter, dir: Option<&Path>) -> Result<Config> {
    // stdout carries the report; logs go to stderr
    let console = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build();
    let mut builder =
        Config::builder().appender(Appender::builder().build("console", Box::new(console)));
    let mut root = Root::builder().appender("console");

    if let Some(dir) = dir {
        std::fs::create_dir_all(dir)?;
        let roller = FixedWindowRoller::builder()
            .build(&format!("{}", dir.join("bookstore.{}.log").display()), RETAINED_FILES)
            .map_err(|e| BookstoreError::Config(format!("log roller: {e}")))?;
        let policy =
            CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE_BYTES)), Box::new(roller));
        let file = RollingFileAppender::builder()
            .encoder(Box::new(PatternEncoder::new(PATTERN)))
            .build(dir.join("bookstore.log"), Box::new(policy))?;
        builder = builder.appender(Appender::builder().build("file", Box::new(file)));
        root = root.appender("file");
    }

    builder.build(root.build(level)).map_err(|e| BookstoreError::Config(e.to_string()))
}

/// Configures logging for the process. Calling it again replaces the active config.
///
/// # Errors
/// Returns an error if the log directory cannot be created or log4rs rejects the config.
pub fn configure_logging(level: Option<&str>, dir: Option<&Path>) -> Result<()> {
    let config = build_config(parse_level(level), dir)?;
    if let Some(handle) = HANDLE.get() {
        handle.set_config(config);
        return Ok(());
    }
    let handle =
        log4rs::init_config(config).map_err(|e| BookstoreError::Config(e.to_string()))?;
    let _ = HANDLE.set(handle);
    Ok(())
}
