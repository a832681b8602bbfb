//! Process-wide log setup.
//!
//! [`LogContext::init`] installs the `tracing` subscriber once; repeated calls
//! hand back the same context and never stack extra layers. The context is a
//! plain value that callers pass to the components that log per ticker.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use serde::{Deserialize, Serialize};
use tracing::Span;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::error::DumpError;

/// Directory created under `log_dir` for the log files.
pub const LOG_SUBDIR: &str = "Logs";
pub const DEBUG_LOG: &str = "debug.log";
pub const ERRORS_LOG: &str = "errors.log";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// DEBUG on stdout instead of INFO. `RUST_LOG` overrides both.
    pub verbose: bool,
    /// Also write `Logs/debug.log` and `Logs/errors.log` under this directory.
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFiles {
    pub debug: PathBuf,
    pub errors: PathBuf,
}

#[derive(Debug, Clone)]
pub struct LogContext {
    config: LogConfig,
    files: Option<LogFiles>,
    /// False when another subscriber was already installed by the host process.
    installed: bool,
}

static CONTEXT: OnceLock<LogContext> = OnceLock::new();

impl LogContext {
    /// Install the global subscriber on first call.
    pub fn init(config: &LogConfig) -> Result<&'static LogContext, DumpError> {
        if let Some(ctx) = CONTEXT.get() {
            if ctx.config != *config {
                tracing::debug!("logging already initialised; new settings ignored");
            }
            return Ok(ctx);
        }
        let ctx = install(config)?;
        Ok(CONTEXT.get_or_init(|| ctx))
    }

    /// A context that installs nothing, for embedding in hosts that own logging.
    pub fn detached() -> LogContext {
        LogContext {
            config: LogConfig::default(),
            files: None,
            installed: false,
        }
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    pub fn files(&self) -> Option<&LogFiles> {
        self.files.as_ref()
    }

    pub fn is_installed(&self) -> bool {
        self.installed
    }

    /// Span wrapping all work done for one ticker.
    pub fn ticker_span(&self, ticker: &str) -> Span {
        tracing::info_span!("ticker", %ticker)
    }
}

fn install(config: &LogConfig) -> Result<LogContext, DumpError> {
    let default_level = if config.verbose { "debug" } else { "info" };
    let stdout_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let stdout = fmt::layer().with_target(false).with_filter(stdout_filter);

    let (files, debug_layer, errors_layer) = match &config.log_dir {
        Some(dir) => {
            let (paths, debug_file, errors_file) = open_log_files(dir)?;
            let debug_layer = fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(debug_file))
                .with_filter(LevelFilter::DEBUG);
            let errors_layer = fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(errors_file))
                .with_filter(LevelFilter::WARN);
            (Some(paths), Some(debug_layer), Some(errors_layer))
        }
        None => (None, None, None),
    };

    let installed = tracing_subscriber::registry()
        .with(stdout)
        .with(debug_layer)
        .with(errors_layer)
        .try_init()
        .is_ok();

    Ok(LogContext {
        config: config.clone(),
        files,
        installed,
    })
}

fn open_log_files(log_dir: &Path) -> Result<(LogFiles, File, File), DumpError> {
    let dir = log_dir.join(LOG_SUBDIR);
    fs::create_dir_all(&dir).map_err(|e| DumpError::io(&dir, e))?;

    let paths = LogFiles {
        debug: dir.join(DEBUG_LOG),
        errors: dir.join(ERRORS_LOG),
    };
    let open = |path: &Path| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| DumpError::io(path, e))
    };
    let debug = open(&paths.debug)?;
    let errors = open(&paths.errors)?;
    Ok((paths, debug, errors))
}
