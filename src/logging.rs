use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use simplelog::{Config, LevelFilter, WriteLogger};

use crate::settings::APP_NAME;

const LOG_FILENAME: &str = "folioview.log";

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("cannot create log file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unknown log level `{0}`")]
    Level(String),

    #[error(transparent)]
    Install(#[from] log::SetLoggerError),
}

/// `folioview.log` next to the application data, or in the working
/// directory when no data directory is known.
pub fn default_log_path() -> PathBuf {
    dirs::data_dir()
        .map(|data| data.join(APP_NAME).join(LOG_FILENAME))
        .unwrap_or_else(|| PathBuf::from(LOG_FILENAME))
}

pub fn parse_level(level: &str) -> Result<LevelFilter, LoggingError> {
    LevelFilter::from_str(level).map_err(|_| LoggingError::Level(level.to_string()))
}

/// Route the `log` facade into `path`. Call once, from the binary.
pub fn init_file_logger(level: LevelFilter, path: &Path) -> Result<(), LoggingError> {
    let io_err = |source| LoggingError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
    }
    let file = File::create(path).map_err(io_err)?;
    WriteLogger::init(level, Config::default(), file)?;
    Ok(())
}
