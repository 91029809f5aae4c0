pub mod chart;
pub mod config;
pub mod log;

use std::path::PathBuf;

pub use chart::{BarSequence, ChartState, Invalidation};
pub use config::Config;
pub use config::timezone::UserTimezone;

const APP_DIR: &str = "openchart";

#[derive(thiserror::Error, Debug, Clone)]
pub enum InternalError {
    #[error("Fetch error: {0}")]
    Fetch(String),
    #[error("Feed error: {0}")]
    Feed(String),
}

impl From<exchange::AdapterError> for InternalError {
    fn from(error: exchange::AdapterError) -> Self {
        match error {
            exchange::AdapterError::WebsocketError(reason) => InternalError::Feed(reason),
            other => InternalError::Fetch(other.to_string()),
        }
    }
}

/// Location of `path_name` inside the application data directory.
///
/// `OPENCHART_DATA_PATH` overrides the platform data directory.
pub fn data_path(path_name: Option<&str>) -> PathBuf {
    let base = match std::env::var("OPENCHART_DATA_PATH") {
        Ok(path) => PathBuf::from(path),
        Err(_) => dirs_next::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR),
    };

    match path_name {
        Some(path_name) => base.join(path_name),
        None => base,
    }
}
