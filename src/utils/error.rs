use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("compiler binary is not runnable: {}", .path.display())]
    ToolMissing { path: PathBuf },

    #[error("unknown target model: {0}")]
    UnknownTarget(String),

    #[error("compiler session is shut down")]
    SessionClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
