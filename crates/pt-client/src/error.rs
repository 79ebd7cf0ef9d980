use thiserror::Error;

pub type Result<T> = std::result::Result<T, PersistError>;

/// Failure talking to the remote tour store or depth service.
///
/// These never reach the editor: [`crate::PersistenceClient`] logs them and
/// hands back a safe default instead.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{endpoint} returned status {status}")]
    Status { endpoint: String, status: u16 },

    #[error("{what} not found")]
    NotFound { what: String },

    #[error("backend unavailable: {reason}")]
    Unavailable { reason: String },
}

impl PersistError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }
}
