use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Request error! URL: {url} Status Code: {status}")] Http {
        url: String,
        status: u16,
    },

    #[error("Network error: {0}")] Network(String),

    #[error("Parse error: {0}")] Parse(String),

    #[error("Configuration error: {0}")] Config(String),

    #[error("Database error: {0}")] Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")] Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")] Io(#[from] std::io::Error),

    #[error("Dispatcher stopped before the request completed")] DispatcherClosed,

    #[error("Background task failed: {0}")] Task(String),
}

impl MetadataError {
    /// Provider-side failures: the collection stays eligible for a later refresh
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            MetadataError::Http { .. } | MetadataError::Network(_) | MetadataError::DispatcherClosed
        )
    }
}

impl From<reqwest::Error> for MetadataError {
    fn from(err: reqwest::Error) -> Self {
        MetadataError::Network(err.to_string())
    }
}

impl From<tokio::task::JoinError> for MetadataError {
    fn from(err: tokio::task::JoinError) -> Self {
        MetadataError::Task(err.to_string())
    }
}

pub type MetadataResult<T> = std::result::Result<T, MetadataError>;
