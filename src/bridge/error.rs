use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("transform {parent} <- {child} unavailable: {reason}")]
    TransformUnavailable {
        parent: String,
        child: String,
        reason: String,
    },

    #[error("failed to publish on {topic}: {reason}")]
    Publish { topic: String, reason: String },

    #[error("malformed engine message {line:?}: {reason}")]
    Message { line: String, reason: String },

    #[error("{0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
