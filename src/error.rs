use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error as ThisError;
use warp::http::StatusCode;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures of the segment cache.
///
/// The type is `Clone` so a single in-flight result can be shared with every
/// waiter; I/O sources are held behind an `Arc` for that reason.
#[derive(Debug, Clone, ThisError)]
pub enum Error {
    #[error("{0}")]
    BadRequest(String),

    #[error("url signature verification failed")]
    Unauthorized,

    #[error("{0}")]
    NotFound(String),

    #[error("failed to probe `{locator}`: {message}")]
    Probe { locator: String, message: String },

    #[error("failed to encode segment {index} of `{locator}`: {message}")]
    Encode {
        locator: String,
        index: u64,
        message: String,
    },

    #[error("storage failure at `{}`: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: Arc<io::Error>,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn storage(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Storage {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Probe { .. } | Error::Encode { .. } | Error::Storage { .. } | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message that is safe to hand to a client.
    pub fn public_message(&self) -> String {
        match self {
            Error::BadRequest(_) | Error::Unauthorized | Error::NotFound(_) => self.to_string(),
            Error::Probe { .. } => "Failed to generate manifest".to_string(),
            Error::Encode { .. } => "Failed to get segment".to_string(),
            Error::Storage { .. } | Error::Internal(_) => "Internal server error".to_string(),
        }
    }
}
