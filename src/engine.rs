mod ffmpeg;

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use thiserror::Error as ThisError;

pub use ffmpeg::{FfmpegEngine, FfmpegOptions};

/// Failure reported by the transcoding engine.
#[derive(Debug, Clone, ThisError)]
#[error("{message}")]
pub struct EngineError {
    pub message: String,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        EngineError {
            message: message.into(),
        }
    }
}

/// External media tool that the cache drives as a black box.
#[async_trait]
pub trait TranscodingEngine: Send + Sync {
    /// Duration of the source in seconds.
    async fn probe(&self, locator: &str) -> Result<f64, EngineError>;

    /// Encodes `length` of the source starting at `offset` as an MPEG transport
    /// stream into `output`, overwriting whatever is there. The engine may
    /// produce less than `length` when the source ends earlier.
    async fn encode(
        &self,
        locator: &str,
        offset: Duration,
        length: Duration,
        output: &Path,
    ) -> Result<(), EngineError>;
}
