use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::engine::{EngineError, TranscodingEngine};

/// Engine double that records its invocations and writes a short fake
/// transport stream for every encode.
pub struct MockEngine {
    duration: Mutex<Result<f64, String>>,
    encode_failure: Mutex<Option<String>>,
    delay: Duration,
    probe_calls: AtomicUsize,
    probed: Mutex<Vec<String>>,
    encodes: Mutex<Vec<(String, Duration, Duration)>>,
}

impl MockEngine {
    pub fn with_duration(duration: f64) -> Self {
        MockEngine {
            duration: Mutex::new(Ok(duration)),
            encode_failure: Mutex::new(None),
            delay: Duration::ZERO,
            probe_calls: AtomicUsize::new(0),
            probed: Mutex::new(vec![]),
            encodes: Mutex::new(vec![]),
        }
    }

    pub fn failing_probe(message: &str) -> Self {
        let engine = Self::with_duration(0.0);
        *engine.duration.lock().unwrap() = Err(message.to_string());
        engine
    }

    pub fn failing_encode(self, message: &str) -> Self {
        *self.encode_failure.lock().unwrap() = Some(message.to_string());
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_duration(&self, duration: f64) {
        *self.duration.lock().unwrap() = Ok(duration);
    }

    pub fn clear_encode_failure(&self) {
        *self.encode_failure.lock().unwrap() = None;
    }

    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    pub fn probed(&self) -> Vec<String> {
        self.probed.lock().unwrap().clone()
    }

    pub fn encode_calls(&self) -> usize {
        self.encodes.lock().unwrap().len()
    }

    pub fn encodes(&self) -> Vec<(String, Duration, Duration)> {
        self.encodes.lock().unwrap().clone()
    }

    pub fn segment_bytes(offset: Duration) -> Vec<u8> {
        format!("G@ fake ts at {:.3}", offset.as_secs_f64()).into_bytes()
    }
}

#[async_trait]
impl TranscodingEngine for MockEngine {
    async fn probe(&self, locator: &str) -> Result<f64, EngineError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        self.probed.lock().unwrap().push(locator.to_string());

        tokio::time::sleep(self.delay).await;

        self.duration.lock().unwrap().clone().map_err(EngineError::new)
    }

    async fn encode(
        &self,
        locator: &str,
        offset: Duration,
        length: Duration,
        output: &Path,
    ) -> Result<(), EngineError> {
        self.encodes
            .lock()
            .unwrap()
            .push((locator.to_string(), offset, length));

        tokio::time::sleep(self.delay).await;

        // a failing engine still leaves half a file behind
        let failure = self.encode_failure.lock().unwrap().clone();
        if let Some(message) = failure {
            std::fs::write(output, b"G@ trunc").map_err(|e| EngineError::new(e.to_string()))?;
            return Err(EngineError::new(message));
        }

        std::fs::write(output, Self::segment_bytes(offset)).map_err(|e| EngineError::new(e.to_string()))
    }
}
