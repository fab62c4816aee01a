use log::{debug, info};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::cache_key::CacheKey;
use crate::engine::TranscodingEngine;
use crate::error::{Error, Result};
use crate::playlist::whole_millis;
use crate::single_flight::SingleFlight;
use crate::workspace::WorkspaceStore;

/// Serves segments from the workspace, encoding the ones that are missing.
pub struct SegmentResolver {
    store: WorkspaceStore,
    engine: Arc<dyn TranscodingEngine>,
    segment_target: Duration,
    flights: SingleFlight<(CacheKey, u64), PathBuf>,
}

impl SegmentResolver {
    pub fn new(
        store: WorkspaceStore,
        engine: Arc<dyn TranscodingEngine>,
        segment_target: Duration,
    ) -> Self {
        SegmentResolver {
            store,
            engine,
            segment_target: whole_millis(segment_target),
            flights: SingleFlight::new(),
        }
    }

    /// Path of the encoded segment `index` of `key`. Concurrent misses for the
    /// same segment share a single encode.
    pub async fn resolve(&self, key: &CacheKey, index: u64) -> Result<PathBuf> {
        if self.store.segment_exists(key, index).await? {
            debug!("Segment {}/{} served from cache", key, index);
            return Ok(self.store.segment_path(key, index));
        }

        let work = encode_segment(
            self.store.clone(),
            Arc::clone(&self.engine),
            self.segment_target,
            key.clone(),
            index,
        );

        self.flights.run((key.clone(), index), work).await
    }
}

async fn encode_segment(
    store: WorkspaceStore,
    engine: Arc<dyn TranscodingEngine>,
    segment_target: Duration,
    key: CacheKey,
    index: u64,
) -> Result<PathBuf> {
    let path = store.segment_path(&key, index);
    if store.segment_exists(&key, index).await? {
        return Ok(path);
    }

    let locator = store.read_source(&key).await?;
    let offset = segment_offset(segment_target, index)
        .ok_or_else(|| Error::BadRequest(format!("Segment index {} out of range", index)))?;

    store.prepare(&key).await?;
    let scratch = store.segment_scratch_path(&key, index).await?;

    debug!(
        "Encoding segment {}/{} (start: {:?}, duration: {:?})",
        key, index, offset, segment_target
    );

    let encode_error = |message: String| Error::Encode {
        locator: locator.clone(),
        index,
        message,
    };

    engine
        .encode(&locator, offset, segment_target, &scratch)
        .await
        .map_err(|e| encode_error(e.to_string()))?;

    let encoded = tokio::fs::metadata(&scratch)
        .await
        .map_err(|e| Error::storage(scratch.to_path_buf(), e))?;
    if encoded.len() == 0 {
        return Err(encode_error("engine produced no output".to_string()));
    }

    scratch
        .persist(&path)
        .map_err(|e| Error::storage(path.clone(), e.error))?;

    info!("Encoded segment {}/{} ({} bytes)", key, index, encoded.len());
    Ok(path)
}

fn segment_offset(segment_target: Duration, index: u64) -> Option<Duration> {
    let millis = (segment_target.as_millis() as u64).checked_mul(index)?;

    Some(Duration::from_millis(millis))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::MockEngine;
    use tempfile::TempDir;

    const SRC: &str = "https://example.com/v.mp4";

    struct Fixture {
        _tmp: TempDir,
        store: WorkspaceStore,
        engine: Arc<MockEngine>,
        resolver: Arc<SegmentResolver>,
        key: CacheKey,
    }

    async fn fixture(engine: MockEngine) -> Fixture {
        fixture_with_target(engine, Duration::from_secs(4)).await
    }

    async fn fixture_with_target(engine: MockEngine, segment_target: Duration) -> Fixture {
        let tmp = TempDir::new().unwrap();
        let store = WorkspaceStore::new(tmp.path());
        let engine = Arc::new(engine);
        let key = CacheKey::derive(SRC);
        store.create(&key, SRC).await.unwrap();

        let resolver = Arc::new(SegmentResolver::new(
            store.clone(),
            Arc::clone(&engine) as Arc<dyn TranscodingEngine>,
            segment_target,
        ));

        Fixture {
            _tmp: tmp,
            store,
            engine,
            resolver,
            key,
        }
    }

    fn segment_dir_entries(f: &Fixture) -> Vec<String> {
        let dir = f.store.segment_path(&f.key, 0);
        let mut names: Vec<String> = std::fs::read_dir(dir.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_encodes_missing_segment_with_nominal_length() {
        let f = fixture(MockEngine::with_duration(9.5)).await;

        let path = f.resolver.resolve(&f.key, 2).await.unwrap();

        assert_eq!(path, f.store.segment_path(&f.key, 2));
        assert_eq!(
            f.engine.encodes(),
            vec![(
                SRC.to_string(),
                Duration::from_secs(8),
                Duration::from_secs(4)
            )]
        );
        assert_eq!(
            std::fs::read(&path).unwrap(),
            MockEngine::segment_bytes(Duration::from_secs(8))
        );
        assert_eq!(segment_dir_entries(&f), vec!["2.ts".to_string()]);
    }

    #[tokio::test]
    async fn test_encode_length_matches_planned_segment() {
        let f = fixture_with_target(MockEngine::with_duration(12.0), Duration::from_micros(4_000_500))
            .await;

        f.resolver.resolve(&f.key, 2).await.unwrap();

        assert_eq!(
            f.engine.encodes(),
            vec![(
                SRC.to_string(),
                Duration::from_secs(8),
                Duration::from_secs(4)
            )]
        );
    }

    #[tokio::test]
    async fn test_cache_hit_skips_engine() {
        let f = fixture(MockEngine::with_duration(9.5)).await;

        let first = f.resolver.resolve(&f.key, 0).await.unwrap();
        let bytes = std::fs::read(&first).unwrap();

        for _ in 0..5 {
            let again = f.resolver.resolve(&f.key, 0).await.unwrap();
            assert_eq!(std::fs::read(&again).unwrap(), bytes);
        }

        assert_eq!(f.engine.encode_calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_misses_encode_once() {
        let f = fixture(MockEngine::with_duration(9.5).delayed(Duration::from_millis(50))).await;

        let requests: Vec<_> = (0..16)
            .map(|_| {
                let resolver = Arc::clone(&f.resolver);
                let key = f.key.clone();
                tokio::spawn(async move { resolver.resolve(&key, 1).await })
            })
            .collect();

        for request in requests {
            let path = request.await.unwrap().unwrap();
            assert_eq!(
                std::fs::read(&path).unwrap(),
                MockEngine::segment_bytes(Duration::from_secs(4))
            );
        }

        assert_eq!(f.engine.encode_calls(), 1);
    }

    #[tokio::test]
    async fn test_distinct_segments_encode_independently() {
        let f = fixture(MockEngine::with_duration(9.5).delayed(Duration::from_millis(20))).await;

        let (a, b) = tokio::join!(f.resolver.resolve(&f.key, 0), f.resolver.resolve(&f.key, 1));

        assert_ne!(a.unwrap(), b.unwrap());
        assert_eq!(f.engine.encode_calls(), 2);
    }

    #[tokio::test]
    async fn test_failed_encode_leaves_no_file() {
        let f = fixture(MockEngine::with_duration(9.5).failing_encode("Conversion failed!")).await;

        let err = f.resolver.resolve(&f.key, 1).await.unwrap_err();

        assert!(matches!(err, Error::Encode { index: 1, .. }));
        assert!(!f.store.segment_exists(&f.key, 1).await.unwrap());
        assert!(segment_dir_entries(&f).is_empty());

        f.engine.clear_encode_failure();
        f.resolver.resolve(&f.key, 1).await.unwrap();
        assert_eq!(f.engine.encode_calls(), 2);
    }

    #[tokio::test]
    async fn test_unknown_key_is_not_found() {
        let f = fixture(MockEngine::with_duration(9.5)).await;
        let unknown = CacheKey::derive("https://example.com/other.mp4");

        let err = f.resolver.resolve(&unknown, 0).await.unwrap_err();

        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(f.engine.encode_calls(), 0);
        assert!(!f.store.workspace_dir(&unknown).exists());
    }

    #[tokio::test]
    async fn test_aborted_request_still_fills_cache() {
        let f = fixture(MockEngine::with_duration(9.5).delayed(Duration::from_millis(50))).await;

        let request = {
            let resolver = Arc::clone(&f.resolver);
            let key = f.key.clone();
            tokio::spawn(async move { resolver.resolve(&key, 2).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        request.abort();

        let path = f.resolver.resolve(&f.key, 2).await.unwrap();

        assert!(path.exists());
        assert_eq!(f.engine.encode_calls(), 1);
    }

    #[test]
    fn test_segment_offset() {
        let target = Duration::from_secs(4);

        assert_eq!(segment_offset(target, 0), Some(Duration::ZERO));
        assert_eq!(segment_offset(target, 2), Some(Duration::from_secs(8)));
        assert_eq!(segment_offset(target, u64::MAX), None);
    }
}
