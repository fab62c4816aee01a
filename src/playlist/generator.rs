use log::{debug, info};
use std::sync::Arc;
use std::time::Duration;

use super::{plan_segments, render_master_manifest, render_media_playlist, whole_millis};
use crate::cache_key::CacheKey;
use crate::engine::TranscodingEngine;
use crate::error::{Error, Result};
use crate::single_flight::SingleFlight;
use crate::workspace::WorkspaceStore;

/// Creates the playlists of a workspace the first time its source is requested.
pub struct ManifestGenerator {
    store: WorkspaceStore,
    engine: Arc<dyn TranscodingEngine>,
    segment_target: Duration,
    flights: SingleFlight<CacheKey, ()>,
}

impl ManifestGenerator {
    pub fn new(
        store: WorkspaceStore,
        engine: Arc<dyn TranscodingEngine>,
        segment_target: Duration,
    ) -> Self {
        ManifestGenerator {
            store,
            engine,
            segment_target: whole_millis(segment_target),
            flights: SingleFlight::new(),
        }
    }

    /// Returns the cache key of `locator`, generating its workspace if it has
    /// not been published yet.
    pub async fn get_or_create(&self, locator: &str) -> Result<CacheKey> {
        let key = CacheKey::derive(locator);
        self.generate(locator, &key).await?;

        Ok(key)
    }

    /// Probes the source and publishes both playlists. Concurrent calls for the
    /// same key share one probe; calls for a published key do nothing.
    pub async fn generate(&self, locator: &str, key: &CacheKey) -> Result<()> {
        if self.store.exists(key).await? {
            debug!("Workspace {} already published", key);
            return Ok(());
        }

        let work = generate_workspace(
            self.store.clone(),
            Arc::clone(&self.engine),
            self.segment_target,
            locator.to_string(),
            key.clone(),
        );

        self.flights.run(key.clone(), work).await
    }
}

async fn generate_workspace(
    store: WorkspaceStore,
    engine: Arc<dyn TranscodingEngine>,
    segment_target: Duration,
    locator: String,
    key: CacheKey,
) -> Result<()> {
    // a previous flight may have published between our check and registration
    if store.exists(&key).await? {
        return Ok(());
    }

    let duration = engine.probe(&locator).await.map_err(|e| Error::Probe {
        locator: locator.clone(),
        message: e.to_string(),
    })?;

    let segments = plan_segments(duration, segment_target).map_err(|e| Error::Probe {
        locator: locator.clone(),
        message: e.to_string(),
    })?;

    store.prepare(&key).await?;
    store
        .write_master_manifest(&key, render_master_manifest(&key))
        .await?;
    store
        .write_media_playlist(
            &key,
            render_media_playlist(&key, segment_target, &segments),
        )
        .await?;
    store.create(&key, &locator).await?;

    info!(
        "Generated playlists for {} with {} segments ({:.3}s) src={}",
        key,
        segments.len(),
        duration,
        locator
    );

    Ok(())
}
