use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::cache_key::CacheKey;
use crate::engine::TranscodingEngine;
use crate::error::{Error, Result};
use crate::playlist::{ManifestGenerator, PlaylistRewriter};
use crate::segment::SegmentResolver;
use crate::signing::UrlSigner;
use crate::workspace::WorkspaceStore;

/// Everything a request handler needs: the workspace store, the generator and
/// resolver built on it, and the signer that guards and decorates URLs.
pub struct HlsService {
    store: WorkspaceStore,
    generator: ManifestGenerator,
    resolver: SegmentResolver,
    signer: Arc<dyn UrlSigner>,
    rewriter: Arc<dyn PlaylistRewriter>,
}

impl HlsService {
    pub fn new(
        store: WorkspaceStore,
        engine: Arc<dyn TranscodingEngine>,
        segment_target: Duration,
        signer: Arc<dyn UrlSigner>,
        rewriter: Arc<dyn PlaylistRewriter>,
    ) -> Self {
        HlsService {
            generator: ManifestGenerator::new(store.clone(), Arc::clone(&engine), segment_target),
            resolver: SegmentResolver::new(store.clone(), engine, segment_target),
            store,
            signer,
            rewriter,
        }
    }

    pub fn store(&self) -> &WorkspaceStore {
        &self.store
    }

    pub fn signer(&self) -> Arc<dyn UrlSigner> {
        Arc::clone(&self.signer)
    }

    /// Master manifest for `locator` with signed URIs, creating the workspace
    /// on first request.
    pub async fn master_manifest(&self, locator: &str) -> Result<String> {
        let key = self.generator.get_or_create(locator).await?;
        let path = self.store.master_manifest_path(&key);

        self.render(path).await
    }

    /// Media playlist of an existing workspace with signed URIs.
    pub async fn media_playlist(&self, key: &CacheKey) -> Result<String> {
        if !self.store.exists(key).await? {
            return Err(Error::NotFound("Playlist not found".to_string()));
        }

        self.render(self.store.media_playlist_path(key)).await
    }

    pub async fn segment(&self, key: &CacheKey, index: u64) -> Result<PathBuf> {
        self.resolver.resolve(key, index).await
    }

    async fn render(&self, path: PathBuf) -> Result<String> {
        let playlist = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| Error::storage(path, e))?;

        Ok(self.rewriter.rewrite_playlist(&playlist))
    }
}
