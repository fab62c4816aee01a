use hls_on_demand::{
    engine::{FfmpegEngine, FfmpegOptions, TranscodingEngine},
    http::create_routes,
    playlist::UrlSigningRewriter,
    service::HlsService,
    settings::{Settings, Signing},
    signing::{HmacUrlSigner, UnsignedUrls, UrlSigner},
    workspace::WorkspaceStore,
};

use anyhow::Context;
use log::{info, warn};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("LOG_LEVEL", "info"))
        .init();

    let settings = Settings::load().context("Failed to load config")?;

    let (signer, sign_manifest) = match settings.signing {
        Signing::Hmac {
            key,
            require_manifest_signature,
        } => {
            let signer: Arc<dyn UrlSigner> = Arc::new(HmacUrlSigner::new(key));
            (signer, require_manifest_signature)
        }
        Signing::Disabled => {
            warn!("URL signing is disabled, playlists and segments are served to anyone");
            let signer: Arc<dyn UrlSigner> = Arc::new(UnsignedUrls);
            (signer, false)
        }
    };

    tokio::fs::create_dir_all(&settings.storage.base_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to create storage directory {}",
                settings.storage.base_dir.display()
            )
        })?;

    let engine: Arc<dyn TranscodingEngine> =
        Arc::new(FfmpegEngine::new(FfmpegOptions::from(&settings.transcoder)));

    let service = HlsService::new(
        WorkspaceStore::new(settings.storage.base_dir.clone()),
        engine,
        settings.transcoder.segment_duration,
        Arc::clone(&signer),
        Arc::new(UrlSigningRewriter::new(signer)),
    );

    let routes = create_routes(Arc::new(service), sign_manifest);

    let (addr, server) = warp::serve(routes)
        .try_bind_ephemeral(settings.http.socket)
        .with_context(|| format!("Failed to bind {}", settings.http.socket))?;

    info!(
        "Listening on {}, storing workspaces in {}",
        addr,
        settings.storage.base_dir.display()
    );

    server.await;
    Ok(())
}
