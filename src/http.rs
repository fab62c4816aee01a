mod auth;
mod problem;

use regex::Regex;
use serde::Deserialize;
use std::sync::{Arc, LazyLock};
use warp::http::header::{HeaderValue, CONTENT_TYPE};
use warp::http::{Method, Response};
use warp::filters::path::Peek;
use warp::{filters::BoxedFilter, Filter, Rejection, Reply};

use self::problem::from_error;
use crate::cache_key::CacheKey;
use crate::error::Error;
use crate::service::HlsService;
use crate::signing::{UnsignedUrls, UrlSigner};

pub use self::problem::handle_rejection;

pub type WebResult<T> = std::result::Result<T, Rejection>;

const PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";
const SEGMENT_CONTENT_TYPE: &str = "video/mp2t";

static SEGMENT_FILE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\.ts$").expect("valid segment file pattern"));

/// Builds the service routes. With `sign_manifest` set, `/manifest.m3u8`
/// demands a signature like the playlist and segment routes do.
pub fn create_routes(service: Arc<HlsService>, sign_manifest: bool) -> BoxedFilter<(impl Reply,)> {
    let signer = service.signer();
    let manifest_signer: Arc<dyn UrlSigner> = if sign_manifest {
        Arc::clone(&signer)
    } else {
        Arc::new(UnsignedUrls)
    };
    let segment_root = service.store().base_dir().to_path_buf();
    let service = warp::any().map(move || Arc::clone(&service));

    let healthz = warp::path!("healthz").map(|| "🧩");

    let get_manifest = warp::path!("manifest.m3u8")
        .and(auth::verify_signature(manifest_signer))
        .and(warp::query::<ManifestQuery>())
        .and(service.clone())
        .and_then(get_manifest);

    let get_playlist = warp::path!("playlist" / String / "v0.m3u8")
        .and(auth::verify_signature(Arc::clone(&signer)))
        .and(service.clone())
        .and_then(get_playlist);

    // the segment URL tail mirrors the workspace layout below the base dir
    let get_segment = warp::path("segment")
        .and(auth::verify_signature(signer))
        .and(warp::path::peek())
        .and(service)
        .and_then(resolve_segment)
        .untuple_one()
        .and(warp::fs::dir(segment_root))
        .map(|file: warp::fs::File| {
            warp::reply::with_header(file, "content-type", SEGMENT_CONTENT_TYPE)
        });

    warp::get()
        .and(healthz.or(get_manifest).or(get_playlist).or(get_segment))
        .recover(handle_rejection)
        .with(cors())
        .with(warp::log("hls_on_demand::http"))
        .boxed()
}

fn cors() -> warp::cors::Builder {
    warp::cors()
        .allow_any_origin()
        .allow_methods(vec![Method::GET, Method::OPTIONS])
        .allow_header("content-type")
}

#[derive(Debug, Deserialize)]
struct ManifestQuery {
    src: Option<String>,
}

async fn get_manifest(query: ManifestQuery, service: Arc<HlsService>) -> WebResult<Response<String>> {
    let src = query
        .src
        .filter(|src| !src.is_empty())
        .ok_or_else(|| from_error(Error::BadRequest("Missing src parameter".to_string())))?;

    let manifest = service.master_manifest(&src).await.map_err(from_error)?;

    Ok(with_content_type(manifest, PLAYLIST_CONTENT_TYPE))
}

async fn get_playlist(key: String, service: Arc<HlsService>) -> WebResult<Response<String>> {
    let key = key.parse::<CacheKey>().map_err(from_error)?;
    let playlist = service.media_playlist(&key).await.map_err(from_error)?;

    Ok(with_content_type(playlist, PLAYLIST_CONTENT_TYPE))
}

/// Makes sure the requested segment is on disk. The file itself is served by
/// `warp::fs`, which handles range and conditional requests.
async fn resolve_segment(tail: Peek, service: Arc<HlsService>) -> WebResult<()> {
    let segments: Vec<&str> = tail.segments().collect();
    let (key, file) = match segments.as_slice() {
        [key, "v0", file] => (*key, *file),
        _ => return Err(warp::reject::not_found()),
    };

    let key = key.parse::<CacheKey>().map_err(from_error)?;
    let index = parse_segment_file(file).map_err(from_error)?;

    service.segment(&key, index).await.map_err(from_error)?;

    Ok(())
}

fn parse_segment_file(file: &str) -> Result<u64, Error> {
    SEGMENT_FILE_PATTERN
        .captures(file)
        .and_then(|captures| captures[1].parse::<u64>().ok())
        .ok_or_else(|| Error::BadRequest(format!("Invalid segment path `{}`", file)))
}

fn with_content_type<T>(body: T, content_type: &'static str) -> Response<T> {
    let mut response = Response::new(body);
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));

    response
}
