use std::fmt::Write;
use std::time::Duration;

use super::{media_playlist_url, segment_url};
use crate::cache_key::CacheKey;

const HLS_VERSION: u8 = 3;
const BANDWIDTH: u64 = 561_911;
const AVERAGE_BANDWIDTH: u64 = 497_690;
const CODECS: &str = "avc1.64001e,mp4a.40.2";

/// Master manifest with a single variant. URIs are left unsigned.
pub fn render_master_manifest(key: &CacheKey) -> String {
    let mut m3u8 = String::new();

    let _ = writeln!(m3u8, "#EXTM3U");
    let _ = writeln!(m3u8, "#EXT-X-VERSION:{}", HLS_VERSION);
    let _ = writeln!(
        m3u8,
        "#EXT-X-STREAM-INF:BANDWIDTH={},AVERAGE-BANDWIDTH={},CODECS=\"{}\"",
        BANDWIDTH, AVERAGE_BANDWIDTH, CODECS
    );
    let _ = writeln!(m3u8, "{}", media_playlist_url(key));

    m3u8
}

/// VOD media playlist listing every planned segment. URIs are left unsigned.
pub fn render_media_playlist(key: &CacheKey, target: Duration, segments: &[Duration]) -> String {
    let mut m3u8 = String::new();

    let _ = writeln!(m3u8, "#EXTM3U");
    let _ = writeln!(m3u8, "#EXT-X-VERSION:{}", HLS_VERSION);
    let _ = writeln!(m3u8, "#EXT-X-TARGETDURATION:{}", target_duration_secs(target));
    let _ = writeln!(m3u8, "#EXT-X-MEDIA-SEQUENCE:0");
    let _ = writeln!(m3u8, "#EXT-X-PLAYLIST-TYPE:VOD");

    for (index, duration) in segments.iter().enumerate() {
        let _ = writeln!(m3u8, "#EXTINF:{:.3},", duration.as_secs_f64());
        let _ = writeln!(m3u8, "{}", segment_url(key, index as u64));
    }

    let _ = writeln!(m3u8, "#EXT-X-ENDLIST");

    m3u8
}

fn target_duration_secs(target: Duration) -> u64 {
    let millis = target.as_millis() as u64;

    (millis + 999) / 1000
}
