mod generator;
mod render;
mod url_rewriter;

use std::fmt;
use std::time::Duration;

use crate::cache_key::CacheKey;

pub use generator::ManifestGenerator;
pub use render::{render_master_manifest, render_media_playlist};
pub use url_rewriter::{PlaylistRewriter, UrlSigningRewriter};

pub const DEFAULT_SEGMENT_TARGET: Duration = Duration::from_secs(4);

pub fn media_playlist_url(key: &CacheKey) -> String {
    format!("/playlist/{}/v0.m3u8", key)
}

pub fn segment_url(key: &CacheKey, index: u64) -> String {
    format!("/segment/{}/v0/{}.ts", key, index)
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlanError {
    InvalidDuration(f64),
    InvalidTarget(Duration),
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PlanError::InvalidDuration(d) => write!(f, "Invalid source duration `{}`", d),
            PlanError::InvalidTarget(t) => write!(f, "Invalid segment target `{:?}`", t),
        }
    }
}

/// Drops the sub-millisecond part of a segment target, the precision every
/// plan and segment offset works with.
pub fn whole_millis(target: Duration) -> Duration {
    Duration::from_millis(target.as_millis() as u64)
}

/// Splits `duration` seconds into segments of `target`, the last one holding
/// the remainder. Planning happens on whole milliseconds so the segment
/// durations add up to the rounded source duration exactly.
pub fn plan_segments(duration: f64, target: Duration) -> Result<Vec<Duration>, PlanError> {
    let target_ms = whole_millis(target).as_millis() as u64;
    if target_ms == 0 {
        return Err(PlanError::InvalidTarget(target));
    }

    if !duration.is_finite() || duration <= 0.0 {
        return Err(PlanError::InvalidDuration(duration));
    }

    let duration_ms = (duration * 1000.0).round() as u64;
    if duration_ms == 0 {
        return Err(PlanError::InvalidDuration(duration));
    }

    let count = (duration_ms + target_ms - 1) / target_ms;
    let last_ms = duration_ms - (count - 1) * target_ms;

    let mut segments = vec![Duration::from_millis(target_ms); count as usize];
    if let Some(last) = segments.last_mut() {
        *last = Duration::from_millis(last_ms);
    }

    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(durations: &[Duration]) -> Vec<f64> {
        durations.iter().map(Duration::as_secs_f64).collect()
    }

    #[test]
    fn test_plan_with_remainder() {
        let plan = plan_segments(9.5, Duration::from_secs(4)).unwrap();

        assert_eq!(secs(&plan), vec![4.0, 4.0, 1.5]);
    }

    #[test]
    fn test_plan_exact_multiple() {
        let plan = plan_segments(8.0, Duration::from_secs(4)).unwrap();

        assert_eq!(secs(&plan), vec![4.0, 4.0]);
    }

    #[test]
    fn test_plan_shorter_than_target() {
        let plan = plan_segments(0.75, Duration::from_secs(4)).unwrap();

        assert_eq!(secs(&plan), vec![0.75]);
    }

    #[test]
    fn test_plan_laws() {
        for (duration, target_ms) in [
            (9.5, 4000),
            (3600.0, 4000),
            (61.016, 6000),
            (10.0001, 2000),
            (123.4567, 10000),
            (0.001, 4000),
        ] {
            let target = Duration::from_millis(target_ms);
            let plan = plan_segments(duration, target).unwrap();

            let duration_ms = (duration * 1000.0).round();
            assert_eq!(plan.len(), (duration_ms / target_ms as f64).ceil() as usize);

            let (last, rest) = plan.split_last().unwrap();
            assert!(rest.iter().all(|d| *d == target));
            assert!(*last > Duration::ZERO && *last <= target);

            let sum: f64 = plan.iter().map(Duration::as_secs_f64).sum();
            assert!((sum - duration).abs() < 0.001, "{} != {}", sum, duration);
        }
    }

    #[test]
    fn test_plan_rejects_invalid_input() {
        let target = Duration::from_secs(4);

        assert_eq!(
            plan_segments(0.0, target),
            Err(PlanError::InvalidDuration(0.0))
        );
        assert!(plan_segments(-1.0, target).is_err());
        assert!(plan_segments(f64::NAN, target).is_err());
        assert!(plan_segments(f64::INFINITY, target).is_err());
        assert!(plan_segments(0.0004, target).is_err());
        assert_eq!(
            plan_segments(9.5, Duration::ZERO),
            Err(PlanError::InvalidTarget(Duration::ZERO))
        );
    }

    #[test]
    fn test_urls() {
        let key = CacheKey::derive("https://example.com/v.mp4");

        assert_eq!(
            media_playlist_url(&key),
            format!("/playlist/{}/v0.m3u8", key)
        );
        assert_eq!(segment_url(&key, 2), format!("/segment/{}/v0/2.ts", key));
    }
}
