use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use super::SettingsError;

#[derive(Debug)]
pub struct Transcoder {
    pub segment_duration: Duration,
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    pub timeout: Duration,
    pub video_height: u32,
    pub preset: String,
    pub audio_bitrate: String,
}

impl Transcoder {
    pub fn new(sources: Vec<PartialTranscoder>) -> Result<Self, SettingsError> {
        let merged: PartialTranscoder =
            sources
                .into_iter()
                .fold(Default::default(), |acc, x| PartialTranscoder {
                    segment_duration: acc.segment_duration.or(x.segment_duration),
                    ffmpeg: acc.ffmpeg.or(x.ffmpeg),
                    ffprobe: acc.ffprobe.or(x.ffprobe),
                    timeout: acc.timeout.or(x.timeout),
                    video_height: acc.video_height.or(x.video_height),
                    preset: acc.preset.or(x.preset),
                    audio_bitrate: acc.audio_bitrate.or(x.audio_bitrate),
                });

        let segment_duration = required(merged.segment_duration, "transcoder.segment_duration")?;
        if segment_duration.as_millis() == 0 {
            return Err(SettingsError::InvalidValue {
                key: "transcoder.segment_duration".to_string(),
                message: "must be at least 1ms".to_string(),
            });
        }
        if segment_duration.subsec_nanos() % 1_000_000 != 0 {
            return Err(SettingsError::InvalidValue {
                key: "transcoder.segment_duration".to_string(),
                message: "must be a whole number of milliseconds".to_string(),
            });
        }

        let timeout = required(merged.timeout, "transcoder.timeout")?;
        if timeout.is_zero() {
            return Err(SettingsError::InvalidValue {
                key: "transcoder.timeout".to_string(),
                message: "must be positive".to_string(),
            });
        }

        Ok(Transcoder {
            segment_duration,
            ffmpeg: required(merged.ffmpeg, "transcoder.ffmpeg")?,
            ffprobe: required(merged.ffprobe, "transcoder.ffprobe")?,
            timeout,
            video_height: required(merged.video_height, "transcoder.video_height")?,
            preset: required(merged.preset, "transcoder.preset")?,
            audio_bitrate: required(merged.audio_bitrate, "transcoder.audio_bitrate")?,
        })
    }
}

fn required<T>(value: Option<T>, key: &str) -> Result<T, SettingsError> {
    value.ok_or_else(|| SettingsError::MissingValue(key.to_string()))
}

#[derive(Debug, Default, Deserialize)]
pub struct PartialTranscoder {
    #[serde(default)]
    #[serde(with = "humantime_serde")]
    pub segment_duration: Option<Duration>,

    pub ffmpeg: Option<PathBuf>,
    pub ffprobe: Option<PathBuf>,

    #[serde(default)]
    #[serde(with = "humantime_serde")]
    pub timeout: Option<Duration>,

    pub video_height: Option<u32>,
    pub preset: Option<String>,
    pub audio_bitrate: Option<String>,
}
