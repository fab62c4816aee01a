mod error;
mod http;
mod signing;
mod storage;
mod transcoder;

pub use error::*;
pub use http::*;
pub use signing::*;
pub use storage::*;
pub use transcoder::*;

use std::env;
use std::fs::File;
use std::io::{BufReader, Read};
use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::result::Result;
use std::time::Duration;

use log::info;
use serde::Deserialize;

use crate::engine::FfmpegOptions;

const DEFAULT_HTTP_PORT: u16 = 8080;
const DEFAULT_SEGMENT_DURATION_SECS: u64 = 4;
const DEFAULT_TRANSCODER_TIMEOUT_SECS: u64 = 5 * 60;
const DEFAULT_VIDEO_HEIGHT: u32 = 720;
const DEFAULT_PRESET: &str = "ultrafast";
const DEFAULT_AUDIO_BITRATE: &str = "128k";
const FALLBACK_CONFIG_PATH: &str = "config.yml";

#[derive(Debug)]
pub struct Settings {
    pub http: Http,
    pub storage: Storage,
    pub signing: Signing,
    pub transcoder: Transcoder,
}

impl Settings {
    /// Environment first, then the YAML file named by `APP_CONFIG`
    /// (or `config.yml` when present), then built-in defaults.
    pub fn load() -> Result<Self, SettingsError> {
        let env_settings = PartialSettings::from_lookup(|name| env::var(name).ok());

        let file_settings = match env::var("APP_CONFIG") {
            Ok(path) => PartialSettings::from_file(&path)?,
            Err(e) => {
                info!(
                    "Missing or invalid APP_CONFIG env var, fallback to {}; {:?}",
                    FALLBACK_CONFIG_PATH, e
                );

                if Path::new(FALLBACK_CONFIG_PATH).exists() {
                    PartialSettings::from_file(FALLBACK_CONFIG_PATH)?
                } else {
                    PartialSettings::empty()
                }
            }
        };

        Settings::merge(vec![env_settings, file_settings, Default::default()])
    }

    pub fn from_file(file_path: &str) -> Result<Self, SettingsError> {
        let file_settings = PartialSettings::from_file(file_path)?;

        Settings::merge(vec![file_settings, Default::default()])
    }

    pub fn from_reader<T: Read>(reader: T) -> Result<Self, SettingsError> {
        let file_settings = PartialSettings::from_reader(reader)?;

        Settings::merge(vec![file_settings, Default::default()])
    }

    /// Earlier sources take precedence over later ones.
    pub fn merge(mut sources: Vec<PartialSettings>) -> Result<Self, SettingsError> {
        let http_sources = sources.iter_mut().filter_map(|s| s.http.take()).collect();
        let storage_sources = sources.iter_mut().filter_map(|s| s.storage.take()).collect();
        let signing_sources = sources.iter_mut().filter_map(|s| s.signing.take()).collect();
        let transcoder_sources = sources
            .iter_mut()
            .filter_map(|s| s.transcoder.take())
            .collect();

        Ok(Settings {
            http: Http::new(http_sources)?,
            storage: Storage::new(storage_sources)?,
            signing: Signing::new(signing_sources)?,
            transcoder: Transcoder::new(transcoder_sources)?,
        })
    }
}

impl From<&Transcoder> for FfmpegOptions {
    fn from(transcoder: &Transcoder) -> Self {
        FfmpegOptions {
            ffmpeg: transcoder.ffmpeg.clone(),
            ffprobe: transcoder.ffprobe.clone(),
            timeout: transcoder.timeout,
            video_height: transcoder.video_height,
            preset: transcoder.preset.clone(),
            audio_bitrate: transcoder.audio_bitrate.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    http: Option<PartialHttp>,
    storage: Option<PartialStorage>,
    signing: Option<PartialSigning>,
    transcoder: Option<PartialTranscoder>,
}

impl PartialSettings {
    pub fn empty() -> Self {
        PartialSettings {
            http: None,
            storage: None,
            signing: None,
            transcoder: None,
        }
    }

    pub fn from_file(file_path: &str) -> Result<Self, SettingsError> {
        let file = File::open(file_path).map_err(|e| SettingsError::FileParse {
            path: Some(file_path.to_string()),
            cause: Box::new(e),
        })?;

        PartialSettings::from_reader(BufReader::new(file)).map_err(|e| match e {
            SettingsError::FileParse { path: None, cause } => SettingsError::FileParse {
                path: Some(file_path.to_string()),
                cause,
            },
            other => other,
        })
    }

    pub fn from_reader<T: Read>(reader: T) -> Result<Self, SettingsError> {
        serde_yaml::from_reader(reader).map_err(|e| SettingsError::FileParse {
            path: None,
            cause: Box::new(e),
        })
    }

    /// Reads `HLS_HTTP_SOCKET`, `HLS_BASE_DIR` and `HLS_SIGNING_KEY`.
    /// An unparsable socket is ignored.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let socket = lookup("HLS_HTTP_SOCKET").and_then(|s| match s.parse::<SocketAddr>() {
            Ok(socket) => Some(socket),
            Err(e) => {
                info!("Ignoring invalid HLS_HTTP_SOCKET `{}`; {}", s, e);
                None
            }
        });
        let base_dir = lookup("HLS_BASE_DIR")
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);
        let key = lookup("HLS_SIGNING_KEY").filter(|s| !s.is_empty());

        PartialSettings {
            http: socket.map(|socket| PartialHttp {
                socket: Some(socket),
            }),
            storage: base_dir.map(|base_dir| PartialStorage {
                base_dir: Some(base_dir),
            }),
            signing: key.map(|key| PartialSigning {
                enabled: None,
                key: Some(key),
                require_manifest_signature: None,
            }),
            transcoder: None,
        }
    }
}

impl Default for PartialSettings {
    fn default() -> Self {
        PartialSettings {
            http: Some(PartialHttp {
                socket: Some(SocketAddr::new(
                    IpAddr::V6(Ipv6Addr::UNSPECIFIED),
                    DEFAULT_HTTP_PORT,
                )),
            }),
            storage: Some(PartialStorage {
                base_dir: Some(env::temp_dir().join("hls-on-demand")),
            }),
            signing: Some(PartialSigning {
                enabled: Some(true),
                key: None,
                require_manifest_signature: Some(false),
            }),
            transcoder: Some(PartialTranscoder {
                segment_duration: Some(Duration::from_secs(DEFAULT_SEGMENT_DURATION_SECS)),
                ffmpeg: Some(find_executable("ffmpeg")),
                ffprobe: Some(find_executable("ffprobe")),
                timeout: Some(Duration::from_secs(DEFAULT_TRANSCODER_TIMEOUT_SECS)),
                video_height: Some(DEFAULT_VIDEO_HEIGHT),
                preset: Some(DEFAULT_PRESET.to_string()),
                audio_bitrate: Some(DEFAULT_AUDIO_BITRATE.to_string()),
            }),
        }
    }
}

fn find_executable(name: &str) -> PathBuf {
    which::which(name).unwrap_or_else(|_| PathBuf::from(name))
}
