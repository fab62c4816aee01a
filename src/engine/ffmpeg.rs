use async_trait::async_trait;
use log::{debug, error};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use super::{EngineError, TranscodingEngine};

#[derive(Debug, Clone)]
pub struct FfmpegOptions {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    pub timeout: Duration,
    pub video_height: u32,
    pub preset: String,
    pub audio_bitrate: String,
}

/// Transcoding engine backed by the `ffprobe` and `ffmpeg` command line tools.
pub struct FfmpegEngine {
    options: FfmpegOptions,
}

impl FfmpegEngine {
    pub fn new(options: FfmpegOptions) -> Self {
        FfmpegEngine { options }
    }

    fn probe_args(locator: &str) -> Vec<String> {
        vec![
            "-v".into(),
            "quiet".into(),
            "-print_format".into(),
            "json".into(),
            "-show_format".into(),
            "-i".into(),
            locator.into(),
        ]
    }

    fn encode_args(&self, locator: &str, offset: Duration, length: Duration, output: &Path) -> Vec<String> {
        let offset = seconds(offset);

        vec![
            "-v".into(),
            "error".into(),
            "-ss".into(),
            offset.clone(),
            "-i".into(),
            locator.into(),
            "-t".into(),
            seconds(length),
            "-c:v".into(),
            "libx264".into(),
            "-preset".into(),
            self.options.preset.clone(),
            "-c:a".into(),
            "aac".into(),
            "-b:a".into(),
            self.options.audio_bitrate.clone(),
            "-vf".into(),
            format!("scale=-2:{}", self.options.video_height),
            "-f".into(),
            "mpegts".into(),
            "-output_ts_offset".into(),
            offset,
            "-y".into(),
            output.to_string_lossy().into_owned(),
        ]
    }

    async fn run(&self, program: &Path, args: &[String]) -> Result<String, EngineError> {
        let name = program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| program.to_string_lossy().into_owned());

        debug!("Running {} {}", name, args.join(" "));

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::new(format!("failed to spawn {}: {}", name, e)))?;

        let output = tokio::time::timeout(self.options.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                EngineError::new(format!(
                    "{} timed out after {:?}",
                    name, self.options.timeout
                ))
            })?
            .map_err(|e| EngineError::new(format!("failed to wait for {}: {}", name, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!("{} exited with {}: {}", name, output.status, stderr.trim());

            return Err(EngineError::new(format!(
                "{} exited with {}: {}",
                name,
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl TranscodingEngine for FfmpegEngine {
    async fn probe(&self, locator: &str) -> Result<f64, EngineError> {
        let stdout = self
            .run(&self.options.ffprobe, &Self::probe_args(locator))
            .await?;

        parse_probe_output(&stdout)
    }

    async fn encode(
        &self,
        locator: &str,
        offset: Duration,
        length: Duration,
        output: &Path,
    ) -> Result<(), EngineError> {
        let args = self.encode_args(locator, offset, length, output);
        self.run(&self.options.ffmpeg, &args).await?;

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: ProbeFormat,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

fn parse_probe_output(stdout: &str) -> Result<f64, EngineError> {
    let output: ProbeOutput = serde_json::from_str(stdout)
        .map_err(|e| EngineError::new(format!("unreadable ffprobe output: {}", e)))?;

    let duration = output
        .format
        .duration
        .ok_or_else(|| EngineError::new("ffprobe reported no duration"))?;

    duration
        .trim()
        .parse::<f64>()
        .map_err(|e| EngineError::new(format!("invalid duration `{}`: {}", duration, e)))
}

fn seconds(d: Duration) -> String {
    format!("{:.3}", d.as_secs_f64())
}
