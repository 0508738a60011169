
use std::{
    ffi::OsString,
    path::Path,
    sync::Arc,
};

use tokio::sync::Semaphore;

use crate::{
    crop::{CropRect, NOTE_SIDE},
    error_code::ErrorCode,
    future::WithMetrics,
    process::{Process, ProcessError},
};

/// Clips are trimmed to the first 60 seconds.
pub(crate) const MAX_NOTE_SECONDS: u32 = 60;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Dimensions {
    pub(crate) width: u32,
    pub(crate) height: u32,
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Toolchain failures as the submission pipeline sees them.
#[derive(Debug, thiserror::Error)]
pub(crate) enum TransformError {
    #[error("Could not determine video dimensions")]
    Probe(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Could not produce the video note")]
    Transcode(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl TransformError {
    pub(crate) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Probe(_) => ErrorCode::PROBE_FAILED,
            Self::Transcode(_) => ErrorCode::TRANSCODE_FAILED,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum FfMpegError {
    #[error("Error in ffmpeg process")]
    Process(#[source] ProcessError),

    #[error("ffprobe did not print a dimension line")]
    ParseDimensions(String),

    #[error("Failed to acquire the process semaphore")]
    Semaphore,
}

impl FfMpegError {
    pub(crate) fn error_code(&self) -> ErrorCode {
        match self {
            Self::Process(e) => e.error_code(),
            Self::ParseDimensions(_) => ErrorCode::PROBE_FAILED,
            Self::Semaphore => ErrorCode::PROCESS_SEMAPHORE_CLOSED,
        }
    }
}

impl From<tokio::sync::AcquireError> for FfMpegError {
    fn from(_: tokio::sync::AcquireError) -> Self {
        Self::Semaphore
    }
}

/// The three operations the pipeline needs from the media toolchain.
#[async_trait::async_trait(?Send)]
pub(crate) trait Transform {
    async fn probe(&self, input: &Path) -> Result<Dimensions, TransformError>;

    async fn extract_preview(
        &self,
        input: &Path,
        output: &Path,
        rect: CropRect,
    ) -> Result<(), TransformError>;

    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        rect: CropRect,
    ) -> Result<(), TransformError>;
}

/// Shells out to ffprobe/ffmpeg, treating both as black boxes. Only exit
/// status is interpreted, plus the probe's single `<width>x<height>` line.
pub(crate) struct FfMpeg {
    semaphore: Arc<Semaphore>,
    timeout: u64,
}

impl FfMpeg {
    pub(crate) fn new(semaphore: Arc<Semaphore>, timeout: u64) -> Self {
        Self { semaphore, timeout }
    }
}

#[async_trait::async_trait(?Send)]
impl Transform for FfMpeg {
    #[tracing::instrument(skip(self))]
    async fn probe(&self, input: &Path) -> Result<Dimensions, TransformError> {
        let res = async {
            let _permit = self.semaphore.acquire().await?;

            let out = Process::run("ffprobe", &probe_args(input), self.timeout)
                .map_err(FfMpegError::Process)?
                .output()
                .await
                .map_err(FfMpegError::Process)?;

            parse_dimensions(&out)
        }
        .with_metrics(crate::init_metrics::PROBE_DURATION)
        .await;

        res.map_err(|e| {
            tracing::warn!(code = %e.error_code(), "ffprobe failed: {e}");

            TransformError::Probe(Box::new(e))
        })
    }

    #[tracing::instrument(skip(self))]
    async fn extract_preview(
        &self,
        input: &Path,
        output: &Path,
        rect: CropRect,
    ) -> Result<(), TransformError> {
        let res = async {
            let _permit = self.semaphore.acquire().await?;

            Process::run("ffmpeg", &preview_args(input, output, rect), self.timeout)
                .map_err(FfMpegError::Process)?
                .wait()
                .await
                .map_err(FfMpegError::Process)
        }
        .with_metrics(crate::init_metrics::PREVIEW_DURATION)
        .await;

        res.map_err(|e| {
            tracing::warn!(code = %e.error_code(), "Preview extraction failed: {e}");

            TransformError::Transcode(Box::new(e))
        })
    }

    #[tracing::instrument(skip(self))]
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        rect: CropRect,
    ) -> Result<(), TransformError> {
        let res = async {
            let _permit = self.semaphore.acquire().await?;

            Process::run("ffmpeg", &transcode_args(input, output, rect), self.timeout)
                .map_err(FfMpegError::Process)?
                .wait()
                .await
                .map_err(FfMpegError::Process)
        }
        .with_metrics(crate::init_metrics::TRANSCODE_DURATION)
        .await;

        res.map_err(|e| {
            tracing::warn!(code = %e.error_code(), "Transcode failed: {e}");

            TransformError::Transcode(Box::new(e))
        })
    }
}

fn parse_dimensions(out: &[u8]) -> Result<Dimensions, FfMpegError> {
    let text = String::from_utf8_lossy(out);

    let parsed = text
        .lines()
        .next()
        .map(str::trim)
        .and_then(|line| line.split_once('x'))
        .and_then(|(width, height)| {
            let width = width.parse().ok()?;
            let height = height.parse().ok()?;
            Some(Dimensions { width, height })
        });

    match parsed {
        Some(dimensions) if dimensions.width > 0 && dimensions.height > 0 => Ok(dimensions),
        _ => Err(FfMpegError::ParseDimensions(text.trim().to_string())),
    }
}

fn probe_args(input: &Path) -> Vec<OsString> {
    vec![
        "-v".into(),
        "error".into(),
        "-select_streams".into(),
        "v:0".into(),
        "-show_entries".into(),
        "stream=width,height".into(),
        "-of".into(),
        "csv=s=x:p=0".into(),
        input.into(),
    ]
}

fn crop_filter(rect: CropRect) -> String {
    let CropRect { side, x, y } = rect;

    format!("crop={side}:{side}:{x}:{y}")
}

fn note_filter(rect: CropRect) -> String {
    format!("{},scale={NOTE_SIDE}:{NOTE_SIDE}", crop_filter(rect))
}

/// Single still frame at one second in, cropped per the rectangle.
fn preview_args(input: &Path, output: &Path, rect: CropRect) -> Vec<OsString> {
    vec![
        "-hide_banner".into(),
        "-v".into(),
        "warning".into(),
        "-ss".into(),
        "1".into(),
        "-i".into(),
        input.into(),
        "-frames:v".into(),
        "1".into(),
        "-vf".into(),
        crop_filter(rect).into(),
        "-codec".into(),
        "mjpeg".into(),
        "-f".into(),
        "image2".into(),
        output.into(),
    ]
}

/// The bit-exact output contract: 480x480, first 60 seconds, h264
/// main/3.1 at veryfast, aac audio at 128k, mp4 container.
fn transcode_args(input: &Path, output: &Path, rect: CropRect) -> Vec<OsString> {
    vec![
        "-hide_banner".into(),
        "-v".into(),
        "warning".into(),
        "-i".into(),
        input.into(),
        "-t".into(),
        MAX_NOTE_SECONDS.to_string().into(),
        "-vf".into(),
        note_filter(rect).into(),
        "-c:v".into(),
        "libx264".into(),
        "-profile:v".into(),
        "main".into(),
        "-level".into(),
        "3.1".into(),
        "-preset".into(),
        "veryfast".into(),
        "-c:a".into(),
        "aac".into(),
        "-b:a".into(),
        "128k".into(),
        "-f".into(),
        "mp4".into(),
        output.into(),
    ]
}
