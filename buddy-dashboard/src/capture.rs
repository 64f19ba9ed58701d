//! Still-frame capture for the identity gate.
//!
//! The host has no browser canvas, so a "camera" is anything that can hand
//! over one encoded still image: a snapshot file kept fresh by an external
//! grabber, or a command that writes a frame to stdout.

use crate::config::CaptureConfig;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

/// One encoded still frame ready for multipart upload
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedImage {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub file_name: String,
}

impl CapturedImage {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let (mime, ext) = sniff_image_type(&bytes);
        Self {
            bytes,
            mime: mime.to_string(),
            file_name: format!("capture.{}", ext),
        }
    }
}

#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Grab one still frame. An error means no usable camera stream.
    async fn capture_still(&self) -> Result<CapturedImage, String>;

    fn name(&self) -> &str;
}

/// Reads the current frame from a snapshot file
pub struct SnapshotFileSource {
    path: PathBuf,
}

impl SnapshotFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl FrameSource for SnapshotFileSource {
    async fn capture_still(&self) -> Result<CapturedImage, String> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| format!("Failed to read {}: {}", self.path.display(), e))?;
        if bytes.is_empty() {
            return Err(format!("Snapshot {} is empty", self.path.display()));
        }
        Ok(CapturedImage::from_bytes(bytes))
    }

    fn name(&self) -> &str {
        "snapshot file"
    }
}

/// Runs a grabber command and takes its stdout as the frame
pub struct CommandFrameSource {
    program: String,
    args: Vec<String>,
}

impl CommandFrameSource {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

#[async_trait]
impl FrameSource for CommandFrameSource {
    async fn capture_still(&self) -> Result<CapturedImage, String> {
        let output = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| format!("Failed to run {}: {}", self.program, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            ));
        }
        if output.stdout.is_empty() {
            return Err(format!("{} produced no frame", self.program));
        }
        Ok(CapturedImage::from_bytes(output.stdout))
    }

    fn name(&self) -> &str {
        "capture command"
    }
}

/// Build the configured frame source, if any
pub fn frame_source_from_config(cfg: &CaptureConfig) -> Option<Arc<dyn FrameSource>> {
    match cfg {
        CaptureConfig::None => None,
        CaptureConfig::SnapshotFile(path) => Some(Arc::new(SnapshotFileSource::new(path))),
        CaptureConfig::Command { program, args } => {
            Some(Arc::new(CommandFrameSource::new(program, args.clone())))
        }
    }
}

/// MIME type and file extension from magic bytes. Defaults to PNG.
pub fn sniff_image_type(bytes: &[u8]) -> (&'static str, &'static str) {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        ("image/jpeg", "jpg")
    } else if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        ("image/png", "png")
    } else if bytes.starts_with(b"RIFF") && bytes.get(8..12) == Some(&b"WEBP"[..]) {
        ("image/webp", "webp")
    } else {
        ("image/png", "png")
    }
}
