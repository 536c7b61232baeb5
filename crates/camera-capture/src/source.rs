//! Frame sources backing the shared camera stream

use crate::{CameraConfig, CameraError, VideoFrame};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// A live video stream that still frames can be grabbed from.
///
/// Capturing never blocks on the camera: it returns the most recent frame
/// the stream has, or an error when none is available.
pub trait FrameSource: Send + Sync {
    fn capture(&self) -> Result<VideoFrame, CameraError>;
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// Latest-frame slot fed by an external camera driver.
///
/// Cloning yields another handle to the same stream.
#[derive(Clone, Default)]
pub struct SharedFrameSource {
    latest: Arc<RwLock<Option<VideoFrame>>>,
    sequence: Arc<AtomicU32>,
}

impl SharedFrameSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a new frame, replacing the previous one
    pub fn publish(&self, mut frame: VideoFrame) -> Result<(), CameraError> {
        frame.sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let mut latest = self
            .latest
            .write()
            .map_err(|e| CameraError::Stream(format!("Lock error: {}", e)))?;
        *latest = Some(frame);
        Ok(())
    }

    /// Decode an encoded still (JPEG, PNG) and publish it at the capture size
    pub fn publish_encoded(&self, encoded: &[u8], width: u32, height: u32) -> Result<(), CameraError> {
        let img = image::load_from_memory(encoded)
            .map_err(|e| CameraError::Format(format!("Undecodable frame: {}", e)))?;
        self.publish(VideoFrame::from_image(&img, width, height, now_ns(), 0))
    }
}

impl FrameSource for SharedFrameSource {
    fn capture(&self) -> Result<VideoFrame, CameraError> {
        let latest = self
            .latest
            .read()
            .map_err(|e| CameraError::Stream(format!("Lock error: {}", e)))?;
        latest.clone().ok_or(CameraError::NoFrame)
    }
}

/// Plays back a directory of still images as a looping stream
pub struct ImageDirectorySource {
    files: Vec<PathBuf>,
    cursor: AtomicUsize,
    width: u32,
    height: u32,
}

impl ImageDirectorySource {
    /// Open a directory of `.jpg`, `.jpeg` or `.png` stills, played in file name order
    pub fn open(dir: &Path, config: &CameraConfig) -> Result<Self, CameraError> {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| CameraError::Open(format!("{}: {}", dir.display(), e)))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "jpg" | "jpeg" | "png"))
                    .unwrap_or(false)
            })
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(CameraError::Open(format!(
                "{}: no still images found",
                dir.display()
            )));
        }

        info!("Opened image directory {} with {} frames", dir.display(), files.len());

        Ok(Self {
            files,
            cursor: AtomicUsize::new(0),
            width: config.width,
            height: config.height,
        })
    }

    /// Number of stills in the loop
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FrameSource for ImageDirectorySource {
    fn capture(&self) -> Result<VideoFrame, CameraError> {
        let n = self.cursor.fetch_add(1, Ordering::Relaxed);
        let path = &self.files[n % self.files.len()];
        debug!("Capturing still {}", path.display());

        let img = image::open(path)
            .map_err(|e| CameraError::Format(format!("{}: {}", path.display(), e)))?;

        Ok(VideoFrame::from_image(
            &img,
            self.width,
            self.height,
            now_ns(),
            n as u32,
        ))
    }
}
