//! Video frame types and processing

use crate::CameraError;
use image::codecs::jpeg::JpegEncoder;
use image::{imageops, DynamicImage, RgbImage};

/// Decoded RGB video frame
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    /// RGB pixel data (width * height * 3)
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Capture timestamp (nanoseconds)
    pub timestamp_ns: u64,
    /// Frame sequence number
    pub sequence: u32,
}

impl VideoFrame {
    /// Create a new video frame from raw RGB data
    pub fn new(data: Vec<u8>, width: u32, height: u32, timestamp_ns: u64, sequence: u32) -> Self {
        Self {
            data,
            width,
            height,
            timestamp_ns,
            sequence,
        }
    }

    /// Build a frame from a decoded image, scaled to the capture size
    pub fn from_image(
        img: &DynamicImage,
        width: u32,
        height: u32,
        timestamp_ns: u64,
        sequence: u32,
    ) -> Self {
        let rgb = if img.width() == width && img.height() == height {
            img.to_rgb8()
        } else {
            imageops::resize(&img.to_rgb8(), width, height, imageops::FilterType::Triangle)
        };

        Self::new(rgb.into_raw(), width, height, timestamp_ns, sequence)
    }

    /// View the frame as an RGB image buffer
    pub fn to_rgb_image(&self) -> Result<RgbImage, CameraError> {
        RgbImage::from_raw(self.width, self.height, self.data.clone()).ok_or_else(|| {
            CameraError::Format(format!(
                "{} bytes do not fill a {}x{} RGB frame",
                self.data.len(),
                self.width,
                self.height
            ))
        })
    }

    /// Encode the frame as a JPEG still
    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>, CameraError> {
        let img = self.to_rgb_image()?;
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, quality.clamp(1, 100))
            .encode_image(&img)
            .map_err(|e| CameraError::Encode(e.to_string()))?;
        Ok(jpeg)
    }
}
