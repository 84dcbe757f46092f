//! # Quality-Search Compressor Module
//!
//! Encodes a decoded image as a progressive, huffman-optimized JPEG whose
//! size fits a kilobyte budget, by walking the quality level down from 95
//! until the budget is met or the quality floor is reached.
//!
//! Each attempt overwrites the output path, so on overall failure the last
//! (lowest-quality) attempt's bytes remain on disk until the caller deletes
//! them. The step taken after an oversized attempt depends on how far the
//! attempt overshot the budget; the thresholds are load-bearing for
//! behavioral compatibility, do not retune them casually.

use crate::error::ConvertError;
use anyhow::Result;
use image::DynamicImage;
use std::path::Path;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// First quality level attempted.
pub const QUALITY_START: u8 = 95;
/// Lowest quality level ever attempted (inclusive).
pub const QUALITY_FLOOR: u8 = 5;

/// Outcome of a single encode attempt at one quality level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeOutcome {
    /// Encoded bytes fit the budget; the file at the output path is final.
    Fits(u64),
    /// Encode succeeded but overshot the budget.
    TooLarge(u64),
    /// The encode attempt itself failed; retry at a lower quality.
    Failed,
}

/// Quality decrement for an oversized attempt, as a pure function of the
/// attempt size over the target size.
pub fn quality_step(actual_bytes: u64, target_bytes: u64) -> u8 {
    let ratio = actual_bytes as f64 / target_bytes as f64;
    if ratio > 10.0 {
        20
    } else if ratio > 5.0 {
        10
    } else {
        5
    }
}

/// Size-bounded JPEG encoder
pub struct Compressor {
    target_size_kb: u64,
    stop_receiver: Option<broadcast::Receiver<()>>,
}

impl Compressor {
    pub fn new(target_size_kb: u64) -> Self {
        Self {
            target_size_kb,
            stop_receiver: None,
        }
    }

    /// Create a compressor that observes a stop signal between encode
    /// attempts.
    pub fn with_cancellation(target_size_kb: u64, stop_receiver: broadcast::Receiver<()>) -> Self {
        Self {
            target_size_kb,
            stop_receiver: Some(stop_receiver),
        }
    }

    fn should_stop(&mut self) -> bool {
        if let Some(ref mut receiver) = self.stop_receiver {
            match receiver.try_recv() {
                Ok(_) => return true,
                Err(broadcast::error::TryRecvError::Empty) => return false,
                Err(broadcast::error::TryRecvError::Lagged(_)) => return true,
                Err(broadcast::error::TryRecvError::Closed) => return false,
            }
        }
        false
    }

    /// Compress `image` to `output_path` within the configured budget.
    ///
    /// Returns `Ok(true)` when some quality level fit the budget, `Ok(false)`
    /// when the quality range was exhausted (the caller decides what to do
    /// with the leftover attempt on disk), and `Err(Cancelled)` when a stop
    /// signal arrives between attempts.
    pub fn compress(&mut self, image: &DynamicImage, output_path: &Path) -> Result<bool> {
        let target_bytes = self.target_size_kb * 1024;
        self.search(target_bytes, &mut |quality| {
            encode_attempt(image, output_path, quality, target_bytes)
        })
    }

    /// The quality walk itself, over an arbitrary attempt function.
    fn search(
        &mut self,
        target_bytes: u64,
        attempt: &mut dyn FnMut(u8) -> EncodeOutcome,
    ) -> Result<bool> {
        let mut quality = QUALITY_START;

        while quality >= QUALITY_FLOOR {
            if self.should_stop() {
                return Err(ConvertError::Cancelled.into());
            }

            match attempt(quality) {
                EncodeOutcome::Fits(size) => {
                    debug!(
                        "Quality {} fits budget: {} <= {} bytes",
                        quality, size, target_bytes
                    );
                    return Ok(true);
                }
                EncodeOutcome::TooLarge(size) => {
                    let step = quality_step(size, target_bytes);
                    debug!(
                        "Quality {} produced {} bytes (target {}), stepping down by {}",
                        quality, size, target_bytes, step
                    );
                    quality = quality.saturating_sub(step);
                }
                EncodeOutcome::Failed => {
                    quality = quality.saturating_sub(10);
                }
            }
        }

        Ok(false)
    }
}

/// Encode one JPEG attempt at the given quality, overwriting `output_path`,
/// and classify the result against the byte budget. Encode and write
/// failures are retry signals, not fatal errors.
fn encode_attempt(
    image: &DynamicImage,
    output_path: &Path,
    quality: u8,
    target_bytes: u64,
) -> EncodeOutcome {
    let bytes = match encode_jpeg(image, quality) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Encode attempt failed at quality {}: {}", quality, e);
            return EncodeOutcome::Failed;
        }
    };

    if let Err(e) = std::fs::write(output_path, &bytes) {
        warn!(
            "Failed to write attempt at quality {} to {}: {}",
            quality,
            output_path.display(),
            e
        );
        return EncodeOutcome::Failed;
    }

    let size = bytes.len() as u64;
    if size <= target_bytes {
        EncodeOutcome::Fits(size)
    } else {
        EncodeOutcome::TooLarge(size)
    }
}

/// Encode a progressive, huffman-optimized JPEG in memory.
///
/// Grayscale images are encoded as single-channel JPEGs; everything else
/// goes through an RGB buffer (alpha has been flattened upstream).
fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let width = image.width() as usize;
    let height = image.height() as usize;

    let (color_space, pixels) = match image {
        DynamicImage::ImageLuma8(gray) => {
            (mozjpeg::ColorSpace::JCS_GRAYSCALE, gray.as_raw().clone())
        }
        other => (mozjpeg::ColorSpace::JCS_RGB, other.to_rgb8().into_raw()),
    };

    let mut comp = mozjpeg::Compress::new(color_space);
    comp.set_size(width, height);
    comp.set_quality(quality as f32);
    comp.set_progressive_mode();
    comp.set_optimize_scans(true);
    comp.set_optimize_coding(true);

    let mut started = comp.start_compress(Vec::new())?;
    started.write_scanlines(&pixels)?;
    let jpeg = started.finish()?;
    Ok(jpeg)
}
