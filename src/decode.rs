//! # Decode and Color Normalization Module
//!
//! TIFF decoding plus the color-mode normalization that has to happen
//! before JPEG encoding. Orthoimagery tiles routinely exceed the default
//! decompression limits of the `image` crate, so limits are disabled.

use crate::error::ConvertError;
use image::DynamicImage;
use std::path::Path;
use tracing::debug;

/// Decode an image from disk with pixel-count limits disabled.
pub fn decode_image(path: &Path) -> Result<DynamicImage, ConvertError> {
    let mut reader = image::io::Reader::open(path)?.with_guessed_format()?;
    reader.no_limits();
    Ok(reader.decode()?)
}

/// Flatten any alpha channel to plain opaque RGB.
///
/// JPEG has no alpha channel. The decoder materializes palette
/// transparency as RGBA, so checking the color type covers that case too.
/// Images without alpha (including grayscale) pass through untouched.
pub fn flatten_alpha(image: DynamicImage) -> DynamicImage {
    if image.color().has_alpha() {
        debug!("Flattening alpha channel to RGB");
        DynamicImage::ImageRgb8(image.to_rgb8())
    } else {
        image
    }
}
