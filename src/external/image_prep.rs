//! Image preparation for vision requests
//!
//! Validates uploaded bytes, downsizes large photos, and computes the content
//! hash used as the count cache key.

use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use sha2::{Digest, Sha256};

use super::VisionError;

/// Longest side sent to the vision model
pub const MAX_IMAGE_SIDE: u32 = 1568;

/// Image bytes ready to be embedded in a vision request
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub bytes: Vec<u8>,
    pub media_type: &'static str,
    pub width: u32,
    pub height: u32,
}

/// Lowercase hex SHA-256 of the raw bytes
pub fn image_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn media_type(format: ImageFormat) -> Option<&'static str> {
    match format {
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Gif => Some("image/gif"),
        ImageFormat::WebP => Some("image/webp"),
        _ => None,
    }
}

fn encode_jpeg(image: &DynamicImage) -> Result<Vec<u8>, VisionError> {
    // JPEG has no alpha channel
    let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
    let mut out = Vec::new();
    rgb.write_to(&mut Cursor::new(&mut out), ImageFormat::Jpeg)?;
    Ok(out)
}

/// Decode, downscale when needed, and pick a media type the API accepts
pub fn prepare_image(bytes: &[u8]) -> Result<PreparedImage, VisionError> {
    let format = image::guess_format(bytes)?;
    let decoded = image::load_from_memory_with_format(bytes, format)?;
    let (width, height) = decoded.dimensions();

    if width.max(height) > MAX_IMAGE_SIDE {
        let resized = decoded.resize(MAX_IMAGE_SIDE, MAX_IMAGE_SIDE, FilterType::Triangle);
        let (w, h) = resized.dimensions();
        tracing::debug!("Downscaled image from {}x{} to {}x{}", width, height, w, h);
        return Ok(PreparedImage {
            bytes: encode_jpeg(&resized)?,
            media_type: "image/jpeg",
            width: w,
            height: h,
        });
    }

    match media_type(format) {
        Some(media_type) => Ok(PreparedImage {
            bytes: bytes.to_vec(),
            media_type,
            width,
            height,
        }),
        None => Ok(PreparedImage {
            bytes: encode_jpeg(&decoded)?,
            media_type: "image/jpeg",
            width,
            height,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn encoded(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([200, 30, 30, 255]));
        let mut out = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut out), format)
            .unwrap();
        out
    }

    #[test]
    fn test_sha256_is_content_addressed() {
        let a = image_sha256(b"same bytes");
        assert_eq!(a, image_sha256(b"same bytes"));
        assert_ne!(a, image_sha256(b"other bytes"));
        assert_eq!(a.len(), 64);
        assert_eq!(
            image_sha256(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_small_png_passes_through() {
        let png = encoded(32, 16, ImageFormat::Png);
        let prepared = prepare_image(&png).unwrap();

        assert_eq!(prepared.media_type, "image/png");
        assert_eq!((prepared.width, prepared.height), (32, 16));
        assert_eq!(prepared.bytes, png);
    }

    #[test]
    fn test_large_image_is_downscaled_to_jpeg() {
        let png = encoded(2000, 1000, ImageFormat::Png);
        let prepared = prepare_image(&png).unwrap();

        assert_eq!(prepared.media_type, "image/jpeg");
        assert_eq!(prepared.width, MAX_IMAGE_SIDE);
        assert_eq!(prepared.height, 784);
        assert_eq!(image::guess_format(&prepared.bytes).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn test_unsupported_format_is_reencoded() {
        let bmp = encoded(8, 8, ImageFormat::Bmp);
        let prepared = prepare_image(&bmp).unwrap();
        assert_eq!(prepared.media_type, "image/jpeg");
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(matches!(prepare_image(b"definitely not an image"), Err(VisionError::Image(_))));
    }
}
