// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Decoded photos and orientation normalization

use image::metadata::Orientation;
use image::{DynamicImage, GenericImageView, ImageDecoder, ImageReader};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, warn};

use crate::{AniDexError, Result};

/// EXIF orientation tag for pixels already stored upright
pub const UPRIGHT: u8 = 1;

/// How to treat an orientation tag outside the EXIF range 1..=8
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrientationPolicy {
    /// Assume upright and log a warning
    #[default]
    Lenient,
    /// Fail with `InvalidImage`
    Strict,
}

/// A decoded raster image plus the orientation it was stored with.
///
/// Owned by the caller; the classifier only borrows it for one request.
#[derive(Debug, Clone)]
pub struct Photo {
    image: DynamicImage,
    orientation_tag: u8,
}

impl Photo {
    /// Wrap an already-decoded image with its EXIF orientation tag
    pub fn new(image: DynamicImage, orientation_tag: u8) -> Self {
        Self { image, orientation_tag }
    }

    /// Wrap an image whose pixels are already upright
    pub fn upright(image: DynamicImage) -> Self {
        Self::new(image, UPRIGHT)
    }

    /// Decode an encoded image (JPEG, PNG, ...) and keep its EXIF orientation
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(AniDexError::InvalidImage("empty input".to_string()));
        }

        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| AniDexError::InvalidImage(format!("cannot read input: {}", e)))?;

        if reader.format().is_none() {
            return Err(AniDexError::InvalidImage("unrecognized image format".to_string()));
        }

        let mut decoder = reader
            .into_decoder()
            .map_err(|e| AniDexError::InvalidImage(e.to_string()))?;

        // Missing or unreadable metadata means the pixels are taken as stored
        let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);

        let image = DynamicImage::from_decoder(decoder)
            .map_err(|e| AniDexError::InvalidImage(e.to_string()))?;

        let photo = Self::new(image, orientation.to_exif());
        photo.validate()?;

        debug!(
            "Decoded photo {}x{} (orientation {})",
            photo.image.width(),
            photo.image.height(),
            photo.orientation_tag
        );
        Ok(photo)
    }

    /// Read and decode an image file
    pub fn open(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::decode(&data)
            .map_err(|e| match e {
                AniDexError::InvalidImage(msg) => {
                    AniDexError::InvalidImage(format!("{}: {}", path.display(), msg))
                }
                other => other,
            })
    }

    /// Check that the pixel buffer is processable
    pub fn validate(&self) -> Result<()> {
        let (width, height) = self.image.dimensions();
        if width == 0 || height == 0 {
            return Err(AniDexError::InvalidImage(format!(
                "empty pixel buffer ({}x{})",
                width, height
            )));
        }
        Ok(())
    }

    pub fn orientation_tag(&self) -> u8 {
        self.orientation_tag
    }

    /// Stored dimensions, before orientation is applied
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Resolve the orientation tag under `policy`
    pub fn orientation(&self, policy: OrientationPolicy) -> Result<Orientation> {
        match Orientation::from_exif(self.orientation_tag) {
            Some(orientation) => Ok(orientation),
            None => match policy {
                OrientationPolicy::Lenient => {
                    warn!(
                        "Unrecognized orientation tag {}, assuming upright",
                        self.orientation_tag
                    );
                    Ok(Orientation::NoTransforms)
                }
                OrientationPolicy::Strict => Err(AniDexError::InvalidImage(format!(
                    "unrecognized orientation tag {}",
                    self.orientation_tag
                ))),
            },
        }
    }

    /// Copy of the raster rotated/mirrored into display orientation
    pub fn to_upright(&self, policy: OrientationPolicy) -> Result<DynamicImage> {
        self.validate()?;
        let orientation = self.orientation(policy)?;

        let mut image = self.image.clone();
        image.apply_orientation(orientation);
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, ImageFormat, Rgb, RgbImage};

    /// 2x1 image: red on the left, blue on the right
    fn red_blue() -> DynamicImage {
        let mut img: RgbImage = ImageBuffer::new(2, 1);
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        img.put_pixel(1, 0, Rgb([0, 0, 255]));
        DynamicImage::ImageRgb8(img)
    }

    fn encode_png(image: &DynamicImage) -> Vec<u8> {
        let mut buffer = Vec::new();
        image.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png).unwrap();
        buffer
    }

    #[test]
    fn test_decode_png() {
        let photo = Photo::decode(&encode_png(&red_blue())).unwrap();
        assert_eq!(photo.dimensions(), (2, 1));
        assert_eq!(photo.orientation_tag(), UPRIGHT);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = Photo::decode(b"definitely not an image").unwrap_err();
        assert!(matches!(err, AniDexError::InvalidImage(_)));
    }

    #[test]
    fn test_decode_rejects_empty() {
        assert!(matches!(Photo::decode(&[]), Err(AniDexError::InvalidImage(_))));
    }

    #[test]
    fn test_decode_rejects_truncated_png() {
        let data = encode_png(&red_blue());
        let err = Photo::decode(&data[..data.len() / 2]).unwrap_err();
        assert!(matches!(err, AniDexError::InvalidImage(_)));
    }

    #[test]
    fn test_zero_sized_image_invalid() {
        let photo = Photo::upright(DynamicImage::new_rgb8(0, 0));
        assert!(matches!(photo.validate(), Err(AniDexError::InvalidImage(_))));
        assert!(photo.to_upright(OrientationPolicy::Lenient).is_err());
    }

    #[test]
    fn test_rotate_90() {
        // Tag 6: stored rotated, display needs a 90 degree clockwise turn
        let upright = Photo::new(red_blue(), 6).to_upright(OrientationPolicy::Strict).unwrap();
        let rgb = upright.to_rgb8();
        assert_eq!(rgb.dimensions(), (1, 2));
        assert_eq!(rgb.get_pixel(0, 0), &Rgb([255, 0, 0]));
        assert_eq!(rgb.get_pixel(0, 1), &Rgb([0, 0, 255]));
    }

    #[test]
    fn test_mirrored() {
        let upright = Photo::new(red_blue(), 2).to_upright(OrientationPolicy::Strict).unwrap();
        let rgb = upright.to_rgb8();
        assert_eq!(rgb.get_pixel(0, 0), &Rgb([0, 0, 255]));
        assert_eq!(rgb.get_pixel(1, 0), &Rgb([255, 0, 0]));
    }

    #[test]
    fn test_upright_is_unchanged() {
        let upright = Photo::upright(red_blue()).to_upright(OrientationPolicy::Strict).unwrap();
        assert_eq!(upright.to_rgb8(), red_blue().to_rgb8());
    }

    #[test]
    fn test_unknown_tag_lenient() {
        let photo = Photo::new(red_blue(), 42);
        assert_eq!(
            photo.orientation(OrientationPolicy::Lenient).unwrap(),
            Orientation::NoTransforms
        );
        let upright = photo.to_upright(OrientationPolicy::Lenient).unwrap();
        assert_eq!(upright.to_rgb8(), red_blue().to_rgb8());
    }

    #[test]
    fn test_unknown_tag_strict() {
        let photo = Photo::new(red_blue(), 0);
        let err = photo.to_upright(OrientationPolicy::Strict).unwrap_err();
        assert!(matches!(err, AniDexError::InvalidImage(msg) if msg.contains("orientation")));
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Photo::open(&dir.path().join("nope.jpg")).unwrap_err();
        assert!(matches!(err, AniDexError::FileSystem(_)));
    }

    #[test]
    fn test_open_undecodable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"\xFF\xD8 not really a jpeg").unwrap();

        let err = Photo::open(&path).unwrap_err();
        assert!(matches!(err, AniDexError::InvalidImage(msg) if msg.contains("broken.jpg")));
    }
}
