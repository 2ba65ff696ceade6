//! Rectangular crop transform applied to images before staging.

use crate::{CropRegion, Result, StorageError};
use image::{GenericImageView, ImageFormat};
use std::path::Path;

/// Pixel rectangle accepted by [`crop_image`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
	pub x: u32,
	pub y: u32,
	pub width: u32,
	pub height: u32,
}

impl CropRegion {
	/// Check the region against an image of `width` x `height` pixels.
	///
	/// Width and height must be positive and the origin must lie inside the
	/// image. The extent is clamped to the image border.
	///
	/// # Examples
	///
	/// ```
	/// use formflash_storages::CropRegion;
	///
	/// let rect = CropRegion::new(10.0, 10.0, 500.0, 20.0).to_pixels(100, 100).unwrap();
	/// assert_eq!((rect.x, rect.y, rect.width, rect.height), (10, 10, 90, 20));
	///
	/// assert!(CropRegion::new(0.0, 0.0, 0.0, 10.0).to_pixels(100, 100).is_err());
	/// assert!(CropRegion::new(100.0, 0.0, 5.0, 5.0).to_pixels(100, 100).is_err());
	/// ```
	pub fn to_pixels(&self, width: u32, height: u32) -> Result<PixelRect> {
		let values = [self.x, self.y, self.width, self.height];
		if values.iter().any(|v| !v.is_finite()) {
			return Err(StorageError::InvalidCrop(
				"coordinates must be finite numbers".to_string(),
			));
		}

		let (x, y) = (self.x.round(), self.y.round());
		let (w, h) = (self.width.round(), self.height.round());

		if w <= 0.0 || h <= 0.0 {
			return Err(StorageError::InvalidCrop(format!(
				"width and height must be positive, got {}x{}",
				w, h
			)));
		}
		if x < 0.0 || y < 0.0 || x >= f64::from(width) || y >= f64::from(height) {
			return Err(StorageError::InvalidCrop(format!(
				"origin ({}, {}) is outside the {}x{} image",
				x, y, width, height
			)));
		}

		let (x, y) = (x as u32, y as u32);
		Ok(PixelRect {
			x,
			y,
			width: (w as u64).min(u64::from(width - x)) as u32,
			height: (h as u64).min(u64::from(height - y)) as u32,
		})
	}
}

/// Crop the image at `source` and write the result to `target`.
///
/// The output format follows the extension of `target`, falling back to the
/// format of the source image.
///
/// # Errors
///
/// Returns `` `StorageError::Image` `` if the source is not a decodable image
/// or the result cannot be encoded, and `` `StorageError::InvalidCrop` `` for
/// geometry outside the source image.
pub fn crop_image(source: &Path, target: &Path, region: &CropRegion) -> Result<PixelRect> {
	let reader = image::ImageReader::open(source)?
		.with_guessed_format()
		.map_err(StorageError::Io)?;
	let source_format = reader.format();
	let img = reader
		.decode()
		.map_err(|e| StorageError::Image(format!("Failed to load image: {}", e)))?;

	let (width, height) = img.dimensions();
	let rect = region.to_pixels(width, height)?;

	let cropped = img.crop_imm(rect.x, rect.y, rect.width, rect.height);

	let format = ImageFormat::from_path(target)
		.ok()
		.or(source_format)
		.unwrap_or(ImageFormat::Png);

	cropped
		.save_with_format(target, format)
		.map_err(|e| StorageError::Image(format!("Failed to encode image: {}", e)))?;

	Ok(rect)
}
