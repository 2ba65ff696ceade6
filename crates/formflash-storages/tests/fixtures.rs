//! Test fixtures for flash store tests.

#![allow(dead_code)]

use formflash_storages::{FlashConfig, FlashStore, create_store};
use image::{Rgb, RgbImage};
use rstest::fixture;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Flash store rooted in a fresh temporary directory.
pub struct StoreContext {
	pub dir: TempDir,
	pub store: FlashStore,
}

impl StoreContext {
	/// Directory playing the role of the request layer's upload area.
	pub fn incoming(&self) -> PathBuf {
		let path = self.dir.path().join("incoming");
		std::fs::create_dir_all(&path).unwrap();
		path
	}

	/// Directory committed files are moved to.
	pub fn destination(&self) -> PathBuf {
		self.dir.path().join("public")
	}

	/// Write `content` as an incoming temporary file.
	pub fn incoming_file(&self, name: &str, content: &[u8]) -> PathBuf {
		let path = self.incoming().join(name);
		std::fs::write(&path, content).unwrap();
		path
	}

	/// Write a solid-color PNG as an incoming temporary file.
	pub fn incoming_png(&self, name: &str, width: u32, height: u32) -> PathBuf {
		let path = self.incoming().join(name);
		write_png(&path, width, height);
		path
	}
}

pub fn write_png(path: &Path, width: u32, height: u32) {
	RgbImage::from_pixel(width, height, Rgb([20, 120, 220]))
		.save_with_format(path, image::ImageFormat::Png)
		.unwrap();
}

#[fixture]
pub fn context() -> StoreContext {
	let dir = TempDir::new().unwrap();
	let store = create_store(FlashConfig::local(dir.path().join("flash"))).unwrap();
	StoreContext { dir, store }
}
