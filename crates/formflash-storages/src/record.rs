//! Persisted flash record types.
//!
//! A [`FlashRecord`] is the only durable reference to uploads that were
//! accepted but not yet committed. It is keyed by the form's `uniqueid` and
//! survives across requests belonging to the same submission.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Files staged under one field, keyed by final filename.
pub type FieldFiles = IndexMap<String, FileDescriptor>;

/// Legacy upload queue: field key, then destination path, then upload.
pub type LegacyQueue = IndexMap<String, IndexMap<String, LegacyUpload>>;

/// Metadata about one staged upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileDescriptor {
	/// Field the file was uploaded for.
	pub field: String,
	/// Final filename (after random naming or overwrite avoidance).
	pub name: String,
	/// Filename as sent by the client.
	pub original_name: String,
	/// Location of the staged copy inside the record's temporary area.
	pub storage_path: PathBuf,
	/// Where commit moves the file.
	pub destination: PathBuf,
	/// Size in bytes of the staged copy.
	pub size: u64,
	/// MIME type derived from the filename.
	pub mime_type: String,
	/// Crop applied before staging, if any.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub crop: Option<CropRegion>,
	/// Set exactly once, when commit moved the file to `destination`.
	#[serde(default)]
	pub moved: bool,
	pub uploaded_at: DateTime<Utc>,
}

impl FileDescriptor {
	/// Whether the staged copy is still present on disk.
	pub fn is_staged(&self) -> bool {
		!self.moved && self.storage_path.is_file()
	}
}

/// A file accepted by upload validation, ready to be staged.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingUpload {
	/// Final filename.
	pub filename: String,
	/// Filename as sent by the client.
	pub original_name: String,
	/// Temporary file written by the request layer.
	pub source: PathBuf,
	/// Resolved destination path of the committed file.
	pub destination: PathBuf,
	pub size: u64,
	pub mime_type: String,
}

impl PendingUpload {
	pub fn new(
		filename: impl Into<String>,
		source: impl Into<PathBuf>,
		destination: impl Into<PathBuf>,
	) -> Self {
		let filename = filename.into();
		Self {
			original_name: filename.clone(),
			filename,
			source: source.into(),
			destination: destination.into(),
			size: 0,
			mime_type: "application/octet-stream".to_string(),
		}
	}

	pub fn with_original_name(mut self, original_name: impl Into<String>) -> Self {
		self.original_name = original_name.into();
		self
	}

	pub fn with_size(mut self, size: u64) -> Self {
		self.size = size;
		self
	}

	pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
		self.mime_type = mime_type.into();
		self
	}

	/// Extension of the final filename, lower-cased.
	pub fn extension(&self) -> Option<String> {
		Path::new(&self.filename)
			.extension()
			.and_then(|e| e.to_str())
			.map(|e| e.to_lowercase())
	}
}

/// Rectangular crop region in source-image pixels.
///
/// Client-side croppers send fractional coordinates, so the fields are
/// floating point and rounded when the crop is applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropRegion {
	pub x: f64,
	pub y: f64,
	pub width: f64,
	pub height: f64,
}

impl CropRegion {
	pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
		Self {
			x,
			y,
			width,
			height,
		}
	}
}

/// Upload staged through the deprecated raw temp-path queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyUpload {
	pub name: String,
	#[serde(rename = "type")]
	pub mime_type: String,
	pub size: u64,
	pub path: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub tmp_name: Option<PathBuf>,
}

/// Staging record for one in-progress submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlashRecord {
	pub uniqueid: String,
	#[serde(default)]
	pub url: Option<String>,
	#[serde(default)]
	pub user: Option<String>,
	/// Field key, then final filename.
	#[serde(default)]
	pub files: IndexMap<String, FieldFiles>,
	/// Partial form data for multi-step forms.
	#[serde(default)]
	pub data: Option<Map<String, Value>>,
	#[serde(default, skip_serializing_if = "IndexMap::is_empty")]
	pub legacy: LegacyQueue,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl FlashRecord {
	/// Create an empty record bound to `uniqueid`.
	///
	/// # Examples
	///
	/// ```
	/// use formflash_storages::FlashRecord;
	///
	/// let record = FlashRecord::new("a1b2c3");
	/// assert_eq!(record.uniqueid, "a1b2c3");
	/// assert!(record.files.is_empty());
	/// assert!(record.data.is_none());
	/// ```
	pub fn new(uniqueid: impl Into<String>) -> Self {
		let now = Utc::now();
		Self {
			uniqueid: uniqueid.into(),
			url: None,
			user: None,
			files: IndexMap::new(),
			data: None,
			legacy: IndexMap::new(),
			created_at: now,
			updated_at: now,
		}
	}

	/// Number of descriptors that still wait for commit.
	pub fn pending_count(&self) -> usize {
		self.files
			.values()
			.flat_map(|files| files.values())
			.filter(|file| !file.moved)
			.count()
	}

	pub fn is_empty(&self) -> bool {
		self.files.values().all(|files| files.is_empty())
			&& self.data.is_none()
			&& self.legacy.is_empty()
	}
}
