//! Moving staged uploads to their final destinations.

use crate::normalize::merge;
use crate::{FormError, FormResult};
use formflash_storages::{FileDescriptor, FormFlash};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Commits the uploads of a flash record into the form's working data.
pub trait UploadCommitter {
	/// Move pending uploads and record them in `data`.
	///
	/// # Errors
	///
	/// Only fatal errors are returned: `` `FormError::UploadMoveFailed` ``
	/// when a file cannot be moved and `` `FormError::StorageWriteFailed` ``
	/// when the flash record cannot be updated. Files moved before a
	/// failure stay moved.
	fn commit(&self, flash: &mut FormFlash, data: &mut Map<String, Value>) -> FormResult<()>;
}

/// Commits files staged in the flash store.
///
/// Every descriptor not yet moved is moved to the destination recorded at
/// upload time, or into the override directory of its field. On success
/// the flash record is deleted.
#[derive(Debug, Clone, Default)]
pub struct CommitStage {
	overrides: HashMap<String, PathBuf>,
}

impl CommitStage {
	pub fn new() -> Self {
		Self::default()
	}

	/// Move the files of `field` into `directory` instead.
	pub fn with_destination(mut self, field: impl Into<String>, directory: impl Into<PathBuf>) -> Self {
		self.overrides.insert(field.into(), directory.into());
		self
	}

	fn target(&self, descriptor: &FileDescriptor) -> Option<PathBuf> {
		self.overrides
			.get(&descriptor.field)
			.map(|directory| directory.join(&descriptor.name))
	}
}

impl UploadCommitter for CommitStage {
	fn commit(&self, flash: &mut FormFlash, data: &mut Map<String, Value>) -> FormResult<()> {
		for (field, descriptors) in flash.files_by_field() {
			for descriptor in descriptors.iter().filter(|d| !d.moved) {
				let target = self.target(descriptor);
				let moved = flash.move_to_destination(&field, &descriptor.name, target.as_deref());

				let path = match moved {
					Ok(path) => path,
					Err(source) => {
						let destination = target.unwrap_or_else(|| descriptor.destination.clone());
						tracing::error!(
							uniqueid = %flash.uniqueid(),
							field = %field,
							filename = %descriptor.original_name,
							destination = %destination.display(),
							"unable to move staged file: {}",
							source
						);
						if let Err(e) = flash.save() {
							tracing::error!(uniqueid = %flash.uniqueid(), "unable to persist partial commit: {}", e);
						}
						return Err(FormError::UploadMoveFailed {
							filename: descriptor.original_name.clone(),
							destination,
							source,
						});
					}
				};

				merge(data, committed_entry(&field, descriptor, &path));
			}
		}

		let uniqueid = flash.uniqueid().to_string();
		flash
			.delete()
			.map_err(|source| FormError::StorageWriteFailed { uniqueid, source })
	}
}

/// `{field: {path: {name, type, size, path}}}` for a committed file.
fn committed_entry(field: &str, descriptor: &FileDescriptor, path: &Path) -> Map<String, Value> {
	let path = path.to_string_lossy().into_owned();
	let mut files = Map::new();
	files.insert(
		path.clone(),
		json!({
			"name": descriptor.name,
			"type": descriptor.mime_type,
			"size": descriptor.size,
			"path": path,
		}),
	);

	let mut entry = Map::new();
	entry.insert(field.to_string(), Value::Object(files));
	entry
}
