//! Deprecated commit path for uploads queued by temporary path.
//!
//! Older integrations queue uploads as `{field: {destination: upload}}`
//! with the raw temporary file in `tmp_name`. When the
//! `on_form_store_uploads` hooks leave the queue untouched, the entries are
//! only recorded in the form data. When a hook rewrote it, the files are
//! renamed to their queued destinations and the flash record is deleted.

use crate::commit::UploadCommitter;
use crate::normalize::merge;
use crate::{FormError, FormResult};
use formflash_storages::{FormFlash, LegacyQueue, LegacyUpload, StorageError};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// Suffix of the metadata file written next to a queued temporary file.
const SIDECAR_SUFFIX: &str = ".yaml";

/// Compatibility adapter committing a legacy upload queue.
#[deprecated(note = "stage uploads through the flash store and commit them with `CommitStage`")]
#[derive(Debug, Clone)]
pub struct LegacyUploadAdapter {
	original: LegacyQueue,
	queue: LegacyQueue,
}

#[allow(deprecated)]
impl LegacyUploadAdapter {
	/// `original` is the queue stored in the flash record, `queue` the one
	/// returned by the hooks.
	pub fn new(original: LegacyQueue, queue: LegacyQueue) -> Self {
		Self { original, queue }
	}

	pub fn is_modified(&self) -> bool {
		self.queue != self.original
	}

	fn rename_queued(&self, destination: &str, upload: &LegacyUpload) -> FormResult<()> {
		let Some(tmp) = &upload.tmp_name else {
			return Ok(());
		};

		fs::rename(tmp, destination).map_err(|source| FormError::UploadMoveFailed {
			filename: tmp.display().to_string(),
			destination: PathBuf::from(destination),
			source: StorageError::MoveFailed {
				from: tmp.clone(),
				to: PathBuf::from(destination),
				source,
			},
		})?;

		let sidecar = sidecar_path(tmp);
		if sidecar.exists()
			&& let Err(e) = fs::remove_file(&sidecar)
		{
			tracing::debug!(sidecar = %sidecar.display(), "could not remove sidecar: {}", e);
		}
		Ok(())
	}
}

#[allow(deprecated)]
impl UploadCommitter for LegacyUploadAdapter {
	fn commit(&self, flash: &mut FormFlash, data: &mut Map<String, Value>) -> FormResult<()> {
		if self.queue.is_empty() && self.original.is_empty() {
			return Ok(());
		}

		let modified = self.is_modified();
		tracing::warn!(
			uniqueid = %flash.uniqueid(),
			modified,
			"legacy upload queue is deprecated, stage uploads through the flash store"
		);

		for (field, files) in &self.queue {
			let mut entries = Map::new();
			for (destination, upload) in files {
				if modified {
					if let Err(e) = self.rename_queued(destination, upload) {
						tracing::error!(field = %field, destination = %destination, "legacy upload move failed: {}", e);
						return Err(e);
					}
				}

				let mut committed = upload.clone();
				committed.tmp_name = None;
				let value = serde_json::to_value(committed).map_err(StorageError::from)?;
				entries.insert(destination.clone(), value);
			}

			let mut entry = Map::new();
			entry.insert(field.clone(), Value::Object(entries));
			merge(data, entry);
		}

		if modified {
			let uniqueid = flash.uniqueid().to_string();
			flash
				.delete()
				.map_err(|source| FormError::StorageWriteFailed { uniqueid, source })?;
		}
		Ok(())
	}
}

fn sidecar_path(tmp: &Path) -> PathBuf {
	let mut path = tmp.as_os_str().to_os_string();
	path.push(SIDECAR_SUFFIX);
	PathBuf::from(path)
}
