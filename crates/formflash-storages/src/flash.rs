//! Per-submission flash handle.
//!
//! [`FlashStore::open`] loads (or lazily creates) the record for a form's
//! `uniqueid` and returns a [`FormFlash`]. Mutations are kept in memory until
//! [`FormFlash::save`]; `save` and `delete` are the only points where the
//! record itself reaches durable storage. File operations touch the record's
//! temporary area immediately.

use crate::crop::crop_image;
use crate::record::{FieldFiles, LegacyQueue};
use crate::{
	CropRegion, FileDescriptor, FlashBackend, FlashRecord, PendingUpload, Result, StorageError,
};
use chrono::Utc;
use indexmap::IndexMap;
use rand::distributions::{Alphanumeric, DistString};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Length of the random part of staged file names.
const TMP_NAME_LENGTH: usize = 16;

/// Entry point to flash records.
#[derive(Clone)]
pub struct FlashStore {
	backend: Arc<dyn FlashBackend>,
}

impl FlashStore {
	pub fn new(backend: Arc<dyn FlashBackend>) -> Self {
		Self { backend }
	}

	/// Open the record for `uniqueid`.
	///
	/// Loads the persisted record when there is one; otherwise returns an
	/// empty record bound to `uniqueid` that is not persisted until
	/// [`FormFlash::save`].
	///
	/// # Errors
	///
	/// Returns `` `StorageError::InvalidId` `` if `uniqueid` is not a safe key.
	pub fn open(&self, uniqueid: &str) -> Result<FormFlash> {
		crate::backend::validate_id(uniqueid)?;

		let (record, exists) = match self.backend.load(uniqueid)? {
			Some(record) => (record, true),
			None => (FlashRecord::new(uniqueid), false),
		};

		Ok(FormFlash {
			backend: Arc::clone(&self.backend),
			record,
			exists,
		})
	}

	/// Whether a record was persisted for `uniqueid`.
	pub fn exists(&self, uniqueid: &str) -> Result<bool> {
		self.backend.exists(uniqueid)
	}

	pub fn backend(&self) -> &Arc<dyn FlashBackend> {
		&self.backend
	}
}

impl std::fmt::Debug for FlashStore {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("FlashStore").finish_non_exhaustive()
	}
}

/// An opened flash record.
pub struct FormFlash {
	backend: Arc<dyn FlashBackend>,
	record: FlashRecord,
	exists: bool,
}

impl FormFlash {
	pub fn uniqueid(&self) -> &str {
		&self.record.uniqueid
	}

	/// Whether the record was loaded from, or already saved to, storage.
	pub fn exists(&self) -> bool {
		self.exists
	}

	pub fn record(&self) -> &FlashRecord {
		&self.record
	}

	pub fn url(&self) -> Option<&str> {
		self.record.url.as_deref()
	}

	pub fn set_url(&mut self, url: impl Into<String>) -> &mut Self {
		self.record.url = Some(url.into());
		self
	}

	pub fn user(&self) -> Option<&str> {
		self.record.user.as_deref()
	}

	pub fn set_user(&mut self, user: Option<String>) -> &mut Self {
		self.record.user = user;
		self
	}

	/// Partial form data staged for multi-step forms.
	pub fn data(&self) -> Option<&Map<String, Value>> {
		self.record.data.as_ref()
	}

	pub fn set_data(&mut self, data: Map<String, Value>) {
		self.record.data = Some(data);
	}

	/// Directory holding this record's staged files.
	pub fn tmp_dir(&self) -> Result<PathBuf> {
		self.backend.tmp_dir(&self.record.uniqueid)
	}

	/// Stage `upload` under `field`.
	///
	/// The request's temporary file is moved into the record's temporary
	/// area. A file already staged under the same field and filename is
	/// replaced.
	///
	/// # Errors
	///
	/// Returns `` `StorageError::MoveFailed` `` if the source cannot be moved
	/// into the staging area. The record is left unchanged.
	pub fn stage_upload(&mut self, field: &str, upload: PendingUpload) -> Result<&FileDescriptor> {
		let target = self.staging_path(&upload)?;
		move_file(&upload.source, &target)?;
		self.register(field, upload, target, None)
	}

	/// Crop the image in `upload` to `crop`, then stage the result under
	/// `field`.
	///
	/// # Errors
	///
	/// Returns `` `StorageError::InvalidCrop` `` for bad geometry,
	/// `` `StorageError::Image` `` when the source is not an image, and
	/// `` `StorageError::Io` `` when the staged copy cannot be written. The
	/// record is left unchanged in every case.
	pub fn stage_crop(
		&mut self,
		field: &str,
		upload: PendingUpload,
		crop: CropRegion,
	) -> Result<&FileDescriptor> {
		let target = self.staging_path(&upload)?;
		crop_image(&upload.source, &target, &crop)?;

		if let Err(e) = fs::remove_file(&upload.source) {
			tracing::debug!(
				source = %upload.source.display(),
				"could not remove crop source: {}",
				e
			);
		}

		self.register(field, upload, target, Some(crop))
	}

	/// Remove a staged file and its descriptor.
	///
	/// Removing a file that is not staged is a no-op.
	pub fn remove_file(&mut self, filename: &str, field: &str) -> Result<()> {
		let Some(files) = self.record.files.get_mut(field) else {
			return Ok(());
		};
		let Some(descriptor) = files.shift_remove(filename) else {
			return Ok(());
		};
		if files.is_empty() {
			self.record.files.shift_remove(field);
		}

		if !descriptor.moved && descriptor.storage_path.exists() {
			fs::remove_file(&descriptor.storage_path)?;
		}

		tracing::info!(
			uniqueid = %self.record.uniqueid,
			field,
			filename,
			"removed staged file"
		);
		Ok(())
	}

	pub fn file(&self, field: &str, filename: &str) -> Option<&FileDescriptor> {
		self.record.files.get(field)?.get(filename)
	}

	/// Snapshot of staged descriptors grouped by field, in staging order.
	pub fn files_by_field(&self) -> IndexMap<String, Vec<FileDescriptor>> {
		self.record
			.files
			.iter()
			.map(|(field, files)| (field.clone(), files.values().cloned().collect()))
			.collect()
	}

	/// Move a staged file to its destination and mark it moved.
	///
	/// `destination` overrides the path recorded at upload time.
	///
	/// # Errors
	///
	/// Returns `` `StorageError::NotStaged` `` for an unknown file,
	/// `` `StorageError::AlreadyMoved` `` if the descriptor was moved before,
	/// and `` `StorageError::MoveFailed` `` if the filesystem move fails.
	pub fn move_to_destination(
		&mut self,
		field: &str,
		filename: &str,
		destination: Option<&Path>,
	) -> Result<PathBuf> {
		let descriptor = self
			.record
			.files
			.get_mut(field)
			.and_then(|files| files.get_mut(filename))
			.ok_or_else(|| StorageError::NotStaged {
				field: field.to_string(),
				filename: filename.to_string(),
			})?;

		if descriptor.moved {
			return Err(StorageError::AlreadyMoved(filename.to_string()));
		}

		let target = destination
			.map(Path::to_path_buf)
			.unwrap_or_else(|| descriptor.destination.clone());

		if let Some(parent) = target.parent() {
			fs::create_dir_all(parent).map_err(|source| StorageError::MoveFailed {
				from: descriptor.storage_path.clone(),
				to: target.clone(),
				source,
			})?;
		}
		move_file(&descriptor.storage_path, &target)?;

		descriptor.destination = target.clone();
		descriptor.moved = true;
		self.record.updated_at = Utc::now();

		tracing::info!(
			uniqueid = %self.record.uniqueid,
			field,
			filename,
			destination = %target.display(),
			"moved staged file"
		);
		Ok(target)
	}

	/// Uploads queued through the deprecated raw temp-path mechanism.
	pub fn legacy_files(&self) -> &LegacyQueue {
		&self.record.legacy
	}

	pub fn set_legacy_files(&mut self, queue: LegacyQueue) {
		self.record.legacy = queue;
	}

	/// Persist the record.
	pub fn save(&mut self) -> Result<()> {
		self.record.updated_at = Utc::now();
		self.backend.persist(&self.record)?;
		self.exists = true;

		tracing::debug!(uniqueid = %self.record.uniqueid, "saved flash record");
		Ok(())
	}

	/// Remove the record and every file left in its temporary area.
	///
	/// The handle is reset to an empty, unsaved record for the same
	/// `uniqueid`.
	pub fn delete(&mut self) -> Result<()> {
		self.backend.remove(&self.record.uniqueid)?;
		self.record = FlashRecord::new(self.record.uniqueid.clone());
		self.exists = false;

		tracing::info!(uniqueid = %self.record.uniqueid, "deleted flash record");
		Ok(())
	}

	fn staging_path(&self, upload: &PendingUpload) -> Result<PathBuf> {
		let mut name = Alphanumeric.sample_string(&mut rand::thread_rng(), TMP_NAME_LENGTH);
		if let Some(ext) = upload.extension() {
			name.push('.');
			name.push_str(&ext);
		}
		Ok(self.tmp_dir()?.join(name))
	}

	fn register(
		&mut self,
		field: &str,
		upload: PendingUpload,
		storage_path: PathBuf,
		crop: Option<CropRegion>,
	) -> Result<&FileDescriptor> {
		let size = fs::metadata(&storage_path)
			.map(|m| m.len())
			.unwrap_or(upload.size);

		let descriptor = FileDescriptor {
			field: field.to_string(),
			name: upload.filename.clone(),
			original_name: upload.original_name,
			storage_path,
			destination: upload.destination,
			size,
			mime_type: upload.mime_type,
			crop,
			moved: false,
			uploaded_at: Utc::now(),
		};

		let files: &mut FieldFiles = self.record.files.entry(field.to_string()).or_default();
		if let Some(previous) = files.shift_remove(&upload.filename)
			&& !previous.moved
			&& previous.storage_path != descriptor.storage_path
		{
			fs::remove_file(&previous.storage_path).ok();
		}
		files.insert(upload.filename.clone(), descriptor);
		self.record.updated_at = Utc::now();

		tracing::info!(
			uniqueid = %self.record.uniqueid,
			field,
			filename = %upload.filename,
			"staged upload"
		);

		Ok(&files[upload.filename.as_str()])
	}
}

/// Move `from` to `to`, copying across filesystems when a rename is not
/// possible.
pub fn move_file(from: &Path, to: &Path) -> Result<()> {
	let failed = |source| StorageError::MoveFailed {
		from: from.to_path_buf(),
		to: to.to_path_buf(),
		source,
	};

	if fs::rename(from, to).is_ok() {
		return Ok(());
	}

	fs::copy(from, to).map_err(failed)?;
	fs::remove_file(from).map_err(failed)?;
	Ok(())
}
