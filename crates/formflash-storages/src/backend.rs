//! Flash backend trait definition.

use crate::{FlashRecord, Result};
use std::path::PathBuf;

/// Durable storage for flash records and their temporary file areas.
///
/// Every record is addressed by the form's `uniqueid`. Backends apply
/// last-write-wins semantics on [`persist`](FlashBackend::persist): there is
/// no optimistic concurrency check, so two requests saving the same record
/// race and the later write survives.
///
/// # Examples
///
/// ```rust,no_run
/// use formflash_storages::{FlashBackend, FlashRecord, Result};
///
/// fn example(backend: &dyn FlashBackend) -> Result<()> {
///     let record = backend
///         .load("f9Xk2")?
///         .unwrap_or_else(|| FlashRecord::new("f9Xk2"));
///     backend.persist(&record)?;
///     Ok(())
/// }
/// ```
pub trait FlashBackend: Send + Sync {
	/// Load the record stored for `uniqueid`.
	///
	/// Returns `Ok(None)` when nothing was persisted yet.
	///
	/// # Errors
	///
	/// Returns `` `StorageError::InvalidId` `` if `uniqueid` is not a safe key.
	/// Returns `` `StorageError::Serialization` `` if the stored record is corrupt.
	fn load(&self, uniqueid: &str) -> Result<Option<FlashRecord>>;

	/// Persist `record`, replacing any previous version.
	///
	/// # Errors
	///
	/// Returns `` `StorageError::Io` `` if the record cannot be written.
	fn persist(&self, record: &FlashRecord) -> Result<()>;

	/// Remove the record and its whole temporary area.
	///
	/// Removing a record that does not exist is not an error.
	fn remove(&self, uniqueid: &str) -> Result<()>;

	/// Directory holding staged files for `uniqueid`, created on demand.
	fn tmp_dir(&self, uniqueid: &str) -> Result<PathBuf>;

	/// Whether a record was persisted for `uniqueid`.
	fn exists(&self, uniqueid: &str) -> Result<bool> {
		Ok(self.load(uniqueid)?.is_some())
	}
}

/// Check that `uniqueid` can be used as a storage key.
///
/// Accepts 1 to 128 ASCII letters, digits, `-` and `_`.
///
/// # Examples
///
/// ```
/// use formflash_storages::backend::validate_id;
///
/// assert!(validate_id("k3J9-x_2").is_ok());
/// assert!(validate_id("../etc").is_err());
/// assert!(validate_id("").is_err());
/// ```
pub fn validate_id(uniqueid: &str) -> Result<()> {
	let valid = !uniqueid.is_empty()
		&& uniqueid.len() <= 128
		&& uniqueid
			.chars()
			.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

	if valid {
		Ok(())
	} else {
		Err(crate::StorageError::InvalidId(uniqueid.to_string()))
	}
}
