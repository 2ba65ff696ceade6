//! Local file system flash backend implementation.
//!
//! Layout under the base directory:
//!
//! ```text
//! <base_path>/<uniqueid>/index.json   persisted FlashRecord
//! <base_path>/<uniqueid>/<tmp files>  staged uploads
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::backend::validate_id;
use crate::config::LocalConfig;
use crate::{FlashBackend, FlashRecord, Result, StorageError};

const INDEX_FILE: &str = "index.json";

/// Local file system flash backend.
#[derive(Debug, Clone)]
pub struct LocalFlashBackend {
	base_path: PathBuf,
}

impl LocalFlashBackend {
	/// Create a new local flash backend.
	///
	/// # Arguments
	///
	/// * `config` - Local backend configuration
	///
	/// # Errors
	///
	/// Returns `` `StorageError::ConfigError` `` if the base path is missing
	/// and may not be created, or is not a directory.
	pub fn new(config: LocalConfig) -> Result<Self> {
		let base_path = config.base_path;

		if !base_path.exists() {
			if !config.create {
				return Err(StorageError::ConfigError(format!(
					"Base path does not exist: {}",
					base_path.display()
				)));
			}
			fs::create_dir_all(&base_path)?;
		}

		if !base_path.is_dir() {
			return Err(StorageError::ConfigError(format!(
				"Base path is not a directory: {}",
				base_path.display()
			)));
		}

		Ok(Self { base_path })
	}

	pub fn base_path(&self) -> &Path {
		&self.base_path
	}

	fn record_dir(&self, uniqueid: &str) -> Result<PathBuf> {
		validate_id(uniqueid)?;
		Ok(self.base_path.join(uniqueid))
	}

	fn index_path(&self, uniqueid: &str) -> Result<PathBuf> {
		Ok(self.record_dir(uniqueid)?.join(INDEX_FILE))
	}
}

impl FlashBackend for LocalFlashBackend {
	fn load(&self, uniqueid: &str) -> Result<Option<FlashRecord>> {
		let path = self.index_path(uniqueid)?;

		if !path.is_file() {
			return Ok(None);
		}

		let content = fs::read(&path)?;
		let record = serde_json::from_slice(&content)?;
		Ok(Some(record))
	}

	fn persist(&self, record: &FlashRecord) -> Result<()> {
		let dir = self.record_dir(&record.uniqueid)?;
		fs::create_dir_all(&dir)?;

		// Readers never observe a partially written index.
		let partial = dir.join(format!("{}.partial", INDEX_FILE));
		fs::write(&partial, serde_json::to_vec_pretty(record)?)?;
		fs::rename(&partial, dir.join(INDEX_FILE))?;

		Ok(())
	}

	fn remove(&self, uniqueid: &str) -> Result<()> {
		let dir = self.record_dir(uniqueid)?;

		if dir.exists() {
			fs::remove_dir_all(&dir)?;
		}

		Ok(())
	}

	fn tmp_dir(&self, uniqueid: &str) -> Result<PathBuf> {
		let dir = self.record_dir(uniqueid)?;
		fs::create_dir_all(&dir)?;
		Ok(dir)
	}

	fn exists(&self, uniqueid: &str) -> Result<bool> {
		Ok(self.index_path(uniqueid)?.is_file())
	}
}
