//! Error types for flash storage.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for flash storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Flash storage errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
	/// Underlying filesystem failure.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// The persisted record could not be encoded or decoded.
	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	/// Invalid backend configuration.
	#[error("Configuration error: {0}")]
	ConfigError(String),

	/// The correlation id cannot be used as a storage key.
	#[error("invalid flash id: {0:?}")]
	InvalidId(String),

	/// Crop geometry does not describe a region inside the source image.
	#[error("invalid crop region: {0}")]
	InvalidCrop(String),

	/// The source file could not be decoded or re-encoded as an image.
	#[error("image error: {0}")]
	Image(String),

	/// No staged file under the given field and filename.
	#[error("file not staged: {field}/{filename}")]
	NotStaged {
		/// Field key.
		field: String,
		/// Final filename.
		filename: String,
	},

	/// A descriptor was asked to move a second time.
	#[error("file already moved: {0}")]
	AlreadyMoved(String),

	/// Moving a file between the staging area and its destination failed.
	#[error("unable to move {} to {}: {source}", from.display(), to.display())]
	MoveFailed {
		/// Source path.
		from: PathBuf,
		/// Destination path.
		to: PathBuf,
		/// Underlying failure.
		#[source]
		source: std::io::Error,
	},
}

impl StorageError {
	/// Whether the failure is caused by caller input rather than by storage.
	pub fn is_input_error(&self) -> bool {
		matches!(self, StorageError::InvalidCrop(_) | StorageError::InvalidId(_))
	}
}
