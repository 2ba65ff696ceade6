//! Error types for the form pipeline.

use crate::i18n::{Translator, keys};
use crate::upload::{Rejection, UploadErrorCode};
use formflash_storages::StorageError;
use indexmap::IndexMap;
use std::path::PathBuf;

/// Result type for form operations.
pub type FormResult<T> = Result<T, FormError>;

/// Every condition the form pipeline reports.
///
/// Only [`UploadMoveFailed`](FormError::UploadMoveFailed) and
/// [`StorageWriteFailed`](FormError::StorageWriteFailed) are fatal. The
/// other variants are turned into a status or an ajax reply by the form and
/// leave prior state intact.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum FormError {
	#[error("upload of {filename:?} failed: {code}")]
	UploadTransport {
		filename: String,
		code: UploadErrorCode,
	},

	#[error("unsafe filename: {0:?}")]
	UnsafeFilename(String),

	#[error("upload destination not specified or not resolvable: {0:?}")]
	NoDestination(String),

	#[error("file type not accepted for {filename:?}")]
	TypeNotAccepted {
		filename: String,
		rejections: Vec<Rejection>,
	},

	#[error("{filename:?} is {size} bytes, limit is {limit}")]
	FilesizeExceeded {
		filename: String,
		size: u64,
		limit: u64,
	},

	#[error("anti-forgery token missing or invalid")]
	NonceInvalid,

	#[error("validation failed: {message}")]
	SchemaValidationFailed {
		message: String,
		messages: IndexMap<String, Vec<String>>,
	},

	#[error("invalid crop: {0}")]
	InvalidCrop(String),

	#[error("malformed payload: {0}")]
	MalformedPayload(String),

	#[error("unable to move {filename:?} to {}", destination.display())]
	UploadMoveFailed {
		filename: String,
		destination: PathBuf,
		#[source]
		source: StorageError,
	},

	#[error("unable to persist flash record {uniqueid}")]
	StorageWriteFailed {
		uniqueid: String,
		#[source]
		source: StorageError,
	},

	#[error("configuration error: {0}")]
	Config(String),

	#[error(transparent)]
	Storage(#[from] StorageError),
}

impl FormError {
	/// Whether the condition must propagate to the caller.
	///
	/// # Examples
	///
	/// ```
	/// use formflash_forms::FormError;
	///
	/// assert!(!FormError::NonceInvalid.is_fatal());
	/// assert!(!FormError::UnsafeFilename("a.php".into()).is_fatal());
	/// ```
	pub fn is_fatal(&self) -> bool {
		matches!(
			self,
			FormError::UploadMoveFailed { .. } | FormError::StorageWriteFailed { .. }
		)
	}

	/// Message key of the localization catalog describing this error.
	pub fn message_key(&self) -> &'static str {
		match self {
			FormError::UploadTransport { .. } | FormError::UnsafeFilename(_) => {
				keys::FILEUPLOAD_UNABLE_TO_UPLOAD
			}
			FormError::NoDestination(_) => keys::DESTINATION_NOT_SPECIFIED,
			FormError::TypeNotAccepted { rejections, .. } => match rejections.first() {
				Some(Rejection::Mime { .. }) => keys::INVALID_MIME_TYPE,
				_ => keys::INVALID_FILE_EXTENSION,
			},
			FormError::FilesizeExceeded { .. } => keys::EXCEEDED_GRAV_FILESIZE_LIMIT,
			FormError::NonceInvalid => keys::NONCE_NOT_VALIDATED,
			FormError::InvalidCrop(_) => keys::INVALID_CROP,
			FormError::MalformedPayload(_) => keys::MALFORMED_PAYLOAD,
			FormError::SchemaValidationFailed { .. }
			| FormError::Config(_)
			| FormError::Storage(_) => keys::FILEUPLOAD_UNABLE_TO_UPLOAD,
			FormError::UploadMoveFailed { .. } | FormError::StorageWriteFailed { .. } => {
				keys::FILEUPLOAD_UNABLE_TO_MOVE
			}
		}
	}

	/// User-facing message for ajax replies and form status.
	pub fn localized(&self, translator: &dyn Translator) -> String {
		match self {
			FormError::UploadTransport { filename, code } => translator.translate(
				keys::FILEUPLOAD_UNABLE_TO_UPLOAD,
				&[filename.as_str(), code.description()],
			),
			FormError::UnsafeFilename(filename) => translator.translate(
				keys::FILEUPLOAD_UNABLE_TO_UPLOAD,
				&[
					filename.as_str(),
					translator.translate(keys::FILEUPLOAD_BAD_FILENAME, &[]).as_str(),
				],
			),
			FormError::NoDestination(_) => {
				translator.translate(keys::DESTINATION_NOT_SPECIFIED, &[])
			}
			FormError::TypeNotAccepted { rejections, .. } => rejections
				.iter()
				.map(|r| r.localized(translator))
				.collect::<Vec<_>>()
				.join("<br/>"),
			FormError::FilesizeExceeded { .. } => {
				translator.translate(keys::EXCEEDED_GRAV_FILESIZE_LIMIT, &[])
			}
			FormError::NonceInvalid => translator.translate(keys::NONCE_NOT_VALIDATED, &[]),
			FormError::InvalidCrop(reason) => {
				translator.translate(keys::INVALID_CROP, &[reason.as_str()])
			}
			FormError::MalformedPayload(reason) => {
				translator.translate(keys::MALFORMED_PAYLOAD, &[reason.as_str()])
			}
			FormError::SchemaValidationFailed { message, .. } => message.clone(),
			FormError::UploadMoveFailed {
				filename,
				destination,
				..
			} => translator.translate(
				keys::FILEUPLOAD_UNABLE_TO_MOVE,
				&[
					format!("\"{}\"", filename).as_str(),
					destination.display().to_string().as_str(),
				],
			),
			FormError::StorageWriteFailed { uniqueid, .. } => {
				translator.translate(keys::FILEUPLOAD_UNABLE_TO_MOVE, &["", uniqueid.as_str()])
			}
			FormError::Config(reason) => reason.clone(),
			FormError::Storage(e) => e.to_string(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::i18n::MessageCatalog;
	use rstest::rstest;

	#[rstest]
	fn test_only_move_and_write_failures_are_fatal() {
		let move_failed = FormError::UploadMoveFailed {
			filename: "a.png".to_string(),
			destination: PathBuf::from("/srv/a.png"),
			source: StorageError::AlreadyMoved("a.png".to_string()),
		};
		let write_failed = FormError::StorageWriteFailed {
			uniqueid: "abc".to_string(),
			source: StorageError::ConfigError("x".to_string()),
		};

		assert!(move_failed.is_fatal());
		assert!(write_failed.is_fatal());
		assert!(!FormError::Storage(StorageError::InvalidId("..".to_string())).is_fatal());
		assert!(!FormError::MalformedPayload("eof".to_string()).is_fatal());
	}

	#[rstest]
	#[case(
		Rejection::Mime {
			mime: "application/x-msdownload".to_string(),
			filename: "setup.exe".to_string(),
			pattern: "image/*".to_string(),
		},
		keys::INVALID_MIME_TYPE
	)]
	#[case(
		Rejection::Extension {
			filename: "setup.exe".to_string(),
			pattern: ".png".to_string(),
		},
		keys::INVALID_FILE_EXTENSION
	)]
	fn test_type_not_accepted_key_follows_first_rejection(
		#[case] first: Rejection,
		#[case] expected: &str,
	) {
		let err = FormError::TypeNotAccepted {
			filename: "setup.exe".to_string(),
			rejections: vec![
				first,
				Rejection::Extension {
					filename: "setup.exe".to_string(),
					pattern: ".jpg".to_string(),
				},
			],
		};
		assert_eq!(err.message_key(), expected);
	}

	#[rstest]
	fn test_transport_error_message() {
		let catalog = MessageCatalog::english();
		let err = FormError::UploadTransport {
			filename: "cv.pdf".to_string(),
			code: UploadErrorCode::Partial,
		};

		assert_eq!(
			err.localized(&catalog),
			"Unable to upload file cv.pdf: The uploaded file was only partially uploaded"
		);
	}

	#[rstest]
	fn test_unsafe_filename_message() {
		let catalog = MessageCatalog::english();
		let err = FormError::UnsafeFilename("x.php".to_string());
		assert_eq!(
			err.localized(&catalog),
			"Unable to upload file x.php: Bad filename"
		);
	}
}
