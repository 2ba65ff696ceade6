//! Localization of reply messages.

use std::collections::HashMap;

/// Message keys used by the form pipeline.
pub mod keys {
	pub const NONCE_NOT_VALIDATED: &str = "NONCE_NOT_VALIDATED";
	pub const FILEUPLOAD_UNABLE_TO_UPLOAD: &str = "FILEUPLOAD_UNABLE_TO_UPLOAD";
	pub const FILEUPLOAD_UNABLE_TO_MOVE: &str = "FILEUPLOAD_UNABLE_TO_MOVE";
	pub const FILEUPLOAD_BAD_FILENAME: &str = "FILEUPLOAD_BAD_FILENAME";
	pub const DESTINATION_NOT_SPECIFIED: &str = "DESTINATION_NOT_SPECIFIED";
	pub const INVALID_MIME_TYPE: &str = "INVALID_MIME_TYPE";
	pub const INVALID_FILE_EXTENSION: &str = "INVALID_FILE_EXTENSION";
	pub const EXCEEDED_GRAV_FILESIZE_LIMIT: &str = "EXCEEDED_GRAV_FILESIZE_LIMIT";
	pub const INVALID_CROP: &str = "INVALID_CROP";
	pub const MALFORMED_PAYLOAD: &str = "MALFORMED_PAYLOAD";
}

/// Maps message keys and positional parameters to user-facing strings.
pub trait Translator: Send + Sync {
	/// Translate `key`, filling each `%s` placeholder with the next entry of
	/// `args`.
	fn translate(&self, key: &str, args: &[&str]) -> String;
}

/// In-memory message catalog for one locale.
///
/// Unknown keys translate to the key itself.
///
/// # Example
/// ```
/// use formflash_forms::i18n::{MessageCatalog, Translator};
///
/// let mut catalog = MessageCatalog::new("de");
/// catalog.add_translation("DESTINATION_NOT_SPECIFIED", "Kein Ziel angegeben");
///
/// assert_eq!(catalog.translate("DESTINATION_NOT_SPECIFIED", &[]), "Kein Ziel angegeben");
/// assert_eq!(catalog.translate("UNKNOWN", &[]), "UNKNOWN");
/// ```
#[derive(Debug, Clone)]
pub struct MessageCatalog {
	locale: String,
	messages: HashMap<String, String>,
}

impl MessageCatalog {
	/// Create an empty catalog for the given locale
	pub fn new(locale: &str) -> Self {
		Self {
			locale: locale.to_string(),
			messages: HashMap::new(),
		}
	}

	/// Catalog with the built-in English messages.
	pub fn english() -> Self {
		let mut catalog = Self::new("en");
		for (key, message) in [
			(
				keys::NONCE_NOT_VALIDATED,
				"Oops there was a problem, please check your input and submit the form again.",
			),
			(keys::FILEUPLOAD_UNABLE_TO_UPLOAD, "Unable to upload file %s: %s"),
			(keys::FILEUPLOAD_UNABLE_TO_MOVE, "Unable to move file %s to \"%s\""),
			(keys::FILEUPLOAD_BAD_FILENAME, "Bad filename"),
			(keys::DESTINATION_NOT_SPECIFIED, "Destination not specified"),
			(
				keys::INVALID_MIME_TYPE,
				"The MIME type %s for the file %s is not accepted (expected %s)",
			),
			(
				keys::INVALID_FILE_EXTENSION,
				"Invalid file extension for %s (expected %s)",
			),
			(
				keys::EXCEEDED_GRAV_FILESIZE_LIMIT,
				"The file exceeds the maximum allowed upload size",
			),
			(keys::INVALID_CROP, "Invalid crop region: %s"),
			(keys::MALFORMED_PAYLOAD, "Submitted data could not be decoded: %s"),
		] {
			catalog.add_translation(key, message);
		}
		catalog
	}

	/// Get the locale for this catalog
	pub fn locale(&self) -> &str {
		&self.locale
	}

	/// Add a simple translation
	pub fn add_translation(&mut self, message: impl Into<String>, translation: impl Into<String>) {
		self.messages.insert(message.into(), translation.into());
	}

	/// Get a translation
	pub fn get(&self, message: &str) -> Option<&String> {
		self.messages.get(message)
	}
}

impl Default for MessageCatalog {
	fn default() -> Self {
		Self::english()
	}
}

impl Translator for MessageCatalog {
	fn translate(&self, key: &str, args: &[&str]) -> String {
		let template = self.get(key).map(String::as_str).unwrap_or(key);
		fill_placeholders(template, args)
	}
}

/// Replace `%s` placeholders in order. Missing arguments become empty.
fn fill_placeholders(template: &str, args: &[&str]) -> String {
	let mut out = String::with_capacity(template.len());
	let mut args = args.iter();
	let mut parts = template.split("%s");

	if let Some(first) = parts.next() {
		out.push_str(first);
	}
	for part in parts {
		out.push_str(args.next().copied().unwrap_or_default());
		out.push_str(part);
	}
	out
}
