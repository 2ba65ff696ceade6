//! Per-field upload settings resolution.
//!
//! Settings are resolved in increasing precedence from the global upload
//! defaults, the field's schema properties, and finally the
//! `on_form_upload_settings` hooks. The result is always fully populated.

use crate::config::{ConfigProvider, max_filesize, megabytes_to_bytes};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Resolved upload policy for one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadSettings {
	/// Field name the upload belongs to.
	pub name: String,
	/// Destination token.
	pub destination: String,
	pub avoid_overwriting: bool,
	pub random_name: bool,
	pub accept: Vec<String>,
	pub limit: u32,
	/// Per-file size limit in bytes, 0 for unlimited.
	pub filesize: u64,
}

impl UploadSettings {
	/// Global defaults for `name`.
	pub fn defaults(name: &str, config: &dyn ConfigProvider) -> Self {
		let files = config.files();
		Self {
			name: name.to_string(),
			destination: files.destination.clone(),
			avoid_overwriting: files.avoid_overwriting,
			random_name: files.random_name,
			accept: files.accept.clone(),
			limit: files.limit,
			filesize: max_filesize(config),
		}
	}

	/// Apply schema properties of the field over the current values.
	///
	/// Values of the wrong type are ignored. `filesize` is given in
	/// megabytes, `accept` may be a single pattern or a list.
	///
	/// # Examples
	///
	/// ```
	/// use formflash_forms::{FormsConfig, UploadSettings};
	/// use serde_json::json;
	///
	/// let config = FormsConfig::default();
	/// let mut settings = UploadSettings::defaults("avatar", &config);
	/// settings.apply_properties(json!({
	///     "accept": ".pdf",
	///     "random_name": "yes",
	///     "filesize": 2,
	/// }).as_object().unwrap());
	///
	/// assert_eq!(settings.accept, vec![".pdf"]);
	/// assert!(!settings.random_name);
	/// assert_eq!(settings.filesize, 2 * 1024 * 1024);
	/// ```
	pub fn apply_properties(&mut self, properties: &Map<String, Value>) {
		for (key, value) in properties {
			let applied = match key.as_str() {
				"destination" => value.as_str().map(|v| self.destination = v.to_string()),
				"avoid_overwriting" => value.as_bool().map(|v| self.avoid_overwriting = v),
				"random_name" => value.as_bool().map(|v| self.random_name = v),
				"limit" => value
					.as_u64()
					.and_then(|v| u32::try_from(v).ok())
					.map(|v| self.limit = v),
				"filesize" => value
					.as_f64()
					.map(|v| self.filesize = megabytes_to_bytes(v)),
				"accept" => accept_patterns(value).map(|v| self.accept = v),
				_ => Some(()),
			};

			if applied.is_none() {
				tracing::warn!(
					field = %self.name,
					setting = %key,
					value = %value,
					"ignoring upload setting of unexpected type"
				);
			}
		}
	}
}

fn accept_patterns(value: &Value) -> Option<Vec<String>> {
	match value {
		Value::String(pattern) => Some(vec![pattern.clone()]),
		Value::Array(items) => items
			.iter()
			.map(|item| item.as_str().map(str::to_string))
			.collect(),
		_ => None,
	}
}
