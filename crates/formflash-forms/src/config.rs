//! Global upload policy and form settings.

use crate::{FormError, FormResult};
use rand::distributions::{Alphanumeric, DistString};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Bytes per megabyte, as used by `filesize` settings.
pub const BYTES_PER_MB: u64 = 1024 * 1024;

/// Default upload policy applied to every file field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
	/// Destination token of uploaded files.
	pub destination: String,
	pub avoid_overwriting: bool,
	pub random_name: bool,
	/// MIME patterns (`image/*`) or filename suffixes (`.pdf`).
	pub accept: Vec<String>,
	/// Maximum number of files per field.
	pub limit: u32,
	/// Per-file size limit in megabytes, 0 to only apply the system ceiling.
	pub filesize: f64,
	/// Whether suffix patterns in `accept` match case-sensitively.
	pub case_sensitive_extensions: bool,
	/// Extensions never accepted, whatever `accept` says.
	pub dangerous_extensions: Vec<String>,
}

impl Default for FilesConfig {
	fn default() -> Self {
		Self {
			destination: "self@".to_string(),
			avoid_overwriting: false,
			random_name: false,
			accept: vec!["image/*".to_string()],
			limit: 10,
			filesize: 0.0,
			case_sensitive_extensions: true,
			dangerous_extensions: [
				"php", "php3", "php4", "php5", "phar", "phtml", "html", "htm", "shtml", "js",
			]
			.iter()
			.map(|e| e.to_string())
			.collect(),
		}
	}
}

/// Form pipeline configuration.
///
/// Every field has a default, so a partial TOML document is valid.
///
/// # Examples
///
/// ```
/// use formflash_forms::FormsConfig;
///
/// let config = FormsConfig::from_toml_str(r#"
/// system_upload_limit = 2097152
///
/// [files]
/// accept = [".pdf"]
/// filesize = 1
/// "#).unwrap();
///
/// assert_eq!(config.files.accept, vec![".pdf"]);
/// assert_eq!(config.files.destination, "self@");
/// assert_eq!(config.nonce_lifetime_secs, 43200);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormsConfig {
	/// System-wide upload ceiling in bytes, 0 for none.
	pub system_upload_limit: u64,
	/// HMAC key of anti-forgery tokens.
	pub nonce_secret: String,
	/// Length of one nonce tick in seconds.
	pub nonce_lifetime_secs: u64,
	/// Base directory of relative upload destinations.
	pub root_dir: PathBuf,
	pub files: FilesConfig,
}

impl Default for FormsConfig {
	fn default() -> Self {
		Self {
			system_upload_limit: 8 * BYTES_PER_MB,
			nonce_secret: Alphanumeric.sample_string(&mut rand::thread_rng(), 32),
			nonce_lifetime_secs: 43200,
			root_dir: PathBuf::from("."),
			files: FilesConfig::default(),
		}
	}
}

impl FormsConfig {
	/// Parse a TOML document.
	pub fn from_toml_str(contents: &str) -> FormResult<Self> {
		toml::from_str(contents)
			.map_err(|e| FormError::Config(format!("TOML parse error: {}", e)))
	}

	/// Load settings from a TOML file
	pub fn from_file(path: impl AsRef<Path>) -> FormResult<Self> {
		let path = path.as_ref();
		let contents = std::fs::read_to_string(path).map_err(|e| {
			FormError::Config(format!("Failed to read {}: {}", path.display(), e))
		})?;
		Self::from_toml_str(&contents)
	}
}

/// Source of global upload policy.
pub trait ConfigProvider: Send + Sync {
	/// Upload defaults applied before per-field settings.
	fn files(&self) -> &FilesConfig;

	/// System-wide upload ceiling in bytes, 0 for none.
	fn system_upload_limit(&self) -> u64;

	/// Base directory of relative upload destinations.
	fn root_dir(&self) -> &Path;
}

impl ConfigProvider for FormsConfig {
	fn files(&self) -> &FilesConfig {
		&self.files
	}

	fn system_upload_limit(&self) -> u64 {
		self.system_upload_limit
	}

	fn root_dir(&self) -> &Path {
		&self.root_dir
	}
}

/// Effective per-file size limit in bytes, 0 for unlimited.
///
/// `min(configured, ceiling)` when a limit is configured, otherwise the
/// ceiling alone. A ceiling of 0 therefore makes every upload unlimited.
///
/// # Examples
///
/// ```
/// use formflash_forms::config::{BYTES_PER_MB, FormsConfig, max_filesize};
///
/// let mut config = FormsConfig::default();
/// config.system_upload_limit = 4 * BYTES_PER_MB;
///
/// config.files.filesize = 1.0;
/// assert_eq!(max_filesize(&config), BYTES_PER_MB);
///
/// config.files.filesize = 0.0;
/// assert_eq!(max_filesize(&config), 4 * BYTES_PER_MB);
///
/// config.files.filesize = 16.0;
/// assert_eq!(max_filesize(&config), 4 * BYTES_PER_MB);
/// ```
pub fn max_filesize(provider: &dyn ConfigProvider) -> u64 {
	let plugin = megabytes_to_bytes(provider.files().filesize);
	let system = provider.system_upload_limit();

	if plugin > 0 {
		plugin.min(system)
	} else {
		system
	}
}

/// Convert a megabyte setting to bytes. Negative and non-finite values
/// become 0.
pub fn megabytes_to_bytes(megabytes: f64) -> u64 {
	if !megabytes.is_finite() || megabytes <= 0.0 {
		return 0;
	}
	(megabytes * BYTES_PER_MB as f64) as u64
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use rstest::rstest;
	use tempfile::TempDir;

	#[rstest]
	fn test_defaults() {
		let config = FormsConfig::default();
		assert_eq!(config.files.destination, "self@");
		assert_eq!(config.files.accept, vec!["image/*"]);
		assert_eq!(config.files.limit, 10);
		assert!(config.files.case_sensitive_extensions);
		assert_eq!(config.nonce_secret.len(), 32);
	}

	#[rstest]
	fn test_from_file() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("forms.toml");
		std::fs::write(
			&path,
			"nonce_secret = \"s3cret\"\n[files]\nrandom_name = true\n",
		)
		.unwrap();

		let config = FormsConfig::from_file(&path).unwrap();
		assert_eq!(config.nonce_secret, "s3cret");
		assert!(config.files.random_name);
		assert!(!config.files.avoid_overwriting);
	}

	#[rstest]
	fn test_plugin_limit_is_lifted_by_unlimited_system_ceiling() {
		let mut config = FormsConfig::default();
		config.system_upload_limit = 0;
		config.files.filesize = 1.0;

		assert_eq!(max_filesize(&config), 0);
	}

	#[rstest]
	fn test_invalid_toml() {
		let err = FormsConfig::from_toml_str("files = 3").unwrap_err();
		assert!(matches!(err, FormError::Config(_)));
	}

	#[rstest]
	#[case(-1.0, 0)]
	#[case(f64::NAN, 0)]
	#[case(0.5, BYTES_PER_MB / 2)]
	fn test_megabytes_to_bytes(#[case] mb: f64, #[case] expected: u64) {
		assert_eq!(megabytes_to_bytes(mb), expected);
	}

	proptest! {
		#[test]
		fn prop_ceiling_is_min_when_plugin_set(plugin_mb in 1u64..512, system in 0u64..(1u64 << 32)) {
			let mut config = FormsConfig::default();
			config.files.filesize = plugin_mb as f64;
			config.system_upload_limit = system;

			prop_assert_eq!(max_filesize(&config), (plugin_mb * BYTES_PER_MB).min(system));
		}

		#[test]
		fn prop_ceiling_is_system_when_plugin_zero(system in 0u64..(1u64 << 32)) {
			let mut config = FormsConfig::default();
			config.files.filesize = 0.0;
			config.system_upload_limit = system;

			prop_assert_eq!(max_filesize(&config), system);
		}
	}
}
