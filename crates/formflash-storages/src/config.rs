//! Configuration types for flash storage backends.

use crate::{Result, StorageError};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Environment variable naming the flash storage backend.
pub const BACKEND_ENV: &str = "FORMFLASH_FLASH_BACKEND";

/// Environment variable naming the base directory of the local backend.
pub const LOCAL_PATH_ENV: &str = "FORMFLASH_FLASH_PATH";

/// Flash backend type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendType {
	/// Local file system
	Local,
}

impl std::fmt::Display for BackendType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			BackendType::Local => write!(f, "Local"),
		}
	}
}

impl FromStr for BackendType {
	type Err = StorageError;

	fn from_str(s: &str) -> Result<Self> {
		match s.to_lowercase().as_str() {
			"local" => Ok(BackendType::Local),
			_ => Err(StorageError::ConfigError(format!(
				"Invalid backend type: {}",
				s
			))),
		}
	}
}

/// Configuration for the local file system backend.
#[cfg(feature = "local")]
#[derive(Debug, Clone)]
pub struct LocalConfig {
	/// Directory holding one sub-directory per flash record
	pub base_path: PathBuf,
	/// Create `base_path` when it does not exist yet
	pub create: bool,
}

#[cfg(feature = "local")]
impl LocalConfig {
	pub fn new(base_path: impl Into<PathBuf>) -> Self {
		Self {
			base_path: base_path.into(),
			create: true,
		}
	}
}

/// Flash storage configuration.
#[derive(Debug, Clone)]
pub enum FlashConfig {
	#[cfg(feature = "local")]
	Local(LocalConfig),
}

impl FlashConfig {
	/// Local backend rooted at `base_path`.
	#[cfg(feature = "local")]
	pub fn local(base_path: impl Into<PathBuf>) -> Self {
		FlashConfig::Local(LocalConfig::new(base_path))
	}

	/// Load configuration from environment variables.
	///
	/// # Environment Variables
	///
	/// - `FORMFLASH_FLASH_BACKEND`: Backend type (`"local"`, the default)
	/// - `FORMFLASH_FLASH_PATH`: Base directory of the local backend (required)
	pub fn from_env() -> Result<Self> {
		let backend_type = env::var(BACKEND_ENV)
			.unwrap_or_else(|_| "local".to_string())
			.parse::<BackendType>()?;

		match backend_type {
			#[cfg(feature = "local")]
			BackendType::Local => {
				let base_path = env::var(LOCAL_PATH_ENV).map_err(|_| {
					StorageError::ConfigError(format!(
						"{} environment variable not set",
						LOCAL_PATH_ENV
					))
				})?;

				Ok(FlashConfig::local(base_path))
			}
			#[allow(unreachable_patterns)]
			_ => Err(StorageError::ConfigError(format!(
				"Backend type not enabled: {:?}",
				backend_type
			))),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case("local", BackendType::Local)]
	#[case("LOCAL", BackendType::Local)]
	fn test_backend_type_parse(#[case] input: &str, #[case] expected: BackendType) {
		assert_eq!(input.parse::<BackendType>().unwrap(), expected);
	}

	#[rstest]
	fn test_backend_type_parse_unknown() {
		let err = "s3".parse::<BackendType>().unwrap_err();
		assert!(matches!(err, StorageError::ConfigError(_)));
	}

	#[rstest]
	fn test_local_config_defaults_to_create() {
		let FlashConfig::Local(config) = FlashConfig::local("/tmp/flash");
		assert!(config.create);
		assert_eq!(config.base_path, PathBuf::from("/tmp/flash"));
	}
}
