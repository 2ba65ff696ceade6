//! Factory function for creating flash stores.

use crate::{FlashConfig, FlashStore, Result};
use std::sync::Arc;

/// Create a flash store from configuration.
///
/// # Examples
///
/// ```rust,no_run
/// use formflash_storages::{FlashConfig, create_store};
///
/// # fn main() -> formflash_storages::Result<()> {
/// let store = create_store(FlashConfig::from_env()?)?;
/// let flash = store.open("k3J9x2")?;
/// assert!(!flash.exists());
/// # Ok(())
/// # }
/// ```
pub fn create_store(config: FlashConfig) -> Result<FlashStore> {
	match config {
		#[cfg(feature = "local")]
		FlashConfig::Local(local_config) => {
			let backend = crate::backends::local::LocalFlashBackend::new(local_config)?;
			tracing::debug!(
				base_path = %backend.base_path().display(),
				"created local flash store"
			);
			Ok(FlashStore::new(Arc::new(backend)))
		}
	}
}
