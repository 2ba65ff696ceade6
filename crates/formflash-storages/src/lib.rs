//! # formflash-storages
//!
//! Flash staging storage for multi-request form submissions.
//!
//! Files uploaded through AJAX before the final form post are staged in a
//! per-submission *flash record*, keyed by the form's `uniqueid`. On the
//! final post every staged file is moved to its destination and the record
//! is deleted.
//!
//! ## Features
//!
//! - **Pluggable backends**: records live behind the `` `FlashBackend` `` trait
//! - **Crop on stage**: images can be cropped before they are staged
//! - **Feature Flags**: `local` enables the file system backend (default)
//!
//! ## Example
//!
//! ```rust,no_run
//! use formflash_storages::{FlashConfig, PendingUpload, create_store};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = create_store(FlashConfig::local("/var/tmp/flash"))?;
//!
//!     let mut flash = store.open("f9Xk2LmQ0aZ")?;
//!     flash.stage_upload(
//!         "avatar",
//!         PendingUpload::new("me.png", "/tmp/php9Xa", "/srv/uploads/me.png"),
//!     )?;
//!     flash.save()?;
//!
//!     flash.move_to_destination("avatar", "me.png", None)?;
//!     flash.delete()?;
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod backends;
pub mod config;
pub mod crop;
pub mod error;
pub mod factory;
pub mod flash;
pub mod record;

pub use backend::FlashBackend;
pub use config::FlashConfig;
#[cfg(feature = "local")]
pub use config::LocalConfig;
pub use crop::{PixelRect, crop_image};
pub use error::{Result, StorageError};
pub use factory::create_store;
pub use flash::{FlashStore, FormFlash, move_file};
pub use record::{
	CropRegion, FieldFiles, FileDescriptor, FlashRecord, LegacyQueue, LegacyUpload, PendingUpload,
};
