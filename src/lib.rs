//! # formflash
//!
//! Form submission and staged file upload pipeline.
//!
//! A page declares one or more forms. Each form binds submitted request data
//! to its field schema, validates uploads as they arrive over AJAX, stages
//! them in a per-submission flash record, and moves them to their final
//! destinations once the whole form has been posted.
//!
//! ## Crates
//!
//! - [`forms`]: the form pipeline, upload validation and extension hooks
//! - [`storages`]: the flash staging store
//!
//! ## Feature Flags
//!
//! - `local` (default) - file system flash backend
//!
//! ## Quick Example
//!
//! ```
//! use formflash::prelude::*;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let flash = create_store(FlashConfig::local(dir.path().join("flash"))).unwrap();
//! let services = FormServices::new(FormsConfig::default(), flash);
//!
//! let page = StaticPage::new("/newsletter", dir.path().join("pages/newsletter"))
//!     .with_form("newsletter", FormDefinition::new().with_fields(json!({"email": {}})));
//! let mut form = Form::new(Arc::new(page), None, services);
//!
//! let request = FormRequest::new("/newsletter")
//!     .with_field(form.nonce_name(), json!(form.nonce()))
//!     .with_field("data", json!({"email": "  me@example.com "}));
//! form.post(&request).unwrap();
//!
//! assert_eq!(form.data()["email"], "me@example.com");
//! ```

pub use formflash_forms as forms;
pub use formflash_storages as storages;

pub use formflash_forms::{
	AjaxResponse, Form, FormDefinition, FormError, FormHook, FormRequest, FormResult, FormServices,
	FormStatus, FormsConfig, HookRegistry, HookResult, Page, StaticPage, Submission, UploadedFile,
};
pub use formflash_storages::{FlashConfig, FlashStore, StorageError, create_store};

/// Prelude module for convenient imports
///
/// ```
/// use formflash::prelude::*;
/// ```
pub mod prelude {
	// Pipeline
	pub use formflash_forms::{
		AjaxResponse, Form, FormDefinition, FormError, FormRequest, FormResult, FormServices,
		FormSnapshot, FormState, FormStatus, FormsConfig, Page, RequestContext, StaticPage,
		Submission, UploadSettings, UploadedFile,
	};

	// Extension points
	pub use formflash_forms::{
		Blueprint, BlueprintFactory, ConfigProvider, FormHook, HookRegistry, HookResult,
		IdentityProvider, NonceVerifier, Redirect, Translator, UploadCommitter, ValidationFailure,
	};

	// Staging
	pub use formflash_storages::{
		CropRegion, FlashConfig, FlashStore, FormFlash, StorageError, create_store,
	};
}
