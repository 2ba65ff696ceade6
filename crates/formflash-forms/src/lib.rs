//! Form submission pipeline with staged multi-request uploads.
//!
//! This crate binds a page's declared form to submitted request data:
//!
//! - Field normalization of submitted payloads (`_json` sub-payloads,
//!   percent-encoded keys, positional fields, checkbox coercion)
//! - Upload validation (transport codes, filename safety, accepted types,
//!   size limits)
//! - Ajax upload, crop and removal handlers staging files in a flash record
//! - Schema validation and filtering through a pluggable [`Blueprint`]
//! - Extension hooks at every lifecycle phase
//! - Commit of staged uploads to their final destinations
//!
//! ## Example
//!
//! ```
//! use formflash_forms::{Form, FormServices, FormsConfig};
//! use formflash_forms::definition::FormDefinition;
//! use formflash_forms::page::StaticPage;
//! use formflash_forms::request::FormRequest;
//! use formflash_storages::{FlashConfig, create_store};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let flash = create_store(FlashConfig::local(dir.path().join("flash"))).unwrap();
//! let services = FormServices::new(FormsConfig::default(), flash);
//!
//! let page = StaticPage::new("/contact", dir.path().join("pages/contact")).with_form(
//!     "contact",
//!     FormDefinition::new().with_fields(json!({"email": {"validate": {"required": true}}})),
//! );
//! let mut form = Form::new(Arc::new(page), None, services);
//!
//! let request = FormRequest::new("/contact")
//!     .with_field(form.nonce_name(), json!(form.nonce()))
//!     .with_field("data", json!({"email": "me@example.com"}));
//! let submission = form.post(&request).unwrap();
//!
//! assert_eq!(submission.status, formflash_forms::FormStatus::Success);
//! assert_eq!(form.data()["email"], "me@example.com");
//! ```
//!
//! [`Blueprint`]: blueprint::Blueprint

pub mod blueprint;
pub mod commit;
pub mod config;
pub mod definition;
pub mod error;
pub mod form;
pub mod hooks;
pub mod i18n;
pub mod legacy;
pub mod nonce;
pub mod normalize;
pub mod page;
pub mod reply;
pub mod request;
pub mod schema;
pub mod services;
pub mod settings;
pub mod upload;

pub use blueprint::{BasicBlueprint, Blueprint, BlueprintFactory, ValidationErrors};
pub use commit::{CommitStage, UploadCommitter};
pub use config::{ConfigProvider, FilesConfig, FormsConfig, max_filesize};
pub use definition::FormDefinition;
pub use error::{FormError, FormResult};
pub use form::{Form, FormSnapshot, FormState, FormStatus, Submission};
pub use hooks::{FormHook, HookRegistry, HookResult, Redirect, ValidationFailure};
pub use i18n::{MessageCatalog, Translator};
pub use nonce::{HmacNonce, NonceVerifier};
pub use page::{Page, StaticPage};
pub use reply::AjaxResponse;
pub use request::{FormRequest, IdentityProvider, RequestContext};
pub use services::FormServices;
pub use settings::UploadSettings;
pub use upload::{UploadErrorCode, UploadValidator, UploadedFile};
