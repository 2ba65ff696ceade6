//! Collaborators injected into every form.

use crate::blueprint::{BasicBlueprintFactory, BlueprintFactory};
use crate::config::{ConfigProvider, FormsConfig};
use crate::hooks::HookRegistry;
use crate::i18n::{MessageCatalog, Translator};
use crate::nonce::{HmacNonce, NonceVerifier};
use crate::request::{Anonymous, IdentityProvider};
use crate::schema::FieldTypeRegistry;
use crate::upload::UploadValidator;
use formflash_storages::FlashStore;
use std::sync::Arc;

/// Shared services of the form pipeline.
///
/// Cloning is cheap; every service is reference counted.
///
/// # Examples
///
/// ```
/// use formflash_forms::{FormServices, FormsConfig};
/// use formflash_forms::hooks::HookRegistry;
/// use formflash_storages::{FlashConfig, create_store};
///
/// let dir = tempfile::tempdir().unwrap();
/// let flash = create_store(FlashConfig::local(dir.path())).unwrap();
///
/// let services = FormServices::new(FormsConfig::default(), flash)
///     .with_hooks(HookRegistry::new());
/// assert!(services.hooks.is_empty());
/// ```
#[derive(Clone)]
pub struct FormServices {
	pub config: Arc<dyn ConfigProvider>,
	pub translator: Arc<dyn Translator>,
	pub identity: Arc<dyn IdentityProvider>,
	pub hooks: Arc<HookRegistry>,
	pub flash: FlashStore,
	pub nonce: Arc<dyn NonceVerifier>,
	pub blueprints: Arc<dyn BlueprintFactory>,
	pub field_types: Arc<FieldTypeRegistry>,
	pub validator: UploadValidator,
}

impl FormServices {
	/// Services with English messages, anonymous identity, no hooks and the
	/// built-in blueprint.
	pub fn new(config: FormsConfig, flash: FlashStore) -> Self {
		let nonce = HmacNonce::new(config.nonce_secret.as_bytes(), config.nonce_lifetime_secs);
		let validator = UploadValidator::from_config(&config.files);
		Self {
			config: Arc::new(config),
			translator: Arc::new(MessageCatalog::english()),
			identity: Arc::new(Anonymous),
			hooks: Arc::new(HookRegistry::new()),
			flash,
			nonce: Arc::new(nonce),
			blueprints: Arc::new(BasicBlueprintFactory),
			field_types: Arc::new(FieldTypeRegistry::new()),
			validator,
		}
	}

	/// Replace the configuration provider. The upload validator keeps the
	/// filename policy it was built with.
	pub fn with_config(mut self, config: Arc<dyn ConfigProvider>) -> Self {
		self.validator = UploadValidator::from_config(config.files());
		self.config = config;
		self
	}

	pub fn with_translator(mut self, translator: impl Translator + 'static) -> Self {
		self.translator = Arc::new(translator);
		self
	}

	pub fn with_identity(mut self, identity: impl IdentityProvider + 'static) -> Self {
		self.identity = Arc::new(identity);
		self
	}

	pub fn with_hooks(mut self, hooks: HookRegistry) -> Self {
		self.hooks = Arc::new(hooks);
		self
	}

	pub fn with_nonce(mut self, nonce: impl NonceVerifier + 'static) -> Self {
		self.nonce = Arc::new(nonce);
		self
	}

	pub fn with_blueprints(mut self, blueprints: impl BlueprintFactory + 'static) -> Self {
		self.blueprints = Arc::new(blueprints);
		self
	}

	pub fn with_field_types(mut self, field_types: FieldTypeRegistry) -> Self {
		self.field_types = Arc::new(field_types);
		self
	}
}

impl std::fmt::Debug for FormServices {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("FormServices")
			.field("flash", &self.flash)
			.field("hooks", &self.hooks)
			.field("validator", &self.validator)
			.finish_non_exhaustive()
	}
}
