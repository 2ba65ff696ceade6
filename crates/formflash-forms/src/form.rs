//! The form entity and its submission pipeline.
//!
//! A [`Form`] lives for one request. It is built from a page, loads any
//! staged data for its `uniqueid`, and then handles exactly one of:
//!
//! - [`Form::post`]: the final submission (validate, process, commit)
//! - [`Form::upload_files`]: an ajax upload into the flash store
//! - [`Form::files_session_remove`]: an ajax removal of a staged file
//! - [`Form::store_state`]: an ajax save of partial data
//!
//! Recoverable failures end up in the form status or in the ajax reply.
//! Only fatal failures are returned as `Err`.

use crate::blueprint::Blueprint;
use crate::commit::{CommitStage, UploadCommitter};
use crate::definition::FormDefinition;
use crate::hooks::{Redirect, ValidationFailure};
use crate::i18n::keys;
use crate::normalize::{self, get_path, set_path};
use crate::page::{Destinations, Page};
use crate::reply::AjaxResponse;
use crate::request::RequestContext;
use crate::schema::{FieldSchema, process_fields};
use crate::services::FormServices;
use crate::settings::UploadSettings;
use crate::{FormError, FormResult};
use convert_case::{Case, Casing};
use formflash_storages::backend::validate_id;
use formflash_storages::{CropRegion, FormFlash, PendingUpload, StorageError};
use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use rand::distributions::{Alphanumeric, DistString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;

#[allow(deprecated)]
use crate::legacy::LegacyUploadAdapter;

/// POST key overriding the form name for one request.
pub const FORM_NAME_KEY: &str = "__form-name__";

/// POST key carrying the correlation id of a multi-request submission.
pub const UNIQUE_ID_KEY: &str = "__unique_form_id__";

/// Length of generated `uniqueid`s.
pub const UNIQUE_ID_LENGTH: usize = 20;

/// Ajax task staging a cropped image.
pub const CROP_UPLOAD_TASK: &str = "cropupload";

/// Outcome of the last pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormStatus {
	#[default]
	Success,
	Error,
}

/// Lifecycle position of a form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FormState {
	#[default]
	Initialized,
	Populated,
	Validated,
	Processed,
	Committed,
}

/// Result of [`Form::post`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
	pub status: FormStatus,
	/// Redirect requested by a process action, to perform after commit.
	pub redirect: Option<Redirect>,
}

/// Serialized state of a form, for session continuity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormSnapshot {
	/// Route of the page the form belongs to.
	pub page: String,
	pub definition: FormDefinition,
	pub status: FormStatus,
	pub message: Option<String>,
	pub errors: Vec<String>,
	pub header_data: Map<String, Value>,
	pub rules: Map<String, Value>,
	pub data: Map<String, Value>,
	pub values: Map<String, Value>,
}

/// One form bound to a page.
pub struct Form {
	services: FormServices,
	page: Arc<dyn Page>,
	definition: FormDefinition,
	name: String,
	id: String,
	uniqueid: String,
	rules: Map<String, Value>,
	header_data: Map<String, Value>,
	fields: IndexMap<String, FieldSchema>,
	data: Map<String, Value>,
	values: Map<String, Value>,
	errors: Vec<String>,
	status: FormStatus,
	message: Option<String>,
	response_code: Option<u16>,
	state: FormState,
	blueprint: OnceCell<Arc<dyn Blueprint>>,
	commit: CommitStage,
}

impl Form {
	/// Form `name` of `page`, or the page's first form when `name` is
	/// `None`. An unknown name yields an empty definition.
	pub fn new(page: Arc<dyn Page>, name: Option<&str>, services: FormServices) -> Self {
		let (key, definition) = match name {
			Some(name) => (
				Some(name.to_string()),
				page.forms().get(name).cloned().unwrap_or_default(),
			),
			None => match page.forms().first() {
				Some((key, definition)) => (Some(key.clone()), definition.clone()),
				None => (None, FormDefinition::default()),
			},
		};
		Self::build(page, key, definition, services)
	}

	/// Form built from an explicit definition.
	pub fn with_definition(
		page: Arc<dyn Page>,
		name: Option<&str>,
		definition: FormDefinition,
		services: FormServices,
	) -> Self {
		Self::build(page, name.map(str::to_string), definition, services)
	}

	fn build(
		page: Arc<dyn Page>,
		key: Option<String>,
		mut definition: FormDefinition,
		services: FormServices,
	) -> Self {
		let mut rules = page.rules().clone();
		for (rule, value) in &definition.rules {
			if !rules.contains_key(rule) {
				rules.insert(rule.clone(), value.clone());
			}
		}

		let name = match key {
			Some(key) if !key.is_empty() && key.parse::<i64>().is_err() => key,
			_ => match definition.name.as_deref() {
				Some(name) if !name.is_empty() => name.to_string(),
				_ => page.slug().to_string(),
			},
		};
		let id = match definition.id.as_deref() {
			Some(id) if !id.is_empty() => id.to_string(),
			_ => name.to_case(Case::Kebab),
		};
		let uniqueid = declared_uniqueid(definition.uniqueid.as_deref());
		definition.name = Some(name.clone());
		definition.id = Some(id.clone());
		definition.uniqueid = Some(uniqueid.clone());

		let fields = process_fields(&definition.fields, &services.field_types);
		let header_data = page.header_data().clone();

		let mut form = Self {
			services,
			page,
			definition,
			name,
			id,
			uniqueid,
			rules,
			data: Map::new(),
			header_data,
			fields,
			values: Map::new(),
			errors: Vec::new(),
			status: FormStatus::Success,
			message: None,
			response_code: None,
			state: FormState::Initialized,
			blueprint: OnceCell::new(),
			commit: CommitStage::new(),
		};
		form.data = form.staged_data().unwrap_or_else(|| form.header_data.clone());

		tracing::debug!(form = %form.name, uniqueid = %form.uniqueid, "form initialized");
		let hooks = Arc::clone(&form.services.hooks);
		hooks.initialized(&mut form);
		form
	}

	/// Data saved in the flash store by an earlier request, if any.
	fn staged_data(&self) -> Option<Map<String, Value>> {
		match self.services.flash.open(&self.uniqueid) {
			Ok(flash) if flash.exists() => Some(flash.data().cloned().unwrap_or_default()),
			Ok(_) => None,
			Err(e) => {
				tracing::warn!(uniqueid = %self.uniqueid, "unable to load flash record: {}", e);
				None
			}
		}
	}

	/// Rebuild a form from a snapshot. No hook is fired.
	pub fn restore(page: Arc<dyn Page>, snapshot: FormSnapshot, services: FormServices) -> Self {
		let FormSnapshot {
			mut definition,
			status,
			message,
			errors,
			header_data,
			rules,
			data,
			values,
			..
		} = snapshot;

		let name = definition.name.clone().unwrap_or_else(|| page.slug().to_string());
		let id = definition
			.id
			.clone()
			.unwrap_or_else(|| name.to_case(Case::Kebab));
		let uniqueid = declared_uniqueid(definition.uniqueid.as_deref());
		definition.uniqueid = Some(uniqueid.clone());
		let fields = process_fields(&definition.fields, &services.field_types);

		Self {
			services,
			page,
			definition,
			name,
			id,
			uniqueid,
			rules,
			header_data,
			fields,
			data,
			values,
			errors,
			status,
			message,
			response_code: None,
			state: FormState::Initialized,
			blueprint: OnceCell::new(),
			commit: CommitStage::new(),
		}
	}

	pub fn snapshot(&self) -> FormSnapshot {
		FormSnapshot {
			page: self.page.route().to_string(),
			definition: self.definition.clone(),
			status: self.status,
			message: self.message.clone(),
			errors: self.errors.clone(),
			header_data: self.header_data.clone(),
			rules: self.rules.clone(),
			data: self.data.clone(),
			values: self.values.clone(),
		}
	}

	/// Back to the page defaults, dropping the cached blueprint.
	pub fn reset(&mut self) {
		self.blueprint = OnceCell::new();
		self.data = self.header_data.clone();
		self.values = Map::new();
		self.errors.clear();
		self.status = FormStatus::Success;
		self.message = None;
		self.response_code = None;
		self.transition(FormState::Initialized);

		let hooks = Arc::clone(&self.services.hooks);
		hooks.initialized(self);
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn id(&self) -> &str {
		&self.id
	}

	pub fn uniqueid(&self) -> &str {
		&self.uniqueid
	}

	pub fn page(&self) -> &Arc<dyn Page> {
		&self.page
	}

	pub fn definition(&self) -> &FormDefinition {
		&self.definition
	}

	pub fn services(&self) -> &FormServices {
		&self.services
	}

	/// Processed field declarations.
	pub fn fields(&self) -> &IndexMap<String, FieldSchema> {
		&self.fields
	}

	/// Replace the declared fields. The cached blueprint is dropped.
	pub fn set_fields(&mut self, fields: Value) {
		self.fields = process_fields(&fields, &self.services.field_types);
		self.definition.fields = fields;
		self.blueprint = OnceCell::new();
		tracing::debug!(form = %self.name, fields = self.fields.len(), "fields replaced");
	}

	pub fn rules(&self) -> &Map<String, Value> {
		&self.rules
	}

	/// Blueprint of the current fields, built on first use.
	pub fn blueprint(&self) -> Arc<dyn Blueprint> {
		Arc::clone(self.blueprint.get_or_init(|| {
			self.services
				.blueprints
				.build(&self.name, self.fields.clone(), &self.rules)
		}))
	}

	/// Working data set.
	pub fn data(&self) -> &Map<String, Value> {
		&self.data
	}

	/// Working value at the `/`-separated `name`, falling back to the raw
	/// submitted values when `fallback` is set.
	pub fn value(&self, name: &str, fallback: bool) -> Option<&Value> {
		get_path(&self.data, name).or_else(|| {
			if fallback {
				get_path(&self.values, name)
			} else {
				None
			}
		})
	}

	/// Raw submitted values of the last request.
	pub fn values(&self) -> &Map<String, Value> {
		&self.values
	}

	pub fn set_value(&mut self, name: &str, value: Value) {
		if !name.is_empty() {
			set_path(&mut self.values, name, value);
		}
	}

	/// Set one working value. Returns `false` for an empty name.
	pub fn set_data(&mut self, name: &str, value: Value) -> bool {
		if name.is_empty() {
			return false;
		}
		set_path(&mut self.data, name, value);
		true
	}

	pub fn set_all_data(&mut self, data: Map<String, Value>) {
		self.data = data;
	}

	pub fn errors(&self) -> &[String] {
		&self.errors
	}

	pub fn status(&self) -> FormStatus {
		self.status
	}

	pub fn set_status(&mut self, status: FormStatus) {
		self.status = status;
	}

	pub fn message(&self) -> Option<&str> {
		self.message.as_deref()
	}

	pub fn set_message(&mut self, message: impl Into<String>) {
		self.message = Some(message.into());
	}

	pub fn response_code(&self) -> Option<u16> {
		self.response_code
	}

	pub fn set_response_code(&mut self, code: u16) {
		self.response_code = Some(code);
	}

	pub fn state(&self) -> FormState {
		self.state
	}

	/// Fresh anti-forgery token for this form's action.
	pub fn nonce(&self) -> String {
		self.services.nonce.create(&self.definition.nonce.action)
	}

	pub fn nonce_name(&self) -> &str {
		&self.definition.nonce.name
	}

	pub fn nonce_action(&self) -> &str {
		&self.definition.nonce.action
	}

	/// Commit uploads of `field` into `directory` instead of their resolved
	/// destination.
	pub fn set_commit_destination(&mut self, field: impl Into<String>, directory: impl Into<PathBuf>) {
		self.commit = std::mem::take(&mut self.commit).with_destination(field, directory);
	}

	/// Flash record of this form's `uniqueid`.
	pub fn flash(&self) -> FormResult<FormFlash> {
		Ok(self.services.flash.open(&self.uniqueid)?)
	}

	/// Handle the final submission.
	///
	/// # Errors
	///
	/// Returns `` `FormError::UploadMoveFailed` `` or
	/// `` `FormError::StorageWriteFailed` `` when committing uploads fails,
	/// and `` `FormError::Storage` `` when the flash record cannot be read.
	/// Every other failure sets the status and returns `Ok`.
	pub fn post(&mut self, request: &dyn RequestContext) -> FormResult<Submission> {
		let post = request.post();
		self.status = FormStatus::Success;
		self.message = None;
		self.errors.clear();

		let decoded = match normalize::decode(post.get("data").unwrap_or(&Value::Null)) {
			Ok(decoded) => decoded,
			Err(e) => return Ok(self.reject(&e, None)),
		};
		self.apply_correlation(post);

		let mut values = post.clone();
		values.insert("data".to_string(), Value::Object(decoded.clone()));
		self.values = values;

		if !self.verify_nonce(post) {
			return Ok(self.reject(&FormError::NonceInvalid, Some(keys::NONCE_NOT_VALIDATED)));
		}

		let submitted = if decoded.is_empty() {
			self.submitted_fields(post)
		} else {
			decoded
		};
		let reconciled = normalize::reconcile(&self.fields, submitted);
		normalize::merge(&mut self.data, reconciled);
		self.transition(FormState::Populated);

		if self.run_validation() {
			return Ok(self.submission(None));
		}

		self.commit_legacy_uploads(post)?;
		let redirect = self.run_process_actions();
		self.commit_uploads()?;

		Ok(self.submission(redirect))
	}

	fn submission(&self, redirect: Option<Redirect>) -> Submission {
		Submission {
			status: self.status,
			redirect,
		}
	}

	/// POST entries other than the nonce and correlation keys.
	fn submitted_fields(&self, post: &Map<String, Value>) -> Map<String, Value> {
		post.iter()
			.filter(|(key, _)| {
				key.as_str() != self.nonce_name() && key.as_str() != FORM_NAME_KEY && key.as_str() != UNIQUE_ID_KEY
			})
			.map(|(key, value)| (key.clone(), value.clone()))
			.collect()
	}

	/// Record a recoverable failure and fire the validation error hooks.
	fn reject(&mut self, error: &FormError, code: Option<&'static str>) -> Submission {
		let message = error.localized(self.services.translator.as_ref());
		tracing::warn!(form = %self.name, uniqueid = %self.uniqueid, "submission rejected: {}", error);

		self.status = FormStatus::Error;
		self.message = Some(message.clone());
		self.transition(FormState::Validated);

		let failure = ValidationFailure {
			code: code.or(Some(error.message_key())),
			message,
			messages: IndexMap::new(),
		};
		let hooks = Arc::clone(&self.services.hooks);
		hooks.validation_error(self, &failure);
		self.submission(None)
	}

	/// Validate and filter the working data. Returns `true` when a hook
	/// halted the pipeline.
	fn run_validation(&mut self) -> bool {
		let hooks = Arc::clone(&self.services.hooks);
		hooks.prepare_validation(self);

		let blueprint = self.blueprint();
		match blueprint.validate(&self.data) {
			Ok(()) => {
				blueprint.filter(&mut self.data);
				self.transition(FormState::Validated);
				hooks.validation_processed(self);
				false
			}
			Err(errors) => {
				self.status = FormStatus::Error;
				self.message = Some(errors.message.clone());
				self.errors = errors.messages.values().flatten().cloned().collect();
				self.transition(FormState::Validated);
				tracing::debug!(form = %self.name, errors = self.errors.len(), "validation failed");

				let failure = ValidationFailure {
					code: None,
					message: errors.message,
					messages: errors.messages,
				};
				hooks.validation_error(self, &failure).is_stop()
			}
		}
	}

	#[allow(deprecated)]
	fn commit_legacy_uploads(&mut self, post: &Map<String, Value>) -> FormResult<()> {
		let mut flash = self.flash()?;
		let original = flash.legacy_files().clone();
		if original.is_empty() {
			return Ok(());
		}

		let mut queue = original.clone();
		let hooks = Arc::clone(&self.services.hooks);
		hooks.store_uploads(self, &mut queue, post);

		LegacyUploadAdapter::new(original, queue).commit(&mut flash, &mut self.data)
	}

	fn run_process_actions(&mut self) -> Option<Redirect> {
		let hooks = Arc::clone(&self.services.hooks);
		let mut redirect = None;

		for (action, params) in self.definition.process_actions() {
			let outcome = hooks.processed(self, &action, &params);
			let stop = outcome.is_stop();
			if let Some(requested) = outcome.into_inner() {
				redirect = Some(requested);
			}
			if stop {
				tracing::debug!(form = %self.name, action = %action, "process actions stopped");
				break;
			}
		}

		self.transition(FormState::Processed);
		redirect
	}

	fn commit_uploads(&mut self) -> FormResult<()> {
		let mut flash = self.flash()?;
		self.commit.commit(&mut flash, &mut self.data)?;
		self.transition(FormState::Committed);
		Ok(())
	}

	/// Handle an ajax upload.
	///
	/// Returns `None` when the request names no field or carries no file
	/// for it.
	///
	/// # Errors
	///
	/// Returns `` `FormError::UploadMoveFailed` `` when the file cannot be
	/// moved into the staging area and `` `FormError::StorageWriteFailed` ``
	/// when the flash record cannot be saved.
	pub fn upload_files(&mut self, request: &dyn RequestContext) -> FormResult<Option<AjaxResponse>> {
		let post = request.post();
		let Some(field) = post.get("name").and_then(Value::as_str) else {
			return Ok(None);
		};
		let Some(file) = request.file(field) else {
			return Ok(None);
		};

		self.apply_correlation(post);
		if !self.verify_nonce(post) {
			return Ok(Some(self.error_reply(&FormError::NonceInvalid)));
		}

		let settings = self.upload_settings(field, post);
		let filename = post
			.get("filename")
			.and_then(Value::as_str)
			.unwrap_or(file.name.as_str())
			.to_string();

		let root = self.services.config.root_dir().to_path_buf();
		let destinations = Destinations::new(self.page.as_ref(), &root);
		let accepted = match self
			.services
			.validator
			.validate(file, &filename, &settings, &destinations)
		{
			Ok(accepted) => accepted,
			Err(e) => return Ok(Some(self.error_reply(&e))),
		};

		let mut flash = self.flash()?;
		flash
			.set_url(request.url())
			.set_user(self.services.identity.current_user());

		let upload = PendingUpload::new(accepted.filename.clone(), file.tmp_path.clone(), accepted.path.clone())
			.with_original_name(filename.clone())
			.with_size(file.size)
			.with_mime_type(accepted.mime_type.clone());

		let staged = if post.get("task").and_then(Value::as_str) == Some(CROP_UPLOAD_TASK) {
			let crop = match parse_crop(post.get("crop")) {
				Ok(crop) => crop,
				Err(e) => return Ok(Some(self.error_reply(&e))),
			};
			flash.stage_crop(&settings.name, upload, crop).map(|_| ())
		} else {
			flash.stage_upload(&settings.name, upload).map(|_| ())
		};

		match staged {
			Ok(()) => {}
			Err(e @ (StorageError::InvalidCrop(_) | StorageError::Image(_))) => {
				return Ok(Some(self.error_reply(&FormError::InvalidCrop(e.to_string()))));
			}
			Err(source) => {
				tracing::error!(uniqueid = %self.uniqueid, filename = %filename, "unable to stage upload: {}", source);
				return Err(FormError::UploadMoveFailed {
					filename,
					destination: flash.tmp_dir().unwrap_or_default(),
					source,
				});
			}
		}

		self.save_flash(&mut flash)?;
		tracing::info!(
			uniqueid = %self.uniqueid,
			field = %settings.name,
			filename = %accepted.filename,
			"upload staged"
		);

		Ok(Some(AjaxResponse::upload_success(
			request.url(),
			&accepted.path.to_string_lossy(),
			&settings.name,
			&self.uniqueid,
		)))
	}

	/// Settings of `field`: global defaults, then the field's schema
	/// properties, then the hooks.
	fn upload_settings(&self, field: &str, post: &Map<String, Value>) -> UploadSettings {
		let mut settings = UploadSettings::defaults(field, self.services.config.as_ref());
		if let Some(properties) = self.blueprint().property(field) {
			settings.apply_properties(&properties);
		}
		self.services.hooks.upload_settings(&mut settings, post);
		settings
	}

	/// Handle an ajax removal of a staged file.
	///
	/// Returns `None` when the request lacks the field name or filename.
	pub fn files_session_remove(&mut self, request: &dyn RequestContext) -> FormResult<Option<AjaxResponse>> {
		let post = request.post();
		let (Some(field), Some(filename)) = (
			post.get("name").and_then(Value::as_str),
			post.get("filename").and_then(Value::as_str),
		) else {
			return Ok(None);
		};

		self.apply_correlation(post);
		if !self.verify_nonce(post) {
			return Ok(Some(self.error_reply(&FormError::NonceInvalid)));
		}

		let mut flash = self.flash()?;
		flash
			.remove_file(filename, field)
			.map_err(|source| FormError::StorageWriteFailed {
				uniqueid: self.uniqueid.clone(),
				source,
			})?;
		self.save_flash(&mut flash)?;

		Ok(Some(AjaxResponse::success()))
	}

	/// Handle an ajax save of partial data, without validation.
	pub fn store_state(&mut self, request: &dyn RequestContext) -> FormResult<AjaxResponse> {
		let post = request.post();
		self.status = FormStatus::Error;

		let decoded = match normalize::decode(post.get("data").unwrap_or(&Value::Null)) {
			Ok(decoded) => decoded,
			Err(e) => return Ok(self.error_reply(&e)),
		};
		self.apply_correlation(post);

		let mut values = post.clone();
		values.insert("data".to_string(), Value::Object(decoded.clone()));
		self.values = values;

		if !self.verify_nonce(post) {
			return Ok(self.error_reply(&FormError::NonceInvalid));
		}

		let mut flash = self.flash()?;
		self.data = flash.data().cloned().unwrap_or_default();
		normalize::merge(&mut self.data, decoded);
		flash.set_data(self.data.clone());
		self.save_flash(&mut flash)?;

		self.status = FormStatus::Success;
		tracing::info!(uniqueid = %self.uniqueid, "form state stored");
		Ok(AjaxResponse::success())
	}

	fn save_flash(&self, flash: &mut FormFlash) -> FormResult<()> {
		flash.save().map_err(|source| FormError::StorageWriteFailed {
			uniqueid: self.uniqueid.clone(),
			source,
		})
	}

	fn error_reply(&mut self, error: &FormError) -> AjaxResponse {
		tracing::warn!(form = %self.name, uniqueid = %self.uniqueid, "request rejected: {}", error);
		let message = error.localized(self.services.translator.as_ref());
		self.status = FormStatus::Error;
		self.message = Some(message.clone());
		AjaxResponse::error(&message)
	}

	fn apply_correlation(&mut self, post: &Map<String, Value>) {
		if let Some(name) = post.get(FORM_NAME_KEY).and_then(Value::as_str) {
			self.name = name.to_string();
			self.definition.name = Some(self.name.clone());
		}

		if let Some(uniqueid) = post.get(UNIQUE_ID_KEY).and_then(Value::as_str) {
			match validate_id(uniqueid) {
				Ok(()) => {
					self.uniqueid = uniqueid.to_string();
					self.definition.uniqueid = Some(self.uniqueid.clone());
				}
				Err(e) => tracing::warn!(uniqueid, "ignoring correlation id: {}", e),
			}
		}
	}

	fn verify_nonce(&self, post: &Map<String, Value>) -> bool {
		let verified = post
			.get(self.nonce_name())
			.and_then(Value::as_str)
			.is_some_and(|token| self.services.nonce.verify(token, self.nonce_action()));

		if !verified {
			tracing::warn!(form = %self.name, uniqueid = %self.uniqueid, "anti-forgery token missing or invalid");
		}
		verified
	}

	fn transition(&mut self, state: FormState) {
		tracing::debug!(form = %self.name, from = ?self.state, to = ?state, "form state");
		self.state = state;
	}
}

impl std::fmt::Debug for Form {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Form")
			.field("name", &self.name)
			.field("id", &self.id)
			.field("uniqueid", &self.uniqueid)
			.field("page", &self.page.route())
			.field("status", &self.status)
			.field("state", &self.state)
			.finish_non_exhaustive()
	}
}

/// Declared `uniqueid`, or a random one when it is missing or not a valid
/// flash record id.
fn declared_uniqueid(declared: Option<&str>) -> String {
	if let Some(uniqueid) = declared.filter(|id| !id.is_empty()) {
		match validate_id(uniqueid) {
			Ok(()) => return uniqueid.to_string(),
			Err(e) => tracing::warn!(uniqueid, "ignoring declared uniqueid: {}", e),
		}
	}
	Alphanumeric.sample_string(&mut rand::thread_rng(), UNIQUE_ID_LENGTH)
}

/// Crop region posted as an object or as a JSON string.
fn parse_crop(value: Option<&Value>) -> FormResult<CropRegion> {
	let value = match value {
		Some(Value::String(text)) => serde_json::from_str(text)
			.map_err(|e| FormError::InvalidCrop(e.to_string()))?,
		Some(value) => value.clone(),
		None => return Err(FormError::InvalidCrop("missing crop region".to_string())),
	};
	serde_json::from_value(value).map_err(|e| FormError::InvalidCrop(e.to_string()))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::FormsConfig;
	use crate::page::StaticPage;
	use formflash_storages::{FlashConfig, create_store};
	use rstest::rstest;
	use serde_json::json;
	use tempfile::TempDir;

	fn services(dir: &TempDir) -> FormServices {
		let flash = create_store(FlashConfig::local(dir.path().join("flash"))).unwrap();
		FormServices::new(FormsConfig::default(), flash)
	}

	fn page_with(forms: Value) -> Arc<dyn Page> {
		let mut page = StaticPage::new("/contact-us", "/site/pages/contact-us")
			.with_header_data(json!({"email": "default@example.com"}).as_object().unwrap().clone())
			.with_rules(json!({"phone": {"pattern": "[0-9]+"}}).as_object().unwrap().clone());
		for (name, form) in forms.as_object().unwrap() {
			page = page.with_form(name.clone(), FormDefinition::from_value(form.clone()).unwrap());
		}
		Arc::new(page)
	}

	#[rstest]
	fn test_identity_defaults() {
		let dir = TempDir::new().unwrap();
		let form = Form::new(page_with(json!({"Contact Form": {}})), None, services(&dir));

		assert_eq!(form.name(), "Contact Form");
		assert_eq!(form.id(), "contact-form");
		assert_eq!(form.uniqueid().len(), UNIQUE_ID_LENGTH);
		assert_eq!(form.nonce_name(), "form-nonce");
		assert_eq!(form.nonce_action(), "form");
		assert_eq!(form.data()["email"], "default@example.com");
		assert_eq!(form.state(), FormState::Initialized);
	}

	#[rstest]
	fn test_declared_uniqueid_is_kept() {
		let dir = TempDir::new().unwrap();
		let form = Form::new(page_with(json!({"contact": {"uniqueid": "k3J9-x_2"}})), None, services(&dir));
		assert_eq!(form.uniqueid(), "k3J9-x_2");
	}

	#[rstest]
	#[case("contact form")]
	#[case("../escape")]
	fn test_invalid_declared_uniqueid_is_replaced(#[case] declared: &str) {
		let dir = TempDir::new().unwrap();
		let form = Form::new(page_with(json!({"contact": {"uniqueid": declared}})), None, services(&dir));

		assert_ne!(form.uniqueid(), declared);
		assert_eq!(form.uniqueid().len(), UNIQUE_ID_LENGTH);
		assert_eq!(form.definition().uniqueid.as_deref(), Some(form.uniqueid()));
	}

	#[rstest]
	fn test_post_with_invalid_declared_uniqueid_succeeds() {
		let dir = TempDir::new().unwrap();
		let mut form = Form::new(
			page_with(json!({"contact": {"uniqueid": "contact form", "fields": {"email": {}}}})),
			None,
			services(&dir),
		);
		let request = crate::request::FormRequest::new("/contact-us")
			.with_field(form.nonce_name(), json!(form.nonce()))
			.with_field("data", json!({"email": "me@example.com"}));

		let submission = form.post(&request).unwrap();
		assert_eq!(submission.status, FormStatus::Success);
		assert_eq!(form.state(), FormState::Committed);
	}

	#[rstest]
	fn test_name_falls_back_to_slug_for_numeric_keys() {
		let dir = TempDir::new().unwrap();
		let form = Form::new(page_with(json!({"0": {}})), None, services(&dir));
		assert_eq!(form.name(), "contact-us");
	}

	#[rstest]
	fn test_form_rules_do_not_override_page_rules() {
		let dir = TempDir::new().unwrap();
		let page = page_with(json!({
			"contact": {"rules": {"phone": {"pattern": "x"}, "zip": {"pattern": "[0-9]{5}"}}}
		}));
		let form = Form::new(page, Some("contact"), services(&dir));

		assert_eq!(form.rules()["phone"]["pattern"], "[0-9]+");
		assert_eq!(form.rules()["zip"]["pattern"], "[0-9]{5}");
	}

	#[rstest]
	fn test_set_fields_rebuilds_blueprint() {
		let dir = TempDir::new().unwrap();
		let mut form = Form::new(page_with(json!({"contact": {"fields": {"a": {}}}})), None, services(&dir));
		assert!(form.blueprint().fields().contains_key("a"));

		form.set_fields(json!({"b": {"type": "checkbox"}}));
		let blueprint = form.blueprint();
		assert!(blueprint.fields().contains_key("b"));
		assert!(!blueprint.fields().contains_key("a"));
	}

	#[rstest]
	fn test_value_fallback() {
		let dir = TempDir::new().unwrap();
		let mut form = Form::new(page_with(json!({"contact": {}})), None, services(&dir));
		form.set_value("draft/title", json!("Hi"));
		assert!(form.set_data("address/city", json!("Ghent")));
		assert!(!form.set_data("", json!(1)));

		assert_eq!(form.value("address/city", false), Some(&json!("Ghent")));
		assert_eq!(form.value("draft/title", false), None);
		assert_eq!(form.value("draft/title", true), Some(&json!("Hi")));
	}

	#[rstest]
	fn test_snapshot_restore() {
		let dir = TempDir::new().unwrap();
		let services = services(&dir);
		let page = page_with(json!({"contact": {}}));
		let mut form = Form::new(Arc::clone(&page), None, services.clone());
		form.set_data("email", json!("me@example.com"));
		form.set_message("kept");

		let snapshot: FormSnapshot =
			serde_json::from_str(&serde_json::to_string(&form.snapshot()).unwrap()).unwrap();
		let restored = Form::restore(page, snapshot, services);

		assert_eq!(restored.uniqueid(), form.uniqueid());
		assert_eq!(restored.name(), "contact");
		assert_eq!(restored.data()["email"], "me@example.com");
		assert_eq!(restored.message(), Some("kept"));
	}

	#[rstest]
	fn test_reset_restores_header_data() {
		let dir = TempDir::new().unwrap();
		let mut form = Form::new(page_with(json!({"contact": {}})), None, services(&dir));
		form.set_data("email", json!("changed"));
		form.set_status(FormStatus::Error);

		form.reset();
		assert_eq!(form.data()["email"], "default@example.com");
		assert_eq!(form.status(), FormStatus::Success);
	}

	#[rstest]
	#[case(json!({"x": 1, "y": 2, "width": 10, "height": 5}))]
	#[case(json!("{\"x\": 1, \"y\": 2, \"width\": 10, \"height\": 5}"))]
	fn test_parse_crop(#[case] value: Value) {
		assert_eq!(parse_crop(Some(&value)).unwrap(), CropRegion::new(1.0, 2.0, 10.0, 5.0));
	}

	#[rstest]
	#[case(None)]
	#[case(Some(json!("not json")))]
	#[case(Some(json!({"x": 1})))]
	fn test_parse_crop_rejects(#[case] value: Option<Value>) {
		assert!(matches!(parse_crop(value.as_ref()), Err(FormError::InvalidCrop(_))));
	}
}
