//! Extension hooks fired during the form lifecycle.
//!
//! Handlers are invoked synchronously in registration order. Hooks that can
//! halt the pipeline return a [`HookResult`]; a `Stop` also skips the
//! handlers registered after the one that returned it.

use crate::form::Form;
use crate::settings::UploadSettings;
use formflash_storages::LegacyQueue;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Outcome of a hook that may halt further processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookResult<T = ()> {
	Continue(T),
	Stop(T),
}

impl<T> HookResult<T> {
	pub fn is_stop(&self) -> bool {
		matches!(self, HookResult::Stop(_))
	}

	pub fn into_inner(self) -> T {
		match self {
			HookResult::Continue(value) | HookResult::Stop(value) => value,
		}
	}
}

impl<T: Default> Default for HookResult<T> {
	fn default() -> Self {
		HookResult::Continue(T::default())
	}
}

/// Redirect requested by a process action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Redirect {
	pub url: String,
	pub code: Option<u16>,
}

impl Redirect {
	pub fn new(url: impl Into<String>) -> Self {
		Self {
			url: url.into(),
			code: None,
		}
	}

	pub fn with_code(mut self, code: u16) -> Self {
		self.code = Some(code);
		self
	}
}

/// Payload of `on_form_validation_error`.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationFailure {
	/// Message key, when the failure comes from the pipeline itself.
	pub code: Option<&'static str>,
	pub message: String,
	pub messages: IndexMap<String, Vec<String>>,
}

/// Extension points of the form pipeline.
///
/// Every method has a no-op default, so handlers only implement the hooks
/// they care about.
#[allow(unused_variables)]
pub trait FormHook: Send + Sync {
	fn on_form_initialized(&self, form: &mut Form) {}

	/// Adjust the resolved settings of an upload.
	fn on_form_upload_settings(&self, settings: &mut UploadSettings, post: &Map<String, Value>) {}

	fn on_form_prepare_validation(&self, form: &mut Form) {}

	fn on_form_validation_processed(&self, form: &mut Form) {}

	/// Return `Stop` to halt the pipeline after a failed validation.
	fn on_form_validation_error(&self, form: &mut Form, failure: &ValidationFailure) -> HookResult {
		HookResult::Continue(())
	}

	/// Called once per process action. The carried redirect, if any,
	/// replaces earlier ones.
	fn on_form_processed(
		&self,
		form: &mut Form,
		action: &str,
		params: &Value,
	) -> HookResult<Option<Redirect>> {
		HookResult::Continue(None)
	}

	/// Rewrite the deprecated upload queue.
	fn on_form_store_uploads(&self, form: &Form, queue: &mut LegacyQueue, post: &Map<String, Value>) {}
}

/// Ordered collection of hook handlers.
#[derive(Clone, Default)]
pub struct HookRegistry {
	handlers: Vec<Arc<dyn FormHook>>,
}

impl HookRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register(&mut self, hook: Arc<dyn FormHook>) -> &mut Self {
		self.handlers.push(hook);
		self
	}

	pub fn with(mut self, hook: impl FormHook + 'static) -> Self {
		self.handlers.push(Arc::new(hook));
		self
	}

	pub fn len(&self) -> usize {
		self.handlers.len()
	}

	pub fn is_empty(&self) -> bool {
		self.handlers.is_empty()
	}

	pub fn initialized(&self, form: &mut Form) {
		for (index, hook) in self.handlers.iter().enumerate() {
			tracing::debug!(hook = "on_form_initialized", index, "dispatching hook");
			hook.on_form_initialized(form);
		}
	}

	pub fn upload_settings(&self, settings: &mut UploadSettings, post: &Map<String, Value>) {
		for (index, hook) in self.handlers.iter().enumerate() {
			tracing::debug!(hook = "on_form_upload_settings", index, "dispatching hook");
			hook.on_form_upload_settings(settings, post);
		}
	}

	pub fn prepare_validation(&self, form: &mut Form) {
		for (index, hook) in self.handlers.iter().enumerate() {
			tracing::debug!(hook = "on_form_prepare_validation", index, "dispatching hook");
			hook.on_form_prepare_validation(form);
		}
	}

	pub fn validation_processed(&self, form: &mut Form) {
		for (index, hook) in self.handlers.iter().enumerate() {
			tracing::debug!(hook = "on_form_validation_processed", index, "dispatching hook");
			hook.on_form_validation_processed(form);
		}
	}

	/// Returns `Stop` as soon as one handler does.
	pub fn validation_error(&self, form: &mut Form, failure: &ValidationFailure) -> HookResult {
		for (index, hook) in self.handlers.iter().enumerate() {
			let outcome = hook.on_form_validation_error(form, failure);
			tracing::debug!(
				hook = "on_form_validation_error",
				index,
				stop = outcome.is_stop(),
				"dispatched hook"
			);
			if outcome.is_stop() {
				return outcome;
			}
		}
		HookResult::Continue(())
	}

	/// Returns the last requested redirect, as `Stop` if a handler halted
	/// processing.
	pub fn processed(
		&self,
		form: &mut Form,
		action: &str,
		params: &Value,
	) -> HookResult<Option<Redirect>> {
		let mut redirect = None;
		for (index, hook) in self.handlers.iter().enumerate() {
			let outcome = hook.on_form_processed(form, action, params);
			let stop = outcome.is_stop();
			tracing::debug!(hook = "on_form_processed", index, action, stop, "dispatched hook");

			if let Some(requested) = outcome.into_inner() {
				redirect = Some(requested);
			}
			if stop {
				return HookResult::Stop(redirect);
			}
		}
		HookResult::Continue(redirect)
	}

	pub fn store_uploads(&self, form: &Form, queue: &mut LegacyQueue, post: &Map<String, Value>) {
		for (index, hook) in self.handlers.iter().enumerate() {
			tracing::debug!(hook = "on_form_store_uploads", index, "dispatching hook");
			hook.on_form_store_uploads(form, queue, post);
		}
	}
}

impl std::fmt::Debug for HookRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("HookRegistry")
			.field("handlers", &self.handlers.len())
			.finish()
	}
}
