//! Form definitions as declared in page headers.

use crate::nonce::{DEFAULT_NONCE_ACTION, DEFAULT_NONCE_NAME};
use crate::{FormError, FormResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// POST key and action of a form's anti-forgery token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NonceSettings {
	pub name: String,
	pub action: String,
}

impl Default for NonceSettings {
	fn default() -> Self {
		Self {
			name: DEFAULT_NONCE_NAME.to_string(),
			action: DEFAULT_NONCE_ACTION.to_string(),
		}
	}
}

/// One declared form.
///
/// `fields` and `process` keep their declared shape: a map keyed by name or
/// a list. Unknown keys are kept in `extra`.
///
/// # Examples
///
/// ```
/// use formflash_forms::definition::FormDefinition;
/// use serde_json::json;
///
/// let form = FormDefinition::from_value(json!({
///     "name": "contact",
///     "fields": {"email": {"type": "email"}},
///     "process": [{"email": {"subject": "Hi"}}, {"reset": true}],
///     "template": "thanks",
/// })).unwrap();
///
/// assert_eq!(form.nonce.action, "form");
/// assert_eq!(form.extra["template"], "thanks");
///
/// let actions: Vec<String> = form.process_actions().into_iter().map(|(a, _)| a).collect();
/// assert_eq!(actions, vec!["email", "reset"]);
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FormDefinition {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub uniqueid: Option<String>,
	#[serde(default)]
	pub nonce: NonceSettings,
	#[serde(default)]
	pub fields: Value,
	#[serde(default)]
	pub process: Value,
	#[serde(default)]
	pub rules: Map<String, Value>,
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}

impl FormDefinition {
	pub fn new() -> Self {
		Self::default()
	}

	/// Parse a definition from its JSON form.
	pub fn from_value(value: Value) -> FormResult<Self> {
		serde_json::from_value(value)
			.map_err(|e| FormError::Config(format!("invalid form definition: {}", e)))
	}

	pub fn with_name(mut self, name: impl Into<String>) -> Self {
		self.name = Some(name.into());
		self
	}

	pub fn with_fields(mut self, fields: Value) -> Self {
		self.fields = fields;
		self
	}

	pub fn with_process(mut self, process: Value) -> Self {
		self.process = process;
		self
	}

	pub fn with_rules(mut self, rules: Map<String, Value>) -> Self {
		self.rules = rules;
		self
	}

	/// Declared process actions with their parameters, in order.
	///
	/// `process` is either a map of action to parameters or a list of
	/// single-entry maps. List items of any other shape are skipped.
	pub fn process_actions(&self) -> Vec<(String, Value)> {
		match &self.process {
			Value::Object(actions) => actions
				.iter()
				.map(|(action, params)| (action.clone(), params.clone()))
				.collect(),
			Value::Array(items) => items
				.iter()
				.filter_map(|item| match item {
					Value::Object(entry) => entry
						.iter()
						.next()
						.map(|(action, params)| (action.clone(), params.clone())),
					Value::String(action) => Some((action.clone(), Value::Null)),
					_ => None,
				})
				.collect(),
			_ => Vec::new(),
		}
	}
}
