//! Schema collaborator: field list, validation and filtering.

use crate::FormError;
use crate::schema::{FieldSchema, find_field};
use indexmap::IndexMap;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Per-field validation failures.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValidationErrors {
	pub message: String,
	/// Field name to messages, in field order.
	pub messages: IndexMap<String, Vec<String>>,
}

impl ValidationErrors {
	pub fn add(&mut self, field: &str, message: impl Into<String>) {
		self.messages
			.entry(field.to_string())
			.or_default()
			.push(message.into());
	}

	pub fn is_empty(&self) -> bool {
		self.messages.is_empty()
	}
}

impl From<ValidationErrors> for FormError {
	fn from(errors: ValidationErrors) -> Self {
		FormError::SchemaValidationFailed {
			message: errors.message,
			messages: errors.messages,
		}
	}
}

/// Validated view of a form's declared fields.
pub trait Blueprint: Send + Sync {
	fn fields(&self) -> &IndexMap<String, FieldSchema>;

	/// Properties declared for the field `name`, at any depth.
	fn property(&self, name: &str) -> Option<Map<String, Value>> {
		find_field(self.fields(), name).map(FieldSchema::to_properties)
	}

	fn validate(&self, data: &Map<String, Value>) -> Result<(), ValidationErrors>;

	/// Sanitize `data` in place.
	fn filter(&self, data: &mut Map<String, Value>);
}

/// Builds blueprints for a form.
pub trait BlueprintFactory: Send + Sync {
	fn build(
		&self,
		form_name: &str,
		fields: IndexMap<String, FieldSchema>,
		rules: &Map<String, Value>,
	) -> Arc<dyn Blueprint>;
}

/// Factory of [`BasicBlueprint`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicBlueprintFactory;

impl BlueprintFactory for BasicBlueprintFactory {
	fn build(
		&self,
		form_name: &str,
		fields: IndexMap<String, FieldSchema>,
		rules: &Map<String, Value>,
	) -> Arc<dyn Blueprint> {
		tracing::debug!(form = %form_name, fields = fields.len(), "building blueprint");
		Arc::new(BasicBlueprint::new(fields, rules.clone()))
	}
}

/// Built-in blueprint.
///
/// Honors these entries of a field's `validate` map:
///
/// - `required`: the value must be present and non-empty
/// - `type`: `bool`, `int`, `number` or `string`
/// - `pattern`: regular expression the whole string must match
/// - `rule`: name of an entry of the form rules holding `pattern` and
///   optionally `message`
///
/// # Examples
///
/// ```
/// use formflash_forms::blueprint::{BasicBlueprint, Blueprint};
/// use formflash_forms::schema::{FieldTypeRegistry, process_fields};
/// use serde_json::{Map, json};
///
/// let fields = process_fields(
///     &json!({"age": {"type": "number", "validate": {"required": true, "type": "int"}}}),
///     &FieldTypeRegistry::new(),
/// );
/// let blueprint = BasicBlueprint::new(fields, Map::new());
///
/// let mut data = json!({"age": " 42 "}).as_object().unwrap().clone();
/// assert!(blueprint.validate(&data).is_ok());
/// blueprint.filter(&mut data);
/// assert_eq!(data["age"], 42);
///
/// assert!(blueprint.validate(&Map::new()).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct BasicBlueprint {
	fields: IndexMap<String, FieldSchema>,
	rules: Map<String, Value>,
}

impl BasicBlueprint {
	pub fn new(fields: IndexMap<String, FieldSchema>, rules: Map<String, Value>) -> Self {
		Self { fields, rules }
	}

	fn validate_fields(
		&self,
		fields: &IndexMap<String, FieldSchema>,
		data: &Map<String, Value>,
		errors: &mut ValidationErrors,
	) {
		for (key, field) in fields {
			let name = field.name.as_deref().unwrap_or(key);
			let label = field
				.properties
				.get("label")
				.and_then(Value::as_str)
				.unwrap_or(name);
			let rules = field
				.properties
				.get("validate")
				.and_then(Value::as_object);

			if let Some(rules) = rules {
				self.validate_value(name, label, rules, data.get(name), errors);
			}

			self.validate_fields(&field.fields, data, errors);
		}
	}

	fn validate_value(
		&self,
		name: &str,
		label: &str,
		rules: &Map<String, Value>,
		value: Option<&Value>,
		errors: &mut ValidationErrors,
	) {
		let value = value.filter(|v| !is_empty(v));

		let Some(value) = value else {
			if rules.get("required").and_then(Value::as_bool) == Some(true) {
				errors.add(name, format!("Please fill out this field: {}", label));
			}
			return;
		};

		if let Some(required) = rules.get("required").and_then(Value::as_bool)
			&& required
			&& value == &Value::Bool(false)
		{
			errors.add(name, format!("Please fill out this field: {}", label));
			return;
		}

		if let Some(expected) = rules.get("type").and_then(Value::as_str)
			&& !matches_type(value, expected)
		{
			errors.add(
				name,
				format!("Invalid value for {}: expected {}", label, expected),
			);
			return;
		}

		let named_rule = rules
			.get("rule")
			.and_then(Value::as_str)
			.and_then(|rule| self.rules.get(rule))
			.and_then(Value::as_object);
		let pattern = rules
			.get("pattern")
			.and_then(Value::as_str)
			.or_else(|| named_rule.and_then(|r| r.get("pattern")).and_then(Value::as_str));

		if let (Some(pattern), Some(text)) = (pattern, scalar_text(value)) {
			match Regex::new(&format!("^(?:{})$", pattern)) {
				Ok(re) if re.is_match(&text) => {}
				Ok(_) => {
					let message = rules
						.get("message")
						.or_else(|| named_rule.and_then(|r| r.get("message")))
						.and_then(Value::as_str)
						.map(str::to_string)
						.unwrap_or_else(|| format!("Invalid value for {}", label));
					errors.add(name, message);
				}
				Err(e) => {
					tracing::warn!(field = %name, pattern, "ignoring invalid validation pattern: {}", e);
				}
			}
		}
	}

	fn filter_fields(fields: &IndexMap<String, FieldSchema>, data: &mut Map<String, Value>) {
		for (key, field) in fields {
			let name = field.name.as_deref().unwrap_or(key);

			if let Some(value) = data.get_mut(name) {
				let declared_type = field
					.properties
					.get("validate")
					.and_then(|v| v.get("type"))
					.and_then(Value::as_str);

				if field.is_toggle() {
					*value = Value::Bool(is_truthy(value));
				} else if let Some(trimmed) = value.as_str().map(|s| s.trim().to_string()) {
					*value = match (field.field_type.as_str(), declared_type) {
						(_, Some("int")) => trimmed
							.parse::<i64>()
							.map(Value::from)
							.unwrap_or(Value::String(trimmed)),
						("number", _) | (_, Some("number")) => number_value(&trimmed)
							.unwrap_or(Value::String(trimmed)),
						_ => Value::String(trimmed),
					};
				}
			}

			Self::filter_fields(&field.fields, data);
		}
	}
}

impl Blueprint for BasicBlueprint {
	fn fields(&self) -> &IndexMap<String, FieldSchema> {
		&self.fields
	}

	fn validate(&self, data: &Map<String, Value>) -> Result<(), ValidationErrors> {
		let mut errors = ValidationErrors::default();
		self.validate_fields(&self.fields, data, &mut errors);

		if errors.is_empty() {
			Ok(())
		} else {
			errors.message = "Validation failed:".to_string();
			Err(errors)
		}
	}

	fn filter(&self, data: &mut Map<String, Value>) {
		Self::filter_fields(&self.fields, data);
	}
}

fn is_empty(value: &Value) -> bool {
	match value {
		Value::Null => true,
		Value::String(s) => s.trim().is_empty(),
		Value::Array(items) => items.is_empty(),
		Value::Object(map) => map.is_empty(),
		_ => false,
	}
}

fn is_truthy(value: &Value) -> bool {
	match value {
		Value::Bool(b) => *b,
		Value::String(s) => !matches!(s.as_str(), "" | "0" | "false" | "off"),
		Value::Number(n) => n.as_f64() != Some(0.0),
		Value::Null => false,
		_ => true,
	}
}

fn number_value(text: &str) -> Option<Value> {
	if let Ok(i) = text.parse::<i64>() {
		return Some(Value::from(i));
	}
	text.parse::<f64>()
		.ok()
		.and_then(serde_json::Number::from_f64)
		.map(Value::Number)
}

fn scalar_text(value: &Value) -> Option<String> {
	match value {
		Value::String(s) => Some(s.clone()),
		Value::Number(n) => Some(n.to_string()),
		Value::Bool(b) => Some(b.to_string()),
		_ => None,
	}
}

fn matches_type(value: &Value, expected: &str) -> bool {
	match expected {
		"bool" => match value {
			Value::Bool(_) => true,
			Value::String(s) => matches!(s.trim(), "0" | "1" | "true" | "false" | "on" | "off"),
			_ => false,
		},
		"int" => match value {
			Value::Number(n) => n.is_i64() || n.is_u64(),
			Value::String(s) => s.trim().parse::<i64>().is_ok(),
			_ => false,
		},
		"number" => match value {
			Value::Number(_) => true,
			Value::String(s) => s.trim().parse::<f64>().is_ok_and(f64::is_finite),
			_ => false,
		},
		"string" => value.is_string(),
		_ => true,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::schema::{FieldTypeRegistry, process_fields};
	use rstest::rstest;
	use serde_json::json;

	fn blueprint(fields: Value, rules: Value) -> BasicBlueprint {
		BasicBlueprint::new(
			process_fields(&fields, &FieldTypeRegistry::new()),
			rules.as_object().cloned().unwrap_or_default(),
		)
	}

	fn data(value: Value) -> Map<String, Value> {
		value.as_object().unwrap().clone()
	}

	#[rstest]
	fn test_required_collects_every_field() {
		let bp = blueprint(
			json!({
				"name": {"label": "Name", "validate": {"required": true}},
				"email": {"validate": {"required": true}},
				"notes": {}
			}),
			json!({}),
		);

		let errors = bp.validate(&data(json!({"name": "  "}))).unwrap_err();
		assert_eq!(errors.message, "Validation failed:");
		let fields: Vec<&str> = errors.messages.keys().map(String::as_str).collect();
		assert_eq!(fields, vec!["name", "email"]);
		assert_eq!(errors.messages["name"], vec!["Please fill out this field: Name"]);
	}

	#[rstest]
	fn test_required_checkbox_must_be_checked() {
		let bp = blueprint(
			json!({"terms": {"type": "checkbox", "validate": {"required": true}}}),
			json!({}),
		);
		assert!(bp.validate(&data(json!({"terms": false}))).is_err());
		assert!(bp.validate(&data(json!({"terms": true}))).is_ok());
	}

	#[rstest]
	#[case("int", json!("12"), true)]
	#[case("int", json!("1.5"), false)]
	#[case("number", json!("1.5"), true)]
	#[case("number", json!("abc"), false)]
	#[case("bool", json!("on"), true)]
	#[case("string", json!(3), false)]
	fn test_type_checks(#[case] ty: &str, #[case] value: Value, #[case] valid: bool) {
		let bp = blueprint(json!({"f": {"validate": {"type": ty}}}), json!({}));
		let mut values = Map::new();
		values.insert("f".to_string(), value);
		assert_eq!(bp.validate(&values).is_ok(), valid);
	}

	#[rstest]
	fn test_named_rule_pattern_and_message() {
		let bp = blueprint(
			json!({"zip": {"validate": {"rule": "zip"}}}),
			json!({"zip": {"pattern": "[0-9]{5}", "message": "Five digits please"}}),
		);

		let errors = bp.validate(&data(json!({"zip": "12a45"}))).unwrap_err();
		assert_eq!(errors.messages["zip"], vec!["Five digits please"]);
		assert!(bp.validate(&data(json!({"zip": "12345"}))).is_ok());
	}

	#[rstest]
	fn test_filter_trims_and_coerces() {
		let bp = blueprint(
			json!({
				"name": {},
				"qty": {"type": "number"},
				"ok": {"type": "switch"}
			}),
			json!({}),
		);

		let mut values = data(json!({"name": "  Ada ", "qty": "2.5", "ok": "0"}));
		bp.filter(&mut values);
		assert_eq!(Value::Object(values), json!({"name": "Ada", "qty": 2.5, "ok": false}));
	}

	#[rstest]
	fn test_property_lookup() {
		let bp = blueprint(
			json!({"files": {"type": "fieldset", "fields": {"avatar": {"type": "file", "limit": 1}}}}),
			json!({}),
		);
		let props = bp.property("avatar").unwrap();
		assert_eq!(props["limit"], 1);
		assert!(bp.property("missing").is_none());
	}
}
