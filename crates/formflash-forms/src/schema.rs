//! Declared field schema.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Field type assumed when a declaration has none.
pub const DEFAULT_FIELD_TYPE: &str = "text";

/// One processed field declaration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSchema {
	#[serde(rename = "type")]
	pub field_type: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	#[serde(skip_serializing_if = "IndexMap::is_empty")]
	pub fields: IndexMap<String, FieldSchema>,
	/// Every other property, registry defaults included.
	#[serde(flatten)]
	pub properties: Map<String, Value>,
}

impl FieldSchema {
	pub fn new(field_type: impl Into<String>) -> Self {
		Self {
			field_type: field_type.into(),
			name: None,
			fields: IndexMap::new(),
			properties: Map::new(),
		}
	}

	pub fn with_name(mut self, name: impl Into<String>) -> Self {
		self.name = Some(name.into());
		self
	}

	pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
		self.properties.insert(key.into(), value);
		self
	}

	/// Whether the value is a presence flag (`checkbox`, `switch`).
	pub fn is_toggle(&self) -> bool {
		matches!(self.field_type.as_str(), "checkbox" | "switch")
	}

	/// Whether the field accepts file uploads.
	pub fn is_file(&self) -> bool {
		self.field_type == "file"
	}

	/// All properties of the field as one map, `type` and `name` included.
	pub fn to_properties(&self) -> Map<String, Value> {
		let mut out = self.properties.clone();
		out.insert("type".to_string(), Value::String(self.field_type.clone()));
		if let Some(name) = &self.name {
			out.insert("name".to_string(), Value::String(name.clone()));
		}
		out
	}
}

/// Default properties per field type.
///
/// # Examples
///
/// ```
/// use formflash_forms::schema::FieldTypeRegistry;
/// use serde_json::json;
///
/// let mut registry = FieldTypeRegistry::new();
/// registry.register("file", json!({"multiple": false, "accept": ["image/*"]}).as_object().unwrap().clone());
///
/// assert!(registry.defaults("file").is_some());
/// assert!(registry.defaults("text").is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct FieldTypeRegistry {
	types: HashMap<String, Map<String, Value>>,
}

impl FieldTypeRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register(&mut self, field_type: impl Into<String>, defaults: Map<String, Value>) {
		self.types.insert(field_type.into(), defaults);
	}

	pub fn defaults(&self, field_type: &str) -> Option<&Map<String, Value>> {
		self.types.get(field_type)
	}
}

/// Process raw field declarations into schema entries.
///
/// `raw` is a map keyed by field name or a list. Declarations without a
/// `type` become `text`; registry defaults fill in missing properties;
/// numeric keys are replaced by the declared `name`; nested `fields` are
/// processed the same way. Entries that are not maps are skipped.
///
/// # Examples
///
/// ```
/// use formflash_forms::schema::{FieldTypeRegistry, process_fields};
/// use serde_json::json;
///
/// let fields = process_fields(
///     &json!([{"name": "email", "type": "email"}, {"label": "Notes"}]),
///     &FieldTypeRegistry::new(),
/// );
///
/// let keys: Vec<&str> = fields.keys().map(String::as_str).collect();
/// assert_eq!(keys, vec!["email", "1"]);
/// assert_eq!(fields["1"].field_type, "text");
/// ```
pub fn process_fields(raw: &Value, registry: &FieldTypeRegistry) -> IndexMap<String, FieldSchema> {
	let entries: Vec<(String, &Value)> = match raw {
		Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v)).collect(),
		Value::Array(items) => items
			.iter()
			.enumerate()
			.map(|(i, v)| (i.to_string(), v))
			.collect(),
		_ => return IndexMap::new(),
	};

	let mut out = IndexMap::new();
	for (key, value) in entries {
		let Value::Object(declaration) = value else {
			tracing::debug!(field = %key, "skipping field declaration that is not a map");
			continue;
		};

		let mut properties = declaration.clone();
		let field_type = match properties.shift_remove("type") {
			Some(Value::String(t)) => t,
			_ => DEFAULT_FIELD_TYPE.to_string(),
		};

		if let Some(defaults) = registry.defaults(&field_type) {
			for (prop, default) in defaults {
				if !properties.contains_key(prop) {
					properties.insert(prop.clone(), default.clone());
				}
			}
		}

		let name = match properties.shift_remove("name") {
			Some(Value::String(n)) if !n.is_empty() => Some(n),
			_ => None,
		};

		let fields = match properties.shift_remove("fields") {
			Some(nested @ (Value::Object(_) | Value::Array(_))) => {
				process_fields(&nested, registry)
			}
			_ => IndexMap::new(),
		};

		let key = match &name {
			Some(name) if key.parse::<usize>().is_ok() => name.clone(),
			_ => key,
		};

		out.insert(
			key,
			FieldSchema {
				field_type,
				name,
				fields,
				properties,
			},
		);
	}
	out
}

/// Find a field by name or key at any depth.
pub fn find_field<'a>(
	fields: &'a IndexMap<String, FieldSchema>,
	name: &str,
) -> Option<&'a FieldSchema> {
	for (key, field) in fields {
		if key == name || field.name.as_deref() == Some(name) {
			return Some(field);
		}
		if let Some(found) = find_field(&field.fields, name) {
			return Some(found);
		}
	}
	None
}
