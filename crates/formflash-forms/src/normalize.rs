//! Field normalization of submitted payloads.
//!
//! [`decode`] turns the raw `data` entry of a request into a clean map, and
//! [`reconcile`] lines the result up with the declared fields.

use crate::schema::FieldSchema;
use crate::{FormError, FormResult};
use indexmap::IndexMap;
use serde_json::{Map, Value};

/// Reserved key carrying JSON-encoded sub-payloads.
pub const JSON_KEY: &str = "_json";

/// Separator of nested paths in [`get_path`] and [`set_path`].
pub const PATH_SEPARATOR: char = '/';

/// Decode a submitted `data` payload.
///
/// A `_json` entry is parsed and deep-merged over the rest of the payload,
/// then removed. It may be a JSON document or a map whose leaves are JSON
/// documents; empty leaves are dropped. Finally `%5B`/`%5D` in keys are
/// rewritten to `[`/`]` at every depth. Anything other than a map decodes
/// to an empty map.
///
/// # Errors
///
/// Returns `` `FormError::MalformedPayload` `` when a JSON document cannot be
/// parsed.
///
/// # Examples
///
/// ```
/// use formflash_forms::normalize::decode;
/// use serde_json::json;
///
/// let decoded = decode(&json!({
///     "a": {"x": 1},
///     "_json": "{\"a\": {\"y\": 2}}",
///     "tags%5B0%5D": "rust",
/// })).unwrap();
///
/// assert_eq!(serde_json::Value::Object(decoded), json!({
///     "a": {"x": 1, "y": 2},
///     "tags[0]": "rust",
/// }));
/// ```
pub fn decode(raw: &Value) -> FormResult<Map<String, Value>> {
	let Value::Object(map) = raw else {
		return Ok(Map::new());
	};

	let mut data = map.clone();
	if let Some(encoded) = data.shift_remove(JSON_KEY) {
		let overlay = decode_json(encoded, JSON_KEY)?;
		if let Value::Object(overlay) = overlay {
			merge(&mut data, overlay);
		}
	}

	Ok(clean_keys(data))
}

fn decode_json(value: Value, key: &str) -> FormResult<Value> {
	match value {
		Value::String(text) => serde_json::from_str(&text)
			.map_err(|e| FormError::MalformedPayload(format!("{}: {}", key, e))),
		Value::Object(map) => {
			let mut decoded = Map::new();
			for (key, value) in map {
				if value.as_str() == Some("") {
					continue;
				}
				let value = decode_json(value, &key)?;
				decoded.insert(key, value);
			}
			Ok(Value::Object(decoded))
		}
		other => Ok(other),
	}
}

/// Deep-merge `overlay` into `target`.
///
/// Maps merge key by key and lists merge index by index; any other
/// combination replaces the target value.
pub fn merge(target: &mut Map<String, Value>, overlay: Map<String, Value>) {
	for (key, value) in overlay {
		match target.get_mut(&key) {
			Some(existing) => merge_value(existing, value),
			None => {
				target.insert(key, value);
			}
		}
	}
}

fn merge_value(target: &mut Value, overlay: Value) {
	match (target, overlay) {
		(Value::Object(target), Value::Object(overlay)) => merge(target, overlay),
		(Value::Array(target), Value::Array(overlay)) => {
			for (index, value) in overlay.into_iter().enumerate() {
				match target.get_mut(index) {
					Some(existing) => merge_value(existing, value),
					None => target.push(value),
				}
			}
		}
		(target, overlay) => *target = overlay,
	}
}

fn clean_keys(map: Map<String, Value>) -> Map<String, Value> {
	map.into_iter()
		.map(|(key, value)| (key.replace("%5B", "[").replace("%5D", "]"), clean_value(value)))
		.collect()
}

fn clean_value(value: Value) -> Value {
	match value {
		Value::Object(map) => Value::Object(clean_keys(map)),
		Value::Array(items) => Value::Array(items.into_iter().map(clean_value).collect()),
		other => other,
	}
}

/// Line decoded data up with the declared fields.
///
/// Fields without an explicit `name` pick up the positional entry at their
/// ordinal. `checkbox` and `switch` fields become `true` when present and
/// `false` when absent.
pub fn reconcile(
	fields: &IndexMap<String, FieldSchema>,
	mut data: Map<String, Value>,
) -> Map<String, Value> {
	for (index, (key, field)) in fields.iter().enumerate() {
		let name = field.name.as_deref().unwrap_or(key);

		if field.name.is_none() {
			let position = index.to_string();
			if position != name
				&& let Some(value) = data.shift_remove(&position)
			{
				data.insert(name.to_string(), value);
			}
		}

		if field.is_toggle() {
			let present = data.contains_key(name);
			data.insert(name.to_string(), Value::Bool(present));
		}
	}
	data
}

/// Look up a `/`-separated path.
pub fn get_path<'a>(data: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
	let mut segments = path.split(PATH_SEPARATOR);
	let mut current = data.get(segments.next()?)?;
	for segment in segments {
		current = match current {
			Value::Object(map) => map.get(segment)?,
			Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
			_ => return None,
		};
	}
	Some(current)
}

/// Set a `/`-separated path, creating intermediate maps.
pub fn set_path(data: &mut Map<String, Value>, path: &str, value: Value) {
	match path.split_once(PATH_SEPARATOR) {
		None => {
			data.insert(path.to_string(), value);
		}
		Some((head, rest)) => {
			let child = data
				.entry(head.to_string())
				.or_insert_with(|| Value::Object(Map::new()));
			if !child.is_object() {
				*child = Value::Object(Map::new());
			}
			if let Value::Object(child) = child {
				set_path(child, rest, value);
			}
		}
	}
}
