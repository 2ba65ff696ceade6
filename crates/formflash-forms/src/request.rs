//! Request and identity collaborators.

use crate::upload::UploadedFile;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// The incoming request of one pipeline run.
pub trait RequestContext {
	/// URL the request was made to.
	fn url(&self) -> &str;

	/// Decoded POST body.
	fn post(&self) -> &Map<String, Value>;

	/// Multipart file entry submitted for `field`.
	fn file(&self, field: &str) -> Option<&UploadedFile>;
}

/// Owned [`RequestContext`], built by the host's request layer or by tests.
///
/// # Examples
///
/// ```
/// use formflash_forms::request::{FormRequest, RequestContext};
/// use serde_json::json;
///
/// let request = FormRequest::new("/contact")
///     .with_field("form-nonce", json!("abc"))
///     .with_field("data", json!({"email": "a@b.c"}));
///
/// assert_eq!(request.post()["form-nonce"], "abc");
/// assert!(request.file("avatar").is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct FormRequest {
	url: String,
	post: Map<String, Value>,
	files: HashMap<String, UploadedFile>,
}

impl FormRequest {
	pub fn new(url: impl Into<String>) -> Self {
		Self {
			url: url.into(),
			..Default::default()
		}
	}

	pub fn with_post(mut self, post: Map<String, Value>) -> Self {
		self.post = post;
		self
	}

	pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
		self.post.insert(key.into(), value);
		self
	}

	pub fn with_file(mut self, field: impl Into<String>, file: UploadedFile) -> Self {
		self.files.insert(field.into(), file);
		self
	}
}

impl RequestContext for FormRequest {
	fn url(&self) -> &str {
		&self.url
	}

	fn post(&self) -> &Map<String, Value> {
		&self.post
	}

	fn file(&self, field: &str) -> Option<&UploadedFile> {
		self.files.get(field)
	}
}

/// Supplies the acting user recorded on flash records.
pub trait IdentityProvider: Send + Sync {
	fn current_user(&self) -> Option<String>;
}

/// Identity of requests without a logged-in user.
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

impl IdentityProvider for Anonymous {
	fn current_user(&self) -> Option<String> {
		None
	}
}
