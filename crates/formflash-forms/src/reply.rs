//! JSON replies of the ajax handlers.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;

/// Content type of every ajax reply.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// A finished ajax reply. The request ends once it is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AjaxResponse {
	pub content_type: &'static str,
	pub body: String,
}

#[derive(Serialize)]
struct StatusReply<'a> {
	status: &'a str,
	#[serde(skip_serializing_if = "Option::is_none")]
	message: Option<&'a str>,
	#[serde(skip_serializing_if = "Option::is_none")]
	session: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadSession<'a> {
	session_field: String,
	path: &'a str,
	field: &'a str,
	uniqueid: &'a str,
}

impl AjaxResponse {
	fn from_reply(reply: &StatusReply<'_>) -> Self {
		Self {
			content_type: JSON_CONTENT_TYPE,
			body: serde_json::to_string(reply).unwrap_or_default(),
		}
	}

	/// `{"status":"success"}`
	pub fn success() -> Self {
		Self::from_reply(&StatusReply {
			status: "success",
			message: None,
			session: None,
		})
	}

	/// `{"status":"error","message":...}`
	pub fn error(message: &str) -> Self {
		Self::from_reply(&StatusReply {
			status: "error",
			message: Some(message),
			session: None,
		})
	}

	/// Successful upload reply. `session` is itself a JSON document,
	/// embedded as a string.
	///
	/// # Examples
	///
	/// ```
	/// use formflash_forms::reply::AjaxResponse;
	/// use serde_json::Value;
	///
	/// let reply = AjaxResponse::upload_success("/contact", "pages/contact/me.png", "avatar", "abc");
	/// let body: Value = serde_json::from_str(&reply.body).unwrap();
	/// let session: Value = serde_json::from_str(body["session"].as_str().unwrap()).unwrap();
	///
	/// assert_eq!(body["status"], "success");
	/// assert_eq!(session["sessionField"], "L2NvbnRhY3Q=");
	/// assert_eq!(session["field"], "avatar");
	/// ```
	pub fn upload_success(url: &str, path: &str, field: &str, uniqueid: &str) -> Self {
		let session = UploadSession {
			session_field: STANDARD.encode(url),
			path,
			field,
			uniqueid,
		};
		Self::from_reply(&StatusReply {
			status: "success",
			message: None,
			session: Some(serde_json::to_string(&session).unwrap_or_default()),
		})
	}

	/// Whether the reply reports success.
	pub fn is_success(&self) -> bool {
		self.body.starts_with(r#"{"status":"success""#)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_bodies_are_exact() {
		assert_eq!(AjaxResponse::success().body, r#"{"status":"success"}"#);
		assert_eq!(
			AjaxResponse::error("Bad \"thing\"").body,
			r#"{"status":"error","message":"Bad \"thing\""}"#
		);
		assert_eq!(AjaxResponse::error("x").content_type, "application/json");
	}

	#[rstest]
	fn test_upload_session_field_order() {
		let reply = AjaxResponse::upload_success("/c", "p/a.png", "f", "u1");
		assert_eq!(
			reply.body,
			r#"{"status":"success","session":"{\"sessionField\":\"L2M=\",\"path\":\"p/a.png\",\"field\":\"f\",\"uniqueid\":\"u1\"}"}"#
		);
		assert!(reply.is_success());
		assert!(!AjaxResponse::error("no").is_success());
	}
}
