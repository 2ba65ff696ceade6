//! Round trip through the facade crate: stage an attachment, then submit.

use formflash::prelude::*;
use rstest::{fixture, rstest};
use serde_json::{Value, json};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

struct ThankYou;

impl FormHook for ThankYou {
	fn on_form_processed(&self, _form: &mut Form, action: &str, params: &Value) -> HookResult<Option<Redirect>> {
		match (action, params.as_str()) {
			("redirect", Some(url)) => HookResult::Continue(Some(Redirect::new(url))),
			_ => HookResult::Continue(None),
		}
	}
}

struct Env {
	dir: TempDir,
	services: FormServices,
}

impl Env {
	fn page(&self) -> Arc<dyn Page> {
		let definition = FormDefinition::from_value(json!({
			"fields": {
				"subject": {"validate": {"required": true}},
				"attachment": {"type": "file", "accept": [".txt"], "destination": "uploads"}
			},
			"process": [{"redirect": "/thanks"}]
		}))
		.unwrap();
		Arc::new(StaticPage::new("/support", self.dir.path().join("pages/support")).with_form("support", definition))
	}
}

#[fixture]
fn env() -> Env {
	let dir = TempDir::new().unwrap();
	let flash = create_store(FlashConfig::local(dir.path().join("flash"))).unwrap();
	let config = FormsConfig {
		root_dir: dir.path().to_path_buf(),
		..FormsConfig::default()
	};
	let services = FormServices::new(config, flash).with_hooks(HookRegistry::new().with(ThankYou));
	Env { dir, services }
}

#[rstest]
fn test_staged_attachment_lands_in_destination(env: Env) {
	let incoming = env.dir.path().join("incoming-notes");
	fs::write(&incoming, b"printer on fire").unwrap();

	let mut form = Form::new(env.page(), None, env.services.clone());
	let uniqueid = form.uniqueid().to_string();
	let upload = FormRequest::new("/support")
		.with_field(form.nonce_name(), json!(form.nonce()))
		.with_field("__unique_form_id__", json!(uniqueid))
		.with_field("name", json!("attachment"))
		.with_file("attachment", UploadedFile::new("notes.txt", incoming, 15));
	let reply = form.upload_files(&upload).unwrap().unwrap();
	assert!(reply.is_success());

	let mut form = Form::new(env.page(), None, env.services.clone());
	let submit = FormRequest::new("/support")
		.with_field(form.nonce_name(), json!(form.nonce()))
		.with_field("__unique_form_id__", json!(uniqueid))
		.with_field("data", json!({"subject": "Help"}));
	let submission = form.post(&submit).unwrap();

	let target = env.dir.path().join("uploads/notes.txt");
	assert_eq!(submission.status, FormStatus::Success);
	assert_eq!(submission.redirect.unwrap().url, "/thanks");
	assert_eq!(fs::read(&target).unwrap(), b"printer on fire");
	assert!(!env.services.flash.exists(&uniqueid).unwrap());
}
