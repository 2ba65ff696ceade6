//! Integration tests for the flash store.

mod fixtures;

use fixtures::{StoreContext, context};
use formflash_storages::{CropRegion, PendingUpload, StorageError};
use image::GenericImageView;
use rstest::rstest;
use serde_json::{Map, json};

// ============================================================================
// Staging
// ============================================================================

mod staging_tests {
	use super::*;

	#[rstest]
	fn test_stage_upload_moves_source(context: StoreContext) {
		let source = context.incoming_file("upload1", b"hello");
		let mut flash = context.store.open("stage1").unwrap();

		let descriptor = flash
			.stage_upload(
				"resume",
				PendingUpload::new("cv.txt", &source, context.destination().join("cv.txt"))
					.with_size(5)
					.with_mime_type("text/plain"),
			)
			.unwrap()
			.clone();

		assert!(!source.exists());
		assert!(descriptor.is_staged());
		assert_eq!(descriptor.size, 5);
		assert_eq!(descriptor.mime_type, "text/plain");
		assert_eq!(
			descriptor.storage_path.extension().and_then(|e| e.to_str()),
			Some("txt")
		);
	}

	#[rstest]
	fn test_stage_same_name_replaces_entry(context: StoreContext) {
		let mut flash = context.store.open("stage2").unwrap();
		let dest = context.destination().join("a.txt");

		let first = context.incoming_file("t1", b"one");
		let old_path = flash
			.stage_upload("doc", PendingUpload::new("a.txt", &first, &dest))
			.unwrap()
			.storage_path
			.clone();

		let second = context.incoming_file("t2", b"second");
		flash
			.stage_upload("doc", PendingUpload::new("a.txt", &second, &dest))
			.unwrap();

		let files = flash.files_by_field();
		assert_eq!(files["doc"].len(), 1);
		assert_eq!(files["doc"][0].size, 6);
		assert!(!old_path.exists());
	}

	#[rstest]
	fn test_stage_missing_source_leaves_record_unchanged(context: StoreContext) {
		let mut flash = context.store.open("stage3").unwrap();
		let missing = context.incoming().join("gone");

		let err = flash
			.stage_upload(
				"doc",
				PendingUpload::new("a.txt", &missing, context.destination()),
			)
			.unwrap_err();

		assert!(matches!(err, StorageError::MoveFailed { .. }));
		assert!(flash.files_by_field().is_empty());
	}

	#[rstest]
	fn test_files_by_field_keeps_staging_order(context: StoreContext) {
		let mut flash = context.store.open("stage4").unwrap();
		for (field, name) in [("zeta", "z.txt"), ("alpha", "a.txt"), ("zeta", "y.txt")] {
			let source = context.incoming_file(name, name.as_bytes());
			flash
				.stage_upload(
					field,
					PendingUpload::new(name, &source, context.destination().join(name)),
				)
				.unwrap();
		}

		let files = flash.files_by_field();
		let fields: Vec<&str> = files.keys().map(String::as_str).collect();
		assert_eq!(fields, vec!["zeta", "alpha"]);
		let names: Vec<&str> = files["zeta"].iter().map(|f| f.name.as_str()).collect();
		assert_eq!(names, vec!["z.txt", "y.txt"]);
	}
}

// ============================================================================
// Crop
// ============================================================================

mod crop_tests {
	use super::*;

	#[rstest]
	fn test_stage_crop_writes_cropped_image(context: StoreContext) {
		let source = context.incoming_png("tmp-img", 64, 48);
		let mut flash = context.store.open("crop1").unwrap();

		let descriptor = flash
			.stage_crop(
				"avatar",
				PendingUpload::new("me.png", &source, context.destination().join("me.png")),
				CropRegion::new(8.0, 4.0, 16.0, 12.0),
			)
			.unwrap()
			.clone();

		assert_eq!(descriptor.crop, Some(CropRegion::new(8.0, 4.0, 16.0, 12.0)));
		let staged = image::open(&descriptor.storage_path).unwrap();
		assert_eq!(staged.dimensions(), (16, 12));
	}

	#[rstest]
	fn test_stage_crop_out_of_bounds(context: StoreContext) {
		let source = context.incoming_png("tmp-img2", 10, 10);
		let mut flash = context.store.open("crop2").unwrap();

		let err = flash
			.stage_crop(
				"avatar",
				PendingUpload::new("me.png", &source, context.destination().join("me.png")),
				CropRegion::new(12.0, 0.0, 4.0, 4.0),
			)
			.unwrap_err();

		assert!(err.is_input_error());
		assert!(flash.files_by_field().is_empty());
		assert!(source.exists());
	}
}

// ============================================================================
// Lifecycle
// ============================================================================

mod lifecycle_tests {
	use super::*;

	#[rstest]
	fn test_open_is_lazy(context: StoreContext) {
		let flash = context.store.open("life1").unwrap();
		assert!(!flash.exists());
		assert!(!context.store.exists("life1").unwrap());
	}

	#[rstest]
	fn test_save_then_reopen(context: StoreContext) {
		let source = context.incoming_file("u", b"abc");
		let mut flash = context.store.open("life2").unwrap();
		flash.set_url("/contact").set_user(Some("ada".to_string()));
		flash
			.stage_upload(
				"doc",
				PendingUpload::new("n.txt", &source, context.destination().join("n.txt")),
			)
			.unwrap();
		let mut data = Map::new();
		data.insert("email".to_string(), json!("ada@example.com"));
		flash.set_data(data);
		flash.save().unwrap();
		assert!(flash.exists());

		let reopened = context.store.open("life2").unwrap();
		assert!(reopened.exists());
		assert_eq!(reopened.url(), Some("/contact"));
		assert_eq!(reopened.user(), Some("ada"));
		assert_eq!(reopened.data().unwrap()["email"], "ada@example.com");
		assert!(reopened.file("doc", "n.txt").unwrap().is_staged());
	}

	#[rstest]
	fn test_remove_file_is_idempotent(context: StoreContext) {
		let source = context.incoming_file("r", b"abc");
		let mut flash = context.store.open("life3").unwrap();
		let staged = flash
			.stage_upload(
				"doc",
				PendingUpload::new("r.txt", &source, context.destination().join("r.txt")),
			)
			.unwrap()
			.storage_path
			.clone();

		flash.remove_file("r.txt", "doc").unwrap();
		flash.remove_file("r.txt", "doc").unwrap();
		flash.remove_file("other.txt", "missing").unwrap();

		assert!(!staged.exists());
		assert!(flash.files_by_field().is_empty());
	}

	#[rstest]
	fn test_move_then_delete(context: StoreContext) {
		let source = context.incoming_file("m", b"payload");
		let mut flash = context.store.open("life4").unwrap();
		flash
			.stage_upload(
				"doc",
				PendingUpload::new("m.txt", &source, context.destination().join("m.txt")),
			)
			.unwrap();
		flash.save().unwrap();

		let target = flash.move_to_destination("doc", "m.txt", None).unwrap();
		assert_eq!(std::fs::read(&target).unwrap(), b"payload");
		assert!(flash.file("doc", "m.txt").unwrap().moved);

		let err = flash.move_to_destination("doc", "m.txt", None).unwrap_err();
		assert!(matches!(err, StorageError::AlreadyMoved(_)));

		flash.delete().unwrap();
		assert!(!flash.exists());
		assert!(flash.files_by_field().is_empty());
		assert!(!context.store.exists("life4").unwrap());
		assert!(target.exists());
	}

	#[rstest]
	fn test_move_with_override(context: StoreContext) {
		let source = context.incoming_file("o", b"x");
		let mut flash = context.store.open("life5").unwrap();
		flash
			.stage_upload(
				"doc",
				PendingUpload::new("o.txt", &source, context.destination().join("o.txt")),
			)
			.unwrap();

		let override_path = context.dir.path().join("elsewhere").join("o.txt");
		let target = flash
			.move_to_destination("doc", "o.txt", Some(&override_path))
			.unwrap();

		assert_eq!(target, override_path);
		assert!(override_path.exists());
	}

	#[rstest]
	fn test_move_unknown_file(context: StoreContext) {
		let mut flash = context.store.open("life6").unwrap();
		let err = flash.move_to_destination("doc", "nope", None).unwrap_err();
		assert!(matches!(err, StorageError::NotStaged { .. }));
	}

	#[rstest]
	#[case("../../etc")]
	#[case("has space")]
	fn test_open_rejects_unsafe_id(context: StoreContext, #[case] id: &str) {
		let err = context.store.open(id).err().unwrap();
		assert!(matches!(err, StorageError::InvalidId(_)));
	}
}
