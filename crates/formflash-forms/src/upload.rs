//! Validation of incoming file uploads.

use crate::config::FilesConfig;
use crate::i18n::{Translator, keys};
use crate::page::Destinations;
use crate::settings::UploadSettings;
use crate::{FormError, FormResult};
use chrono::Local;
use rand::distributions::{Alphanumeric, DistString};
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Length of generated random file names, extension excluded.
pub const RANDOM_NAME_LENGTH: usize = 15;

/// Longest accepted filename, in bytes.
const MAX_FILENAME_LENGTH: usize = 255;

/// Transport-level outcome reported by the request layer for one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UploadErrorCode {
	#[default]
	Ok,
	IniSize,
	FormSize,
	Partial,
	NoFile,
	NoTmpDir,
	CantWrite,
	Extension,
}

impl UploadErrorCode {
	/// Map the numeric codes used by multipart front ends. Unknown codes
	/// map to `CantWrite`.
	pub fn from_code(code: u8) -> Self {
		match code {
			0 => UploadErrorCode::Ok,
			1 => UploadErrorCode::IniSize,
			2 => UploadErrorCode::FormSize,
			3 => UploadErrorCode::Partial,
			4 => UploadErrorCode::NoFile,
			6 => UploadErrorCode::NoTmpDir,
			8 => UploadErrorCode::Extension,
			_ => UploadErrorCode::CantWrite,
		}
	}

	pub fn description(&self) -> &'static str {
		match self {
			UploadErrorCode::Ok => "There is no error, the file uploaded with success",
			UploadErrorCode::IniSize => {
				"The uploaded file exceeds the maximum upload size of the server"
			}
			UploadErrorCode::FormSize => {
				"The uploaded file exceeds the maximum size specified in the HTML form"
			}
			UploadErrorCode::Partial => "The uploaded file was only partially uploaded",
			UploadErrorCode::NoFile => "No file was uploaded",
			UploadErrorCode::NoTmpDir => "Missing a temporary folder",
			UploadErrorCode::CantWrite => "Failed to write file to disk",
			UploadErrorCode::Extension => "An extension stopped the file upload",
		}
	}
}

impl fmt::Display for UploadErrorCode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.description())
	}
}

/// One file entry of a multipart request.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
	/// Filename sent by the client.
	pub name: String,
	/// MIME type declared by the client. Never used for acceptance.
	pub declared_type: String,
	pub size: u64,
	/// Temporary file written by the request layer.
	pub tmp_path: PathBuf,
	pub error: UploadErrorCode,
}

impl UploadedFile {
	pub fn new(name: impl Into<String>, tmp_path: impl Into<PathBuf>, size: u64) -> Self {
		Self {
			name: name.into(),
			declared_type: "application/octet-stream".to_string(),
			size,
			tmp_path: tmp_path.into(),
			error: UploadErrorCode::Ok,
		}
	}

	pub fn with_declared_type(mut self, declared_type: impl Into<String>) -> Self {
		self.declared_type = declared_type.into();
		self
	}

	pub fn with_error(mut self, error: UploadErrorCode) -> Self {
		self.error = error;
		self
	}
}

/// Why one `accept` pattern did not match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
	Mime {
		mime: String,
		filename: String,
		pattern: String,
	},
	Extension {
		filename: String,
		pattern: String,
	},
}

impl Rejection {
	pub fn pattern(&self) -> &str {
		match self {
			Rejection::Mime { pattern, .. } | Rejection::Extension { pattern, .. } => pattern,
		}
	}

	pub fn localized(&self, translator: &dyn Translator) -> String {
		match self {
			Rejection::Mime {
				mime,
				filename,
				pattern,
			} => translator.translate(
				keys::INVALID_MIME_TYPE,
				&[mime.as_str(), filename.as_str(), pattern.as_str()],
			),
			Rejection::Extension { filename, pattern } => translator.translate(
				keys::INVALID_FILE_EXTENSION,
				&[filename.as_str(), pattern.as_str()],
			),
		}
	}
}

/// Upload accepted by [`UploadValidator::validate`].
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedUpload {
	/// Final filename.
	pub filename: String,
	/// Final path, destination directory joined with the filename.
	pub path: PathBuf,
	/// MIME type derived from the filename.
	pub mime_type: String,
}

/// MIME type derived from a filename. The client-declared type is never
/// consulted.
///
/// # Examples
///
/// ```
/// use formflash_forms::upload::sniff_mime;
///
/// assert_eq!(sniff_mime("photo.PNG"), "image/png");
/// assert_eq!(sniff_mime("no-extension"), "application/octet-stream");
/// ```
pub fn sniff_mime(filename: &str) -> String {
	mime_guess::from_path(filename)
		.first_or_octet_stream()
		.essence_str()
		.to_string()
}

/// Filename and type policy for uploads.
#[derive(Debug, Clone)]
pub struct UploadValidator {
	dangerous_extensions: Vec<String>,
	case_sensitive_extensions: bool,
}

impl UploadValidator {
	pub fn new(dangerous_extensions: Vec<String>, case_sensitive_extensions: bool) -> Self {
		Self {
			dangerous_extensions: dangerous_extensions
				.into_iter()
				.map(|e| e.trim_start_matches('.').to_lowercase())
				.collect(),
			case_sensitive_extensions,
		}
	}

	pub fn from_config(files: &FilesConfig) -> Self {
		Self::new(
			files.dangerous_extensions.clone(),
			files.case_sensitive_extensions,
		)
	}

	/// Check `file`, uploaded as `filename`, against `settings`.
	///
	/// Checks run in order and stop at the first failure: transport code,
	/// filename safety, destination, accepted types, size. On success the
	/// filename is randomized and/or prefixed with a timestamp according
	/// to the settings.
	pub fn validate(
		&self,
		file: &UploadedFile,
		filename: &str,
		settings: &UploadSettings,
		destinations: &Destinations<'_>,
	) -> FormResult<AcceptedUpload> {
		if file.error != UploadErrorCode::Ok {
			return Err(FormError::UploadTransport {
				filename: filename.to_string(),
				code: file.error,
			});
		}

		if !self.is_safe_filename(filename) {
			return Err(FormError::UnsafeFilename(filename.to_string()));
		}

		let destination = destinations
			.resolve(&settings.destination)
			.ok_or_else(|| FormError::NoDestination(settings.destination.clone()))?;

		let mime_type = sniff_mime(filename);
		self.check_accept(filename, &mime_type, &settings.accept)?;

		if settings.filesize > 0 && file.size > settings.filesize {
			return Err(FormError::FilesizeExceeded {
				filename: filename.to_string(),
				size: file.size,
				limit: settings.filesize,
			});
		}

		let mut filename = filename.to_string();
		if settings.random_name {
			filename = random_name(&filename);
		}
		if settings.avoid_overwriting && destination.join(&filename).exists() {
			filename = format!("{}-{}", Local::now().format("%Y%m%d%H%M%S"), filename);
		}

		Ok(AcceptedUpload {
			path: destination.join(&filename),
			filename,
			mime_type,
		})
	}

	/// Reject empty and overlong names, names starting or ending with a dot
	/// or space, `..`, path separators, control characters and dangerous
	/// extensions.
	///
	/// # Examples
	///
	/// ```
	/// use formflash_forms::FormsConfig;
	/// use formflash_forms::upload::UploadValidator;
	///
	/// let validator = UploadValidator::from_config(&FormsConfig::default().files);
	///
	/// assert!(validator.is_safe_filename("report.pdf"));
	/// assert!(!validator.is_safe_filename("../etc/passwd"));
	/// assert!(!validator.is_safe_filename("shell.PHP"));
	/// assert!(!validator.is_safe_filename(".."));
	/// ```
	pub fn is_safe_filename(&self, filename: &str) -> bool {
		if filename.is_empty()
			|| filename == "."
			|| filename == ".."
			|| filename.len() > MAX_FILENAME_LENGTH
			|| filename.trim_matches(|c: char| c == '.' || c == ' ') != filename
			|| filename.contains("..")
			|| filename.contains(['/', '\\'])
			|| filename.chars().any(char::is_control)
		{
			return false;
		}

		match Path::new(filename).extension().and_then(|e| e.to_str()) {
			Some(ext) => !self.dangerous_extensions.contains(&ext.to_lowercase()),
			None => true,
		}
	}

	fn check_accept(&self, filename: &str, mime: &str, accept: &[String]) -> FormResult<()> {
		let mut rejections = Vec::new();

		for pattern in accept {
			if pattern == "*" {
				return Ok(());
			}

			let is_mime = pattern.contains('/');
			let subject = if is_mime { mime } else { filename };
			let case_insensitive = is_mime || !self.case_sensitive_extensions;

			let matched = RegexBuilder::new(&format!("{}$", pattern_regex(pattern)))
				.case_insensitive(case_insensitive)
				.build()
				.map(|re| re.is_match(subject))
				.unwrap_or(false);

			if matched {
				return Ok(());
			}

			rejections.push(if is_mime {
				Rejection::Mime {
					mime: mime.to_string(),
					filename: filename.to_string(),
					pattern: pattern.clone(),
				}
			} else {
				Rejection::Extension {
					filename: filename.to_string(),
					pattern: pattern.clone(),
				}
			});
		}

		Err(FormError::TypeNotAccepted {
			filename: filename.to_string(),
			rejections,
		})
	}
}

impl Default for UploadValidator {
	fn default() -> Self {
		Self::from_config(&FilesConfig::default())
	}
}

/// Regex source of an accept pattern: literal text with `*` as wildcard.
fn pattern_regex(pattern: &str) -> String {
	pattern
		.split('*')
		.map(regex::escape)
		.collect::<Vec<_>>()
		.join(".*")
}

/// Random base name keeping the extension of `filename`.
fn random_name(filename: &str) -> String {
	let base = Alphanumeric.sample_string(&mut rand::thread_rng(), RANDOM_NAME_LENGTH);
	match Path::new(filename).extension().and_then(|e| e.to_str()) {
		Some(ext) => format!("{}.{}", base, ext),
		None => base,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::FormsConfig;
	use crate::page::{Page, StaticPage};
	use proptest::prelude::*;
	use rstest::{fixture, rstest};
	use tempfile::TempDir;

	struct Scene {
		dir: TempDir,
		page: StaticPage,
	}

	impl Scene {
		fn destinations(&self) -> Destinations<'_> {
			Destinations::new(&self.page, self.dir.path())
		}
	}

	#[fixture]
	fn scene() -> Scene {
		let dir = TempDir::new().unwrap();
		let page = StaticPage::new("/contact", dir.path().join("pages/contact"));
		Scene { dir, page }
	}

	fn settings(accept: &[&str]) -> UploadSettings {
		let mut settings = UploadSettings::defaults("file", &FormsConfig::default());
		settings.accept = accept.iter().map(|a| a.to_string()).collect();
		settings.filesize = 0;
		settings
	}

	fn upload(name: &str, size: u64) -> UploadedFile {
		UploadedFile::new(name, "/tmp/upload", size).with_declared_type("image/png")
	}

	#[rstest]
	fn test_transport_error_comes_first(scene: Scene) {
		let file = upload("../bad.php", 1).with_error(UploadErrorCode::NoTmpDir);
		let err = UploadValidator::default()
			.validate(&file, "../bad.php", &settings(&["*"]), &scene.destinations())
			.unwrap_err();
		assert!(matches!(
			err,
			FormError::UploadTransport {
				code: UploadErrorCode::NoTmpDir,
				..
			}
		));
	}

	#[rstest]
	fn test_unsafe_before_destination(scene: Scene) {
		let mut s = settings(&["*"]);
		s.destination = "nowhere@".to_string();
		let err = UploadValidator::default()
			.validate(&upload("x.phtml", 1), "x.phtml", &s, &scene.destinations())
			.unwrap_err();
		assert!(matches!(err, FormError::UnsafeFilename(_)));
	}

	#[rstest]
	#[case("shell.php.")]
	#[case(".htaccess")]
	#[case("shell.php ")]
	#[case(" x.png")]
	#[case("a..b.png")]
	#[case("...")]
	fn test_dotted_and_padded_names_are_unsafe(#[case] name: &str) {
		assert!(!UploadValidator::default().is_safe_filename(name));
	}

	#[rstest]
	#[case("photo.png")]
	#[case("my photo.final.png")]
	#[case("README")]
	fn test_plain_names_are_safe(#[case] name: &str) {
		assert!(UploadValidator::default().is_safe_filename(name));
	}

	#[rstest]
	fn test_trailing_dot_does_not_hide_dangerous_extension(scene: Scene) {
		let err = UploadValidator::default()
			.validate(&upload("shell.php.", 1), "shell.php.", &settings(&["*"]), &scene.destinations())
			.unwrap_err();
		assert!(matches!(err, FormError::UnsafeFilename(_)));
	}

	#[rstest]
	fn test_unresolvable_destination(scene: Scene) {
		let mut s = settings(&["*"]);
		s.destination = "theme@:/images".to_string();
		let err = UploadValidator::default()
			.validate(&upload("a.png", 1), "a.png", &s, &scene.destinations())
			.unwrap_err();
		assert!(matches!(err, FormError::NoDestination(_)));
	}

	#[rstest]
	fn test_mime_uses_sniffed_type(scene: Scene) {
		// Declared type says image/png; the name says otherwise.
		let err = UploadValidator::default()
			.validate(&upload("notes.txt", 1), "notes.txt", &settings(&["image/*"]), &scene.destinations())
			.unwrap_err();

		let FormError::TypeNotAccepted { rejections, .. } = err else {
			panic!("expected TypeNotAccepted");
		};
		assert_eq!(
			rejections,
			vec![Rejection::Mime {
				mime: "text/plain".to_string(),
				filename: "notes.txt".to_string(),
				pattern: "image/*".to_string(),
			}]
		);
	}

	#[rstest]
	fn test_every_rejected_pattern_is_reported(scene: Scene) {
		let err = UploadValidator::default()
			.validate(&upload("tool.exe", 1), "tool.exe", &settings(&[".jpg", ".png"]), &scene.destinations())
			.unwrap_err();

		let FormError::TypeNotAccepted { rejections, .. } = err else {
			panic!("expected TypeNotAccepted");
		};
		let patterns: Vec<&str> = rejections.iter().map(Rejection::pattern).collect();
		assert_eq!(patterns, vec![".jpg", ".png"]);
	}

	#[rstest]
	#[case(true, "photo.JPG", false)]
	#[case(false, "photo.JPG", true)]
	#[case(true, "photo.jpg", true)]
	#[case(true, "photojpg", false)]
	fn test_extension_case_rules(
		scene: Scene,
		#[case] case_sensitive: bool,
		#[case] filename: &str,
		#[case] accepted: bool,
	) {
		let validator = UploadValidator::new(vec![], case_sensitive);
		let result = validator.validate(
			&upload(filename, 1),
			filename,
			&settings(&[".jpg"]),
			&scene.destinations(),
		);
		assert_eq!(result.is_ok(), accepted);
	}

	#[rstest]
	#[case(0, 10_000, true)]
	#[case(100, 100, true)]
	#[case(100, 101, false)]
	fn test_size_limit(scene: Scene, #[case] limit: u64, #[case] size: u64, #[case] accepted: bool) {
		let mut s = settings(&["*"]);
		s.filesize = limit;
		let result = UploadValidator::default().validate(
			&upload("a.png", size),
			"a.png",
			&s,
			&scene.destinations(),
		);
		assert_eq!(result.is_ok(), accepted);
		if !accepted {
			assert!(matches!(result.unwrap_err(), FormError::FilesizeExceeded { .. }));
		}
	}

	#[rstest]
	fn test_random_name_keeps_extension(scene: Scene) {
		let mut s = settings(&["*"]);
		s.random_name = true;
		let accepted = UploadValidator::default()
			.validate(&upload("me.png", 1), "me.png", &s, &scene.destinations())
			.unwrap();

		assert_ne!(accepted.filename, "me.png");
		assert_eq!(accepted.filename.len(), RANDOM_NAME_LENGTH + ".png".len());
		assert!(accepted.filename.ends_with(".png"));
	}

	#[rstest]
	fn test_avoid_overwriting_prefixes_timestamp(scene: Scene) {
		let destination = scene.page.path().to_path_buf();
		std::fs::create_dir_all(&destination).unwrap();
		std::fs::write(destination.join("me.png"), b"existing").unwrap();

		let mut s = settings(&["*"]);
		s.avoid_overwriting = true;
		let accepted = UploadValidator::default()
			.validate(&upload("me.png", 1), "me.png", &s, &scene.destinations())
			.unwrap();

		let (stamp, rest) = accepted.filename.split_once('-').unwrap();
		assert_eq!(rest, "me.png");
		assert_eq!(stamp.len(), 14);
		assert!(stamp.chars().all(|c| c.is_ascii_digit()));
		assert!(!accepted.path.exists());
	}

	#[rstest]
	fn test_avoid_overwriting_keeps_free_name(scene: Scene) {
		let mut s = settings(&["*"]);
		s.avoid_overwriting = true;
		let accepted = UploadValidator::default()
			.validate(&upload("free.png", 1), "free.png", &s, &scene.destinations())
			.unwrap();
		assert_eq!(accepted.filename, "free.png");
		assert_eq!(accepted.path, scene.page.path().join("free.png"));
	}

	proptest! {
		#[test]
		fn prop_star_accepts_everything(name in "[a-zA-Z0-9_]{1,12}(\\.[a-z0-9]{1,4})?") {
			let dir = TempDir::new().unwrap();
			let page = StaticPage::new("/p", dir.path());
			let validator = UploadValidator::new(vec![], true);

			let result = validator.validate(
				&upload(&name, 1),
				&name,
				&settings(&[".never", "*"]),
				&Destinations::new(&page, dir.path()),
			);
			prop_assert!(result.is_ok());
		}

		#[test]
		fn prop_size_rejected_iff_over_limit(limit in 1u64..10_000, size in 0u64..20_000) {
			let dir = TempDir::new().unwrap();
			let page = StaticPage::new("/p", dir.path());
			let mut s = settings(&["*"]);
			s.filesize = limit;

			let result = UploadValidator::default().validate(
				&upload("a.png", size),
				"a.png",
				&s,
				&Destinations::new(&page, dir.path()),
			);
			prop_assert_eq!(result.is_err(), size > limit);
		}

		#[test]
		fn prop_image_pattern_follows_sniffed_mime(stem in "[a-z]{1,8}", ext in "(png|jpg|gif|txt|pdf|csv)") {
			let dir = TempDir::new().unwrap();
			let page = StaticPage::new("/p", dir.path());
			let name = format!("{}.{}", stem, ext);

			let result = UploadValidator::default().validate(
				&upload(&name, 1),
				&name,
				&settings(&["image/*"]),
				&Destinations::new(&page, dir.path()),
			);
			prop_assert_eq!(result.is_ok(), sniff_mime(&name).starts_with("image/"));
		}
	}
}
