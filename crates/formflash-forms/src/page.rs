//! Page collaborator and upload destination tokens.

use crate::definition::FormDefinition;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Page a form is declared on.
pub trait Page: Send + Sync {
	fn route(&self) -> &str;

	fn slug(&self) -> &str;

	/// Directory holding the page's files.
	fn path(&self) -> &Path;

	/// Validation rules declared in the page header.
	fn rules(&self) -> &Map<String, Value>;

	/// Default form data declared in the page header.
	fn header_data(&self) -> &Map<String, Value>;

	/// Forms declared on the page, in declaration order.
	fn forms(&self) -> &IndexMap<String, FormDefinition>;

	/// Directory of the page at `route`, if any.
	fn find_route(&self, route: &str) -> Option<PathBuf> {
		let _ = route;
		None
	}
}

/// In-memory [`Page`].
///
/// # Examples
///
/// ```
/// use formflash_forms::page::{Page, StaticPage};
///
/// let page = StaticPage::new("/company/contact", "/srv/pages/02.company/contact");
///
/// assert_eq!(page.slug(), "contact");
/// assert!(page.forms().is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticPage {
	route: String,
	slug: String,
	path: PathBuf,
	rules: Map<String, Value>,
	header_data: Map<String, Value>,
	forms: IndexMap<String, FormDefinition>,
	routes: HashMap<String, PathBuf>,
}

impl StaticPage {
	/// Page at `route` stored in `path`. The slug is the last route segment.
	pub fn new(route: impl Into<String>, path: impl Into<PathBuf>) -> Self {
		let route = route.into();
		let slug = route
			.trim_end_matches('/')
			.rsplit('/')
			.next()
			.unwrap_or_default()
			.to_string();
		Self {
			route,
			slug,
			path: path.into(),
			..Default::default()
		}
	}

	pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
		self.slug = slug.into();
		self
	}

	pub fn with_rules(mut self, rules: Map<String, Value>) -> Self {
		self.rules = rules;
		self
	}

	pub fn with_header_data(mut self, data: Map<String, Value>) -> Self {
		self.header_data = data;
		self
	}

	pub fn with_form(mut self, name: impl Into<String>, form: FormDefinition) -> Self {
		self.forms.insert(name.into(), form);
		self
	}

	/// Make the page at `route` reachable through `page@:` destinations.
	pub fn with_linked_page(mut self, route: impl Into<String>, path: impl Into<PathBuf>) -> Self {
		self.routes.insert(route.into(), path.into());
		self
	}
}

impl Page for StaticPage {
	fn route(&self) -> &str {
		&self.route
	}

	fn slug(&self) -> &str {
		&self.slug
	}

	fn path(&self) -> &Path {
		&self.path
	}

	fn rules(&self) -> &Map<String, Value> {
		&self.rules
	}

	fn header_data(&self) -> &Map<String, Value> {
		&self.header_data
	}

	fn forms(&self) -> &IndexMap<String, FormDefinition> {
		&self.forms
	}

	fn find_route(&self, route: &str) -> Option<PathBuf> {
		if route == self.route {
			return Some(self.path.clone());
		}
		self.routes.get(route).cloned()
	}
}

/// Resolves destination tokens against a page and a root directory.
///
/// Supported tokens:
///
/// - `self@` or `@self`, optionally followed by a sub-path: the page
///   directory
/// - `page@:/route` or `@page:/route`: the directory of another page
/// - an absolute path, kept as is
/// - a relative path, joined to the root directory
///
/// Any other `xxx@` token does not resolve.
///
/// # Examples
///
/// ```
/// use formflash_forms::page::{Destinations, StaticPage};
/// use std::path::{Path, PathBuf};
///
/// let page = StaticPage::new("/contact", "/site/pages/contact")
///     .with_linked_page("/blog", "/site/pages/blog");
/// let destinations = Destinations::new(&page, Path::new("/site"));
///
/// assert_eq!(destinations.resolve("self@/"), Some(PathBuf::from("/site/pages/contact")));
/// assert_eq!(destinations.resolve("@self/cv"), Some(PathBuf::from("/site/pages/contact/cv")));
/// assert_eq!(destinations.resolve("page@:/blog"), Some(PathBuf::from("/site/pages/blog")));
/// assert_eq!(destinations.resolve("user/data"), Some(PathBuf::from("/site/user/data")));
/// assert_eq!(destinations.resolve("theme@:/img"), None);
/// ```
#[derive(Clone, Copy)]
pub struct Destinations<'a> {
	page: &'a dyn Page,
	root: &'a Path,
}

impl<'a> Destinations<'a> {
	pub fn new(page: &'a dyn Page, root: &'a Path) -> Self {
		Self { page, root }
	}

	pub fn resolve(&self, token: &str) -> Option<PathBuf> {
		let token = token.trim();
		let trimmed = token.trim_end_matches('/');
		let token = if trimmed.is_empty() { token } else { trimmed };
		if token.is_empty() {
			return None;
		}

		for prefix in ["self@", "@self"] {
			if let Some(rest) = token.strip_prefix(prefix) {
				return Some(join_sub_path(self.page.path(), rest));
			}
		}

		for prefix in ["page@:", "@page:"] {
			if let Some(route) = token.strip_prefix(prefix) {
				return self.page.find_route(route);
			}
		}

		if is_stream_token(token) {
			return None;
		}

		let path = Path::new(token);
		if path.is_absolute() {
			Some(path.to_path_buf())
		} else {
			Some(self.root.join(path))
		}
	}
}

impl std::fmt::Debug for Destinations<'_> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Destinations")
			.field("page", &self.page.route())
			.field("root", &self.root)
			.finish()
	}
}

fn join_sub_path(base: &Path, rest: &str) -> PathBuf {
	let rest = rest.trim_start_matches('/');
	if rest.is_empty() {
		base.to_path_buf()
	} else {
		base.join(rest)
	}
}

/// `name@...` or `@name...` before any path separator.
fn is_stream_token(token: &str) -> bool {
	let head = token.split('/').next().unwrap_or_default();
	head.starts_with('@') || head.contains('@')
}
