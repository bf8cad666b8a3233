//! Template rendering collaborator.
//!
//! The engine only assigns variables and renders templates by name;
//! [`MiniJinjaView`] is the stock implementation on top of `minijinja`.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use minijinja::{Environment, Error as TemplateError, ErrorKind, Value};

/// A module's view.
pub trait View {
    /// Make `value` available to every template rendered afterwards.
    fn assign(&self, key: &str, value: serde_json::Value);

    /// Like [`View::assign`] for already rendered markup, which is inserted
    /// without escaping.
    fn assign_html(&self, key: &str, html: String);

    /// Render the template named `template` (without extension).
    fn render(&self, template: &str) -> anyhow::Result<String>;
}

/// `minijinja` backed [`View`].
///
/// Templates are looked up by name plus extension (default `.html`). A view
/// built with [`MiniJinjaView::from_dirs`] searches its directories in order,
/// so a theme directory listed first overrides the plain templates.
pub struct MiniJinjaView {
    env: Environment<'static>,
    extension: String,
    context: RefCell<BTreeMap<String, Value>>,
}

impl MiniJinjaView {
    /// A view with no templates; add some with [`MiniJinjaView::add_template`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            env: Environment::new(),
            extension: ".html".to_string(),
            context: RefCell::new(BTreeMap::new()),
        }
    }

    /// Load templates from `dirs`, first match wins.
    #[must_use]
    pub fn from_dirs(dirs: Vec<PathBuf>) -> Self {
        let mut view = Self::new();
        view.env.set_loader(move |name| {
            for dir in &dirs {
                let Some(path) = map_path(dir, name) else {
                    return Ok(None);
                };
                if path.is_file() {
                    return fs::read_to_string(&path).map(Some).map_err(|e| {
                        TemplateError::new(
                            ErrorKind::InvalidOperation,
                            format!("could not read template {}", path.display()),
                        )
                        .with_source(e)
                    });
                }
            }
            Ok(None)
        });
        view
    }

    /// Directories searched for a module's templates: theme directories
    /// before plain ones, module specific before shared.
    #[must_use]
    pub fn search_path(template_dir: &Path, module: &str, theme: Option<&str>) -> Vec<PathBuf> {
        let mut dirs = Vec::new();
        if let Some(theme) = theme {
            let themed = template_dir.join(theme);
            dirs.push(themed.join(module));
            dirs.push(themed);
        }
        dirs.push(template_dir.join(module));
        dirs.push(template_dir.to_path_buf());
        dirs
    }

    #[must_use]
    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = extension.to_string();
        self
    }

    /// Register an in-memory template. `name` is the template name without
    /// extension, e.g. `post/read`.
    pub fn add_template(&mut self, name: &str, source: &str) -> anyhow::Result<()> {
        self.env
            .add_template_owned(format!("{name}{}", self.extension), source.to_string())?;
        Ok(())
    }

    /// Variables assigned so far.
    #[must_use]
    pub fn assigned(&self) -> Vec<String> {
        self.context.borrow().keys().cloned().collect()
    }
}

impl Default for MiniJinjaView {
    fn default() -> Self {
        Self::new()
    }
}

impl View for MiniJinjaView {
    fn assign(&self, key: &str, value: serde_json::Value) {
        self.context
            .borrow_mut()
            .insert(key.to_string(), Value::from_serialize(&value));
    }

    fn assign_html(&self, key: &str, html: String) {
        self.context
            .borrow_mut()
            .insert(key.to_string(), Value::from_safe_string(html));
    }

    fn render(&self, template: &str) -> anyhow::Result<String> {
        let name = format!("{template}{}", self.extension);
        let tmpl = self.env.get_template(&name)?;
        let context = self.context.borrow().clone();
        Ok(tmpl.render(context)?)
    }
}

/// Join a template name onto `base`, rejecting anything that would leave it.
fn map_path(base: &Path, name: &str) -> Option<PathBuf> {
    let mut path = base.to_path_buf();
    for component in Path::new(name.trim_start_matches('/')).components() {
        match component {
            Component::Normal(segment) => path.push(segment),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_map_path_prevents_traversal() {
        let base = Path::new("templates");
        assert!(map_path(base, "../secret.html").is_none());
        assert_eq!(
            map_path(base, "post/read.html"),
            Some(PathBuf::from("templates/post/read.html"))
        );
    }

    #[test]
    fn test_render_in_memory_template_escapes_values() {
        let mut view = MiniJinjaView::new();
        view.add_template("post/read", "<h1>{{ title }}</h1>{{ body }}")
            .unwrap();
        view.assign("title", json!("A & B"));
        view.assign_html("body", "<p>raw</p>".to_string());

        assert_eq!(
            view.render("post/read").unwrap(),
            "<h1>A &amp; B</h1><p>raw</p>"
        );
    }

    #[test]
    fn test_missing_template_is_an_error() {
        let view = MiniJinjaView::new();
        assert!(view.render("nope").is_err());
    }

    #[test]
    fn test_dirs_are_searched_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let theme = dir.path().join("dark");
        fs::create_dir_all(&theme).unwrap();
        fs::write(dir.path().join("master.html"), "plain").unwrap();
        fs::write(theme.join("master.html"), "dark").unwrap();
        fs::write(dir.path().join("index.html"), "shared").unwrap();

        let view = MiniJinjaView::from_dirs(MiniJinjaView::search_path(
            dir.path(),
            "blog",
            Some("dark"),
        ));
        assert_eq!(view.render("master").unwrap(), "dark");
        assert_eq!(view.render("index").unwrap(), "shared");
    }
}
