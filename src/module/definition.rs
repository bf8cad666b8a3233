use std::any::Any;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;

use crate::controller::Controller;

use super::Module;

/// Builds a fresh controller for a module.
pub type ControllerFactory = Rc<dyn Fn() -> Box<dyn Controller>>;

/// Builds a facade or helper for the module that requested it.
pub type ServiceFactory = Rc<dyn Fn(&Module) -> Rc<dyn Any>>;

pub(crate) const CONTROLLERS_PREFIX: &str = "controllers::";
pub(crate) const FACADES_PREFIX: &str = "facades::";
pub(crate) const HELPERS_PREFIX: &str = "controllers::helpers::";

/// Something a module provides under a qualified name.
#[derive(Clone)]
pub enum Resource {
    Controller(ControllerFactory),
    Facade(ServiceFactory),
    Helper(ServiceFactory),
}

impl Resource {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Resource::Controller(_) => "controller",
            Resource::Facade(_) => "facade",
            Resource::Helper(_) => "helper",
        }
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Resource::{}", self.kind())
    }
}

/// Declaration of a module: its namespace, flags, links and resources.
///
/// ```rust,ignore
/// let blog = ModuleDefinition::new("modules::blog")
///     .extends("modules::base")
///     .with_partial("modules::comments")
///     .controller("Post", || Box::new(PostController::default()))
///     .facade("posts", |module| PostStore::for_module(module));
/// ```
#[derive(Clone, Debug)]
pub struct ModuleDefinition {
    pub(crate) namespace: String,
    pub(crate) is_abstract: bool,
    pub(crate) is_final: bool,
    pub(crate) is_partial: bool,
    pub(crate) parent: Option<String>,
    pub(crate) partials: Vec<String>,
    pub(crate) index_controller: String,
    pub(crate) base_path: Option<PathBuf>,
    pub(crate) resources: BTreeMap<String, Resource>,
}

impl ModuleDefinition {
    /// Namespaces without `::` are placed under `modules::`.
    pub fn new(namespace: &str) -> Self {
        Self {
            namespace: qualify_namespace(namespace),
            is_abstract: false,
            is_final: false,
            is_partial: false,
            parent: None,
            partials: Vec::new(),
            index_controller: "Index".to_string(),
            base_path: None,
            resources: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    #[must_use]
    pub fn abstract_module(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    #[must_use]
    pub fn final_module(mut self) -> Self {
        self.is_final = true;
        self
    }

    #[must_use]
    pub fn partial_module(mut self) -> Self {
        self.is_partial = true;
        self
    }

    #[must_use]
    pub fn extends(mut self, parent: &str) -> Self {
        self.parent = Some(qualify_namespace(parent));
        self
    }

    /// Compose `partial` into this module. Partials are searched in the order
    /// they were added, before the parent.
    #[must_use]
    pub fn with_partial(mut self, partial: &str) -> Self {
        self.partials.push(qualify_namespace(partial));
        self
    }

    #[must_use]
    pub fn index_controller(mut self, name: &str) -> Self {
        self.index_controller = normalize_controller_name(name);
        self
    }

    #[must_use]
    pub fn base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn controller<C, F>(mut self, name: &str, factory: F) -> Self
    where
        C: Controller + 'static,
        F: Fn() -> C + 'static,
    {
        let factory: ControllerFactory = Rc::new(move || Box::new(factory()) as Box<dyn Controller>);
        self.resources.insert(
            format!("{CONTROLLERS_PREFIX}{}", normalize_controller_name(name)),
            Resource::Controller(factory),
        );
        self
    }

    #[must_use]
    pub fn facade<T, F>(mut self, name: &str, factory: F) -> Self
    where
        T: Any,
        F: Fn(&Module) -> T + 'static,
    {
        let factory: ServiceFactory = Rc::new(move |module| Rc::new(factory(module)) as Rc<dyn Any>);
        self.resources
            .insert(format!("{FACADES_PREFIX}{name}"), Resource::Facade(factory));
        self
    }

    #[must_use]
    pub fn helper<T, F>(mut self, name: &str, factory: F) -> Self
    where
        T: Any,
        F: Fn(&Module) -> T + 'static,
    {
        let factory: ServiceFactory = Rc::new(move |module| Rc::new(factory(module)) as Rc<dyn Any>);
        self.resources
            .insert(format!("{HELPERS_PREFIX}{name}"), Resource::Helper(factory));
        self
    }

    /// Register a resource under an explicit qualified name.
    #[must_use]
    pub fn resource(mut self, qualified_name: &str, resource: Resource) -> Self {
        self.resources.insert(qualified_name.to_string(), resource);
        self
    }
}

/// All module definitions an application can instantiate, by namespace.
#[derive(Clone, Debug, Default)]
pub struct ModuleCatalog {
    definitions: BTreeMap<String, ModuleDefinition>,
}

impl ModuleCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a definition.
    #[must_use]
    pub fn with(mut self, definition: ModuleDefinition) -> Self {
        self.add(definition);
        self
    }

    pub fn add(&mut self, definition: ModuleDefinition) {
        self.definitions
            .insert(definition.namespace.clone(), definition);
    }

    #[must_use]
    pub fn get(&self, namespace: &str) -> Option<&ModuleDefinition> {
        self.definitions.get(namespace)
    }

    /// The first inheritance cycle reachable from `namespace` through parent
    /// and partial declarations, as the pair of namespaces whose link closes
    /// it. Undefined namespaces end a chain without error.
    #[must_use]
    pub fn find_cycle(&self, namespace: &str) -> Option<(String, String)> {
        let mut path = Vec::new();
        let mut cleared = HashSet::new();
        self.walk_links(namespace, &mut path, &mut cleared)
    }

    fn walk_links(
        &self,
        namespace: &str,
        path: &mut Vec<String>,
        cleared: &mut HashSet<String>,
    ) -> Option<(String, String)> {
        if cleared.contains(namespace) {
            return None;
        }
        let definition = self.get(namespace)?;
        path.push(namespace.to_string());
        for linked in definition.parent.iter().chain(&definition.partials) {
            if path.iter().any(|seen| seen == linked) {
                return Some((namespace.to_string(), linked.clone()));
            }
            if let Some(cycle) = self.walk_links(linked, path, cleared) {
                return Some(cycle);
            }
        }
        path.pop();
        cleared.insert(namespace.to_string());
        None
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

/// `blog` becomes `modules::blog`; namespaces containing `::` are kept.
#[must_use]
pub fn qualify_namespace(namespace: &str) -> String {
    let trimmed = namespace.trim_start_matches("::");
    if trimmed.contains("::") {
        trimmed.to_string()
    } else {
        format!("modules::{trimmed}")
    }
}

/// Upper-case the first character of the last `::` segment.
#[must_use]
pub fn normalize_controller_name(name: &str) -> String {
    let (head, last) = match name.rfind("::") {
        Some(pos) => (&name[..pos + 2], &name[pos + 2..]),
        None => ("", name),
    };
    let mut chars = last.chars();
    match chars.next() {
        Some(first) => format!("{head}{}{}", first.to_uppercase(), chars.as_str()),
        None => name.to_string(),
    }
}
