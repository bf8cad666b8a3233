//! # Modules
//!
//! A module is a namespace of controllers, facades and helpers. Modules form a
//! prototype chain: each has at most one parent and an ordered list of
//! partials, and a name that a module does not provide itself is looked up in
//! its partials (in the order they were added, recursively) and then in its
//! parent. A derived module therefore reuses everything of its base and
//! overrides only what it declares.
//!
//! Modules are declared up front as [`ModuleDefinition`]s in a
//! [`ModuleCatalog`] and instantiated lazily by the application. Instances
//! live in a [`ModuleArena`] and refer to each other through [`ModuleId`]
//! handles.
//!
//! Flags restrict how modules may be used:
//!
//! - `abstract` modules may be inherited from but never dispatched to
//! - `final` modules may never become a parent
//! - `partial` modules may only be composed into other modules, and only
//!   partial modules may be composed

mod arena;
mod definition;

pub use arena::{ModuleArena, ModuleId, Resolved};
pub use definition::{
    normalize_controller_name, qualify_namespace, ControllerFactory, ModuleCatalog,
    ModuleDefinition, Resource, ServiceFactory,
};
pub(crate) use definition::{CONTROLLERS_PREFIX, FACADES_PREFIX, HELPERS_PREFIX};

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::rc::Rc;

use crate::controller::ControllerInstance;
use crate::plugins::{ModulePlugin, PluginBroker};
use crate::view::View;

/// A live module instance.
pub struct Module {
    id: ModuleId,
    namespace: String,
    name: String,
    is_abstract: bool,
    is_final: bool,
    is_partial: bool,
    parent: Option<ModuleId>,
    partials: Vec<ModuleId>,
    index_controller: String,
    base_path: Option<std::path::PathBuf>,
    resources: BTreeMap<String, Resource>,
    plugins: PluginBroker<dyn ModulePlugin>,
    view: Option<Rc<dyn View>>,
    controllers: HashMap<String, Rc<ControllerInstance>>,
    facades: HashMap<String, Rc<dyn Any>>,
}

impl Module {
    pub(crate) fn from_definition(id: ModuleId, definition: &ModuleDefinition) -> Self {
        let namespace = definition.namespace.clone();
        let name = namespace
            .rsplit("::")
            .next()
            .unwrap_or(namespace.as_str())
            .to_string();
        Self {
            id,
            namespace,
            name,
            is_abstract: definition.is_abstract,
            is_final: definition.is_final,
            is_partial: definition.is_partial,
            parent: None,
            partials: Vec::new(),
            index_controller: definition.index_controller.clone(),
            base_path: definition.base_path.clone(),
            resources: definition.resources.clone(),
            plugins: PluginBroker::new(),
            view: None,
            controllers: HashMap::new(),
            facades: HashMap::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> ModuleId {
        self.id
    }

    /// Full namespace, e.g. `modules::blog`.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Last namespace segment, e.g. `blog`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    pub fn set_abstract(&mut self, is_abstract: bool) {
        self.is_abstract = is_abstract;
    }

    #[must_use]
    pub fn is_final(&self) -> bool {
        self.is_final
    }

    pub fn set_final(&mut self, is_final: bool) {
        self.is_final = is_final;
    }

    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.is_partial
    }

    pub fn set_partial(&mut self, is_partial: bool) {
        self.is_partial = is_partial;
    }

    #[must_use]
    pub fn parent(&self) -> Option<ModuleId> {
        self.parent
    }

    /// Partials in the order they were added.
    #[must_use]
    pub fn partials(&self) -> &[ModuleId] {
        &self.partials
    }

    #[must_use]
    pub fn index_controller_name(&self) -> &str {
        &self.index_controller
    }

    pub fn set_index_controller_name(&mut self, name: &str) {
        self.index_controller = normalize_controller_name(name);
    }

    #[must_use]
    pub fn base_path(&self) -> Option<&Path> {
        self.base_path.as_deref()
    }

    /// Resources this module declares itself, without inherited ones.
    #[must_use]
    pub fn own_resources(&self) -> &BTreeMap<String, Resource> {
        &self.resources
    }

    /// Register a module scope plugin. See [`Application::add_plugin`]
    /// for the naming rules.
    ///
    /// [`Application::add_plugin`]: crate::application::Application::add_plugin
    pub fn add_plugin<T>(&mut self, plugin: Rc<T>, name: Option<&str>) -> String
    where
        T: ModulePlugin + 'static,
    {
        let as_dyn: Rc<dyn ModulePlugin> = Rc::clone(&plugin) as Rc<dyn ModulePlugin>;
        self.plugins.add(as_dyn, plugin, name)
    }

    #[must_use]
    pub fn plugin<T: Any>(&self, name: &str) -> Option<Rc<T>> {
        self.plugins.get::<T>(name)
    }

    #[must_use]
    pub fn plugins(&self) -> &PluginBroker<dyn ModulePlugin> {
        &self.plugins
    }

    pub fn set_view(&mut self, view: Rc<dyn View>) {
        self.view = Some(view);
    }

    #[must_use]
    pub fn view(&self) -> Option<Rc<dyn View>> {
        self.view.as_ref().map(Rc::clone)
    }

    pub(crate) fn cached_controller(&self, name: &str) -> Option<Rc<ControllerInstance>> {
        self.controllers.get(name).map(Rc::clone)
    }

    pub(crate) fn cache_controller(&mut self, name: String, controller: Rc<ControllerInstance>) {
        self.controllers.insert(name, controller);
    }

    /// Names of the controllers instantiated so far.
    pub fn controller_names(&self) -> impl Iterator<Item = &str> {
        self.controllers.keys().map(String::as_str)
    }

    pub(crate) fn cached_facade(&self, name: &str) -> Option<Rc<dyn Any>> {
        self.facades.get(name).map(Rc::clone)
    }

    pub(crate) fn cache_facade(&mut self, name: String, facade: Rc<dyn Any>) {
        self.facades.insert(name, facade);
    }

    pub(crate) fn set_parent_link(&mut self, parent: ModuleId) {
        self.parent = Some(parent);
    }

    pub(crate) fn push_partial_link(&mut self, partial: ModuleId) {
        self.partials.push(partial);
    }
}

impl std::fmt::Debug for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module")
            .field("id", &self.id)
            .field("namespace", &self.namespace)
            .field("abstract", &self.is_abstract)
            .field("final", &self.is_final)
            .field("partial", &self.is_partial)
            .field("parent", &self.parent)
            .field("partials", &self.partials)
            .finish_non_exhaustive()
    }
}
