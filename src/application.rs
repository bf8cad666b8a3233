//! # Application
//!
//! The application owns the router, the module arena, the application scope
//! plugins and a small key/value registry. It is the entry point for a
//! request:
//!
//! ```text
//! run(request)
//!   ├─ on_route        (application plugins)
//!   ├─ router.route
//!   ├─ on_routed       (application plugins)
//!   └─ dispatch        (see the dispatcher module)
//! ```
//!
//! Modules, controllers and facades are created on first use and cached for
//! the lifetime of the application.
//!
//! ## Example
//!
//! ```rust,ignore
//! use brrtmvc::{ActionMap, Application, ModuleCatalog, ModuleDefinition, Request};
//!
//! let catalog = ModuleCatalog::new().with(
//!     ModuleDefinition::new("general").controller("Index", || {
//!         ActionMap::new().action("index", |ctx| {
//!             ctx.response.append_body("hello");
//!             Ok(())
//!         })
//!     }),
//! );
//!
//! let mut app = Application::new("demo", catalog);
//! let response = app.run(Request::from_url("/"))?;
//! assert_eq!(response.body(), "hello");
//! ```

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, info, warn};

use crate::controller::ControllerInstance;
use crate::error::{ApplicationError, ModuleStructureError};
use crate::module::{
    normalize_controller_name, qualify_namespace, ModuleArena, ModuleCatalog, ModuleDefinition,
    ModuleId, Resource, CONTROLLERS_PREFIX, FACADES_PREFIX,
};
use crate::plugins::{
    ApplicationPlugin, ControllerHelpers, PluginBroker, Redirector, ViewFactory, ViewRenderer,
};
use crate::request::Request;
use crate::response::Response;
use crate::router::rules::DynamicRule;
use crate::router::{Router, RuleBasedRouter};

/// Name of the rule every application starts with.
pub const DEFAULT_RULE: &str = "default";

pub struct Application {
    name: String,
    environment: Option<String>,
    base_path: String,
    general_module: String,
    router: Box<dyn Router>,
    modules: ModuleArena,
    plugins: PluginBroker<dyn ApplicationPlugin>,
    registry: HashMap<String, serde_json::Value>,
}

impl Application {
    /// An application with the default rule and the default plugins
    /// ([`Redirector`] as `redirector`, [`ControllerHelpers`]).
    pub fn new(name: &str, catalog: ModuleCatalog) -> Self {
        let mut app = Self::bare(name, catalog);
        app.install_default_rule();
        app.add_plugin(Redirector::new(), Some("redirector"));
        app.add_plugin(ControllerHelpers::new(), None);
        app
    }

    /// An application without rules or plugins.
    pub fn bare(name: &str, catalog: ModuleCatalog) -> Self {
        Self {
            name: name.to_string(),
            environment: None,
            base_path: String::new(),
            general_module: "general".to_string(),
            router: Box::new(RuleBasedRouter::new()),
            modules: ModuleArena::new(catalog),
            plugins: PluginBroker::new(),
            registry: HashMap::new(),
        }
    }

    /// (Re)install `default`: `:module/:controller/:action` defaulting to the
    /// general module's index controller and action.
    pub fn install_default_rule(&mut self) {
        let general = self.general_module.clone();
        if let Some(router) = self.router.as_rule_based_mut() {
            router.add_rule(
                DEFAULT_RULE,
                DynamicRule::new(
                    ":module/:controller/:action",
                    [
                        ("module", general.as_str()),
                        ("controller", "index"),
                        ("action", "index"),
                    ],
                ),
            );
        }
    }

    /// Register a [`ViewRenderer`] under `viewRenderer` that gives every
    /// module created from now on a view from `factory`.
    pub fn enable_views(&mut self, factory: ViewFactory) -> Rc<ViewRenderer> {
        self.add_plugin(ViewRenderer::new(factory), Some(ViewRenderer::NAME))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn environment(&self) -> Option<&str> {
        self.environment.as_deref()
    }

    pub fn set_environment(&mut self, environment: Option<String>) {
        self.environment = environment;
    }

    /// Base path applied to requests that do not carry one.
    #[must_use]
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn set_base_path(&mut self, base_path: &str) {
        let trimmed = base_path.trim_matches('/');
        self.base_path = if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{trimmed}")
        };
    }

    #[must_use]
    pub fn general_module_name(&self) -> &str {
        &self.general_module
    }

    pub fn set_general_module_name(&mut self, name: &str) {
        self.general_module = name.to_string();
    }

    #[must_use]
    pub fn router(&self) -> &dyn Router {
        self.router.as_ref()
    }

    pub fn set_router(&mut self, router: Box<dyn Router>) {
        self.router = router;
    }

    /// The rule table, when the router is rule based.
    pub fn rules_mut(&mut self) -> Option<&mut RuleBasedRouter> {
        self.router.as_rule_based_mut()
    }

    /// Encode `request` into a URL with the rule named `rule`.
    #[must_use]
    pub fn unroute(&self, request: Request, rule: &str) -> Request {
        self.router.unroute(self, request, rule)
    }

    pub fn set_registry(&mut self, key: &str, value: serde_json::Value) {
        self.registry.insert(key.to_string(), value);
    }

    #[must_use]
    pub fn registry(&self, key: &str) -> Option<&serde_json::Value> {
        self.registry.get(key)
    }

    /// Register an application scope plugin and call its `on_plugin_added`.
    ///
    /// Without a name the plugin gets a generated `_plugin<n>` id. A plugin
    /// registered under a taken name replaces the old one in its position.
    pub fn add_plugin<T>(&mut self, plugin: T, name: Option<&str>) -> Rc<T>
    where
        T: ApplicationPlugin + 'static,
    {
        let plugin = Rc::new(plugin);
        let as_dyn: Rc<dyn ApplicationPlugin> = Rc::clone(&plugin) as Rc<dyn ApplicationPlugin>;
        let registered = self.plugins.add(as_dyn, Rc::clone(&plugin) as Rc<dyn Any>, name);
        debug!(plugin = %registered, plugin_type = type_name::<T>(), "Application plugin added");
        plugin.on_plugin_added(self);
        plugin
    }

    #[must_use]
    pub fn plugin<T: Any>(&self, name: &str) -> Option<Rc<T>> {
        self.plugins.get::<T>(name)
    }

    pub fn remove_plugin(&mut self, name: &str) -> bool {
        self.plugins.remove(name)
    }

    #[must_use]
    pub fn plugins(&self) -> &PluginBroker<dyn ApplicationPlugin> {
        &self.plugins
    }

    pub(crate) fn plugin_snapshot(&self) -> Vec<Rc<dyn ApplicationPlugin>> {
        self.plugins.snapshot()
    }

    #[must_use]
    pub fn modules(&self) -> &ModuleArena {
        &self.modules
    }

    pub fn modules_mut(&mut self) -> &mut ModuleArena {
        &mut self.modules
    }

    /// Add a module definition after construction.
    pub fn define_module(&mut self, definition: ModuleDefinition) {
        self.modules.define(definition);
    }

    /// The module for `namespace`, created on first use.
    ///
    /// Namespaces without `::` are looked up under `modules::`. Unknown
    /// namespaces are cached as misses. A new module is linked to its parent
    /// and partials (creating those as needed) before application plugins see
    /// it in `on_module_created`.
    pub fn get_module(&mut self, namespace: &str) -> Result<Option<ModuleId>, ModuleStructureError> {
        let namespace = qualify_namespace(namespace);
        if let Some(cached) = self.modules.cached(&namespace) {
            return Ok(cached);
        }

        let Some(definition) = self.modules.catalog().get(&namespace).cloned() else {
            debug!(module = %namespace, "Module not defined");
            self.modules.cache_miss(&namespace);
            return Ok(None);
        };

        if let Some((module, other)) = self.modules.catalog().find_cycle(&namespace) {
            let err = ModuleStructureError::Cycle { module, other };
            warn!(module = %namespace, error = %err, "Module structure rejected");
            return Err(err);
        }

        let id = self.modules.insert(&definition);
        if let Err(err) = self.link_module(id, &definition) {
            warn!(module = %namespace, error = %err, "Module structure rejected");
            self.modules.uncache(&namespace);
            return Err(err);
        }

        for plugin in self.plugins.snapshot() {
            if let Some(module) = self.modules.get_mut(id) {
                plugin.on_module_created(module);
            }
        }
        info!(module = %namespace, id = %id, "Module created");
        Ok(Some(id))
    }

    fn link_module(&mut self, id: ModuleId, definition: &ModuleDefinition) -> Result<(), ModuleStructureError> {
        let missing = |requested: &str| ModuleStructureError::MissingModule {
            module: definition.namespace().to_string(),
            requested: requested.to_string(),
        };

        if let Some(parent_ns) = &definition.parent {
            let parent = self.get_module(parent_ns)?.ok_or_else(|| missing(parent_ns))?;
            self.modules.set_parent(id, parent)?;
        }
        for partial_ns in &definition.partials {
            let partial = self.get_module(partial_ns)?.ok_or_else(|| missing(partial_ns))?;
            self.modules.add_partial(id, partial)?;
        }
        Ok(())
    }

    pub fn general_module(&mut self) -> Result<Option<ModuleId>, ModuleStructureError> {
        let general = self.general_module.clone();
        self.get_module(&general)
    }

    /// Create every catalogued module, so structural errors surface at
    /// startup. Returns the number of live modules.
    pub fn preload_modules(&mut self) -> Result<usize, ModuleStructureError> {
        let namespaces: Vec<String> = self
            .modules
            .catalog()
            .namespaces()
            .map(str::to_string)
            .collect();
        for namespace in &namespaces {
            self.get_module(namespace)?;
        }
        Ok(self.modules.len())
    }

    /// Controller `name` of `module` (its index controller for `None`),
    /// created on first use and cached under the requested name.
    pub fn get_controller(&mut self, module: ModuleId, name: Option<&str>) -> Option<Rc<ControllerInstance>> {
        let record = self.modules.get(module)?;
        let name = normalize_controller_name(name.unwrap_or(record.index_controller_name()));
        if let Some(cached) = record.cached_controller(&name) {
            return Some(cached);
        }

        let qualified = format!("{CONTROLLERS_PREFIX}{name}");
        let (factory, owner) = {
            let resolved = self.modules.resolve(module, &qualified)?;
            match resolved.resource {
                Resource::Controller(factory) => (Rc::clone(factory), resolved.owner),
                other => {
                    warn!(
                        resource = %resolved.fq_name,
                        kind = other.kind(),
                        "Resource is not a controller"
                    );
                    return None;
                }
            }
        };
        let owner_namespace = self
            .modules
            .get(owner)
            .map(|m| m.namespace().to_string())
            .unwrap_or_default();

        let mut instance = ControllerInstance::new(name.clone(), owner_namespace, module, factory());
        let module_plugins = self.modules.get(module)?.plugins().snapshot();
        for plugin in module_plugins {
            plugin.on_controller_created(&mut instance);
        }

        let instance = Rc::new(instance);
        self.modules
            .get_mut(module)?
            .cache_controller(name.clone(), Rc::clone(&instance));
        debug!(module = %module, controller = %name, "Controller created");
        Some(instance)
    }

    /// Facade `name` for `module`, resolved through the inheritance chain and
    /// created once per module.
    pub fn facade<T: Any>(&mut self, module: ModuleId, name: &str) -> anyhow::Result<Option<Rc<T>>> {
        let qualified = format!("{FACADES_PREFIX}{name}");
        let Some(record) = self.modules.get(module) else {
            return Ok(None);
        };

        let instance = match record.cached_facade(name) {
            Some(cached) => cached,
            None => {
                let Some(resolved) = self.modules.resolve(module, &qualified) else {
                    return Ok(None);
                };
                let Resource::Facade(factory) = resolved.resource else {
                    return Err(ApplicationError::ResourceType {
                        name: resolved.fq_name,
                        expected: "facade",
                    }
                    .into());
                };
                let instance = factory(record);
                if let Some(record) = self.modules.get_mut(module) {
                    record.cache_facade(name.to_string(), Rc::clone(&instance));
                }
                instance
            }
        };

        instance.downcast::<T>().map(Some).map_err(|_| {
            ApplicationError::ResourceType {
                name: qualified,
                expected: type_name::<T>(),
            }
            .into()
        })
    }

    /// Route `request` and dispatch it.
    pub fn run(&mut self, mut request: Request) -> anyhow::Result<Response> {
        if request.base_path().is_empty() && !self.base_path.is_empty() {
            request.set_base_path(&self.base_path);
        }

        let plugins = self.plugins.snapshot();
        for plugin in &plugins {
            plugin.on_route(self, &mut request);
        }

        let mut request = self.router.route(self, request);

        let plugins = self.plugins.snapshot();
        for plugin in &plugins {
            plugin.on_routed(self, &mut request);
        }

        self.dispatch(Some(request))
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("name", &self.name)
            .field("environment", &self.environment)
            .field("general_module", &self.general_module)
            .field("plugins", &self.plugins.names().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
