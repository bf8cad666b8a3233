//! # Controllers
//!
//! A controller groups the actions of one resource. The engine only needs
//! three things from it: whether a name is an action, how to run an action,
//! and which action to run when none was requested. Everything else, like
//! before/after hooks, has a default.
//!
//! [`ControllerInstance`] wraps a controller created for a module together
//! with its controller scope plugins and runs the action call sequence:
//!
//! 1. `on_action_call` on every controller plugin (may rename the action)
//! 2. stop if redispatch was armed
//! 3. [`Controller::before_action`]
//! 4. stop if redispatch was armed
//! 5. the action
//! 6. [`Controller::after_action`], even when the action armed redispatch
//! 7. `on_action_called` on every controller plugin
//!
//! [`ActionMap`] is a ready-made controller for actions written as closures.

use std::any::Any;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::debug;

use crate::application::Application;
use crate::dispatcher::DispatchContext;
use crate::error::{ApplicationError, DispatchError};
use crate::module::{Module, ModuleId};
use crate::plugins::{ControllerPlugin, PluginBroker};
use crate::request::Request;
use crate::response::Response;
use crate::view::View;

/// Handler side of a controller.
pub trait Controller {
    /// Whether `action` can be called.
    fn is_action(&self, action: &str) -> bool;

    /// Run `action`. Only called for names [`Controller::is_action`] accepts.
    fn call_action(&mut self, action: &str, ctx: &mut ActionContext<'_>) -> anyhow::Result<()>;

    /// Action to run when the request names none.
    fn index_action_name(&self) -> &str {
        "index"
    }

    fn before_action(&mut self, _action: &str, _ctx: &mut ActionContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    fn after_action(&mut self, _action: &str, _ctx: &mut ActionContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Everything an action or controller plugin may touch while it runs.
pub struct ActionContext<'a> {
    pub app: &'a mut Application,
    pub request: &'a mut Request,
    pub response: &'a mut Response,
    pub controller: &'a ControllerInstance,
}

impl ActionContext<'_> {
    /// Module the controller belongs to.
    #[must_use]
    pub fn module(&self) -> Option<&Module> {
        self.app.modules().get(self.controller.module_id())
    }

    /// The module's view, when a view renderer configured one.
    #[must_use]
    pub fn view(&self) -> Option<Rc<dyn View>> {
        self.module().and_then(Module::view)
    }

    /// Controller scope plugin registered as `name`.
    #[must_use]
    pub fn plugin<T: Any>(&self, name: &str) -> Option<Rc<T>> {
        self.controller.plugin::<T>(name)
    }

    /// Facade `name` as seen from the controller's module.
    pub fn facade<T: Any>(&mut self, name: &str) -> anyhow::Result<Option<Rc<T>>> {
        let module = self.controller.module_id();
        self.app.facade::<T>(module, name)
    }

    /// Re-target the request and arm redispatch.
    pub fn forward(&mut self, module: &str, controller: &str, action: &str) {
        self.request.set_target(module, controller, action);
        self.request.set_redispatch(true);
    }
}

/// A controller created for a module, with its controller scope plugins.
pub struct ControllerInstance {
    name: String,
    namespace: String,
    module: ModuleId,
    plugins: PluginBroker<dyn ControllerPlugin>,
    handler: RefCell<Box<dyn Controller>>,
}

impl ControllerInstance {
    pub(crate) fn new(
        name: String,
        namespace: String,
        module: ModuleId,
        handler: Box<dyn Controller>,
    ) -> Self {
        Self {
            name,
            namespace,
            module,
            plugins: PluginBroker::new(),
            handler: RefCell::new(handler),
        }
    }

    /// Name the controller was requested under, e.g. `Post`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Namespace of the module that declares the implementation, which may be
    /// an ancestor or partial of the owning module.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Module the instance was created for.
    #[must_use]
    pub fn module_id(&self) -> ModuleId {
        self.module
    }

    pub fn add_plugin<T>(&mut self, plugin: Rc<T>, name: Option<&str>) -> String
    where
        T: ControllerPlugin + 'static,
    {
        let as_dyn: Rc<dyn ControllerPlugin> = Rc::clone(&plugin) as Rc<dyn ControllerPlugin>;
        self.plugins.add(as_dyn, plugin, name)
    }

    #[must_use]
    pub fn plugin<T: Any>(&self, name: &str) -> Option<Rc<T>> {
        self.plugins.get::<T>(name)
    }

    #[must_use]
    pub fn plugins(&self) -> &PluginBroker<dyn ControllerPlugin> {
        &self.plugins
    }

    fn busy(&self) -> ApplicationError {
        ApplicationError::ControllerBusy {
            controller: self.name.clone(),
        }
    }

    pub fn is_action(&self, action: &str) -> Result<bool, ApplicationError> {
        let handler = self.handler.try_borrow().map_err(|_| self.busy())?;
        Ok(handler.is_action(action))
    }

    pub fn index_action_name(&self) -> Result<String, ApplicationError> {
        let handler = self.handler.try_borrow().map_err(|_| self.busy())?;
        Ok(handler.index_action_name().to_string())
    }

    /// Run `action` through the controller call sequence.
    pub fn call(&self, action: &str, ctx: &mut DispatchContext<'_>) -> anyhow::Result<()> {
        let mut actx = ActionContext {
            app: &mut *ctx.app,
            request: &mut *ctx.request,
            response: &mut *ctx.response,
            controller: self,
        };
        let plugins = self.plugins.snapshot();

        let mut action = action.to_string();
        for plugin in &plugins {
            action = plugin.on_action_call(&mut actx, action)?;
        }
        if actx.request.redispatch() {
            debug!(controller = %self.name, action = %action, "Redispatch armed by on_action_call");
            return Ok(());
        }

        {
            let mut handler = self.handler.try_borrow_mut().map_err(|_| self.busy())?;
            if !handler.is_action(&action) {
                return Err(DispatchError::page_not_found(format!(
                    "Action '{action}' in controller '{}' not found.",
                    self.name
                ))
                .into());
            }

            handler.before_action(&action, &mut actx)?;
            if actx.request.redispatch() {
                debug!(controller = %self.name, action = %action, "Redispatch armed by before_action");
                return Ok(());
            }

            debug!(controller = %self.name, action = %action, "Calling action");
            handler.call_action(&action, &mut actx)?;
            handler.after_action(&action, &mut actx)?;
        }

        for plugin in &plugins {
            plugin.on_action_called(&mut actx, &action)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ControllerInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerInstance")
            .field("name", &self.name)
            .field("namespace", &self.namespace)
            .field("module", &self.module)
            .field("plugins", &self.plugins.names().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Closure backed action.
pub type ActionFn = Box<dyn FnMut(&mut ActionContext<'_>) -> anyhow::Result<()>>;

/// Hook run before or after every action of an [`ActionMap`].
pub type ActionHook = Box<dyn FnMut(&str, &mut ActionContext<'_>) -> anyhow::Result<()>>;

/// Controller whose actions are closures registered by name.
///
/// ```rust,ignore
/// let posts = ActionMap::new()
///     .action("index", |ctx| {
///         ctx.response.append_body("all posts");
///         Ok(())
///     })
///     .action("read", |ctx| {
///         let id = ctx.request.param("id").unwrap_or("0").to_string();
///         ctx.response.append_body(&format!("post {id}"));
///         Ok(())
///     });
/// ```
#[derive(Default)]
pub struct ActionMap {
    actions: BTreeMap<String, ActionFn>,
    index: Option<String>,
    before: Option<ActionHook>,
    after: Option<ActionHook>,
}

impl ActionMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn action(
        mut self,
        name: &str,
        action: impl FnMut(&mut ActionContext<'_>) -> anyhow::Result<()> + 'static,
    ) -> Self {
        self.actions.insert(name.to_string(), Box::new(action));
        self
    }

    #[must_use]
    pub fn index(mut self, name: &str) -> Self {
        self.index = Some(name.to_string());
        self
    }

    #[must_use]
    pub fn before(
        mut self,
        hook: impl FnMut(&str, &mut ActionContext<'_>) -> anyhow::Result<()> + 'static,
    ) -> Self {
        self.before = Some(Box::new(hook));
        self
    }

    #[must_use]
    pub fn after(
        mut self,
        hook: impl FnMut(&str, &mut ActionContext<'_>) -> anyhow::Result<()> + 'static,
    ) -> Self {
        self.after = Some(Box::new(hook));
        self
    }

    pub fn action_names(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }
}

impl Controller for ActionMap {
    fn is_action(&self, action: &str) -> bool {
        self.actions.contains_key(action)
    }

    fn call_action(&mut self, action: &str, ctx: &mut ActionContext<'_>) -> anyhow::Result<()> {
        match self.actions.get_mut(action) {
            Some(handler) => handler(ctx),
            None => Err(DispatchError::page_not_found(format!("Action '{action}' not found.")).into()),
        }
    }

    fn index_action_name(&self) -> &str {
        self.index.as_deref().unwrap_or("index")
    }

    fn before_action(&mut self, action: &str, ctx: &mut ActionContext<'_>) -> anyhow::Result<()> {
        match self.before.as_mut() {
            Some(hook) => hook(action, ctx),
            None => Ok(()),
        }
    }

    fn after_action(&mut self, action: &str, ctx: &mut ActionContext<'_>) -> anyhow::Result<()> {
        match self.after.as_mut() {
            Some(hook) => hook(action, ctx),
            None => Ok(()),
        }
    }
}
