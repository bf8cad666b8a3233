//! # Plugins
//!
//! Cross-cutting behavior hooks into the request lifecycle through plugins
//! registered at three scopes, each with its own [`PluginBroker`]:
//!
//! | Scope | Capability | Hooks |
//! |-------|------------|-------|
//! | Application | [`ApplicationPlugin`] | `on_plugin_added`, `on_module_created`, `on_route`, `on_routed`, `on_dispatch`, `on_dispatched` |
//! | Module | [`ModulePlugin`] | `on_controller_created` |
//! | Controller | [`ControllerPlugin`] | `on_action_call`, `on_action_called` |
//!
//! Every hook has an empty default body, so a plugin only implements the
//! events it cares about and can never be missing a hook its scope invokes.
//!
//! ## Cascading
//!
//! A plugin reaches lower scopes by registering itself (or a companion) on the
//! child scope from inside its own hook: an application plugin registers on
//! each new module in `on_module_created`, and a module plugin registers on
//! each new controller in `on_controller_created`. The built-in
//! [`Redirector`] and [`ViewRenderer`] are cheap handles over shared state and
//! register clones of themselves; [`ControllerHelpers`] creates a fresh
//! companion per module. Because the hooks run for every child created
//! afterwards, nothing else needs to know which plugins cascade.

mod broker;
mod controller_helpers;
mod error_handler;
mod redirector;
mod view_renderer;

pub use broker::PluginBroker;
pub use controller_helpers::{ControllerHelpers, ModuleHelpers};
pub use error_handler::ErrorHandler;
pub use redirector::Redirector;
pub use view_renderer::{ViewFactory, ViewRenderer};

use crate::application::Application;
use crate::controller::{ActionContext, ControllerInstance};
use crate::dispatcher::DispatchContext;
use crate::module::Module;
use crate::request::Request;

/// Application scope capability.
pub trait ApplicationPlugin {
    /// Called once, right after the plugin was registered.
    fn on_plugin_added(&self, _app: &mut Application) {}

    /// Called for every module the application creates, after the module has
    /// been linked to its parent and partials.
    fn on_module_created(&self, _module: &mut Module) {}

    fn on_route(&self, _app: &Application, _request: &mut Request) {}

    fn on_routed(&self, _app: &Application, _request: &mut Request) {}

    /// Start of every dispatch iteration. Arming redispatch here restarts the
    /// iteration before any module is resolved.
    fn on_dispatch(&self, _ctx: &mut DispatchContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// End of every dispatch iteration that was not redispatched. Failures
    /// captured during the iteration are in `ctx.response.exceptions()`.
    fn on_dispatched(&self, _ctx: &mut DispatchContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Module scope capability.
pub trait ModulePlugin {
    /// Called once per controller instance, before it is cached.
    fn on_controller_created(&self, _controller: &mut ControllerInstance) {}
}

/// Controller scope capability.
pub trait ControllerPlugin {
    /// Called before the action runs. Returns the name of the action that
    /// should actually run, normally `action` itself.
    fn on_action_call(&self, _ctx: &mut ActionContext<'_>, action: String) -> anyhow::Result<String> {
        Ok(action)
    }

    /// Called after the action and the controller's `after_action`.
    fn on_action_called(&self, _ctx: &mut ActionContext<'_>, _action: &str) -> anyhow::Result<()> {
        Ok(())
    }
}
