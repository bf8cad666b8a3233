use std::any::{type_name, Any};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

use crate::application::Application;
use crate::controller::ControllerInstance;
use crate::error::ApplicationError;
use crate::module::{Module, ModuleId, Resource, HELPERS_PREFIX};

use super::{ApplicationPlugin, ControllerPlugin, ModulePlugin};

/// Gives every controller a `helper` plugin that resolves controller helpers
/// (`controllers::helpers::<name>`) through the module inheritance chain.
#[derive(Debug, Default)]
pub struct ControllerHelpers;

impl ControllerHelpers {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ApplicationPlugin for ControllerHelpers {
    fn on_module_created(&self, module: &mut Module) {
        let companion = ModuleHelpers::for_module(module.id());
        module.add_plugin(Rc::new(companion), None);
    }
}

/// Per-module helper cache, registered on each of the module's controllers
/// as `helper`.
#[derive(Clone)]
pub struct ModuleHelpers {
    module: ModuleId,
    helpers: Rc<RefCell<HashMap<String, Rc<dyn Any>>>>,
}

impl ModuleHelpers {
    pub const NAME: &'static str = "helper";

    #[must_use]
    pub fn for_module(module: ModuleId) -> Self {
        Self {
            module,
            helpers: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    #[must_use]
    pub fn module(&self) -> ModuleId {
        self.module
    }

    /// Helper `name` of this module, created on first use.
    ///
    /// `Ok(None)` when no module in the chain provides it; an error when the
    /// name resolves to something that is not a helper, or to a helper of
    /// another type than `T`.
    pub fn helper<T: Any>(&self, app: &Application, name: &str) -> anyhow::Result<Option<Rc<T>>> {
        let qualified = format!("{HELPERS_PREFIX}{}", name.trim_start_matches("::"));

        let cached = self.helpers.borrow().get(&qualified).map(Rc::clone);
        let instance = match cached {
            Some(instance) => instance,
            None => {
                let modules = app.modules();
                let Some(module) = modules.get(self.module) else {
                    return Ok(None);
                };
                let Some(resolved) = modules.resolve(self.module, &qualified) else {
                    debug!(helper = %qualified, module = %module.namespace(), "Helper not found");
                    return Ok(None);
                };
                let Resource::Helper(factory) = resolved.resource else {
                    return Err(ApplicationError::ResourceType {
                        name: resolved.fq_name,
                        expected: "helper",
                    }
                    .into());
                };
                let instance = factory(module);
                self.helpers
                    .borrow_mut()
                    .insert(qualified.clone(), Rc::clone(&instance));
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
}

impl ModulePlugin for ModuleHelpers {
    fn on_controller_created(&self, controller: &mut ControllerInstance) {
        controller.add_plugin(Rc::new(self.clone()), Some(Self::NAME));
    }
}

impl ControllerPlugin for ModuleHelpers {}
