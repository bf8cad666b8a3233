use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::debug;

use crate::controller::{ActionContext, ControllerInstance};
use crate::dispatcher::DispatchContext;
use crate::module::Module;
use crate::view::View;

use super::{ApplicationPlugin, ControllerPlugin, ModulePlugin};

/// Builds the view of a module, given the renderer's current theme.
pub type ViewFactory = Rc<dyn Fn(&Module, Option<&str>) -> Rc<dyn View>>;

#[derive(Debug, Clone)]
struct Frame {
    controller: String,
    action: String,
}

struct RendererState {
    factory: ViewFactory,
    disabled: Cell<bool>,
    master: RefCell<Option<String>>,
    theme: RefCell<Option<String>>,
    stack: RefCell<Vec<Frame>>,
}

/// Renders `<controller>/<action>` after every action, wrapped in the master
/// template, and appends the result to the response body.
///
/// Every module created after registration gets a view from the factory. The
/// rendered action template is passed to the master template as `content`.
/// Nothing is rendered when the request is being redispatched or rendering
/// was disabled (the [`Redirector`](super::Redirector) disables it while a
/// redirect is pending).
#[derive(Clone)]
pub struct ViewRenderer {
    state: Rc<RendererState>,
}

impl ViewRenderer {
    pub const NAME: &'static str = "viewRenderer";

    pub fn new(factory: ViewFactory) -> Self {
        Self {
            state: Rc::new(RendererState {
                factory,
                disabled: Cell::new(false),
                master: RefCell::new(Some("master".to_string())),
                theme: RefCell::new(None),
                stack: RefCell::new(Vec::new()),
            }),
        }
    }

    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.state.disabled.get()
    }

    pub fn set_disabled(&self, disabled: bool) {
        self.state.disabled.set(disabled);
    }

    #[must_use]
    pub fn master(&self) -> Option<String> {
        self.state.master.borrow().clone()
    }

    /// Master template, `None` to render actions without a layout.
    pub fn set_master(&self, master: Option<&str>) {
        self.state.master.replace(master.map(str::to_string));
    }

    #[must_use]
    pub fn theme(&self) -> Option<String> {
        self.state.theme.borrow().clone()
    }

    /// Theme for views created from now on.
    pub fn set_theme(&self, theme: Option<&str>) {
        self.state.theme.replace(theme.map(str::to_string));
    }

    /// Render another controller's template for the running action.
    pub fn set_controller(&self, controller: &str) {
        if let Some(frame) = self.state.stack.borrow_mut().last_mut() {
            frame.controller = controller.to_lowercase();
        }
    }

    /// Render another action's template for the running action.
    pub fn set_action(&self, action: &str) {
        if let Some(frame) = self.state.stack.borrow_mut().last_mut() {
            frame.action = action.to_lowercase();
        }
    }

    /// Template names of the running actions, innermost last.
    #[must_use]
    pub fn pending_templates(&self) -> Vec<String> {
        self.state
            .stack
            .borrow()
            .iter()
            .map(|f| format!("{}/{}", f.controller, f.action))
            .collect()
    }

    fn render(&self, view: &dyn View, frame: &Frame) -> anyhow::Result<String> {
        let template = format!("{}/{}", frame.controller, frame.action);
        let content = view.render(&template)?;
        match self.master() {
            Some(master) => {
                view.assign_html("content", content);
                view.render(&master)
            }
            None => Ok(content),
        }
    }
}

impl ApplicationPlugin for ViewRenderer {
    fn on_module_created(&self, module: &mut Module) {
        module.add_plugin(Rc::new(self.clone()), Some(Self::NAME));
        let theme = self.theme();
        let view = (self.state.factory)(module, theme.as_deref());
        module.set_view(view);
    }

    /// Frames of actions that failed in an earlier iteration are never popped.
    fn on_dispatch(&self, _ctx: &mut DispatchContext<'_>) -> anyhow::Result<()> {
        self.state.stack.borrow_mut().clear();
        Ok(())
    }
}

impl ModulePlugin for ViewRenderer {
    fn on_controller_created(&self, controller: &mut ControllerInstance) {
        controller.add_plugin(Rc::new(self.clone()), Some(Self::NAME));
    }
}

impl ControllerPlugin for ViewRenderer {
    fn on_action_call(&self, ctx: &mut ActionContext<'_>, action: String) -> anyhow::Result<String> {
        self.state.stack.borrow_mut().push(Frame {
            controller: ctx.controller.name().to_lowercase(),
            action: action.to_lowercase(),
        });
        Ok(action)
    }

    fn on_action_called(&self, ctx: &mut ActionContext<'_>, _action: &str) -> anyhow::Result<()> {
        let Some(frame) = self.state.stack.borrow_mut().pop() else {
            return Ok(());
        };
        if ctx.request.redispatch() || self.is_disabled() {
            return Ok(());
        }
        let Some(view) = ctx.view() else {
            debug!(controller = %frame.controller, "Module has no view, nothing rendered");
            return Ok(());
        };

        let body = self.render(view.as_ref(), &frame)?;
        ctx.response.append_body(&body);
        Ok(())
    }
}
