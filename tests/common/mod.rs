//! Shared fixtures for the integration tests: an event recording plugin and a
//! small blog application.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::anyhow;
use brrtmvc::plugins::{ApplicationPlugin, ControllerPlugin, ModulePlugin};
use brrtmvc::{
    ActionContext, ActionMap, Application, ControllerInstance, DispatchContext, Module,
    ModuleCatalog, ModuleDefinition, Request,
};

/// Ordered event names written by fixtures and plugins.
pub type EventLog = Rc<RefCell<Vec<String>>>;

pub fn event_log() -> EventLog {
    Rc::new(RefCell::new(Vec::new()))
}

pub fn events(log: &EventLog) -> Vec<String> {
    log.borrow().clone()
}

pub fn count(log: &EventLog, event: &str) -> usize {
    log.borrow().iter().filter(|e| e.as_str() == event).count()
}

pub fn push(log: &EventLog, event: impl Into<String>) {
    log.borrow_mut().push(event.into());
}

/// Records every hook it sees and cascades itself onto modules and
/// controllers under the name `recorder`.
#[derive(Clone)]
pub struct Recorder {
    pub log: EventLog,
}

impl Recorder {
    pub fn new(log: &EventLog) -> Self {
        Self {
            log: Rc::clone(log),
        }
    }
}

impl ApplicationPlugin for Recorder {
    fn on_module_created(&self, module: &mut Module) {
        push(&self.log, format!("module_created:{}", module.name()));
        module.add_plugin(Rc::new(self.clone()), Some("recorder"));
    }

    fn on_route(&self, _app: &Application, _request: &mut Request) {
        push(&self.log, "route");
    }

    fn on_routed(&self, _app: &Application, _request: &mut Request) {
        push(&self.log, "routed");
    }

    fn on_dispatch(&self, _ctx: &mut DispatchContext<'_>) -> anyhow::Result<()> {
        push(&self.log, "dispatch");
        Ok(())
    }

    fn on_dispatched(&self, ctx: &mut DispatchContext<'_>) -> anyhow::Result<()> {
        push(
            &self.log,
            format!("dispatched:{}", ctx.response.exceptions().len()),
        );
        Ok(())
    }
}

impl ModulePlugin for Recorder {
    fn on_controller_created(&self, controller: &mut ControllerInstance) {
        push(&self.log, format!("controller_created:{}", controller.name()));
        controller.add_plugin(Rc::new(self.clone()), Some("recorder"));
    }
}

impl ControllerPlugin for Recorder {
    fn on_action_call(&self, _ctx: &mut ActionContext<'_>, action: String) -> anyhow::Result<String> {
        push(&self.log, format!("action_call:{action}"));
        Ok(action)
    }

    fn on_action_called(&self, _ctx: &mut ActionContext<'_>, action: &str) -> anyhow::Result<()> {
        push(&self.log, format!("action_called:{action}"));
        Ok(())
    }
}

/// `general` (Index, Error) and `blog` (Post) modules. Post actions log
/// `before:<a>`, `action:<a>` and `after:<a>`.
pub fn blog_catalog(log: &EventLog) -> ModuleCatalog {
    let post_log = Rc::clone(log);
    ModuleCatalog::new()
        .with(
            ModuleDefinition::new("general")
                .controller("Index", || {
                    ActionMap::new().action("index", |ctx| {
                        ctx.response.append_body("home");
                        Ok(())
                    })
                })
                .controller("Error", || {
                    ActionMap::new().action("error", |ctx| {
                        let failures = ctx
                            .request
                            .forwarded()
                            .map(|f| f.exceptions.len())
                            .unwrap_or_default();
                        ctx.response
                            .append_body(&format!("error page ({failures})"));
                        Ok(())
                    })
                }),
        )
        .with(
            ModuleDefinition::new("blog")
                .controller("Post", move || post_controller(&post_log)),
        )
}

fn post_controller(log: &EventLog) -> ActionMap {
    let before = Rc::clone(log);
    let after = Rc::clone(log);
    let read = Rc::clone(log);
    let forward = Rc::clone(log);
    let fail = Rc::clone(log);
    ActionMap::new()
        .before(move |action, _ctx| {
            push(&before, format!("before:{action}"));
            Ok(())
        })
        .after(move |action, _ctx| {
            push(&after, format!("after:{action}"));
            Ok(())
        })
        .action("read", move |ctx| {
            push(&read, "action:read");
            let id = ctx.request.param("id").unwrap_or("none").to_string();
            ctx.response.append_body(&format!("post {id}"));
            Ok(())
        })
        .action("forward", move |ctx| {
            push(&forward, "action:forward");
            ctx.forward("blog", "post", "read");
            Ok(())
        })
        .action("fail", move |_ctx| {
            push(&fail, "action:fail");
            Err(anyhow!("boom"))
        })
}

/// [`Application::new`] over [`blog_catalog`] with a [`Recorder`] added
/// last.
pub fn blog_app(log: &EventLog) -> Application {
    let mut app = Application::new("blog", blog_catalog(log));
    app.add_plugin(Recorder::new(log), Some("recorder"));
    app
}

/// Cascades a controller plugin onto every controller of every module created
/// after registration.
pub struct OnEveryController<P>(pub Rc<P>);

impl<P: ControllerPlugin + 'static> ApplicationPlugin for OnEveryController<P> {
    fn on_module_created(&self, module: &mut Module) {
        module.add_plugin(Rc::new(OnEveryController(Rc::clone(&self.0))), None);
    }
}

impl<P: ControllerPlugin + 'static> ModulePlugin for OnEveryController<P> {
    fn on_controller_created(&self, controller: &mut ControllerInstance) {
        controller.add_plugin(Rc::clone(&self.0), None);
    }
}
