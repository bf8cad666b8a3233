//! Tests for the dispatch loop and the controller call sequence
//!
//! # Test Coverage
//!
//! - Hook order of a plain request, from `on_route` to `on_dispatched`
//! - Redispatch armed by an action, by `on_action_call` and by `on_dispatched`
//! - Failure capture: missing pages, abstract and partial modules
//! - The error handler forward and the double fault escape
//! - Recovery of the error handler after a fatal error page
//! - Structural module errors leaving the loop

mod common;

use std::cell::Cell;
use std::rc::Rc;

use anyhow::anyhow;
use brrtmvc::plugins::{ApplicationPlugin, ControllerPlugin, ErrorHandler};
use brrtmvc::{
    ActionContext, ActionMap, Application, DispatchContext, DispatchError, DispatchErrorKind,
    Fatal, ModuleCatalog, ModuleDefinition, ModuleStructureError, Request,
};
use common::{blog_app, count, event_log, events, OnEveryController};

fn dispatch_error(response: &brrtmvc::Response, index: usize) -> &DispatchError {
    response.exceptions()[index]
        .downcast_ref::<DispatchError>()
        .expect("dispatch error")
}

#[test]
fn test_request_lifecycle_order() {
    let log = event_log();
    let mut app = blog_app(&log);

    let response = app.run(Request::from_url("/blog/post/read?id=42")).unwrap();

    assert_eq!(response.body(), "post 42");
    assert_eq!(response.status(), 200);
    assert!(!response.has_exceptions());
    assert_eq!(
        events(&log),
        vec![
            "route",
            "routed",
            "dispatch",
            "module_created:blog",
            "controller_created:Post",
            "action_call:read",
            "before:read",
            "action:read",
            "after:read",
            "action_called:read",
            "dispatched:0",
        ]
    );
}

#[test]
fn test_action_forward_runs_after_action_and_redispatches() {
    let log = event_log();
    let mut app = blog_app(&log);

    let response = app.run(Request::from_url("/blog/post/forward?id=7")).unwrap();

    assert_eq!(response.body(), "post 7");
    let seen = events(&log);
    let after_forward = seen.iter().position(|e| e == "after:forward").unwrap();
    let second_dispatch = seen.iter().rposition(|e| e == "dispatch").unwrap();
    assert!(after_forward < second_dispatch);
    assert_eq!(count(&log, "dispatch"), 2);
    // on_dispatched only runs for the iteration that was not redispatched
    assert_eq!(count(&log, "dispatched:0"), 1);
}

/// Forwards `read` to the home page before the action starts.
struct Divert;

impl ControllerPlugin for Divert {
    fn on_action_call(&self, ctx: &mut ActionContext<'_>, action: String) -> anyhow::Result<String> {
        if action == "read" {
            ctx.forward("general", "index", "index");
        }
        Ok(action)
    }
}

#[test]
fn test_on_action_call_redispatch_skips_before_action() {
    let log = event_log();
    let mut app = blog_app(&log);
    app.add_plugin(OnEveryController(Rc::new(Divert)), None);

    let response = app.run(Request::from_url("/blog/post/read")).unwrap();

    assert_eq!(response.body(), "home");
    assert_eq!(count(&log, "action_call:read"), 1);
    assert_eq!(count(&log, "before:read"), 0);
    assert_eq!(count(&log, "action:read"), 0);
    assert_eq!(count(&log, "after:read"), 0);
    assert_eq!(count(&log, "action_called:read"), 0);
    assert_eq!(count(&log, "dispatch"), 2);
}

/// Renames the requested action.
struct Rename;

impl ControllerPlugin for Rename {
    fn on_action_call(&self, _ctx: &mut ActionContext<'_>, action: String) -> anyhow::Result<String> {
        Ok(if action == "forward" {
            "read".to_string()
        } else {
            action
        })
    }
}

#[test]
fn test_on_action_call_can_replace_the_action() {
    let log = event_log();
    let mut app = blog_app(&log);
    app.add_plugin(OnEveryController(Rc::new(Rename)), None);

    let response = app.run(Request::from_url("/blog/post/forward?id=3")).unwrap();

    assert_eq!(response.body(), "post 3");
    assert_eq!(count(&log, "action:forward"), 0);
    assert_eq!(count(&log, "before:read"), 1);
    assert_eq!(count(&log, "dispatch"), 1);
}

/// Sends any failed iteration to the home page, once.
#[derive(Default)]
struct Rescue {
    seen: Cell<usize>,
}

impl ApplicationPlugin for Rescue {
    fn on_dispatched(&self, ctx: &mut DispatchContext<'_>) -> anyhow::Result<()> {
        if !ctx.response.has_exceptions() {
            return Ok(());
        }
        self.seen.set(ctx.response.exceptions().len());
        ctx.response.clear_exceptions();
        ctx.request.set_target("general", "index", "index");
        ctx.request.set_redispatch(true);
        Ok(())
    }
}

#[test]
fn test_on_dispatched_redispatch_adds_exactly_one_iteration() {
    let log = event_log();
    let mut app = blog_app(&log);
    let rescue = app.add_plugin(Rescue::default(), Some("rescue"));

    let response = app.run(Request::from_url("/blog/post/fail")).unwrap();

    assert_eq!(rescue.seen.get(), 1);
    assert_eq!(response.body(), "home");
    assert!(!response.has_exceptions());
    assert_eq!(count(&log, "dispatch"), 2);
    assert_eq!(count(&log, "dispatched:1"), 1);
    assert_eq!(count(&log, "dispatched:0"), 1);
    // a failing action skips after_action and on_action_called
    assert_eq!(count(&log, "after:fail"), 0);
    assert_eq!(count(&log, "action_called:fail"), 0);
}

#[test]
fn test_missing_pages_are_captured() {
    let log = event_log();
    let mut app = blog_app(&log);

    for url in ["/nowhere/x/y", "/blog/nothing/read", "/blog/post/nothing"] {
        let response = app.run(Request::from_url(url)).unwrap();
        assert_eq!(response.exceptions().len(), 1, "{url}");
        let error = dispatch_error(&response, 0);
        assert_eq!(error.kind(), DispatchErrorKind::PageNotFound, "{url}");
        assert_eq!(error.code(), 404);
        assert_eq!(response.status(), 200);
    }
}

#[test]
fn test_action_failure_is_captured() {
    let log = event_log();
    let mut app = blog_app(&log);

    let response = app.run(Request::from_url("/blog/post/fail")).unwrap();

    assert_eq!(response.exceptions().len(), 1);
    assert_eq!(response.exceptions()[0].to_string(), "boom");
    assert_eq!(count(&log, "dispatched:1"), 1);
}

#[test]
fn test_index_controller_and_action_fallback() {
    let log = event_log();
    let mut app = blog_app(&log);

    let response = app.run(Request::from_url("/")).unwrap();
    assert_eq!(response.body(), "home");

    let mut request = Request::new();
    request.set_module(Some("general".to_string()));
    let response = app.dispatch(Some(request)).unwrap();
    assert_eq!(response.body(), "home");
}

#[test]
fn test_abstract_and_partial_modules_are_not_dispatchable() {
    let index = || ActionMap::new().action("index", |_| Ok(()));
    let catalog = ModuleCatalog::new()
        .with(ModuleDefinition::new("base").abstract_module().controller("Index", index))
        .with(ModuleDefinition::new("mixin").partial_module().controller("Index", index))
        .with(ModuleDefinition::new("site").extends("base").with_partial("mixin"));
    let mut app = Application::new("flags", catalog);

    for (module, kind, code) in [
        ("base", DispatchErrorKind::AbstractModule, 104),
        ("mixin", DispatchErrorKind::PartialModule, 105),
    ] {
        let mut request = Request::new();
        request.set_target(module, "index", "index");
        let response = app.dispatch(Some(request)).unwrap();
        let error = dispatch_error(&response, 0);
        assert_eq!(error.kind(), kind);
        assert_eq!(error.code(), code);
    }

    let mut request = Request::new();
    request.set_target("site", "index", "index");
    assert!(!app.dispatch(Some(request)).unwrap().has_exceptions());
}

#[test]
fn test_dispatch_without_request() {
    let log = event_log();
    let mut app = blog_app(&log);

    let err = app.dispatch(None).unwrap_err();
    let error = err.downcast_ref::<DispatchError>().unwrap();
    assert_eq!(error.kind(), DispatchErrorKind::InvalidRequest);
    assert_eq!(error.code(), 106);
    assert!(events(&log).is_empty());
}

#[test]
fn test_error_handler_forwards_to_error_page() {
    let log = event_log();
    let mut app = blog_app(&log);
    let handler = app.add_plugin(ErrorHandler::new(), Some(ErrorHandler::NAME));

    let response = app.run(Request::from_url("/blog/post/fail")).unwrap();
    assert_eq!(response.status(), 500);
    assert_eq!(response.body(), "error page (1)");
    assert!(!response.has_exceptions());
    assert!(!handler.is_handling());

    let response = app.run(Request::from_url("/blog/missing/read")).unwrap();
    assert_eq!(response.status(), 404);
    assert_eq!(response.body(), "error page (1)");
}

#[test]
fn test_failure_on_error_page_is_fatal() {
    let catalog = ModuleCatalog::new()
        .with(ModuleDefinition::new("general").controller("Error", || {
            ActionMap::new().action("error", |_| Err(anyhow!("error page broke")))
        }))
        .with(ModuleDefinition::new("blog").controller("Post", || {
            ActionMap::new().action("fail", |_| Err(anyhow!("boom")))
        }));
    let mut app = Application::new("fatal", catalog);
    let handler = app.add_plugin(ErrorHandler::new(), Some(ErrorHandler::NAME));

    let err = app.run(Request::from_url("/blog/post/fail")).unwrap_err();
    let fatal = err.downcast_ref::<Fatal>().expect("fatal");
    assert_eq!(fatal.0.to_string(), "error page broke");
    assert!(!handler.is_handling());
}

#[test]
fn test_fatal_error_page_does_not_poison_the_next_request() {
    let broken = Rc::new(Cell::new(true));
    let page_broken = Rc::clone(&broken);
    let catalog = ModuleCatalog::new()
        .with(ModuleDefinition::new("general").controller("Error", move || {
            let broken = Rc::clone(&page_broken);
            ActionMap::new().action("error", move |ctx| {
                if broken.replace(false) {
                    return Err(Fatal::new(anyhow!("error page lost its store")).into());
                }
                ctx.response.append_body("error page");
                Ok(())
            })
        }))
        .with(ModuleDefinition::new("blog"));
    let mut app = Application::new("recovering", catalog);
    let handler = app.add_plugin(ErrorHandler::new(), Some(ErrorHandler::NAME));

    // the action escapes before on_dispatched can clear the handler
    let err = app.run(Request::from_url("/blog/missing/read")).unwrap_err();
    assert!(err.downcast_ref::<Fatal>().is_some());
    assert!(handler.is_handling());

    let response = app.run(Request::from_url("/blog/missing/read")).unwrap();
    assert_eq!(response.status(), 404);
    assert_eq!(response.body(), "error page");
    assert!(!handler.is_handling());
}

#[test]
fn test_module_structure_error_leaves_the_loop() {
    let catalog = ModuleCatalog::new().with(ModuleDefinition::new("broken").extends("ghost"));
    let mut app = Application::new("broken", catalog);

    let err = app.run(Request::from_url("/broken/index/index")).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ModuleStructureError>(),
        Some(ModuleStructureError::MissingModule { .. })
    ));
}

#[test]
fn test_before_action_failure_skips_action() {
    let catalog = ModuleCatalog::new().with(ModuleDefinition::new("general").controller(
        "Index",
        || {
            ActionMap::new()
                .before(|_, _| Err(anyhow!("denied")))
                .action("index", |ctx| {
                    ctx.response.append_body("should not run");
                    Ok(())
                })
        },
    ));
    let mut app = Application::new("guarded", catalog);

    let response = app.run(Request::from_url("/")).unwrap();
    assert_eq!(response.body(), "");
    assert_eq!(response.exceptions()[0].to_string(), "denied");
}
