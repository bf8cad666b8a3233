//! Tests for plugin registration, cascading and the built-in plugins
//!
//! # Test Coverage
//!
//! - Broker naming: generated ids, replacement in place, removal
//! - Cascading of application plugins onto modules and controllers
//! - `Redirector`: rule based, absolute and relative redirects
//! - `ViewRenderer`: action template inside the master layout, overrides,
//!   suppression while a redirect is pending
//! - `ControllerHelpers`: inherited helper lookup, caching, kind checks

mod common;

use std::any::Any;
use std::cell::Cell;
use std::rc::Rc;

use anyhow::anyhow;
use brrtmvc::module::Resource;
use brrtmvc::plugins::{
    ApplicationPlugin, ModuleHelpers, Redirector, ViewFactory, ViewRenderer,
};
use brrtmvc::router::rules::StaticRule;
use brrtmvc::{
    ActionContext, ActionMap, Application, ApplicationError, MiniJinjaView, Module,
    ModuleCatalog, ModuleDefinition, Request, View,
};
use common::{blog_app, event_log, Recorder};
use serde_json::json;

fn redirector(ctx: &ActionContext<'_>) -> anyhow::Result<Rc<Redirector>> {
    ctx.plugin::<Redirector>(Redirector::NAME)
        .ok_or_else(|| anyhow!("no redirector"))
}

#[test]
fn test_application_broker_naming() {
    let log = event_log();
    let mut app = Application::new("names", ModuleCatalog::new());
    assert_eq!(app.plugins().names().collect::<Vec<_>>(), vec!["redirector", "_plugin0"]);

    app.add_plugin(Recorder::new(&log), None);
    app.add_plugin(Redirector::new(), Some("redirector"));
    assert_eq!(
        app.plugins().names().collect::<Vec<_>>(),
        vec!["redirector", "_plugin0", "_plugin1"]
    );
    assert!(app.plugin::<Redirector>("redirector").is_some());
    assert!(app.plugin::<Recorder>("redirector").is_none());

    assert!(app.remove_plugin("_plugin1"));
    assert!(!app.remove_plugin("_plugin1"));
    assert_eq!(app.plugins().len(), 2);
}

/// Adds an `about` rule as soon as it is registered.
struct AboutPage;

impl ApplicationPlugin for AboutPage {
    fn on_plugin_added(&self, app: &mut Application) {
        if let Some(rules) = app.rules_mut() {
            rules.add_rule(
                "about",
                StaticRule::new("about", [("module", "general"), ("controller", "index")]),
            );
        }
    }
}

#[test]
fn test_on_plugin_added_can_configure_the_application() {
    let log = event_log();
    let mut app = blog_app(&log);
    app.add_plugin(AboutPage, Some("about"));

    let response = app.run(Request::from_url("/about")).unwrap();
    assert_eq!(response.body(), "home");
}

#[test]
fn test_plugins_cascade_to_modules_and_controllers() {
    let log = event_log();
    let mut app = blog_app(&log);
    app.run(Request::from_url("/blog/post/read")).unwrap();

    let blog = app.get_module("blog").unwrap().unwrap();
    let module = app.modules().get(blog).unwrap();
    assert_eq!(
        module.plugins().names().collect::<Vec<_>>(),
        vec!["redirector", "_plugin0", "recorder"]
    );
    assert!(module.plugin::<ModuleHelpers>("_plugin0").is_some());

    let controller = app.get_controller(blog, Some("post")).unwrap();
    assert_eq!(
        controller.plugins().names().collect::<Vec<_>>(),
        vec!["redirector", "helper", "recorder"]
    );

    // every scope sees the same redirect state
    let app_redirector = app.plugin::<Redirector>("redirector").unwrap();
    let controller_redirector = controller.plugin::<Redirector>("redirector").unwrap();
    app_redirector.set_redirect_url(&app, &Request::new(), Some("http://x.test/"));
    assert_eq!(
        controller_redirector.redirect_url().as_deref(),
        Some("http://x.test/")
    );
    app_redirector.clear();
}

fn shop_catalog() -> ModuleCatalog {
    ModuleCatalog::new().with(ModuleDefinition::new("shop").controller("Cart", || {
        ActionMap::new()
            .action("save", |ctx| {
                redirector(ctx)?.redirect(
                    ctx.app,
                    ctx.request,
                    [("action", "view"), ("id", "5")],
                    None,
                    true,
                );
                ctx.response.append_body("saved");
                Ok(())
            })
            .action("away", |ctx| {
                redirector(ctx)?
                    .status_code(301)
                    .set_redirect_url(ctx.app, ctx.request, Some("https://other.test/x"));
                Ok(())
            })
            .action("login", |ctx| {
                redirector(ctx)?.set_redirect_url(ctx.app, ctx.request, Some("login"));
                Ok(())
            })
    }))
}

#[test]
fn test_redirect_through_default_rule() {
    let mut app = Application::new("shop", shop_catalog());

    let response = app
        .run(Request::from_url("http://shop.test/shop/cart/save?coupon=x"))
        .unwrap();

    assert_eq!(response.status(), 302);
    assert!(response.is_redirect());
    assert_eq!(
        response.header("Location"),
        Some("http://shop.test/shop/cart/view?id=5")
    );
    assert_eq!(response.body(), "");
    assert!(app.plugin::<Redirector>("redirector").unwrap().redirect_url().is_none());
}

#[test]
fn test_redirect_to_absolute_and_relative_urls() {
    let mut app = Application::new("shop", shop_catalog());
    app.set_base_path("/store");

    let response = app
        .run(Request::from_url("http://shop.test/store/shop/cart/login"))
        .unwrap();
    assert_eq!(response.header("Location"), Some("http://shop.test/store/login"));

    let response = app
        .run(Request::from_url("http://shop.test/store/shop/cart/away"))
        .unwrap();
    assert_eq!(response.status(), 301);
    assert_eq!(response.header("Location"), Some("https://other.test/x"));
}

fn blog_views() -> ViewFactory {
    Rc::new(|_module: &Module, theme: Option<&str>| {
        let mut view = MiniJinjaView::new();
        let master = match theme {
            Some(theme) => format!("<main class=\"{theme}\">{{{{ content }}}}</main>"),
            None => "<main>{{ content }}</main>".to_string(),
        };
        view.add_template("master", &master).ok();
        view.add_template("page/show", "<h1>{{ title }}</h1>").ok();
        view.add_template("page/alt", "<h2>{{ title }}</h2>").ok();
        Rc::new(view) as Rc<dyn View>
    })
}

fn pages_catalog() -> ModuleCatalog {
    ModuleCatalog::new().with(ModuleDefinition::new("site").controller("Page", || {
        ActionMap::new()
            .action("show", |ctx| {
                let view = ctx.view().ok_or_else(|| anyhow!("no view"))?;
                view.assign("title", json!("Hello & welcome"));
                Ok(())
            })
            .action("alt", |ctx| {
                let view = ctx.view().ok_or_else(|| anyhow!("no view"))?;
                view.assign("title", json!("Alt"));
                Ok(())
            })
            .action("swap", |ctx| {
                let view = ctx.view().ok_or_else(|| anyhow!("no view"))?;
                view.assign("title", json!("Swapped"));
                let renderer = ctx
                    .plugin::<ViewRenderer>(ViewRenderer::NAME)
                    .ok_or_else(|| anyhow!("no renderer"))?;
                renderer.set_action("Alt");
                Ok(())
            })
            .action("broken", |_ctx| Err(anyhow!("render me not")))
            .action("leave", |ctx| {
                redirector(ctx)?.set_redirect_url(ctx.app, ctx.request, Some("http://x.test/"));
                Ok(())
            })
    }))
}

#[test]
fn test_view_renderer_wraps_action_in_master() {
    let mut app = Application::new("pages", pages_catalog());
    app.enable_views(blog_views());

    let response = app.run(Request::from_url("/site/page/show")).unwrap();
    assert_eq!(response.body(), "<main><h1>Hello &amp; welcome</h1></main>");
}

#[test]
fn test_view_renderer_master_and_theme_settings() {
    let mut app = Application::new("pages", pages_catalog());
    let renderer = app.enable_views(blog_views());
    renderer.set_theme(Some("dark"));

    let response = app.run(Request::from_url("/site/page/alt")).unwrap();
    assert_eq!(response.body(), "<main class=\"dark\"><h2>Alt</h2></main>");

    renderer.set_master(None);
    let response = app.run(Request::from_url("/site/page/alt")).unwrap();
    assert_eq!(response.body(), "<h2>Alt</h2>");
}

#[test]
fn test_view_renderer_template_override() {
    let mut app = Application::new("pages", pages_catalog());
    let renderer = app.enable_views(blog_views());
    renderer.set_master(None);

    let response = app.run(Request::from_url("/site/page/swap")).unwrap();
    assert_eq!(response.body(), "<h2>Swapped</h2>");
    assert!(renderer.pending_templates().is_empty());
}

#[test]
fn test_failed_action_frame_is_dropped_on_next_dispatch() {
    let mut app = Application::new("pages", pages_catalog());
    let renderer = app.enable_views(blog_views());

    let response = app.run(Request::from_url("/site/page/broken")).unwrap();
    assert_eq!(response.exceptions().len(), 1);
    assert_eq!(renderer.pending_templates(), vec!["page/broken"]);

    let response = app.run(Request::from_url("/site/page/show")).unwrap();
    assert_eq!(response.body(), "<main><h1>Hello &amp; welcome</h1></main>");
    assert!(renderer.pending_templates().is_empty());
}

#[test]
fn test_pending_redirect_suppresses_rendering() {
    let mut app = Application::new("pages", pages_catalog());
    let renderer = app.enable_views(blog_views());

    let response = app.run(Request::from_url("/site/page/leave")).unwrap();
    assert_eq!(response.status(), 302);
    assert_eq!(response.body(), "");
    assert!(!renderer.is_disabled());

    let response = app.run(Request::from_url("/site/page/show")).unwrap();
    assert_eq!(response.status(), 200);
    assert!(response.body().starts_with("<main>"));
}

struct Greeter {
    module: String,
}

fn helper_catalog(built: &Rc<Cell<usize>>) -> ModuleCatalog {
    let built = Rc::clone(built);
    let not_a_helper: Rc<dyn Fn(&Module) -> Rc<dyn Any>> =
        Rc::new(|_module: &Module| Rc::new(0u8) as Rc<dyn Any>);
    ModuleCatalog::new()
        .with(
            ModuleDefinition::new("base")
                .helper("greeter", move |module: &Module| {
                    built.set(built.get() + 1);
                    Greeter {
                        module: module.name().to_string(),
                    }
                })
                .resource("controllers::helpers::odd", Resource::Facade(not_a_helper)),
        )
        .with(
            ModuleDefinition::new("child")
                .extends("base")
                .controller("Index", || {
                    ActionMap::new()
                        .action("index", |ctx| {
                            let helpers = ctx
                                .plugin::<ModuleHelpers>(ModuleHelpers::NAME)
                                .ok_or_else(|| anyhow!("no helpers"))?;
                            for _ in 0..2 {
                                let greeter = helpers
                                    .helper::<Greeter>(ctx.app, "greeter")?
                                    .ok_or_else(|| anyhow!("no greeter"))?;
                                ctx.response
                                    .append_body(&format!("hi from {};", greeter.module));
                            }
                            Ok(())
                        })
                        .action("missing", |ctx| {
                            let helpers = ctx
                                .plugin::<ModuleHelpers>(ModuleHelpers::NAME)
                                .ok_or_else(|| anyhow!("no helpers"))?;
                            let found = helpers.helper::<Greeter>(ctx.app, "nobody")?;
                            ctx.response.append_body(&format!("{}", found.is_some()));
                            Ok(())
                        })
                        .action("odd", |ctx| {
                            let helpers = ctx
                                .plugin::<ModuleHelpers>(ModuleHelpers::NAME)
                                .ok_or_else(|| anyhow!("no helpers"))?;
                            helpers.helper::<Greeter>(ctx.app, "odd")?;
                            Ok(())
                        })
                }),
        )
}

#[test]
fn test_helpers_resolve_through_parent_and_are_cached() {
    let built = Rc::new(Cell::new(0));
    let mut app = Application::new("helpers", helper_catalog(&built));

    let response = app.run(Request::from_url("/child")).unwrap();
    assert_eq!(response.body(), "hi from child;hi from child;");
    assert_eq!(built.get(), 1);

    let response = app.run(Request::from_url("/child/index/missing")).unwrap();
    assert_eq!(response.body(), "false");
}

#[test]
fn test_helper_of_wrong_kind_is_an_error() {
    let built = Rc::new(Cell::new(0));
    let mut app = Application::new("helpers", helper_catalog(&built));

    let response = app.run(Request::from_url("/child/index/odd")).unwrap();
    let error = response.exceptions()[0]
        .downcast_ref::<ApplicationError>()
        .unwrap();
    assert!(matches!(
        error,
        ApplicationError::ResourceType { expected: "helper", .. }
    ));
}
