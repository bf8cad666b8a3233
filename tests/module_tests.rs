//! Module inheritance as seen by requests
//!
//! The arena and its structural checks are unit tested inside the crate;
//! these tests dispatch into module hierarchies through a whole application.

mod common;

use std::rc::Rc;

use anyhow::anyhow;
use brrtmvc::{ActionMap, Application, ModuleCatalog, ModuleDefinition, Module, Request};
use common::{event_log, events, push, EventLog, Recorder};

fn hello(label: &'static str) -> impl Fn() -> ActionMap + 'static {
    move || {
        ActionMap::new()
            .action("index", move |ctx| {
                ctx.response
                    .append_body(&format!("{label} in {}", ctx.controller.namespace()));
                Ok(())
            })
            .action("owner", |ctx| {
                let owner = ctx
                    .facade::<String>("owner")?
                    .ok_or_else(|| anyhow!("no owner facade"))?;
                ctx.response.append_body(&owner);
                Ok(())
            })
    }
}

fn family(log: &EventLog) -> ModuleCatalog {
    let index_log = Rc::clone(log);
    ModuleCatalog::new()
        .with(
            ModuleDefinition::new("base")
                .abstract_module()
                .controller("Index", hello("base index"))
                .controller("Account", hello("base account"))
                .facade("owner", |module: &Module| format!("owned by {}", module.name())),
        )
        .with(
            ModuleDefinition::new("widgets")
                .partial_module()
                .controller("Account", hello("widget account"))
                .controller("Sidebar", hello("sidebar")),
        )
        .with(
            ModuleDefinition::new("shop")
                .extends("base")
                .with_partial("widgets")
                .controller("Cart", move || {
                    let log = Rc::clone(&index_log);
                    ActionMap::new().action("index", move |ctx| {
                        push(&log, "cart");
                        ctx.response.append_body("cart");
                        Ok(())
                    })
                }),
        )
}

fn family_app(log: &EventLog) -> Application {
    let mut app = Application::new("family", family(log));
    app.add_plugin(Recorder::new(log), Some("recorder"));
    app
}

#[test]
fn test_inherited_controller_answers_for_child() {
    let log = event_log();
    let mut app = family_app(&log);

    let response = app.run(Request::from_url("/shop")).unwrap();
    assert_eq!(response.body(), "base index in modules::base");

    let response = app.run(Request::from_url("/shop/cart")).unwrap();
    assert_eq!(response.body(), "cart");
}

#[test]
fn test_partial_controller_shadows_parent() {
    let log = event_log();
    let mut app = family_app(&log);

    let response = app.run(Request::from_url("/shop/account")).unwrap();
    assert_eq!(response.body(), "widget account in modules::widgets");

    let response = app.run(Request::from_url("/shop/sidebar")).unwrap();
    assert_eq!(response.body(), "sidebar in modules::widgets");
}

#[test]
fn test_parent_and_partials_created_before_child() {
    let log = event_log();
    let mut app = family_app(&log);

    app.run(Request::from_url("/shop/cart")).unwrap();

    let created: Vec<String> = events(&log)
        .into_iter()
        .filter(|e| e.starts_with("module_created:"))
        .collect();
    assert_eq!(
        created,
        vec![
            "module_created:base",
            "module_created:widgets",
            "module_created:shop",
        ]
    );
    assert_eq!(app.modules().len(), 3);
}

#[test]
fn test_inherited_controller_instances_belong_to_the_child() {
    let log = event_log();
    let mut app = family_app(&log);

    app.run(Request::from_url("/shop")).unwrap();
    app.run(Request::from_url("/shop/index/index")).unwrap();
    // one instance for shop, created once and reused
    assert_eq!(
        events(&log)
            .iter()
            .filter(|e| e.as_str() == "controller_created:Index")
            .count(),
        1
    );

    let shop = app.get_module("shop").unwrap().unwrap();
    let controller = app.get_controller(shop, None).unwrap();
    assert_eq!(controller.module_id(), shop);
    assert_eq!(controller.namespace(), "modules::base");
}

#[test]
fn test_facade_built_for_the_requesting_module() {
    let log = event_log();
    let mut app = family_app(&log);

    let response = app.run(Request::from_url("/shop/account/owner")).unwrap();
    assert_eq!(response.body(), "owned by shop");
}

#[test]
fn test_abstract_parent_cannot_be_dispatched_directly() {
    let log = event_log();
    let mut app = family_app(&log);

    let response = app.run(Request::from_url("/base")).unwrap();
    assert!(response.has_exceptions());
    assert_eq!(response.body(), "");
}
