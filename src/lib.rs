//! # brrtmvc
//!
//! **brrtmvc** is the request routing and dispatch core of an MVC web
//! framework: a bidirectional, rule based router and a redispatching,
//! plugin instrumented dispatch loop over hierarchically resolved modules.
//!
//! ## Overview
//!
//! A request URL is turned into a `(module, controller, action, params)`
//! target by the first matching rule, and a target is turned back into its
//! canonical URL by a named rule. Dispatch resolves the target against a tree
//! of modules that inherit controllers from their partials and parents, runs
//! the action and lets plugins at application, module and controller scope
//! observe and rewrite every step. Any step may arm *redispatch* to restart
//! the loop with a rewritten target, which is how forwards and error pages
//! work.
//!
//! ## Architecture
//!
//! - **[`router`]** - The [`Rule`] capability, the five rule variants and the
//!   priority ordered [`RuleBasedRouter`]
//! - **[`module`]** - Module definitions, the module arena and resource
//!   resolution along the inheritance chain
//! - **[`controller`]** - Controllers, the action call sequence and the
//!   closure based [`ActionMap`]
//! - **[`dispatcher`]** - The redispatching dispatch loop
//! - **[`plugins`]** - Plugin capabilities, the per scope broker and the
//!   built-in plugins
//! - **[`application`]** - Owns router, modules and application plugins
//! - **[`view`]** - Template rendering through `minijinja`
//! - **[`config`]** - YAML configuration of routes, views and plugins
//! - **[`logging`]** - `tracing` subscriber setup
//!
//! ### Request Handling Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant App as Application
//!     participant Router as RuleBasedRouter
//!     participant Disp as dispatch loop
//!     participant Ctrl as ControllerInstance
//!
//!     App->>App: on_route (application plugins)
//!     App->>Router: route(request)
//!     Router->>Router: try rules, newest first
//!     Router-->>App: request with target
//!     App->>App: on_routed (application plugins)
//!     App->>Disp: dispatch(request)
//!     loop until redispatch is not armed
//!         Disp->>Disp: on_dispatch
//!         Disp->>Disp: resolve module, controller, action
//!         Disp->>Ctrl: call(action)
//!         Ctrl->>Ctrl: on_action_call, before_action, action, after_action, on_action_called
//!         Disp->>Disp: on_dispatched
//!     end
//!     Disp-->>App: Response
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use brrtmvc::{ActionMap, Application, ModuleCatalog, ModuleDefinition, Request};
//!
//! let catalog = ModuleCatalog::new().with(
//!     ModuleDefinition::new("blog").controller("Post", || {
//!         ActionMap::new().action("read", |ctx| {
//!             let id = ctx.request.param("id").unwrap_or_default().to_string();
//!             ctx.response.append_body(&format!("post {id}"));
//!             Ok(())
//!         })
//!     }),
//! );
//!
//! let mut app = Application::new("blog", catalog);
//! let response = app.run(Request::from_url("/blog/post/read?id=42"))?;
//! assert_eq!(response.body(), "post 42");
//! ```
//!
//! ## Runtime Considerations
//!
//! The engine is single threaded: modules, controllers and plugins are shared
//! through `Rc` and mutated through `Cell`/`RefCell`. Run one [`Application`]
//! per thread.

pub mod application;
pub mod cli;
pub mod config;
pub mod controller;
pub mod dispatcher;
pub mod error;
pub mod ids;
pub mod logging;
pub mod module;
pub mod plugins;
pub mod request;
pub mod response;
pub mod router;
pub mod view;

pub use application::{Application, DEFAULT_RULE};
pub use config::AppConfig;
pub use controller::{ActionContext, ActionMap, Controller, ControllerInstance};
pub use dispatcher::DispatchContext;
pub use error::{ApplicationError, DispatchError, DispatchErrorKind, Fatal, ModuleStructureError};
pub use module::{Module, ModuleCatalog, ModuleDefinition, ModuleId};
pub use plugins::{ApplicationPlugin, ControllerPlugin, ModulePlugin};
pub use request::Request;
pub use response::Response;
pub use router::{Router, Rule, RuleBasedRouter};
pub use view::{MiniJinjaView, View};
