use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::{debug, info};

use crate::application::{Application, DEFAULT_RULE};
use crate::controller::ControllerInstance;
use crate::dispatcher::DispatchContext;
use crate::module::Module;
use crate::request::{Params, Request};

use super::{ApplicationPlugin, ControllerPlugin, ModulePlugin, ViewRenderer};

struct RedirectState {
    url: RefCell<Option<String>>,
    status: Cell<u16>,
}

/// Redirect on demand.
///
/// An action asks for a redirect through the controller scope handle
/// (`ctx.plugin::<Redirector>("redirector")`); once the dispatch finishes
/// without redispatching, the response becomes a `302` (or the configured
/// status) with a `Location` header and an empty body.
///
/// All handles registered on modules and controllers share one state.
#[derive(Clone)]
pub struct Redirector {
    state: Rc<RedirectState>,
}

impl Default for Redirector {
    fn default() -> Self {
        Self {
            state: Rc::new(RedirectState {
                url: RefCell::new(None),
                status: Cell::new(302),
            }),
        }
    }
}

impl Redirector {
    pub const NAME: &'static str = "redirector";

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn redirect_url(&self) -> Option<String> {
        self.state.url.borrow().clone()
    }

    #[must_use]
    pub fn status(&self) -> u16 {
        self.state.status.get()
    }

    pub fn status_code(&self, status: u16) -> &Self {
        self.state.status.set(status);
        self
    }

    /// Redirect to `url`, or cancel a pending redirect with `None`.
    ///
    /// URLs without a scheme are taken relative to the base URL of `current`.
    pub fn set_redirect_url(&self, app: &Application, current: &Request, url: Option<&str>) -> &Self {
        let url = url.map(|url| {
            if url.contains("://") {
                url.to_string()
            } else if url.is_empty() {
                current.base_url()
            } else {
                format!("{}/{}", current.base_url(), url.trim_start_matches('/'))
            }
        });
        self.store(app, url);
        self
    }

    /// Redirect to the URL the rule `rule` (default `default`) builds for
    /// `params`.
    ///
    /// Module, controller and action default to those of `current` and may be
    /// overridden through `params`. With `reset_user_params` the GET
    /// parameters of `current` are dropped, otherwise they are carried over.
    pub fn redirect<I, K, V>(
        &self,
        app: &Application,
        current: &Request,
        params: I,
        rule: Option<&str>,
        reset_user_params: bool,
    ) -> &Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut request = Request::new();
        request.set_scheme(current.scheme());
        if let Some(host) = current.header("host") {
            request.set_header("Host", host);
        }
        request.set_base_path(current.base_path());

        let mut get_params: Params = if reset_user_params {
            Params::new()
        } else {
            current.get_params().clone()
        };
        get_params.extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));

        let module = get_params
            .remove("module")
            .or_else(|| current.module().map(str::to_string));
        let controller = get_params
            .remove("controller")
            .or_else(|| current.controller().map(str::to_string));
        let action = get_params
            .remove("action")
            .or_else(|| current.action().map(str::to_string));
        request.set_module(module);
        request.set_controller(controller);
        request.set_action(action);
        request.set_get_params(get_params);

        let rule = rule.unwrap_or(DEFAULT_RULE);
        let unrouted = app.unroute(request, rule);
        let url = unrouted.url();
        debug!(rule, url = %url, "Redirect URL built");
        self.store(app, Some(url));
        self
    }

    /// Drop a pending redirect without touching the view renderer.
    pub fn clear(&self) {
        self.state.url.replace(None);
    }

    fn store(&self, app: &Application, url: Option<String>) {
        if let Some(renderer) = app.plugin::<ViewRenderer>(ViewRenderer::NAME) {
            renderer.set_disabled(url.is_some());
        }
        self.state.url.replace(url);
    }
}

impl ApplicationPlugin for Redirector {
    fn on_module_created(&self, module: &mut Module) {
        module.add_plugin(Rc::new(self.clone()), Some(Self::NAME));
    }

    fn on_dispatched(&self, ctx: &mut DispatchContext<'_>) -> anyhow::Result<()> {
        if ctx.request.redispatch() {
            return Ok(());
        }
        let Some(url) = self.state.url.replace(None) else {
            return Ok(());
        };

        let status = self.status();
        info!(url = %url, status, "Redirecting");
        ctx.response.redirect(&url, status);
        ctx.response.clear_body();
        if let Some(renderer) = ctx.app.plugin::<ViewRenderer>(ViewRenderer::NAME) {
            renderer.set_disabled(false);
        }
        Ok(())
    }
}

impl ModulePlugin for Redirector {
    fn on_controller_created(&self, controller: &mut ControllerInstance) {
        controller.add_plugin(Rc::new(self.clone()), Some(Self::NAME));
    }
}

impl ControllerPlugin for Redirector {}
