use tracing::{debug, error, info, info_span, warn};

use crate::application::Application;
use crate::error::{DispatchError, DispatchErrorKind, Fatal, ModuleStructureError};
use crate::request::Request;
use crate::response::Response;

/// What application plugins get to see during `on_dispatch` and
/// `on_dispatched`.
pub struct DispatchContext<'a> {
    pub app: &'a mut Application,
    pub request: &'a mut Request,
    pub response: &'a mut Response,
}

/// Whether `error` must leave the dispatch loop instead of being captured.
fn is_fatal(error: &anyhow::Error) -> bool {
    error.is::<Fatal>() || error.is::<ModuleStructureError>()
}

/// Capture `error` into the response, or hand it back when it is fatal.
fn capture(response: &mut Response, error: anyhow::Error, stage: &'static str) -> anyhow::Result<()> {
    if is_fatal(&error) {
        error!(stage, error = %error, "Fatal failure, leaving dispatch loop");
        return Err(error);
    }

    match error.downcast_ref::<DispatchError>() {
        Some(dispatch_error) if dispatch_error.is_page_not_found() => {
            warn!(stage, error = %error, "Page not found");
        }
        Some(dispatch_error) => {
            warn!(stage, kind = dispatch_error.kind().as_label(), error = %error, "Dispatch failed");
        }
        None => {
            error!(stage, error = %error, "Dispatch failed");
        }
    }
    response.add_exception(error);
    Ok(())
}

impl Application {
    /// Run the dispatch loop for `request` and return the response.
    ///
    /// `None` fails with `InvalidRequest`. Failures during the loop are
    /// captured in [`Response::exceptions`]; only fatal ones are returned as
    /// `Err`.
    pub fn dispatch(&mut self, request: Option<Request>) -> anyhow::Result<Response> {
        let Some(mut request) = request else {
            return Err(DispatchError::new(DispatchErrorKind::InvalidRequest, "No request specified.").into());
        };
        let mut response = Response::new();

        let span = info_span!("dispatch", request_id = %request.id());
        let _guard = span.enter();

        let mut iteration = 0u32;
        loop {
            iteration += 1;
            request.set_redispatch(false);
            debug!(
                iteration,
                module = ?request.module(),
                controller = ?request.controller(),
                action = ?request.action(),
                "Dispatch iteration"
            );

            if let Err(err) = self.fire_dispatch(&mut request, &mut response) {
                capture(&mut response, err, "on_dispatch")?;
            }
            if request.redispatch() {
                continue;
            }

            if let Err(err) = self.dispatch_target(&mut request, &mut response) {
                capture(&mut response, err, "action")?;
            }
            if request.redispatch() {
                continue;
            }

            if let Err(err) = self.fire_dispatched(&mut request, &mut response) {
                capture(&mut response, err, "on_dispatched")?;
            }
            if !request.redispatch() {
                break;
            }
        }

        info!(
            iterations = iteration,
            status = response.status(),
            exceptions = response.exceptions().len(),
            "Dispatch complete"
        );
        Ok(response)
    }

    fn fire_dispatch(&mut self, request: &mut Request, response: &mut Response) -> anyhow::Result<()> {
        let mut ctx = DispatchContext {
            app: self,
            request,
            response,
        };
        for plugin in ctx.app.plugin_snapshot() {
            plugin.on_dispatch(&mut ctx)?;
        }
        Ok(())
    }

    fn fire_dispatched(&mut self, request: &mut Request, response: &mut Response) -> anyhow::Result<()> {
        let mut ctx = DispatchContext {
            app: self,
            request,
            response,
        };
        for plugin in ctx.app.plugin_snapshot() {
            plugin.on_dispatched(&mut ctx)?;
        }
        Ok(())
    }

    /// Steps 4 to 7 of an iteration.
    fn dispatch_target(&mut self, request: &mut Request, response: &mut Response) -> anyhow::Result<()> {
        let namespace = request
            .module()
            .map(str::to_string)
            .ok_or_else(|| DispatchError::page_not_found("Page not found."))?;

        let module_id = self
            .get_module(&namespace)?
            .ok_or_else(|| DispatchError::page_not_found(format!("Module '{namespace}' not found.")))?;
        let Some(module) = self.modules().get(module_id) else {
            return Err(DispatchError::page_not_found(format!("Module '{namespace}' not found.")).into());
        };

        if module.is_abstract() {
            return Err(DispatchError::new(
                DispatchErrorKind::AbstractModule,
                format!("Cannot dispatch on abstract module '{namespace}'."),
            )
            .into());
        }
        if module.is_partial() {
            return Err(DispatchError::new(
                DispatchErrorKind::PartialModule,
                format!("Cannot dispatch on partial module '{namespace}'."),
            )
            .into());
        }

        let controller_name = request
            .controller()
            .map(str::to_string)
            .unwrap_or_else(|| module.index_controller_name().to_string());
        let controller = self
            .get_controller(module_id, Some(&controller_name))
            .ok_or_else(|| {
                DispatchError::page_not_found(format!(
                    "Controller '{controller_name}' in module '{namespace}' not found."
                ))
            })?;

        let action = match request.action() {
            Some(action) => action.to_string(),
            None => controller.index_action_name()?,
        };
        if !controller.is_action(&action)? {
            return Err(DispatchError::page_not_found(format!(
                "Action '{action}' in controller '{controller_name}' in module '{namespace}' not found."
            ))
            .into());
        }

        let mut ctx = DispatchContext {
            app: self,
            request,
            response,
        };
        controller.call(&action, &mut ctx)
    }
}
