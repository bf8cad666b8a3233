use std::cell::Cell;

use tracing::{debug, error, info};

use crate::dispatcher::DispatchContext;
use crate::error::{DispatchError, Fatal};
use crate::request::ErrorForward;

use super::ApplicationPlugin;

/// Turns captured failures into an internal forward to the error page.
///
/// After an iteration that captured failures, the request is re-targeted at
/// `(<general module>, error, error)`, the response status becomes `404` (for
/// a missing page) or `500`, and the original request together with the
/// failures is attached as [`Request::forwarded`](crate::request::Request::forwarded).
///
/// If the error page itself fails, the first new failure is returned from
/// `dispatch` as [`Fatal`] instead of forwarding again.
#[derive(Debug, Default)]
pub struct ErrorHandler {
    handling: Cell<bool>,
}

impl ErrorHandler {
    pub const NAME: &'static str = "errorHandler";
    pub const CONTROLLER: &'static str = "error";
    pub const ACTION: &'static str = "error";

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the current dispatch is rendering the error page.
    #[must_use]
    pub fn is_handling(&self) -> bool {
        self.handling.get()
    }
}

impl ApplicationPlugin for ErrorHandler {
    /// A request that is not an error forward starts a fresh dispatch, even
    /// when a fatal failure left the previous error page half rendered.
    fn on_dispatch(&self, ctx: &mut DispatchContext<'_>) -> anyhow::Result<()> {
        if ctx.request.forwarded().is_none() && self.handling.replace(false) {
            debug!("Previous error page never finished, resetting");
        }
        Ok(())
    }

    fn on_dispatched(&self, ctx: &mut DispatchContext<'_>) -> anyhow::Result<()> {
        if self.handling.replace(false) {
            let mut exceptions = ctx.response.take_exceptions();
            if exceptions.is_empty() {
                debug!("Error page rendered");
                return Ok(());
            }
            let first = exceptions.remove(0);
            error!(error = %first, "Failure while rendering the error page");
            return Err(Fatal(first).into());
        }

        let exceptions = ctx.response.take_exceptions();
        let Some(first) = exceptions.first() else {
            return Ok(());
        };

        let not_found = first
            .downcast_ref::<DispatchError>()
            .is_some_and(DispatchError::is_page_not_found);
        for exception in &exceptions {
            match exception.downcast_ref::<DispatchError>() {
                Some(e) if e.is_page_not_found() => debug!(error = %exception, "Handling missing page"),
                _ => error!(error = %exception, "Handling failure"),
            }
        }

        let status = if not_found { 404 } else { 500 };
        ctx.response.set_status(status);

        let original = ctx.request.clone();
        let general = ctx.app.general_module_name().to_string();
        info!(
            status,
            failures = exceptions.len(),
            module = %general,
            "Forwarding to error page"
        );
        ctx.request.set_target(&general, Self::CONTROLLER, Self::ACTION);
        ctx.request.set_forwarded(ErrorForward {
            request: original,
            exceptions,
        });
        ctx.request.set_redispatch(true);
        self.handling.set(true);
        Ok(())
    }
}
