//! # Dispatcher Module
//!
//! The dispatch loop resolves a routed request to a module, controller and
//! action, runs the action and lets plugins restart the whole thing by arming
//! the request's redispatch flag.
//!
//! ## Iteration
//!
//! Every iteration of [`Application::dispatch`](crate::application::Application::dispatch):
//!
//! 1. clears the redispatch flag
//! 2. fires `on_dispatch` on the application plugins
//! 3. starts over if redispatch was armed
//! 4. resolves the module (`PageNotFound`, `AbstractModule`, `PartialModule`)
//! 5. resolves the controller, falling back to the module's index controller
//! 6. resolves the action, falling back to the controller's index action
//! 7. runs the controller call sequence
//! 8. starts over if redispatch was armed
//! 9. fires `on_dispatched` on the application plugins
//!
//! and the loop repeats while the flag is set.
//!
//! ## Error Handling
//!
//! A failure in steps 2 to 9 does not abort the loop: it is appended to the
//! response's exceptions and the loop continues with the redispatch check.
//! Presenting errors is left to plugins such as
//! [`ErrorHandler`](crate::plugins::ErrorHandler), which inspect the
//! exceptions in `on_dispatched` and redispatch to an error page.
//!
//! Two kinds of failure escape the loop and are returned from `dispatch`:
//! errors wrapped in [`Fatal`](crate::error::Fatal) and
//! [`ModuleStructureError`](crate::error::ModuleStructureError)s.

mod core;

pub use core::DispatchContext;
