//! Error types raised by the dispatch engine and the module system.
//!
//! Failures that travel through the dispatch loop are carried as
//! [`anyhow::Error`] so actions and plugins can return any error type. The
//! types in this module are the ones the engine itself produces; error
//! handling plugins recover them with `downcast_ref`.

use std::fmt;

/// Why a dispatch attempt could not reach an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchErrorKind {
    /// No request was given to dispatch.
    InvalidRequest,
    /// The module, controller or action does not exist.
    PageNotFound,
    /// The module is abstract and may only be inherited from.
    AbstractModule,
    /// The module is a partial and may only be composed into another module.
    PartialModule,
}

impl DispatchErrorKind {
    /// Stable numeric code, `404` for a missing page.
    #[must_use]
    pub fn code(self) -> u16 {
        match self {
            DispatchErrorKind::AbstractModule => 104,
            DispatchErrorKind::PartialModule => 105,
            DispatchErrorKind::InvalidRequest => 106,
            DispatchErrorKind::PageNotFound => 404,
        }
    }

    /// Short snake_case label for logs.
    #[must_use]
    pub fn as_label(self) -> &'static str {
        match self {
            DispatchErrorKind::InvalidRequest => "invalid_request",
            DispatchErrorKind::PageNotFound => "page_not_found",
            DispatchErrorKind::AbstractModule => "abstract_module",
            DispatchErrorKind::PartialModule => "partial_module",
        }
    }
}

/// Failure to resolve a request to a dispatchable action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchError {
    kind: DispatchErrorKind,
    message: String,
}

impl DispatchError {
    pub fn new(kind: DispatchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn page_not_found(message: impl Into<String>) -> Self {
        Self::new(DispatchErrorKind::PageNotFound, message)
    }

    #[must_use]
    pub fn kind(&self) -> DispatchErrorKind {
        self.kind
    }

    #[must_use]
    pub fn code(&self) -> u16 {
        self.kind.code()
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn is_page_not_found(&self) -> bool {
        self.kind == DispatchErrorKind::PageNotFound
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind.code())
    }
}

impl std::error::Error for DispatchError {}

/// Invalid module wiring.
///
/// Raised while modules are linked together. These are configuration errors:
/// the dispatch loop never captures them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleStructureError {
    /// A final module was used as a parent.
    FinalParent {
        /// Namespace of the module being configured
        module: String,
        /// Namespace of the final module
        parent: String,
    },
    /// A module that is not flagged partial was added as a partial.
    NotPartial {
        /// Namespace of the module being configured
        module: String,
        /// Namespace of the rejected module
        partial: String,
    },
    /// The link would make a module its own ancestor.
    Cycle {
        /// Namespace of the module being configured
        module: String,
        /// Namespace of the module that closes the cycle
        other: String,
    },
    /// A parent or partial namespace has no module definition.
    MissingModule {
        /// Namespace of the module being configured
        module: String,
        /// The namespace that could not be found
        requested: String,
    },
}

impl fmt::Display for ModuleStructureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleStructureError::FinalParent { module, parent } => {
                write!(
                    f,
                    "Module '{module}' cannot extend from final module '{parent}'."
                )
            }
            ModuleStructureError::NotPartial { module, partial } => {
                write!(
                    f,
                    "Module '{module}' cannot complete non-partial module '{partial}'."
                )
            }
            ModuleStructureError::Cycle { module, other } => {
                write!(
                    f,
                    "Linking module '{module}' to '{other}' would create an inheritance cycle."
                )
            }
            ModuleStructureError::MissingModule { module, requested } => {
                write!(
                    f,
                    "Module '{module}' refers to module '{requested}', which is not defined."
                )
            }
        }
    }
}

impl std::error::Error for ModuleStructureError {}

/// Misuse of application level resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplicationError {
    /// A resource resolved to something other than what was asked for.
    ResourceType {
        /// Fully qualified name of the resolved resource
        name: String,
        /// What the caller expected it to be
        expected: &'static str,
    },
    /// An action tried to re-enter a controller that is already executing.
    ControllerBusy {
        /// Name of the busy controller
        controller: String,
    },
    /// Logging was initialized twice, or the subscriber could not be installed.
    Logging(String),
}

impl fmt::Display for ApplicationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplicationError::ResourceType { name, expected } => {
                write!(f, "Resource '{name}' is not a {expected}.")
            }
            ApplicationError::ControllerBusy { controller } => {
                write!(
                    f,
                    "Controller '{controller}' is already executing an action."
                )
            }
            ApplicationError::Logging(reason) => {
                write!(f, "Could not initialize logging: {reason}")
            }
        }
    }
}

impl std::error::Error for ApplicationError {}

/// Marks a failure that must escape the dispatch loop.
///
/// The loop captures every other failure into the response. A plugin returns a
/// `Fatal` when continuing would be wrong, for example a second failure while
/// an error page is being rendered.
#[derive(Debug)]
pub struct Fatal(pub anyhow::Error);

impl Fatal {
    pub fn new(error: impl Into<anyhow::Error>) -> Self {
        Fatal(error.into())
    }

    #[must_use]
    pub fn into_inner(self) -> anyhow::Error {
        self.0
    }
}

impl fmt::Display for Fatal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fatal: {}", self.0)
    }
}

impl std::error::Error for Fatal {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&*self.0)
    }
}
