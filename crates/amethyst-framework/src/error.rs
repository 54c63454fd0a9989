//! Error types for the Amethyst framework.

use amethyst_core::{BoxError, CommandKind, DependencyError, GatewayError};
use thiserror::Error;

/// Configuration errors raised while a widget is constructed or collected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WidgetError {
    /// The cron expression could not be parsed.
    #[error("bad cron expression '{expression}': {reason}")]
    InvalidCron {
        /// Expression as written.
        expression: String,
        /// Parser message.
        reason: String,
    },

    /// A command or context menu name is not acceptable to Discord.
    #[error("invalid {kind} name '{name}': {reason}")]
    InvalidName {
        /// Kind of command the name belongs to.
        kind: CommandKind,
        /// Offending name.
        name: String,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// A command or option description is empty.
    #[error("description of '{0}' must not be empty")]
    InvalidDescription(String),

    /// An event handler does not match the event's calling convention.
    #[error("event '{event}' is {expected}, but the handler is not")]
    EventKindMismatch {
        /// Event name.
        event: &'static str,
        /// `"asynchronous"` or `"blocking"`.
        expected: &'static str,
    },

    /// Two descriptors of the same event name disagree on the payload type.
    #[error("event '{event}' carries `{registered}`, not `{requested}`")]
    PayloadMismatch {
        /// Event name.
        event: &'static str,
        /// Payload type already registered under the name.
        registered: &'static str,
        /// Payload type of the rejected handler.
        requested: &'static str,
    },
}

/// Raised when the home module of a composing root cannot be determined.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unable to locate the home module of '{path}': {reason}")]
pub struct ModuleLocateError {
    /// Module path that was inspected.
    pub path: String,
    /// Why it could not be resolved.
    pub reason: &'static str,
}

/// Errors surfaced by the [`Client`](crate::Client).
#[derive(Debug, Error)]
pub enum ClientError {
    /// The plugin type is already registered with this client.
    #[error("plugin '{0}' is already registered")]
    DuplicatePlugin(&'static str),

    /// The plugin could not be constructed from the registered dependencies.
    #[error("failed to register plugin '{plugin}': {source}")]
    PluginDependency {
        /// Plugin name.
        plugin: &'static str,
        /// The dependency that could not be resolved.
        #[source]
        source: DependencyError,
    },

    /// A dependency of this type is already registered.
    #[error(transparent)]
    DuplicateDependency(DependencyError),

    /// The plugin type is not registered with this client.
    #[error("plugin '{0}' is not registered")]
    PluginNotRegistered(&'static str),

    /// Registering a widget plugin on demand re-entered its own registration.
    #[error("widget plugin '{0}' depends on itself while registering")]
    CircularWidgetPlugin(&'static str),

    /// A widget is misconfigured.
    #[error("plugin '{plugin}' declares an invalid widget: {source}")]
    Widget {
        /// Plugin name.
        plugin: &'static str,
        /// Configuration error.
        #[source]
        source: WidgetError,
    },

    /// A command with the same name and kind already exists in the tree.
    #[error("{kind} '{name}' is already registered")]
    CommandExists {
        /// Kind of the command.
        kind: CommandKind,
        /// Command name.
        name: String,
    },

    /// The home module of a plugin search could not be determined.
    #[error(transparent)]
    ModuleLocate(#[from] ModuleLocateError),

    /// The gateway failed.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// A setup hook failed, aborting start.
    #[error("setup hook failed: {0}")]
    Setup(#[source] BoxError),
}

/// Result type for widget construction.
pub type WidgetResult<T> = Result<T, WidgetError>;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;
