//! Unified error types for the Amethyst core.
//!
//! Framework-level errors (plugin registration, widget configuration) are
//! defined in `amethyst-framework`.

use thiserror::Error;

/// Boxed error returned by user callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// =============================================================================
// Dependency Errors
// =============================================================================

/// Errors raised by the [`Dependencies`](crate::Dependencies) registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DependencyError {
    /// A value of this type is already present.
    #[error("a dependency of type `{type_name}` has already been added")]
    Duplicate {
        /// Fully qualified name of the duplicated type.
        type_name: &'static str,
    },

    /// No value of the requested type is present.
    #[error("no dependency of type `{type_name}` is registered")]
    Missing {
        /// Fully qualified name of the missing type.
        type_name: &'static str,
    },
}

// =============================================================================
// Gateway Errors
// =============================================================================

/// Errors surfaced by a [`Gateway`](crate::Gateway) implementation.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Logging in or connecting failed.
    #[error("failed to connect to the gateway: {0}")]
    Connection(String),

    /// The gateway connection is closed.
    #[error("gateway connection is closed")]
    Closed,

    /// The token was rejected.
    #[error("the bot token was rejected")]
    InvalidToken,

    /// A REST call made on behalf of the framework failed.
    #[error("HTTP request failed ({status}): {message}")]
    Http {
        /// Status code returned by the remote service.
        status: u16,
        /// Error message returned by the remote service.
        message: String,
    },

    /// Failed to (de)serialize a payload.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

// =============================================================================
// Interaction Errors
// =============================================================================

/// Errors raised while reading data out of an [`Interaction`](crate::Interaction).
#[derive(Debug, Error)]
pub enum InteractionError {
    /// An option could not be decoded into the requested type.
    #[error("invalid value for option `{name}`: {source}")]
    InvalidOption {
        /// Option name.
        name: String,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    /// A context menu interaction carried no target.
    #[error("interaction `{0}` has no resolved target")]
    MissingTarget(String),

    /// The resolved target could not be decoded.
    #[error("invalid context menu target: {0}")]
    InvalidTarget(#[source] serde_json::Error),

    /// The interaction is not attached to a gateway and cannot be answered.
    #[error("interaction cannot be answered: no gateway attached")]
    Detached,

    /// Responding failed.
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for dependency lookups.
pub type DependencyResult<T> = Result<T, DependencyError>;

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Result type for interaction accessors.
pub type InteractionResult<T> = Result<T, InteractionError>;

/// Result type returned by widget callbacks.
pub type HandlerResult = Result<(), BoxError>;
