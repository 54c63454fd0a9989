//! # Amethyst Core
//!
//! The core building blocks of the Amethyst Discord plugin framework.
//!
//! ## Architecture Layers
//!
//! ### Foundation Layer
//!
//! - **Dependency Registry**: typed singletons resolved into plugin constructors ([`Dependencies`], [`Inject`])
//! - **Event Descriptors**: named events with a static payload type ([`Event`])
//! - **Data Model**: ids, users, messages and interactions ([`Interaction`], [`Message`])
//!
//! ### Integration Layer
//!
//! - **Gateway**: the connection supplied by a Discord client library ([`Gateway`])
//! - **Gateway Handler**: callbacks the running gateway invokes ([`GatewayHandler`])
//! - **Event Library**: built-in gateway events ([`library`])
//!
//! ## Example
//!
//! ```rust,ignore
//! use amethyst_core::{Dependencies, Event};
//! use std::sync::Arc;
//!
//! struct Greeting(String);
//!
//! pub const ON_GREET: Event<Greeting> = Event::new("on_greet");
//!
//! let mut deps = Dependencies::new();
//! deps.add(Greeting("hello".into()))?;
//! let greeting: Arc<Greeting> = deps.get()?;
//! ```

pub mod error;
pub mod foundation;
pub mod integration;

pub use foundation::{dependency, event, model};
pub use integration::library;

pub use error::{
    BoxError, DependencyError, DependencyResult, GatewayError, GatewayResult, HandlerResult,
    InteractionError, InteractionResult,
};

pub use foundation::{
    ChannelId, CommandKind, Constructor, CurrentUser, Dependencies, Event, GuildId, Inject,
    Interaction, InteractionId, InteractionResponse, Message, MessageId, OptionKind, Payload,
    SharedInteraction, User, UserId,
};

pub use integration::{BoxedGateway, Gateway, GatewayEvent, GatewayHandler};

/// An owned, boxed future, as returned by type-erased callbacks.
pub use futures::future::BoxFuture;

/// Prelude for common imports.
pub mod prelude {
    pub use super::foundation::*;
    pub use super::integration::{Gateway, GatewayHandler};
    pub use super::library::*;
    pub use super::{BoxError, BoxFuture, HandlerResult};
}
