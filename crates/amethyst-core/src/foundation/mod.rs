//! Foundation layer - Core abstractions and type system.
//!
//! This module contains the fundamental building blocks of the Amethyst framework:
//! - Dependency registry used to construct plugins
//! - Event descriptors naming subscribable events and their payloads
//! - Discord data model shared with gateway implementations

pub mod dependency;
pub mod event;
pub mod model;

pub use dependency::{Constructor, Dependencies, Inject};
pub use event::{Event, Payload};
pub use model::{
    ChannelId, CommandKind, CurrentUser, GuildId, Interaction, InteractionId,
    InteractionResponse, Message, MessageId, OptionKind, SharedInteraction, User, UserId,
};
