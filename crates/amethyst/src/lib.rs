//! # Amethyst
//!
//! A plugin and widget framework for Discord bots.
//!
//! ## Overview
//!
//! An Amethyst bot is a set of plugins. Each plugin is a plain type whose
//! methods are declared as *widgets*: slash commands, context menus, event
//! handlers and cron schedules. The client constructs one instance of every
//! plugin from a dependency registry and binds its widgets to that instance.
//!
//! ```text
//! ┌──────────┐   dispatch    ┌──────────────┐   bound widgets   ┌───────────────┐
//! │ Gateway  │──────────────▶│ ClientHandle │──────────────────▶│ Plugin "Dice" │
//! │ (Discord)│◀──────────────│ events, tree │──────────────────▶│ Plugin "Mod"  │
//! └──────────┘   tree sync   │ schedules    │                   └───────────────┘
//!                            └──────────────┘
//! ```
//!
//! - **Gateway**: the connection to Discord, supplied by the application
//! - **Client**: registers plugins and owns the dependency registry
//! - **Plugins**: constructed once; their widgets capture the instance
//! - **Runtime**: configuration, logging and Ctrl+C handling
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use amethyst::prelude::*;
//!
//! #[derive(Default)]
//! pub struct Ping;
//!
//! #[plugin]
//! impl Ping {
//!     /// Checks that the bot is alive.
//!     #[command]
//!     async fn ping(&self, interaction: Interaction) -> HandlerResult {
//!         interaction.reply("Pong!").await?;
//!         Ok(())
//!     }
//! }
//!
//! register_plugin!(Ping);
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = AmethystRuntime::new()?;
//!     let client = Client::new(module_path!(), Arc::new(MyGateway::new()))?;
//!     runtime.run(client).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` (default): read `amethyst.toml`
//! - `yaml-config`: read `amethyst.yaml`
//! - `json-log`: JSON log lines

pub use amethyst_core as core;
pub use amethyst_framework as framework;
pub use amethyst_runtime as runtime;

pub use amethyst_framework::register_plugin;
pub use amethyst_macros::plugin;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use amethyst::prelude::*;
/// ```
pub mod prelude {
    pub use std::sync::Arc;

    // Runtime - main entry point
    pub use amethyst_runtime::AmethystRuntime;

    // Plugins and the client
    pub use crate::{plugin, register_plugin};
    pub use amethyst_framework::{
        Client, ClientHandle, ClientResult, Plugin, PluginId, WidgetPlugin, WidgetResult,
        Widgets,
    };

    // Widgets for hand-written plugins
    pub use amethyst_framework::{
        CommandOption, CommandWidget, ContextMenuWidget, EventWidget, ScheduleWidget,
    };

    // Data model, events and handler results
    pub use amethyst_core::library::*;
    pub use amethyst_core::{
        ChannelId, CommandKind, Event, GuildId, HandlerResult, Interaction, Message, User, UserId,
    };
}
