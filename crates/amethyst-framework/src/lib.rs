//! # Amethyst Framework
//!
//! Plugin and widget machinery for Discord bots.
//!
//! This layer provides:
//! - [`Plugin`] types constructed from a dependency registry
//! - Widgets: commands, context menus, event handlers and cron schedules
//! - Link-time plugin discovery by module path ([`register_plugin!`])
//! - [`Client`], which registers plugins and drives them on a gateway
//! - The schedule loop and the command tree diff used for synchronisation
//!
//! The gateway connection itself is supplied through
//! [`Gateway`](amethyst_core::Gateway).

pub mod client;
pub mod discovery;
pub mod error;
mod events;
pub mod handle;
pub mod plugin;
pub mod scheduler;
pub mod tree;
pub mod widget;

pub use client::{Client, ClientBuilder};
pub use discovery::{DEFAULT_MODULES, Discovery, PLUGINS, PluginDescriptor};
pub use error::{ClientError, ClientResult, ModuleLocateError, WidgetError, WidgetResult};
pub use handle::ClientHandle;
pub use plugin::{Plugin, PluginId, PluginState, WidgetPlugin};
pub use scheduler::{ScheduledTask, Scheduler};
pub use tree::{AppCommand, CommandTree, is_dict_subset, tree_changed};
pub use widget::{
    CommandOption, CommandWidget, ContextMenuWidget, CronExpr, EventWidget, HandlerOutput,
    MenuSubject, OptionType, ScheduleWidget, Widget, WidgetHandle, WidgetKind, Widgets,
};

#[doc(hidden)]
pub mod __private {
    pub use linkme;
}
