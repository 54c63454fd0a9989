//! Plugin system for the Amethyst framework.
//!
//! # Architecture
//!
//! A plugin is a plain type implementing [`Plugin`]. The client builds exactly
//! one instance per type:
//!
//! 1. [`Plugin::Deps`] is resolved from the client's
//!    [`Dependencies`](amethyst_core::Dependencies).
//! 2. [`Plugin::construct`] builds the instance.
//! 3. [`Plugin::widgets`] declares the commands, event handlers, schedules and
//!    context menus of the plugin. Every widget is bound to the shared
//!    instance before it is registered.
//!
//! # Quick start
//!
//! Plugins are usually written with the `#[plugin]` attribute, which derives
//! this trait from an `impl` block:
//!
//! ```rust,ignore
//! use amethyst::prelude::*;
//!
//! pub struct Greeter { db: Arc<Database> }
//!
//! #[plugin]
//! impl Greeter {
//!     fn new(db: Arc<Database>) -> Self {
//!         Self { db }
//!     }
//!
//!     /// Says hello.
//!     #[command]
//!     async fn hello(&self, interaction: Interaction) -> HandlerResult {
//!         interaction.reply("Hello!").await?;
//!         Ok(())
//!     }
//! }
//!
//! register_plugin!(Greeter);
//! ```
//!
//! Implementing it by hand is equally supported:
//!
//! ```rust,ignore
//! impl Plugin for Greeter {
//!     type Deps = (Arc<Database>,);
//!
//!     fn construct((db,): Self::Deps) -> Self {
//!         Self { db }
//!     }
//!
//!     fn widgets(widgets: &mut Widgets<Self>) -> WidgetResult<()> {
//!         widgets.command(
//!             CommandWidget::new("hello", |this: Arc<Self>, interaction: Interaction| async move {
//!                 this.hello(interaction).await
//!             })
//!             .description("Says hello."),
//!         )?;
//!         Ok(())
//!     }
//! }
//! ```

use std::any::{TypeId, type_name};
use std::fmt;

use amethyst_core::Inject;

use crate::client::Client;
use crate::error::{ClientResult, WidgetResult};
use crate::widget::Widgets;

/// A unit of functionality registered with a [`Client`].
pub trait Plugin: Send + Sync + Sized + 'static {
    /// Constructor parameters, resolved from the dependency registry.
    type Deps: Inject;

    /// Builds the plugin instance.
    fn construct(deps: Self::Deps) -> Self;

    /// Declares the plugin's widgets.
    fn widgets(widgets: &mut Widgets<Self>) -> WidgetResult<()> {
        let _ = widgets;
        Ok(())
    }

    /// Name used in logs and errors. Defaults to the unqualified type name.
    fn name() -> &'static str {
        short_type_name::<Self>()
    }
}

/// A plugin that handles a custom widget kind declared by other plugins.
///
/// The client registers a widget plugin on demand the first time one of its
/// widgets is bound, then hands each widget to [`register`](Self::register).
pub trait WidgetPlugin: Plugin {
    /// The widget value other plugins declare.
    type Widget: Send + 'static;

    /// Accepts a bound widget declared by `owner`.
    fn register(&self, widget: Self::Widget, owner: PluginId) -> WidgetResult<()>;
}

/// Identity of a registered plugin type.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PluginId {
    type_id: TypeId,
    name: &'static str,
}

impl PluginId {
    /// Identity of `P`.
    pub fn of<P: Plugin>() -> Self {
        Self {
            type_id: TypeId::of::<P>(),
            name: P::name(),
        }
    }

    /// Plugin name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type id of the plugin.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }
}

impl fmt::Debug for PluginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PluginId").field(&self.name).finish()
    }
}

impl fmt::Display for PluginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Registration state of a plugin type within a client.
///
/// ```text
/// register_plugin() ──► Registering ──► Registered
///                           │
///                           └─ any failure: entry removed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginState {
    /// Registration is in progress.
    Registering,
    /// Fully registered; widgets are live.
    Registered,
}

/// Registers `P` with `client`. Used as the function pointer of plugin
/// descriptors.
pub fn register_descriptor<P: Plugin>(client: &mut Client) -> ClientResult<()> {
    client.register_plugin::<P>()
}

/// `a::b::Greeter<c::D>` → `Greeter<c::D>`.
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = type_name::<T>();
    let head = full.find('<').map_or(full, |end| &full[..end]);
    match head.rfind("::") {
        Some(sep) => &full[sep + 2..],
        None => full,
    }
}
