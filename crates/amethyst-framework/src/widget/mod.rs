//! Widgets: the declarative parts of a plugin.
//!
//! A plugin lists its widgets in [`Plugin::widgets`]. Each widget wraps a
//! callback taking the plugin instance as its first argument, plus the
//! metadata of its kind:
//!
//! | widget                 | registered with        |
//! |------------------------|------------------------|
//! | [`CommandWidget`]      | the command tree       |
//! | [`ContextMenuWidget`]  | the command tree       |
//! | [`EventWidget`]        | the event table        |
//! | [`ScheduleWidget`]     | the schedule loop      |
//! | custom                 | a [`WidgetPlugin`]     |
//!
//! Widgets are immutable descriptors. On registration the client binds every
//! widget to the shared plugin instance; the bound callbacks capture the
//! instance, so no lookup happens when they run.

pub mod command;
pub mod event;
pub mod menu;
pub mod schedule;

use std::fmt;
use std::sync::Arc;

use amethyst_core::{BoxError, BoxFuture, HandlerResult};
use futures::FutureExt;

use crate::client::Client;
use crate::error::{ClientError, ClientResult, WidgetResult};
use crate::events::BoundEvent;
use crate::plugin::{Plugin, PluginId, WidgetPlugin};
use crate::scheduler::ScheduledTask;
use crate::tree::AppCommand;

pub use command::{CommandOption, CommandWidget, OptionType};
pub use event::EventWidget;
pub use menu::{ContextMenuWidget, MenuSubject};
pub use schedule::{CronExpr, ScheduleWidget};

// ============================================================================
// HandlerOutput - widget callback return values
// ============================================================================

/// Return types accepted from widget callbacks.
///
/// Implemented for `()` and for `Result<(), E>` with any error convertible
/// into [`BoxError`].
pub trait HandlerOutput: Send + 'static {
    /// Converts the value into a [`HandlerResult`].
    fn into_result(self) -> HandlerResult;
}

impl HandlerOutput for () {
    fn into_result(self) -> HandlerResult {
        Ok(())
    }
}

impl<E> HandlerOutput for Result<(), E>
where
    E: Into<BoxError> + Send + 'static,
{
    fn into_result(self) -> HandlerResult {
        self.map_err(Into::into)
    }
}

pub(crate) fn erase<Fut, O>(future: Fut) -> BoxFuture<'static, HandlerResult>
where
    Fut: Future<Output = O> + Send + 'static,
    O: HandlerOutput,
{
    future.map(O::into_result).boxed()
}

// ============================================================================
// Widget - a single declared widget
// ============================================================================

/// Kind of a widget, as recorded in the client's widget ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WidgetKind {
    Command,
    ContextMenu,
    Event,
    Schedule,
    Custom,
}

impl fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Command => "command",
            Self::ContextMenu => "context menu",
            Self::Event => "event",
            Self::Schedule => "schedule",
            Self::Custom => "custom widget",
        })
    }
}

/// Record of a widget bound to its owning plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetHandle {
    /// The plugin instance the widget is bound to.
    pub owner: PluginId,
    /// Widget kind.
    pub kind: WidgetKind,
    /// Command name, event name, schedule label or widget plugin name.
    pub name: String,
}

/// A widget declared by plugin `P`.
pub enum Widget<P> {
    Command(CommandWidget<P>),
    ContextMenu(ContextMenuWidget<P>),
    Event(EventWidget<P>),
    Schedule(ScheduleWidget<P>),
    Custom(CustomWidget<P>),
}

impl<P: Plugin> Widget<P> {
    /// Binds the widget to `this`.
    pub(crate) fn bind(self, this: &Arc<P>) -> BoundWidget {
        let owner = PluginId::of::<P>();
        match self {
            Self::Command(widget) => BoundWidget::Command(widget.bind(Arc::clone(this), owner)),
            Self::ContextMenu(widget) => {
                BoundWidget::ContextMenu(widget.bind(Arc::clone(this), owner))
            }
            Self::Event(widget) => BoundWidget::Event(widget.bind(Arc::clone(this), owner)),
            Self::Schedule(widget) => BoundWidget::Schedule(widget.bind(Arc::clone(this), owner)),
            Self::Custom(widget) => BoundWidget::Custom(widget.bind(Arc::clone(this), owner)),
        }
    }
}

impl<P> fmt::Debug for Widget<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command(widget) => f.debug_tuple("Command").field(&widget.name()).finish(),
            Self::ContextMenu(widget) => {
                f.debug_tuple("ContextMenu").field(&widget.display_name()).finish()
            }
            Self::Event(widget) => f.debug_tuple("Event").field(&widget.event()).finish(),
            Self::Schedule(widget) => f.debug_tuple("Schedule").field(&widget.cron()).finish(),
            Self::Custom(widget) => f.debug_tuple("Custom").field(&widget.host.name()).finish(),
        }
    }
}

// ============================================================================
// Custom widgets
// ============================================================================

type BindCustom<P> = Box<dyn FnOnce(Arc<P>, PluginId) -> ApplyCustom + Send>;
type ApplyCustom = Box<dyn FnOnce(&Client) -> ClientResult<()> + Send>;

/// A widget handled by the widget plugin `host`.
pub struct CustomWidget<P> {
    host: PluginId,
    ensure: fn(&mut Client) -> ClientResult<()>,
    bind: BindCustom<P>,
}

impl<P: Plugin> CustomWidget<P> {
    fn new<W, F>(bind: F) -> Self
    where
        W: WidgetPlugin,
        F: FnOnce(Arc<P>) -> W::Widget + Send + 'static,
    {
        Self {
            host: PluginId::of::<W>(),
            ensure: Client::ensure_plugin::<W>,
            bind: Box::new(move |this: Arc<P>, owner: PluginId| -> ApplyCustom {
                let widget = bind(this);
                Box::new(move |client: &Client| {
                    let host = client.get_plugin::<W>()?;
                    host.register(widget, owner)
                        .map_err(|source| ClientError::Widget {
                            plugin: owner.name(),
                            source,
                        })
                })
            }),
        }
    }

    fn bind(self, this: Arc<P>, owner: PluginId) -> BoundCustom {
        BoundCustom {
            host: self.host,
            ensure: self.ensure,
            apply: (self.bind)(this, owner),
        }
    }
}

pub(crate) struct BoundCustom {
    pub(crate) host: PluginId,
    pub(crate) ensure: fn(&mut Client) -> ClientResult<()>,
    pub(crate) apply: ApplyCustom,
}

// ============================================================================
// Bound widgets
// ============================================================================

/// A widget bound to its plugin instance, ready to be applied.
pub(crate) enum BoundWidget {
    Command(AppCommand),
    ContextMenu(AppCommand),
    Event(BoundEvent),
    Schedule(ScheduledTask),
    Custom(BoundCustom),
}

impl BoundWidget {
    pub(crate) fn handle(&self, owner: PluginId) -> WidgetHandle {
        let (kind, name) = match self {
            Self::Command(command) => (WidgetKind::Command, command.name.clone()),
            Self::ContextMenu(menu) => (WidgetKind::ContextMenu, menu.name.clone()),
            Self::Event(event) => (WidgetKind::Event, event.name.to_string()),
            Self::Schedule(task) => (WidgetKind::Schedule, task.label().to_string()),
            Self::Custom(custom) => (WidgetKind::Custom, custom.host.name().to_string()),
        };
        WidgetHandle { owner, kind, name }
    }
}

// ============================================================================
// Widgets - the per-plugin widget table
// ============================================================================

/// The widget table of plugin `P`, filled in by [`Plugin::widgets`].
pub struct Widgets<P> {
    items: Vec<Widget<P>>,
}

impl<P: Plugin> Widgets<P> {
    pub(crate) fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Adds a slash command.
    pub fn command(&mut self, command: CommandWidget<P>) -> WidgetResult<&mut Self> {
        command.validate()?;
        self.items.push(Widget::Command(command));
        Ok(self)
    }

    /// Adds a user or message context menu.
    pub fn context_menu(&mut self, menu: ContextMenuWidget<P>) -> WidgetResult<&mut Self> {
        menu.validate()?;
        self.items.push(Widget::ContextMenu(menu));
        Ok(self)
    }

    /// Adds an event handler.
    pub fn event(&mut self, event: EventWidget<P>) -> WidgetResult<&mut Self> {
        self.items.push(Widget::Event(event));
        Ok(self)
    }

    /// Adds a schedule.
    pub fn schedule(&mut self, schedule: ScheduleWidget<P>) -> WidgetResult<&mut Self> {
        self.items.push(Widget::Schedule(schedule));
        Ok(self)
    }

    /// Adds a custom widget handled by the widget plugin `W`.
    ///
    /// `bind` receives the plugin instance when the widget is bound and
    /// returns the value handed to [`WidgetPlugin::register`].
    pub fn widget<W, F>(&mut self, bind: F) -> WidgetResult<&mut Self>
    where
        W: WidgetPlugin,
        F: FnOnce(Arc<P>) -> W::Widget + Send + 'static,
    {
        self.items.push(Widget::Custom(CustomWidget::new::<W, F>(bind)));
        Ok(self)
    }

    /// Number of declared widgets.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if no widget was declared.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterates over the declared widgets.
    pub fn iter(&self) -> impl Iterator<Item = &Widget<P>> {
        self.items.iter()
    }

    pub(crate) fn into_inner(self) -> Vec<Widget<P>> {
        self.items
    }
}

impl<P> fmt::Debug for Widgets<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.items).finish()
    }
}
