//! The client: plugin registration and startup.
//!
//! [`Client`] is the composing root of an application. It owns:
//!
//! - the dependency registry plugins are constructed from,
//! - the discovery used to load plugins by module path,
//! - the per-type registration state of every plugin,
//! - the widget ledger, one [`WidgetHandle`] per bound widget,
//! - a [`ClientHandle`] to the state shared with the running gateway.
//!
//! Registration is synchronous and happens on `&mut Client` before
//! [`start`](Client::start). Registering a plugin either applies all of its
//! widgets or none of them: every widget is validated and checked against the
//! current command tree and event table before the first one is applied.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut client = Client::builder(module_path!(), gateway)
//!     .guild(GuildId(1234))
//!     .auto_sync(true)
//!     .build()?;
//!
//! client.add_dependency(Database::connect(url).await?)?;
//! client.load_default_plugins()?;
//! client.register_plugin::<Greeter>()?;
//!
//! client.start(&token).await?;
//! ```

use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use amethyst_core::library::ON_SETUP_HOOK;
use amethyst_core::{
    BoxFuture, BoxedGateway, CommandKind, Dependencies, Event, GuildId, HandlerResult, Inject,
};
use futures::future;
use tracing::{debug, info};

use crate::discovery::{DEFAULT_MODULES, Discovery, PLUGINS, PluginDescriptor};
use crate::error::{ClientError, ClientResult, WidgetError};
use crate::events::BoundEvent;
use crate::handle::{ClientHandle, Settings};
use crate::plugin::{Plugin, PluginId, PluginState};
use crate::widget::{BoundWidget, HandlerOutput, WidgetHandle, Widgets, erase};

type SetupHook = Box<dyn FnOnce(ClientHandle) -> BoxFuture<'static, HandlerResult> + Send>;

// ============================================================================
// ClientBuilder
// ============================================================================

/// Builder for [`Client`].
pub struct ClientBuilder {
    caller: String,
    gateway: BoxedGateway,
    settings: Settings,
    catalog: &'static [PluginDescriptor],
}

impl ClientBuilder {
    /// Scopes the client to a single guild.
    pub fn guild(mut self, guild: impl Into<GuildId>) -> Self {
        self.settings.guild = Some(guild.into());
        self
    }

    /// Synchronises the command tree on start when it changed.
    pub fn auto_sync(mut self, auto_sync: bool) -> Self {
        self.settings.auto_sync = auto_sync;
        self
    }

    /// Discovers plugins from `catalog` instead of every plugin registered
    /// with [`register_plugin!`](crate::register_plugin).
    pub fn catalog(mut self, catalog: &'static [PluginDescriptor]) -> Self {
        self.catalog = catalog;
        self
    }

    /// Builds the client. Fails if the caller's home module cannot be
    /// determined.
    pub fn build(self) -> ClientResult<Client> {
        let discovery = Discovery::with_catalog(&self.caller, self.catalog)?;
        let handle = ClientHandle::new(self.gateway, self.settings);

        let mut dependencies = Dependencies::new();
        dependencies
            .add(handle.clone())
            .map_err(ClientError::DuplicateDependency)?;

        debug!(home = discovery.home(), "Client created");
        Ok(Client {
            handle,
            dependencies,
            discovery,
            states: HashMap::new(),
            ledger: Vec::new(),
            setup_hooks: Vec::new(),
        })
    }
}

// ============================================================================
// Client
// ============================================================================

/// The composing root: registers plugins, then drives them on a gateway.
pub struct Client {
    handle: ClientHandle,
    dependencies: Dependencies,
    discovery: Discovery,
    states: HashMap<TypeId, PluginState>,
    ledger: Vec<WidgetHandle>,
    setup_hooks: Vec<SetupHook>,
}

impl Client {
    /// Starts building a client for the composing root at `caller`, which is
    /// normally `module_path!()`.
    pub fn builder(caller: &str, gateway: BoxedGateway) -> ClientBuilder {
        ClientBuilder {
            caller: caller.to_string(),
            gateway,
            settings: Settings::default(),
            catalog: &PLUGINS,
        }
    }

    /// A client with default settings.
    pub fn new(caller: &str, gateway: BoxedGateway) -> ClientResult<Self> {
        Self::builder(caller, gateway).build()
    }

    // ------------------------------------------------------------------------
    // Plugins
    // ------------------------------------------------------------------------

    /// Registers plugin `P`.
    ///
    /// Fails with [`ClientError::DuplicatePlugin`] if `P` is already
    /// registered, leaving the client unchanged. On any failure no widget of
    /// `P` is registered.
    pub fn register_plugin<P: Plugin>(&mut self) -> ClientResult<()> {
        let id = PluginId::of::<P>();
        match self.states.get(&id.type_id()) {
            Some(PluginState::Registered) => return Err(ClientError::DuplicatePlugin(id.name())),
            Some(PluginState::Registering) => {
                return Err(ClientError::CircularWidgetPlugin(id.name()));
            }
            None => {}
        }

        self.states.insert(id.type_id(), PluginState::Registering);
        match self.install::<P>(id) {
            Ok(widgets) => {
                self.states.insert(id.type_id(), PluginState::Registered);
                info!(plugin = %id, widgets, "Plugin registered");
                Ok(())
            }
            Err(err) => {
                self.states.remove(&id.type_id());
                Err(err)
            }
        }
    }

    fn install<P: Plugin>(&mut self, id: PluginId) -> ClientResult<usize> {
        let deps = P::Deps::inject(&self.dependencies).map_err(|source| {
            ClientError::PluginDependency {
                plugin: id.name(),
                source,
            }
        })?;
        let widget_error = |source| ClientError::Widget {
            plugin: id.name(),
            source,
        };

        let mut widgets = Widgets::<P>::new();
        P::widgets(&mut widgets).map_err(widget_error)?;

        let instance = Arc::new(P::construct(deps));
        let bound: Vec<BoundWidget> = widgets
            .into_inner()
            .into_iter()
            .map(|widget| widget.bind(&instance))
            .collect();

        for widget in &bound {
            if let BoundWidget::Custom(custom) = widget
                && self.states.get(&custom.host.type_id()) != Some(&PluginState::Registered)
            {
                debug!(plugin = %id, host = %custom.host, "Registering widget plugin on demand");
                (custom.ensure)(self)?;
            }
        }

        // Widget plugins registered above may already hold names of ours.
        self.precheck(&bound).map_err(|err| match err {
            Precheck::Widget(source) => widget_error(source),
            Precheck::Client(err) => err,
        })?;

        let handles: Vec<WidgetHandle> = bound.iter().map(|widget| widget.handle(id)).collect();
        let (custom, builtin): (Vec<_>, Vec<_>) = bound
            .into_iter()
            .partition(|widget| matches!(widget, BoundWidget::Custom(_)));

        // Custom widgets can be refused by their host, so they go first.
        for widget in custom {
            if let BoundWidget::Custom(custom) = widget {
                (custom.apply)(self)?;
            }
        }

        let mut applied = Vec::new();
        let mut tasks = Vec::new();
        for widget in builtin {
            let result = match widget {
                BoundWidget::Command(command) | BoundWidget::ContextMenu(command) => {
                    let entry = Applied::Command(command.name.clone(), command.kind);
                    self.handle.0.tree.write().insert(command).map(|()| entry)
                }
                BoundWidget::Event(event) => {
                    let name = event.name;
                    self.insert_event(event)
                        .map(|()| Applied::Event(name))
                        .map_err(widget_error)
                }
                BoundWidget::Schedule(task) => {
                    tasks.push(task);
                    continue;
                }
                BoundWidget::Custom(_) => continue,
            };
            match result {
                Ok(entry) => applied.push(entry),
                Err(err) => {
                    self.rollback(applied);
                    return Err(err);
                }
            }
        }

        // Nothing below can fail.
        if !tasks.is_empty() {
            for task in tasks {
                self.handle.0.scheduler.add(task);
            }
            self.handle.start_scheduler();
        }

        let count = handles.len();
        self.ledger.extend(handles);
        self.handle
            .0
            .plugins
            .write()
            .insert(id.type_id(), instance as Arc<dyn Any + Send + Sync>);
        Ok(count)
    }

    /// Checks every bound widget against the current tree and event table,
    /// and against each other.
    fn precheck(&self, bound: &[BoundWidget]) -> Result<(), Precheck> {
        let tree = self.handle.0.tree.read();
        let events = self.handle.0.events.read();
        let mut commands: HashSet<(&str, CommandKind)> = HashSet::new();
        let mut payloads: HashMap<&str, &BoundEvent> = HashMap::new();

        for widget in bound {
            match widget {
                BoundWidget::Command(command) | BoundWidget::ContextMenu(command) => {
                    if tree.contains(&command.name, command.kind)
                        || !commands.insert((command.name.as_str(), command.kind))
                    {
                        return Err(Precheck::Client(ClientError::CommandExists {
                            kind: command.kind,
                            name: command.name.clone(),
                        }));
                    }
                }
                BoundWidget::Event(event) => {
                    events.check(event).map_err(Precheck::Widget)?;
                    if let Some(first) = payloads.insert(event.name, event) {
                        if first.payload != event.payload {
                            return Err(Precheck::Widget(WidgetError::PayloadMismatch {
                                event: event.name,
                                registered: first.payload_name,
                                requested: event.payload_name,
                            }));
                        }
                        if first.asynchronous != event.asynchronous {
                            return Err(Precheck::Widget(WidgetError::EventKindMismatch {
                                event: event.name,
                                expected: if first.asynchronous {
                                    "asynchronous"
                                } else {
                                    "blocking"
                                },
                            }));
                        }
                    }
                }
                BoundWidget::Schedule(_) | BoundWidget::Custom(_) => {}
            }
        }
        Ok(())
    }

    /// Undoes the tree and event-table writes of a failed registration.
    fn rollback(&self, applied: Vec<Applied>) {
        for entry in applied.into_iter().rev() {
            match entry {
                Applied::Command(name, kind) => {
                    self.handle.0.tree.write().remove(&name, kind);
                }
                Applied::Event(name) => {
                    if self.handle.0.events.write().pop(name) {
                        self.handle.unsubscribe(name);
                    }
                }
            }
        }
    }

    fn insert_event(&self, event: BoundEvent) -> Result<(), WidgetError> {
        let name = event.name;
        if self.handle.0.events.write().insert(event)? {
            self.handle.subscribe(name);
        }
        Ok(())
    }

    /// Registers `W` unless it is already registered.
    ///
    /// Fails with [`ClientError::CircularWidgetPlugin`] if `W` is in the
    /// middle of its own registration.
    pub fn ensure_plugin<W: Plugin>(&mut self) -> ClientResult<()> {
        match self.states.get(&TypeId::of::<W>()) {
            Some(PluginState::Registered) => Ok(()),
            _ => self.register_plugin::<W>(),
        }
    }

    /// Whether `P` is registered.
    pub fn has_plugin<P: Plugin>(&self) -> bool {
        self.states.get(&TypeId::of::<P>()) == Some(&PluginState::Registered)
    }

    /// Returns the registered instance of `P`.
    pub fn get_plugin<P: Plugin>(&self) -> ClientResult<Arc<P>> {
        self.handle.get_plugin::<P>()
    }

    /// Registration state of `P`, if registration has started.
    pub fn plugin_state<P: Plugin>(&self) -> Option<PluginState> {
        self.states.get(&TypeId::of::<P>()).copied()
    }

    /// Number of registered plugins.
    pub fn plugin_count(&self) -> usize {
        self.states
            .values()
            .filter(|state| **state == PluginState::Registered)
            .count()
    }

    /// Loads the plugins beneath each module specifier.
    ///
    /// See [`Discovery`] for how specifiers are resolved. Returns the number
    /// of plugins registered.
    pub fn load_plugins<S: AsRef<str>>(&mut self, specs: &[S]) -> ClientResult<usize> {
        let discovery = self.discovery.clone();
        discovery.load(self, specs)
    }

    /// Loads the plugins beneath `.command`, `.commands`, `.plugins` and
    /// `.plugin` relative to the home module.
    pub fn load_default_plugins(&mut self) -> ClientResult<usize> {
        self.load_plugins(&DEFAULT_MODULES)
    }

    /// The discovery used by [`load_plugins`](Self::load_plugins).
    pub fn discovery(&self) -> &Discovery {
        &self.discovery
    }

    // ------------------------------------------------------------------------
    // Dependencies
    // ------------------------------------------------------------------------

    /// Makes `value` available to plugin constructors.
    pub fn add_dependency<T: Send + Sync + 'static>(&mut self, value: T) -> ClientResult<()> {
        self.dependencies
            .add(value)
            .map_err(ClientError::DuplicateDependency)
    }

    /// Makes an already shared value available to plugin constructors.
    pub fn add_shared_dependency<T: Send + Sync + 'static>(
        &mut self,
        value: Arc<T>,
    ) -> ClientResult<()> {
        self.dependencies
            .add_shared(value)
            .map_err(ClientError::DuplicateDependency)
    }

    /// The dependency registry.
    pub fn dependencies(&self) -> &Dependencies {
        &self.dependencies
    }

    // ------------------------------------------------------------------------
    // Anonymous handlers and events
    // ------------------------------------------------------------------------

    /// Adds an asynchronous handler for `event` that belongs to no plugin.
    pub fn event<A, F, Fut, O>(&mut self, event: &Event<A>, callback: F) -> ClientResult<()>
    where
        A: Send + Sync + 'static,
        F: Fn(Arc<A>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = O> + Send + 'static,
        O: HandlerOutput,
    {
        let bound = BoundEvent::concurrent(event, callback).map_err(anonymous)?;
        self.insert_event(bound).map_err(anonymous)
    }

    /// Adds a blocking handler for `event` that belongs to no plugin.
    pub fn blocking_event<A, F, R>(&mut self, event: &Event<A>, callback: F) -> ClientResult<()>
    where
        A: Send + Sync + 'static,
        F: Fn(&A) -> R + Send + Sync + 'static,
        R: HandlerOutput,
    {
        let bound = BoundEvent::blocking(event, callback).map_err(anonymous)?;
        self.insert_event(bound).map_err(anonymous)
    }

    /// Runs every handler of `event` and waits for them.
    pub async fn invoke<A: Send + Sync + 'static>(&self, event: &Event<A>, payload: A) {
        self.handle.invoke(event, payload).await;
    }

    // ------------------------------------------------------------------------
    // Setup
    // ------------------------------------------------------------------------

    /// Adds a hook run before the gateway starts. Hooks run concurrently and
    /// any failure aborts [`start`](Self::start).
    pub fn on_setup<F, Fut, O>(&mut self, hook: F)
    where
        F: FnOnce(ClientHandle) -> Fut + Send + 'static,
        Fut: Future<Output = O> + Send + 'static,
        O: HandlerOutput,
    {
        self.setup_hooks
            .push(Box::new(move |handle| erase(hook(handle))));
    }

    /// Spawns `task` once setup has completed.
    pub fn create_task<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handle.create_task(task);
    }

    /// Scopes the client to `guild`, or lifts the scope with `None`.
    pub fn set_guild(&mut self, guild: Option<GuildId>) {
        self.handle.0.settings.write().guild = guild;
    }

    /// Enables or disables tree synchronisation on start.
    pub fn set_auto_sync(&mut self, auto_sync: bool) {
        self.handle.0.settings.write().auto_sync = auto_sync;
    }

    /// The configured guild.
    pub fn guild(&self) -> Option<GuildId> {
        self.handle.guild()
    }

    /// Whether the tree is synchronised on start.
    pub fn auto_sync(&self) -> bool {
        self.handle.auto_sync()
    }

    /// Every widget bound so far, in registration order.
    pub fn widgets(&self) -> &[WidgetHandle] {
        &self.ledger
    }

    /// Handle to the runtime state, valid after the client is started.
    pub fn handle(&self) -> ClientHandle {
        self.handle.clone()
    }

    /// Runs the setup hooks, then the gateway until it closes.
    ///
    /// 1. Every setup hook runs concurrently; the first failure aborts.
    /// 2. `on_setup_hook` is invoked.
    /// 3. With auto-sync, the command tree is refreshed for the configured
    ///    guild, or globally.
    /// 4. Queued tasks are spawned.
    /// 5. The gateway is started with the client handle.
    pub async fn start(self, token: &str) -> ClientResult<()> {
        let Client {
            handle,
            setup_hooks,
            ledger,
            ..
        } = self;
        info!(
            plugins = handle.0.plugins.read().len(),
            widgets = ledger.len(),
            "Starting client"
        );

        let hooks = setup_hooks.into_iter().map(|hook| hook(handle.clone()));
        future::try_join_all(hooks)
            .await
            .map_err(ClientError::Setup)?;
        handle.invoke(&ON_SETUP_HOOK, ()).await;

        if handle.auto_sync() {
            handle.refresh_tree(handle.guild()).await?;
        }
        handle.flush_pending();

        let gateway = Arc::clone(handle.gateway());
        gateway.start(token, Arc::new(handle)).await?;
        Ok(())
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("home", &self.discovery.home())
            .field("plugins", &self.plugin_count())
            .field("widgets", &self.ledger.len())
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

/// A write made while applying widgets.
enum Applied {
    Command(String, CommandKind),
    Event(&'static str),
}

enum Precheck {
    Widget(WidgetError),
    Client(ClientError),
}

fn anonymous(source: WidgetError) -> ClientError {
    ClientError::Widget {
        plugin: "<anonymous>",
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use amethyst_core::library::{ON_MESSAGE, ON_READY};
    use amethyst_core::{
        BoxError, Gateway, GatewayHandler, GatewayResult, Interaction, InteractionResponse, Message,
        User,
    };
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::{Value, json};
    use tokio::sync::mpsc;
    use tokio_test::{assert_err, assert_ok};

    use crate::error::WidgetResult;
    use crate::widget::{CommandWidget, EventWidget, ScheduleWidget};
    use crate::{DEFAULT_MODULES, WidgetPlugin};

    // ------------------------------------------------------------------------
    // Fixtures
    // ------------------------------------------------------------------------

    #[derive(Default)]
    struct MockGateway {
        remote: Mutex<Vec<Value>>,
        fetches: AtomicUsize,
        syncs: AtomicUsize,
        started: AtomicBool,
        closed: AtomicBool,
    }

    #[async_trait]
    impl Gateway for MockGateway {
        async fn start(&self, _token: &str, handler: Arc<dyn GatewayHandler>) -> GatewayResult<()> {
            self.started.store(true, Ordering::SeqCst);
            handler.on_ready(bot_user()).await;
            Ok(())
        }

        async fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }

        fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }

        async fn fetch_commands(&self, _guild: Option<GuildId>) -> GatewayResult<Vec<Value>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.remote.lock().clone())
        }

        async fn sync_commands(
            &self,
            _guild: Option<GuildId>,
            commands: Vec<Value>,
        ) -> GatewayResult<()> {
            self.syncs.fetch_add(1, Ordering::SeqCst);
            *self.remote.lock() = commands;
            Ok(())
        }

        async fn respond(
            &self,
            _interaction: &Interaction,
            _response: InteractionResponse,
        ) -> GatewayResult<()> {
            Ok(())
        }
    }

    fn bot_user() -> User {
        serde_json::from_value(json!({ "id": "1", "username": "amethyst", "bot": true })).unwrap()
    }

    fn client() -> (Client, Arc<MockGateway>) {
        let gateway = Arc::new(MockGateway::default());
        let client = Client::new("bot::main", gateway.clone()).unwrap();
        (client, gateway)
    }

    fn interaction(name: &str, guild: u64) -> Interaction {
        serde_json::from_value(json!({
            "id": "900",
            "token": "tok",
            "type": 1,
            "name": name,
            "guild_id": guild.to_string(),
            "user": { "id": "7", "username": "ferris" },
        }))
        .unwrap()
    }

    struct Greeter {
        calls: AtomicUsize,
    }

    impl Plugin for Greeter {
        type Deps = ();

        fn construct(_: ()) -> Self {
            Greeter {
                calls: AtomicUsize::new(0),
            }
        }

        fn widgets(widgets: &mut Widgets<Self>) -> WidgetResult<()> {
            widgets.command(
                CommandWidget::new("hello", |this: Arc<Self>, _: Interaction| async move {
                    this.calls.fetch_add(1, Ordering::SeqCst);
                })
                .description("Says hello."),
            )?;
            Ok(())
        }
    }

    struct Database;

    struct Archive {
        _db: Arc<Database>,
    }

    impl Plugin for Archive {
        type Deps = (Arc<Database>,);

        fn construct((db,): Self::Deps) -> Self {
            Archive { _db: db }
        }

        fn widgets(widgets: &mut Widgets<Self>) -> WidgetResult<()> {
            widgets
                .command(CommandWidget::new("archive", |_: Arc<Self>, _: Interaction| async {}))?
                .event(EventWidget::new(&ON_MESSAGE, |_: Arc<Self>, _: Arc<Message>| async {})?)?;
            Ok(())
        }
    }

    /// Declares a command that clashes with [`Greeter`].
    struct Impostor;

    impl Plugin for Impostor {
        type Deps = ();

        fn construct(_: ()) -> Self {
            Impostor
        }

        fn widgets(widgets: &mut Widgets<Self>) -> WidgetResult<()> {
            widgets
                .event(EventWidget::new(&ON_READY, |_: Arc<Self>, _: Arc<User>| async {})?)?
                .command(CommandWidget::new("hello", |_: Arc<Self>, _: Interaction| async {}))?;
            Ok(())
        }
    }

    #[derive(Default)]
    struct TagRegistry {
        tags: Mutex<Vec<(String, PluginId)>>,
    }

    impl Plugin for TagRegistry {
        type Deps = ();

        fn construct(_: ()) -> Self {
            TagRegistry::default()
        }
    }

    impl WidgetPlugin for TagRegistry {
        type Widget = String;

        fn register(&self, widget: String, owner: PluginId) -> WidgetResult<()> {
            self.tags.lock().push((widget, owner));
            Ok(())
        }
    }

    struct Tagged;

    impl Plugin for Tagged {
        type Deps = ();

        fn construct(_: ()) -> Self {
            Tagged
        }

        fn widgets(widgets: &mut Widgets<Self>) -> WidgetResult<()> {
            widgets.widget::<TagRegistry, _>(|_| "pinned".to_string())?;
            Ok(())
        }
    }

    /// A widget plugin that owns a `hello` command itself.
    #[derive(Default)]
    struct Greetings {
        greetings: Mutex<Vec<&'static str>>,
    }

    impl Plugin for Greetings {
        type Deps = ();

        fn construct(_: ()) -> Self {
            Greetings::default()
        }

        fn widgets(widgets: &mut Widgets<Self>) -> WidgetResult<()> {
            widgets.command(CommandWidget::new("hello", |_: Arc<Self>, _: Interaction| async {}))?;
            Ok(())
        }
    }

    impl WidgetPlugin for Greetings {
        type Widget = &'static str;

        fn register(&self, widget: &'static str, _: PluginId) -> WidgetResult<()> {
            self.greetings.lock().push(widget);
            Ok(())
        }
    }

    /// Needs [`Greetings`] and clashes with its command.
    struct Welcomer;

    impl Plugin for Welcomer {
        type Deps = ();

        fn construct(_: ()) -> Self {
            Welcomer
        }

        fn widgets(widgets: &mut Widgets<Self>) -> WidgetResult<()> {
            widgets
                .event(EventWidget::new(&ON_MESSAGE, |_: Arc<Self>, _: Arc<Message>| async {})?)?
                .widget::<Greetings, _>(|_| "welcome")?
                .command(CommandWidget::new("hello", |_: Arc<Self>, _: Interaction| async {}))?;
            Ok(())
        }
    }

    /// A widget plugin that declares a widget for itself.
    struct Ouroboros;

    impl Plugin for Ouroboros {
        type Deps = ();

        fn construct(_: ()) -> Self {
            Ouroboros
        }

        fn widgets(widgets: &mut Widgets<Self>) -> WidgetResult<()> {
            widgets.widget::<Ouroboros, _>(|_| ())?;
            Ok(())
        }
    }

    impl WidgetPlugin for Ouroboros {
        type Widget = ();

        fn register(&self, _: (), _: PluginId) -> WidgetResult<()> {
            Ok(())
        }
    }

    // ------------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------------

    #[test]
    fn test_duplicate_registration_leaves_registry_unchanged() {
        let (mut client, _) = client();
        assert_ok!(client.register_plugin::<Greeter>());
        let widgets = client.widgets().to_vec();
        let instance = client.get_plugin::<Greeter>().unwrap();

        let err = assert_err!(client.register_plugin::<Greeter>());
        assert!(matches!(err, ClientError::DuplicatePlugin("Greeter")));

        assert_eq!(client.widgets(), widgets.as_slice());
        assert_eq!(client.plugin_count(), 1);
        assert_eq!(client.handle().definitions().len(), 1);
        assert!(Arc::ptr_eq(&instance, &client.get_plugin::<Greeter>().unwrap()));
    }

    #[test]
    fn test_missing_dependency_fails_before_widgets() {
        let (mut client, _) = client();
        let err = assert_err!(client.register_plugin::<Archive>());
        assert!(matches!(
            err,
            ClientError::PluginDependency { plugin: "Archive", .. }
        ));
        assert!(client.widgets().is_empty());
        assert!(client.handle().definitions().is_empty());
        assert_eq!(client.handle().handler_count(ON_MESSAGE.name()), 0);
        assert_eq!(client.plugin_state::<Archive>(), None);

        assert_ok!(client.add_dependency(Database));
        assert_ok!(client.register_plugin::<Archive>());
        assert!(client.handle().is_subscribed(ON_MESSAGE.name()));
    }

    #[test]
    fn test_duplicate_dependency() {
        let (mut client, _) = client();
        assert_ok!(client.add_dependency(Database));
        assert!(matches!(
            client.add_dependency(Database),
            Err(ClientError::DuplicateDependency(_))
        ));
    }

    #[test]
    fn test_command_collision_registers_nothing() {
        let (mut client, _) = client();
        assert_ok!(client.register_plugin::<Greeter>());
        let err = assert_err!(client.register_plugin::<Impostor>());
        assert!(matches!(err, ClientError::CommandExists { .. }));

        assert!(!client.has_plugin::<Impostor>());
        assert_eq!(client.handle().handler_count(ON_READY.name()), 0);
        assert_eq!(client.widgets().len(), 1);
    }

    #[tokio::test]
    async fn test_widgets_reference_their_own_instance() {
        let (mut client, _) = client();
        assert_ok!(client.register_plugin::<Greeter>());

        let handle = client.handle();
        let command = handle.command("hello", CommandKind::ChatInput).unwrap();
        assert_eq!(command.owner, Some(PluginId::of::<Greeter>()));
        assert_eq!(command.description, "Says hello.");

        assert_ok!(command.call(interaction("hello", 42)).await);
        assert_ok!(command.call(interaction("hello", 42)).await);

        let greeter = client.get_plugin::<Greeter>().unwrap();
        assert_eq!(greeter.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_widget_plugin_is_registered_on_demand() {
        let (mut client, _) = client();
        assert_ok!(client.register_plugin::<Tagged>());
        assert!(client.has_plugin::<TagRegistry>());

        let registry = client.get_plugin::<TagRegistry>().unwrap();
        assert_eq!(
            *registry.tags.lock(),
            vec![("pinned".to_string(), PluginId::of::<Tagged>())]
        );

        let kinds: Vec<_> = client.widgets().iter().map(|widget| widget.kind).collect();
        assert_eq!(kinds, vec![crate::WidgetKind::Custom]);
    }

    #[test]
    fn test_clash_with_widget_plugin_registers_nothing() {
        let (mut client, _) = client();
        let err = assert_err!(client.register_plugin::<Welcomer>());
        assert!(matches!(err, ClientError::CommandExists { .. }));

        assert!(!client.has_plugin::<Welcomer>());
        assert_eq!(client.plugin_state::<Welcomer>(), None);
        assert_eq!(client.handle().handler_count(ON_MESSAGE.name()), 0);
        assert!(!client.handle().is_subscribed(ON_MESSAGE.name()));

        // The widget plugin itself stays registered, without the rejected widget.
        assert!(client.has_plugin::<Greetings>());
        let greetings = client.get_plugin::<Greetings>().unwrap();
        assert!(greetings.greetings.lock().is_empty());
        let hello = client.handle().command("hello", CommandKind::ChatInput).unwrap();
        assert_eq!(hello.owner, Some(PluginId::of::<Greetings>()));
    }

    #[test]
    fn test_rollback_removes_applied_writes() {
        let (mut client, _) = client();
        assert_ok!(client.add_dependency(Database));
        assert_ok!(client.register_plugin::<Archive>());
        assert!(client.handle().is_subscribed(ON_MESSAGE.name()));

        client.rollback(vec![
            Applied::Command("archive".to_string(), CommandKind::ChatInput),
            Applied::Event(ON_MESSAGE.name()),
        ]);
        assert!(client.handle().command("archive", CommandKind::ChatInput).is_none());
        assert_eq!(client.handle().handler_count(ON_MESSAGE.name()), 0);
        assert!(!client.handle().is_subscribed(ON_MESSAGE.name()));
    }

    #[test]
    fn test_circular_widget_plugin() {
        let (mut client, _) = client();
        let err = assert_err!(client.register_plugin::<Ouroboros>());
        assert!(matches!(err, ClientError::CircularWidgetPlugin("Ouroboros")));
        assert_eq!(client.plugin_state::<Ouroboros>(), None);
    }

    #[test]
    fn test_payload_mismatch_between_plugins() {
        const ON_SCORE: Event<u32> = Event::new("on_score");
        const ON_SCORE_TEXT: Event<String> = Event::new("on_score");

        let (mut client, _) = client();
        assert_ok!(client.event(&ON_SCORE, |_: Arc<u32>| async {}));
        let err = assert_err!(client.event(&ON_SCORE_TEXT, |_: Arc<String>| async {}));
        assert!(matches!(
            err,
            ClientError::Widget {
                source: WidgetError::PayloadMismatch { event: "on_score", .. },
                ..
            }
        ));
    }

    // ------------------------------------------------------------------------
    // Discovery
    // ------------------------------------------------------------------------

    static CATALOG: [PluginDescriptor; 2] = [
        PluginDescriptor {
            name: "Greeter",
            module_path: "bot::commands::greet",
            register: crate::plugin::register_descriptor::<Greeter>,
        },
        PluginDescriptor {
            name: "Tagged",
            module_path: "bot::plugins",
            register: crate::plugin::register_descriptor::<Tagged>,
        },
    ];

    #[test]
    fn test_load_default_plugins_from_catalog() {
        let gateway = Arc::new(MockGateway::default());
        let mut client = Client::builder("bot::main", gateway)
            .catalog(&CATALOG)
            .build()
            .unwrap();
        assert_eq!(client.discovery().home(), "bot");

        // `.command` and `.plugin` are absent and skipped.
        assert_eq!(client.load_default_plugins().unwrap(), 2);
        assert!(client.has_plugin::<Greeter>());
        assert!(client.has_plugin::<Tagged>());

        // Already registered plugins are skipped.
        assert_eq!(client.load_plugins(&DEFAULT_MODULES).unwrap(), 0);
        assert_eq!(client.load_plugins(&["bot::nowhere"]).unwrap(), 0);
    }

    // ------------------------------------------------------------------------
    // Runtime
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_guild_scope() {
        let (mut client, _) = client();
        let handle = client.handle();
        assert!(handle.guild_allowed(None));
        assert!(handle.guild_allowed(Some(GuildId(5))));

        client.set_guild(Some(GuildId(42)));
        assert!(handle.guild_allowed(Some(GuildId(42))));
        assert!(!handle.guild_allowed(Some(GuildId(5))));
        assert!(!handle.guild_allowed(None));
    }

    #[tokio::test]
    async fn test_dispatch_is_filtered_by_guild() {
        let gateway = Arc::new(MockGateway::default());
        let mut client = Client::builder("bot::main", gateway)
            .guild(42u64)
            .build()
            .unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        assert_ok!(client.event(&ON_MESSAGE, move |message: Arc<Message>| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(message.content.clone());
            }
        }));

        let handle = client.handle();
        assert!(handle.wants("MESSAGE_CREATE"));
        assert!(!handle.wants("TYPING_START"));

        let message = |guild: u64, content: &str| {
            json!({
                "id": "10", "channel_id": "11", "guild_id": guild.to_string(),
                "author": { "id": "7", "username": "ferris" },
                "content": content,
            })
        };
        let direct = json!({
            "id": "12", "channel_id": "13",
            "author": { "id": "7", "username": "ferris" },
            "content": "direct",
        });
        handle.on_dispatch("MESSAGE_CREATE", message(5, "elsewhere")).await;
        handle.on_dispatch("MESSAGE_CREATE", direct).await;
        handle.on_dispatch("MESSAGE_CREATE", message(42, "here")).await;

        let received = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await;
        assert_eq!(received.unwrap().as_deref(), Some("here"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_direct_interaction_is_ignored_in_guild_mode() {
        let gateway = Arc::new(MockGateway::default());
        let mut client = Client::builder("bot::main", gateway)
            .guild(42u64)
            .build()
            .unwrap();
        assert_ok!(client.register_plugin::<Greeter>());
        let handle = client.handle();
        let greeter = handle.get_plugin::<Greeter>().unwrap();

        let direct: Interaction = serde_json::from_value(json!({
            "id": "901",
            "token": "tok",
            "type": 1,
            "name": "hello",
            "user": { "id": "7", "username": "ferris" },
        }))
        .unwrap();
        handle.on_interaction(direct).await;
        handle.on_interaction(interaction("hello", 42)).await;

        let called = tokio::time::timeout(Duration::from_secs(1), async {
            while greeter.calls.load(Ordering::SeqCst) == 0 {
                tokio::task::yield_now().await;
            }
        })
        .await;
        assert_ok!(called);
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(greeter.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_wait_for_matching_dispatch() {
        let (client, _) = client();
        let handle = client.handle();
        assert_eq!(handle.handler_count(ON_MESSAGE.name()), 0);
        assert!(!handle.wants("MESSAGE_CREATE"));

        let waiter = tokio::spawn({
            let handle = handle.clone();
            async move {
                handle
                    .wait_for(
                        &ON_MESSAGE,
                        |message: &Message| message.content == "yes",
                        Some(Duration::from_secs(5)),
                    )
                    .await
            }
        });
        while !handle.wants("MESSAGE_CREATE") {
            tokio::task::yield_now().await;
        }

        let message = |id: &str, content: &str| {
            json!({
                "id": id, "channel_id": "11",
                "author": { "id": "7", "username": "ferris" },
                "content": content,
            })
        };
        handle.on_dispatch("MESSAGE_CREATE", message("1", "no")).await;
        handle.on_dispatch("MESSAGE_CREATE", message("2", "yes")).await;

        let received = tokio::time::timeout(Duration::from_secs(1), waiter).await;
        let message = received.unwrap().unwrap().unwrap();
        assert_eq!(message.content, "yes");
        assert!(!handle.wants("MESSAGE_CREATE"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_gives_up() {
        let (client, _) = client();
        let handle = client.handle();

        let timed_out = handle
            .wait_for(&ON_MESSAGE, |_| true, Some(Duration::from_secs(30)))
            .await;
        assert!(timed_out.is_none());
        assert!(!handle.wants("MESSAGE_CREATE"));

        let waiter = tokio::spawn({
            let handle = handle.clone();
            async move { handle.wait_for(&ON_READY, |_| true, None).await }
        });
        tokio::task::yield_now().await;
        handle.close().await;
        assert!(waiter.await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_start_runs_setup_and_syncs_tree() {
        let gateway = Arc::new(MockGateway::default());
        let mut client = Client::builder("bot::main", gateway.clone())
            .auto_sync(true)
            .build()
            .unwrap();
        assert_ok!(client.register_plugin::<Greeter>());

        let order = Arc::new(Mutex::new(Vec::new()));
        let hook_order = Arc::clone(&order);
        client.on_setup(move |handle: ClientHandle| async move {
            assert!(!handle.is_ready());
            hook_order.lock().push("setup");
        });
        let setup_order = Arc::clone(&order);
        assert_ok!(client.event(&ON_SETUP_HOOK, move |_: Arc<()>| {
            let setup_order = Arc::clone(&setup_order);
            async move { setup_order.lock().push("on_setup_hook") }
        }));
        let (tx, rx) = tokio::sync::oneshot::channel();
        client.create_task(async move {
            let _ = tx.send(());
        });

        let handle = client.handle();
        assert_ok!(client.start("token").await);

        assert!(gateway.started.load(Ordering::SeqCst));
        assert!(handle.is_ready());
        assert_eq!(*order.lock(), vec!["setup", "on_setup_hook"]);
        assert_eq!(gateway.syncs.load(Ordering::SeqCst), 1);
        assert_ok!(tokio::time::timeout(Duration::from_secs(1), rx).await);

        // The remote tree now matches, so a second refresh is skipped.
        assert!(!handle.refresh_tree(None).await.unwrap());
        assert_eq!(gateway.syncs.load(Ordering::SeqCst), 1);

        handle.close().await;
        assert!(handle.is_closed());
    }

    #[tokio::test]
    async fn test_failing_setup_hook_aborts_start() {
        let (mut client, gateway) = client();
        client.on_setup(|_| async { Err::<(), BoxError>("database unreachable".into()) });
        let err = assert_err!(client.start("token").await);
        assert!(matches!(err, ClientError::Setup(_)));
        assert!(!gateway.started.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_schedule_starts_when_ready() {
        struct Ticker {
            ticks: AtomicUsize,
        }

        impl Plugin for Ticker {
            type Deps = ();

            fn construct(_: ()) -> Self {
                Ticker {
                    ticks: AtomicUsize::new(0),
                }
            }

            fn widgets(widgets: &mut Widgets<Self>) -> WidgetResult<()> {
                widgets.schedule(
                    ScheduleWidget::new("0 0 1 1 *", |this: Arc<Self>| async move {
                        this.ticks.fetch_add(1, Ordering::SeqCst);
                    })?
                    .name("new_year"),
                )?;
                Ok(())
            }
        }

        let (mut client, _) = client();
        assert_ok!(client.register_plugin::<Ticker>());
        let handle = client.handle();
        assert!(!handle.0.scheduler.is_running());

        handle.on_ready(bot_user()).await;
        assert!(handle.0.scheduler.is_running());
        handle.close().await;
    }
}
