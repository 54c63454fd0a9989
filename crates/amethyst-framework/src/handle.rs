//! The runtime side of the client.
//!
//! [`ClientHandle`] is the cheap, cloneable view of a client that outlives
//! registration. It is what the gateway drives through [`GatewayHandler`],
//! what schedule and event tasks hold on to, and what plugins receive when
//! they take a `ClientHandle` constructor parameter.

use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use amethyst_core::library::{
    self, ON_APP_COMMAND_COMPLETION, ON_INTERACTION, ON_READY, ON_SOCKET_EVENT_TYPE,
};
use amethyst_core::{
    BoxFuture, BoxedGateway, DependencyResult, Dependencies, Event, GatewayHandler, GuildId,
    Inject, Interaction, Payload, User,
};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, debug_span, error, info, trace, warn};

use crate::error::{ClientError, ClientResult};
use crate::events::EventTable;
use crate::plugin::Plugin;
use crate::scheduler::{Lifecycle, Scheduler};
use crate::tree::{self, AppCommand, CommandTree};

/// Settings that may change until the client starts.
#[derive(Debug, Clone, Default)]
pub(crate) struct Settings {
    pub(crate) guild: Option<GuildId>,
    pub(crate) auto_sync: bool,
}

pub(crate) struct Shared {
    pub(crate) gateway: BoxedGateway,
    pub(crate) settings: RwLock<Settings>,
    pub(crate) events: RwLock<EventTable>,
    pub(crate) tree: RwLock<CommandTree>,
    pub(crate) plugins: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
    pub(crate) scheduler: Arc<Scheduler>,
    subscriptions: RwLock<HashSet<&'static str>>,
    waiters: Mutex<Vec<Waiter>>,
    pending: Mutex<Option<Vec<BoxFuture<'static, ()>>>>,
    ready: AtomicBool,
    shutdown: CancellationToken,
}

/// A pending [`ClientHandle::wait_for`] call.
struct Waiter {
    event: &'static str,
    check: Box<dyn Fn(&Payload) -> bool + Send + Sync>,
    sender: oneshot::Sender<Payload>,
}

/// Shared handle to a client's runtime state.
#[derive(Clone)]
pub struct ClientHandle(pub(crate) Arc<Shared>);

impl ClientHandle {
    pub(crate) fn new(gateway: BoxedGateway, settings: Settings) -> Self {
        Self(Arc::new(Shared {
            gateway,
            settings: RwLock::new(settings),
            events: RwLock::new(EventTable::default()),
            tree: RwLock::new(CommandTree::new()),
            plugins: RwLock::new(HashMap::new()),
            scheduler: Arc::new(Scheduler::new()),
            subscriptions: RwLock::new(HashSet::new()),
            waiters: Mutex::new(Vec::new()),
            pending: Mutex::new(Some(Vec::new())),
            ready: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        }))
    }

    /// The gateway the client runs on.
    pub fn gateway(&self) -> &BoxedGateway {
        &self.0.gateway
    }

    /// Whether the gateway has reported the connection as ready.
    pub fn is_ready(&self) -> bool {
        self.0.ready.load(Ordering::Acquire)
    }

    /// Whether the client is shutting down.
    pub fn is_closed(&self) -> bool {
        self.0.shutdown.is_cancelled() || self.0.gateway.is_closed()
    }

    /// The guild the client is scoped to, if any.
    pub fn guild(&self) -> Option<GuildId> {
        self.0.settings.read().guild
    }

    /// Whether the command tree is synchronised on start.
    pub fn auto_sync(&self) -> bool {
        self.0.settings.read().auto_sync
    }

    /// Whether the client is scoped to `guild`.
    ///
    /// Always true when no guild is configured. Otherwise only the configured
    /// guild is allowed, which excludes direct messages (`None`).
    pub fn guild_allowed(&self, guild: Option<GuildId>) -> bool {
        match self.guild() {
            None => true,
            Some(configured) => guild == Some(configured),
        }
    }

    /// Returns the registered instance of `P`.
    pub fn get_plugin<P: Plugin>(&self) -> ClientResult<Arc<P>> {
        let instance = self.0.plugins.read().get(&TypeId::of::<P>()).cloned();
        instance
            .and_then(|instance| instance.downcast::<P>().ok())
            .ok_or(ClientError::PluginNotRegistered(P::name()))
    }

    /// Whether an instance of `P` is registered.
    pub fn has_plugin<P: Plugin>(&self) -> bool {
        self.0.plugins.read().contains_key(&TypeId::of::<P>())
    }

    /// Looks up a command by name and kind.
    pub fn command(&self, name: &str, kind: amethyst_core::CommandKind) -> Option<AppCommand> {
        self.0.tree.read().get(name, kind).cloned()
    }

    /// Definitions of every command in the tree.
    pub fn definitions(&self) -> Vec<Value> {
        self.0.tree.read().definitions()
    }

    /// Number of handlers registered under `event`.
    pub fn handler_count(&self, event: &str) -> usize {
        self.0.events.read().handler_count(event)
    }

    /// Runs every handler of `event` and waits for them.
    pub async fn invoke<A: Send + Sync + 'static>(&self, event: &Event<A>, payload: A) {
        self.invoke_erased(event.name(), Arc::new(payload)).await;
    }

    /// Waits for the next `event` whose payload satisfies `check`.
    ///
    /// Returns `None` if `timeout` elapses or the client closes first. The
    /// event does not need any registered handlers; gateway events are
    /// decoded for as long as someone is waiting on them.
    ///
    /// ```rust,ignore
    /// let reply = handle
    ///     .wait_for(&ON_MESSAGE, move |message| message.author.id == author, Some(timeout))
    ///     .await;
    /// ```
    pub async fn wait_for<A, F>(
        &self,
        event: &Event<A>,
        check: F,
        timeout: Option<Duration>,
    ) -> Option<Arc<A>>
    where
        A: Send + Sync + 'static,
        F: Fn(&A) -> bool + Send + Sync + 'static,
    {
        let (sender, receiver) = oneshot::channel();
        {
            let mut waiters = self.0.waiters.lock();
            waiters.retain(|waiter| !waiter.sender.is_closed());
            waiters.push(Waiter {
                event: event.name(),
                check: Box::new(move |payload: &Payload| {
                    payload.downcast_ref::<A>().is_some_and(&check)
                }),
                sender,
            });
        }

        let received = async {
            match timeout {
                Some(limit) => tokio::time::timeout(limit, receiver).await.ok()?.ok(),
                None => receiver.await.ok(),
            }
        };
        let payload = tokio::select! {
            payload = received => payload?,
            () = self.0.shutdown.cancelled() => return None,
        };
        payload.downcast::<A>().ok()
    }

    /// Hands `payload` to every waiter on `event` whose check accepts it.
    fn wake_waiters(&self, event: &str, payload: &Payload) {
        let mut waiters = self.0.waiters.lock();
        let mut index = 0;
        while index < waiters.len() {
            let waiter = &waiters[index];
            if waiter.sender.is_closed() {
                waiters.swap_remove(index);
            } else if waiter.event == event && (waiter.check)(payload) {
                let waiter = waiters.swap_remove(index);
                let _ = waiter.sender.send(Arc::clone(payload));
            } else {
                index += 1;
            }
        }
    }

    /// Whether a live [`wait_for`](Self::wait_for) call is waiting on `event`.
    fn is_awaited(&self, event: &str) -> bool {
        self.0
            .waiters
            .lock()
            .iter()
            .any(|waiter| waiter.event == event && !waiter.sender.is_closed())
    }

    fn has_listeners(&self, event: &str) -> bool {
        self.handler_count(event) > 0 || self.is_awaited(event)
    }

    pub(crate) async fn invoke_erased(&self, event: &str, payload: Payload) {
        self.wake_waiters(event, &payload);
        let payload_type = Any::type_id(&*payload);
        let Some(invocation) = self.0.events.read().invocation(event, payload_type) else {
            return;
        };
        trace!(event, handlers = invocation.handlers.len(), "Dispatching event");
        invocation
            .run(payload)
            .instrument(debug_span!("dispatch", event))
            .await;
    }

    /// Invokes `event` on its own task, if anything listens for it.
    fn spawn_invoke(&self, event: &'static str, payload: Payload) {
        if !self.has_listeners(event) {
            return;
        }
        let handle = self.clone();
        tokio::spawn(async move { handle.invoke_erased(event, payload).await });
    }

    /// Spawns `task`, or queues it until setup completes if the client has
    /// not started yet.
    pub fn create_task<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut pending = self.0.pending.lock();
        match pending.as_mut() {
            Some(queue) => queue.push(Box::pin(task)),
            None => {
                tokio::spawn(task);
            }
        }
    }

    /// Spawns the queued tasks. Later tasks are spawned directly.
    pub(crate) fn flush_pending(&self) {
        let queued = self.0.pending.lock().take().unwrap_or_default();
        if !queued.is_empty() {
            debug!(count = queued.len(), "Spawning queued tasks");
        }
        for task in queued {
            tokio::spawn(task);
        }
    }

    pub(crate) fn subscribe(&self, event: &'static str) {
        if self.0.subscriptions.write().insert(event) {
            debug!(event, "Subscribed to gateway event");
        }
    }

    pub(crate) fn unsubscribe(&self, event: &str) {
        if self.0.subscriptions.write().remove(event) {
            debug!(event, "Unsubscribed from gateway event");
        }
    }

    /// Whether a gateway event has at least one handler.
    pub fn is_subscribed(&self, event: &str) -> bool {
        self.0.subscriptions.read().contains(event)
    }

    /// Starts the schedule loop once the connection is ready.
    pub(crate) fn start_scheduler(&self) {
        if !self.is_ready() || self.0.scheduler.is_empty() {
            return;
        }
        let lifecycle: Arc<dyn Lifecycle> = Arc::new(self.clone());
        self.0
            .scheduler
            .spawn(lifecycle, self.0.shutdown.child_token());
    }

    /// Whether the local command tree differs from the one registered for
    /// `guild`, or globally when `None`.
    pub async fn tree_changed(&self, guild: Option<GuildId>) -> ClientResult<bool> {
        let remote = self.0.gateway.fetch_commands(guild).await?;
        let local = self.definitions();
        Ok(tree::tree_changed(&local, &remote))
    }

    /// Synchronises the command tree if it changed. Returns whether a sync
    /// happened.
    pub async fn refresh_tree(&self, guild: Option<GuildId>) -> ClientResult<bool> {
        if !self.tree_changed(guild).await? {
            debug!(guild = ?guild, "Application tree is up to date");
            return Ok(false);
        }
        info!(guild = ?guild, "Synchronising application tree...");
        self.0
            .gateway
            .sync_commands(guild, self.definitions())
            .await?;
        Ok(true)
    }

    /// Stops the schedule loop and closes the gateway.
    pub async fn close(&self) {
        self.0.shutdown.cancel();
        self.0.gateway.close().await;
        info!("Client closed");
    }
}

impl fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientHandle")
            .field("ready", &self.is_ready())
            .field("guild", &self.guild())
            .field("commands", &self.0.tree.read().len())
            .field("plugins", &self.0.plugins.read().len())
            .finish_non_exhaustive()
    }
}

impl Inject for ClientHandle {
    fn inject(deps: &Dependencies) -> DependencyResult<Self> {
        deps.get::<ClientHandle>().map(|handle| handle.as_ref().clone())
    }
}

impl Lifecycle for ClientHandle {
    fn is_ready(&self) -> bool {
        ClientHandle::is_ready(self)
    }

    fn is_closed(&self) -> bool {
        ClientHandle::is_closed(self)
    }
}

// ============================================================================
// GatewayHandler
// ============================================================================

fn guild_of(data: &Value) -> Option<GuildId> {
    data.get("guild_id")
        .and_then(|id| serde_json::from_value(id.clone()).ok())
}

#[async_trait]
impl GatewayHandler for ClientHandle {
    fn wants(&self, kind: &str) -> bool {
        let subscriptions = self.0.subscriptions.read();
        subscriptions.contains(ON_SOCKET_EVENT_TYPE.name())
            || library::resolve(kind)
                .iter()
                .any(|event| subscriptions.contains(event.name) || self.is_awaited(event.name))
    }

    async fn on_ready(&self, user: User) {
        self.0.ready.store(true, Ordering::Release);
        let ping = self
            .0
            .gateway
            .latency()
            .map_or(0, |latency| latency.as_millis());
        info!(
            "Client connected as '{}' with {}ms ping.",
            user.display_name(),
            ping
        );
        self.start_scheduler();
        self.spawn_invoke(ON_READY.name(), Arc::new(user));
    }

    async fn on_dispatch(&self, kind: &str, data: Value) {
        self.spawn_invoke(ON_SOCKET_EVENT_TYPE.name(), Arc::new(kind.to_string()));

        let guild = guild_of(&data);
        if !self.guild_allowed(guild) {
            trace!(kind, guild = ?guild, "Ignoring dispatch from outside the guild");
            return;
        }

        for event in library::resolve(kind) {
            if !self.has_listeners(event.name) {
                continue;
            }
            match (event.decode)(data.clone()) {
                Ok(payload) => self.spawn_invoke(event.name, payload),
                Err(err) => warn!(kind, event = event.name, "Failed to decode dispatch: {err}"),
            }
        }
    }

    async fn on_interaction(&self, interaction: Interaction) {
        let interaction = interaction.with_gateway(Arc::clone(&self.0.gateway));
        if !self.guild_allowed(interaction.guild_id) {
            trace!(command = %interaction.name, "Ignoring interaction from outside the guild");
            return;
        }

        self.spawn_invoke(ON_INTERACTION.name(), Arc::new(interaction.clone()));

        let Some(command) = self.command(&interaction.name, interaction.kind) else {
            warn!(
                command = %interaction.name,
                kind = %interaction.kind,
                "Received an interaction for an unknown command"
            );
            return;
        };

        let handle = self.clone();
        tokio::spawn(async move {
            match command.call(interaction.clone()).await {
                Ok(()) => handle.invoke(&ON_APP_COMMAND_COMPLETION, interaction).await,
                Err(err) => {
                    error!(command = %command.name, kind = %command.kind, "Command failed: {err}")
                }
            }
        });
    }
}
