//! Event dispatch table.
//!
//! Handlers are grouped by event name. The first handler registered under a
//! name fixes the payload type and calling convention of the slot; later
//! handlers must agree with it.
//!
//! Invoking an asynchronous event spawns every handler as its own task and
//! waits for all of them; blocking events run their handlers in registration
//! order on the calling task. In both cases a failing or panicking handler is
//! logged and never affects its siblings.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use amethyst_core::{BoxError, BoxFuture, Event, HandlerResult, Payload};
use futures::future;
use tracing::error;

use crate::error::{WidgetError, WidgetResult};
use crate::plugin::PluginId;
use crate::widget::{HandlerOutput, erase};

pub(crate) type ConcurrentFn = Arc<dyn Fn(Payload) -> BoxFuture<'static, HandlerResult> + Send + Sync>;
pub(crate) type BlockingFn = Arc<dyn Fn(&(dyn Any + Send + Sync)) -> HandlerResult + Send + Sync>;

/// A type-erased, bound event callback.
#[derive(Clone)]
pub(crate) enum Callback {
    Concurrent(ConcurrentFn),
    Blocking(BlockingFn),
}

/// A handler registered under an event name.
#[derive(Clone)]
pub(crate) struct EventHandler {
    pub(crate) owner: Option<PluginId>,
    pub(crate) label: String,
    pub(crate) callback: Callback,
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandler")
            .field("owner", &self.owner)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// A handler together with the descriptor of the event it handles.
pub(crate) struct BoundEvent {
    pub(crate) name: &'static str,
    pub(crate) payload: TypeId,
    pub(crate) payload_name: &'static str,
    pub(crate) asynchronous: bool,
    pub(crate) gateway: bool,
    pub(crate) handler: EventHandler,
}

impl BoundEvent {
    /// An asynchronous handler without an owning plugin.
    pub(crate) fn concurrent<A, F, Fut, O>(event: &Event<A>, callback: F) -> WidgetResult<Self>
    where
        A: Send + Sync + 'static,
        F: Fn(Arc<A>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = O> + Send + 'static,
        O: HandlerOutput,
    {
        if !event.is_async() {
            return Err(WidgetError::EventKindMismatch {
                event: event.name(),
                expected: "blocking",
            });
        }
        let name = event.name();
        let callback: ConcurrentFn = Arc::new(move |payload: Payload| match payload.downcast::<A>() {
            Ok(payload) => erase(callback(payload)),
            Err(_) => Box::pin(future::ready(Err(payload_mismatch::<A>(name)))),
        });
        Ok(Self::anonymous(event, type_name::<F>(), Callback::Concurrent(callback)))
    }

    /// A blocking handler without an owning plugin.
    pub(crate) fn blocking<A, F, R>(event: &Event<A>, callback: F) -> WidgetResult<Self>
    where
        A: Send + Sync + 'static,
        F: Fn(&A) -> R + Send + Sync + 'static,
        R: HandlerOutput,
    {
        if event.is_async() {
            return Err(WidgetError::EventKindMismatch {
                event: event.name(),
                expected: "asynchronous",
            });
        }
        let name = event.name();
        let callback: BlockingFn = Arc::new(move |payload: &(dyn Any + Send + Sync)| {
            match payload.downcast_ref::<A>() {
                Some(payload) => callback(payload).into_result(),
                None => Err(payload_mismatch::<A>(name)),
            }
        });
        Ok(Self::anonymous(event, type_name::<F>(), Callback::Blocking(callback)))
    }

    fn anonymous<A: 'static>(event: &Event<A>, label: &str, callback: Callback) -> Self {
        Self {
            name: event.name(),
            payload: event.payload_type(),
            payload_name: event.payload_name(),
            asynchronous: event.is_async(),
            gateway: event.is_gateway(),
            handler: EventHandler {
                owner: None,
                label: label.to_string(),
                callback,
            },
        }
    }
}

pub(crate) fn payload_mismatch<A>(event: &str) -> BoxError {
    format!("event '{event}' was invoked without a `{}` payload", type_name::<A>()).into()
}

// ============================================================================
// EventTable
// ============================================================================

struct Slot {
    payload: TypeId,
    payload_name: &'static str,
    asynchronous: bool,
    handlers: Vec<EventHandler>,
}

/// Handlers of one event, copied out of the table for invocation.
pub(crate) struct Invocation {
    pub(crate) event: &'static str,
    pub(crate) asynchronous: bool,
    pub(crate) handlers: Vec<EventHandler>,
}

/// Event name → handlers.
#[derive(Default)]
pub(crate) struct EventTable {
    slots: HashMap<&'static str, Slot>,
}

impl EventTable {
    /// Checks that `event` agrees with the handlers already registered under
    /// its name.
    pub(crate) fn check(&self, event: &BoundEvent) -> WidgetResult<()> {
        let Some(slot) = self.slots.get(event.name) else {
            return Ok(());
        };
        if slot.payload != event.payload {
            return Err(WidgetError::PayloadMismatch {
                event: event.name,
                registered: slot.payload_name,
                requested: event.payload_name,
            });
        }
        if slot.asynchronous != event.asynchronous {
            return Err(WidgetError::EventKindMismatch {
                event: event.name,
                expected: if slot.asynchronous { "asynchronous" } else { "blocking" },
            });
        }
        Ok(())
    }

    /// Appends the handler. Returns `true` if it is the first handler of a
    /// built-in gateway event, i.e. the event just became subscribed.
    pub(crate) fn insert(&mut self, event: BoundEvent) -> WidgetResult<bool> {
        self.check(&event)?;
        let slot = self.slots.entry(event.name).or_insert_with(|| Slot {
            payload: event.payload,
            payload_name: event.payload_name,
            asynchronous: event.asynchronous,
            handlers: Vec::new(),
        });
        slot.handlers.push(event.handler);
        Ok(event.gateway && slot.handlers.len() == 1)
    }

    /// Removes the most recent handler of `event`. Returns `true` if the
    /// event has no handlers left.
    pub(crate) fn pop(&mut self, event: &str) -> bool {
        let Some(slot) = self.slots.get_mut(event) else {
            return false;
        };
        slot.handlers.pop();
        if slot.handlers.is_empty() {
            self.slots.remove(event);
            return true;
        }
        false
    }

    /// Number of handlers registered under `event`.
    pub(crate) fn handler_count(&self, event: &str) -> usize {
        self.slots.get(event).map_or(0, |slot| slot.handlers.len())
    }

    /// Copies the handlers of `event` if its slot carries `payload`.
    pub(crate) fn invocation(&self, event: &str, payload: TypeId) -> Option<Invocation> {
        let (name, slot) = self.slots.get_key_value(event)?;
        if slot.payload != payload {
            error!(
                event = %name,
                expected = slot.payload_name,
                "Event invoked with a mismatched payload"
            );
            return None;
        }
        Some(Invocation {
            event: name,
            asynchronous: slot.asynchronous,
            handlers: slot.handlers.clone(),
        })
    }
}

// ============================================================================
// Invocation
// ============================================================================

impl Invocation {
    /// Runs every handler with `payload`.
    pub(crate) async fn run(self, payload: Payload) {
        let event = self.event;
        let mut tasks = Vec::with_capacity(self.handlers.len());

        for handler in self.handlers {
            match handler.callback {
                Callback::Concurrent(callback) => {
                    let task = tokio::spawn(callback(Arc::clone(&payload)));
                    tasks.push(async move { (handler.label, task.await) });
                }
                Callback::Blocking(callback) => {
                    match catch_unwind(AssertUnwindSafe(|| callback(&*payload))) {
                        Ok(Ok(())) => {}
                        Ok(Err(err)) => {
                            error!(event, handler = %handler.label, "Event handler failed: {err}");
                        }
                        Err(_) => {
                            error!(event, handler = %handler.label, "Event handler panicked");
                        }
                    }
                }
            }
        }

        for (label, result) in future::join_all(tasks).await {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(err)) => error!(event, handler = %label, "Event handler failed: {err}"),
                Err(err) => error!(event, handler = %label, "Event handler panicked: {err}"),
            }
        }
    }
}
