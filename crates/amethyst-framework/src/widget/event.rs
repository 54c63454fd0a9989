//! Event handler widgets.

use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::sync::Arc;

use amethyst_core::{BoxFuture, Event, HandlerResult, Payload};
use futures::FutureExt;
use futures::future;

use super::{HandlerOutput, erase};
use crate::error::{WidgetError, WidgetResult};
use crate::events::{BoundEvent, Callback, EventHandler, payload_mismatch};
use crate::plugin::{Plugin, PluginId};

type ConcurrentFn<P> =
    Arc<dyn Fn(Arc<P>, Payload) -> BoxFuture<'static, HandlerResult> + Send + Sync>;
type BlockingFn<P> = Arc<dyn Fn(&P, &(dyn Any + Send + Sync)) -> HandlerResult + Send + Sync>;

enum EventCallback<P> {
    Concurrent(ConcurrentFn<P>),
    Blocking(BlockingFn<P>),
}

/// An event handler declared by plugin `P`.
///
/// ```rust,ignore
/// widgets.event(
///     EventWidget::new(&ON_MESSAGE, |this: Arc<Self>, message: Arc<Message>| async move {
///         this.on_message(&message).await
///     })?
///     .name("on_message"),
/// )?;
/// ```
pub struct EventWidget<P> {
    event: &'static str,
    payload: TypeId,
    payload_name: &'static str,
    asynchronous: bool,
    gateway: bool,
    label: String,
    callback: EventCallback<P>,
}

impl<P: Plugin> EventWidget<P> {
    /// Declares an asynchronous handler. Fails if `event` is blocking.
    pub fn new<A, F, Fut, O>(event: &Event<A>, callback: F) -> WidgetResult<Self>
    where
        A: Send + Sync + 'static,
        F: Fn(Arc<P>, Arc<A>) -> Fut + Send + Sync + 'static,
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
        let callback: ConcurrentFn<P> = Arc::new(move |this, payload: Payload| {
            match payload.downcast::<A>() {
                Ok(payload) => erase(callback(this, payload)),
                Err(_) => future::ready(Err(payload_mismatch::<A>(name))).boxed(),
            }
        });
        Ok(Self::with_callback(
            event,
            type_name::<F>(),
            EventCallback::Concurrent(callback),
        ))
    }

    /// Declares a blocking handler. Fails if `event` is asynchronous.
    pub fn blocking<A, F, R>(event: &Event<A>, callback: F) -> WidgetResult<Self>
    where
        A: Send + Sync + 'static,
        F: Fn(&P, &A) -> R + Send + Sync + 'static,
        R: HandlerOutput,
    {
        if event.is_async() {
            return Err(WidgetError::EventKindMismatch {
                event: event.name(),
                expected: "asynchronous",
            });
        }

        let name = event.name();
        let callback: BlockingFn<P> = Arc::new(move |this: &P, payload: &(dyn Any + Send + Sync)| {
            match payload.downcast_ref::<A>() {
                Some(payload) => callback(this, payload).into_result(),
                None => Err(payload_mismatch::<A>(name)),
            }
        });
        Ok(Self::with_callback(
            event,
            type_name::<F>(),
            EventCallback::Blocking(callback),
        ))
    }

    fn with_callback<A: 'static>(
        event: &Event<A>,
        label: &str,
        callback: EventCallback<P>,
    ) -> Self {
        Self {
            event: event.name(),
            payload: event.payload_type(),
            payload_name: event.payload_name(),
            asynchronous: event.is_async(),
            gateway: event.is_gateway(),
            label: label.to_string(),
            callback,
        }
    }

    /// Sets the label used in logs.
    pub fn name(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub(crate) fn bind(self, this: Arc<P>, owner: PluginId) -> BoundEvent {
        let callback = match self.callback {
            EventCallback::Concurrent(callback) => {
                Callback::Concurrent(Arc::new(move |payload| callback(Arc::clone(&this), payload)))
            }
            EventCallback::Blocking(callback) => {
                Callback::Blocking(Arc::new(move |payload: &(dyn Any + Send + Sync)| {
                    callback(&this, payload)
                }))
            }
        };

        BoundEvent {
            name: self.event,
            payload: self.payload,
            payload_name: self.payload_name,
            asynchronous: self.asynchronous,
            gateway: self.gateway,
            handler: EventHandler {
                owner: Some(owner),
                label: self.label,
                callback,
            },
        }
    }
}

impl<P> EventWidget<P> {
    /// Name of the event handled.
    pub fn event(&self) -> &'static str {
        self.event
    }

    /// Label used in logs.
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl<P> fmt::Debug for EventWidget<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventWidget")
            .field("event", &self.event)
            .field("payload", &self.payload_name)
            .field("asynchronous", &self.asynchronous)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}
