//! Event descriptors.
//!
//! An [`Event<A>`] names a subscribable event and fixes the payload type `A`
//! its handlers receive. Descriptors are plain `const` values, so plugins and
//! applications can define their own next to the built-in gateway events in
//! [`library`](crate::library):
//!
//! ```rust,ignore
//! pub struct LevelUp { pub user: UserId, pub level: u32 }
//!
//! pub const ON_LEVEL_UP: Event<LevelUp> = Event::new("on_level_up");
//! ```
//!
//! Asynchronous events run their handlers concurrently; blocking events run
//! them one after another in registration order.

use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Type-erased event payload as stored in dispatch tables.
pub type Payload = Arc<dyn Any + Send + Sync>;

/// A subscribable event carrying payloads of type `A`.
pub struct Event<A> {
    name: &'static str,
    asynchronous: bool,
    gateway: bool,
    _payload: PhantomData<fn() -> A>,
}

impl<A> Event<A> {
    /// Defines an asynchronous event.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            asynchronous: true,
            gateway: false,
            _payload: PhantomData,
        }
    }

    /// Defines an event whose handlers are plain functions run in order.
    pub const fn blocking(name: &'static str) -> Self {
        Self {
            name,
            asynchronous: false,
            gateway: false,
            _payload: PhantomData,
        }
    }

    /// Defines a built-in event emitted by the gateway.
    pub(crate) const fn gateway(name: &'static str) -> Self {
        Self {
            name,
            asynchronous: true,
            gateway: true,
            _payload: PhantomData,
        }
    }

    /// The event name, used as the dispatch key.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Whether handlers of this event are asynchronous.
    pub const fn is_async(&self) -> bool {
        self.asynchronous
    }

    /// Whether the event is emitted by the gateway rather than by plugins.
    pub const fn is_gateway(&self) -> bool {
        self.gateway
    }
}

impl<A: 'static> Event<A> {
    /// Type id of the payload.
    pub fn payload_type(&self) -> TypeId {
        TypeId::of::<A>()
    }

    /// Type name of the payload, for diagnostics.
    pub fn payload_name(&self) -> &'static str {
        type_name::<A>()
    }
}

impl<A> Clone for Event<A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A> Copy for Event<A> {}

impl<A> PartialEq for Event<A> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl<A> Eq for Event<A> {}

impl<A> fmt::Debug for Event<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("name", &self.name)
            .field("asynchronous", &self.asynchronous)
            .field("gateway", &self.gateway)
            .finish()
    }
}

impl<A> fmt::Display for Event<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct LevelUp;

    const ON_LEVEL_UP: Event<LevelUp> = Event::new("on_level_up");
    const ON_AUDIT: Event<String> = Event::blocking("on_audit");

    #[test]
    fn test_descriptor_flags() {
        assert_eq!(ON_LEVEL_UP.name(), "on_level_up");
        assert!(ON_LEVEL_UP.is_async());
        assert!(!ON_LEVEL_UP.is_gateway());
        assert!(!ON_AUDIT.is_async());
        assert_eq!(ON_AUDIT.payload_type(), TypeId::of::<String>());
    }
}
