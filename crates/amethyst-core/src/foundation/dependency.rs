//! Typed dependency registry used to construct plugins.
//!
//! [`Dependencies`] holds at most one value per concrete type. Constructors
//! declare what they need through their parameter types; every parameter
//! implementing [`Inject`] is resolved from the registry, similar to the way
//! handler arguments are extracted from a context.
//!
//! ```rust,ignore
//! let mut deps = Dependencies::new();
//! deps.add(Database::connect(url)?)?;
//!
//! fn build(db: Arc<Database>, cache: Option<Arc<Cache>>) -> Greeter { /* ... */ }
//! let greeter = deps.inject(build)?;
//! ```

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::{DependencyError, DependencyResult};

type Stored = (&'static str, Arc<dyn Any + Send + Sync>);

/// A registry of singleton values keyed by their type.
#[derive(Clone, Default)]
pub struct Dependencies {
    values: HashMap<TypeId, Stored>,
}

impl Dependencies {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `value`, keyed by its concrete type.
    ///
    /// Fails if a value of the same type is already present; the existing value
    /// is left untouched.
    pub fn add<T: Send + Sync + 'static>(&mut self, value: T) -> DependencyResult<()> {
        self.add_shared(Arc::new(value))
    }

    /// Adds an already shared value, keyed by `T`.
    pub fn add_shared<T: Send + Sync + 'static>(&mut self, value: Arc<T>) -> DependencyResult<()> {
        let type_name = type_name::<T>();
        match self.values.entry(TypeId::of::<T>()) {
            Entry::Occupied(_) => Err(DependencyError::Duplicate { type_name }),
            Entry::Vacant(slot) => {
                slot.insert((type_name, value));
                debug!(dependency = type_name, "Dependency added");
                Ok(())
            }
        }
    }

    /// Returns the value stored for `T`.
    pub fn get<T: Send + Sync + 'static>(&self) -> DependencyResult<Arc<T>> {
        self.values
            .get(&TypeId::of::<T>())
            .and_then(|(_, value)| Arc::clone(value).downcast::<T>().ok())
            .ok_or(DependencyError::Missing {
                type_name: type_name::<T>(),
            })
    }

    /// Returns `true` if a value of type `T` is present.
    pub fn contains<T: 'static>(&self) -> bool {
        self.values.contains_key(&TypeId::of::<T>())
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the registry holds nothing.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Names of the stored types, in no particular order.
    pub fn type_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.values.values().map(|(name, _)| *name)
    }

    /// Calls `constructor`, resolving each of its parameters from the registry.
    ///
    /// Fails with the first parameter type that cannot be resolved; the
    /// constructor is not called in that case.
    pub fn inject<Args, R, C>(&self, constructor: C) -> DependencyResult<R>
    where
        C: Constructor<Args, R>,
    {
        constructor.construct(self)
    }
}

impl fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.type_names()).finish()
    }
}

// ============================================================================
// Inject - resolve a single parameter
// ============================================================================

/// A type that can be resolved from a [`Dependencies`] registry.
///
/// Implemented for:
/// - `Arc<T>`: required dependency, fails if absent
/// - `Option<Arc<T>>`: optional dependency
/// - `()` and tuples of injectable types, so a parameter list can be named as
///   one associated type
pub trait Inject: Sized {
    /// Resolves `Self` from the registry.
    fn inject(deps: &Dependencies) -> DependencyResult<Self>;
}

impl<T: Send + Sync + 'static> Inject for Arc<T> {
    fn inject(deps: &Dependencies) -> DependencyResult<Self> {
        deps.get::<T>()
    }
}

impl<T: Send + Sync + 'static> Inject for Option<Arc<T>> {
    fn inject(deps: &Dependencies) -> DependencyResult<Self> {
        Ok(deps.get::<T>().ok())
    }
}

macro_rules! impl_inject_tuple {
    ($($ty:ident),*) => {
        #[allow(unused_variables)]
        impl<$($ty: Inject,)*> Inject for ($($ty,)*) {
            fn inject(deps: &Dependencies) -> DependencyResult<Self> {
                Ok(($($ty::inject(deps)?,)*))
            }
        }
    };
}

impl_inject_tuple!();
impl_inject_tuple!(T1);
impl_inject_tuple!(T1, T2);
impl_inject_tuple!(T1, T2, T3);
impl_inject_tuple!(T1, T2, T3, T4);
impl_inject_tuple!(T1, T2, T3, T4, T5);
impl_inject_tuple!(T1, T2, T3, T4, T5, T6);
impl_inject_tuple!(T1, T2, T3, T4, T5, T6, T7);
impl_inject_tuple!(T1, T2, T3, T4, T5, T6, T7, T8);

// ============================================================================
// Constructor - functions whose parameters are all injectable
// ============================================================================

/// A function whose parameters can all be resolved from a registry.
///
/// Blanket-implemented for `FnOnce` with up to eight [`Inject`] parameters.
pub trait Constructor<Args, R> {
    /// Resolves the parameters and calls the function.
    fn construct(self, deps: &Dependencies) -> DependencyResult<R>;
}

macro_rules! impl_constructor {
    ($($ty:ident),*) => {
        #[allow(non_snake_case, unused_variables)]
        impl<F, R, $($ty,)*> Constructor<($($ty,)*), R> for F
        where
            F: FnOnce($($ty,)*) -> R,
            $( $ty: Inject, )*
        {
            fn construct(self, deps: &Dependencies) -> DependencyResult<R> {
                $(
                    let $ty = $ty::inject(deps)?;
                )*
                Ok((self)($($ty,)*))
            }
        }
    };
}

impl_constructor!();
impl_constructor!(T1);
impl_constructor!(T1, T2);
impl_constructor!(T1, T2, T3);
impl_constructor!(T1, T2, T3, T4);
impl_constructor!(T1, T2, T3, T4, T5);
impl_constructor!(T1, T2, T3, T4, T5, T6);
impl_constructor!(T1, T2, T3, T4, T5, T6, T7);
impl_constructor!(T1, T2, T3, T4, T5, T6, T7, T8);

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Database(&'static str);

    #[derive(Debug, PartialEq)]
    struct Cache(u32);

    struct Service {
        db: Arc<Database>,
        cache: Option<Arc<Cache>>,
    }

    #[test]
    fn test_add_and_get() {
        let mut deps = Dependencies::new();
        deps.add(Database("main")).unwrap();

        assert!(deps.contains::<Database>());
        assert_eq!(*deps.get::<Database>().unwrap(), Database("main"));
        assert_eq!(deps.len(), 1);
    }

    #[test]
    fn test_duplicate_type_is_rejected() {
        let mut deps = Dependencies::new();
        deps.add(Database("first")).unwrap();

        let err = deps.add(Database("second")).unwrap_err();
        assert!(matches!(err, DependencyError::Duplicate { .. }));
        assert!(err.to_string().contains("Database"));
        // the first value survives
        assert_eq!(*deps.get::<Database>().unwrap(), Database("first"));
    }

    #[test]
    fn test_missing_type_is_named() {
        let deps = Dependencies::new();
        let err = deps.get::<Cache>().unwrap_err();
        assert_eq!(
            err,
            DependencyError::Missing {
                type_name: type_name::<Cache>()
            }
        );
    }

    #[test]
    fn test_inject_constructor() {
        let mut deps = Dependencies::new();
        deps.add(Database("main")).unwrap();
        deps.add(Cache(7)).unwrap();

        let service = deps
            .inject(|db: Arc<Database>, cache: Option<Arc<Cache>>| Service { db, cache })
            .unwrap();
        assert_eq!(service.db.0, "main");
        assert_eq!(service.cache.map(|c| c.0), Some(7));
    }

    #[test]
    fn test_inject_optional_absent() {
        let mut deps = Dependencies::new();
        deps.add(Database("main")).unwrap();

        let service = deps
            .inject(|db: Arc<Database>, cache: Option<Arc<Cache>>| Service { db, cache })
            .unwrap();
        assert!(service.cache.is_none());
    }

    #[test]
    fn test_inject_fails_without_calling() {
        let deps = Dependencies::new();
        let mut called = false;

        let result = deps.inject(|_db: Arc<Database>| called = true);
        assert!(matches!(
            result,
            Err(DependencyError::Missing { type_name }) if type_name.ends_with("Database")
        ));
        assert!(!called);
    }

    #[test]
    fn test_inject_tuple_parameter() {
        let mut deps = Dependencies::new();
        deps.add(Database("main")).unwrap();
        deps.add(Cache(1)).unwrap();

        fn build((db, cache): (Arc<Database>, Arc<Cache>)) -> (String, u32) {
            (db.0.to_string(), cache.0)
        }

        assert_eq!(deps.inject(build).unwrap(), ("main".to_string(), 1));
        assert_eq!(deps.inject(|| 42).unwrap(), 42);
    }
}
