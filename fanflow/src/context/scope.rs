//! Immutable, layered key/value scopes with typed keys.

use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// A typed key for looking up values in a [`Scope`].
///
/// The key's identity is its name together with the value type, so looking up
/// `ContextKey::<u64>::new("id")` never sees a value stored under
/// `ContextKey::<String>::new("id")`.
pub struct ContextKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ContextKey<T> {
    /// Creates a new key.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    /// Returns the key name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for ContextKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ContextKey<T> {}

impl<T> fmt::Debug for ContextKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextKey")
            .field("name", &self.name)
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

struct Node {
    name: &'static str,
    type_id: TypeId,
    value: Box<dyn Any + Send + Sync>,
    parent: Scope,
}

/// An immutable layer of context values.
///
/// Adding a value never mutates a scope: [`Scope::with`] returns a child that
/// shadows its parent for that key. Cloning is cheap and shares all layers.
#[derive(Clone, Default)]
pub struct Scope {
    head: Option<Arc<Node>>,
}

impl Scope {
    /// Returns the empty root scope.
    #[must_use]
    pub const fn root() -> Self {
        Self { head: None }
    }

    /// Returns a child scope holding `value` under `key`.
    #[must_use]
    pub fn with<T>(&self, key: &ContextKey<T>, value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Self {
            head: Some(Arc::new(Node {
                name: key.name,
                type_id: TypeId::of::<T>(),
                value: Box::new(value),
                parent: self.clone(),
            })),
        }
    }

    /// Looks up `key`, walking from this scope outward to the root.
    ///
    /// Returns the nearest match.
    #[must_use]
    pub fn get<T>(&self, key: &ContextKey<T>) -> Option<&T>
    where
        T: Any + Send + Sync,
    {
        let wanted = TypeId::of::<T>();
        let mut current = self.head.as_deref();
        while let Some(node) = current {
            if node.name == key.name && node.type_id == wanted {
                return node.value.downcast_ref::<T>();
            }
            current = node.parent.head.as_deref();
        }
        None
    }

    /// Returns true if `key` resolves in this scope or any ancestor.
    #[must_use]
    pub fn contains<T>(&self, key: &ContextKey<T>) -> bool
    where
        T: Any + Send + Sync,
    {
        self.get(key).is_some()
    }

    /// Returns the number of layers between this scope and the root.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self.head.as_deref();
        while let Some(node) = current {
            depth += 1;
            current = node.parent.head.as_deref();
        }
        depth
    }

    /// Returns true for the root scope.
    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.head.is_none()
    }

    /// Returns the key names from innermost to outermost, shadowed ones included.
    #[must_use]
    pub fn key_names(&self) -> Vec<&'static str> {
        let mut names = Vec::with_capacity(self.depth());
        let mut current = self.head.as_deref();
        while let Some(node) = current {
            names.push(node.name);
            current = node.parent.head.as_deref();
        }
        names
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("keys", &self.key_names())
            .finish()
    }
}
