//! Ordered listener registry.

use std::fmt;

use quarry_common::{EventResult, ListenerId};
use tracing::warn;

use crate::order::Order;

/// Listener callback. Returning an error aborts dispatch.
pub type Listener<E> = Box<dyn FnMut(&mut E) -> EventResult<()>>;

struct Registration<E> {
    id: ListenerId,
    order: Order,
    listener: Listener<E>,
}

/// Listeners for one event type, sorted by [`Order`].
///
/// Listeners sharing an order run in registration order. Handles come from
/// [`ListenerId::next`], so they never collide between registries.
pub struct ListenerRegistry<E> {
    entries: Vec<Registration<E>>,
}

impl<E> Default for ListenerRegistry<E> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<E> fmt::Debug for ListenerRegistry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.entries.len())
            .finish()
    }
}

impl<E> ListenerRegistry<E> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener.
    pub fn register<F>(&mut self, order: Order, listener: F) -> ListenerId
    where
        F: FnMut(&mut E) -> EventResult<()> + 'static,
    {
        let id = ListenerId::next();
        let index = self.entries.partition_point(|entry| entry.order <= order);
        self.entries.insert(
            index,
            Registration {
                id,
                order,
                listener: Box::new(listener),
            },
        );
        id
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn unregister(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        self.entries.len() != before
    }

    /// Number of listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no listener is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered listeners in dispatch order.
    pub fn iter(&self) -> impl Iterator<Item = (ListenerId, Order)> + '_ {
        self.entries.iter().map(|entry| (entry.id, entry.order))
    }

    /// Call every listener in order. Stops at the first error.
    pub fn dispatch(&mut self, event: &mut E) -> EventResult<()> {
        for entry in &mut self.entries {
            if let Err(err) = (entry.listener)(event) {
                warn!(
                    "Listener {} ({}) failed: {}",
                    entry.id.raw(),
                    entry.order,
                    err
                );
                return Err(err);
            }
        }
        Ok(())
    }
}
