//! Manually driven trigger sources.
//!
//! A browser binding forwards its history hooks and mutation observer
//! callbacks into these registries; tests call [`ListenerRegistry::emit`]
//! directly.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::domain::ports::{
    ListenerId, MutationListener, MutationRecord, MutationSource, NavigationKind,
    NavigationListener, NavigationSource,
};

type Listener<E> = Box<dyn Fn(E) + Send + Sync>;

/// Ordered set of listeners for one event type.
pub struct ListenerRegistry<E> {
    listeners: Mutex<Vec<(ListenerId, Listener<E>)>>,
    next_id: AtomicU64,
}

pub type ManualNavigationSource = ListenerRegistry<NavigationKind>;
pub type ManualMutationSource = ListenerRegistry<MutationRecord>;

impl<E: Copy> ListenerRegistry<E> {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn add(&self, listener: Listener<E>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.push((id, listener));
        }
        id
    }

    fn delete(&self, id: ListenerId) {
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.retain(|(existing, _)| *existing != id);
        }
    }

    /// Deliver an event to every registered listener, returning how many ran.
    pub fn emit(&self, event: E) -> usize {
        let Ok(listeners) = self.listeners.lock() else {
            return 0;
        };
        for (_, listener) in listeners.iter() {
            listener(event);
        }
        listeners.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().map(|l| l.len()).unwrap_or(0)
    }
}

impl<E: Copy> Default for ListenerRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for ListenerRegistry<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.listeners.lock().map(|l| l.len()).unwrap_or(0);
        f.debug_struct("ListenerRegistry")
            .field("listeners", &count)
            .finish()
    }
}

impl NavigationSource for ListenerRegistry<NavigationKind> {
    fn subscribe(&self, listener: NavigationListener) -> ListenerId {
        self.add(listener)
    }

    fn unsubscribe(&self, id: ListenerId) {
        self.delete(id);
    }
}

impl MutationSource for ListenerRegistry<MutationRecord> {
    fn subscribe(&self, listener: MutationListener) -> ListenerId {
        self.add(listener)
    }

    fn unsubscribe(&self, id: ListenerId) {
        self.delete(id);
    }
}
