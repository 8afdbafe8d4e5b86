//! Trigger sources the host wires to its real navigation and DOM primitives.
//!
//! The engine never patches host functions itself: it registers listeners
//! here and receives "navigation occurred" / "links appeared" events.

/// Which history primitive caused a client-side route change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavigationKind {
    PushState,
    ReplaceState,
    PopState,
}

/// A batch of DOM mutations, reduced to what decoration cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MutationRecord {
    /// Number of added nodes that are, or contain, anchors
    pub added_links: usize,
}

impl MutationRecord {
    pub const fn with_links(added_links: usize) -> Self {
        Self { added_links }
    }

    pub const fn has_new_links(&self) -> bool {
        self.added_links > 0
    }
}

/// Handle returned on registration, used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

pub type NavigationListener = Box<dyn Fn(NavigationKind) + Send + Sync>;
pub type MutationListener = Box<dyn Fn(MutationRecord) + Send + Sync>;

/// Client-side navigation notifications (history push/replace, back/forward).
pub trait NavigationSource: Send + Sync {
    fn subscribe(&self, listener: NavigationListener) -> ListenerId;
    fn unsubscribe(&self, id: ListenerId);
}

/// Notifications of elements added to the document.
pub trait MutationSource: Send + Sync {
    fn subscribe(&self, listener: MutationListener) -> ListenerId;
    fn unsubscribe(&self, id: ListenerId);
}
