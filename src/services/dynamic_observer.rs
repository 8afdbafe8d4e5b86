//! Debounced re-decoration triggers.
//!
//! The observer registers listeners on the host's mutation and navigation
//! sources and forwards their notifications over a channel. Bursts are
//! coalesced: each notification pushes its kind's deadline out by the
//! configured debounce, replacing whatever was pending. The owner drives it
//! with [`DynamicObserver::next_action`] and applies the resulting
//! [`TriggerAction`] on its own thread, so no engine state is shared with
//! the listeners.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::debug;

use crate::domain::models::Config;
use crate::domain::ports::{
    ListenerId, MutationRecord, MutationSource, NavigationKind, NavigationSource,
};

/// What the owner should do once a debounce window closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerAction {
    /// New links appeared: decorate them within the current epoch
    Redecorate,
    /// The route changed: reset the ledger, then decorate everything
    NewEpoch,
}

#[derive(Debug, Clone, Copy)]
enum TriggerEvent {
    LinksAdded(usize),
    Navigated(NavigationKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserverSettings {
    pub watch_mutations: bool,
    pub watch_navigation: bool,
    pub dom_debounce: Duration,
    pub navigation_debounce: Duration,
}

impl ObserverSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            watch_mutations: config.enable_dynamic_observer,
            watch_navigation: config.enable_spa_support,
            dom_debounce: Duration::from_millis(config.dom_debounce_ms),
            navigation_debounce: Duration::from_millis(config.navigation_debounce_ms),
        }
    }
}

pub struct DynamicObserver {
    settings: ObserverSettings,
    mutations: Option<Arc<dyn MutationSource>>,
    navigation: Option<Arc<dyn NavigationSource>>,
    tx: mpsc::UnboundedSender<TriggerEvent>,
    rx: mpsc::UnboundedReceiver<TriggerEvent>,
    mutation_listener: Option<ListenerId>,
    navigation_listener: Option<ListenerId>,
    pending_mutation: Option<Instant>,
    pending_navigation: Option<Instant>,
    running: bool,
}

impl DynamicObserver {
    pub fn new(
        settings: ObserverSettings,
        mutations: Option<Arc<dyn MutationSource>>,
        navigation: Option<Arc<dyn NavigationSource>>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            settings,
            mutations,
            navigation,
            tx,
            rx,
            mutation_listener: None,
            navigation_listener: None,
            pending_mutation: None,
            pending_navigation: None,
            running: false,
        }
    }

    pub fn settings(&self) -> ObserverSettings {
        self.settings
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// True while a debounced action is waiting for its window to close.
    pub fn has_pending(&self) -> bool {
        self.pending_mutation.is_some() || self.pending_navigation.is_some()
    }

    /// Register listeners on the sources the settings enable.
    pub fn start(&mut self) {
        if self.running {
            return;
        }

        if self.settings.watch_mutations {
            if let Some(source) = &self.mutations {
                let tx = self.tx.clone();
                let id = source.subscribe(Box::new(move |record: MutationRecord| {
                    if record.has_new_links() {
                        let _ = tx.send(TriggerEvent::LinksAdded(record.added_links));
                    }
                }));
                self.mutation_listener = Some(id);
                debug!(target: "paramtrail::observer", "mutation observer started");
            }
        }

        if self.settings.watch_navigation {
            if let Some(source) = &self.navigation {
                let tx = self.tx.clone();
                let id = source.subscribe(Box::new(move |kind: NavigationKind| {
                    let _ = tx.send(TriggerEvent::Navigated(kind));
                }));
                self.navigation_listener = Some(id);
                debug!(target: "paramtrail::observer", "navigation hooks installed");
            }
        }

        self.running = true;
    }

    /// Unregister listeners and discard anything pending.
    pub fn stop(&mut self) {
        if let (Some(source), Some(id)) = (&self.mutations, self.mutation_listener.take()) {
            source.unsubscribe(id);
        }
        if let (Some(source), Some(id)) = (&self.navigation, self.navigation_listener.take()) {
            source.unsubscribe(id);
        }
        while self.rx.try_recv().is_ok() {}
        self.pending_mutation = None;
        self.pending_navigation = None;
        if self.running {
            debug!(target: "paramtrail::observer", "observer stopped");
        }
        self.running = false;
    }

    /// Apply new settings, re-registering listeners if running.
    pub fn update_config(&mut self, config: &Config) {
        let settings = ObserverSettings::from_config(config);
        if settings == self.settings {
            return;
        }
        let was_running = self.running;
        self.stop();
        self.settings = settings;
        if was_running {
            self.start();
        }
    }

    fn schedule(&mut self, event: TriggerEvent) {
        let now = Instant::now();
        match event {
            TriggerEvent::LinksAdded(count) => {
                debug!(target: "paramtrail::observer", count, "links added");
                self.pending_mutation = Some(now + self.settings.dom_debounce);
            }
            TriggerEvent::Navigated(kind) => {
                debug!(target: "paramtrail::observer", ?kind, "SPA navigation detected");
                self.pending_navigation = Some(now + self.settings.navigation_debounce);
            }
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        match (self.pending_mutation, self.pending_navigation) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn take_due(&mut self, now: Instant) -> Option<TriggerAction> {
        if self.pending_navigation.is_some_and(|at| at <= now) {
            self.pending_navigation = None;
            return Some(TriggerAction::NewEpoch);
        }
        if self.pending_mutation.is_some_and(|at| at <= now) {
            self.pending_mutation = None;
            return Some(TriggerAction::Redecorate);
        }
        None
    }

    async fn sleep_until(deadline: Option<Instant>) {
        match deadline {
            Some(at) => tokio::time::sleep_until(at).await,
            None => std::future::pending().await,
        }
    }

    /// Wait for the next debounced action.
    ///
    /// Returns `None` once the observer is stopped.
    pub async fn next_action(&mut self) -> Option<TriggerAction> {
        loop {
            if !self.running {
                return None;
            }
            if let Some(action) = self.take_due(Instant::now()) {
                return Some(action);
            }

            let deadline = self.next_deadline();
            tokio::select! {
                event = self.rx.recv() => match event {
                    Some(event) => self.schedule(event),
                    None => return None,
                },
                () = Self::sleep_until(deadline) => {}
            }
        }
    }
}

impl Drop for DynamicObserver {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for DynamicObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicObserver")
            .field("settings", &self.settings)
            .field("running", &self.running)
            .field("pending_mutation", &self.pending_mutation)
            .field("pending_navigation", &self.pending_navigation)
            .finish_non_exhaustive()
    }
}
