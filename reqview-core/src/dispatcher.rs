//! Synchronous broadcast of reduced actions to subscribed listeners.
//!
//! Listeners are called in registration order, inside the `dispatch` call
//! that produced the snapshot they receive. They get shared references
//! only, so a listener cannot dispatch back into the store it observes.

use crate::action::{Action, ActionName};
use crate::state::AppState;

/// Opaque handle returned by `register`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Box<dyn FnMut(&Action, &AppState)>;

struct Listener {
    id: SubscriptionId,
    /// `None` listens to every action.
    filter: Option<ActionName>,
    callback: Callback,
}

#[derive(Default)]
pub struct Dispatcher {
    listeners: Vec<Listener>,
    next_id: u64,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to actions named `name`.
    pub fn register<F>(&mut self, name: ActionName, callback: F) -> SubscriptionId
    where
        F: FnMut(&Action, &AppState) + 'static,
    {
        self.insert(Some(name), Box::new(callback))
    }

    /// Subscribe to every action.
    pub fn register_all<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&Action, &AppState) + 'static,
    {
        self.insert(None, Box::new(callback))
    }

    fn insert(&mut self, filter: Option<ActionName>, callback: Callback) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push(Listener {
            id,
            filter,
            callback,
        });
        id
    }

    /// Remove a subscription. Returns `false` if it was already gone.
    pub fn unregister(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| l.id != id);
        self.listeners.len() != before
    }

    pub fn dispatch(&mut self, action: &Action, state: &AppState) {
        let name = action.name();
        for listener in &mut self.listeners {
            if listener.filter.is_none_or(|f| f == name) {
                (listener.callback)(action, state);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
