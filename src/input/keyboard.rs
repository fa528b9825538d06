use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use tracing::{debug, info};

use crate::action::{Action, ActionResult};
use crate::error::CommandError;
use crate::state::BackendState;

/// A discrete key press delivered by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    /// Key name, used as the trigger id
    pub key: String,
}

impl KeyEvent {
    /// Creates an event for the given key name
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

/// Handler invoked by a [`KeyEventSource`] for every key event
pub type KeyHandler = Rc<dyn Fn(&KeyEvent) -> ActionResult>;

/// Token returned by [`KeyEventSource::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

impl SubscriptionHandle {
    /// Wraps a source-assigned subscription id
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Source-assigned subscription id
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

/// Host-provided stream of key events
///
/// `unsubscribe` must tolerate handles that are already gone.
#[cfg_attr(test, mockall::automock)]
pub trait KeyEventSource {
    /// Registers a handler and returns a handle for removing it
    fn subscribe(&self, handler: KeyHandler) -> SubscriptionHandle;
    /// Removes a previously registered handler
    fn unsubscribe(&self, handle: SubscriptionHandle);
}

/// In-process key event source
///
/// Delivers each event to subscribers in subscription order and stops at the
/// first failing handler.
#[derive(Default)]
pub struct KeyEventBus {
    next_id: Cell<u64>,
    subscribers: RefCell<Vec<(SubscriptionHandle, KeyHandler)>>,
}

impl KeyEventBus {
    /// Creates a bus with no subscribers
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers a key event to every subscriber
    ///
    /// # Errors
    /// Returns the first error raised by a bound action
    pub fn dispatch(&self, event: &KeyEvent) -> ActionResult {
        // Snapshot so handlers may (un)subscribe while running
        let handlers: Vec<KeyHandler> = self
            .subscribers
            .borrow()
            .iter()
            .map(|(_, handler)| Rc::clone(handler))
            .collect();

        for handler in handlers {
            handler(event)?;
        }
        Ok(())
    }

    /// Number of live subscriptions
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }
}

impl KeyEventSource for KeyEventBus {
    fn subscribe(&self, handler: KeyHandler) -> SubscriptionHandle {
        let handle = SubscriptionHandle::new(self.next_id.get());
        self.next_id.set(handle.id() + 1);
        self.subscribers.borrow_mut().push((handle, handler));
        handle
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) {
        self.subscribers.borrow_mut().retain(|(h, _)| *h != handle);
    }
}

/// Binds key names to actions and dispatches key events to them
pub struct KeyTriggerBackend {
    source: Rc<dyn KeyEventSource>,
    actions: Rc<RefCell<HashMap<String, Action>>>,
    reserved: HashSet<String>,
    subscription: Option<SubscriptionHandle>,
}

impl KeyTriggerBackend {
    /// Creates a detached backend with no bindings
    #[must_use]
    pub fn new(source: Rc<dyn KeyEventSource>) -> Self {
        Self {
            source,
            actions: Rc::new(RefCell::new(HashMap::new())),
            reserved: HashSet::new(),
            subscription: None,
        }
    }

    /// Current lifecycle state
    #[must_use]
    pub const fn state(&self) -> BackendState {
        if self.subscription.is_some() {
            BackendState::Active
        } else {
            BackendState::Uninitialized
        }
    }

    /// Subscribes to the key event source (idempotent)
    pub fn attach(&mut self) {
        if self.subscription.is_some() {
            debug!("key listener already attached");
            return;
        }

        let actions = Rc::clone(&self.actions);
        let handler: KeyHandler = Rc::new(move |event: &KeyEvent| dispatch(&actions, event));
        let handle = self.source.subscribe(handler);
        self.subscription = Some(handle);

        info!(subscription = handle.id(), "key listener attached");
    }

    /// Binds `key` to `action`, replacing any regular binding
    ///
    /// # Errors
    /// Returns [`CommandError::ReservationConflict`] if `key` is reserved; no
    /// state changes in that case.
    pub fn bind(&mut self, key: &str, action: Action) -> Result<(), CommandError> {
        if self.reserved.contains(key) {
            debug!(key = %key, "rejected regular bind on reserved key");
            return Err(CommandError::ReservationConflict {
                key: key.to_owned(),
            });
        }

        self.actions.borrow_mut().insert(key.to_owned(), action);
        debug!(key = %key, "key bound");
        Ok(())
    }

    /// Binds `key` to `action` and protects it from regular binds
    pub fn bind_reserved(&mut self, key: &str, action: Action) {
        self.actions.borrow_mut().insert(key.to_owned(), action);
        self.reserved.insert(key.to_owned());
        debug!(key = %key, "reserved key bound");
    }

    /// Runs the action bound to the event's key, if any
    ///
    /// # Errors
    /// Propagates the bound action's error
    pub fn handle_event(&self, event: &KeyEvent) -> ActionResult {
        dispatch(&self.actions, event)
    }

    /// Whether `key` currently has a binding
    #[must_use]
    pub fn is_bound(&self, key: &str) -> bool {
        self.actions.borrow().contains_key(key)
    }

    /// Whether `key` is protected by a reserved binding
    #[must_use]
    pub fn is_reserved(&self, key: &str) -> bool {
        self.reserved.contains(key)
    }

    /// All bound keys, sorted
    #[must_use]
    pub fn bound_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.actions.borrow().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Detaches from the event source and clears all bindings
    pub fn dispose(mut self) {
        self.detach();
        self.actions.borrow_mut().clear();
        info!("key backend disposed");
    }

    fn detach(&mut self) {
        if let Some(handle) = self.subscription.take() {
            self.source.unsubscribe(handle);
            info!(subscription = handle.id(), "key listener detached");
        }
    }
}

impl Drop for KeyTriggerBackend {
    fn drop(&mut self) {
        self.detach();
    }
}

fn dispatch(actions: &RefCell<HashMap<String, Action>>, event: &KeyEvent) -> ActionResult {
    // Release the borrow before running; actions may rebind keys
    let action = actions.borrow().get(&event.key).cloned();

    match action {
        Some(action) => {
            debug!(key = %event.key, "dispatching key action");
            action()
        }
        None => {
            debug!(key = %event.key, "no binding for key (ignored)");
            Ok(())
        }
    }
}
