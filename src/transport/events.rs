//! Event names and the subscription registry.
//!
//! Subscribable names fall into two closed sets: transport lifecycle
//! events emitted by the client itself, and application push events
//! relayed from the server. Subscribing to anything outside both sets is
//! rejected up front, which catches typos at the call site instead of
//! producing a listener that never fires.

use std::collections::HashMap;

use serde_json::Value;

/// Transport lifecycle events emitted by the client.
pub const TRANSPORT_EVENTS: &[&str] = &[
    "connect",
    "disconnect",
    "error",
    "reconnecting",
    "ping",
    "pong",
    "authenticated",
];

/// Application push events relayed from the server.
pub const APPLICATION_EVENTS: &[&str] = &[
    "digestUpdate",
    "serverWarning",
    "clearWarning",
    "channelDeleted",
    "volumeDeleted",
    "inviteListUpdate",
    "serverConfigUpdate",
];

/// The specially-buffered authentication event (see
/// [`EventRegistry::subscribe`] call sites in the client).
pub const EVENT_AUTHENTICATED: &str = "authenticated";

/// Whether `name` belongs to either closed event set.
pub fn is_known_event(name: &str) -> bool {
    TRANSPORT_EVENTS.contains(&name) || APPLICATION_EVENTS.contains(&name)
}

/// Listener callback. Invoked on the transport actor's task.
pub type Listener = Box<dyn FnMut(&Value) + Send + 'static>;

struct Entry {
    id: u64,
    once: bool,
    listener: Listener,
}

/// Mapping from event name to ordered listeners.
///
/// Owned exclusively by one transport actor; a second client owns an
/// independent registry, never a shared table.
#[derive(Default)]
pub struct EventRegistry {
    next_id: u64,
    listeners: HashMap<String, Vec<Entry>>,
}

impl EventRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener; returns its subscription id.
    ///
    /// `once` listeners are removed after their first invocation.
    pub fn subscribe(&mut self, event: &str, once: bool, listener: Listener) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        self.listeners.entry(event.to_string()).or_default().push(Entry {
            id,
            once,
            listener,
        });
        id
    }

    /// Remove one listener. Unknown ids are ignored.
    pub fn unsubscribe(&mut self, event: &str, id: u64) {
        if let Some(entries) = self.listeners.get_mut(event) {
            entries.retain(|e| e.id != id);
        }
    }

    /// Invoke every listener of `event` in subscription order.
    pub fn emit(&mut self, event: &str, payload: &Value) {
        if let Some(entries) = self.listeners.get_mut(event) {
            for entry in entries.iter_mut() {
                (entry.listener)(payload);
            }
            entries.retain(|e| !e.once);
        }
    }

    /// Invoke exactly one listener by id (used to replay the buffered
    /// `authenticated` event to a late subscriber).
    pub fn emit_to(&mut self, event: &str, id: u64, payload: &Value) {
        if let Some(entries) = self.listeners.get_mut(event) {
            if let Some(entry) = entries.iter_mut().find(|e| e.id == id) {
                (entry.listener)(payload);
                if entry.once {
                    let id = entry.id;
                    entries.retain(|e| e.id != id);
                }
            }
        }
    }

    /// Number of listeners registered for `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.get(event).map_or(0, Vec::len)
    }
}
