use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use tokio::sync::mpsc::{UnboundedSender, unbounded_channel};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, warn};

/// One message pushed to a client over its live channel.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    /// Marker emitted immediately after a channel opens.
    Connected,
    /// One incremental piece of generated text.
    Fragment { text: String },
    /// Terminal error payload, rendered differently by clients.
    Error { message: String },
}

/// Process-wide map from owner identity to an open push channel.
///
/// The registry is the only cross-request shared mutable state in the core.
/// Locking is per key: operations on different owners never contend, and
/// lookup+mutate for one owner is atomic with respect to other operations
/// on that owner. Construct one per process and inject it; there is no
/// ambient singleton.
///
/// ```
/// use reverie::SessionRegistry;
///
/// let registry = SessionRegistry::new();
/// assert!(!registry.send("u1", "hello")); // no session yet
/// ```
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, UnboundedSender<SessionEvent>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a push channel for `owner_id` and returns the receiving
    /// stream. Any previous session for the same owner is silently
    /// replaced; its receiver sees end-of-stream once drained. The new
    /// channel carries an immediate [`SessionEvent::Connected`] marker.
    pub fn open(&self, owner_id: &str) -> UnboundedReceiverStream<SessionEvent> {
        let (tx, rx) = unbounded_channel();
        let _ = tx.send(SessionEvent::Connected);
        if self.sessions.insert(owner_id.to_string(), tx).is_some() {
            debug!(%owner_id, "replaced existing streaming session");
        } else {
            debug!(%owner_id, "streaming session opened");
        }
        UnboundedReceiverStream::new(rx)
    }

    /// Delivers a text fragment to the owner's session. Returns whether a
    /// session existed and accepted the write. A session whose receiver is
    /// gone is removed as a side effect.
    pub fn send(&self, owner_id: &str, fragment: &str) -> bool {
        self.dispatch(
            owner_id,
            SessionEvent::Fragment {
                text: fragment.to_string(),
            },
        )
    }

    /// Delivers a terminal error payload with the same lookup and cleanup
    /// discipline as [`send`](Self::send).
    pub fn send_error(&self, owner_id: &str, message: &str) -> bool {
        self.dispatch(
            owner_id,
            SessionEvent::Error {
                message: message.to_string(),
            },
        )
    }

    /// Removes the owner's session, dropping the sender. Idempotent.
    pub fn close(&self, owner_id: &str) {
        if self.sessions.remove(owner_id).is_some() {
            debug!(%owner_id, "streaming session closed");
        }
    }

    /// Whether a session is currently registered for `owner_id`.
    pub fn is_open(&self, owner_id: &str) -> bool {
        self.sessions.contains_key(owner_id)
    }

    // The entry guard keeps lookup and removal atomic per key.
    fn dispatch(&self, owner_id: &str, event: SessionEvent) -> bool {
        match self.sessions.entry(owner_id.to_string()) {
            Entry::Occupied(occupied) => {
                if occupied.get().send(event).is_err() {
                    occupied.remove();
                    warn!(%owner_id, "session receiver gone, removing session");
                    false
                } else {
                    true
                }
            }
            Entry::Vacant(_) => {
                debug!(%owner_id, "no streaming session for owner");
                false
            }
        }
    }
}
