//! Change notification for store observers.
//!
//! Observers subscribe with the URI they care about and receive a
//! [`ChangeEvent`] whenever a mutation touches that collection. Events are
//! delivered only after the mutation is durable; a batch notifies once, after
//! commit.

use crate::uri::ResourceUri;
use crossbeam::channel::{unbounded, Receiver, Sender};
use std::sync::{Mutex, PoisonError};

/// A committed change to the collection named by `uri`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// The affected URI as addressed by the mutation (item or collection).
    pub uri: ResourceUri,
}

struct Subscription {
    watched: ResourceUri,
    tx: Sender<ChangeEvent>,
}

/// Publish/subscribe registry keyed by resource URI.
#[derive(Default)]
pub struct ChangeNotifier {
    subscriptions: Mutex<Vec<Subscription>>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer for `uri`'s collection.
    ///
    /// A subscriber watching a collection URI sees every change to that
    /// collection, including item-addressed ones.
    pub fn subscribe(&self, uri: &ResourceUri) -> Receiver<ChangeEvent> {
        let (tx, rx) = unbounded();
        self.lock().push(Subscription {
            watched: uri.clone(),
            tx,
        });
        rx
    }

    /// Deliver `uris` to every matching subscriber, pruning closed channels.
    pub fn notify(&self, uris: &[ResourceUri]) {
        let mut subscriptions = self.lock();
        subscriptions.retain(|subscription| {
            for uri in uris {
                if subscription.watched.collection == uri.collection {
                    if subscription.tx.send(ChangeEvent { uri: uri.clone() }).is_err() {
                        return false;
                    }
                }
            }
            true
        });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Subscription>> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
