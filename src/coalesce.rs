//! Single-flight cache and task queue
//!
//! One coalescer owns both the per-identifier cache and the per-identifier
//! waiter queues behind a single mutex, so "check cache, check queue, append,
//! or launch" is one atomic transition. No await point ever occurs under the
//! lock; two callers can therefore never both observe an identifier as unseen
//! and launch duplicate flights.
//!
//! Per-identifier state machine:
//! - Unseen: no cache entry, no waiter queue.
//! - InFlight: waiter queue present; the first arrival installs a one-element
//!   queue and becomes the leader, later arrivals append and wait.
//! - Resolved / Failed: terminal cache entries. Failed is sticky; it is never
//!   retried within this instance's lifetime.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use tokio::sync::oneshot;
use tracing::debug;

use crate::error::ApertureError;

/// Outcome delivered to every waiter of one in-flight episode
pub(crate) type Outcome<T> = Result<T, ApertureError>;

/// What a caller learned, atomically, on arrival
pub(crate) enum Claim<T> {
    /// Terminal success; the cached value, immediately
    Resolved(T),
    /// Terminal failure; reject immediately, no retry
    Failed,
    /// A flight is already running; await the attached receiver
    Joined(oneshot::Receiver<Outcome<T>>),
    /// This caller installed the queue and must launch the pipeline; its own
    /// receiver is first in arrival order
    Lead(oneshot::Receiver<Outcome<T>>),
}

struct State<T> {
    cache: HashMap<String, Entry<T>>,
    waiters: HashMap<String, Vec<oneshot::Sender<Outcome<T>>>>,
}

enum Entry<T> {
    Resolved(T),
    Failed,
}

/// The coalescer: at most one fetch pipeline in flight per identifier, and
/// exactly one resolution delivered to every waiter.
pub(crate) struct SingleFlight<T> {
    state: Mutex<State<T>>,
}

impl<T: Clone> SingleFlight<T> {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(State {
                cache: HashMap::new(),
                waiters: HashMap::new(),
            }),
        }
    }

    /// Observe-and-transition for an arriving caller. Synchronous: holds the
    /// lock for the whole transition.
    pub(crate) fn claim(&self, id: &str) -> Claim<T> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(entry) = state.cache.get(id) {
            return match entry {
                Entry::Resolved(value) => {
                    debug!(%id, "cache hit");
                    Claim::Resolved(value.clone())
                }
                Entry::Failed => {
                    debug!(%id, "cache hit on terminal failure");
                    Claim::Failed
                }
            };
        }

        let (tx, rx) = oneshot::channel();
        match state.waiters.get_mut(id) {
            Some(queue) => {
                queue.push(tx);
                debug!(%id, waiters = queue.len(), "joined in-flight request");
                Claim::Joined(rx)
            }
            None => {
                state.waiters.insert(id.to_string(), vec![tx]);
                debug!(%id, "launching flight");
                Claim::Lead(rx)
            }
        }
    }

    /// Record the terminal entry for `id`, remove its waiter queue, and
    /// deliver the outcome to every queued waiter in arrival order.
    pub(crate) fn complete(&self, id: &str, outcome: Outcome<T>) {
        let queue = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            let entry = match &outcome {
                Ok(value) => Entry::Resolved(value.clone()),
                Err(_) => Entry::Failed,
            };
            state.cache.insert(id.to_string(), entry);
            // Removing (not emptying) the queue flips arrivals from "join"
            // to "terminal entry" before any waiter is woken.
            state.waiters.remove(id).unwrap_or_default()
        };

        debug!(%id, waiters = queue.len(), ok = outcome.is_ok(), "flight complete");
        for waiter in queue {
            // A waiter may have dropped its receiver; it still counts as
            // notified.
            let _ = waiter.send(outcome.clone());
        }
    }
}
