//! In-flight Lookups
//!
//! Per-key coalescing of concurrent store lookups. The first caller for a key
//! leads: it runs the lookup and publishes the outcome. Callers arriving while
//! the lead is in progress follow and receive that same outcome, found,
//! absent or failed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;

struct Slot<T> {
    generation: u64,
    outcome: watch::Receiver<Option<T>>,
}

struct Table<T> {
    next_generation: u64,
    slots: HashMap<String, Slot<T>>,
}

/// Table of keys with a store lookup in progress.
pub struct InFlightLookups<T> {
    table: Arc<Mutex<Table<T>>>,
}

impl<T> Default for InFlightLookups<T> {
    fn default() -> Self {
        Self {
            table: Arc::new(Mutex::new(Table {
                next_generation: 0,
                slots: HashMap::new(),
            })),
        }
    }
}

/// Role of a caller in the lookup for one key.
pub enum Flight<T> {
    /// No lookup was running; this caller runs it
    Leader(FlightGuard<T>),
    /// A lookup was running; this caller waits for its outcome
    Follower(FlightWaiter<T>),
}

impl<T: Clone> InFlightLookups<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(table: &Mutex<Table<T>>) -> MutexGuard<'_, Table<T>> {
        table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Joins the lookup in progress for `key`, or starts one.
    pub fn join(&self, key: &str) -> Flight<T> {
        let mut table = Self::lock(&self.table);
        if let Some(slot) = table.slots.get(key) {
            return Flight::Follower(FlightWaiter {
                outcome: slot.outcome.clone(),
            });
        }

        let (sender, receiver) = watch::channel(None);
        let generation = table.next_generation;
        table.next_generation += 1;
        table.slots.insert(
            key.to_string(),
            Slot {
                generation,
                outcome: receiver,
            },
        );

        Flight::Leader(FlightGuard {
            key: key.to_string(),
            generation,
            sender,
            table: Arc::clone(&self.table),
        })
    }

    /// Number of keys currently tracked.
    pub fn in_flight(&self) -> usize {
        Self::lock(&self.table).slots.len()
    }
}

/// Held by the leader of a key until its lookup is done.
pub struct FlightGuard<T> {
    key: String,
    generation: u64,
    sender: watch::Sender<Option<T>>,
    table: Arc<Mutex<Table<T>>>,
}

impl<T> FlightGuard<T> {
    /// Hands `outcome` to every follower, present and future, of this lookup.
    pub fn publish(&self, outcome: T) {
        self.sender.send_replace(Some(outcome));
    }
}

impl<T> Drop for FlightGuard<T> {
    fn drop(&mut self) {
        let mut table = self
            .table
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if table
            .slots
            .get(&self.key)
            .is_some_and(|slot| slot.generation == self.generation)
        {
            table.slots.remove(&self.key);
        }
    }
}

/// Follower side of a lookup.
pub struct FlightWaiter<T> {
    outcome: watch::Receiver<Option<T>>,
}

impl<T: Clone> FlightWaiter<T> {
    /// Waits for the leader's outcome.
    ///
    /// Returns `None` when the leader went away without publishing.
    pub async fn outcome(mut self) -> Option<T> {
        self.outcome
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|published| published.clone())
    }
}
