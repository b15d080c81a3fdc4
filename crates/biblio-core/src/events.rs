//! Change notifications
//!
//! `ChangeBus` is an explicit publish/subscribe object handed to whoever
//! needs it. Stores never see it; `Notifying<D>` wraps any `Dao<R>` and
//! publishes after each mutation that succeeded.
//!
//! ```ignore
//! let bus = ChangeBus::new();
//! let rx = bus.subscribe();
//! let books = Notifying::new(RecordStore::<Book>::open("data"), bus.clone());
//!
//! books.add(&mut Book::new("978-1", "X"));
//! assert_eq!(rx.recv()?.change, Change::Created(1));
//! ```

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::codec::Record;
use crate::dao::Dao;

/// What happened to a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Created(i64),
    Updated(i64),
    Deleted(i64),
}

impl Change {
    pub fn id(&self) -> i64 {
        match *self {
            Change::Created(id) | Change::Updated(id) | Change::Deleted(id) => id,
        }
    }
}

/// A change to one record of one kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// The record kind (`Record::KIND`)
    pub kind: &'static str,
    pub change: Change,
}

/// Fan-out of change events to any number of subscribers
///
/// Clones share the same subscriber list. Subscribers whose receiver was
/// dropped are pruned on the next publish.
#[derive(Clone, Default)]
pub struct ChangeBus {
    subscribers: Arc<Mutex<Vec<Sender<ChangeEvent>>>>,
}

impl ChangeBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber
    pub fn subscribe(&self) -> Receiver<ChangeEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Deliver `event` to every live subscriber, returning how many got it
    pub fn publish(&self, event: ChangeEvent) -> usize {
        trace!(kind = event.kind, change = ?event.change, "Publishing change");
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        subscribers.len()
    }
}

/// A DAO that reports its successful mutations on a `ChangeBus`
///
/// Mutations through the wrapper are serialized, so the created/updated
/// classification of an add matches what the add actually did.
pub struct Notifying<D> {
    inner: D,
    bus: ChangeBus,
    write_lock: Mutex<()>,
}

impl<D> Notifying<D> {
    pub fn new(inner: D, bus: ChangeBus) -> Self {
        Self {
            inner,
            bus,
            write_lock: Mutex::new(()),
        }
    }

    fn emit<R: Record>(&self, change: Change) {
        self.bus.publish(ChangeEvent {
            kind: R::KIND,
            change,
        });
    }
}

impl<R: Record, D: Dao<R>> Dao<R> for Notifying<D> {
    fn list_all(&self) -> Vec<R> {
        self.inner.list_all()
    }

    fn add(&self, record: &mut R) -> bool {
        let _guard = self.write_lock.lock();

        // A natural-key match turns the create into an update
        let existed = record.natural_key().is_some_and(|key| {
            self.inner
                .list_all()
                .iter()
                .any(|r| r.natural_key() == Some(key))
        });

        if !self.inner.add(record) {
            return false;
        }
        if let Some(id) = record.id() {
            let change = if existed {
                Change::Updated(id)
            } else {
                Change::Created(id)
            };
            self.emit::<R>(change);
        }
        true
    }

    fn update(&self, record: &R) -> bool {
        let _guard = self.write_lock.lock();
        let updated = self.inner.update(record);
        if let (true, Some(id)) = (updated, record.id()) {
            self.emit::<R>(Change::Updated(id));
        }
        updated
    }

    fn remove(&self, id: i64) -> bool {
        let _guard = self.write_lock.lock();
        let removed = self.inner.remove(id);
        if removed {
            self.emit::<R>(Change::Deleted(id));
        }
        removed
    }

    fn modify(&self, id: i64, edit: &mut dyn FnMut(&mut R) -> bool) -> bool {
        let _guard = self.write_lock.lock();
        let modified = self.inner.modify(id, edit);
        if modified {
            self.emit::<R>(Change::Updated(id));
        }
        modified
    }

    fn get(&self, id: i64) -> Option<R> {
        self.inner.get(id)
    }

    fn last_save_failed(&self) -> bool {
        self.inner.last_save_failed()
    }
}
