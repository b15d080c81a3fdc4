//! File-backed record store
//!
//! A `RecordStore<R>` owns the in-memory cache of one entity kind and the
//! file that mirrors it (`<data_dir>/<R::FILE_NAME>`).
//!
//! ## Lifecycle
//!
//! - `open` reads the file once. Unreadable records are skipped, and the
//!   next id is set to one past the highest id found.
//! - Every successful `create`, `update` or `delete` rewrites the whole file
//!   from the cache. Nothing is written before the first mutation.
//! - A failed write is logged and recorded in `last_save_failed()`; the
//!   cache stays authoritative for the rest of the process.
//!
//! All operations, including the initial load and the file rewrite that
//! follows a mutation, run under one lock per store.
//!
//! ## Usage
//!
//! ```ignore
//! let books: RecordStore<Book> = RecordStore::open("data");
//!
//! let mut book = Book::new("978-1", "X");
//! assert!(books.create(&mut book));
//! assert_eq!(book.id, Some(1));
//! ```

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::codec::{self, Record};
use crate::storage::io;

/// Cache and bookkeeping guarded by the store lock
struct State<R> {
    records: Vec<R>,
    /// Next id to assign; never decreases
    next_id: i64,
    last_save_failed: bool,
}

impl<R: Record> State<R> {
    fn position(&self, id: i64) -> Option<usize> {
        self.records.iter().position(|r| r.id() == Some(id))
    }
}

/// File-backed store for one entity kind
pub struct RecordStore<R: Record> {
    path: PathBuf,
    state: Mutex<State<R>>,
}

impl<R: Record> RecordStore<R> {
    /// Open the store for `R` inside `data_dir`
    pub fn open(data_dir: impl AsRef<Path>) -> Self {
        Self::open_path(data_dir.as_ref().join(R::FILE_NAME))
    }

    /// Open the store backed by an explicit file
    pub fn open_path(path: impl Into<PathBuf>) -> Self {
        let store = Self {
            path: path.into(),
            state: Mutex::new(State {
                records: Vec::new(),
                next_id: 1,
                last_save_failed: false,
            }),
        };
        store.load();
        store
    }

    fn load(&self) {
        let mut state = self.state.lock();

        let text = io::read_all(&self.path);
        let mut records: Vec<R> = codec::decode_collection(&text);
        records.retain(|r| {
            let has_successor = r.id().and_then(|id| id.checked_add(1)).is_some();
            if !has_successor {
                warn!(
                    kind = R::KIND,
                    id = ?r.id(),
                    "Skipping record with id at the top of the range"
                );
            }
            has_successor
        });

        // every kept id has room for a successor
        state.next_id = records
            .iter()
            .filter_map(Record::id)
            .max()
            .map_or(1, |max| max + 1);
        state.records = records;

        debug!(
            kind = R::KIND,
            count = state.records.len(),
            next_id = state.next_id,
            "Loaded records from {:?}",
            self.path
        );
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All records, in insertion order unless the kind defines its own
    pub fn list(&self) -> Vec<R> {
        let mut records = self.state.lock().records.clone();
        R::sort_for_listing(&mut records);
        records
    }

    /// Record with the given id
    pub fn get(&self, id: i64) -> Option<R> {
        let state = self.state.lock();
        state.position(id).map(|pos| state.records[pos].clone())
    }

    /// Records matching `predicate`, in insertion order
    pub fn find<F>(&self, predicate: F) -> Vec<R>
    where
        F: Fn(&R) -> bool,
    {
        self.state
            .lock()
            .records
            .iter()
            .filter(|r| predicate(*r))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the most recent write to disk failed
    pub fn last_save_failed(&self) -> bool {
        self.state.lock().last_save_failed
    }

    /// Add a record
    ///
    /// If the kind has a natural key and a record with the same key exists,
    /// that record is replaced instead and keeps its id. Otherwise an unset
    /// id is assigned from the watermark, and an explicit id must be positive
    /// and unused. The final id is written back into `record`.
    pub fn create(&self, record: &mut R) -> bool {
        let mut state = self.state.lock();

        let existing = record.natural_key().and_then(|key| {
            state
                .records
                .iter()
                .position(|r| r.natural_key() == Some(key))
        });

        if let Some(pos) = existing {
            if let Some(id) = state.records[pos].id() {
                record.set_id(id);
            }
            state.records[pos] = record.clone();
            debug!(kind = R::KIND, id = ?record.id(), "Create matched natural key, updated");
            self.persist(&mut state);
            return true;
        }

        match record.id() {
            Some(id) if id <= 0 => {
                debug!(kind = R::KIND, id, "Rejected create with non-positive id");
                return false;
            }
            Some(id) if state.position(id).is_some() => {
                debug!(kind = R::KIND, id, "Rejected create with duplicate id");
                return false;
            }
            Some(id) => match id.checked_add(1) {
                Some(next) => state.next_id = state.next_id.max(next),
                None => {
                    debug!(kind = R::KIND, id, "Rejected create with id at the top of the range");
                    return false;
                }
            },
            None => {
                let Some(next) = state.next_id.checked_add(1) else {
                    warn!(kind = R::KIND, "No ids left to assign");
                    return false;
                };
                record.set_id(state.next_id);
                state.next_id = next;
            }
        }

        state.records.push(record.clone());
        self.persist(&mut state);
        true
    }

    /// Replace the record with the same id
    ///
    /// Fails without touching the cache or the file if `record` has no id or
    /// the id is unknown.
    pub fn update(&self, record: &R) -> bool {
        let Some(id) = record.id() else {
            return false;
        };

        let mut state = self.state.lock();
        let Some(pos) = state.position(id) else {
            debug!(kind = R::KIND, id, "Update of unknown id");
            return false;
        };

        state.records[pos] = record.clone();
        self.persist(&mut state);
        true
    }

    /// Read, edit and write back the record with the given id in one step
    ///
    /// `edit` works on a copy and returns whether to keep its changes; when
    /// it returns false nothing is stored. The id cannot be changed by `edit`.
    pub fn modify<F>(&self, id: i64, edit: F) -> bool
    where
        F: FnOnce(&mut R) -> bool,
    {
        let mut state = self.state.lock();
        let Some(pos) = state.position(id) else {
            return false;
        };

        let mut record = state.records[pos].clone();
        if !edit(&mut record) {
            return false;
        }
        record.set_id(id);
        state.records[pos] = record;
        self.persist(&mut state);
        true
    }

    /// Remove the record with the given id
    pub fn delete(&self, id: i64) -> bool {
        let mut state = self.state.lock();
        let Some(pos) = state.position(id) else {
            return false;
        };

        state.records.remove(pos);
        self.persist(&mut state);
        true
    }

    /// Rewrite the backing file from the cache
    fn persist(&self, state: &mut State<R>) {
        let text = codec::encode_collection(&state.records);
        match io::write_all(&self.path, &text) {
            Ok(()) => state.last_save_failed = false,
            Err(e) => {
                warn!(
                    kind = R::KIND,
                    count = state.records.len(),
                    "Failed to save records, keeping them in memory: {}",
                    e
                );
                state.last_save_failed = true;
            }
        }
    }
}
