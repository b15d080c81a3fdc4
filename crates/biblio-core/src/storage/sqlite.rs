//! Relational backend
//!
//! `SqliteDao<R>` keeps the same contract as the flat-file store (natural-key
//! create-as-update, ascending ids that are never reused, boolean results)
//! on top of a single SQLite table. Each row holds the record's encoded blob,
//! so the codec stays the only place that knows an entity's fields.

use std::marker::PhantomData;
use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use tracing::{debug, warn};

use crate::codec::{self, Record};
use crate::dao::Dao;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::schema::{init_schema, needs_init};

/// SQLite-backed DAO for one entity kind
pub struct SqliteDao<R> {
    conn: Mutex<Connection>,
    _kind: PhantomData<fn() -> R>,
}

impl<R: Record> SqliteDao<R> {
    /// Open or create the database at `path`
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StorageError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StorageResult<Self> {
        if needs_init(&conn) {
            init_schema(&conn)?;
        }
        Ok(Self {
            conn: Mutex::new(conn),
            _kind: PhantomData,
        })
    }

    fn try_list(&self) -> rusqlite::Result<Vec<R>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT body FROM records WHERE kind = ?1 ORDER BY rowid")?;
        let bodies = stmt.query_map([R::KIND], |row| row.get::<_, String>(0))?;

        let mut records = Vec::new();
        for body in bodies {
            match codec::decode::<R>(&body?) {
                Ok(record) => records.push(record),
                Err(e) => warn!(kind = R::KIND, "Skipping unreadable row: {}", e),
            }
        }
        R::sort_for_listing(&mut records);
        Ok(records)
    }

    fn try_get(&self, id: i64) -> rusqlite::Result<Option<R>> {
        let conn = self.conn.lock();
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM records WHERE kind = ?1 AND id = ?2",
                params![R::KIND, id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(body.and_then(|b| codec::decode(&b).ok()))
    }

    fn try_add(&self, record: &mut R) -> rusqlite::Result<bool> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let key = record.natural_key().map(str::to_owned);
        if let Some(key) = &key {
            let existing: Option<i64> = tx
                .query_row(
                    "SELECT id FROM records WHERE kind = ?1 AND natural_key = ?2",
                    params![R::KIND, key],
                    |row| row.get(0),
                )
                .optional()?;

            if let Some(id) = existing {
                let mut stored = record.clone();
                stored.set_id(id);
                write_row(&tx, &stored, false)?;
                tx.commit()?;
                record.set_id(id);
                debug!(kind = R::KIND, id, "Create matched natural key, updated");
                return Ok(true);
            }
        }

        let id = match record.id() {
            Some(id) if id <= 0 => return Ok(false),
            Some(id) => {
                if row_exists(&tx, R::KIND, id)? {
                    return Ok(false);
                }
                id
            }
            None => next_id(&tx, R::KIND)?,
        };
        let Some(watermark) = id.checked_add(1) else {
            debug!(kind = R::KIND, id, "Rejected create with id at the top of the range");
            return Ok(false);
        };

        let mut stored = record.clone();
        stored.set_id(id);
        write_row(&tx, &stored, true)?;
        tx.execute(
            "INSERT INTO id_watermarks (kind, next_id) VALUES (?1, ?2)
             ON CONFLICT(kind) DO UPDATE SET next_id = MAX(next_id, excluded.next_id)",
            params![R::KIND, watermark],
        )?;
        tx.commit()?;

        record.set_id(id);
        Ok(true)
    }

    fn try_update(&self, record: &R) -> rusqlite::Result<bool> {
        let Some(id) = record.id() else {
            return Ok(false);
        };
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE records SET natural_key = ?3, body = ?4 WHERE kind = ?1 AND id = ?2",
            params![R::KIND, id, record.natural_key(), codec::encode(record)],
        )?;
        Ok(changed > 0)
    }

    fn try_modify(
        &self,
        id: i64,
        edit: &mut dyn FnMut(&mut R) -> bool,
    ) -> rusqlite::Result<bool> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let body: Option<String> = tx
            .query_row(
                "SELECT body FROM records WHERE kind = ?1 AND id = ?2",
                params![R::KIND, id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(mut record) = body.and_then(|b| codec::decode::<R>(&b).ok()) else {
            return Ok(false);
        };

        if !edit(&mut record) {
            return Ok(false);
        }
        record.set_id(id);
        write_row(&tx, &record, false)?;
        tx.commit()?;
        Ok(true)
    }

    fn try_remove(&self, id: i64) -> rusqlite::Result<bool> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "DELETE FROM records WHERE kind = ?1 AND id = ?2",
            params![R::KIND, id],
        )?;
        Ok(changed > 0)
    }
}

/// Insert a new row or overwrite the existing one for the record's id
fn write_row<R: Record>(tx: &Transaction<'_>, record: &R, insert: bool) -> rusqlite::Result<()> {
    let sql = if insert {
        "INSERT INTO records (kind, id, natural_key, body) VALUES (?1, ?2, ?3, ?4)"
    } else {
        "UPDATE records SET natural_key = ?3, body = ?4 WHERE kind = ?1 AND id = ?2"
    };
    tx.execute(
        sql,
        params![R::KIND, record.id(), record.natural_key(), codec::encode(record)],
    )?;
    Ok(())
}

fn row_exists(tx: &Transaction<'_>, kind: &str, id: i64) -> rusqlite::Result<bool> {
    tx.prepare("SELECT 1 FROM records WHERE kind = ?1 AND id = ?2")?
        .exists(params![kind, id])
}

/// Next id for `kind`: past both the stored watermark and the highest row
fn next_id(tx: &Transaction<'_>, kind: &str) -> rusqlite::Result<i64> {
    tx.query_row(
        "SELECT MAX(
            COALESCE((SELECT next_id FROM id_watermarks WHERE kind = ?1), 1),
            COALESCE((SELECT MAX(id) FROM records WHERE kind = ?1), 0) + 1
        )",
        [kind],
        |row| row.get(0),
    )
}

impl<R: Record> Dao<R> for SqliteDao<R> {
    fn list_all(&self) -> Vec<R> {
        self.try_list().unwrap_or_else(|e| {
            warn!(kind = R::KIND, "Failed to list records: {}", e);
            Vec::new()
        })
    }

    fn add(&self, record: &mut R) -> bool {
        self.try_add(record).unwrap_or_else(|e| {
            warn!(kind = R::KIND, "Failed to add record: {}", e);
            false
        })
    }

    fn update(&self, record: &R) -> bool {
        self.try_update(record).unwrap_or_else(|e| {
            warn!(kind = R::KIND, "Failed to update record: {}", e);
            false
        })
    }

    fn modify(&self, id: i64, edit: &mut dyn FnMut(&mut R) -> bool) -> bool {
        self.try_modify(id, edit).unwrap_or_else(|e| {
            warn!(kind = R::KIND, id, "Failed to modify record: {}", e);
            false
        })
    }

    fn remove(&self, id: i64) -> bool {
        self.try_remove(id).unwrap_or_else(|e| {
            warn!(kind = R::KIND, id, "Failed to remove record: {}", e);
            false
        })
    }

    fn get(&self, id: i64) -> Option<R> {
        self.try_get(id).unwrap_or_else(|e| {
            warn!(kind = R::KIND, id, "Failed to read record: {}", e);
            None
        })
    }
}
