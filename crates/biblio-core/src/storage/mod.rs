//! Storage layer
//!
//! Two durable backends sit behind the same `Dao` contract.
//!
//! ## Architecture
//!
//! - **Flat files**: one JSON array per entity kind, rewritten whole after
//!   every mutation (see `io` and `crate::store`)
//! - **SQLite**: one shared table holding each record's encoded blob

pub mod error;
pub mod io;
pub mod schema;
pub mod sqlite;

pub use error::{StorageError, StorageResult};
pub use schema::{init_schema, needs_init, SCHEMA_VERSION};
pub use sqlite::SqliteDao;
