//! Biblio Core Library
//!
//! This crate provides the storage layer for Biblio, a small library
//! management system: a catalog of books, its registered users, and the
//! loans that connect them.
//!
//! # Architecture
//!
//! - **Flat files**: each entity kind lives in one JSON array file, read
//!   once at open and rewritten whole after every mutation
//! - **SQLite**: optional backend with the same contract
//!
//! Both backends are reached through the `Dao` trait.
//!
//! # Quick Start
//!
//! ```text
//! let library = Library::open()?;
//!
//! let mut book = Book::new("978-88-452-1234-5", "Il nome della rosa");
//! library.books().add(&mut book);
//!
//! let books = library.books().list_all();
//! ```
//!
//! # Modules
//!
//! - `flatjson`: tokenizer for the record files
//! - `codec`: record ⇄ text conversion
//! - `models`: Book, User and Loan
//! - `store`: file-backed record store
//! - `storage`: file I/O, errors and the SQLite backend
//! - `dao`: backend-neutral access traits
//! - `events`: change notifications
//! - `library`: facade over the three collections
//! - `config`: application configuration

pub mod codec;
pub mod config;
pub mod dao;
pub mod events;
pub mod flatjson;
pub mod library;
pub mod models;
pub mod storage;
pub mod store;

pub use codec::{CodecError, Record};
pub use config::{Backend, Config};
pub use dao::{BookQueries, Dao, LoanQueries, UserCredentials};
pub use events::{Change, ChangeBus, ChangeEvent, Notifying};
pub use library::{Library, LibraryStats};
pub use models::{Book, Loan, User};
pub use storage::{SqliteDao, StorageError};
pub use store::RecordStore;
