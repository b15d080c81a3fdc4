//! Library facade
//!
//! Builds the three DAOs (books, users, loans) for the configured backend
//! and hands them out as trait objects, so callers never care where the
//! records live.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::codec::Record;
use crate::config::{Backend, Config};
use crate::dao::{Dao, LoanQueries};
use crate::events::{ChangeBus, Notifying};
use crate::models::{Book, Loan, User};
use crate::storage::SqliteDao;
use crate::store::RecordStore;

/// Record counts and health of the open library
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LibraryStats {
    pub backend: Backend,
    pub books: usize,
    pub users: usize,
    pub loans: usize,
    pub open_loans: usize,
    /// Kinds whose most recent write did not reach disk
    pub save_failures: Vec<&'static str>,
}

/// Entry point for the book, user and loan collections
pub struct Library {
    config: Config,
    books: Box<dyn Dao<Book>>,
    users: Box<dyn Dao<User>>,
    loans: Box<dyn Dao<Loan>>,
}

impl Library {
    /// Open with configuration from the default location and environment
    pub fn open() -> Result<Self> {
        Self::open_with_config(Config::load()?)
    }

    /// Open the collections described by `config`
    pub fn open_with_config(config: Config) -> Result<Self> {
        Self::build(config, None)
    }

    /// Like `open_with_config`, publishing every change on `bus`
    pub fn with_bus(config: Config, bus: ChangeBus) -> Result<Self> {
        Self::build(config, Some(bus))
    }

    fn build(config: Config, bus: Option<ChangeBus>) -> Result<Self> {
        config.ensure_data_dir()?;

        let library = match config.backend {
            Backend::File => Self {
                books: wrap(open_file::<Book>(&config), &bus),
                users: wrap(open_file::<User>(&config), &bus),
                loans: wrap(open_file::<Loan>(&config), &bus),
                config,
            },
            Backend::Sqlite => {
                let path = config.sqlite_path();
                Self {
                    books: wrap(open_sqlite::<Book>(&path)?, &bus),
                    users: wrap(open_sqlite::<User>(&path)?, &bus),
                    loans: wrap(open_sqlite::<Loan>(&path)?, &bus),
                    config,
                }
            }
        };

        info!(
            backend = %library.config.backend,
            data_dir = ?library.config.data_dir,
            "Library opened"
        );
        Ok(library)
    }

    pub fn books(&self) -> &dyn Dao<Book> {
        self.books.as_ref()
    }

    pub fn users(&self) -> &dyn Dao<User> {
        self.users.as_ref()
    }

    pub fn loans(&self) -> &dyn Dao<Loan> {
        self.loans.as_ref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn stats(&self) -> LibraryStats {
        let loans = self.loans.list_all();
        let open_loans = loans.iter().filter(|l| l.is_open()).count();

        let save_failures = [
            (Book::KIND, self.books.last_save_failed()),
            (User::KIND, self.users.last_save_failed()),
            (Loan::KIND, self.loans.last_save_failed()),
        ]
        .into_iter()
        .filter_map(|(kind, failed)| failed.then_some(kind))
        .collect();

        LibraryStats {
            backend: self.config.backend,
            books: self.books.list_all().len(),
            users: self.users.list_all().len(),
            loans: loans.len(),
            open_loans,
            save_failures,
        }
    }

    /// Copies of a book not currently out on loan
    ///
    /// A book without a copy count is treated as a single copy.
    pub fn available_copies(&self, book: &Book) -> i64 {
        let Some(id) = book.id else {
            return 0;
        };
        let out = self.loans.loans_for_book(id).iter().filter(|l| l.is_open()).count();
        book.copie.unwrap_or(1) - out as i64
    }
}

fn open_file<R: Record>(config: &Config) -> RecordStore<R> {
    RecordStore::open_path(config.collection_path::<R>())
}

fn open_sqlite<R: Record>(path: &Path) -> Result<SqliteDao<R>> {
    SqliteDao::open(path).with_context(|| format!("Failed to open database: {:?}", path))
}

fn wrap<R, D>(dao: D, bus: &Option<ChangeBus>) -> Box<dyn Dao<R>>
where
    R: Record,
    D: Dao<R> + 'static,
{
    match bus {
        Some(bus) => Box::new(Notifying::new(dao, bus.clone())),
        None => Box::new(dao),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::{BookQueries, UserCredentials};
    use crate::events::Change;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn config_for(temp_dir: &TempDir, backend: Backend) -> Config {
        Config {
            data_dir: temp_dir.path().join("data"),
            backend,
            ..Config::default()
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn exercise(library: &Library) {
        let mut book = Book::new("978-1", "Il nome della rosa").with_copie(2);
        let mut user = User::new("Anna", "Rossi").with_credentials("arossi", "h1");
        assert!(library.books().add(&mut book));
        assert!(library.users().add(&mut user));

        let mut loan = Loan::new(book.id.unwrap(), user.id.unwrap(), date(2024, 3, 1));
        assert!(library.loans().add(&mut loan));

        assert_eq!(library.books().find_by_isbn("978-1"), Some(book.clone()));
        assert!(library.users().verify_credentials("arossi", "h1").is_some());
        assert_eq!(library.available_copies(&book), 1);

        let stats = library.stats();
        assert_eq!((stats.books, stats.users, stats.loans), (1, 1, 1));
        assert_eq!(stats.open_loans, 1);
        assert!(stats.save_failures.is_empty());

        assert!(library.loans().return_loan(1, date(2024, 3, 10)));
        assert_eq!(library.stats().open_loans, 0);
        assert_eq!(library.available_copies(&book), 2);
    }

    #[test]
    fn test_file_backend() {
        let temp_dir = TempDir::new().unwrap();
        let library = Library::open_with_config(config_for(&temp_dir, Backend::File)).unwrap();

        exercise(&library);

        let data_dir = temp_dir.path().join("data");
        assert!(data_dir.join("books.json").exists());
        assert!(data_dir.join("users.json").exists());
        assert!(data_dir.join("loans.json").exists());
    }

    #[test]
    fn test_sqlite_backend() {
        let temp_dir = TempDir::new().unwrap();
        let library = Library::open_with_config(config_for(&temp_dir, Backend::Sqlite)).unwrap();

        exercise(&library);

        let data_dir = temp_dir.path().join("data");
        assert!(data_dir.join("biblio.db").exists());
        assert!(!data_dir.join("books.json").exists());
    }

    #[test]
    fn test_reopen_sees_saved_records() {
        let temp_dir = TempDir::new().unwrap();
        for backend in [Backend::File, Backend::Sqlite] {
            {
                let library = Library::open_with_config(config_for(&temp_dir, backend)).unwrap();
                library.books().add(&mut Book::new("978-9", "Baudolino"));
            }
            let library = Library::open_with_config(config_for(&temp_dir, backend)).unwrap();
            assert_eq!(library.books().list_all().len(), 1);
        }
    }

    #[test]
    fn test_with_bus_publishes_changes() {
        let temp_dir = TempDir::new().unwrap();
        let bus = ChangeBus::new();
        let rx = bus.subscribe();
        let library = Library::with_bus(config_for(&temp_dir, Backend::File), bus).unwrap();

        library.users().add(&mut User::new("Anna", "Rossi"));
        library.users().remove(1);

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, "user");
        assert_eq!(events[1].change, Change::Deleted(1));
    }

    #[test]
    fn test_available_copies_defaults_to_one() {
        let temp_dir = TempDir::new().unwrap();
        let library = Library::open_with_config(config_for(&temp_dir, Backend::File)).unwrap();

        let mut book = Book::new("978-2", "Senza copie");
        assert_eq!(library.available_copies(&book), 0);

        library.books().add(&mut book);
        assert_eq!(library.available_copies(&book), 1);
    }
}
