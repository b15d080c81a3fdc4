//! Data access contract shared by every backend
//!
//! Callers see pass/fail booleans and collections only; no backend lets an
//! error escape. `RecordStore` (flat files) and `SqliteDao` both implement
//! `Dao<R>`, and the per-kind query traits below work on either.

use chrono::NaiveDate;

use crate::codec::Record;
use crate::models::{Book, Loan, User};
use crate::store::RecordStore;

/// CRUD access to one entity kind
pub trait Dao<R: Record>: Send + Sync {
    /// Every record, in the kind's listing order
    fn list_all(&self) -> Vec<R>;

    /// Add a record, writing the assigned id back into it
    fn add(&self, record: &mut R) -> bool;

    /// Replace the record with the same id
    fn update(&self, record: &R) -> bool;

    /// Remove the record with the given id
    fn remove(&self, id: i64) -> bool;

    /// Read, edit and write back one record without another writer in between
    ///
    /// `edit` returns whether to keep its changes. Fails if the id is unknown
    /// or `edit` declines.
    fn modify(&self, id: i64, edit: &mut dyn FnMut(&mut R) -> bool) -> bool;

    fn get(&self, id: i64) -> Option<R> {
        self.list_all().into_iter().find(|r| r.id() == Some(id))
    }

    /// Whether the most recent write to durable storage failed
    fn last_save_failed(&self) -> bool {
        false
    }
}

impl<R: Record> Dao<R> for RecordStore<R> {
    fn list_all(&self) -> Vec<R> {
        self.list()
    }

    fn add(&self, record: &mut R) -> bool {
        self.create(record)
    }

    fn update(&self, record: &R) -> bool {
        RecordStore::update(self, record)
    }

    fn remove(&self, id: i64) -> bool {
        self.delete(id)
    }

    fn modify(&self, id: i64, edit: &mut dyn FnMut(&mut R) -> bool) -> bool {
        RecordStore::modify(self, id, |record| edit(record))
    }

    fn get(&self, id: i64) -> Option<R> {
        RecordStore::get(self, id)
    }

    fn last_save_failed(&self) -> bool {
        RecordStore::last_save_failed(self)
    }
}

impl<R: Record, D: Dao<R> + ?Sized> Dao<R> for Box<D> {
    fn list_all(&self) -> Vec<R> {
        (**self).list_all()
    }

    fn add(&self, record: &mut R) -> bool {
        (**self).add(record)
    }

    fn update(&self, record: &R) -> bool {
        (**self).update(record)
    }

    fn remove(&self, id: i64) -> bool {
        (**self).remove(id)
    }

    fn modify(&self, id: i64, edit: &mut dyn FnMut(&mut R) -> bool) -> bool {
        (**self).modify(id, edit)
    }

    fn get(&self, id: i64) -> Option<R> {
        (**self).get(id)
    }

    fn last_save_failed(&self) -> bool {
        (**self).last_save_failed()
    }
}

/// Catalog lookups
pub trait BookQueries: Dao<Book> {
    fn find_by_isbn(&self, isbn: &str) -> Option<Book> {
        self.list_all()
            .into_iter()
            .find(|b| b.isbn.as_deref() == Some(isbn))
    }

    /// Books whose title or author contains `query`, ignoring case
    fn search(&self, query: &str) -> Vec<Book> {
        let needle = query.to_lowercase();
        let contains = |field: &Option<String>| {
            field
                .as_deref()
                .is_some_and(|v| v.to_lowercase().contains(&needle))
        };
        self.list_all()
            .into_iter()
            .filter(|b| contains(&b.titolo) || contains(&b.autore))
            .collect()
    }
}

impl<D: Dao<Book> + ?Sized> BookQueries for D {}

/// Credential sub-operations on users
///
/// Credentials are opaque strings compared verbatim; producing them (hashing,
/// salting) is up to the caller.
pub trait UserCredentials: Dao<User> {
    fn find_by_username(&self, username: &str) -> Option<User> {
        self.list_all()
            .into_iter()
            .find(|u| u.username.as_deref() == Some(username))
    }

    /// The user whose username and credential both match
    fn verify_credentials(&self, username: &str, credential: &str) -> Option<User> {
        self.find_by_username(username)
            .filter(|u| u.password.as_deref() == Some(credential))
    }

    /// Replace a user's credential
    fn set_credential(&self, id: i64, credential: &str) -> bool {
        self.modify(id, &mut |user| {
            user.password = Some(credential.to_string());
            true
        })
    }
}

impl<D: Dao<User> + ?Sized> UserCredentials for D {}

/// Loan lookups and returns
pub trait LoanQueries: Dao<Loan> {
    fn loans_for_user(&self, user_id: i64) -> Vec<Loan> {
        self.list_all()
            .into_iter()
            .filter(|l| l.id_utente == Some(user_id))
            .collect()
    }

    fn loans_for_book(&self, book_id: i64) -> Vec<Loan> {
        self.list_all()
            .into_iter()
            .filter(|l| l.id_libro == Some(book_id))
            .collect()
    }

    /// Loans whose book has not come back yet
    fn open_loans(&self) -> Vec<Loan> {
        self.list_all().into_iter().filter(Loan::is_open).collect()
    }

    /// Mark a loan as returned on `date`
    ///
    /// Fails if the loan is unknown or already returned.
    fn return_loan(&self, id: i64, date: NaiveDate) -> bool {
        self.modify(id, &mut |loan| {
            if !loan.is_open() {
                return false;
            }
            loan.data_restituzione = Some(date);
            true
        })
    }
}

impl<D: Dao<Loan> + ?Sized> LoanQueries for D {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_record_store_through_boxed_dao() {
        let temp_dir = TempDir::new().unwrap();
        let dao: Box<dyn Dao<Book>> = Box::new(RecordStore::<Book>::open(temp_dir.path()));

        let mut book = Book::new("978-1", "X");
        assert!(dao.add(&mut book));
        assert_eq!(book.id, Some(1));
        assert_eq!(dao.list_all().len(), 1);
        assert_eq!(dao.get(1), Some(book.clone()));

        book.copie = Some(4);
        assert!(dao.update(&book));
        assert!(dao.remove(1));
        assert!(!dao.remove(1));
        assert!(!dao.last_save_failed());
    }

    #[test]
    fn test_book_queries() {
        let temp_dir = TempDir::new().unwrap();
        let books = RecordStore::<Book>::open(temp_dir.path());
        books.add(&mut Book::new("978-1", "Il nome della rosa").with_autore("Umberto Eco"));
        books.add(&mut Book::new("978-2", "Baudolino").with_autore("Umberto Eco"));
        books.add(&mut Book::new("978-3", "Io non ho paura").with_autore("Niccolò Ammaniti"));

        assert_eq!(books.find_by_isbn("978-2").unwrap().id, Some(2));
        assert!(books.find_by_isbn("000").is_none());
        assert_eq!(books.search("eco").len(), 2);
        assert_eq!(books.search("PAURA").len(), 1);
    }

    #[test]
    fn test_user_credentials() {
        let temp_dir = TempDir::new().unwrap();
        let users = RecordStore::<User>::open(temp_dir.path());
        let mut anna = User::new("Anna", "Rossi").with_credentials("arossi", "h1");
        users.add(&mut anna);

        assert_eq!(users.find_by_username("arossi").unwrap().id, anna.id);
        assert!(users.verify_credentials("arossi", "h1").is_some());
        assert!(users.verify_credentials("arossi", "h2").is_none());
        assert!(users.verify_credentials("nessuno", "h1").is_none());

        assert!(users.set_credential(1, "h2"));
        assert!(users.verify_credentials("arossi", "h2").is_some());
        assert!(!users.set_credential(9, "h3"));
    }

    #[test]
    fn test_loan_queries_and_return() {
        let temp_dir = TempDir::new().unwrap();
        let loans = RecordStore::<Loan>::open(temp_dir.path());
        loans.add(&mut Loan::new(1, 10, date(2024, 3, 1)));
        loans.add(&mut Loan::new(2, 10, date(2024, 3, 2)));
        loans.add(&mut Loan::new(1, 11, date(2024, 3, 3)));

        assert_eq!(loans.loans_for_user(10).len(), 2);
        assert_eq!(loans.loans_for_book(1).len(), 2);
        assert_eq!(loans.open_loans().len(), 3);

        assert!(loans.return_loan(1, date(2024, 3, 20)));
        assert!(!loans.return_loan(1, date(2024, 3, 21)));
        assert!(!loans.return_loan(99, date(2024, 3, 21)));

        assert_eq!(loans.open_loans().len(), 2);
        assert_eq!(
            loans.get(1).unwrap().data_restituzione,
            Some(date(2024, 3, 20))
        );
    }

    #[test]
    fn test_concurrent_returns_close_loan_once() {
        let temp_dir = TempDir::new().unwrap();
        let loans = Arc::new(RecordStore::<Loan>::open(temp_dir.path()));
        loans.add(&mut Loan::new(1, 10, date(2024, 3, 1)));

        let handles: Vec<_> = (0..8u32)
            .map(|day| {
                let loans = Arc::clone(&loans);
                thread::spawn(move || loans.return_loan(1, date(2024, 4, day + 1)))
            })
            .collect();
        let returned = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(returned, 1);
        assert!(!loans.get(1).unwrap().is_open());
    }

    #[test]
    fn test_modify_through_boxed_dao() {
        let temp_dir = TempDir::new().unwrap();
        let dao: Box<dyn Dao<Book>> = Box::new(RecordStore::<Book>::open(temp_dir.path()));
        dao.add(&mut Book::new("978-1", "X"));

        assert!(dao.modify(1, &mut |b| {
            b.copie = Some(3);
            true
        }));
        assert!(!dao.modify(1, &mut |b| {
            b.copie = Some(9);
            false
        }));
        assert!(!dao.modify(2, &mut |_| true));
        assert_eq!(dao.get(1).unwrap().copie, Some(3));
    }
}
