//! Data models for Biblio
//!
//! Defines the three entity kinds: Book, User and Loan. Every field apart
//! from the store-assigned `id` is optional, matching what the record files
//! can hold.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::codec::{FieldReader, ObjectWriter, Record};

/// A catalog entry
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    /// Store-assigned identifier
    pub id: Option<i64>,
    /// ISBN, used to detect duplicate catalog entries
    pub isbn: Option<String>,
    /// Title
    pub titolo: Option<String>,
    /// Author
    pub autore: Option<String>,
    /// Publication date
    pub data_pubblicazione: Option<NaiveDate>,
    /// Publisher
    pub casa_editrice: Option<String>,
    /// Number of copies held
    pub copie: Option<i64>,
}

impl Book {
    /// Create a book with an ISBN and a title
    pub fn new(isbn: impl Into<String>, titolo: impl Into<String>) -> Self {
        Self {
            isbn: Some(isbn.into()),
            titolo: Some(titolo.into()),
            ..Self::default()
        }
    }

    pub fn with_autore(mut self, autore: impl Into<String>) -> Self {
        self.autore = Some(autore.into());
        self
    }

    pub fn with_copie(mut self, copie: i64) -> Self {
        self.copie = Some(copie);
        self
    }
}

impl Record for Book {
    const KIND: &'static str = "book";
    const FILE_NAME: &'static str = "books.json";

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn write_fields(&self, out: &mut ObjectWriter) {
        out.text("isbn", self.isbn.as_deref())
            .text("titolo", self.titolo.as_deref())
            .text("autore", self.autore.as_deref())
            .date("dataPubblicazione", self.data_pubblicazione)
            .text("casaEditrice", self.casa_editrice.as_deref())
            .int("copie", self.copie);
    }

    fn read_fields(fields: &FieldReader<'_>) -> Self {
        Self {
            id: None,
            isbn: fields.text("isbn"),
            titolo: fields.text("titolo"),
            autore: fields.text("autore"),
            data_pubblicazione: fields.date("dataPubblicazione"),
            casa_editrice: fields.text("casaEditrice"),
            copie: fields.int("copie"),
        }
    }

    fn natural_key(&self) -> Option<&str> {
        self.isbn.as_deref().filter(|isbn| !isbn.trim().is_empty())
    }
}

/// A library patron
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Option<i64>,
    /// First name
    pub nome: Option<String>,
    /// Last name
    pub cognome: Option<String>,
    pub email: Option<String>,
    pub telefono: Option<String>,
    /// Login name
    pub username: Option<String>,
    /// Stored credential; opaque to the store
    #[serde(skip_serializing, default)]
    pub password: Option<String>,
}

impl User {
    /// Create a user with first and last name
    pub fn new(nome: impl Into<String>, cognome: impl Into<String>) -> Self {
        Self {
            nome: Some(nome.into()),
            cognome: Some(cognome.into()),
            ..Self::default()
        }
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// "Cognome Nome", skipping missing parts
    pub fn display_name(&self) -> String {
        [self.cognome.as_deref(), self.nome.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Record for User {
    const KIND: &'static str = "user";
    const FILE_NAME: &'static str = "users.json";

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn write_fields(&self, out: &mut ObjectWriter) {
        out.text("nome", self.nome.as_deref())
            .text("cognome", self.cognome.as_deref())
            .text("email", self.email.as_deref())
            .text("telefono", self.telefono.as_deref())
            .text("username", self.username.as_deref())
            .text("password", self.password.as_deref());
    }

    fn read_fields(fields: &FieldReader<'_>) -> Self {
        Self {
            id: None,
            nome: fields.text("nome"),
            cognome: fields.text("cognome"),
            email: fields.text("email"),
            telefono: fields.text("telefono"),
            username: fields.text("username"),
            password: fields.text("password"),
        }
    }

    /// Last name, then first name; missing names sort first
    fn sort_for_listing(records: &mut [Self]) {
        records.sort_by(|a, b| {
            (a.cognome.as_deref(), a.nome.as_deref())
                .cmp(&(b.cognome.as_deref(), b.nome.as_deref()))
        });
    }
}

/// A book lent to a user
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Loan {
    pub id: Option<i64>,
    /// Lent book
    pub id_libro: Option<i64>,
    /// Borrowing user
    pub id_utente: Option<i64>,
    /// Date the loan started
    pub data_prestito: Option<NaiveDate>,
    /// Due date
    pub data_scadenza: Option<NaiveDate>,
    /// Date the book came back; `None` while the loan is open
    pub data_restituzione: Option<NaiveDate>,
}

impl Loan {
    /// Create an open loan of `id_libro` to `id_utente`
    pub fn new(id_libro: i64, id_utente: i64, data_prestito: NaiveDate) -> Self {
        Self {
            id_libro: Some(id_libro),
            id_utente: Some(id_utente),
            data_prestito: Some(data_prestito),
            ..Self::default()
        }
    }

    pub fn with_scadenza(mut self, data: NaiveDate) -> Self {
        self.data_scadenza = Some(data);
        self
    }

    /// Whether the book is still out
    pub fn is_open(&self) -> bool {
        self.data_restituzione.is_none()
    }

    /// Whether the loan is open and past its due date on `today`
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.is_open() && self.data_scadenza.is_some_and(|due| due < today)
    }
}

impl Record for Loan {
    const KIND: &'static str = "loan";
    const FILE_NAME: &'static str = "loans.json";

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn write_fields(&self, out: &mut ObjectWriter) {
        out.int("idLibro", self.id_libro)
            .int("idUtente", self.id_utente)
            .date("dataPrestito", self.data_prestito)
            .date("dataScadenza", self.data_scadenza)
            .date("dataRestituzione", self.data_restituzione);
    }

    fn read_fields(fields: &FieldReader<'_>) -> Self {
        Self {
            id: None,
            id_libro: fields.int("idLibro"),
            id_utente: fields.int("idUtente"),
            data_prestito: fields.date("dataPrestito"),
            data_scadenza: fields.date("dataScadenza"),
            data_restituzione: fields.date("dataRestituzione"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_book_new() {
        let book = Book::new("978-1", "X").with_autore("Y").with_copie(2);
        assert!(book.id.is_none());
        assert_eq!(book.isbn.as_deref(), Some("978-1"));
        assert_eq!(book.titolo.as_deref(), Some("X"));
        assert_eq!(book.autore.as_deref(), Some("Y"));
        assert_eq!(book.copie, Some(2));
    }

    #[test]
    fn test_book_natural_key() {
        assert_eq!(Book::new("978-1", "X").natural_key(), Some("978-1"));
        assert_eq!(Book::new("  ", "X").natural_key(), None);
        assert_eq!(Book::default().natural_key(), None);
    }

    #[test]
    fn test_user_sort_by_last_then_first_name() {
        let mut users = vec![
            User::new("Mario", "Rossi"),
            User::new("Anna", "Rossi"),
            User::new("Luca", "Bianchi"),
            User {
                nome: Some("Senza".to_string()),
                ..User::default()
            },
        ];
        User::sort_for_listing(&mut users);

        let names: Vec<_> = users.iter().map(User::display_name).collect();
        assert_eq!(names, vec!["Senza", "Bianchi Luca", "Rossi Anna", "Rossi Mario"]);
    }

    #[test]
    fn test_user_password_not_serialized() {
        let user = User::new("Anna", "Rossi").with_credentials("arossi", "segreto");
        let json = serde_json::to_string(&user).unwrap();
        assert!(json.contains("arossi"));
        assert!(!json.contains("segreto"));
    }

    #[test]
    fn test_loan_open_and_overdue() {
        let mut loan = Loan::new(1, 2, date(2024, 1, 10)).with_scadenza(date(2024, 2, 10));
        assert!(loan.is_open());
        assert!(!loan.is_overdue(date(2024, 2, 10)));
        assert!(loan.is_overdue(date(2024, 2, 11)));

        loan.data_restituzione = Some(date(2024, 2, 20));
        assert!(!loan.is_open());
        assert!(!loan.is_overdue(date(2024, 3, 1)));
    }

    #[test]
    fn test_loan_serialization_uses_wire_names() {
        let loan = Loan::new(1, 2, date(2024, 1, 10));
        let json = serde_json::to_string(&loan).unwrap();
        assert!(json.contains("\"idLibro\":1"));
        assert!(json.contains("\"dataPrestito\":\"2024-01-10\""));
        let back: Loan = serde_json::from_str(&json).unwrap();
        assert_eq!(back, loan);
    }
}
