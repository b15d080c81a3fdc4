//! Record codec
//!
//! Converts typed records to and from the flat-file text format:
//!
//! ```text
//! [
//!   {
//!     "id": 1,
//!     "isbn": "978-88-452-9262-1",
//!     "titolo": "Il nome della rosa",
//!     "dataPubblicazione": "1980-09-01",
//!     "copie": 2
//!   }
//! ]
//! ```
//!
//! Field order is fixed per entity kind. Absent values are written as
//! `null`, integers bare, dates as quoted `YYYY-MM-DD`, text quoted and
//! escaped. Decoding is lenient: a field that is missing or cannot be
//! converted decodes to `None`. Only a blob that is not an object at all,
//! or that lacks a usable `id`, is rejected.

use std::collections::HashSet;

use chrono::NaiveDate;
use thiserror::Error;
use tracing::warn;

use crate::flatjson::{self, RawValue};

/// Name of the identifying field shared by every entity kind
pub const ID_FIELD: &str = "id";

/// Date format used on disk
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Errors that make a record blob unusable
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("record is not a braces-delimited object")]
    NotAnObject,

    #[error("record has no usable id")]
    MissingId,
}

/// An entity kind that can live in a record store
pub trait Record: Clone + Send + 'static {
    /// Short name used in logs and as the relational kind column
    const KIND: &'static str;

    /// File name inside the data directory
    const FILE_NAME: &'static str;

    fn id(&self) -> Option<i64>;

    fn set_id(&mut self, id: i64);

    /// Write every field except `id`, in the kind's fixed order
    fn write_fields(&self, out: &mut ObjectWriter);

    /// Build a record from a blob, leaving `id` unset
    fn read_fields(fields: &FieldReader<'_>) -> Self;

    /// Non-id key under which a create is treated as an update
    fn natural_key(&self) -> Option<&str> {
        None
    }

    /// Ordering applied to listings
    ///
    /// Defaults to insertion order.
    fn sort_for_listing(_records: &mut [Self]) {}
}

/// Builds one pretty-printed object, one field per line
pub struct ObjectWriter {
    lines: Vec<String>,
}

impl ObjectWriter {
    fn new() -> Self {
        Self { lines: Vec::new() }
    }

    pub fn int(&mut self, name: &str, value: Option<i64>) -> &mut Self {
        let rendered = match value {
            Some(v) => v.to_string(),
            None => "null".to_string(),
        };
        self.push(name, rendered)
    }

    pub fn text(&mut self, name: &str, value: Option<&str>) -> &mut Self {
        let rendered = match value {
            Some(v) => format!("\"{}\"", flatjson::escape(v)),
            None => "null".to_string(),
        };
        self.push(name, rendered)
    }

    pub fn date(&mut self, name: &str, value: Option<NaiveDate>) -> &mut Self {
        let rendered = match value {
            Some(d) => format!("\"{}\"", d.format(DATE_FORMAT)),
            None => "null".to_string(),
        };
        self.push(name, rendered)
    }

    fn push(&mut self, name: &str, rendered: String) -> &mut Self {
        self.lines
            .push(format!("  \"{}\": {}", flatjson::escape(name), rendered));
        self
    }

    fn finish(self) -> String {
        format!("{{\n{}\n}}", self.lines.join(",\n"))
    }
}

/// Typed, lenient access to the fields of one blob
pub struct FieldReader<'a> {
    blob: &'a str,
}

impl<'a> FieldReader<'a> {
    pub fn new(blob: &'a str) -> Self {
        Self { blob }
    }

    /// Raw value as found in the blob
    pub fn raw(&self, name: &str) -> Option<RawValue> {
        flatjson::extract(self.blob, name)
    }

    /// Text value; bare `null` decodes to `None`
    pub fn text(&self, name: &str) -> Option<String> {
        self.raw(name).and_then(RawValue::into_text)
    }

    /// Integer value; absent, empty, `null` or unparsable decodes to `None`
    pub fn int(&self, name: &str) -> Option<i64> {
        self.text(name).and_then(|s| s.trim().parse().ok())
    }

    /// `YYYY-MM-DD` date; anything else decodes to `None`
    pub fn date(&self, name: &str) -> Option<NaiveDate> {
        self.text(name)
            .and_then(|s| NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).ok())
    }
}

/// Encode a single record as an object blob
pub fn encode<R: Record>(record: &R) -> String {
    let mut out = ObjectWriter::new();
    out.int(ID_FIELD, record.id());
    record.write_fields(&mut out);
    out.finish()
}

/// Decode a single object blob
pub fn decode<R: Record>(blob: &str) -> Result<R, CodecError> {
    let trimmed = blob.trim();
    if !(trimmed.starts_with('{') && trimmed.ends_with('}')) {
        return Err(CodecError::NotAnObject);
    }

    let fields = FieldReader::new(trimmed);
    let id = fields
        .int(ID_FIELD)
        .filter(|id| *id > 0)
        .ok_or(CodecError::MissingId)?;

    let mut record = R::read_fields(&fields);
    record.set_id(id);
    Ok(record)
}

/// Encode a full collection in file format
pub fn encode_collection<R: Record>(records: &[R]) -> String {
    if records.is_empty() {
        return "[]\n".to_string();
    }

    let objects: Vec<String> = records.iter().map(|r| indent(&encode(r))).collect();
    format!("[\n{}\n]\n", objects.join(",\n"))
}

/// Decode a collection, skipping unusable and duplicate records
///
/// When two records share an id the first one wins.
pub fn decode_collection<R: Record>(text: &str) -> Vec<R> {
    let mut records = Vec::new();
    let mut seen = HashSet::new();

    for blob in flatjson::split(text) {
        match decode::<R>(blob) {
            Ok(record) => {
                let id = record.id().unwrap_or_default();
                if seen.insert(id) {
                    records.push(record);
                } else {
                    warn!(kind = R::KIND, id, "Skipping record with duplicate id");
                }
            }
            Err(e) => warn!(kind = R::KIND, "Skipping unreadable record: {}", e),
        }
    }

    records
}

fn indent(block: &str) -> String {
    block
        .lines()
        .map(|line| format!("  {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Book, Loan, User};

    fn sample_book() -> Book {
        Book {
            id: Some(3),
            isbn: Some("978-88-452-9262-1".to_string()),
            titolo: Some("Il nome della \"rosa\"".to_string()),
            autore: Some("Umberto Eco".to_string()),
            data_pubblicazione: NaiveDate::from_ymd_opt(1980, 9, 1),
            casa_editrice: None,
            copie: Some(2),
        }
    }

    #[test]
    fn test_encode_field_order_and_nulls() {
        let encoded = encode(&sample_book());
        let expected = "{\n  \"id\": 3,\n  \"isbn\": \"978-88-452-9262-1\",\n  \
                        \"titolo\": \"Il nome della \\\"rosa\\\"\",\n  \"autore\": \"Umberto Eco\",\n  \
                        \"dataPubblicazione\": \"1980-09-01\",\n  \"casaEditrice\": null,\n  \
                        \"copie\": 2\n}";
        assert_eq!(encoded, expected);
    }

    #[test]
    fn test_book_round_trip() {
        let book = sample_book();
        let decoded: Book = decode(&encode(&book)).unwrap();
        assert_eq!(decoded, book);
    }

    #[test]
    fn test_round_trip_all_absent_fields() {
        let mut user = User::default();
        user.set_id(9);
        let decoded: User = decode(&encode(&user)).unwrap();
        assert_eq!(decoded, user);

        let mut loan = Loan::default();
        loan.set_id(1);
        let decoded: Loan = decode(&encode(&loan)).unwrap();
        assert_eq!(decoded, loan);
    }

    #[test]
    fn test_round_trip_multiline_text() {
        let mut book = sample_book();
        book.titolo = Some("Prima riga\nseconda\triga \\ fine".to_string());
        let decoded: Book = decode(&encode(&book)).unwrap();
        assert_eq!(decoded.titolo, book.titolo);
    }

    #[test]
    fn test_decode_missing_fields_are_none() {
        let book: Book = decode(r#"{"id": 4, "titolo": "Solo titolo"}"#).unwrap();
        assert_eq!(book.id, Some(4));
        assert_eq!(book.titolo.as_deref(), Some("Solo titolo"));
        assert!(book.isbn.is_none());
        assert!(book.copie.is_none());
        assert!(book.data_pubblicazione.is_none());
    }

    #[test]
    fn test_decode_invalid_values_are_none() {
        let blob = r#"{"id": 5, "copie": "tante", "dataPubblicazione": "31/12/1999"}"#;
        let book: Book = decode(blob).unwrap();
        assert!(book.copie.is_none());
        assert!(book.data_pubblicazione.is_none());
    }

    #[test]
    fn test_decode_quoted_and_null_integers() {
        let book: Book = decode(r#"{"id": "6", "copie": "null"}"#).unwrap();
        assert_eq!(book.id, Some(6));
        assert!(book.copie.is_none());

        let book: Book = decode(r#"{"id": 7, "copie": ""}"#).unwrap();
        assert!(book.copie.is_none());
    }

    #[test]
    fn test_decode_rejects_non_objects() {
        assert_eq!(decode::<Book>("\"id\": 1"), Err(CodecError::NotAnObject));
        assert_eq!(decode::<Book>(""), Err(CodecError::NotAnObject));
    }

    #[test]
    fn test_decode_requires_positive_id() {
        assert_eq!(
            decode::<Book>(r#"{"titolo": "x"}"#),
            Err(CodecError::MissingId)
        );
        assert_eq!(decode::<Book>(r#"{"id": null}"#), Err(CodecError::MissingId));
        assert_eq!(decode::<Book>(r#"{"id": 0}"#), Err(CodecError::MissingId));
        assert_eq!(decode::<Book>(r#"{"id": -2}"#), Err(CodecError::MissingId));
    }

    #[test]
    fn test_encode_empty_collection() {
        assert_eq!(encode_collection::<Book>(&[]), "[]\n");
        assert!(decode_collection::<Book>("[]\n").is_empty());
    }

    #[test]
    fn test_collection_round_trip() {
        let mut second = sample_book();
        second.id = Some(8);
        second.isbn = Some("978-0".to_string());
        let books = vec![sample_book(), second];

        let text = encode_collection(&books);
        assert!(text.starts_with("[\n  {\n    \"id\": 3,"));
        assert!(text.ends_with("  }\n]\n"));
        assert_eq!(flatjson::split(&text).len(), 2);

        let decoded: Vec<Book> = decode_collection(&text);
        assert_eq!(decoded, books);
    }

    #[test]
    fn test_decode_collection_skips_malformed_record() {
        let text = r#"[
            {"id": 1, "titolo": "uno"},
            {"id": 2, "titolo": "due",
            {"id": 3, "titolo": "tre"},
            {"titolo": "senza id"},
            {"id": 4, "titolo": "quattro"}
        ]"#;
        let books: Vec<Book> = decode_collection(text);
        let ids: Vec<_> = books.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![Some(1), Some(3), Some(4)]);
    }

    #[test]
    fn test_decode_collection_first_duplicate_wins() {
        let text = r#"[{"id": 1, "titolo": "primo"}, {"id": 1, "titolo": "secondo"}]"#;
        let books: Vec<Book> = decode_collection(text);
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].titolo.as_deref(), Some("primo"));
    }
}
