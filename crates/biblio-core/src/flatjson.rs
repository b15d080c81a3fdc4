//! Minimal tokenizer for the flat-file record format
//!
//! The record files are a bracketed list of flat objects. Reading them only
//! needs two operations:
//!
//! - [`extract`]: pull one field's raw value out of a record blob
//! - [`split`]: cut a collection into its top-level record blobs
//!
//! Both walk the text byte by byte while tracking string state (with
//! backslash escapes) and nesting depth, so braces or key names that appear
//! inside string values never confuse them. This is not a general JSON
//! parser: values are returned raw and typed conversion is left to the codec.
//!
//! All structural characters are ASCII, so slicing at their byte offsets is
//! always on a UTF-8 boundary.

/// Raw value of a field as found in a record blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    /// A quoted value with its escapes resolved
    Text(String),
    /// An unquoted token (number, `null`, boolean), trimmed
    Bare(String),
}

impl RawValue {
    /// Borrow the textual content regardless of quoting
    pub fn as_str(&self) -> &str {
        match self {
            RawValue::Text(s) | RawValue::Bare(s) => s,
        }
    }

    /// Whether this is the bare `null` literal
    pub fn is_null(&self) -> bool {
        matches!(self, RawValue::Bare(s) if s == "null")
    }

    /// Convert into text, mapping bare `null` and empty bare tokens to `None`
    ///
    /// A quoted `"null"` stays `Some("null")`.
    pub fn into_text(self) -> Option<String> {
        match self {
            RawValue::Text(s) => Some(s),
            RawValue::Bare(s) if s.is_empty() || s == "null" => None,
            RawValue::Bare(s) => Some(s),
        }
    }
}

/// Extract the raw value of `field` from a single record blob
///
/// Only key tokens at the top level of the record are matched: the field
/// name appearing inside a string value or inside a nested object is
/// ignored. Returns `None` when the field is absent or the blob is too
/// malformed to reach it (unterminated string, key without a colon).
pub fn extract(blob: &str, field: &str) -> Option<RawValue> {
    let bytes = blob.as_bytes();
    let mut depth = 0usize;
    let mut pos = 0;

    while pos < bytes.len() {
        match bytes[pos] {
            b'"' => {
                let (token, end) = read_string(blob, pos)?;
                pos = end;

                if depth <= 1 {
                    let after = skip_whitespace(bytes, pos);
                    if bytes.get(after) == Some(&b':') {
                        if token == field {
                            return read_value(blob, skip_whitespace(bytes, after + 1));
                        }
                        pos = after + 1;
                    }
                }
            }
            b'{' | b'[' => {
                depth += 1;
                pos += 1;
            }
            b'}' | b']' => {
                depth = depth.saturating_sub(1);
                pos += 1;
            }
            _ => pos += 1,
        }
    }

    None
}

/// Split a collection text into its top-level record blobs
///
/// One optional pair of outer `[` `]` is stripped. Each blob runs from the
/// `{` that opens a record to the `}` that closes it. Text between records,
/// stray closing braces and a trailing unterminated record are discarded.
///
/// When a `{` shows up inside an open record at a position where only a key
/// can appear (right after `,` or an object's own `{`, outside any array),
/// the open record is treated as truncated and a new record starts at that
/// brace. This holds at any nesting depth.
pub fn split(text: &str) -> Vec<&str> {
    let body = strip_brackets(text);
    let bytes = body.as_bytes();

    let mut blobs = Vec::new();
    let mut depth = 0usize;
    let mut array_depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut start: Option<usize> = None;
    let mut last_significant = 0u8;

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
                last_significant = b;
            }
            continue;
        }

        match b {
            b'"' if depth > 0 => in_string = true,
            b'{' if depth == 0 => {
                start = Some(i);
                depth = 1;
                array_depth = 0;
            }
            b'{' if array_depth == 0 && matches!(last_significant, b',' | b'{') => {
                // the open record, and any object nested in it, never closed
                start = Some(i);
                depth = 1;
            }
            b'{' => depth += 1,
            b'}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start.take() {
                        blobs.push(&body[s..=i]);
                    }
                }
            }
            b'[' if depth > 0 => array_depth += 1,
            b']' if depth > 0 => array_depth = array_depth.saturating_sub(1),
            _ => {}
        }

        if !b.is_ascii_whitespace() {
            last_significant = b;
        }
    }

    blobs
}

/// Escape a string for use inside a quoted value
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}

/// Strip surrounding whitespace and one optional pair of outer brackets
fn strip_brackets(text: &str) -> &str {
    let trimmed = text.trim_start_matches('\u{feff}').trim();
    let trimmed = trimmed.strip_prefix('[').unwrap_or(trimmed);
    trimmed.strip_suffix(']').unwrap_or(trimmed)
}

fn skip_whitespace(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    pos
}

/// Read a quoted string starting at the opening quote
///
/// Returns the unescaped content and the offset just past the closing quote,
/// or `None` if the string never terminates.
fn read_string(text: &str, open: usize) -> Option<(String, usize)> {
    let mut out = String::new();
    let mut escaped = false;

    for (offset, c) in text[open + 1..].char_indices() {
        if escaped {
            out.push(match c {
                'n' => '\n',
                'r' => '\r',
                't' => '\t',
                other => other,
            });
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '"' {
            return Some((out, open + 1 + offset + 1));
        } else {
            out.push(c);
        }
    }

    None
}

/// Read the value that starts at `start`
fn read_value(text: &str, start: usize) -> Option<RawValue> {
    let bytes = text.as_bytes();
    match bytes.get(start) {
        None => None,
        Some(b'"') => read_string(text, start).map(|(s, _)| RawValue::Text(s)),
        Some(_) => {
            let mut depth = 0usize;
            let mut in_string = false;
            let mut escaped = false;
            let mut end = bytes.len();

            for (i, &b) in bytes.iter().enumerate().skip(start) {
                if in_string {
                    if escaped {
                        escaped = false;
                    } else if b == b'\\' {
                        escaped = true;
                    } else if b == b'"' {
                        in_string = false;
                    }
                    continue;
                }
                match b {
                    b'"' => in_string = true,
                    b'{' | b'[' => depth += 1,
                    b'}' | b']' | b',' if depth == 0 => {
                        end = i;
                        break;
                    }
                    b'}' | b']' => depth -= 1,
                    _ => {}
                }
            }

            Some(RawValue::Bare(text[start..end].trim().to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Option<RawValue> {
        Some(RawValue::Text(s.to_string()))
    }

    fn bare(s: &str) -> Option<RawValue> {
        Some(RawValue::Bare(s.to_string()))
    }

    #[test]
    fn test_extract_string_and_number() {
        let blob = r#"{ "id": 7, "titolo": "Il nome della rosa", "copie": 3 }"#;
        assert_eq!(extract(blob, "id"), bare("7"));
        assert_eq!(extract(blob, "titolo"), text("Il nome della rosa"));
        assert_eq!(extract(blob, "copie"), bare("3"));
    }

    #[test]
    fn test_extract_missing_field() {
        let blob = r#"{"id": 1, "isbn": "978-1"}"#;
        assert_eq!(extract(blob, "autore"), None);
    }

    #[test]
    fn test_extract_null_literal() {
        let blob = r#"{"id": 1, "autore": null}"#;
        let value = extract(blob, "autore").unwrap();
        assert!(value.is_null());
        assert_eq!(value.into_text(), None);
    }

    #[test]
    fn test_quoted_null_is_text() {
        let blob = r#"{"id": 1, "titolo": "null"}"#;
        let value = extract(blob, "titolo").unwrap();
        assert!(!value.is_null());
        assert_eq!(value.into_text(), Some("null".to_string()));
    }

    #[test]
    fn test_extract_last_field_without_trailing_comma() {
        let blob = "{\n  \"id\": 12\n}";
        assert_eq!(extract(blob, "id"), bare("12"));
    }

    #[test]
    fn test_extract_unescapes_quotes_and_backslashes() {
        let blob = r#"{"id": 1, "titolo": "Il \"grande\" libro \\ vol. 2"}"#;
        assert_eq!(
            extract(blob, "titolo"),
            text(r#"Il "grande" libro \ vol. 2"#)
        );
    }

    #[test]
    fn test_extract_control_escapes() {
        let blob = r#"{"id": 1, "note": "riga uno\nriga due\tfine"}"#;
        assert_eq!(extract(blob, "note"), text("riga uno\nriga due\tfine"));
    }

    #[test]
    fn test_field_name_inside_string_value_is_ignored() {
        let blob = r#"{"titolo": "\"autore\": falso", "autore": "Eco"}"#;
        assert_eq!(extract(blob, "autore"), text("Eco"));
    }

    #[test]
    fn test_field_name_as_value_is_not_a_key() {
        let blob = r#"{"titolo": "autore", "id": 4}"#;
        assert_eq!(extract(blob, "autore"), None);
        assert_eq!(extract(blob, "id"), bare("4"));
    }

    #[test]
    fn test_field_in_nested_object_is_ignored() {
        let blob = r#"{"meta": {"id": 99, "x": "}"}, "id": 5}"#;
        assert_eq!(extract(blob, "id"), bare("5"));
    }

    #[test]
    fn test_nested_value_returned_raw() {
        let blob = r#"{"meta": {"a": 1, "b": [1, 2]}, "id": 5}"#;
        assert_eq!(extract(blob, "meta"), bare(r#"{"a": 1, "b": [1, 2]}"#));
    }

    #[test]
    fn test_unterminated_string_is_absent() {
        let blob = r#"{"id": 1, "titolo": "senza fine"#;
        assert_eq!(extract(blob, "titolo"), None);
    }

    #[test]
    fn test_missing_colon_is_absent() {
        let blob = r#"{"id" 1, "isbn" "978-1"}"#;
        assert_eq!(extract(blob, "id"), None);
        assert_eq!(extract(blob, "isbn"), None);
    }

    #[test]
    fn test_extract_non_ascii_text() {
        let blob = r#"{"autore": "Niccolò Ammaniti", "id": 2}"#;
        assert_eq!(extract(blob, "autore"), text("Niccolò Ammaniti"));
        assert_eq!(extract(blob, "id"), bare("2"));
    }

    #[test]
    fn test_escape_inverts_extract() {
        let original = "a \"b\" \\ c\nd";
        let blob = format!("{{\"v\": \"{}\"}}", escape(original));
        assert_eq!(extract(&blob, "v"), text(original));
    }

    #[test]
    fn test_split_empty_inputs() {
        assert!(split("").is_empty());
        assert!(split("[]").is_empty());
        assert!(split("  [ \n ]  ").is_empty());
    }

    #[test]
    fn test_split_counts_objects() {
        let text = "[\n  {\"id\": 1},\n  {\"id\": 2},\n  {\"id\": 3}\n]\n";
        let blobs = split(text);
        assert_eq!(blobs, vec!["{\"id\": 1}", "{\"id\": 2}", "{\"id\": 3}"]);
    }

    #[test]
    fn test_split_without_brackets() {
        let blobs = split(r#"{"id": 1} {"id": 2}"#);
        assert_eq!(blobs.len(), 2);
    }

    #[test]
    fn test_split_ignores_braces_in_strings() {
        let collection = r#"[{"id": 1, "titolo": "a } b { c"}, {"id": 2, "titolo": "\"}\""}]"#;
        let blobs = split(collection);
        assert_eq!(blobs.len(), 2);
        assert_eq!(extract(blobs[1], "titolo"), text("\"}\""));
    }

    #[test]
    fn test_split_keeps_nested_objects_whole() {
        let text = r#"[{"id": 1, "meta": {"a": {"b": 2}}}, {"id": 2, "list": [{"x": 1}, {"x": 2}]}]"#;
        let blobs = split(text);
        assert_eq!(blobs.len(), 2);
        assert!(blobs[0].ends_with("}}}"));
        assert_eq!(extract(blobs[1], "id"), bare("2"));
    }

    #[test]
    fn test_split_discards_trailing_unterminated_object() {
        let text = r#"[{"id": 1}, {"id": 2}, {"id": 3, "titolo": "tronc"#;
        let blobs = split(text);
        assert_eq!(blobs.len(), 2);
    }

    #[test]
    fn test_split_recovers_from_interleaved_unterminated_object() {
        let text = r#"[{"id": 1}, {"id": 2, "titolo": "rotto", {"id": 3}, {"id": 4}]"#;
        let blobs = split(text);
        let ids: Vec<_> = blobs.iter().map(|b| extract(b, "id")).collect();
        assert_eq!(ids, vec![bare("1"), bare("3"), bare("4")]);
    }

    #[test]
    fn test_split_recovers_from_unterminated_nested_object() {
        let text = r#"[{"id": 1}, {"id": 2, "meta": {"a": 1, {"id": 3}, {"id": 4}]"#;
        let blobs = split(text);
        let ids: Vec<_> = blobs.iter().map(|b| extract(b, "id")).collect();
        assert_eq!(ids, vec![bare("1"), bare("3"), bare("4")]);
    }

    #[test]
    fn test_split_recovers_two_levels_deep() {
        let text = r#"[{"id": 1, "a": {"b": {"c": 1, {"id": 2}]"#;
        assert_eq!(split(text), vec![r#"{"id": 2}"#]);
    }

    #[test]
    fn test_split_ignores_stray_closing_brace() {
        let text = r#"[{"id": 1}}, {"id": 2}]"#;
        assert_eq!(split(text).len(), 2);
    }

    #[test]
    fn test_split_handles_bom() {
        let text = "\u{feff}[{\"id\": 1}]";
        assert_eq!(split(text), vec!["{\"id\": 1}"]);
    }
}
