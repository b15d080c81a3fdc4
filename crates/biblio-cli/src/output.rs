//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use chrono::NaiveDate;
use serde::Serialize;

use biblio_core::{Book, Loan, User};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    /// Print any serializable value as pretty JSON
    pub fn json<T: Serialize + ?Sized>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("Failed to render JSON: {}", e),
        }
    }

    /// Print a single book
    pub fn print_book(&self, book: &Book, available: i64) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:          {}", show_id(book.id));
                println!("ISBN:        {}", or_dash(&book.isbn));
                println!("Title:       {}", or_dash(&book.titolo));
                println!("Author:      {}", or_dash(&book.autore));
                println!("Publisher:   {}", or_dash(&book.casa_editrice));
                println!("Published:   {}", date_or_dash(book.data_pubblicazione));
                println!(
                    "Copies:      {} ({} available)",
                    book.copie.map(|c| c.to_string()).unwrap_or_else(|| "-".into()),
                    available
                );
            }
            OutputFormat::Json => self.json(book),
            OutputFormat::Quiet => println!("{}", show_id(book.id)),
        }
    }

    /// Print a list of books
    pub fn print_books(&self, books: &[Book]) {
        match self.format {
            OutputFormat::Human => {
                if books.is_empty() {
                    println!("No books found.");
                    return;
                }
                for book in books {
                    println!(
                        "{:>4} | {:<17} | {} | {}",
                        show_id(book.id),
                        truncate(or_dash(&book.isbn), 17),
                        truncate(or_dash(&book.titolo), 40),
                        truncate(or_dash(&book.autore), 25)
                    );
                }
                println!("\n{} book(s)", books.len());
            }
            OutputFormat::Json => self.json(books),
            OutputFormat::Quiet => {
                for book in books {
                    println!("{}", show_id(book.id));
                }
            }
        }
    }

    /// Print a single user (credentials are never shown)
    pub fn print_user(&self, user: &User) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:          {}", show_id(user.id));
                println!("Name:        {}", user.display_name());
                println!("Email:       {}", or_dash(&user.email));
                println!("Phone:       {}", or_dash(&user.telefono));
                println!("Username:    {}", or_dash(&user.username));
            }
            OutputFormat::Json => self.json(user),
            OutputFormat::Quiet => println!("{}", show_id(user.id)),
        }
    }

    /// Print a list of users
    pub fn print_users(&self, users: &[User]) {
        match self.format {
            OutputFormat::Human => {
                if users.is_empty() {
                    println!("No users found.");
                    return;
                }
                for user in users {
                    println!(
                        "{:>4} | {} | {}",
                        show_id(user.id),
                        truncate(&user.display_name(), 35),
                        or_dash(&user.username)
                    );
                }
                println!("\n{} user(s)", users.len());
            }
            OutputFormat::Json => self.json(users),
            OutputFormat::Quiet => {
                for user in users {
                    println!("{}", show_id(user.id));
                }
            }
        }
    }

    /// Print a list of loans, flagging overdue ones against `today`
    pub fn print_loans(&self, loans: &[Loan], today: NaiveDate) {
        match self.format {
            OutputFormat::Human => {
                if loans.is_empty() {
                    println!("No loans found.");
                    return;
                }
                for loan in loans {
                    let state = match loan.data_restituzione {
                        Some(date) => format!("returned {}", date),
                        None if loan.is_overdue(today) => "OVERDUE".to_string(),
                        None => "open".to_string(),
                    };
                    println!(
                        "{:>4} | book {:>4} | user {:>4} | {} -> {} | {}",
                        show_id(loan.id),
                        show_id(loan.id_libro),
                        show_id(loan.id_utente),
                        date_or_dash(loan.data_prestito),
                        date_or_dash(loan.data_scadenza),
                        state
                    );
                }
                println!("\n{} loan(s)", loans.len());
            }
            OutputFormat::Json => self.json(loans),
            OutputFormat::Quiet => {
                for loan in loans {
                    println!("{}", show_id(loan.id));
                }
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Report a write that did not reach disk
    pub fn warn_unsaved(&self, kind: &str) {
        if !self.is_quiet() {
            eprintln!(
                "Warning: the {} collection could not be saved; changes are kept in memory only.",
                kind
            );
        }
    }

    /// Check if we should prompt for confirmation
    pub fn should_prompt(&self) -> bool {
        self.format == OutputFormat::Human
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn show_id(id: Option<i64>) -> String {
    id.map(|i| i.to_string()).unwrap_or_else(|| "-".to_string())
}

fn or_dash(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("-")
}

fn date_or_dash(date: Option<NaiveDate>) -> String {
    date.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string())
}

/// Truncate a string to max characters, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_flags() {
        assert_eq!(OutputFormat::from_flags(false, false), OutputFormat::Human);
        assert_eq!(OutputFormat::from_flags(true, false), OutputFormat::Json);
        assert_eq!(OutputFormat::from_flags(false, true), OutputFormat::Quiet);
        // Quiet takes precedence
        assert_eq!(OutputFormat::from_flags(true, true), OutputFormat::Quiet);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("this is a long string", 10), "this is...");
        assert_eq!(truncate("perché così è", 8), "perch...");
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(show_id(None), "-");
        assert_eq!(show_id(Some(12)), "12");
        assert_eq!(or_dash(&None), "-");
        assert_eq!(or_dash(&Some("Eco".to_string())), "Eco");
        assert_eq!(date_or_dash(NaiveDate::from_ymd_opt(2024, 3, 1)), "2024-03-01");
    }
}
