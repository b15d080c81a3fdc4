//! Book command handlers

use anyhow::{bail, Result};
use chrono::NaiveDate;
use clap::Args;

use biblio_core::{Book, BookQueries, Library, LoanQueries};

use crate::commands::check_saved;
use crate::output::Output;
use crate::prompt::confirm;

/// Optional catalog details shared by `book add` and `book edit`
#[derive(Args, Debug, Default, Clone)]
pub struct BookDetails {
    /// Author
    #[arg(short, long)]
    pub author: Option<String>,
    /// Publisher
    #[arg(short, long)]
    pub publisher: Option<String>,
    /// Publication date (YYYY-MM-DD)
    #[arg(long)]
    pub published: Option<NaiveDate>,
    /// Number of copies held
    #[arg(short, long)]
    pub copies: Option<i64>,
}

impl BookDetails {
    /// Copy every given detail onto `book`; true if anything was given
    fn apply_to(self, book: &mut Book) -> bool {
        let mut changed = false;
        if let Some(author) = self.author {
            book.autore = Some(author);
            changed = true;
        }
        if let Some(publisher) = self.publisher {
            book.casa_editrice = Some(publisher);
            changed = true;
        }
        if let Some(date) = self.published {
            book.data_pubblicazione = Some(date);
            changed = true;
        }
        if let Some(copies) = self.copies {
            book.copie = Some(copies);
            changed = true;
        }
        changed
    }
}

/// List the catalog, optionally filtered by title or author
pub fn list(library: &Library, search: Option<String>, output: &Output) -> Result<()> {
    let books = match search {
        Some(ref query) => library.books().search(query),
        None => library.books().list_all(),
    };

    output.print_books(&books);
    Ok(())
}

/// Show a single book
pub fn show(library: &Library, id: i64, output: &Output) -> Result<()> {
    let book = find(library, id)?;
    output.print_book(&book, library.available_copies(&book));
    Ok(())
}

/// Add a book; a known ISBN updates the existing entry instead
pub fn add(
    library: &Library,
    isbn: String,
    title: String,
    details: BookDetails,
    output: &Output,
) -> Result<()> {
    if let Some(copies) = details.copies {
        if copies < 0 {
            bail!("Copies must not be negative");
        }
    }

    let existed = library.books().find_by_isbn(&isbn).is_some();

    let mut book = Book::new(isbn, title);
    details.apply_to(&mut book);

    if !library.books().add(&mut book) {
        bail!("Failed to add book");
    }
    check_saved(library.books(), output);

    let id = book.id.unwrap_or_default();
    if existed {
        output.success(&format!("Updated book {} (same ISBN)", id));
    } else {
        output.success(&format!("Created book {}", id));
    }
    output.print_book(&book, library.available_copies(&book));

    Ok(())
}

/// Change some fields of a book
pub fn edit(
    library: &Library,
    id: i64,
    isbn: Option<String>,
    title: Option<String>,
    details: BookDetails,
    output: &Output,
) -> Result<()> {
    let mut book = find(library, id)?;

    let mut changed = details.apply_to(&mut book);
    if let Some(isbn) = isbn {
        if let Some(other) = library.books().find_by_isbn(&isbn) {
            if other.id != book.id {
                bail!("ISBN {} already belongs to book {}", isbn, other.id.unwrap_or_default());
            }
        }
        book.isbn = Some(isbn);
        changed = true;
    }
    if let Some(title) = title {
        book.titolo = Some(title);
        changed = true;
    }

    if !changed {
        output.message("Nothing to change.");
        return Ok(());
    }

    if !library.books().update(&book) {
        bail!("Failed to update book {}", id);
    }
    check_saved(library.books(), output);

    output.success(&format!("Updated book {}", id));
    output.print_book(&book, library.available_copies(&book));

    Ok(())
}

/// Delete a book that is not out on loan
pub fn delete(library: &Library, id: i64, output: &Output) -> Result<()> {
    let book = find(library, id)?;

    let open = library
        .loans()
        .loans_for_book(id)
        .iter()
        .filter(|l| l.is_open())
        .count();
    if open > 0 {
        bail!("Book {} has {} open loan(s); return them first", id, open);
    }

    if output.should_prompt() {
        println!(
            "Delete book: {} - {}",
            id,
            book.titolo.as_deref().unwrap_or("(untitled)")
        );
        if !confirm("Are you sure?")? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    if !library.books().remove(id) {
        bail!("Failed to delete book {}", id);
    }
    check_saved(library.books(), output);

    output.success(&format!("Deleted book {}", id));

    Ok(())
}

fn find(library: &Library, id: i64) -> Result<Book> {
    library
        .books()
        .get(id)
        .ok_or_else(|| anyhow::anyhow!("Book not found: {}", id))
}
