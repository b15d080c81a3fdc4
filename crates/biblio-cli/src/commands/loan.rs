//! Loan command handlers

use anyhow::{bail, Result};
use chrono::{Days, Local, NaiveDate};

use biblio_core::{Library, Loan, LoanQueries};

use crate::commands::check_saved;
use crate::output::Output;
use crate::prompt::confirm;

/// Loan length when no due date is given
pub const DEFAULT_LOAN_DAYS: u64 = 30;

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// List loans, optionally only open ones or one user's
pub fn list(library: &Library, open: bool, user: Option<i64>, output: &Output) -> Result<()> {
    let mut loans = match user {
        Some(user_id) => library.loans().loans_for_user(user_id),
        None => library.loans().list_all(),
    };
    if open {
        loans.retain(Loan::is_open);
    }

    output.print_loans(&loans, today());
    Ok(())
}

/// Lend a book to a user
pub fn add(
    library: &Library,
    book_id: i64,
    user_id: i64,
    date: Option<NaiveDate>,
    due: Option<NaiveDate>,
    output: &Output,
) -> Result<()> {
    let Some(book) = library.books().get(book_id) else {
        bail!("Book not found: {}", book_id);
    };
    if library.users().get(user_id).is_none() {
        bail!("User not found: {}", user_id);
    }
    if library.available_copies(&book) <= 0 {
        bail!("No copies of book {} are available", book_id);
    }

    let start = date.unwrap_or_else(today);
    let due = match due {
        Some(due) => due,
        None => default_due_date(start)?,
    };
    if due < start {
        bail!("Due date {} is before the loan date {}", due, start);
    }

    let mut loan = Loan::new(book_id, user_id, start).with_scadenza(due);
    if !library.loans().add(&mut loan) {
        bail!("Failed to add loan");
    }
    check_saved(library.loans(), output);

    output.success(&format!(
        "Created loan {}: book {} to user {}, due {}",
        loan.id.unwrap_or_default(),
        book_id,
        user_id,
        due
    ));

    Ok(())
}

/// Mark a loan as returned
pub fn return_loan(
    library: &Library,
    id: i64,
    date: Option<NaiveDate>,
    output: &Output,
) -> Result<()> {
    let date = date.unwrap_or_else(today);

    if !library.loans().return_loan(id, date) {
        bail!("Loan {} not found or already returned", id);
    }
    check_saved(library.loans(), output);

    output.success(&format!("Loan {} returned on {}", id, date));

    Ok(())
}

/// Delete a loan record
pub fn delete(library: &Library, id: i64, output: &Output) -> Result<()> {
    let Some(loan) = library.loans().get(id) else {
        bail!("Loan not found: {}", id);
    };

    if output.should_prompt() && loan.is_open() {
        println!("Loan {} is still open.", id);
        if !confirm("Delete it anyway?")? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    if !library.loans().remove(id) {
        bail!("Failed to delete loan {}", id);
    }
    check_saved(library.loans(), output);

    output.success(&format!("Deleted loan {}", id));

    Ok(())
}

fn default_due_date(start: NaiveDate) -> Result<NaiveDate> {
    start
        .checked_add_days(Days::new(DEFAULT_LOAN_DAYS))
        .ok_or_else(|| anyhow::anyhow!("Loan date {} is out of range", start))
}
