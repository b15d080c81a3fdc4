//! Status command handler

use anyhow::Result;

use biblio_core::Library;

use crate::output::{Output, OutputFormat};

/// Show where the data lives and how much of it there is
pub fn show(library: &Library, output: &Output) -> Result<()> {
    let stats = library.stats();
    let config = library.config();

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "backend": stats.backend,
                    "data_dir": config.data_dir,
                    "counts": {
                        "books": stats.books,
                        "users": stats.users,
                        "loans": stats.loans,
                        "open_loans": stats.open_loans
                    },
                    "save_failures": stats.save_failures
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{} {} {}", stats.books, stats.users, stats.loans);
        }
        OutputFormat::Human => {
            println!("Biblio Status");
            println!("=============");
            println!();
            println!("Storage:");
            println!("  Backend:  {}", stats.backend);
            println!("  Location: {}", config.data_dir.display());
            println!();
            println!("Contents:");
            println!("  Books: {}", stats.books);
            println!("  Users: {}", stats.users);
            println!("  Loans: {} ({} open)", stats.loans, stats.open_loans);
            if !stats.save_failures.is_empty() {
                println!();
                println!("Unsaved: {}", stats.save_failures.join(", "));
            }
        }
    }

    Ok(())
}
