//! Biblio CLI
//!
//! Command-line interface for Biblio - books, users and loans management.

use std::fs::OpenOptions;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use biblio_core::{Config, Library};

mod commands;
mod credentials;
mod output;
mod prompt;

use commands::book::BookDetails;
use commands::user::NewUser;
use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "biblio")]
#[command(about = "Biblio - Small library catalog, users and loans")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Use this config file instead of the default one
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the book catalog
    Book {
        #[command(subcommand)]
        command: BookCommands,
    },
    /// Manage registered users
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// Manage loans
    Loan {
        #[command(subcommand)]
        command: LoanCommands,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
    /// Show storage location and record counts
    Status,
}

#[derive(Subcommand)]
enum BookCommands {
    /// List all books
    #[command(alias = "ls")]
    List {
        /// Only books whose title or author contains this text
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Show book details
    Show {
        /// Book ID
        id: i64,
    },
    /// Add a book (an existing ISBN updates that entry)
    Add {
        /// ISBN
        isbn: String,
        /// Title
        title: String,
        #[command(flatten)]
        details: BookDetails,
    },
    /// Edit a book
    Edit {
        /// Book ID
        id: i64,
        /// New ISBN
        #[arg(long)]
        isbn: Option<String>,
        /// New title
        #[arg(short, long)]
        title: Option<String>,
        #[command(flatten)]
        details: BookDetails,
    },
    /// Delete a book
    #[command(alias = "rm")]
    Delete {
        /// Book ID
        id: i64,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// List all users
    #[command(alias = "ls")]
    List,
    /// Register a user
    Add {
        /// First name
        nome: String,
        /// Surname
        cognome: String,
        #[arg(short, long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        /// Login name
        #[arg(short, long)]
        username: Option<String>,
        /// Password (asked for when omitted)
        #[arg(long, requires = "username")]
        password: Option<String>,
    },
    /// Delete a user
    #[command(alias = "rm")]
    Delete {
        /// User ID
        id: i64,
    },
    /// Change a user's password
    Passwd {
        /// User ID
        id: i64,
        /// New password (asked for when omitted)
        #[arg(long)]
        password: Option<String>,
    },
    /// Check a username and password
    Login {
        username: String,
        /// Password (asked for when omitted)
        #[arg(long)]
        password: Option<String>,
    },
}

#[derive(Subcommand)]
enum LoanCommands {
    /// List loans
    #[command(alias = "ls")]
    List {
        /// Only loans not yet returned
        #[arg(long)]
        open: bool,
        /// Only loans of this user
        #[arg(long, value_name = "ID")]
        user: Option<i64>,
    },
    /// Lend a book to a user
    Add {
        /// Book ID
        book: i64,
        /// User ID
        user: i64,
        /// Loan date (YYYY-MM-DD, default today)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Due date (YYYY-MM-DD, default 30 days after the loan date)
        #[arg(long)]
        due: Option<NaiveDate>,
    },
    /// Mark a loan as returned
    Return {
        /// Loan ID
        id: i64,
        /// Return date (YYYY-MM-DD, default today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Delete a loan record
    #[command(alias = "rm")]
    Delete {
        /// Loan ID
        id: i64,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, backend, log_file, log_level)
        key: String,
        /// Configuration value ("none" clears log_file)
        value: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    let config_path = cli.config.as_ref();

    // Config commands work without opening the collections
    if let Commands::Config { command } = &cli.command {
        return handle_config_command(command.clone(), config_path, &output);
    }

    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;
    init_logging(&config);

    let library = Library::open_with_config(config)?;

    match cli.command {
        Commands::Book { command } => handle_book_command(command, &library, &output),
        Commands::User { command } => handle_user_command(command, &library, &output),
        Commands::Loan { command } => handle_loan_command(command, &library, &output),
        Commands::Config { .. } => Ok(()), // Handled above
        Commands::Status => commands::status::show(&library, &output),
    }
}

fn handle_book_command(command: BookCommands, library: &Library, output: &Output) -> Result<()> {
    match command {
        BookCommands::List { search } => commands::book::list(library, search, output),
        BookCommands::Show { id } => commands::book::show(library, id, output),
        BookCommands::Add {
            isbn,
            title,
            details,
        } => commands::book::add(library, isbn, title, details, output),
        BookCommands::Edit {
            id,
            isbn,
            title,
            details,
        } => commands::book::edit(library, id, isbn, title, details, output),
        BookCommands::Delete { id } => commands::book::delete(library, id, output),
    }
}

fn handle_user_command(command: UserCommands, library: &Library, output: &Output) -> Result<()> {
    match command {
        UserCommands::List => commands::user::list(library, output),
        UserCommands::Add {
            nome,
            cognome,
            email,
            phone,
            username,
            password,
        } => {
            let new_user = NewUser {
                nome,
                cognome,
                email,
                phone,
                username,
                password,
            };
            commands::user::add(library, new_user, output)
        }
        UserCommands::Delete { id } => commands::user::delete(library, id, output),
        UserCommands::Passwd { id, password } => {
            commands::user::passwd(library, id, password, output)
        }
        UserCommands::Login { username, password } => {
            commands::user::login(library, username, password, output)
        }
    }
}

fn handle_loan_command(command: LoanCommands, library: &Library, output: &Output) -> Result<()> {
    match command {
        LoanCommands::List { open, user } => commands::loan::list(library, open, user, output),
        LoanCommands::Add {
            book,
            user,
            date,
            due,
        } => commands::loan::add(library, book, user, date, due, output),
        LoanCommands::Return { id, date } => {
            commands::loan::return_loan(library, id, date, output)
        }
        LoanCommands::Delete { id } => commands::loan::delete(library, id, output),
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(key, value, config_path, output)
        }
    }
}

/// Install the tracing subscriber
///
/// `RUST_LOG` wins over the configured level. Logs go to `log_file` when
/// one is configured, stderr otherwise.
fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "biblio_core={},biblio_cli={}",
            config.log_level, config.log_level
        ))
    });

    let log_file = config.log_file.as_ref().and_then(|path| {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(file),
            Err(e) => {
                eprintln!("Warning: Could not open log file {:?}: {}", path, e);
                None
            }
        }
    });

    // Ignore error if already initialized
    let _ = match log_file {
        Some(file) => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file))
            .try_init(),
        None => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init(),
    };

    debug!("Logging initialized at level {}", config.log_level);
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_loan_list_filters() {
        let cli = Cli::parse_from(["biblio", "--json", "loan", "list", "--open", "--user", "7"]);
        assert!(cli.json);
        match cli.command {
            Commands::Loan {
                command: LoanCommands::List { open, user },
            } => {
                assert!(open);
                assert_eq!(user, Some(7));
            }
            _ => panic!("expected loan list"),
        }
    }

    #[test]
    fn test_parse_book_add_with_details() {
        let cli = Cli::parse_from([
            "biblio",
            "book",
            "add",
            "978-88-452-1234-5",
            "Il nome della rosa",
            "--author",
            "Umberto Eco",
            "--published",
            "1980-09-01",
            "--copies",
            "2",
        ]);
        match cli.command {
            Commands::Book {
                command: BookCommands::Add { isbn, details, .. },
            } => {
                assert_eq!(isbn, "978-88-452-1234-5");
                assert_eq!(details.author.as_deref(), Some("Umberto Eco"));
                assert_eq!(details.published, NaiveDate::from_ymd_opt(1980, 9, 1));
                assert_eq!(details.copies, Some(2));
            }
            _ => panic!("expected book add"),
        }
    }

    #[test]
    fn test_password_requires_username() {
        let result = Cli::try_parse_from(["biblio", "user", "add", "Anna", "Rossi", "--password", "x"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::parse_from(["biblio", "status", "--config", "/tmp/biblio.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/biblio.toml")));
        assert!(matches!(cli.command, Commands::Status));
    }
}
