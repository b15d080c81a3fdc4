//! Command handlers, one module per top-level subcommand

pub mod book;
pub mod config;
pub mod loan;
pub mod status;
pub mod user;

use biblio_core::{Dao, Record};

use crate::output::Output;

/// Warn when the mutation just made could not be written to disk
///
/// The record is still held in memory, so the command itself succeeded.
pub(crate) fn check_saved<R: Record>(dao: &dyn Dao<R>, output: &Output) {
    if dao.last_save_failed() {
        output.warn_unsaved(R::KIND);
    }
}
