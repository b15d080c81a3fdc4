//! Interactive prompts

use std::io::{self, BufRead, Write};

use anyhow::{bail, Result};

/// Ask a yes/no question; anything but "y"/"yes" is a no
///
/// Returns false without asking when stdin is not a terminal.
pub fn confirm(prompt: &str) -> Result<bool> {
    if !atty::is(atty::Stream::Stdin) {
        return Ok(false);
    }

    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    let input = input.trim().to_lowercase();
    Ok(input == "y" || input == "yes")
}

/// Read one line for a value the user did not pass on the command line
pub fn read_value(label: &str) -> Result<String> {
    if atty::is(atty::Stream::Stdin) {
        print!("{}: ", label);
        io::stdout().flush()?;
    }

    let mut input = String::new();
    io::stdin().lock().read_line(&mut input)?;

    let value = input.trim_end_matches(['\r', '\n']).to_string();
    if value.is_empty() {
        bail!("{} must not be empty", label);
    }
    Ok(value)
}
