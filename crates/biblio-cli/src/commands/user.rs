//! User command handlers

use anyhow::{bail, Result};

use biblio_core::{Library, LoanQueries, User, UserCredentials};

use crate::commands::check_saved;
use crate::credentials::hash_credential;
use crate::output::Output;
use crate::prompt::{confirm, read_value};

/// Contact and login details for a new user
pub struct NewUser {
    pub nome: String,
    pub cognome: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// List registered users, sorted by surname then name
pub fn list(library: &Library, output: &Output) -> Result<()> {
    output.print_users(&library.users().list_all());
    Ok(())
}

/// Register a user
///
/// A username makes the user able to log in; the password is asked for
/// when it was not passed on the command line.
pub fn add(library: &Library, new_user: NewUser, output: &Output) -> Result<()> {
    let mut user = User::new(new_user.nome, new_user.cognome);
    user.email = new_user.email;
    user.telefono = new_user.phone;

    if let Some(username) = new_user.username {
        if library.users().find_by_username(&username).is_some() {
            bail!("Username already taken: {}", username);
        }
        let password = match new_user.password {
            Some(password) => password,
            None => read_value("Password")?,
        };
        let credential = hash_credential(&username, &password);
        user = user.with_credentials(username, credential);
    }

    if !library.users().add(&mut user) {
        bail!("Failed to add user");
    }
    check_saved(library.users(), output);

    output.success(&format!(
        "Created user {}: {}",
        user.id.unwrap_or_default(),
        user.display_name()
    ));
    output.print_user(&user);

    Ok(())
}

/// Delete a user with no books out
pub fn delete(library: &Library, id: i64, output: &Output) -> Result<()> {
    let user = find(library, id)?;

    let open = library
        .loans()
        .loans_for_user(id)
        .iter()
        .filter(|l| l.is_open())
        .count();
    if open > 0 {
        bail!("User {} has {} open loan(s); return them first", id, open);
    }

    if output.should_prompt() {
        println!("Delete user: {} - {}", id, user.display_name());
        if !confirm("Are you sure?")? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    if !library.users().remove(id) {
        bail!("Failed to delete user {}", id);
    }
    check_saved(library.users(), output);

    output.success(&format!("Deleted user {}", id));

    Ok(())
}

/// Replace a user's password
pub fn passwd(library: &Library, id: i64, password: Option<String>, output: &Output) -> Result<()> {
    let user = find(library, id)?;
    let Some(username) = user.username.as_deref() else {
        bail!("User {} has no username; add one before setting a password", id);
    };

    let password = match password {
        Some(password) => password,
        None => read_value("New password")?,
    };

    if !library
        .users()
        .set_credential(id, &hash_credential(username, &password))
    {
        bail!("Failed to update password for user {}", id);
    }
    check_saved(library.users(), output);

    output.success(&format!("Password changed for {}", username));

    Ok(())
}

/// Check a username and password pair
pub fn login(
    library: &Library,
    username: String,
    password: Option<String>,
    output: &Output,
) -> Result<()> {
    let password = match password {
        Some(password) => password,
        None => read_value("Password")?,
    };

    let Some(user) = library
        .users()
        .verify_credentials(&username, &hash_credential(&username, &password))
    else {
        bail!("Invalid username or password");
    };

    output.success(&format!("Welcome, {}", user.display_name()));
    output.print_user(&user);

    Ok(())
}

fn find(library: &Library, id: i64) -> Result<User> {
    library
        .users()
        .get(id)
        .ok_or_else(|| anyhow::anyhow!("User not found: {}", id))
}
