//! Code for creating the admin table and fetching administrator accounts.

use std::fmt::Display;

use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::{Error, PasswordHash};

/// A newtype wrapper for integer admin IDs.
///
/// This keeps administrator IDs apart from unit IDs, which residents log in with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct AdminId(i64);

impl AdminId {
    /// Create a new admin ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the admin ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for AdminId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// An administrator of the sites.
#[derive(Debug, Clone, PartialEq)]
pub struct Admin {
    /// The admin's ID in the application database.
    pub id: AdminId,
    /// The name the admin logs in with.
    pub username: String,
    /// The name shown in the audit log.
    pub display_name: String,
    /// The admin's role, carried in their tokens.
    pub role: String,
    /// The admin's password hash.
    pub password_hash: PasswordHash,
}

/// Create the admin table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_admin_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS admin (
                id INTEGER PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                display_name TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'admin',
                password TEXT NOT NULL
                )",
        (),
    )?;

    Ok(())
}

/// Create and insert a new administrator into the database.
///
/// # Errors
///
/// Returns [Error::DuplicateEntry] if the username is taken, or an [Error::SqlError] if
/// another SQL related error occurred.
pub fn create_admin(
    username: &str,
    display_name: &str,
    password_hash: PasswordHash,
    connection: &Connection,
) -> Result<Admin, Error> {
    connection.execute(
        "INSERT INTO admin (username, display_name, password) VALUES (?1, ?2, ?3)",
        (username, display_name, password_hash.as_ref()),
    )?;

    Ok(Admin {
        id: AdminId::new(connection.last_insert_rowid()),
        username: username.to_owned(),
        display_name: display_name.to_owned(),
        role: "admin".to_owned(),
        password_hash,
    })
}

/// Get the administrator with the login name `username`, `None` if there is no such admin.
pub fn get_admin_by_username(
    username: &str,
    connection: &Connection,
) -> Result<Option<Admin>, Error> {
    connection
        .prepare(
            "SELECT id, username, display_name, role, password FROM admin
             WHERE username = :username",
        )?
        .query_row(&[(":username", &username)], |row| {
            Ok(Admin {
                id: AdminId::new(row.get(0)?),
                username: row.get(1)?,
                display_name: row.get(2)?,
                role: row.get(3)?,
                password_hash: row.get(4)?,
            })
        })
        .optional()
        .map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use crate::{
        Error, PasswordHash,
        auth::{create_admin, get_admin_by_username},
        test_utils::get_test_connection,
    };

    #[test]
    fn create_then_get_admin() {
        let connection = get_test_connection();

        let admin = create_admin(
            "manager",
            "Ayşe Yılmaz",
            PasswordHash::new_unchecked("hunter2"),
            &connection,
        )
        .unwrap();

        assert_eq!(get_admin_by_username("manager", &connection), Ok(Some(admin)));
    }

    #[test]
    fn unknown_username_is_none() {
        let connection = get_test_connection();

        assert_eq!(get_admin_by_username("nobody", &connection), Ok(None));
    }

    #[test]
    fn duplicate_username_is_rejected() {
        let connection = get_test_connection();
        create_admin("manager", "A", PasswordHash::new_unchecked("x"), &connection).unwrap();

        let result = create_admin("manager", "B", PasswordHash::new_unchecked("y"), &connection);

        assert_eq!(result, Err(Error::DuplicateEntry));
    }
}
