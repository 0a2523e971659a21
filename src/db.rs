//! Schema initialisation and helpers shared by the modules that talk to the database.

use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{Connection, TransactionBehavior};

use crate::{
    Error,
    announcement::create_announcement_table,
    audit::create_audit_log_table,
    auth::create_admin_table,
    block::create_block_table,
    document::create_document_table,
    finance::{create_collection_table, create_debt_table, create_finance_settings_table},
    maintenance::create_maintenance_request_table,
    site::create_site_table,
    unit::create_unit_table,
};

/// The number of rows changed by an `INSERT`, `UPDATE` or `DELETE` statement.
pub type RowsAffected = usize;

/// Create the tables for all domain models and seed the finance settings row.
///
/// Foreign key enforcement is switched on for `connection`, it is off by default in SQLite.
///
/// # Errors
/// Returns an error if any of the tables could not be created.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    connection.pragma_update(None, "foreign_keys", "ON")?;

    let transaction =
        rusqlite::Transaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_admin_table(&transaction)?;
    create_site_table(&transaction)?;
    create_block_table(&transaction)?;
    create_unit_table(&transaction)?;
    create_debt_table(&transaction)?;
    create_collection_table(&transaction)?;
    create_finance_settings_table(&transaction)?;
    create_maintenance_request_table(&transaction)?;
    create_announcement_table(&transaction)?;
    create_document_table(&transaction)?;
    create_audit_log_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}

/// Acquire the shared database connection.
///
/// # Errors
/// Returns [Error::DatabaseLockError] if the lock is poisoned.
pub fn lock_connection(
    db_connection: &Arc<Mutex<Connection>>,
) -> Result<MutexGuard<'_, Connection>, Error> {
    db_connection.lock().map_err(|error| {
        tracing::error!("could not acquire database lock: {error}");
        Error::DatabaseLockError
    })
}

#[cfg(test)]
mod initialize_tests {
    use rusqlite::Connection;

    use super::initialize;

    #[test]
    fn sql_is_valid() {
        let connection =
            Connection::open_in_memory().expect("Could not initialise in-memory SQLite database");

        assert_eq!(Ok(()), initialize(&connection));
    }

    #[test]
    fn can_initialize_twice() {
        let connection = Connection::open_in_memory().unwrap();

        initialize(&connection).unwrap();

        assert_eq!(Ok(()), initialize(&connection));
    }

    #[test]
    fn enables_foreign_keys() {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();

        let enabled: i64 = connection
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();

        assert_eq!(enabled, 1);
    }
}
