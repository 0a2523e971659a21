//! The singleton row of finance settings.

use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::Error;

/// Site-wide billing configuration.
///
/// The late fee fields are stored for display, no late fees are charged.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinanceSettings {
    /// The day of the month on which dues are charged, 1 to 31.
    pub billing_day: u8,
    /// The day of the month after which a payment counts as late.
    pub late_fee_day: u8,
    /// The monthly late fee as a percentage.
    pub late_fee_rate: f64,
    /// The dues charged to units that do not have their own amount.
    pub dues_amount: f64,
    /// When the settings were last changed.
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

/// The request body for changing the finance settings.
#[derive(Debug, Clone, Deserialize)]
pub struct FinanceSettingsForm {
    /// The day of the month on which dues are charged, 1 to 31.
    pub billing_day: u8,
    /// The day of the month after which a payment counts as late.
    pub late_fee_day: u8,
    /// The monthly late fee as a percentage.
    pub late_fee_rate: f64,
    /// The dues charged to units that do not have their own amount.
    pub dues_amount: f64,
}

/// Create the finance settings table and insert the default settings if there are none.
///
/// The table holds exactly one row with the ID 1.
pub fn create_finance_settings_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS finance_settings (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            billing_day INTEGER NOT NULL DEFAULT 1,
            late_fee_day INTEGER NOT NULL DEFAULT 10,
            late_fee_rate REAL NOT NULL DEFAULT 0,
            dues_amount REAL NOT NULL DEFAULT 0,
            updated_at TEXT
        );

        INSERT OR IGNORE INTO finance_settings (id) VALUES (1);",
    )?;

    Ok(())
}

/// Retrieve the finance settings.
pub fn get_finance_settings(connection: &Connection) -> Result<FinanceSettings, Error> {
    connection
        .query_row(
            "SELECT billing_day, late_fee_day, late_fee_rate, dues_amount, updated_at
             FROM finance_settings WHERE id = 1",
            [],
            |row| {
                Ok(FinanceSettings {
                    billing_day: row.get(0)?,
                    late_fee_day: row.get(1)?,
                    late_fee_rate: row.get(2)?,
                    dues_amount: row.get(3)?,
                    updated_at: row.get(4)?,
                })
            },
        )
        .map_err(Error::from)
}

/// Replace the finance settings.
///
/// # Errors
/// Returns [Error::InvalidBillingDay] if the billing day is not between 1 and 31.
pub fn update_finance_settings(
    form: &FinanceSettingsForm,
    updated_at: OffsetDateTime,
    connection: &Connection,
) -> Result<FinanceSettings, Error> {
    if !(1..=31).contains(&form.billing_day) {
        return Err(Error::InvalidBillingDay(form.billing_day));
    }

    connection.execute(
        "UPDATE finance_settings
         SET billing_day = ?1, late_fee_day = ?2, late_fee_rate = ?3, dues_amount = ?4,
             updated_at = ?5
         WHERE id = 1",
        params![
            form.billing_day,
            form.late_fee_day,
            form.late_fee_rate,
            form.dues_amount,
            updated_at
        ],
    )?;

    get_finance_settings(connection)
}
