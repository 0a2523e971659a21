//! Collections record payments made against debts.
//!
//! Recording and cancelling a collection are the only operations that change a debt's status,
//! and each does both writes in one transaction so that a debt is paid exactly when it has a
//! collection.

use rusqlite::{
    Connection, params,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error,
    database_id::DatabaseId,
    finance::{DebtId, DebtStatus},
    unit::UnitId,
};

/// How a payment was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Paid in cash at the management office.
    Cash,
    /// Paid by bank transfer.
    Bank,
}

impl PaymentMethod {
    /// The value stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Bank => "bank",
        }
    }
}

impl ToSql for PaymentMethod {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for PaymentMethod {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "cash" => Ok(PaymentMethod::Cash),
            "bank" => Ok(PaymentMethod::Bank),
            other => Err(FromSqlError::Other(
                format!("invalid payment method \"{other}\"").into(),
            )),
        }
    }
}

/// A payment recorded against a debt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Collection {
    /// The ID of the collection.
    pub id: DatabaseId,
    /// The debt that was paid.
    pub debt_id: DebtId,
    /// The amount paid.
    pub amount: f64,
    /// How the payment was made.
    pub method: PaymentMethod,
    /// When the payment was recorded.
    #[serde(with = "time::serde::rfc3339")]
    pub paid_at: OffsetDateTime,
}

/// The request body for recording a payment.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCollection {
    /// The debt being paid.
    pub debt_id: DebtId,
    /// The amount paid.
    pub amount: f64,
    /// How the payment was made.
    pub method: PaymentMethod,
}

/// A payment made by a unit, as shown to the resident.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitPayment {
    /// The amount paid.
    pub amount: f64,
    /// When the payment was recorded.
    #[serde(with = "time::serde::rfc3339")]
    pub paid_at: OffsetDateTime,
    /// How the payment was made.
    pub method: PaymentMethod,
    /// The description of the debt that was paid.
    pub description: String,
}

/// Create the collection table.
pub fn create_collection_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS collection (
            id INTEGER PRIMARY KEY,
            debt_id INTEGER NOT NULL,
            amount REAL NOT NULL,
            method TEXT NOT NULL,
            paid_at TEXT NOT NULL,
            FOREIGN KEY(debt_id) REFERENCES debt(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_collection_debt_id ON collection(debt_id);",
    )?;

    Ok(())
}

/// Record a payment and mark its debt as paid.
///
/// # Errors
/// Returns [Error::NotFound] if the debt does not exist, nothing is recorded in that case.
pub fn record_collection(
    new_collection: &NewCollection,
    paid_at: OffsetDateTime,
    connection: &Connection,
) -> Result<Collection, Error> {
    let transaction = connection.unchecked_transaction()?;

    let updated = transaction.execute(
        "UPDATE debt SET status = ?1 WHERE id = ?2",
        params![DebtStatus::Paid, new_collection.debt_id],
    )?;
    if updated == 0 {
        return Err(Error::NotFound);
    }

    transaction.execute(
        "INSERT INTO collection (debt_id, amount, method, paid_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            new_collection.debt_id,
            new_collection.amount,
            new_collection.method,
            paid_at
        ],
    )?;
    let id = transaction.last_insert_rowid();

    transaction.commit()?;

    Ok(Collection {
        id,
        debt_id: new_collection.debt_id,
        amount: new_collection.amount,
        method: new_collection.method,
        paid_at,
    })
}

/// Remove the payments recorded against a debt and mark it as unpaid again.
///
/// # Errors
/// Returns [Error::NotFound] if the debt does not exist.
pub fn cancel_collection(debt_id: DebtId, connection: &Connection) -> Result<(), Error> {
    let transaction = connection.unchecked_transaction()?;

    transaction.execute("DELETE FROM collection WHERE debt_id = ?1", [debt_id])?;
    let updated = transaction.execute(
        "UPDATE debt SET status = ?1 WHERE id = ?2",
        params![DebtStatus::Unpaid, debt_id],
    )?;
    if updated == 0 {
        return Err(Error::NotFound);
    }

    transaction.commit()?;

    Ok(())
}

/// Retrieve the payments made by a unit, newest first.
pub fn get_unit_payments(
    unit_id: UnitId,
    connection: &Connection,
) -> Result<Vec<UnitPayment>, Error> {
    connection
        .prepare(
            "SELECT collection.amount, collection.paid_at, collection.method, debt.description
             FROM collection
             INNER JOIN debt ON debt.id = collection.debt_id
             WHERE debt.unit_id = :unit_id
             ORDER BY collection.paid_at DESC, collection.id DESC",
        )?
        .query_map(&[(":unit_id", &unit_id)], |row| {
            Ok(UnitPayment {
                amount: row.get(0)?,
                paid_at: row.get(1)?,
                method: row.get(2)?,
                description: row.get(3)?,
            })
        })?
        .map(|maybe_payment| maybe_payment.map_err(Error::from))
        .collect()
}
