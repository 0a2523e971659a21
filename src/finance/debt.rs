//! Debts are the amounts owed by units: dues, fixture and fuel charges, or anything else the
//! administrators bill.

use std::fmt::Display;

use rusqlite::{
    Connection, Row, params, params_from_iter,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::{
    Error,
    database_id::DatabaseId,
    db::RowsAffected,
    unit::{UnitId, UnitStatus},
};

/// The ID of a debt.
pub type DebtId = DatabaseId;

/// What a debt was charged for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DebtKind {
    /// The recurring monthly charge.
    Dues,
    /// A contribution towards fixtures and building equipment.
    Fixture,
    /// A share of the heating fuel bill.
    Fuel,
    /// Any other charge, named by the administrator.
    Other(String),
}

impl DebtKind {
    /// The value stored in the database.
    pub fn as_str(&self) -> &str {
        match self {
            DebtKind::Dues => "dues",
            DebtKind::Fixture => "fixture",
            DebtKind::Fuel => "fuel",
            DebtKind::Other(kind) => kind,
        }
    }
}

impl From<String> for DebtKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "dues" => DebtKind::Dues,
            "fixture" => DebtKind::Fixture,
            "fuel" => DebtKind::Fuel,
            _ => DebtKind::Other(value),
        }
    }
}

impl From<DebtKind> for String {
    fn from(value: DebtKind) -> Self {
        match value {
            DebtKind::Other(kind) => kind,
            kind => kind.as_str().to_owned(),
        }
    }
}

impl Display for DebtKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl ToSql for DebtKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for DebtKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value.as_str().map(|kind| DebtKind::from(kind.to_owned()))
    }
}

/// Whether a debt has been paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebtStatus {
    /// No collection has been recorded for the debt.
    Unpaid,
    /// A collection has been recorded for the debt.
    Paid,
}

impl DebtStatus {
    /// The value stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            DebtStatus::Unpaid => "unpaid",
            DebtStatus::Paid => "paid",
        }
    }
}

impl ToSql for DebtStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for DebtStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "unpaid" => Ok(DebtStatus::Unpaid),
            "paid" => Ok(DebtStatus::Paid),
            other => Err(FromSqlError::Other(
                format!("invalid debt status \"{other}\"").into(),
            )),
        }
    }
}

/// An amount owed by a unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Debt {
    /// The ID of the debt.
    pub id: DebtId,
    /// The unit that owes the amount.
    pub unit_id: UnitId,
    /// What the debt is for.
    pub kind: DebtKind,
    /// The amount owed.
    pub amount: f64,
    /// A note shown to the resident, e.g. "Dues for 2024-03".
    pub description: String,
    /// The date by which the debt should be paid.
    pub due_date: Date,
    /// Whether the debt has been paid.
    pub status: DebtStatus,
    /// The billing period, e.g. "2024-03", for periodic charges.
    pub period: Option<String>,
    /// When the debt was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A debt with the details of the unit that owes it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebtListing {
    /// The debt itself.
    #[serde(flatten)]
    pub debt: Debt,
    /// The door number of the unit.
    pub unit_number: String,
    /// The full name of the resident.
    pub resident_name: Option<String>,
    /// The name of the unit's block.
    pub block_name: String,
}

/// Who a new charge applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawChargeTarget")]
pub enum ChargeTarget {
    /// Every unit whose status is active.
    AllActive,
    /// A single unit.
    Unit(UnitId),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawChargeTarget {
    Id(UnitId),
    Keyword(String),
}

impl TryFrom<RawChargeTarget> for ChargeTarget {
    type Error = String;

    fn try_from(value: RawChargeTarget) -> Result<Self, Self::Error> {
        match value {
            RawChargeTarget::Id(unit_id) => Ok(ChargeTarget::Unit(unit_id)),
            RawChargeTarget::Keyword(keyword) if keyword == "all_active" => {
                Ok(ChargeTarget::AllActive)
            }
            RawChargeTarget::Keyword(keyword) => keyword
                .parse()
                .map(ChargeTarget::Unit)
                .map_err(|_| format!("expected a unit ID or \"all_active\", got \"{keyword}\"")),
        }
    }
}

/// The request body for charging one unit or all active units.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCharge {
    /// Who to charge.
    pub target: ChargeTarget,
    /// What the charge is for.
    pub kind: DebtKind,
    /// The amount to charge each unit.
    pub amount: f64,
    /// A note shown to the residents.
    #[serde(default)]
    pub description: String,
    /// The date by which the charge should be paid.
    pub due_date: Date,
    /// The billing period, e.g. "2024-03". At most one charge of a kind is made per unit and
    /// period.
    #[serde(default)]
    pub period: Option<String>,
}

/// Create the debt table.
///
/// Debts are deleted along with their unit. The partial unique index makes periodic charges
/// idempotent: a unit can only be charged once per kind and period.
pub fn create_debt_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS debt (
            id INTEGER PRIMARY KEY,
            unit_id INTEGER NOT NULL,
            kind TEXT NOT NULL,
            amount REAL NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            due_date TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'unpaid',
            period TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY(unit_id) REFERENCES unit(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_debt_unit_id ON debt(unit_id);

        CREATE UNIQUE INDEX IF NOT EXISTS idx_debt_unit_kind_period
            ON debt(unit_id, kind, period) WHERE period IS NOT NULL;",
    )?;

    Ok(())
}

/// Charge a single unit.
///
/// # Errors
/// Returns [Error::InvalidForeignKey] if the unit does not exist, or [Error::DuplicateEntry]
/// if the unit has already been charged this kind of debt for the period.
pub fn create_debt(
    unit_id: UnitId,
    charge: &NewCharge,
    created_at: OffsetDateTime,
    connection: &Connection,
) -> Result<Debt, Error> {
    connection.execute(
        "INSERT INTO debt
            (unit_id, kind, amount, description, due_date, status, period, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            unit_id,
            charge.kind,
            charge.amount,
            charge.description,
            charge.due_date,
            DebtStatus::Unpaid,
            charge.period,
            created_at
        ],
    )?;

    Ok(Debt {
        id: connection.last_insert_rowid(),
        unit_id,
        kind: charge.kind.clone(),
        amount: charge.amount,
        description: charge.description.clone(),
        due_date: charge.due_date,
        status: DebtStatus::Unpaid,
        period: charge.period.clone(),
        created_at,
    })
}

/// Charge every active unit `amount`, returning how many units were charged.
///
/// Units that already have a debt of `kind` for `period` are skipped, so calling this again
/// for the same period charges nobody twice. Charges without a period are never skipped.
pub fn charge_active_units(
    kind: &DebtKind,
    amount: f64,
    description: &str,
    due_date: Date,
    period: Option<&str>,
    created_at: OffsetDateTime,
    connection: &Connection,
) -> Result<RowsAffected, Error> {
    // The WHERE clause is required for SQLite to parse the upsert after a SELECT.
    let charged = connection.execute(
        "INSERT INTO debt
            (unit_id, kind, amount, description, due_date, status, period, created_at)
         SELECT id, ?1, ?2, ?3, ?4, ?5, ?6, ?7
         FROM unit WHERE status = ?8
         ON CONFLICT DO NOTHING",
        params![
            kind,
            amount,
            description,
            due_date,
            DebtStatus::Unpaid,
            period,
            created_at,
            UnitStatus::Active
        ],
    )?;

    Ok(charged)
}

const DEBT_COLUMNS: &str = "debt.id, debt.unit_id, debt.kind, debt.amount, debt.description, \
     debt.due_date, debt.status, debt.period, debt.created_at";

/// Retrieve a single debt by ID.
pub fn get_debt(debt_id: DebtId, connection: &Connection) -> Result<Debt, Error> {
    connection
        .prepare(&format!("SELECT {DEBT_COLUMNS} FROM debt WHERE id = :id"))?
        .query_row(&[(":id", &debt_id)], map_debt_row)
        .map_err(Error::from)
}

/// Retrieve all debts with their unit and block, newest first.
pub fn get_debt_listing(connection: &Connection) -> Result<Vec<DebtListing>, Error> {
    connection
        .prepare(&format!(
            "SELECT {DEBT_COLUMNS}, unit.unit_number, unit.resident_name, block.name
             FROM debt
             INNER JOIN unit ON unit.id = debt.unit_id
             INNER JOIN block ON block.id = unit.block_id
             ORDER BY debt.created_at DESC, debt.id DESC"
        ))?
        .query_map([], |row| {
            Ok(DebtListing {
                debt: map_debt_row(row)?,
                unit_number: row.get(9)?,
                resident_name: row.get(10)?,
                block_name: row.get(11)?,
            })
        })?
        .map(|maybe_debt| maybe_debt.map_err(Error::from))
        .collect()
}

/// Retrieve the unpaid debts of a unit, earliest due date first.
pub fn get_open_unit_debts(unit_id: UnitId, connection: &Connection) -> Result<Vec<Debt>, Error> {
    connection
        .prepare(&format!(
            "SELECT {DEBT_COLUMNS} FROM debt
             WHERE unit_id = :unit_id AND status != 'paid'
             ORDER BY due_date ASC, id ASC"
        ))?
        .query_map(&[(":unit_id", &unit_id)], map_debt_row)?
        .map(|maybe_debt| maybe_debt.map_err(Error::from))
        .collect()
}

/// Delete a debt and its collections in one transaction, returning the deleted debt.
///
/// # Errors
/// Returns [Error::DeleteMissingDebt] if the debt does not exist.
pub fn delete_debt(debt_id: DebtId, connection: &Connection) -> Result<Debt, Error> {
    let transaction = connection.unchecked_transaction()?;

    let debt = get_debt(debt_id, &transaction).map_err(|error| match error {
        Error::NotFound => Error::DeleteMissingDebt,
        error => error,
    })?;
    transaction.execute("DELETE FROM collection WHERE debt_id = ?1", [debt_id])?;
    transaction.execute("DELETE FROM debt WHERE id = ?1", [debt_id])?;

    transaction.commit()?;

    Ok(debt)
}

/// Delete the debts with the given IDs and their collections in one transaction, returning
/// the number of debts deleted.
///
/// IDs that do not exist are ignored.
///
/// # Errors
/// Returns [Error::EmptyIdList] if `debt_ids` is empty.
pub fn bulk_delete_debts(
    debt_ids: &[DebtId],
    connection: &Connection,
) -> Result<RowsAffected, Error> {
    if debt_ids.is_empty() {
        return Err(Error::EmptyIdList);
    }

    let placeholders = vec!["?"; debt_ids.len()].join(", ");
    let transaction = connection.unchecked_transaction()?;

    transaction.execute(
        &format!("DELETE FROM collection WHERE debt_id IN ({placeholders})"),
        params_from_iter(debt_ids),
    )?;
    let deleted = transaction.execute(
        &format!("DELETE FROM debt WHERE id IN ({placeholders})"),
        params_from_iter(debt_ids),
    )?;

    transaction.commit()?;

    Ok(deleted)
}

fn map_debt_row(row: &Row) -> Result<Debt, rusqlite::Error> {
    Ok(Debt {
        id: row.get(0)?,
        unit_id: row.get(1)?,
        kind: row.get(2)?,
        amount: row.get(3)?,
        description: row.get(4)?,
        due_date: row.get(5)?,
        status: row.get(6)?,
        period: row.get(7)?,
        created_at: row.get(8)?,
    })
}
