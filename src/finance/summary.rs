use rusqlite::Connection;
use serde::Serialize;

use crate::Error;

/// Totals shown on the finance dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinanceSummary {
    /// All payments collected in cash.
    pub cash_total: f64,
    /// All payments collected by bank transfer.
    pub bank_total: f64,
    /// Unpaid dues.
    pub pending_dues: f64,
    /// Unpaid fixture charges.
    pub pending_fixture: f64,
    /// Unpaid fuel charges.
    pub pending_fuel: f64,
    /// Everything that is still unpaid, of any kind.
    pub total_receivable: f64,
}

/// Sum the collected and outstanding amounts.
pub fn get_finance_summary(connection: &Connection) -> Result<FinanceSummary, Error> {
    connection
        .query_row(
            "SELECT
                (SELECT COALESCE(SUM(amount), 0) FROM collection WHERE method = 'cash'),
                (SELECT COALESCE(SUM(amount), 0) FROM collection WHERE method = 'bank'),
                COALESCE(SUM(CASE WHEN kind = 'dues' THEN amount END), 0),
                COALESCE(SUM(CASE WHEN kind = 'fixture' THEN amount END), 0),
                COALESCE(SUM(CASE WHEN kind = 'fuel' THEN amount END), 0),
                COALESCE(SUM(amount), 0)
             FROM debt WHERE status != 'paid'",
            [],
            |row| {
                Ok(FinanceSummary {
                    cash_total: row.get(0)?,
                    bank_total: row.get(1)?,
                    pending_dues: row.get(2)?,
                    pending_fixture: row.get(3)?,
                    pending_fuel: row.get(4)?,
                    total_receivable: row.get(5)?,
                })
            },
        )
        .map_err(Error::from)
}
