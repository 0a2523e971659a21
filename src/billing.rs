//! The recurring dues billing job.
//!
//! Dues are charged once per billing period ("YYYY-MM") to every active unit. The scheduler
//! checks on every tick whether today is the configured billing day, and administrators can
//! trigger a charge for the current period at any time. Both paths go through
//! [charge_dues_for_period], which never charges a unit twice for the same period.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
    response::IntoResponse,
};
use rusqlite::Connection;
use serde::Serialize;
use time::{Date, Duration, OffsetDateTime};
use tokio::sync::watch;

use crate::{
    AppState, Error,
    db::{RowsAffected, lock_connection},
    finance::{DebtKind, charge_active_units, get_finance_settings},
    timezone::local_today,
};

/// How many days after the billing day dues must be paid.
const DAYS_UNTIL_DUE: i64 = 15;

/// The result of one run of the billing job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BillingOutcome {
    /// Today is not the billing day, nothing was charged.
    NotBillingDay {
        /// The configured day of the month.
        billing_day: u8,
    },
    /// Dues were charged for `period`.
    Charged {
        /// The billing period, e.g. "2024-03".
        period: String,
        /// How many units were charged. Zero if every active unit was already charged.
        units: RowsAffected,
    },
}

/// The billing period label of `date`, e.g. "2024-03".
pub fn period_label(date: Date) -> String {
    format!("{:04}-{:02}", date.year(), u8::from(date.month()))
}

/// Whether dues should be charged on `today`.
///
/// A billing day past the end of a short month falls on the last day of that month, e.g. a
/// billing day of 31 is the 30th in April and the 28th or 29th in February.
pub fn is_billing_day(today: Date, billing_day: u8) -> bool {
    if today.day() == billing_day {
        return true;
    }

    let is_last_day_of_month = today
        .next_day()
        .is_none_or(|tomorrow| tomorrow.month() != today.month());

    is_last_day_of_month && billing_day > today.day()
}

/// Charge dues for the period containing `today` to every active unit that has not been
/// charged for it yet.
///
/// Every unit is charged the dues amount from the finance settings, due [DAYS_UNTIL_DUE] days
/// after `today`.
pub fn charge_dues_for_period(
    today: Date,
    created_at: OffsetDateTime,
    connection: &Connection,
) -> Result<BillingOutcome, Error> {
    let settings = get_finance_settings(connection)?;
    let period = period_label(today);

    let units = charge_active_units(
        &DebtKind::Dues,
        settings.dues_amount,
        &format!("Dues for {period}"),
        today + Duration::days(DAYS_UNTIL_DUE),
        Some(&period),
        created_at,
        connection,
    )?;

    Ok(BillingOutcome::Charged { period, units })
}

/// Charge dues if `today` is the configured billing day.
pub fn run_billing_cycle(
    today: Date,
    created_at: OffsetDateTime,
    connection: &Connection,
) -> Result<BillingOutcome, Error> {
    let billing_day = get_finance_settings(connection)?.billing_day;

    if !is_billing_day(today, billing_day) {
        return Ok(BillingOutcome::NotBillingDay { billing_day });
    }

    charge_dues_for_period(today, created_at, connection)
}

/// Run the billing job every `interval` until `shutdown` is set to `true`.
///
/// The first run happens immediately. "Today" is evaluated in `timezone`. Errors are
/// logged and the job carries on with the next tick.
pub async fn run_billing_scheduler(
    db_connection: Arc<Mutex<Connection>>,
    timezone: String,
    interval: std::time::Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    tracing::info!("Billing job scheduled every {}s", interval.as_secs());

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(error) = billing_tick(&db_connection, &timezone) {
                    tracing::error!("Billing job failed: {error}");
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    tracing::info!("Billing job stopped.");
                    return;
                }
            }
        }
    }
}

fn billing_tick(db_connection: &Arc<Mutex<Connection>>, timezone: &str) -> Result<(), Error> {
    let today = local_today(timezone)?;
    tracing::debug!("Running billing job for {today}");

    let connection = lock_connection(db_connection)?;
    match run_billing_cycle(today, OffsetDateTime::now_utc(), &connection)? {
        BillingOutcome::NotBillingDay { billing_day } => {
            tracing::debug!("Skipping billing, {today} is not billing day {billing_day}");
        }
        BillingOutcome::Charged { period, units } => {
            tracing::info!("Charged dues for {period} to {units} units");
        }
    }

    Ok(())
}

/// The state needed to trigger billing from the API.
#[derive(Debug, Clone)]
pub struct BillingState {
    /// The database connection holding the units and debts.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The canonical timezone used to decide the current period.
    pub local_timezone: String,
}

impl FromRef<AppState> for BillingState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// A route handler that charges dues for the current period regardless of the billing day.
pub async fn run_billing_endpoint(
    State(state): State<BillingState>,
) -> Result<impl IntoResponse, Error> {
    let today = local_today(&state.local_timezone)?;
    let connection = lock_connection(&state.db_connection)?;
    let outcome = charge_dues_for_period(today, OffsetDateTime::now_utc(), &connection)?;

    if let BillingOutcome::Charged { period, units } = &outcome {
        tracing::info!("Manually charged dues for {period} to {units} units");
    }

    Ok(Json(outcome))
}

#[cfg(test)]
mod date_tests {
    use time::macros::date;

    use super::{is_billing_day, period_label};

    #[test]
    fn period_label_is_zero_padded() {
        assert_eq!(period_label(date!(2024 - 03 - 16)), "2024-03");
        assert_eq!(period_label(date!(2024 - 11 - 01)), "2024-11");
    }

    #[test]
    fn billing_day_matches_day_of_month() {
        assert!(is_billing_day(date!(2024 - 03 - 01), 1));
        assert!(!is_billing_day(date!(2024 - 03 - 02), 1));
        assert!(!is_billing_day(date!(2024 - 03 - 01), 2));
    }

    #[test]
    fn late_billing_day_falls_on_last_day_of_short_month() {
        assert!(is_billing_day(date!(2024 - 02 - 29), 31));
        assert!(is_billing_day(date!(2023 - 02 - 28), 30));
        assert!(is_billing_day(date!(2024 - 04 - 30), 31));
        assert!(!is_billing_day(date!(2024 - 04 - 30), 29));
        assert!(!is_billing_day(date!(2024 - 02 - 28), 31));
    }
}
