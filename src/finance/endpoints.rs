use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::json;
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    audit::{CallerContext, NewAuditEntry, record_event},
    db::lock_connection,
    finance::{
        ChargeTarget, DebtId, FinanceSettingsForm, NewCharge, NewCollection, bulk_delete_debts,
        cancel_collection, charge_active_units, create_debt, delete_debt, get_debt_listing,
        get_finance_settings, get_finance_summary, get_open_unit_debts, get_unit_payments,
        record_collection, update_finance_settings,
    },
    unit::UnitId,
};

/// The state needed for the finance routes.
#[derive(Debug, Clone)]
pub struct FinanceState {
    /// The database connection for managing debts and collections.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for FinanceState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The request body for deleting several debts.
#[derive(Debug, Deserialize)]
pub struct BulkDeleteDebts {
    /// The IDs of the debts to delete.
    pub ids: Vec<DebtId>,
}

/// A route handler for the finance settings.
pub async fn get_finance_settings_endpoint(
    State(state): State<FinanceState>,
) -> Result<impl IntoResponse, Error> {
    let connection = lock_connection(&state.db_connection)?;

    Ok(Json(get_finance_settings(&connection)?))
}

/// A route handler for replacing the finance settings.
pub async fn update_finance_settings_endpoint(
    State(state): State<FinanceState>,
    Json(form): Json<FinanceSettingsForm>,
) -> Result<impl IntoResponse, Error> {
    let connection = lock_connection(&state.db_connection)?;

    Ok(Json(update_finance_settings(
        &form,
        OffsetDateTime::now_utc(),
        &connection,
    )?))
}

/// A route handler for the collected and receivable totals.
pub async fn get_finance_summary_endpoint(
    State(state): State<FinanceState>,
) -> Result<impl IntoResponse, Error> {
    let connection = lock_connection(&state.db_connection)?;

    Ok(Json(get_finance_summary(&connection)?))
}

/// A route handler for every debt with its unit and block.
pub async fn get_debts_endpoint(
    State(state): State<FinanceState>,
) -> Result<impl IntoResponse, Error> {
    let connection = lock_connection(&state.db_connection)?;

    Ok(Json(get_debt_listing(&connection)?))
}

/// A route handler for charging one unit or every active unit.
///
/// Charging a single unit responds with the new debt. Charging all active units responds
/// with the number of units charged, which is zero for a repeated periodic charge.
pub async fn create_charge_endpoint(
    State(state): State<FinanceState>,
    Json(charge): Json<NewCharge>,
) -> Result<Response, Error> {
    let connection = lock_connection(&state.db_connection)?;
    let now = OffsetDateTime::now_utc();

    let response = match charge.target {
        ChargeTarget::Unit(unit_id) => {
            let debt = create_debt(unit_id, &charge, now, &connection)?;
            (StatusCode::CREATED, Json(debt)).into_response()
        }
        ChargeTarget::AllActive => {
            let charged = charge_active_units(
                &charge.kind,
                charge.amount,
                &charge.description,
                charge.due_date,
                charge.period.as_deref(),
                now,
                &connection,
            )?;
            tracing::info!("Charged {charged} active units for {}", charge.kind);
            (StatusCode::CREATED, Json(json!({ "charged": charged }))).into_response()
        }
    };

    Ok(response)
}

/// A route handler for recording a payment against a debt.
pub async fn record_collection_endpoint(
    State(state): State<FinanceState>,
    Json(new_collection): Json<NewCollection>,
) -> Result<impl IntoResponse, Error> {
    let connection = lock_connection(&state.db_connection)?;
    let collection = record_collection(&new_collection, OffsetDateTime::now_utc(), &connection)?;

    Ok((StatusCode::CREATED, Json(collection)))
}

/// A route handler for undoing the payments of a debt.
pub async fn cancel_collection_endpoint(
    State(state): State<FinanceState>,
    Path(debt_id): Path<DebtId>,
) -> Result<impl IntoResponse, Error> {
    let connection = lock_connection(&state.db_connection)?;
    cancel_collection(debt_id, &connection)?;

    Ok(Json(json!({ "message": "Collection cancelled." })))
}

/// A route handler for deleting a debt.
///
/// The deletion is written to the audit log with the debt's amount. A failure to write the
/// entry is logged and does not fail the request.
pub async fn delete_debt_endpoint(
    State(state): State<FinanceState>,
    caller: CallerContext,
    Path(debt_id): Path<DebtId>,
) -> Result<impl IntoResponse, Error> {
    let connection = lock_connection(&state.db_connection)?;
    let debt = delete_debt(debt_id, &connection)?;

    let detail = format!(
        "Debt {} of {:.2} ({}) for unit {} deleted.",
        debt.id, debt.amount, debt.kind, debt.unit_id
    );
    let entry = NewAuditEntry {
        actor: &caller.actor,
        action: "DEBT_DELETED",
        detail: &detail,
        ip_address: &caller.ip,
        created_at: OffsetDateTime::now_utc(),
    };
    if let Err(error) = record_event(&entry, &connection) {
        tracing::error!("Could not record deletion of debt {debt_id}: {error}");
    }

    Ok(Json(json!({ "message": "Debt deleted." })))
}

/// A route handler for deleting several debts at once.
pub async fn bulk_delete_debts_endpoint(
    State(state): State<FinanceState>,
    Json(request): Json<BulkDeleteDebts>,
) -> Result<impl IntoResponse, Error> {
    let connection = lock_connection(&state.db_connection)?;
    let deleted = bulk_delete_debts(&request.ids, &connection)?;

    Ok(Json(json!({ "deleted": deleted })))
}

/// A route handler for the unpaid debts of a unit.
pub async fn get_unit_debts_endpoint(
    State(state): State<FinanceState>,
    Path(unit_id): Path<UnitId>,
) -> Result<impl IntoResponse, Error> {
    let connection = lock_connection(&state.db_connection)?;

    Ok(Json(get_open_unit_debts(unit_id, &connection)?))
}

/// A route handler for the payments made for a unit.
pub async fn get_unit_payments_endpoint(
    State(state): State<FinanceState>,
    Path(unit_id): Path<UnitId>,
) -> Result<impl IntoResponse, Error> {
    let connection = lock_connection(&state.db_connection)?;

    Ok(Json(get_unit_payments(unit_id, &connection)?))
}
