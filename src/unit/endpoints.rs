//! Route handlers for units.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::json;

use crate::{
    AppState, Error, PasswordHash, ValidatedPassword,
    block::BlockId,
    db::lock_connection,
    unit::{
        UnitForm, UnitId, bulk_create_units, delete_unit, get_all_units, get_block_units,
        get_recent_residents, update_unit,
    },
};

/// How many residents the admin dashboard shows.
const RECENT_RESIDENT_LIMIT: u32 = 5;

/// The state needed to manage units.
#[derive(Debug, Clone)]
pub struct UnitState {
    /// The database connection for managing units.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The bcrypt cost for hashing resident passwords.
    pub password_hash_cost: u32,
}

impl FromRef<AppState> for UnitState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            password_hash_cost: state.password_hash_cost,
        }
    }
}

/// The request body for creating units in bulk.
#[derive(Debug, Deserialize)]
pub struct BulkUnits {
    /// The block to add the units to.
    pub block_id: BlockId,
    /// The number of the first unit.
    pub start_number: u32,
    /// How many units to create.
    pub count: u32,
}

/// A route handler for listing a block's units, responds with 404 if the block does not exist.
pub async fn get_block_units_endpoint(
    State(state): State<UnitState>,
    Path(block_id): Path<BlockId>,
) -> Result<impl IntoResponse, Error> {
    let connection = lock_connection(&state.db_connection)?;

    Ok(Json(get_block_units(block_id, &connection)?))
}

/// A route handler for listing all units with their block names.
pub async fn get_all_units_endpoint(
    State(state): State<UnitState>,
) -> Result<impl IntoResponse, Error> {
    let connection = lock_connection(&state.db_connection)?;

    Ok(Json(get_all_units(&connection)?))
}

/// A route handler for the most recently added residents.
pub async fn get_recent_residents_endpoint(
    State(state): State<UnitState>,
) -> Result<impl IntoResponse, Error> {
    let connection = lock_connection(&state.db_connection)?;

    Ok(Json(get_recent_residents(RECENT_RESIDENT_LIMIT, &connection)?))
}

/// A route handler for updating a unit.
///
/// A non-empty `password` is hashed before it is stored.
pub async fn update_unit_endpoint(
    State(state): State<UnitState>,
    Path(unit_id): Path<UnitId>,
    Json(form): Json<UnitForm>,
) -> Result<impl IntoResponse, Error> {
    let password_hash = match form.password.as_deref() {
        Some(password) if !password.is_empty() => Some(PasswordHash::new(
            ValidatedPassword::new_unchecked(password),
            state.password_hash_cost,
        )?),
        _ => None,
    };

    let connection = lock_connection(&state.db_connection)?;
    update_unit(unit_id, &form, password_hash.as_ref(), &connection)?;

    Ok(Json(json!({ "message": "Unit updated." })))
}

/// A route handler for deleting a unit.
pub async fn delete_unit_endpoint(
    State(state): State<UnitState>,
    Path(unit_id): Path<UnitId>,
) -> Result<impl IntoResponse, Error> {
    let connection = lock_connection(&state.db_connection)?;
    delete_unit(unit_id, &connection)?;

    Ok(Json(json!({ "message": "Unit deleted." })))
}

/// A route handler for creating a run of units in a block.
pub async fn bulk_create_units_endpoint(
    State(state): State<UnitState>,
    Json(request): Json<BulkUnits>,
) -> Result<impl IntoResponse, Error> {
    let connection = lock_connection(&state.db_connection)?;

    let created = bulk_create_units(
        request.block_id,
        request.start_number,
        request.count,
        &connection,
    )
    .inspect_err(|error| {
        tracing::error!(
            "Could not create units in block {}: {error}",
            request.block_id
        );
    })?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Units created.", "created": created })),
    ))
}
