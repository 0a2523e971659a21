//! Route handlers for administrator and resident log-in.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
    response::IntoResponse,
};
use jsonwebtoken::EncodingKey;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::Duration;

use crate::{
    AppState, Error,
    auth::{AdminClaims, encode_token, get_admin_by_username},
    db::lock_connection,
    unit::{UnitId, get_unit_login},
};

/// The placeholder for a missing site or block name in a resident's log-in response.
const UNKNOWN: &str = "unknown";

/// The state needed to perform a log-in.
#[derive(Clone)]
pub struct LogInState {
    /// The database connection holding the admin and unit credentials.
    pub db_connection: Arc<Mutex<Connection>>,
    /// Signs the tokens issued to administrators.
    pub encoding_key: EncodingKey,
    /// How long an issued token is valid.
    pub token_duration: Duration,
}

impl FromRef<AppState> for LogInState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            encoding_key: state.token_keys.encoding_key.clone(),
            token_duration: state.token_duration,
        }
    }
}

/// The credentials sent to either log-in endpoint.
#[derive(Clone, Deserialize)]
pub struct LogInData {
    /// The admin's username or the unit's login name.
    pub username: String,
    /// The password in plain text.
    pub password: String,
}

/// The response to a successful admin log-in.
#[derive(Debug, Serialize, Deserialize)]
pub struct AdminLogInResponse {
    /// A signed token to send as `Authorization: Bearer <token>`.
    pub token: String,
    /// The admin's role.
    pub role: String,
}

/// The response to a successful resident log-in.
#[derive(Debug, Serialize, Deserialize)]
pub struct ResidentLogInResponse {
    /// The ID of the resident's unit.
    pub id: UnitId,
    /// The resident's full name.
    pub resident_name: Option<String>,
    /// The kind of occupant, e.g. "owner".
    pub unit_type: String,
    /// The name of the site, "unknown" if it is missing.
    pub site_name: String,
    /// The name of the block, "unknown" if it is missing.
    pub block_name: String,
    /// The floor of the unit.
    pub floor: String,
    /// The door number of the unit.
    pub unit_number: String,
}

/// Handler for admin log-in requests.
///
/// # Errors
///
/// Responds with 401 Unauthorized if the username is unknown or the password is wrong.
pub async fn admin_log_in_endpoint(
    State(state): State<LogInState>,
    Json(credentials): Json<LogInData>,
) -> Result<impl IntoResponse, Error> {
    let admin = {
        let connection = lock_connection(&state.db_connection)?;
        get_admin_by_username(&credentials.username, &connection)?
    }
    .ok_or(Error::InvalidCredentials)?;

    let is_valid = admin
        .password_hash
        .verify(&credentials.password)
        .map_err(|error| Error::HashingError(error.to_string()))?;
    if !is_valid {
        tracing::info!("Failed log-in attempt for admin {}", admin.username);
        return Err(Error::InvalidCredentials);
    }

    let claims = AdminClaims::new(
        admin.id.as_i64(),
        &admin.display_name,
        &admin.role,
        state.token_duration,
    );
    let token = encode_token(&claims, &state.encoding_key)?;

    Ok(Json(AdminLogInResponse {
        token,
        role: admin.role,
    }))
}

/// Handler for resident log-in requests with a unit's login name and password.
///
/// # Errors
///
/// Responds with 401 Unauthorized if no unit uses the login name, the unit has no password
/// or the password is wrong.
pub async fn resident_log_in_endpoint(
    State(state): State<LogInState>,
    Json(credentials): Json<LogInData>,
) -> Result<impl IntoResponse, Error> {
    let unit = {
        let connection = lock_connection(&state.db_connection)?;
        get_unit_login(&credentials.username, &connection)?
    }
    .ok_or(Error::InvalidCredentials)?;

    let password_hash = unit.password_hash.as_ref().ok_or(Error::InvalidCredentials)?;
    let is_valid = password_hash
        .verify(&credentials.password)
        .map_err(|error| Error::HashingError(error.to_string()))?;
    if !is_valid {
        return Err(Error::InvalidCredentials);
    }

    Ok(Json(ResidentLogInResponse {
        id: unit.id,
        resident_name: unit.resident_name,
        unit_type: unit.unit_type,
        site_name: unit.site_name.unwrap_or_else(|| UNKNOWN.to_owned()),
        block_name: unit.block_name.unwrap_or_else(|| UNKNOWN.to_owned()),
        floor: unit.floor,
        unit_number: unit.unit_number,
    }))
}
