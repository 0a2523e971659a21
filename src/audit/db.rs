use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Query, State},
    response::IntoResponse,
};
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{AppState, Error, audit::Actor, database_id::DatabaseId, db::lock_connection};

/// How many entries the log endpoint returns when no limit is given.
const DEFAULT_LOG_LIMIT: u32 = 100;

/// A recorded change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    /// The ID of the entry.
    pub id: DatabaseId,
    /// The ID of the admin who made the change, 0 if unknown.
    pub actor_id: i64,
    /// The name of the admin who made the change.
    pub actor_name: String,
    /// What was done, e.g. "DELETE /api/sites/3" or "DEBT_DELETED".
    pub action: String,
    /// Further details such as the request payload.
    pub detail: String,
    /// The client's IP address.
    pub ip_address: String,
    /// When the change was made.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// An entry to append to the audit log.
#[derive(Debug, Clone)]
pub struct NewAuditEntry<'a> {
    /// Who made the change.
    pub actor: &'a Actor,
    /// What was done.
    pub action: &'a str,
    /// Further details.
    pub detail: &'a str,
    /// The client's IP address.
    pub ip_address: &'a str,
    /// When the change was made.
    pub created_at: OffsetDateTime,
}

/// Create the audit log table.
///
/// Entries are only ever inserted.
pub fn create_audit_log_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS audit_log (
            id INTEGER PRIMARY KEY,
            actor_id INTEGER NOT NULL,
            actor_name TEXT NOT NULL,
            action TEXT NOT NULL,
            detail TEXT NOT NULL,
            ip_address TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        (),
    )?;

    Ok(())
}

/// Append an entry to the audit log.
pub fn record_event(entry: &NewAuditEntry, connection: &Connection) -> Result<(), Error> {
    connection.execute(
        "INSERT INTO audit_log (actor_id, actor_name, action, detail, ip_address, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            entry.actor.id,
            entry.actor.name,
            entry.action,
            entry.detail,
            entry.ip_address,
            entry.created_at
        ],
    )?;

    Ok(())
}

/// Retrieve the `limit` most recent entries, newest first.
pub fn get_audit_logs(limit: u32, connection: &Connection) -> Result<Vec<AuditEntry>, Error> {
    connection
        .prepare(
            "SELECT id, actor_id, actor_name, action, detail, ip_address, created_at
             FROM audit_log ORDER BY created_at DESC, id DESC LIMIT :limit",
        )?
        .query_map(&[(":limit", &limit)], |row| {
            Ok(AuditEntry {
                id: row.get(0)?,
                actor_id: row.get(1)?,
                actor_name: row.get(2)?,
                action: row.get(3)?,
                detail: row.get(4)?,
                ip_address: row.get(5)?,
                created_at: row.get(6)?,
            })
        })?
        .map(|maybe_entry| maybe_entry.map_err(Error::from))
        .collect()
}

/// The state needed to read the audit log.
#[derive(Debug, Clone)]
pub struct AuditLogState {
    /// The database connection holding the audit log.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for AuditLogState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The query parameters for listing the audit log.
#[derive(Debug, Deserialize)]
pub struct AuditLogQuery {
    /// The maximum number of entries to return.
    pub limit: Option<u32>,
}

/// A route handler for the most recent audit log entries.
pub async fn get_audit_logs_endpoint(
    State(state): State<AuditLogState>,
    Query(query): Query<AuditLogQuery>,
) -> Result<impl IntoResponse, Error> {
    let connection = lock_connection(&state.db_connection)?;

    Ok(Json(get_audit_logs(
        query.limit.unwrap_or(DEFAULT_LOG_LIMIT),
        &connection,
    )?))
}
