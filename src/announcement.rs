//! Announcements posted by the site administrators for residents.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use rusqlite::{Connection, Row, params};
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::OffsetDateTime;

use crate::{AppState, Error, database_id::DatabaseId, db::lock_connection};

/// The ID of an announcement.
pub type AnnouncementId = DatabaseId;

/// A notice shown to residents.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Announcement {
    /// The ID of the announcement.
    pub id: AnnouncementId,
    /// The headline.
    pub title: String,
    /// The body text.
    pub content: String,
    /// How prominently the announcement should be shown, e.g. "normal" or "urgent".
    pub priority: String,
    /// When the announcement was posted.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// The request body for posting an announcement.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAnnouncement {
    /// The headline.
    pub title: String,
    /// The body text.
    #[serde(default)]
    pub content: String,
    /// Defaults to "normal".
    #[serde(default = "default_priority")]
    pub priority: String,
}

fn default_priority() -> String {
    "normal".to_owned()
}

/// Create the announcement table.
pub fn create_announcement_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS announcement (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            content TEXT NOT NULL DEFAULT '',
            priority TEXT NOT NULL DEFAULT 'normal',
            created_at TEXT NOT NULL
        )",
        (),
    )?;

    Ok(())
}

/// Store a new announcement.
pub fn create_announcement(
    new_announcement: &NewAnnouncement,
    created_at: OffsetDateTime,
    connection: &Connection,
) -> Result<Announcement, Error> {
    connection.execute(
        "INSERT INTO announcement (title, content, priority, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            new_announcement.title,
            new_announcement.content,
            new_announcement.priority,
            created_at
        ],
    )?;

    Ok(Announcement {
        id: connection.last_insert_rowid(),
        title: new_announcement.title.clone(),
        content: new_announcement.content.clone(),
        priority: new_announcement.priority.clone(),
        created_at,
    })
}

/// Retrieve all announcements, newest first.
pub fn get_announcements(connection: &Connection) -> Result<Vec<Announcement>, Error> {
    connection
        .prepare(
            "SELECT id, title, content, priority, created_at FROM announcement
             ORDER BY created_at DESC, id DESC",
        )?
        .query_map([], map_announcement_row)?
        .map(|maybe_announcement| maybe_announcement.map_err(Error::from))
        .collect()
}

/// Delete an announcement.
///
/// # Errors
/// Returns [Error::DeleteMissingAnnouncement] if the announcement does not exist.
pub fn delete_announcement(
    announcement_id: AnnouncementId,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected =
        connection.execute("DELETE FROM announcement WHERE id = ?1", [announcement_id])?;

    if rows_affected == 0 {
        return Err(Error::DeleteMissingAnnouncement);
    }

    Ok(())
}

fn map_announcement_row(row: &Row) -> Result<Announcement, rusqlite::Error> {
    Ok(Announcement {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        priority: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// The state needed for announcements.
#[derive(Debug, Clone)]
pub struct AnnouncementState {
    /// The database connection for managing announcements.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for AnnouncementState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler for posting an announcement.
pub async fn create_announcement_endpoint(
    State(state): State<AnnouncementState>,
    Json(new_announcement): Json<NewAnnouncement>,
) -> Result<impl IntoResponse, Error> {
    let connection = lock_connection(&state.db_connection)?;
    let announcement =
        create_announcement(&new_announcement, OffsetDateTime::now_utc(), &connection)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Announcement posted.", "id": announcement.id })),
    ))
}

/// A route handler for listing announcements.
pub async fn get_announcements_endpoint(
    State(state): State<AnnouncementState>,
) -> Result<impl IntoResponse, Error> {
    let connection = lock_connection(&state.db_connection)?;

    Ok(Json(get_announcements(&connection)?))
}

/// A route handler for deleting an announcement.
pub async fn delete_announcement_endpoint(
    State(state): State<AnnouncementState>,
    Path(announcement_id): Path<AnnouncementId>,
) -> Result<impl IntoResponse, Error> {
    let connection = lock_connection(&state.db_connection)?;
    delete_announcement(announcement_id, &connection)?;

    Ok(Json(json!({ "message": "Announcement deleted." })))
}
