//! Database operations for maintenance requests.

use rusqlite::{Connection, Row, params};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Error, database_id::DatabaseId, unit::UnitId};

/// The ID of a maintenance request.
pub type RequestId = DatabaseId;

/// The status of a request that has not been looked at yet.
pub const PENDING_STATUS: &str = "pending";

/// The name stored on a request when the unit has no resident name.
const UNKNOWN_RESIDENT: &str = "unknown resident";

/// A maintenance request raised by a resident.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaintenanceRequest {
    /// The ID of the request.
    pub id: RequestId,
    /// The unit the request was raised for.
    pub unit_id: UnitId,
    /// The resident's name at the time the request was made.
    pub resident_name: String,
    /// A short summary of the problem.
    pub subject: String,
    /// The full description of the problem.
    pub description: String,
    /// "pending" until an administrator changes it.
    pub status: String,
    /// The administrator's reply.
    pub admin_note: Option<String>,
    /// When the request was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// When an administrator last changed the request.
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

/// A maintenance request with the number of the unit it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdminRequest {
    /// The request itself.
    #[serde(flatten)]
    pub request: MaintenanceRequest,
    /// The door number of the unit.
    pub unit_number: String,
}

/// The request body for raising a maintenance request.
#[derive(Debug, Clone, Deserialize)]
pub struct NewRequest {
    /// The unit raising the request.
    pub unit_id: UnitId,
    /// A short summary of the problem.
    pub subject: String,
    /// The full description of the problem.
    #[serde(default)]
    pub description: String,
}

/// An administrator's response to a request.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestUpdate {
    /// The new status, e.g. "in progress" or "resolved".
    pub status: String,
    /// A note for the resident.
    #[serde(default)]
    pub admin_note: Option<String>,
}

/// Create the maintenance request table.
pub fn create_maintenance_request_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS maintenance_request (
            id INTEGER PRIMARY KEY,
            unit_id INTEGER NOT NULL,
            resident_name TEXT NOT NULL,
            subject TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL DEFAULT '{PENDING_STATUS}',
            admin_note TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT,
            FOREIGN KEY(unit_id) REFERENCES unit(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_maintenance_request_unit_id
            ON maintenance_request(unit_id);"
    ))?;

    Ok(())
}

/// Create a pending request, copying the resident's name from the unit.
///
/// # Errors
/// Returns [Error::InvalidForeignKey] if the unit does not exist.
pub fn create_request(
    new_request: &NewRequest,
    created_at: OffsetDateTime,
    connection: &Connection,
) -> Result<MaintenanceRequest, Error> {
    let resident_name: Option<String> = connection
        .query_row(
            "SELECT resident_name FROM unit WHERE id = ?1",
            [new_request.unit_id],
            |row| row.get(0),
        )
        .or_else(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            error => Err(error),
        })?;
    let resident_name = resident_name.unwrap_or_else(|| UNKNOWN_RESIDENT.to_owned());

    connection.execute(
        "INSERT INTO maintenance_request
            (unit_id, resident_name, subject, description, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            new_request.unit_id,
            resident_name,
            new_request.subject,
            new_request.description,
            PENDING_STATUS,
            created_at
        ],
    )?;

    Ok(MaintenanceRequest {
        id: connection.last_insert_rowid(),
        unit_id: new_request.unit_id,
        resident_name,
        subject: new_request.subject.clone(),
        description: new_request.description.clone(),
        status: PENDING_STATUS.to_owned(),
        admin_note: None,
        created_at,
        updated_at: None,
    })
}

/// Retrieve the requests of a unit, newest first.
pub fn get_unit_requests(
    unit_id: UnitId,
    connection: &Connection,
) -> Result<Vec<MaintenanceRequest>, Error> {
    connection
        .prepare(
            "SELECT id, unit_id, resident_name, subject, description, status, admin_note,
                    created_at, updated_at
             FROM maintenance_request WHERE unit_id = :unit_id
             ORDER BY created_at DESC, id DESC",
        )?
        .query_map(&[(":unit_id", &unit_id)], map_request_row)?
        .map(|maybe_request| maybe_request.map_err(Error::from))
        .collect()
}

/// Retrieve up to `limit` requests for the administrators: pending requests first, then
/// newest first.
pub fn get_admin_requests(limit: u32, connection: &Connection) -> Result<Vec<AdminRequest>, Error> {
    connection
        .prepare(
            "SELECT r.id, r.unit_id, r.resident_name, r.subject, r.description, r.status,
                    r.admin_note, r.created_at, r.updated_at, unit.unit_number
             FROM maintenance_request r
             INNER JOIN unit ON unit.id = r.unit_id
             ORDER BY CASE WHEN r.status = :pending THEN 1 ELSE 2 END,
                      r.created_at DESC, r.id DESC
             LIMIT :limit",
        )?
        .query_map(
            rusqlite::named_params! { ":pending": PENDING_STATUS, ":limit": limit },
            |row| {
                Ok(AdminRequest {
                    request: map_request_row(row)?,
                    unit_number: row.get(9)?,
                })
            },
        )?
        .map(|maybe_request| maybe_request.map_err(Error::from))
        .collect()
}

/// Count the requests that are still pending.
pub fn count_pending_requests(connection: &Connection) -> Result<i64, Error> {
    connection
        .query_row(
            "SELECT COUNT(*) FROM maintenance_request WHERE status = ?1",
            [PENDING_STATUS],
            |row| row.get(0),
        )
        .map_err(Error::from)
}

/// Set the status and admin note of a request.
///
/// # Errors
/// Returns [Error::UpdateMissingRequest] if the request does not exist.
pub fn update_request(
    request_id: RequestId,
    update: &RequestUpdate,
    updated_at: OffsetDateTime,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE maintenance_request SET status = ?1, admin_note = ?2, updated_at = ?3
         WHERE id = ?4",
        params![update.status, update.admin_note, updated_at, request_id],
    )?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingRequest);
    }

    Ok(())
}

/// Delete a request.
///
/// # Errors
/// Returns [Error::DeleteMissingRequest] if the request does not exist.
pub fn delete_request(request_id: RequestId, connection: &Connection) -> Result<(), Error> {
    let rows_affected =
        connection.execute("DELETE FROM maintenance_request WHERE id = ?1", [request_id])?;

    if rows_affected == 0 {
        return Err(Error::DeleteMissingRequest);
    }

    Ok(())
}

fn map_request_row(row: &Row) -> Result<MaintenanceRequest, rusqlite::Error> {
    Ok(MaintenanceRequest {
        id: row.get(0)?,
        unit_id: row.get(1)?,
        resident_name: row.get(2)?,
        subject: row.get(3)?,
        description: row.get(4)?,
        status: row.get(5)?,
        admin_note: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use time::{Duration, OffsetDateTime, macros::datetime};

    use crate::{
        Error,
        maintenance::{
            NewRequest, PENDING_STATUS, RequestUpdate, count_pending_requests, create_request,
            delete_request, get_admin_requests, get_unit_requests, update_request,
        },
        test_utils::{get_test_connection, insert_site_with_block, insert_unit},
    };

    const NOW: OffsetDateTime = datetime!(2024-03-01 09:00 UTC);

    fn new_request(unit_id: i64, subject: &str) -> NewRequest {
        NewRequest {
            unit_id,
            subject: subject.to_owned(),
            description: "The tap drips all night.".to_owned(),
        }
    }

    #[test]
    fn copies_resident_name_from_unit() {
        let connection = get_test_connection();
        let unit_id = insert_unit(insert_site_with_block(&connection), "1", true, &connection);
        connection
            .execute(
                "UPDATE unit SET resident_name = 'Ayşe Yılmaz' WHERE id = ?1",
                [unit_id],
            )
            .unwrap();

        let request = create_request(&new_request(unit_id, "Leak"), NOW, &connection).unwrap();

        assert_eq!(request.resident_name, "Ayşe Yılmaz");
        assert_eq!(request.status, PENDING_STATUS);
        assert_eq!(get_unit_requests(unit_id, &connection).unwrap(), [request]);
    }

    #[test]
    fn unnamed_unit_uses_placeholder_name() {
        let connection = get_test_connection();
        let unit_id = insert_unit(insert_site_with_block(&connection), "1", true, &connection);

        let request = create_request(&new_request(unit_id, "Leak"), NOW, &connection).unwrap();

        assert_eq!(request.resident_name, "unknown resident");
    }

    #[test]
    fn request_for_missing_unit_is_rejected() {
        let connection = get_test_connection();

        let result = create_request(&new_request(404, "Leak"), NOW, &connection);

        assert_eq!(result, Err(Error::InvalidForeignKey));
    }

    #[test]
    fn admin_list_puts_pending_first_then_newest() {
        let connection = get_test_connection();
        let unit_id = insert_unit(insert_site_with_block(&connection), "5", true, &connection);
        let oldest = create_request(&new_request(unit_id, "oldest"), NOW, &connection).unwrap();
        let resolved = create_request(
            &new_request(unit_id, "resolved"),
            NOW + Duration::hours(1),
            &connection,
        )
        .unwrap();
        create_request(
            &new_request(unit_id, "newest"),
            NOW + Duration::hours(2),
            &connection,
        )
        .unwrap();
        update_request(
            resolved.id,
            &RequestUpdate {
                status: "resolved".to_owned(),
                admin_note: Some("Fixed the washer.".to_owned()),
            },
            NOW + Duration::hours(3),
            &connection,
        )
        .unwrap();

        let requests = get_admin_requests(50, &connection).unwrap();

        let subjects: Vec<&str> = requests
            .iter()
            .map(|admin_request| admin_request.request.subject.as_str())
            .collect();
        assert_eq!(subjects, ["newest", "oldest", "resolved"]);
        assert_eq!(requests[0].unit_number, "5");
        assert_eq!(requests[2].request.updated_at, Some(NOW + Duration::hours(3)));
        assert_eq!(count_pending_requests(&connection), Ok(2));
        assert_eq!(requests[1].request.id, oldest.id);
    }

    #[test]
    fn admin_list_respects_limit() {
        let connection = get_test_connection();
        let unit_id = insert_unit(insert_site_with_block(&connection), "5", true, &connection);
        for i in 0..3 {
            create_request(&new_request(unit_id, &format!("r{i}")), NOW, &connection).unwrap();
        }

        assert_eq!(get_admin_requests(2, &connection).unwrap().len(), 2);
    }

    #[test]
    fn update_and_delete_missing_request_return_errors() {
        let connection = get_test_connection();
        let update = RequestUpdate {
            status: "resolved".to_owned(),
            admin_note: None,
        };

        assert_eq!(
            update_request(1, &update, NOW, &connection),
            Err(Error::UpdateMissingRequest)
        );
        assert_eq!(delete_request(1, &connection), Err(Error::DeleteMissingRequest));
    }

    #[test]
    fn deleting_unit_deletes_its_requests() {
        let connection = get_test_connection();
        let unit_id = insert_unit(insert_site_with_block(&connection), "1", true, &connection);
        create_request(&new_request(unit_id, "Leak"), NOW, &connection).unwrap();

        connection
            .execute("DELETE FROM unit WHERE id = ?1", [unit_id])
            .unwrap();

        assert_eq!(get_unit_requests(unit_id, &connection), Ok(vec![]));
    }
}
