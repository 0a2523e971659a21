//! Database operations for units.

use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};

use crate::{
    Error, PasswordHash,
    block::{BlockId, get_block},
    db::RowsAffected,
    unit::{OWNER_UNIT_TYPE, Unit, UnitId, UnitStatus},
};

/// Orders purely numeric unit numbers by value before any free-text ones.
const NUMERIC_UNIT_ORDER: &str = "CASE WHEN unit.unit_number <> '' \
     AND unit.unit_number NOT GLOB '*[^0-9]*' \
     THEN CAST(unit.unit_number AS INTEGER) ELSE 999 END ASC, unit.unit_number ASC";

/// The most units [bulk_create_units] creates in one call.
pub const MAX_BULK_UNITS: u32 = 500;

/// The units of a block along with the block's details.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockUnits {
    /// The ID of the block.
    pub block_id: BlockId,
    /// The display name of the block.
    pub block_name: String,
    /// The person responsible for the building.
    pub responsible: Option<String>,
    /// The units of the block, numeric unit numbers first.
    pub units: Vec<Unit>,
}

/// A unit as shown in the admin's list of all units.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitListing {
    /// The ID of the unit.
    pub id: UnitId,
    /// The door number.
    pub unit_number: String,
    /// The name of the unit's block.
    pub block_name: String,
    /// The full name of the resident.
    pub resident_name: Option<String>,
}

/// A recently registered resident.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentResident {
    /// The full name of the resident.
    pub resident_name: String,
    /// The door number of the resident's unit.
    pub unit_number: String,
}

/// The editable fields of a unit.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UnitForm {
    /// The door number.
    pub unit_number: String,
    /// The floor the unit is on.
    #[serde(default)]
    pub floor: Option<String>,
    /// The full name of the resident.
    #[serde(default)]
    pub resident_name: Option<String>,
    /// The resident's phone number.
    #[serde(default)]
    pub phone: Option<String>,
    /// The name the resident logs in with.
    #[serde(default)]
    pub login_name: Option<String>,
    /// A new password for the resident, the current one is kept when absent or empty.
    #[serde(default)]
    pub password: Option<String>,
    /// The kind of occupant.
    #[serde(default)]
    pub unit_type: Option<String>,
    /// Whether the unit is billed.
    #[serde(default)]
    pub status: UnitStatus,
    /// Dues charged to this unit instead of the site-wide amount.
    #[serde(default)]
    pub monthly_dues: Option<f64>,
}

/// Create the unit table.
///
/// Units reference their block without `ON DELETE CASCADE`, block and site deletion remove
/// units explicitly inside a transaction.
pub fn create_unit_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS unit (
            id INTEGER PRIMARY KEY,
            block_id INTEGER NOT NULL,
            unit_number TEXT NOT NULL,
            floor TEXT NOT NULL DEFAULT '0',
            resident_name TEXT,
            phone TEXT,
            status TEXT NOT NULL DEFAULT 'inactive',
            unit_type TEXT NOT NULL DEFAULT 'owner',
            login_name TEXT UNIQUE,
            password_hash TEXT,
            monthly_dues REAL,
            FOREIGN KEY(block_id) REFERENCES block(id)
        );

        CREATE INDEX IF NOT EXISTS idx_unit_block_id ON unit(block_id);",
    )?;

    Ok(())
}

/// Retrieve a single unit by ID.
pub fn get_unit(unit_id: UnitId, connection: &Connection) -> Result<Unit, Error> {
    connection
        .prepare(
            "SELECT id, block_id, unit_number, floor, resident_name, phone, status, unit_type,
                    login_name, monthly_dues
             FROM unit WHERE id = :id",
        )?
        .query_row(&[(":id", &unit_id)], map_unit_row)
        .map_err(Error::from)
}

/// Retrieve a block's details and its units.
///
/// # Errors
/// Returns [Error::NotFound] if the block does not exist.
pub fn get_block_units(block_id: BlockId, connection: &Connection) -> Result<BlockUnits, Error> {
    let block = get_block(block_id, connection)?;

    let units = connection
        .prepare(&format!(
            "SELECT id, block_id, unit_number, floor, resident_name, phone, status, unit_type,
                    login_name, monthly_dues
             FROM unit WHERE block_id = :block_id
             ORDER BY {NUMERIC_UNIT_ORDER}"
        ))?
        .query_map(&[(":block_id", &block_id)], map_unit_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(BlockUnits {
        block_id,
        block_name: block.name,
        responsible: block.responsible,
        units,
    })
}

/// Retrieve every unit with its block name, ordered by block then unit number.
pub fn get_all_units(connection: &Connection) -> Result<Vec<UnitListing>, Error> {
    connection
        .prepare(&format!(
            "SELECT unit.id, unit.unit_number, block.name, unit.resident_name
             FROM unit INNER JOIN block ON block.id = unit.block_id
             ORDER BY block.name ASC, {NUMERIC_UNIT_ORDER}"
        ))?
        .query_map([], |row| {
            Ok(UnitListing {
                id: row.get(0)?,
                unit_number: row.get(1)?,
                block_name: row.get(2)?,
                resident_name: row.get(3)?,
            })
        })?
        .map(|maybe_unit| maybe_unit.map_err(Error::from))
        .collect()
}

/// Retrieve the `limit` most recently added units that have a resident.
pub fn get_recent_residents(
    limit: u32,
    connection: &Connection,
) -> Result<Vec<RecentResident>, Error> {
    connection
        .prepare(
            "SELECT resident_name, unit_number FROM unit
             WHERE resident_name IS NOT NULL
             ORDER BY id DESC LIMIT :limit",
        )?
        .query_map(&[(":limit", &limit)], |row| {
            Ok(RecentResident {
                resident_name: row.get(0)?,
                unit_number: row.get(1)?,
            })
        })?
        .map(|maybe_resident| maybe_resident.map_err(Error::from))
        .collect()
}

/// Replace the details of a unit.
///
/// `password_hash` replaces the stored hash when given, otherwise the current hash is kept.
///
/// # Errors
/// Returns [Error::UpdateMissingUnit] if the unit does not exist, or
/// [Error::DuplicateEntry] if the login name is taken by another unit.
pub fn update_unit(
    unit_id: UnitId,
    form: &UnitForm,
    password_hash: Option<&PasswordHash>,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE unit
         SET unit_number = ?1, floor = ?2, resident_name = ?3, phone = ?4, login_name = ?5,
             password_hash = COALESCE(?6, password_hash), unit_type = ?7, status = ?8,
             monthly_dues = ?9
         WHERE id = ?10",
        params![
            form.unit_number,
            form.floor.as_deref().unwrap_or("0"),
            form.resident_name,
            form.phone,
            form.login_name,
            password_hash,
            form.unit_type.as_deref().unwrap_or(OWNER_UNIT_TYPE),
            form.status,
            form.monthly_dues,
            unit_id
        ],
    )?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingUnit);
    }

    Ok(())
}

/// Delete a unit. Its debts and their collections go with it.
///
/// # Errors
/// Returns [Error::DeleteMissingUnit] if the unit does not exist.
pub fn delete_unit(unit_id: UnitId, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute("DELETE FROM unit WHERE id = ?1", [unit_id])?;

    if rows_affected == 0 {
        return Err(Error::DeleteMissingUnit);
    }

    Ok(())
}

/// Create `count` inactive owner units in a block, numbered consecutively from
/// `start_number`, in one transaction.
///
/// # Errors
/// Returns [Error::InvalidForeignKey] if the block does not exist, in which case no units are
/// created, or [Error::TooManyUnits] if `count` is over [MAX_BULK_UNITS].
pub fn bulk_create_units(
    block_id: BlockId,
    start_number: u32,
    count: u32,
    connection: &Connection,
) -> Result<RowsAffected, Error> {
    if count > MAX_BULK_UNITS {
        return Err(Error::TooManyUnits(count));
    }

    let transaction = connection.unchecked_transaction()?;
    let mut created = 0;

    {
        let mut statement = transaction.prepare(
            "INSERT INTO unit (block_id, unit_number, floor, status, unit_type)
             VALUES (?1, ?2, '0', ?3, ?4)",
        )?;

        for offset in 0..count {
            let unit_number = u64::from(start_number) + u64::from(offset);
            created += statement.execute(params![
                block_id,
                unit_number.to_string(),
                UnitStatus::Inactive,
                OWNER_UNIT_TYPE
            ])?;
        }
    }

    transaction.commit()?;

    Ok(created)
}

/// The credentials and context of a unit for resident login.
#[derive(Debug, Clone)]
pub(crate) struct UnitLogin {
    pub id: UnitId,
    pub password_hash: Option<PasswordHash>,
    pub resident_name: Option<String>,
    pub unit_type: String,
    pub unit_number: String,
    pub floor: String,
    pub block_name: Option<String>,
    pub site_name: Option<String>,
}

/// Look up a unit by its login name, `None` if no unit uses it.
pub(crate) fn get_unit_login(
    login_name: &str,
    connection: &Connection,
) -> Result<Option<UnitLogin>, Error> {
    connection
        .prepare(
            "SELECT unit.id, unit.password_hash, unit.resident_name, unit.unit_type,
                    unit.unit_number, unit.floor, block.name, site.name
             FROM unit
             LEFT JOIN block ON block.id = unit.block_id
             LEFT JOIN site ON site.id = block.site_id
             WHERE unit.login_name = :login_name",
        )?
        .query_row(&[(":login_name", &login_name)], |row| {
            Ok(UnitLogin {
                id: row.get(0)?,
                password_hash: row.get(1)?,
                resident_name: row.get(2)?,
                unit_type: row.get(3)?,
                unit_number: row.get(4)?,
                floor: row.get(5)?,
                block_name: row.get(6)?,
                site_name: row.get(7)?,
            })
        })
        .optional()
        .map_err(Error::from)
}

fn map_unit_row(row: &Row) -> Result<Unit, rusqlite::Error> {
    Ok(Unit {
        id: row.get(0)?,
        block_id: row.get(1)?,
        unit_number: row.get(2)?,
        floor: row.get(3)?,
        resident_name: row.get(4)?,
        phone: row.get(5)?,
        status: row.get(6)?,
        unit_type: row.get(7)?,
        login_name: row.get(8)?,
        monthly_dues: row.get(9)?,
    })
}


#[cfg(test)]
mod bulk_create_units_tests {
    use crate::{
        Error,
        unit::{MAX_BULK_UNITS, UnitStatus, bulk_create_units, get_block_units},
        test_utils::{count_rows, get_test_connection, insert_site_with_block},
    };

    #[test]
    fn creates_consecutive_inactive_owner_units() {
        let connection = get_test_connection();
        let block_id = insert_site_with_block(&connection);

        let created = bulk_create_units(block_id, 101, 3, &connection).unwrap();

        assert_eq!(created, 3);
        let units = get_block_units(block_id, &connection).unwrap().units;
        let numbers: Vec<&str> = units.iter().map(|unit| unit.unit_number.as_str()).collect();
        assert_eq!(numbers, ["101", "102", "103"]);
        assert!(units.iter().all(|unit| unit.status == UnitStatus::Inactive
            && unit.unit_type == "owner"
            && unit.floor == "0"));
    }

    #[test]
    fn zero_count_creates_nothing() {
        let connection = get_test_connection();
        let block_id = insert_site_with_block(&connection);

        assert_eq!(bulk_create_units(block_id, 1, 0, &connection), Ok(0));
        assert_eq!(count_rows("unit", &connection), 0);
    }

    #[test]
    fn count_over_limit_creates_nothing() {
        let connection = get_test_connection();
        let block_id = insert_site_with_block(&connection);

        let result = bulk_create_units(block_id, 1, MAX_BULK_UNITS + 1, &connection);

        assert_eq!(result, Err(Error::TooManyUnits(MAX_BULK_UNITS + 1)));
        assert_eq!(count_rows("unit", &connection), 0);
    }

    #[test]
    fn count_at_limit_is_allowed() {
        let connection = get_test_connection();
        let block_id = insert_site_with_block(&connection);

        let created = bulk_create_units(block_id, 1, MAX_BULK_UNITS, &connection).unwrap();

        assert_eq!(created, MAX_BULK_UNITS as usize);
    }

    #[test]
    fn missing_block_creates_nothing() {
        let connection = get_test_connection();

        let result = bulk_create_units(99, 1, 5, &connection);

        assert_eq!(result, Err(Error::InvalidForeignKey));
        assert_eq!(count_rows("unit", &connection), 0);
    }
}

#[cfg(test)]
mod delete_unit_tests {
    use crate::{
        Error,
        unit::{delete_unit, get_unit},
        test_utils::{get_test_connection, insert_site_with_block, insert_unit},
    };

    #[test]
    fn deletes_unit() {
        let connection = get_test_connection();
        let block_id = insert_site_with_block(&connection);
        let unit_id = insert_unit(block_id, "1", true, &connection);

        delete_unit(unit_id, &connection).unwrap();

        assert_eq!(get_unit(unit_id, &connection), Err(Error::NotFound));
    }

    #[test]
    fn missing_unit_returns_error() {
        let connection = get_test_connection();

        assert_eq!(delete_unit(1, &connection), Err(Error::DeleteMissingUnit));
    }
}
