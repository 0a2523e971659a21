//! Database operations for blocks.

use rusqlite::{Connection, Row, params};
use serde::{Deserialize, Serialize};

use crate::{Error, database_id::DatabaseId, db::RowsAffected, site::SiteId};

/// The ID of a block.
pub type BlockId = DatabaseId;

/// A building within a site.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Block {
    /// The ID of the block.
    pub id: BlockId,
    /// The site the block belongs to.
    pub site_id: SiteId,
    /// The display name of the block, e.g. "A".
    pub name: String,
    /// The person responsible for the building.
    pub responsible: Option<String>,
}

/// The fields for creating or updating a block.
#[derive(Debug, Clone, Deserialize)]
pub struct BlockForm {
    /// The display name of the block.
    pub name: String,
    /// The person responsible for the building.
    #[serde(default)]
    pub responsible: Option<String>,
}

/// Create the block table.
///
/// Blocks reference their site without `ON DELETE CASCADE`: deleting a site that still has
/// blocks fails, cleanup goes through [crate::site::delete_site].
pub fn create_block_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS block (
            id INTEGER PRIMARY KEY,
            site_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            responsible TEXT,
            FOREIGN KEY(site_id) REFERENCES site(id)
        );

        CREATE INDEX IF NOT EXISTS idx_block_site_id ON block(site_id);",
    )?;

    Ok(())
}

/// Create a block in the site `site_id`.
///
/// # Errors
/// Returns [Error::InvalidForeignKey] if the site does not exist.
pub fn create_block(
    site_id: SiteId,
    form: &BlockForm,
    connection: &Connection,
) -> Result<Block, Error> {
    connection.execute(
        "INSERT INTO block (site_id, name, responsible) VALUES (?1, ?2, ?3)",
        params![site_id, form.name, form.responsible],
    )?;

    Ok(Block {
        id: connection.last_insert_rowid(),
        site_id,
        name: form.name.clone(),
        responsible: form.responsible.clone(),
    })
}

/// Retrieve a single block by ID.
pub fn get_block(block_id: BlockId, connection: &Connection) -> Result<Block, Error> {
    connection
        .prepare("SELECT id, site_id, name, responsible FROM block WHERE id = :id")?
        .query_row(&[(":id", &block_id)], map_block_row)
        .map_err(Error::from)
}

/// Retrieve the blocks of a site ordered by name.
pub fn get_blocks_for_site(site_id: SiteId, connection: &Connection) -> Result<Vec<Block>, Error> {
    connection
        .prepare(
            "SELECT id, site_id, name, responsible FROM block
             WHERE site_id = :site_id ORDER BY name ASC",
        )?
        .query_map(&[(":site_id", &site_id)], map_block_row)?
        .map(|maybe_block| maybe_block.map_err(Error::from))
        .collect()
}

/// Rename a block or change who is responsible for it.
///
/// # Errors
/// Returns [Error::UpdateMissingBlock] if the block does not exist.
pub fn update_block(
    block_id: BlockId,
    form: &BlockForm,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE block SET name = ?1, responsible = ?2 WHERE id = ?3",
        params![form.name, form.responsible, block_id],
    )?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingBlock);
    }

    Ok(())
}

/// Delete a block and all of its units in one transaction, returning the number of units
/// deleted.
///
/// A missing block aborts the whole operation: the transaction is rolled back and no units
/// are deleted.
///
/// # Errors
/// Returns [Error::DeleteMissingBlock] if the block does not exist, or an SQL error if any
/// of the statements fail.
pub fn delete_block(block_id: BlockId, connection: &Connection) -> Result<RowsAffected, Error> {
    let transaction = connection.unchecked_transaction()?;

    let units = transaction.execute("DELETE FROM unit WHERE block_id = ?1", [block_id])?;
    let blocks = transaction.execute("DELETE FROM block WHERE id = ?1", [block_id])?;

    if blocks == 0 {
        return Err(Error::DeleteMissingBlock);
    }

    transaction.commit()?;

    Ok(units)
}

fn map_block_row(row: &Row) -> Result<Block, rusqlite::Error> {
    Ok(Block {
        id: row.get(0)?,
        site_id: row.get(1)?,
        name: row.get(2)?,
        responsible: row.get(3)?,
    })
}


#[cfg(test)]
mod delete_block_tests {
    use crate::{
        Error,
        block::{delete_block, get_block},
        test_utils::{count_rows, get_test_connection, insert_block, insert_site, insert_unit},
    };

    #[test]
    fn deletes_block_and_exactly_its_units() {
        let connection = get_test_connection();
        let site_id = insert_site("Sunny Gardens", &connection);
        let block = insert_block(site_id, "A", &connection);
        let neighbour = insert_block(site_id, "B", &connection);
        for number in ["1", "2", "3"] {
            insert_unit(block, number, true, &connection);
        }
        insert_unit(neighbour, "1", true, &connection);

        let deleted_units = delete_block(block, &connection).unwrap();

        assert_eq!(deleted_units, 3);
        assert_eq!(get_block(block, &connection), Err(Error::NotFound));
        let remaining_units: i64 = connection
            .query_row("SELECT COUNT(*) FROM unit WHERE block_id = ?1", [block], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(remaining_units, 0);
        assert_eq!(count_rows("unit", &connection), 1);
    }

    #[test]
    fn missing_block_returns_error_and_deletes_nothing() {
        let connection = get_test_connection();
        let site_id = insert_site("Sunny Gardens", &connection);
        let block = insert_block(site_id, "A", &connection);
        insert_unit(block, "1", true, &connection);

        let result = delete_block(block + 100, &connection);

        assert_eq!(result, Err(Error::DeleteMissingBlock));
        assert_eq!(count_rows("unit", &connection), 1);
    }

    #[test]
    fn failure_deleting_block_keeps_units() {
        let connection = get_test_connection();
        let site_id = insert_site("Sunny Gardens", &connection);
        let block = insert_block(site_id, "A", &connection);
        insert_unit(block, "1", true, &connection);
        insert_unit(block, "2", true, &connection);
        connection
            .execute_batch(
                "CREATE TRIGGER refuse_block_delete BEFORE DELETE ON block
                 BEGIN SELECT RAISE(ABORT, 'forced failure'); END;",
            )
            .unwrap();

        let result = delete_block(block, &connection);

        assert!(matches!(result, Err(Error::SqlError(_))), "got {result:?}");
        assert_eq!(count_rows("unit", &connection), 2);
        assert!(get_block(block, &connection).is_ok());
    }
}
