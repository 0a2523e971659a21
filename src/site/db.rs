//! Database operations for sites.

use rusqlite::{Connection, Row, params};
use serde::{Deserialize, Serialize};

use crate::{Error, database_id::DatabaseId, db::RowsAffected};

/// The ID of a site.
pub type SiteId = DatabaseId;

/// A managed residential complex.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Site {
    /// The ID of the site.
    pub id: SiteId,
    /// The display name of the site.
    pub name: String,
    /// The full name of the site manager.
    pub manager_name: Option<String>,
    /// The manager's phone number.
    pub manager_phone: Option<String>,
    /// The postal address.
    pub address: Option<String>,
    /// The bank account that residents pay into, without spaces and upper-cased.
    pub iban: Option<String>,
}

/// The fields shown when listing sites.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteSummary {
    /// The ID of the site.
    pub id: SiteId,
    /// The display name of the site.
    pub name: String,
}

/// The editable fields of a site.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SiteForm {
    /// The display name of the site.
    pub name: String,
    /// The full name of the site manager.
    #[serde(default)]
    pub manager_name: Option<String>,
    /// The manager's phone number.
    #[serde(default)]
    pub manager_phone: Option<String>,
    /// The postal address.
    #[serde(default)]
    pub address: Option<String>,
    /// The bank account number in any spacing or case.
    #[serde(default)]
    pub iban: Option<String>,
}

/// What a cascading delete removed along with its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CascadeDeletion {
    /// The number of blocks deleted.
    pub blocks: RowsAffected,
    /// The number of units deleted.
    pub units: RowsAffected,
}

/// Remove all whitespace from an IBAN and upper-case it, e.g. "tr12 0006 1005" → "TR1200061005".
pub fn normalize_iban(iban: &str) -> String {
    iban.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Create the site table.
pub fn create_site_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS site (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            manager_name TEXT,
            manager_phone TEXT,
            address TEXT,
            iban TEXT
        )",
        (),
    )?;

    Ok(())
}

/// Create a site with just a name.
pub fn create_site(name: &str, connection: &Connection) -> Result<Site, Error> {
    connection.execute("INSERT INTO site (name) VALUES (?1)", (name,))?;

    let id = connection.last_insert_rowid();

    Ok(Site {
        id,
        name: name.to_owned(),
        manager_name: None,
        manager_phone: None,
        address: None,
        iban: None,
    })
}

/// Retrieve a single site by ID.
pub fn get_site(site_id: SiteId, connection: &Connection) -> Result<Site, Error> {
    connection
        .prepare(
            "SELECT id, name, manager_name, manager_phone, address, iban FROM site WHERE id = :id",
        )?
        .query_row(&[(":id", &site_id)], map_site_row)
        .map_err(Error::from)
}

/// Retrieve the ID and name of all sites ordered alphabetically.
pub fn get_all_sites(connection: &Connection) -> Result<Vec<SiteSummary>, Error> {
    connection
        .prepare("SELECT id, name FROM site ORDER BY name ASC")?
        .query_map([], |row| {
            Ok(SiteSummary {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?
        .map(|maybe_site| maybe_site.map_err(Error::from))
        .collect()
}

/// Replace the details of a site, normalising the IBAN.
///
/// # Errors
/// Returns [Error::UpdateMissingSite] if the site does not exist.
pub fn update_site(site_id: SiteId, form: &SiteForm, connection: &Connection) -> Result<(), Error> {
    let iban = form.iban.as_deref().map(normalize_iban);

    let rows_affected = connection.execute(
        "UPDATE site
         SET name = ?1, manager_name = ?2, manager_phone = ?3, address = ?4, iban = ?5
         WHERE id = ?6",
        params![
            form.name,
            form.manager_name,
            form.manager_phone,
            form.address,
            iban,
            site_id
        ],
    )?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingSite);
    }

    Ok(())
}

/// Delete a site together with its blocks and their units in one transaction.
///
/// Units are removed first, then blocks, then the site. If the site does not exist the
/// transaction is rolled back and nothing is deleted.
///
/// # Errors
/// Returns [Error::DeleteMissingSite] if the site does not exist, or an SQL error if any of
/// the statements fail. In both cases no rows are deleted.
pub fn delete_site(site_id: SiteId, connection: &Connection) -> Result<CascadeDeletion, Error> {
    let transaction = connection.unchecked_transaction()?;

    let units = transaction.execute(
        "DELETE FROM unit WHERE block_id IN (SELECT id FROM block WHERE site_id = ?1)",
        [site_id],
    )?;
    let blocks = transaction.execute("DELETE FROM block WHERE site_id = ?1", [site_id])?;
    let sites = transaction.execute("DELETE FROM site WHERE id = ?1", [site_id])?;

    if sites == 0 {
        // Dropping the transaction rolls it back.
        return Err(Error::DeleteMissingSite);
    }

    transaction.commit()?;

    Ok(CascadeDeletion { blocks, units })
}

fn map_site_row(row: &Row) -> Result<Site, rusqlite::Error> {
    Ok(Site {
        id: row.get(0)?,
        name: row.get(1)?,
        manager_name: row.get(2)?,
        manager_phone: row.get(3)?,
        address: row.get(4)?,
        iban: row.get(5)?,
    })
}

#[cfg(test)]
mod normalize_iban_tests {
    use super::normalize_iban;

    #[test]
    fn removes_spaces_and_upper_cases() {
        assert_eq!(
            normalize_iban("tr33 0006 1005 1978 6457 8413 26"),
            "TR330006100519786457841326"
        );
    }

    #[test]
    fn removes_tabs_and_newlines() {
        assert_eq!(normalize_iban("TR33\t0006\n1005"), "TR3300061005");
    }
}

#[cfg(test)]
mod site_query_tests {
    use rusqlite::Connection;

    use crate::{
        Error,
        site::{SiteForm, create_site, get_all_sites, get_site, update_site},
        test_utils::get_test_connection,
    };

    fn get_connection() -> Connection {
        get_test_connection()
    }

    #[test]
    fn create_site_succeeds() {
        let connection = get_connection();

        let site = create_site("Sunny Gardens", &connection).unwrap();

        assert!(site.id > 0);
        assert_eq!(site.name, "Sunny Gardens");
    }

    #[test]
    fn get_site_with_invalid_id_returns_not_found() {
        let connection = get_connection();

        assert_eq!(get_site(42, &connection), Err(Error::NotFound));
    }

    #[test]
    fn get_all_sites_is_sorted_by_name() {
        let connection = get_connection();
        create_site("Zeytinlik", &connection).unwrap();
        create_site("Akasya", &connection).unwrap();

        let names: Vec<String> = get_all_sites(&connection)
            .unwrap()
            .into_iter()
            .map(|site| site.name)
            .collect();

        assert_eq!(names, ["Akasya", "Zeytinlik"]);
    }

    #[test]
    fn update_site_normalizes_iban() {
        let connection = get_connection();
        let site = create_site("Sunny Gardens", &connection).unwrap();

        update_site(
            site.id,
            &SiteForm {
                name: "Sunny Gardens".to_owned(),
                manager_name: Some("Ayşe Yılmaz".to_owned()),
                iban: Some("tr33 0006 1005".to_owned()),
                ..Default::default()
            },
            &connection,
        )
        .unwrap();

        let got = get_site(site.id, &connection).unwrap();
        assert_eq!(got.iban.as_deref(), Some("TR3300061005"));
        assert_eq!(got.manager_name.as_deref(), Some("Ayşe Yılmaz"));
    }

    #[test]
    fn update_missing_site_returns_error() {
        let connection = get_connection();

        let result = update_site(99, &SiteForm::default(), &connection);

        assert_eq!(result, Err(Error::UpdateMissingSite));
    }
}
