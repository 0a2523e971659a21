use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use crate::{block::BlockId, database_id::DatabaseId};

/// The ID of a unit.
pub type UnitId = DatabaseId;

/// The unit type given to units created in bulk.
pub const OWNER_UNIT_TYPE: &str = "owner";

/// Whether a unit is occupied and billed.
///
/// Only active units are charged dues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitStatus {
    /// The unit is occupied and billed.
    Active,
    /// The unit is empty or otherwise not billed.
    #[default]
    Inactive,
}

impl UnitStatus {
    /// The value stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitStatus::Active => "active",
            UnitStatus::Inactive => "inactive",
        }
    }
}

impl ToSql for UnitStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for UnitStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "active" => Ok(UnitStatus::Active),
            "inactive" => Ok(UnitStatus::Inactive),
            other => Err(FromSqlError::Other(
                format!("invalid unit status \"{other}\"").into(),
            )),
        }
    }
}

/// An apartment within a block.
///
/// The unit's password hash is never part of this type so it can not be sent to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Unit {
    /// The ID of the unit.
    pub id: UnitId,
    /// The block the unit belongs to.
    pub block_id: BlockId,
    /// The door number, usually numeric but free text, e.g. "12" or "3B".
    pub unit_number: String,
    /// The floor the unit is on.
    pub floor: String,
    /// The full name of the resident.
    pub resident_name: Option<String>,
    /// The resident's phone number.
    pub phone: Option<String>,
    /// Whether the unit is billed.
    pub status: UnitStatus,
    /// The kind of occupant, e.g. "owner" or "tenant".
    pub unit_type: String,
    /// The name the resident logs in with.
    pub login_name: Option<String>,
    /// Dues charged to this unit instead of the site-wide amount.
    pub monthly_dues: Option<f64>,
}
