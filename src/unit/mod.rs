//! Units are the individual apartments within a block.

mod core;
mod db;
mod endpoints;

pub use core::{OWNER_UNIT_TYPE, Unit, UnitId, UnitStatus};
pub use db::{
    BlockUnits, MAX_BULK_UNITS, RecentResident, UnitForm, UnitListing, bulk_create_units,
    create_unit_table, delete_unit, get_all_units, get_block_units, get_recent_residents, get_unit,
    update_unit,
};
pub use endpoints::{
    bulk_create_units_endpoint, delete_unit_endpoint, get_all_units_endpoint,
    get_block_units_endpoint, get_recent_residents_endpoint, update_unit_endpoint,
};

pub(crate) use db::{UnitLogin, get_unit_login};
