//! Blocks are the buildings within a site, each holding a number of units.

mod db;
mod endpoints;

pub use db::{
    Block, BlockForm, BlockId, create_block, create_block_table, delete_block, get_block,
    get_blocks_for_site, update_block,
};
pub use endpoints::{
    create_block_endpoint, delete_block_endpoint, get_site_blocks_endpoint,
    update_block_endpoint,
};
