//! Route handlers for blocks.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::json;

use crate::{
    AppState, Error,
    block::{BlockForm, BlockId, create_block, delete_block, get_blocks_for_site, update_block},
    db::lock_connection,
    site::SiteId,
};

/// The state needed to manage blocks.
#[derive(Debug, Clone)]
pub struct BlockState {
    /// The database connection for managing blocks.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for BlockState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The request body for creating a block.
#[derive(Debug, Deserialize)]
pub struct NewBlock {
    /// The site the block belongs to.
    pub site_id: SiteId,
    /// The name and responsible party.
    #[serde(flatten)]
    pub form: BlockForm,
}

/// A route handler for listing the blocks of a site.
pub async fn get_site_blocks_endpoint(
    State(state): State<BlockState>,
    Path(site_id): Path<SiteId>,
) -> Result<impl IntoResponse, Error> {
    let connection = lock_connection(&state.db_connection)?;

    Ok(Json(get_blocks_for_site(site_id, &connection)?))
}

/// A route handler for creating a block, responds with the new block.
pub async fn create_block_endpoint(
    State(state): State<BlockState>,
    Json(new_block): Json<NewBlock>,
) -> Result<impl IntoResponse, Error> {
    let connection = lock_connection(&state.db_connection)?;
    let block = create_block(new_block.site_id, &new_block.form, &connection)?;

    Ok((StatusCode::CREATED, Json(block)))
}

/// A route handler for updating a block's name and responsible party.
pub async fn update_block_endpoint(
    State(state): State<BlockState>,
    Path(block_id): Path<BlockId>,
    Json(form): Json<BlockForm>,
) -> Result<impl IntoResponse, Error> {
    let connection = lock_connection(&state.db_connection)?;
    update_block(block_id, &form, &connection)?;

    Ok(Json(json!({ "message": "Block updated." })))
}

/// A route handler for deleting a block together with its units.
pub async fn delete_block_endpoint(
    State(state): State<BlockState>,
    Path(block_id): Path<BlockId>,
) -> Result<impl IntoResponse, Error> {
    let connection = lock_connection(&state.db_connection)?;

    let deleted_units = delete_block(block_id, &connection).inspect_err(|error| {
        tracing::error!("Could not delete block {block_id}: {error}");
    })?;

    Ok(Json(json!({
        "message": "Block and its units deleted.",
        "deleted_units": deleted_units,
    })))
}
