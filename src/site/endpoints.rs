//! Route handlers for sites.

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
    db::lock_connection,
    site::{
        SiteForm, SiteId, create_site, delete_site, get_all_sites, get_site, update_site,
    },
};

/// The state needed to manage sites.
#[derive(Debug, Clone)]
pub struct SiteState {
    /// The database connection for managing sites.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for SiteState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The request body for creating a site.
#[derive(Debug, Deserialize)]
pub struct NewSite {
    /// The display name of the site.
    pub name: String,
}

/// A route handler for listing all sites by name.
pub async fn get_sites_endpoint(
    State(state): State<SiteState>,
) -> Result<impl IntoResponse, Error> {
    let connection = lock_connection(&state.db_connection)?;

    Ok(Json(get_all_sites(&connection)?))
}

/// A route handler for getting a site by its ID, responds with 404 if it does not exist.
pub async fn get_site_endpoint(
    State(state): State<SiteState>,
    Path(site_id): Path<SiteId>,
) -> Result<impl IntoResponse, Error> {
    let connection = lock_connection(&state.db_connection)?;

    Ok(Json(get_site(site_id, &connection)?))
}

/// A route handler for creating a site, responds with the new site.
pub async fn create_site_endpoint(
    State(state): State<SiteState>,
    Json(new_site): Json<NewSite>,
) -> Result<impl IntoResponse, Error> {
    let connection = lock_connection(&state.db_connection)?;
    let site = create_site(&new_site.name, &connection)?;

    Ok((StatusCode::CREATED, Json(site)))
}

/// A route handler for updating the details of a site and its manager.
pub async fn update_site_endpoint(
    State(state): State<SiteState>,
    Path(site_id): Path<SiteId>,
    Json(form): Json<SiteForm>,
) -> Result<impl IntoResponse, Error> {
    let connection = lock_connection(&state.db_connection)?;
    update_site(site_id, &form, &connection)?;

    Ok(Json(json!({ "message": "Site and manager details updated." })))
}

/// A route handler for deleting a site with all of its blocks and units.
pub async fn delete_site_endpoint(
    State(state): State<SiteState>,
    Path(site_id): Path<SiteId>,
) -> Result<impl IntoResponse, Error> {
    let connection = lock_connection(&state.db_connection)?;

    let deletion = delete_site(site_id, &connection).inspect_err(|error| {
        tracing::error!("Could not delete site {site_id}: {error}");
    })?;

    Ok(Json(json!({
        "message": "Site and all of its data deleted.",
        "deleted_blocks": deletion.blocks,
        "deleted_units": deletion.units,
    })))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::{Value, json};

    use crate::{
        endpoints::{self, format_endpoint},
        test_utils::{count_rows, get_test_server, insert_block, insert_unit, with_connection},
    };

    #[tokio::test]
    async fn create_then_get_site() {
        let (server, _) = get_test_server();

        let response = server
            .post(endpoints::SITES)
            .json(&json!({ "name": "Sunny Gardens" }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let id = response.json::<Value>()["id"].as_i64().unwrap();

        let site = server
            .get(&format_endpoint(endpoints::SITE, id))
            .await
            .json::<Value>();

        assert_eq!(site["name"], "Sunny Gardens");
    }

    #[tokio::test]
    async fn get_missing_site_is_404() {
        let (server, _) = get_test_server();

        server
            .get(&format_endpoint(endpoints::SITE, 404))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn update_stores_normalized_iban() {
        let (server, state) = get_test_server();
        let id = server
            .post(endpoints::SITES)
            .json(&json!({ "name": "Sunny Gardens" }))
            .await
            .json::<Value>()["id"]
            .as_i64()
            .unwrap();

        server
            .put(&format_endpoint(endpoints::SITE, id))
            .json(&json!({ "name": "Sunny Gardens", "iban": "tr12 3456" }))
            .await
            .assert_status_ok();

        let iban: String = with_connection(&state, |connection| {
            connection
                .query_row("SELECT iban FROM site WHERE id = ?1", [id], |row| row.get(0))
                .unwrap()
        });
        assert_eq!(iban, "TR123456");
    }

    #[tokio::test]
    async fn delete_cascades_to_blocks_and_units() {
        let (server, state) = get_test_server();
        let id = server
            .post(endpoints::SITES)
            .json(&json!({ "name": "Sunny Gardens" }))
            .await
            .json::<Value>()["id"]
            .as_i64()
            .unwrap();
        with_connection(&state, |connection| {
            let block = insert_block(id, "A", connection);
            insert_unit(block, "1", true, connection);
        });

        let response = server.delete(&format_endpoint(endpoints::SITE, id)).await;

        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["deleted_units"], 1);
        with_connection(&state, |connection| {
            assert_eq!(count_rows("site", connection), 0);
            assert_eq!(count_rows("block", connection), 0);
            assert_eq!(count_rows("unit", connection), 0);
        });
    }

    #[tokio::test]
    async fn delete_missing_site_is_404() {
        let (server, _) = get_test_server();

        server
            .delete(&format_endpoint(endpoints::SITE, 12))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
