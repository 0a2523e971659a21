use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use rusqlite::Connection;
use serde_json::json;
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    db::lock_connection,
    maintenance::{
        NewRequest, RequestId, RequestUpdate, create_request, delete_request, get_admin_requests,
        get_unit_requests, update_request,
    },
    unit::UnitId,
};

/// The most requests shown to administrators at once.
const ADMIN_REQUEST_LIMIT: u32 = 50;

/// The state needed for maintenance requests.
#[derive(Debug, Clone)]
pub struct MaintenanceState {
    /// The database connection for managing requests.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for MaintenanceState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler for a resident raising a request.
pub async fn create_request_endpoint(
    State(state): State<MaintenanceState>,
    Json(new_request): Json<NewRequest>,
) -> Result<impl IntoResponse, Error> {
    let connection = lock_connection(&state.db_connection)?;
    let request = create_request(&new_request, OffsetDateTime::now_utc(), &connection)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Request created.", "id": request.id })),
    ))
}

/// A route handler for the requests of one unit.
pub async fn get_unit_requests_endpoint(
    State(state): State<MaintenanceState>,
    Path(unit_id): Path<UnitId>,
) -> Result<impl IntoResponse, Error> {
    let connection = lock_connection(&state.db_connection)?;

    Ok(Json(get_unit_requests(unit_id, &connection)?))
}

/// A route handler for the administrators' request queue.
pub async fn get_admin_requests_endpoint(
    State(state): State<MaintenanceState>,
) -> Result<impl IntoResponse, Error> {
    let connection = lock_connection(&state.db_connection)?;

    Ok(Json(get_admin_requests(ADMIN_REQUEST_LIMIT, &connection)?))
}

/// A route handler for answering a request.
pub async fn update_request_endpoint(
    State(state): State<MaintenanceState>,
    Path(request_id): Path<RequestId>,
    Json(update): Json<RequestUpdate>,
) -> Result<impl IntoResponse, Error> {
    let connection = lock_connection(&state.db_connection)?;
    update_request(request_id, &update, OffsetDateTime::now_utc(), &connection)?;

    Ok(Json(json!({ "message": "Request updated." })))
}

/// A route handler for deleting a request.
pub async fn delete_request_endpoint(
    State(state): State<MaintenanceState>,
    Path(request_id): Path<RequestId>,
) -> Result<impl IntoResponse, Error> {
    let connection = lock_connection(&state.db_connection)?;
    delete_request(request_id, &connection)?;

    Ok(Json(json!({ "message": "Request deleted." })))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::{Value, json};

    use crate::{
        endpoints::{self, format_endpoint},
        test_utils::{
            assert_json_error, get_test_server, insert_site_with_block, insert_unit,
            with_connection,
        },
    };

    #[tokio::test]
    async fn resident_raises_and_admin_resolves_request() {
        let (server, state) = get_test_server();
        let unit_id = with_connection(&state, |connection| {
            insert_unit(insert_site_with_block(connection), "3", true, connection)
        });

        let response = server
            .post(endpoints::REQUESTS)
            .json(&json!({
                "unit_id": unit_id,
                "subject": "Broken light",
                "description": "The stairwell light is out.",
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let request_id = response.json::<Value>()["id"].as_i64().unwrap();

        server
            .put(&format_endpoint(endpoints::ADMIN_REQUEST, request_id))
            .json(&json!({ "status": "resolved", "admin_note": "Bulb replaced." }))
            .await
            .assert_status_ok();

        let requests = server
            .get(&format_endpoint(endpoints::UNIT_REQUESTS, unit_id))
            .await
            .json::<Vec<Value>>();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0]["status"], "resolved");
        assert_eq!(requests[0]["admin_note"], "Bulb replaced.");
        assert_eq!(requests[0]["resident_name"], "unknown resident");
        assert!(requests[0]["updated_at"].is_string());

        let queue = server.get(endpoints::ADMIN_REQUESTS).await.json::<Vec<Value>>();
        assert_eq!(queue[0]["unit_number"], "3");
    }

    #[tokio::test]
    async fn delete_request_twice_is_404() {
        let (server, state) = get_test_server();
        let unit_id = with_connection(&state, |connection| {
            insert_unit(insert_site_with_block(connection), "3", true, connection)
        });
        let request_id = server
            .post(endpoints::REQUESTS)
            .json(&json!({ "unit_id": unit_id, "subject": "Noise" }))
            .await
            .json::<Value>()["id"]
            .as_i64()
            .unwrap();

        server
            .delete(&format_endpoint(endpoints::ADMIN_REQUEST, request_id))
            .await
            .assert_status_ok();
        let response = server
            .delete(&format_endpoint(endpoints::ADMIN_REQUEST, request_id))
            .await;

        assert_json_error(&response, StatusCode::NOT_FOUND);
    }
}
