//! Headline numbers for the admin dashboard.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
    response::IntoResponse,
};
use rusqlite::Connection;
use serde::Serialize;

use crate::{
    AppState, Error, db::lock_connection, maintenance::count_pending_requests, unit::UnitStatus,
};

/// Counts of units and open requests across all sites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteStats {
    /// The number of units.
    pub total_units: i64,
    /// The number of occupied units.
    pub active_units: i64,
    /// The number of maintenance requests waiting for an administrator.
    pub pending_requests: i64,
}

/// Count the units and pending maintenance requests.
pub fn get_site_stats(connection: &Connection) -> Result<SiteStats, Error> {
    let (total_units, active_units) = connection.query_row(
        "SELECT COUNT(*), COALESCE(SUM(status = ?1), 0) FROM unit",
        [UnitStatus::Active],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    Ok(SiteStats {
        total_units,
        active_units,
        pending_requests: count_pending_requests(connection)?,
    })
}

/// The state needed for the dashboard stats.
#[derive(Debug, Clone)]
pub struct StatsState {
    /// The database connection to count rows in.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for StatsState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler for the dashboard stats.
pub async fn get_stats_endpoint(
    State(state): State<StatsState>,
) -> Result<impl IntoResponse, Error> {
    let connection = lock_connection(&state.db_connection)?;

    Ok(Json(get_site_stats(&connection)?))
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};
    use time::macros::datetime;

    use crate::{
        endpoints,
        maintenance::{NewRequest, create_request},
        stats::{SiteStats, get_site_stats},
        test_utils::{
            get_test_connection, get_test_server, insert_site_with_block, insert_unit,
            with_connection,
        },
    };

    #[test]
    fn empty_database_has_zero_counts() {
        let connection = get_test_connection();

        assert_eq!(
            get_site_stats(&connection),
            Ok(SiteStats {
                total_units: 0,
                active_units: 0,
                pending_requests: 0
            })
        );
    }

    #[tokio::test]
    async fn counts_units_and_pending_requests() {
        let (server, state) = get_test_server();
        with_connection(&state, |connection| {
            let block_id = insert_site_with_block(connection);
            let unit_id = insert_unit(block_id, "1", true, connection);
            insert_unit(block_id, "2", false, connection);
            insert_unit(block_id, "3", true, connection);
            create_request(
                &NewRequest {
                    unit_id,
                    subject: "Leak".to_owned(),
                    description: String::new(),
                },
                datetime!(2024-03-01 09:00 UTC),
                connection,
            )
            .unwrap();
        });

        let stats = server.get(endpoints::STATS).await.json::<Value>();

        assert_eq!(
            stats,
            json!({ "total_units": 3, "active_units": 2, "pending_requests": 1 })
        );
    }
}
