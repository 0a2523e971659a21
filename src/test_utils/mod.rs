#![allow(missing_docs)]

pub(crate) mod http;

use std::{
    path::PathBuf,
    sync::atomic::{AtomicUsize, Ordering},
};

use axum_test::TestServer;
use rusqlite::Connection;

use crate::{
    AppState, build_router,
    database_id::DatabaseId,
    db::{initialize, lock_connection},
};

pub(crate) use http::{assert_json_error, bearer_token_for};

pub(crate) const TEST_SECRET: &str = "a very secret test key";

static NEXT_UPLOAD_DIR: AtomicUsize = AtomicUsize::new(0);

#[track_caller]
pub(crate) fn get_test_connection() -> Connection {
    let connection = Connection::open_in_memory().expect("Could not open in-memory database");
    initialize(&connection).expect("Could not initialize database");
    connection
}

/// A unique, not yet created directory for a test's uploaded files.
pub(crate) fn get_test_upload_dir() -> PathBuf {
    std::env::temp_dir().join(format!(
        "site_manager_test_{}_{}",
        std::process::id(),
        NEXT_UPLOAD_DIR.fetch_add(1, Ordering::SeqCst)
    ))
}

#[track_caller]
pub(crate) fn get_test_state() -> AppState {
    let mut state = AppState::new(
        Connection::open_in_memory().expect("Could not open in-memory database"),
        TEST_SECRET,
        "Europe/Istanbul",
        get_test_upload_dir(),
    )
    .expect("Could not create app state");
    state.password_hash_cost = 4;
    state
}

#[track_caller]
pub(crate) fn get_test_server() -> (TestServer, AppState) {
    get_test_server_with_state(get_test_state())
}

#[track_caller]
pub(crate) fn get_test_server_with_state(state: AppState) -> (TestServer, AppState) {
    let server =
        TestServer::new(build_router(state.clone()));

    (server, state)
}

#[track_caller]
pub(crate) fn with_connection<T>(state: &AppState, f: impl FnOnce(&Connection) -> T) -> T {
    let connection = lock_connection(&state.db_connection).expect("Could not lock database");
    f(&connection)
}

#[track_caller]
pub(crate) fn count_rows(table: &str, connection: &Connection) -> i64 {
    connection
        .query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |row| {
            row.get(0)
        })
        .expect("Could not count rows")
}

#[track_caller]
pub(crate) fn insert_site(name: &str, connection: &Connection) -> DatabaseId {
    connection
        .execute("INSERT INTO site (name) VALUES (?1)", (name,))
        .expect("Could not insert site");
    connection.last_insert_rowid()
}

#[track_caller]
pub(crate) fn insert_block(site_id: DatabaseId, name: &str, connection: &Connection) -> DatabaseId {
    connection
        .execute(
            "INSERT INTO block (site_id, name) VALUES (?1, ?2)",
            (site_id, name),
        )
        .expect("Could not insert block");
    connection.last_insert_rowid()
}

#[track_caller]
pub(crate) fn insert_unit(
    block_id: DatabaseId,
    unit_number: &str,
    active: bool,
    connection: &Connection,
) -> DatabaseId {
    connection
        .execute(
            "INSERT INTO unit (block_id, unit_number, status) VALUES (?1, ?2, ?3)",
            (block_id, unit_number, if active { "active" } else { "inactive" }),
        )
        .expect("Could not insert unit");
    connection.last_insert_rowid()
}

/// Insert a site with one block and return the block's ID.
#[track_caller]
pub(crate) fn insert_site_with_block(connection: &Connection) -> DatabaseId {
    let site_id = insert_site("Test Site", connection);
    insert_block(site_id, "A", connection)
}
