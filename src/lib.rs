//! Site manager is the administrative backend for residential sites.
//!
//! This library provides a JSON REST API for managing sites, their blocks and apartment
//! units, resident requests, announcements, a document archive, and the finance workflows
//! (charges, collections and the recurring dues billing job).

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde_json::json;
use tokio::{signal, sync::watch};

mod announcement;
mod app_state;
mod audit;
mod auth;
mod billing;
mod block;
mod database_id;
mod db;
mod document;
mod endpoints;
mod finance;
mod maintenance;
mod password;
mod routing;
mod site;
mod stats;
#[cfg(test)]
mod test_utils;
mod timezone;
mod unit;

pub use app_state::AppState;
pub use auth::{AdminId, create_admin};
pub use billing::{BillingOutcome, run_billing_scheduler};
pub use db::initialize as initialize_db;
pub use password::{PasswordHash, ValidatedPassword};
pub use routing::build_router;

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first,
/// then signals the server to shut down gracefully and tells background jobs to stop via
/// `background_jobs`.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>, background_jobs: watch::Sender<bool>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::debug!("Received ctrl+c signal."),
        _ = terminate => tracing::debug!("Received terminate signal."),
    }

    if background_jobs.send(true).is_err() {
        tracing::debug!("No background jobs were listening for the shutdown signal.");
    }

    handle.graceful_shutdown(Some(Duration::from_secs(1)));
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The username and password did not match a known account.
    #[error("invalid username or password")]
    InvalidCredentials,

    /// The bearer token was malformed, had an invalid signature or has expired.
    #[error("invalid or expired token")]
    InvalidToken,

    /// A signed token could not be created.
    ///
    /// The error string should only be logged on the server.
    #[error("could not create token: {0}")]
    TokenCreation(String),

    /// The user provided a password that is too easy to guess.
    #[error("password is too weak: {0}")]
    TooWeak(String),

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    /// When communicating with the application client this error should be
    /// replaced with a general error type indicating an internal server error.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// A query referenced a row that does not exist, e.g. a unit for a block ID that is not
    /// in the database.
    #[error("a referenced record does not exist")]
    InvalidForeignKey,

    /// A UNIQUE constraint failed, e.g. a login name that is already used by another unit.
    #[error("the record already exists")]
    DuplicateEntry,

    /// A bulk operation was called with an empty list of IDs.
    #[error("the list of IDs must not be empty")]
    EmptyIdList,

    /// A bulk unit creation asked for more units than allowed in one request.
    #[error("cannot create {0} units at once, the limit is {max}", max = unit::MAX_BULK_UNITS)]
    TooManyUnits(u32),

    /// The billing day of the month is outside of 1..=31.
    #[error("billing day must be between 1 and 31, got {0}")]
    InvalidBillingDay(u8),

    /// The multipart form could not be parsed.
    #[error("could not parse multipart form: {0}")]
    MultipartError(String),

    /// A document upload did not include a file.
    #[error("the upload did not contain a file")]
    MissingFile,

    /// An uploaded file could not be written to or removed from storage.
    #[error("could not access file storage: {0}")]
    FileStorageError(String),

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock.
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// An error occurred while getting the local timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezoneError(String),

    /// Tried to update a site that does not exist.
    #[error("tried to update a site that is not in the database")]
    UpdateMissingSite,

    /// Tried to delete a site that does not exist.
    #[error("tried to delete a site that is not in the database")]
    DeleteMissingSite,

    /// Tried to update a block that does not exist.
    #[error("tried to update a block that is not in the database")]
    UpdateMissingBlock,

    /// Tried to delete a block that does not exist.
    #[error("tried to delete a block that is not in the database")]
    DeleteMissingBlock,

    /// Tried to update a unit that does not exist.
    #[error("tried to update a unit that is not in the database")]
    UpdateMissingUnit,

    /// Tried to delete a unit that does not exist.
    #[error("tried to delete a unit that is not in the database")]
    DeleteMissingUnit,

    /// Tried to update a maintenance request that does not exist.
    #[error("tried to update a request that is not in the database")]
    UpdateMissingRequest,

    /// Tried to delete a maintenance request that does not exist.
    #[error("tried to delete a request that is not in the database")]
    DeleteMissingRequest,

    /// Tried to delete an announcement that does not exist.
    #[error("tried to delete an announcement that is not in the database")]
    DeleteMissingAnnouncement,

    /// Tried to delete a debt that does not exist.
    #[error("tried to delete a debt that is not in the database")]
    DeleteMissingDebt,

    /// Tried to update a document that does not exist.
    #[error("tried to update a document that is not in the database")]
    UpdateMissingDocument,

    /// Tried to delete a document that does not exist.
    #[error("tried to delete a document that is not in the database")]
    DeleteMissingDocument,
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            // Code 787 occurs when a FOREIGN KEY constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, _) if sql_error.extended_code == 787 => {
                Error::InvalidForeignKey
            }
            // Code 2067 occurs when a UNIQUE constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, _) if sql_error.extended_code == 2067 => {
                Error::DuplicateEntry
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::NotFound
            | Error::UpdateMissingSite
            | Error::DeleteMissingSite
            | Error::UpdateMissingBlock
            | Error::DeleteMissingBlock
            | Error::UpdateMissingUnit
            | Error::DeleteMissingUnit
            | Error::UpdateMissingRequest
            | Error::DeleteMissingRequest
            | Error::DeleteMissingAnnouncement
            | Error::DeleteMissingDebt
            | Error::UpdateMissingDocument
            | Error::DeleteMissingDocument => StatusCode::NOT_FOUND,
            Error::EmptyIdList
            | Error::TooManyUnits(_)
            | Error::InvalidBillingDay(_)
            | Error::MultipartError(_)
            | Error::MissingFile
            | Error::InvalidForeignKey
            | Error::DuplicateEntry
            | Error::TooWeak(_) => StatusCode::BAD_REQUEST,
            Error::InvalidCredentials | Error::InvalidToken => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            // Internal errors are not intended to be shown to the client.
            tracing::error!("An unexpected error occurred: {}", self);
            "An unexpected error occurred, check the server logs for more details.".to_owned()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod error_response_tests {
    use axum::{http::StatusCode, response::IntoResponse};

    use crate::Error;

    async fn get_body_text(error: Error) -> (StatusCode, String) {
        let response = error.into_response();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        (status, String::from_utf8_lossy(&body).to_string())
    }

    #[tokio::test]
    async fn not_found_errors_map_to_404() {
        let (status, body) = get_body_text(Error::DeleteMissingBlock).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains("block"), "got body {body}");
    }

    #[tokio::test]
    async fn empty_id_list_maps_to_400() {
        let (status, _) = get_body_text(Error::EmptyIdList).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn sql_errors_do_not_leak_details() {
        let (status, body) = get_body_text(Error::SqlError(
            rusqlite::Error::InvalidColumnName("secret_column".to_owned()),
        ))
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.contains("secret_column"), "got body {body}");
    }

    #[test]
    fn no_rows_becomes_not_found() {
        assert_eq!(
            Error::from(rusqlite::Error::QueryReturnedNoRows),
            Error::NotFound
        );
    }
}
