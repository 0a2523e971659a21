//! Implements a struct that holds the state of the REST server.

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use jsonwebtoken::{DecodingKey, EncodingKey};
use rusqlite::Connection;
use time::Duration;

use crate::{Error, PasswordHash, auth::DEFAULT_TOKEN_DURATION, db::initialize};

/// The keys used for signing and verifying admin tokens.
#[derive(Clone)]
pub struct TokenKeys {
    /// Signs newly issued tokens.
    pub encoding_key: EncodingKey,
    /// Verifies tokens sent by clients.
    pub decoding_key: DecodingKey,
}

impl TokenKeys {
    /// Create the signing and verification keys from a shared `secret`.
    pub fn from_secret(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// The state of the REST server.
#[derive(Clone)]
pub struct AppState {
    /// The database connection shared by the request handlers and the billing job.
    pub db_connection: Arc<Mutex<Connection>>,

    /// The keys for issuing and checking admin tokens.
    pub token_keys: TokenKeys,

    /// How long an admin token stays valid after it is issued.
    pub token_duration: Duration,

    /// The local timezone as a canonical timezone name, e.g. "Europe/Istanbul".
    pub local_timezone: String,

    /// The directory where uploaded documents are stored.
    pub upload_dir: PathBuf,

    /// Whether the `x-admin-id` and `x-admin-name` headers are accepted as the caller's
    /// identity for requests without a bearer token.
    pub trust_actor_headers: bool,

    /// The bcrypt cost used when hashing resident and admin passwords.
    pub password_hash_cost: u32,
}

impl AppState {
    /// Create a new [AppState] with a SQLite database connection.
    ///
    /// This function will initialize the database by adding the tables for the domain models.
    /// `local_timezone` should be a valid, canonical timezone name, e.g. "Europe/Istanbul".
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized.
    pub fn new(
        db_connection: Connection,
        token_secret: &str,
        local_timezone: &str,
        upload_dir: PathBuf,
    ) -> Result<Self, Error> {
        initialize(&db_connection)?;

        Ok(Self {
            db_connection: Arc::new(Mutex::new(db_connection)),
            token_keys: TokenKeys::from_secret(token_secret),
            token_duration: DEFAULT_TOKEN_DURATION,
            local_timezone: local_timezone.to_owned(),
            upload_dir,
            trust_actor_headers: false,
            password_hash_cost: PasswordHash::DEFAULT_COST,
        })
    }

    /// Accept the legacy actor headers for requests that do not carry a bearer token.
    pub fn with_trusted_actor_headers(mut self, trust_actor_headers: bool) -> Self {
        self.trust_actor_headers = trust_actor_headers;
        self
    }
}
