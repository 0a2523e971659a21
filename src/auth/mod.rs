//! Authentication for site administrators and residents.
//!
//! Administrators log in with a username and password and receive a signed, time-limited
//! token. Residents log in with the login name and password of their unit.

mod admin;
mod log_in;
mod token;

pub use admin::{Admin, AdminId, create_admin, create_admin_table, get_admin_by_username};
pub use log_in::{admin_log_in_endpoint, resident_log_in_endpoint};
pub use token::{AdminClaims, DEFAULT_TOKEN_DURATION, decode_token, encode_token};
