//! Password validation and hashing.
//!
//! `ValidatedPassword` wraps a string and ensures it is a strong password, it is required
//! for admin accounts. `PasswordHash` is the salted bcrypt hash that is stored for both
//! admins and unit logins; plaintext passwords are never written to the database.

use std::fmt::Display;

use bcrypt::{BcryptError, hash, verify};
use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use zxcvbn::{Score, feedback::Feedback, zxcvbn};

use crate::Error;

/// A password that has been validated, but not yet hashed.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedPassword(String);

impl ValidatedPassword {
    /// Create and validate a new password from a string.
    ///
    /// `user_inputs` are strings such as the username that should make a password weaker
    /// if they appear in it.
    ///
    /// # Errors
    ///
    /// This function will return an error if the password is considered too weak.
    /// The error message will explain why and suggest how to make it stronger.
    pub fn new(raw_password: &str, user_inputs: &[&str]) -> Result<Self, Error> {
        let password_analysis = zxcvbn(raw_password, user_inputs);

        match password_analysis.score() {
            Score::Three | Score::Four => Ok(Self(raw_password.to_owned())),
            _ => Err(Error::TooWeak(
                password_analysis
                    .feedback()
                    .unwrap_or(&Feedback::default())
                    .to_string(),
            )),
        }
    }

    /// Create a new `ValidatedPassword` without any validation.
    ///
    /// Resident passwords are set by the site administrators and are not strength checked.
    pub fn new_unchecked(raw_password: &str) -> Self {
        Self(raw_password.to_owned())
    }
}

impl Display for ValidatedPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", str::repeat("*", 8))
    }
}

/// A salted and hashed password.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// An alias for the default encryption cost for hashing passwords.
    pub const DEFAULT_COST: u32 = bcrypt::DEFAULT_COST;

    /// Create a hashed password from a validated password with the specified `cost`.
    ///
    /// Pass in [PasswordHash::DEFAULT_COST] to use the recommended cost. Tests use
    /// `bcrypt::MIN_COST` to stay fast.
    ///
    /// # Errors
    ///
    /// This function will return an error if the password could not be hashed.
    pub fn new(password: ValidatedPassword, cost: u32) -> Result<Self, Error> {
        hash(&password.0, cost)
            .map(Self)
            .map_err(|error| Error::HashingError(error.to_string()))
    }

    /// Create a new `PasswordHash` from a hash that was read from storage.
    pub fn new_unchecked(raw_password_hash: &str) -> Self {
        Self(raw_password_hash.to_owned())
    }

    /// Check that `raw_password` matches the stored password.
    pub fn verify(&self, raw_password: &str) -> Result<bool, BcryptError> {
        verify(raw_password, &self.0)
    }
}

impl AsRef<str> for PasswordHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl ToSql for PasswordHash {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0.as_str()))
    }
}

impl FromSql for PasswordHash {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value.as_str().map(Self::new_unchecked)
    }
}

#[cfg(test)]
mod validated_password_tests {
    use crate::{Error, password::ValidatedPassword};

    #[test]
    fn new_fails_on_empty() {
        let result = ValidatedPassword::new("", &[]);

        assert!(matches!(result, Err(Error::TooWeak(_))));
    }

    #[test]
    fn new_fails_on_password_containing_username() {
        let result = ValidatedPassword::new("manager1", &["manager"]);

        assert!(matches!(result, Err(Error::TooWeak(_))));
    }

    #[test]
    fn new_succeeds_on_strong_password() {
        let result = ValidatedPassword::new("correct horse battery staple", &[]);

        assert!(result.is_ok());
    }

    #[test]
    fn display_hides_password() {
        let password = ValidatedPassword::new_unchecked("hunter2");

        assert_eq!(password.to_string(), "********");
    }
}

#[cfg(test)]
mod password_hash_tests {
    use crate::password::{PasswordHash, ValidatedPassword};

    #[test]
    fn verify_succeeds_with_same_password() {
        let hash =
            PasswordHash::new(ValidatedPassword::new_unchecked("hunter2"), 4)
                .unwrap();

        assert!(hash.verify("hunter2").unwrap());
    }

    #[test]
    fn verify_fails_with_different_password() {
        let hash =
            PasswordHash::new(ValidatedPassword::new_unchecked("hunter2"), 4)
                .unwrap();

        assert!(!hash.verify("hunter3").unwrap());
    }

    #[test]
    fn hash_is_salted() {
        let first =
            PasswordHash::new(ValidatedPassword::new_unchecked("hunter2"), 4)
                .unwrap();
        let second =
            PasswordHash::new(ValidatedPassword::new_unchecked("hunter2"), 4)
                .unwrap();

        assert_ne!(first, second);
    }
}
