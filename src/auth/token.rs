//! Defines the claims carried in admin tokens and how tokens are signed and verified.

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::Error;

/// How long an admin token is valid after log-in.
pub const DEFAULT_TOKEN_DURATION: Duration = Duration::hours(1);

/// The claims of a signed admin token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminClaims {
    /// The admin's ID.
    pub sub: i64,
    /// The admin's display name.
    pub name: String,
    /// The admin's role.
    pub role: String,
    /// When the token was issued, as a unix timestamp.
    pub iat: i64,
    /// When the token expires, as a unix timestamp.
    pub exp: i64,
}

impl AdminClaims {
    /// Create claims issued now that expire after `duration`.
    pub fn new(admin_id: i64, name: &str, role: &str, duration: Duration) -> Self {
        let issued_at = OffsetDateTime::now_utc();

        Self {
            sub: admin_id,
            name: name.to_owned(),
            role: role.to_owned(),
            iat: issued_at.unix_timestamp(),
            exp: (issued_at + duration).unix_timestamp(),
        }
    }
}

/// Sign `claims` with HS256.
///
/// # Errors
/// Returns [Error::TokenCreation] if the claims could not be encoded.
pub fn encode_token(claims: &AdminClaims, key: &EncodingKey) -> Result<String, Error> {
    encode(&Header::default(), claims, key).map_err(|error| Error::TokenCreation(error.to_string()))
}

/// Verify the signature and expiry of `token` and return its claims.
///
/// # Errors
/// Returns [Error::InvalidToken] if the token is malformed, signed with another key or expired.
pub fn decode_token(token: &str, key: &DecodingKey) -> Result<AdminClaims, Error> {
    decode::<AdminClaims>(token, key, &Validation::default())
        .map(|data| data.claims)
        .map_err(|error| {
            tracing::debug!("Rejected token: {error}");
            Error::InvalidToken
        })
}

#[cfg(test)]
mod tests {
    use time::Duration;

    use crate::{
        Error,
        app_state::TokenKeys,
        auth::{AdminClaims, decode_token, encode_token},
    };

    #[test]
    fn token_round_trip_keeps_claims() {
        let keys = TokenKeys::from_secret("foobar");
        let claims = AdminClaims::new(3, "Ayşe", "admin", Duration::hours(1));

        let token = encode_token(&claims, &keys.encoding_key).unwrap();

        assert_eq!(decode_token(&token, &keys.decoding_key), Ok(claims));
    }

    #[test]
    fn expiry_is_one_hour_after_issue() {
        let claims = AdminClaims::new(3, "Ayşe", "admin", super::DEFAULT_TOKEN_DURATION);

        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn token_signed_with_other_key_is_invalid() {
        let claims = AdminClaims::new(3, "Ayşe", "admin", Duration::hours(1));
        let token = encode_token(&claims, &TokenKeys::from_secret("foo").encoding_key).unwrap();

        let result = decode_token(&token, &TokenKeys::from_secret("bar").decoding_key);

        assert_eq!(result, Err(Error::InvalidToken));
    }

    #[test]
    fn expired_token_is_invalid() {
        let keys = TokenKeys::from_secret("foobar");
        let claims = AdminClaims::new(3, "Ayşe", "admin", Duration::hours(-2));
        let token = encode_token(&claims, &keys.encoding_key).unwrap();

        assert_eq!(
            decode_token(&token, &keys.decoding_key),
            Err(Error::InvalidToken)
        );
    }
}
