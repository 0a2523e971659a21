//! Resolves who is making a request and where it came from.

use std::{convert::Infallible, net::SocketAddr};

use axum::{
    extract::{ConnectInfo, FromRef, FromRequestParts},
    http::{HeaderMap, request::Parts},
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use jsonwebtoken::DecodingKey;
use serde::Serialize;

use crate::{AppState, auth::decode_token};

const ADMIN_ID_HEADER: &str = "x-admin-id";
const ADMIN_NAME_HEADER: &str = "x-admin-name";
const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";
const FALLBACK_IP: &str = "127.0.0.1";

/// The person, or system, responsible for a change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Actor {
    /// The admin's ID, 0 if unknown.
    pub id: i64,
    /// The admin's display name.
    pub name: String,
}

impl Actor {
    /// The actor recorded when a request does not identify its caller.
    pub fn unknown() -> Self {
        Self {
            id: 0,
            name: "unknown system".to_owned(),
        }
    }
}

/// The state needed to identify a caller.
#[derive(Clone)]
pub struct CallerState {
    /// Verifies admin tokens.
    pub decoding_key: DecodingKey,
    /// Whether the `x-admin-id` and `x-admin-name` headers are believed.
    pub trust_actor_headers: bool,
}

impl FromRef<AppState> for CallerState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            decoding_key: state.token_keys.decoding_key.clone(),
            trust_actor_headers: state.trust_actor_headers,
        }
    }
}

/// The actor and client IP address of a request.
///
/// Extracting a caller never fails: requests that do not identify their caller are attributed
/// to [Actor::unknown].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerContext {
    /// Who made the request.
    pub actor: Actor,
    /// The client's IP address.
    pub ip: String,
}

impl CallerContext {
    /// Resolve the caller from the request headers and the connection address.
    ///
    /// The actor is taken from a valid bearer token, then from the legacy actor headers if
    /// they are trusted, and is otherwise unknown.
    pub fn resolve(
        headers: &HeaderMap,
        remote_addr: Option<SocketAddr>,
        state: &CallerState,
    ) -> Self {
        let actor = actor_from_token(headers, &state.decoding_key)
            .or_else(|| {
                state
                    .trust_actor_headers
                    .then(|| actor_from_headers(headers))
                    .flatten()
            })
            .unwrap_or_else(Actor::unknown);

        Self {
            actor,
            ip: client_ip(headers, remote_addr),
        }
    }
}

impl<S> FromRequestParts<S> for CallerContext
where
    CallerState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = CallerState::from_ref(state);
        let remote_addr = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Ok(Self::resolve(&parts.headers, remote_addr, &state))
    }
}

fn actor_from_token(headers: &HeaderMap, decoding_key: &DecodingKey) -> Option<Actor> {
    let Authorization(bearer) = headers.typed_get::<Authorization<Bearer>>()?;

    match decode_token(bearer.token(), decoding_key) {
        Ok(claims) => Some(Actor {
            id: claims.sub,
            name: claims.name,
        }),
        Err(_) => {
            tracing::warn!("Ignoring invalid bearer token when resolving the caller.");
            None
        }
    }
}

fn actor_from_headers(headers: &HeaderMap) -> Option<Actor> {
    let id = headers
        .get(ADMIN_ID_HEADER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()?;
    let name = headers
        .get(ADMIN_NAME_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
        .unwrap_or_else(|| Actor::unknown().name);

    Some(Actor { id, name })
}

fn client_ip(headers: &HeaderMap, remote_addr: Option<SocketAddr>) -> String {
    headers
        .get(FORWARDED_FOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_owned)
        .or_else(|| remote_addr.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| FALLBACK_IP.to_owned())
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use axum::http::{HeaderMap, HeaderValue, header::AUTHORIZATION};
    use time::Duration;

    use crate::{
        app_state::TokenKeys,
        audit::{Actor, CallerContext, CallerState},
        auth::{AdminClaims, encode_token},
    };

    fn state(trust_actor_headers: bool) -> (CallerState, TokenKeys) {
        let keys = TokenKeys::from_secret("audit");
        (
            CallerState {
                decoding_key: keys.decoding_key.clone(),
                trust_actor_headers,
            },
            keys,
        )
    }

    fn legacy_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-admin-id", HeaderValue::from_static("7"));
        headers.insert("x-admin-name", HeaderValue::from_static("Legacy Admin"));
        headers
    }

    #[test]
    fn bearer_token_identifies_actor() {
        let (state, keys) = state(true);
        let claims = AdminClaims::new(3, "Ayşe", "admin", Duration::hours(1));
        let token = encode_token(&claims, &keys.encoding_key).unwrap();
        let mut headers = legacy_headers();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );

        let caller = CallerContext::resolve(&headers, None, &state);

        assert_eq!(
            caller.actor,
            Actor {
                id: 3,
                name: "Ayşe".to_owned()
            }
        );
    }

    #[test]
    fn legacy_headers_are_ignored_unless_trusted() {
        let (state, _) = state(false);

        let caller = CallerContext::resolve(&legacy_headers(), None, &state);

        assert_eq!(caller.actor, Actor::unknown());
    }

    #[test]
    fn trusted_legacy_headers_identify_actor() {
        let (state, _) = state(true);

        let caller = CallerContext::resolve(&legacy_headers(), None, &state);

        assert_eq!(caller.actor.id, 7);
        assert_eq!(caller.actor.name, "Legacy Admin");
    }

    #[test]
    fn invalid_token_falls_back_to_unknown() {
        let (state, _) = state(false);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer not-a-jwt"));

        let caller = CallerContext::resolve(&headers, None, &state);

        assert_eq!(caller.actor, Actor::unknown());
    }

    #[test]
    fn ip_prefers_forwarded_for_then_connection() {
        let (state, _) = state(false);
        let remote: SocketAddr = "10.0.0.9:5123".parse().unwrap();
        let mut headers = HeaderMap::new();

        assert_eq!(CallerContext::resolve(&headers, None, &state).ip, "127.0.0.1");
        assert_eq!(
            CallerContext::resolve(&headers, Some(remote), &state).ip,
            "10.0.0.9"
        );

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.5, 10.0.0.1"),
        );
        assert_eq!(
            CallerContext::resolve(&headers, Some(remote), &state).ip,
            "203.0.113.5"
        );
    }
}
