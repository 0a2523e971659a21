//! Middleware that records every successful change made through the API.

use axum::{
    Json,
    body::{Body, Bytes, to_bytes},
    extract::{Request, State},
    http::{HeaderMap, Method, StatusCode, header::CONTENT_LENGTH, header::CONTENT_TYPE},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use time::OffsetDateTime;

use crate::{
    audit::{CallerContext, NewAuditEntry, db::AuditLogState, record_event},
    db::lock_connection,
};

/// The largest non-multipart body that is buffered for the audit log.
const MAX_AUDITED_BODY_BYTES: usize = 1024 * 1024;

const REDACTED: &str = "********";

/// Middleware that appends an audit log entry for each successful POST, PUT, PATCH or DELETE.
///
/// The entry holds the caller, the method and path, a snapshot of the request body with
/// passwords redacted, and the client IP. It is written in a background task after the
/// response is ready; failures are logged and never affect the response.
pub async fn audit_middleware(
    State(state): State<AuditLogState>,
    caller: CallerContext,
    request: Request,
    next: Next,
) -> Response {
    if !is_mutating(request.method()) {
        return next.run(request).await;
    }

    let action = format!("{} {}", request.method(), request.uri().path());
    let (parts, body) = request.into_parts();

    let (snapshot, body) = if is_multipart(&parts.headers) {
        (multipart_summary(&parts.headers), body)
    } else {
        let bytes = match to_bytes(body, MAX_AUDITED_BODY_BYTES).await {
            Ok(bytes) => bytes,
            Err(error) => {
                tracing::warn!("Could not buffer request body for {action}: {error}");
                return (
                    StatusCode::PAYLOAD_TOO_LARGE,
                    Json(json!({ "error": "request body is too large" })),
                )
                    .into_response();
            }
        };
        (body_snapshot(&bytes), Body::from(bytes))
    };

    let response = next.run(Request::from_parts(parts, body)).await;

    if response.status().is_client_error() || response.status().is_server_error() {
        return response;
    }

    let db_connection = state.db_connection.clone();
    tokio::spawn(async move {
        let detail = format!("payload: {snapshot}");
        let entry = NewAuditEntry {
            actor: &caller.actor,
            action: &action,
            detail: &detail,
            ip_address: &caller.ip,
            created_at: OffsetDateTime::now_utc(),
        };

        let result = lock_connection(&db_connection)
            .and_then(|connection| record_event(&entry, &connection));
        if let Err(error) = result {
            tracing::error!("Could not write audit log entry for {action}: {error}");
        }
    });

    response
}

fn is_mutating(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|content_type| content_type.starts_with("multipart/"))
}

fn multipart_summary(headers: &HeaderMap) -> String {
    match headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|length| length.parse::<u64>().ok())
    {
        Some(length) => format!("<multipart form, {length} bytes>"),
        None => "<multipart form>".to_owned(),
    }
}

/// Render a request body for the audit log, redacting any password fields in JSON bodies.
fn body_snapshot(bytes: &Bytes) -> String {
    if bytes.is_empty() {
        return "{}".to_owned();
    }

    match serde_json::from_slice::<Value>(bytes) {
        Ok(mut value) => {
            redact_passwords(&mut value);
            value.to_string()
        }
        Err(_) => String::from_utf8_lossy(bytes).into_owned(),
    }
}

fn redact_passwords(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, field) in map.iter_mut() {
                if key.to_lowercase().contains("password") {
                    *field = Value::String(REDACTED.to_owned());
                } else {
                    redact_passwords(field);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact_passwords),
        _ => {}
    }
}
