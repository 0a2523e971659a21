use axum::http::StatusCode;
use axum_test::TestResponse;
use serde_json::Value;

use crate::{
    AppState,
    auth::{AdminClaims, encode_token},
};

#[track_caller]
pub(crate) fn assert_json_error(response: &TestResponse, status: StatusCode) {
    response.assert_status(status);

    let body = response.json::<Value>();
    assert!(
        body["error"].is_string(),
        "want a JSON body with an \"error\" message, got {body}"
    );
}

/// Issue a token for an admin as if they had logged in.
#[track_caller]
pub(crate) fn bearer_token_for(state: &AppState, admin_id: i64, name: &str) -> String {
    let claims = AdminClaims::new(admin_id, name, "admin", state.token_duration);

    encode_token(&claims, &state.token_keys.encoding_key).expect("Could not encode token")
}
