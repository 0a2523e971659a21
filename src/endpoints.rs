//! The API endpoints URIs.
//!
//! For endpoints that take a parameter, e.g., '/api/sites/{site_id}', use [format_endpoint].

/// The route for residents logging in with their unit credentials.
pub const RESIDENT_LOG_IN: &str = "/api/login";
/// The route for administrators logging in, issues a bearer token.
pub const ADMIN_LOG_IN: &str = "/api/auth/login";

/// The route to list and create sites.
pub const SITES: &str = "/api/sites";
/// The route to get, update and delete a single site.
pub const SITE: &str = "/api/sites/{site_id}";
/// The route to list the blocks of a site.
pub const SITE_BLOCKS: &str = "/api/sites/{site_id}/blocks";

/// The route to create blocks.
pub const BLOCKS: &str = "/api/blocks";
/// The route to update and delete a single block.
pub const BLOCK: &str = "/api/blocks/{block_id}";
/// The route to list the units of a block.
pub const BLOCK_UNITS: &str = "/api/blocks/{block_id}/units";

/// The route to create a range of units in one go.
pub const BULK_UNITS: &str = "/api/units/bulk";
/// The route to update and delete a single unit.
pub const UNIT: &str = "/api/units/{unit_id}";
/// The route to list the maintenance requests of a unit.
pub const UNIT_REQUESTS: &str = "/api/units/{unit_id}/requests";
/// The route to list the open debts of a unit.
pub const UNIT_DEBTS: &str = "/api/units/{unit_id}/debts";
/// The route to list the payments made for a unit.
pub const UNIT_PAYMENTS: &str = "/api/units/{unit_id}/payments";
/// The route to list every unit across all blocks.
pub const ALL_UNITS: &str = "/api/admin/units";
/// The route to list the most recently added residents.
pub const RECENT_RESIDENTS: &str = "/api/admin/recent-residents";

/// The route for residents to submit maintenance requests.
pub const REQUESTS: &str = "/api/requests";
/// The route for administrators to list maintenance requests.
pub const ADMIN_REQUESTS: &str = "/api/admin/requests";
/// The route for administrators to update and delete a maintenance request.
pub const ADMIN_REQUEST: &str = "/api/admin/requests/{request_id}";

/// The route to list and create announcements.
pub const ANNOUNCEMENTS: &str = "/api/announcements";
/// The route to delete an announcement.
pub const ANNOUNCEMENT: &str = "/api/announcements/{announcement_id}";

/// The route to get and update the finance settings.
pub const FINANCE_SETTINGS: &str = "/api/finance/settings";
/// The route for the finance summary totals.
pub const FINANCE_SUMMARY: &str = "/api/finance/summary";
/// The route to list all debts.
pub const DEBTS: &str = "/api/finance/debts";
/// The route to delete a single debt.
pub const DEBT: &str = "/api/finance/debts/{debt_id}";
/// The route to cancel the collection recorded for a debt.
pub const CANCEL_COLLECTION: &str = "/api/finance/debts/{debt_id}/cancel-collection";
/// The route to delete many debts at once.
pub const BULK_DELETE_DEBTS: &str = "/api/finance/debts/bulk-delete";
/// The route to charge a unit, or all active units.
pub const CHARGES: &str = "/api/finance/charges";
/// The route to record a payment for a debt.
pub const COLLECTIONS: &str = "/api/finance/collections";
/// The route to run dues billing for the current period on demand.
pub const RUN_BILLING: &str = "/api/finance/billing/run";

/// The route to upload and list documents.
pub const DOCUMENTS: &str = "/api/documents";
/// The route to delete a document.
pub const DOCUMENT: &str = "/api/documents/{document_id}";
/// The route to publish or hide a document.
pub const DOCUMENT_VISIBILITY: &str = "/api/documents/{document_id}/visibility";
/// The route that serves uploaded document files.
pub const UPLOADED_DOCUMENTS: &str = "/uploads/documents";

/// The route for the dashboard counters.
pub const STATS: &str = "/api/admin/stats";
/// The route to read the audit log.
pub const AUDIT_LOGS: &str = "/api/admin/logs";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace.
/// For example, in the endpoint path '/api/sites/{site_id}', '{site_id}' is the parameter.
///
/// This function assumes that an endpoint path only contains ASCII characters
/// and a single parameter.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// the original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let Some(param_start) = endpoint_path.find('{') else {
        return endpoint_path.to_owned();
    };

    let param_end = endpoint_path[param_start..]
        .find('}')
        .map(|end| param_start + end + 1)
        .unwrap_or(endpoint_path.len());

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}

// These tests are here so that we know when we call `Uri::from_shared` it will not panic.
#[cfg(test)]
mod endpoints_tests {
    use axum::http::Uri;

    use crate::endpoints;

    use super::format_endpoint;

    fn assert_endpoint_is_valid_uri(uri: &str) {
        assert!(uri.parse::<Uri>().is_ok(), "{uri} is not a valid URI");
    }

    #[test]
    fn endpoints_are_valid_uris() {
        for endpoint in [
            endpoints::RESIDENT_LOG_IN,
            endpoints::ADMIN_LOG_IN,
            endpoints::SITES,
            endpoints::BLOCKS,
            endpoints::BULK_UNITS,
            endpoints::ALL_UNITS,
            endpoints::RECENT_RESIDENTS,
            endpoints::REQUESTS,
            endpoints::ADMIN_REQUESTS,
            endpoints::ANNOUNCEMENTS,
            endpoints::FINANCE_SETTINGS,
            endpoints::FINANCE_SUMMARY,
            endpoints::DEBTS,
            endpoints::BULK_DELETE_DEBTS,
            endpoints::CHARGES,
            endpoints::COLLECTIONS,
            endpoints::RUN_BILLING,
            endpoints::DOCUMENTS,
            endpoints::UPLOADED_DOCUMENTS,
            endpoints::STATS,
            endpoints::AUDIT_LOGS,
        ] {
            assert_endpoint_is_valid_uri(endpoint);
        }
    }

    #[test]
    fn parameterised_endpoints_format_to_valid_uris() {
        for endpoint in [
            endpoints::SITE,
            endpoints::SITE_BLOCKS,
            endpoints::BLOCK,
            endpoints::BLOCK_UNITS,
            endpoints::UNIT,
            endpoints::UNIT_REQUESTS,
            endpoints::UNIT_DEBTS,
            endpoints::UNIT_PAYMENTS,
            endpoints::ADMIN_REQUEST,
            endpoints::ANNOUNCEMENT,
            endpoints::DEBT,
            endpoints::CANCEL_COLLECTION,
            endpoints::DOCUMENT,
            endpoints::DOCUMENT_VISIBILITY,
        ] {
            assert_endpoint_is_valid_uri(&format_endpoint(endpoint, 1));
        }
    }

    #[test]
    fn produces_valid_uri() {
        let formatted_path = format_endpoint("/hello/{world_id}", 1);

        assert_eq!(formatted_path, "/hello/1");
        assert!(formatted_path.parse::<Uri>().is_ok());
    }

    #[test]
    fn returns_original_path_with_no_parameter() {
        let formatted_path = format_endpoint("/hello/world", 1);

        assert_eq!(formatted_path, "/hello/world");
    }

    #[test]
    fn parameter_in_middle() {
        let formatted_path = format_endpoint("/hello/{world}/bye", 1);

        assert_eq!(formatted_path, "/hello/1/bye");
    }
}
