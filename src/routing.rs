//! Application router configuration.

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    response::IntoResponse,
    routing::{delete, get, patch, post, put},
};
use tower_http::services::ServeDir;

use crate::{
    AppState, Error,
    announcement::{
        create_announcement_endpoint, delete_announcement_endpoint, get_announcements_endpoint,
    },
    audit::{audit_middleware, get_audit_logs_endpoint},
    auth::{admin_log_in_endpoint, resident_log_in_endpoint},
    billing::run_billing_endpoint,
    block::{
        create_block_endpoint, delete_block_endpoint, get_site_blocks_endpoint,
        update_block_endpoint,
    },
    document::{
        MAX_DOCUMENT_BYTES, delete_document_endpoint, get_documents_endpoint,
        set_document_visibility_endpoint, upload_document_endpoint,
    },
    endpoints,
    finance::{
        bulk_delete_debts_endpoint, cancel_collection_endpoint, create_charge_endpoint,
        delete_debt_endpoint, get_debts_endpoint, get_finance_settings_endpoint,
        get_finance_summary_endpoint, get_unit_debts_endpoint, get_unit_payments_endpoint,
        record_collection_endpoint, update_finance_settings_endpoint,
    },
    maintenance::{
        create_request_endpoint, delete_request_endpoint, get_admin_requests_endpoint,
        get_unit_requests_endpoint, update_request_endpoint,
    },
    site::{
        create_site_endpoint, delete_site_endpoint, get_site_endpoint, get_sites_endpoint,
        update_site_endpoint,
    },
    stats::get_stats_endpoint,
    unit::{
        bulk_create_units_endpoint, delete_unit_endpoint, get_all_units_endpoint,
        get_block_units_endpoint, get_recent_residents_endpoint, update_unit_endpoint,
    },
};

/// Room for the text fields and boundaries of a document upload on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Return a router with all the app's routes.
///
/// Every successful change made through `/api` is written to the audit log. Uploaded
/// documents are served from `state.upload_dir`.
pub fn build_router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route(endpoints::RESIDENT_LOG_IN, post(resident_log_in_endpoint))
        .route(endpoints::ADMIN_LOG_IN, post(admin_log_in_endpoint));

    let property_routes = Router::new()
        .route(
            endpoints::SITES,
            get(get_sites_endpoint).post(create_site_endpoint),
        )
        .route(
            endpoints::SITE,
            get(get_site_endpoint)
                .put(update_site_endpoint)
                .delete(delete_site_endpoint),
        )
        .route(endpoints::SITE_BLOCKS, get(get_site_blocks_endpoint))
        .route(endpoints::BLOCKS, post(create_block_endpoint))
        .route(
            endpoints::BLOCK,
            put(update_block_endpoint).delete(delete_block_endpoint),
        )
        .route(endpoints::BLOCK_UNITS, get(get_block_units_endpoint))
        .route(endpoints::BULK_UNITS, post(bulk_create_units_endpoint))
        .route(
            endpoints::UNIT,
            put(update_unit_endpoint).delete(delete_unit_endpoint),
        )
        .route(endpoints::ALL_UNITS, get(get_all_units_endpoint))
        .route(
            endpoints::RECENT_RESIDENTS,
            get(get_recent_residents_endpoint),
        );

    let resident_routes = Router::new()
        .route(endpoints::REQUESTS, post(create_request_endpoint))
        .route(endpoints::UNIT_REQUESTS, get(get_unit_requests_endpoint))
        .route(endpoints::ADMIN_REQUESTS, get(get_admin_requests_endpoint))
        .route(
            endpoints::ADMIN_REQUEST,
            put(update_request_endpoint).delete(delete_request_endpoint),
        )
        .route(
            endpoints::ANNOUNCEMENTS,
            get(get_announcements_endpoint).post(create_announcement_endpoint),
        )
        .route(endpoints::ANNOUNCEMENT, delete(delete_announcement_endpoint));

    let finance_routes = Router::new()
        .route(
            endpoints::FINANCE_SETTINGS,
            get(get_finance_settings_endpoint).put(update_finance_settings_endpoint),
        )
        .route(endpoints::FINANCE_SUMMARY, get(get_finance_summary_endpoint))
        .route(endpoints::DEBTS, get(get_debts_endpoint))
        .route(endpoints::DEBT, delete(delete_debt_endpoint))
        .route(
            endpoints::CANCEL_COLLECTION,
            post(cancel_collection_endpoint),
        )
        .route(
            endpoints::BULK_DELETE_DEBTS,
            post(bulk_delete_debts_endpoint),
        )
        .route(endpoints::CHARGES, post(create_charge_endpoint))
        .route(endpoints::COLLECTIONS, post(record_collection_endpoint))
        .route(endpoints::UNIT_DEBTS, get(get_unit_debts_endpoint))
        .route(endpoints::UNIT_PAYMENTS, get(get_unit_payments_endpoint))
        .route(endpoints::RUN_BILLING, post(run_billing_endpoint));

    let document_routes = Router::new()
        .route(
            endpoints::DOCUMENTS,
            get(get_documents_endpoint)
                .post(upload_document_endpoint)
                .layer(DefaultBodyLimit::max(
                    MAX_DOCUMENT_BYTES + MULTIPART_OVERHEAD_BYTES,
                )),
        )
        .route(endpoints::DOCUMENT, delete(delete_document_endpoint))
        .route(
            endpoints::DOCUMENT_VISIBILITY,
            patch(set_document_visibility_endpoint),
        );

    let admin_routes = Router::new()
        .route(endpoints::STATS, get(get_stats_endpoint))
        .route(endpoints::AUDIT_LOGS, get(get_audit_logs_endpoint));

    let api_routes = auth_routes
        .merge(property_routes)
        .merge(resident_routes)
        .merge(finance_routes)
        .merge(document_routes)
        .merge(admin_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            audit_middleware,
        ));

    api_routes
        .nest_service(
            endpoints::UPLOADED_DOCUMENTS,
            ServeDir::new(&state.upload_dir),
        )
        .fallback(get_not_found)
        .with_state(state)
}

async fn get_not_found() -> impl IntoResponse {
    Error::NotFound
}
