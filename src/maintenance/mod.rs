//! Maintenance requests raised by residents and handled by the site administrators.

mod db;
mod endpoints;

pub use db::{
    AdminRequest, MaintenanceRequest, NewRequest, PENDING_STATUS, RequestId, RequestUpdate,
    count_pending_requests, create_maintenance_request_table, create_request, delete_request,
    get_admin_requests, get_unit_requests, update_request,
};
pub use endpoints::{
    create_request_endpoint, delete_request_endpoint, get_admin_requests_endpoint,
    get_unit_requests_endpoint, update_request_endpoint,
};
