//! The audit log: who changed what, from where.
//!
//! Every successful mutating `/api` request is recorded by [audit_middleware]. Handlers can
//! also write explicit entries with [record_event].

mod caller;
mod db;
mod middleware;

pub use caller::{Actor, CallerContext, CallerState};
pub use db::{
    AuditEntry, NewAuditEntry, create_audit_log_table, get_audit_logs, get_audit_logs_endpoint,
    record_event,
};
pub use middleware::audit_middleware;
