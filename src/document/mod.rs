//! The document archive: uploaded files such as invoices, meeting minutes and contracts,
//! with metadata and a flag for whether residents may see them.

mod db;
mod endpoints;

pub use db::{
    Document, DocumentId, NewDocument, create_document, create_document_table, delete_document,
    get_documents, set_document_visibility,
};
pub use endpoints::{
    MAX_DOCUMENT_BYTES, delete_document_endpoint, get_documents_endpoint,
    set_document_visibility_endpoint, upload_document_endpoint,
};
