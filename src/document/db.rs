use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::Serialize;
use time::{Date, OffsetDateTime};

use crate::{Error, database_id::DatabaseId};

/// The ID of a document.
pub type DocumentId = DatabaseId;

/// An archived document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    /// The ID of the document.
    pub id: DocumentId,
    /// The title shown in the archive.
    pub title: String,
    /// A free-form grouping, e.g. "invoice" or "meeting minutes".
    pub category: String,
    /// The date the document refers to.
    pub date: Date,
    /// The amount on the document, if it is an invoice or receipt.
    pub amount: Option<f64>,
    /// A longer description.
    pub description: String,
    /// The public path of the stored file, e.g. "/uploads/documents/document-ab12.pdf".
    pub file_path: String,
    /// Whether residents may see the document.
    pub is_public: bool,
    /// When the document was uploaded.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// The metadata of an uploaded document.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDocument {
    /// The title shown in the archive.
    pub title: String,
    /// A free-form grouping.
    pub category: String,
    /// The date the document refers to.
    pub date: Date,
    /// The amount on the document.
    pub amount: Option<f64>,
    /// A longer description.
    pub description: String,
    /// The public path of the stored file.
    pub file_path: String,
}

/// Create the document table.
///
/// New documents are private.
pub fn create_document_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS document (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            category TEXT NOT NULL DEFAULT '',
            date TEXT NOT NULL,
            amount REAL,
            description TEXT NOT NULL DEFAULT '',
            file_path TEXT NOT NULL,
            is_public INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )",
        (),
    )?;

    Ok(())
}

/// Add a document to the archive.
pub fn create_document(
    new_document: &NewDocument,
    created_at: OffsetDateTime,
    connection: &Connection,
) -> Result<Document, Error> {
    connection.execute(
        "INSERT INTO document (title, category, date, amount, description, file_path, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            new_document.title,
            new_document.category,
            new_document.date,
            new_document.amount,
            new_document.description,
            new_document.file_path,
            created_at
        ],
    )?;

    Ok(Document {
        id: connection.last_insert_rowid(),
        title: new_document.title.clone(),
        category: new_document.category.clone(),
        date: new_document.date,
        amount: new_document.amount,
        description: new_document.description.clone(),
        file_path: new_document.file_path.clone(),
        is_public: false,
        created_at,
    })
}

/// Retrieve all documents, most recent date first.
pub fn get_documents(connection: &Connection) -> Result<Vec<Document>, Error> {
    connection
        .prepare(
            "SELECT id, title, category, date, amount, description, file_path, is_public,
                    created_at
             FROM document ORDER BY date DESC, id DESC",
        )?
        .query_map([], map_document_row)?
        .map(|maybe_document| maybe_document.map_err(Error::from))
        .collect()
}

/// Show or hide a document from residents.
///
/// # Errors
/// Returns [Error::UpdateMissingDocument] if the document does not exist.
pub fn set_document_visibility(
    document_id: DocumentId,
    is_public: bool,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE document SET is_public = ?1 WHERE id = ?2",
        params![is_public, document_id],
    )?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingDocument);
    }

    Ok(())
}

/// Delete a document's record, returning the public path of its file so that the caller can
/// remove it from storage.
///
/// # Errors
/// Returns [Error::DeleteMissingDocument] if the document does not exist.
pub fn delete_document(document_id: DocumentId, connection: &Connection) -> Result<String, Error> {
    connection
        .query_row(
            "DELETE FROM document WHERE id = ?1 RETURNING file_path",
            [document_id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or(Error::DeleteMissingDocument)
}

fn map_document_row(row: &Row) -> Result<Document, rusqlite::Error> {
    Ok(Document {
        id: row.get(0)?,
        title: row.get(1)?,
        category: row.get(2)?,
        date: row.get(3)?,
        amount: row.get(4)?,
        description: row.get(5)?,
        file_path: row.get(6)?,
        is_public: row.get(7)?,
        created_at: row.get(8)?,
    })
}
