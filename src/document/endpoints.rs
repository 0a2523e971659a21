use std::{
    collections::HashMap,
    ffi::OsStr,
    io::ErrorKind,
    path::{Path as FilePath, PathBuf},
    sync::{Arc, Mutex},
};

use axum::{
    Json,
    body::Bytes,
    extract::{FromRef, Multipart, Path, State, multipart::MultipartError},
    http::StatusCode,
    response::IntoResponse,
};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use time::{Date, OffsetDateTime, macros::format_description};

use crate::{
    AppState, Error,
    db::lock_connection,
    document::{
        DocumentId, NewDocument, create_document, delete_document, get_documents,
        set_document_visibility,
    },
    endpoints,
};

/// The largest file that can be uploaded.
pub const MAX_DOCUMENT_BYTES: usize = 10 * 1024 * 1024;

/// The number of hex digits of the content hash used in stored file names.
const FILE_NAME_HASH_LENGTH: usize = 24;

/// The state needed for the document archive.
#[derive(Debug, Clone)]
pub struct DocumentState {
    /// The database connection holding the document metadata.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The directory the uploaded files are written to.
    pub upload_dir: PathBuf,
}

impl FromRef<AppState> for DocumentState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            upload_dir: state.upload_dir.clone(),
        }
    }
}

/// The request body for showing or hiding a document.
#[derive(Debug, Deserialize)]
pub struct VisibilityUpdate {
    /// Whether residents may see the document.
    pub is_public: bool,
}

struct UploadedFile {
    original_name: Option<String>,
    contents: Bytes,
}

/// A route handler for uploading a document as a multipart form.
///
/// The form must contain one `file` field and a `title`. The optional text fields are
/// `category`, `date` (YYYY-MM-DD, defaults to today), `amount` (empty for none) and
/// `description`.
pub async fn upload_document_endpoint(
    State(state): State<DocumentState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, Error> {
    let uploaded_at = OffsetDateTime::now_utc();
    let mut fields = HashMap::new();
    let mut file = None;

    while let Some(field) = multipart.next_field().await.map_err(log_multipart_error)? {
        let name = field.name().unwrap_or_default().to_owned();

        if name == "file" {
            let original_name = field.file_name().map(str::to_owned);
            let contents = field.bytes().await.map_err(log_multipart_error)?;
            file = Some(UploadedFile {
                original_name,
                contents,
            });
        } else {
            let value = field.text().await.map_err(log_multipart_error)?;
            fields.insert(name, value);
        }
    }

    let file = file.ok_or(Error::MissingFile)?;
    if file.contents.len() > MAX_DOCUMENT_BYTES {
        return Err(Error::MultipartError(format!(
            "the file is larger than {} MiB",
            MAX_DOCUMENT_BYTES / 1024 / 1024
        )));
    }

    let stored_name =
        stored_file_name(file.original_name.as_deref(), &file.contents, uploaded_at);
    let file_path = format!("{}/{stored_name}", endpoints::UPLOADED_DOCUMENTS);
    let new_document = parse_document_fields(&mut fields, file_path, uploaded_at.date())?;

    let storage_path = state.upload_dir.join(&stored_name);
    write_file(&state.upload_dir, &storage_path, &file.contents).await?;
    tracing::debug!(
        "Stored upload '{}' as {} ({} bytes)",
        file.original_name.as_deref().unwrap_or_default(),
        storage_path.display(),
        file.contents.len()
    );

    let result = lock_connection(&state.db_connection)
        .and_then(|connection| create_document(&new_document, uploaded_at, &connection));

    match result {
        Ok(document) => Ok((StatusCode::CREATED, Json(document))),
        Err(error) => {
            remove_stored_file(&storage_path).await;
            Err(error)
        }
    }
}

/// A route handler for listing the archive.
pub async fn get_documents_endpoint(
    State(state): State<DocumentState>,
) -> Result<impl IntoResponse, Error> {
    let connection = lock_connection(&state.db_connection)?;

    Ok(Json(get_documents(&connection)?))
}

/// A route handler for showing or hiding a document from residents.
pub async fn set_document_visibility_endpoint(
    State(state): State<DocumentState>,
    Path(document_id): Path<DocumentId>,
    Json(update): Json<VisibilityUpdate>,
) -> Result<impl IntoResponse, Error> {
    let connection = lock_connection(&state.db_connection)?;
    set_document_visibility(document_id, update.is_public, &connection)?;

    Ok(Json(json!({ "message": "Document updated." })))
}

/// A route handler for deleting a document and its file.
///
/// A file that is already gone is not an error.
pub async fn delete_document_endpoint(
    State(state): State<DocumentState>,
    Path(document_id): Path<DocumentId>,
) -> Result<impl IntoResponse, Error> {
    let file_path = {
        let connection = lock_connection(&state.db_connection)?;
        delete_document(document_id, &connection)?
    };

    match FilePath::new(&file_path).file_name() {
        Some(file_name) => remove_stored_file(&state.upload_dir.join(file_name)).await,
        None => tracing::warn!("Document {document_id} had no file name in '{file_path}'"),
    }

    Ok(Json(json!({ "message": "Document deleted." })))
}

fn log_multipart_error(error: MultipartError) -> Error {
    tracing::error!("Could not read multipart form: {error}");
    Error::MultipartError(error.body_text())
}

/// A collision resistant file name derived from the contents and upload time that keeps the
/// original extension.
fn stored_file_name(
    original_name: Option<&str>,
    contents: &[u8],
    uploaded_at: OffsetDateTime,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(contents);
    hasher.update(uploaded_at.unix_timestamp_nanos().to_le_bytes());
    let digest = format!("{:x}", hasher.finalize());
    let stem = format!("document-{}", &digest[..FILE_NAME_HASH_LENGTH]);

    let extension = original_name
        .and_then(|name| FilePath::new(name).extension())
        .and_then(OsStr::to_str)
        .filter(|extension| extension.chars().all(|c| c.is_ascii_alphanumeric()));

    match extension {
        Some(extension) => format!("{stem}.{}", extension.to_ascii_lowercase()),
        None => stem,
    }
}

fn parse_document_fields(
    fields: &mut HashMap<String, String>,
    file_path: String,
    today: Date,
) -> Result<NewDocument, Error> {
    let mut take = |name: &str| {
        fields
            .remove(name)
            .map(|value| value.trim().to_owned())
            .unwrap_or_default()
    };

    let title = take("title");
    if title.is_empty() {
        return Err(Error::MultipartError("a title is required".to_owned()));
    }

    let date = match take("date").as_str() {
        "" => today,
        text => Date::parse(text, format_description!("[year]-[month]-[day]")).map_err(|_| {
            Error::MultipartError(format!("invalid date \"{text}\", expected YYYY-MM-DD"))
        })?,
    };

    let amount = match take("amount").as_str() {
        "" => None,
        text => Some(
            text.parse::<f64>()
                .map_err(|_| Error::MultipartError(format!("invalid amount \"{text}\"")))?,
        ),
    };

    Ok(NewDocument {
        title,
        category: take("category"),
        date,
        amount,
        description: take("description"),
        file_path,
    })
}

async fn write_file(upload_dir: &FilePath, path: &FilePath, contents: &[u8]) -> Result<(), Error> {
    let storage_error = |error: std::io::Error| {
        tracing::error!("Could not write {}: {error}", path.display());
        Error::FileStorageError(error.to_string())
    };

    tokio::fs::create_dir_all(upload_dir)
        .await
        .map_err(storage_error)?;
    tokio::fs::write(path, contents)
        .await
        .map_err(storage_error)
}

async fn remove_stored_file(path: &FilePath) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!("Removed {}", path.display()),
        Err(error) if error.kind() == ErrorKind::NotFound => {}
        Err(error) => tracing::error!("Could not remove {}: {error}", path.display()),
    }
}


#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum_test::multipart::{MultipartForm, Part};
    use serde_json::{Value, json};

    use crate::{
        endpoints::{self, format_endpoint},
        test_utils::{assert_json_error, get_test_server},
    };

    fn invoice_form() -> MultipartForm {
        MultipartForm::new()
            .add_text("title", "March invoice")
            .add_text("category", "invoice")
            .add_text("date", "2024-03-05")
            .add_text("amount", "1250.50")
            .add_text("description", "Elevator maintenance")
            .add_part(
                "file",
                Part::bytes(b"%PDF-1.4 invoice".to_vec())
                    .file_name("invoice.pdf")
                    .mime_type("application/pdf"),
            )
    }

    #[tokio::test]
    async fn upload_list_serve_and_delete() {
        let (server, state) = get_test_server();

        let response = server.post(endpoints::DOCUMENTS).multipart(invoice_form()).await;

        response.assert_status(StatusCode::CREATED);
        let document = response.json::<Value>();
        assert_eq!(document["title"], "March invoice");
        assert_eq!(document["amount"], 1250.5);
        assert_eq!(document["is_public"], false);
        let file_path = document["file_path"].as_str().unwrap().to_owned();
        assert!(file_path.starts_with("/uploads/documents/document-"));
        assert!(file_path.ends_with(".pdf"));

        let served = server.get(&file_path).await;
        served.assert_status_ok();
        assert_eq!(served.text(), "%PDF-1.4 invoice");

        let documents = server.get(endpoints::DOCUMENTS).await.json::<Vec<Value>>();
        assert_eq!(documents.len(), 1);

        let document_id = document["id"].as_i64().unwrap();
        server
            .delete(&format_endpoint(endpoints::DOCUMENT, document_id))
            .await
            .assert_status_ok();

        let file_name = file_path.rsplit('/').next().unwrap();
        assert!(!state.upload_dir.join(file_name).exists());
        let response = server
            .delete(&format_endpoint(endpoints::DOCUMENT, document_id))
            .await;
        assert_json_error(&response, StatusCode::NOT_FOUND);

        let _ = std::fs::remove_dir_all(&state.upload_dir);
    }

    #[tokio::test]
    async fn visibility_can_be_published() {
        let (server, state) = get_test_server();
        let document_id = server
            .post(endpoints::DOCUMENTS)
            .multipart(invoice_form())
            .await
            .json::<Value>()["id"]
            .as_i64()
            .unwrap();

        server
            .patch(&format_endpoint(endpoints::DOCUMENT_VISIBILITY, document_id))
            .json(&json!({ "is_public": true }))
            .await
            .assert_status_ok();

        let documents = server.get(endpoints::DOCUMENTS).await.json::<Vec<Value>>();
        assert_eq!(documents[0]["is_public"], true);
        let response = server
            .patch(&format_endpoint(endpoints::DOCUMENT_VISIBILITY, document_id + 1))
            .json(&json!({ "is_public": true }))
            .await;
        assert_json_error(&response, StatusCode::NOT_FOUND);

        let _ = std::fs::remove_dir_all(&state.upload_dir);
    }

    #[tokio::test]
    async fn upload_without_file_is_rejected() {
        let (server, state) = get_test_server();
        let form = MultipartForm::new().add_text("title", "No file");

        let response = server.post(endpoints::DOCUMENTS).multipart(form).await;

        assert_json_error(&response, StatusCode::BAD_REQUEST);
        assert!(!state.upload_dir.exists());
    }
}
