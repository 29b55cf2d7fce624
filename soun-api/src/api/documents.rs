//! Document upload and management
//!
//! Uploads are sniffed before anything touches disk. The stored file name is
//! generated; the client's name is kept only as metadata.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use serde::Serialize;
use soun_common::db::Document;
use std::path::Path as FsPath;
use tracing::{info, warn};
use uuid::Uuid;

use super::{require_course, AuthUser};
use crate::db::documents::{self, NewDocument};
use crate::upload::extract::extract_text;
use crate::upload::storage::{remove_upload, store_upload};
use crate::upload::{extension_mismatch, sniff};
use crate::{ApiError, ApiResult, AppState};

const UPLOAD_FIELD: &str = "file";

/// Room for multipart boundaries and headers on top of the file itself
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

const MAX_ORIGINAL_NAME_CHARS: usize = 255;

#[derive(Debug, Serialize)]
pub struct DocumentResponse {
    #[serde(flatten)]
    pub document: Document,
    /// Characters of extracted text available to the tutor and generators
    pub text_chars: usize,
}

impl From<Document> for DocumentResponse {
    fn from(document: Document) -> Self {
        let text_chars = document
            .content_text
            .as_deref()
            .map_or(0, |t| t.chars().count());
        Self {
            document,
            text_chars,
        }
    }
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(e.body_text())
    } else {
        ApiError::BadRequest(e.body_text())
    }
}

fn clean_original_name(name: Option<&str>) -> String {
    let name = name
        .map(|n| n.rsplit(['/', '\\']).next().unwrap_or(n).trim())
        .filter(|n| !n.is_empty())
        .unwrap_or("upload");
    name.chars().take(MAX_ORIGINAL_NAME_CHARS).collect()
}

/// GET /api/courses/:course_id/documents
pub async fn list_documents(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(course_id): Path<Uuid>,
) -> ApiResult<Json<Vec<DocumentResponse>>> {
    require_course(&state, user.id, course_id).await?;
    let docs = documents::list_documents(&state.db, user.id, course_id).await?;
    Ok(Json(docs.into_iter().map(DocumentResponse::from).collect()))
}

/// POST /api/courses/:course_id/documents (multipart field `file`)
pub async fn upload_document(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(course_id): Path<Uuid>,
    mut multipart: Multipart,
) -> ApiResult<Json<DocumentResponse>> {
    require_course(&state, user.id, course_id).await?;

    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let original_name = clean_original_name(field.file_name());
        let bytes = field.bytes().await.map_err(multipart_error)?;
        upload = Some((original_name, bytes));
        break;
    }

    let (original_name, bytes) = upload
        .ok_or_else(|| ApiError::BadRequest(format!("Missing multipart field \"{}\"", UPLOAD_FIELD)))?;

    let kind = sniff(&bytes, state.max_upload_bytes)?;
    if extension_mismatch(&original_name, kind) {
        warn!(
            user_id = %user.id,
            original_name = %original_name,
            detected = kind.as_str(),
            "Declared extension does not match content; using detected type"
        );
    }

    let text = {
        let bytes = bytes.clone();
        tokio::task::spawn_blocking(move || extract_text(kind, &bytes))
            .await
            .map_err(|e| ApiError::Internal(format!("Text extraction task failed: {}", e)))?
    };

    let document_id = Uuid::new_v4();
    let stored_path = store_upload(
        &state.uploads_dir,
        user.id,
        document_id,
        kind.stored_extension(&original_name),
        &bytes,
    )
    .await?;
    let stored_path_str = stored_path.to_string_lossy().into_owned();

    let inserted = documents::insert_document(
        &state.db,
        NewDocument {
            id: document_id,
            user_id: user.id,
            course_id,
            original_name: &original_name,
            stored_path: &stored_path_str,
            mime_type: kind.mime_type(),
            kind: kind.as_str(),
            size_bytes: bytes.len() as i64,
            content_text: text.as_deref(),
        },
    )
    .await;

    let document = match inserted {
        Ok(document) => document,
        Err(e) => {
            if let Err(cleanup) = remove_upload(&state.uploads_dir, &stored_path).await {
                warn!(path = %stored_path.display(), error = %cleanup, "Failed to remove orphaned upload");
            }
            return Err(e.into());
        }
    };

    info!(
        user_id = %user.id,
        course_id = %course_id,
        document_id = %document.id,
        kind = kind.as_str(),
        size_bytes = document.size_bytes,
        has_text = text.is_some(),
        "Stored document"
    );

    Ok(Json(document.into()))
}

/// GET /api/documents/:document_id
pub async fn get_document(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(document_id): Path<Uuid>,
) -> ApiResult<Json<DocumentResponse>> {
    documents::get_document(&state.db, user.id, document_id)
        .await?
        .map(|d| Json(d.into()))
        .ok_or_else(|| ApiError::NotFound(format!("Document {}", document_id)))
}

/// DELETE /api/documents/:document_id
pub async fn delete_document(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(document_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let document = documents::delete_document(&state.db, user.id, document_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Document {}", document_id)))?;

    if let Err(e) = remove_upload(&state.uploads_dir, FsPath::new(&document.stored_path)).await {
        warn!(document_id = %document_id, error = %e, "Failed to remove upload file");
    }

    info!(user_id = %user.id, document_id = %document_id, "Deleted document");
    Ok(StatusCode::NO_CONTENT)
}

/// Document routes; the upload route's body limit tracks `max_upload_bytes`
pub fn document_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/api/courses/:course_id/documents",
            get(list_documents)
                .post(upload_document)
                .layer(DefaultBodyLimit::max(max_upload_bytes + MULTIPART_OVERHEAD_BYTES)),
        )
        .route(
            "/api/documents/:document_id",
            get(get_document).delete(delete_document),
        )
}
