//! Thin HTTP surface over the ingest/ask pipeline.
//!
//! Deliberately bare: no CORS layer, no request-id propagation, no access
//! logging middleware. A caller embedding this behind a real edge would add
//! `tower_http::cors::CorsLayer` and `tower_http::trace::TraceLayer` here.

use crate::answer::Answerer;
use crate::error::RagError;
use crate::ingest::Ingestor;
use crate::types::{AskResponse, Chunk, Document};
use crate::vector::VectorIndex;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub ingestor: Arc<Ingestor>,
    pub answerer: Arc<Answerer>,
    pub vector_index: Arc<dyn VectorIndex>,
    pub default_top_k: usize,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/ingest/text", post(ingest_text))
        .route("/api/ingest/files", post(ingest_files))
        .route("/api/ingest/samples", post(ingest_samples))
        .route("/api/ask", post(ask))
        .route("/api/sources", get(list_sources))
        .route("/api/sources/{id}", get(get_source))
        .with_state(state)
}

impl IntoResponse for RagError {
    fn into_response(self) -> Response {
        let status = match &self {
            RagError::InvalidInput(_)
            | RagError::ChunkExplosion { .. }
            | RagError::InvalidChunk(_)
            | RagError::EmptyDocument(_) => StatusCode::BAD_REQUEST,
            RagError::Cancelled => StatusCode::REQUEST_TIMEOUT,
            RagError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_GATEWAY,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IngestTextRequest {
    doc_name: String,
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct IngestTextResponse {
    document_id: Uuid,
    doc_name: String,
    chunk_count: usize,
    created_utc: chrono::DateTime<chrono::Utc>,
}

impl From<Document> for IngestTextResponse {
    fn from(document: Document) -> Self {
        Self {
            document_id: document.id,
            doc_name: document.name,
            chunk_count: document.chunk_count,
            created_utc: document.created_utc,
        }
    }
}

async fn ingest_text(
    State(state): State<AppState>,
    Json(request): Json<IngestTextRequest>,
) -> Result<Json<IngestTextResponse>, RagError> {
    let document = state
        .ingestor
        .ingest_text(&request.doc_name, &request.text, None)
        .await?;
    Ok(Json(document.into()))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct IngestFileResult {
    file_name: String,
    document_id: Uuid,
    chunk_count: usize,
}

#[derive(Debug, Serialize)]
struct IngestFilesResponse {
    results: Vec<IngestFileResult>,
}

async fn ingest_files(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<IngestFilesResponse>, RagError> {
    let temp_dir = tempfile::tempdir().map_err(RagError::Io)?;
    let mut paths = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| RagError::InvalidInput(e.to_string()))?
    {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|e| RagError::InvalidInput(e.to_string()))?;
        let path = temp_dir.path().join(&file_name);
        std::fs::write(&path, &bytes).map_err(RagError::Io)?;
        paths.push(path);
    }

    let documents = state.ingestor.ingest_files(&paths).await?;
    let results = documents
        .into_iter()
        .map(|document| IngestFileResult {
            file_name: document.name.clone(),
            document_id: document.id,
            chunk_count: document.chunk_count,
        })
        .collect();

    Ok(Json(IngestFilesResponse { results }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IngestSamplesRequest {
    #[serde(default)]
    folder_path: Option<String>,
}

#[derive(Debug, Serialize)]
struct IngestSamplesResponse {
    ingested: usize,
    documents: Vec<IngestTextResponse>,
}

/// Ingests every allowed file found directly under `folderPath` (default
/// `./samples`), skipping anything `Ingestor::ingest_files` would skip.
async fn ingest_samples(
    State(state): State<AppState>,
    body: Option<Json<IngestSamplesRequest>>,
) -> Result<Json<IngestSamplesResponse>, RagError> {
    let folder_path = body
        .and_then(|Json(request)| request.folder_path)
        .unwrap_or_else(|| "samples".to_string());

    let entries = std::fs::read_dir(&folder_path).map_err(RagError::Io)?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(RagError::Io)?;
        if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            paths.push(entry.path());
        }
    }

    let documents = state.ingestor.ingest_files(&paths).await?;
    Ok(Json(IngestSamplesResponse {
        ingested: documents.len(),
        documents: documents.into_iter().map(IngestTextResponse::from).collect(),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AskRequest {
    question: String,
    #[serde(default)]
    top_k: Option<usize>,
}

async fn ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Json<AskResponse> {
    let top_k = request.top_k.unwrap_or(state.default_top_k);
    Json(state.answerer.ask(&request.question, top_k).await)
}

async fn list_sources(
    State(state): State<AppState>,
) -> Result<Json<Vec<Document>>, RagError> {
    Ok(Json(state.vector_index.list_documents().await?))
}

#[derive(Debug, Serialize)]
struct SourceDetailResponse {
    #[serde(flatten)]
    document: Document,
    chunks: Vec<Chunk>,
}

async fn get_source(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SourceDetailResponse>, RagError> {
    let document = state
        .vector_index
        .get_document(id)
        .await?
        .ok_or_else(|| RagError::InvalidInput(format!("no document with id {id}")))?;
    let chunks = state.vector_index.get_document_chunks(id).await?;
    if chunks.is_empty() {
        warn!("document {} has no chunks", id);
    }
    Ok(Json(SourceDetailResponse { document, chunks }))
}
