// HTTP surface
// Three handlers: health check, document ingestion, and streamed RAG chat


use axum::body::Body;
use axum::extract::{Multipart, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::task;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::llm::{Embedder, Generator};
use crate::store::{ChunkRecord, VectorStore};
use crate::{RagError, Result, chunking, extract};

/// Number of nearest chunks retrieved per query.
const TOP_K: usize = 2;

/// Context substituted when the store has nothing to offer.
pub const NO_CONTEXT_PLACEHOLDER: &str = "Sem contexto adicional.";

/// Shared handler state. The model seams are trait objects so tests can
/// substitute deterministic fakes; the vector store handle is deliberately
/// not held here and is opened fresh per request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub embedder: Arc<dyn Embedder>,
    pub generator: Arc<dyn Generator>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    model: String,
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    filename: String,
    status: &'static str,
    chunks: usize,
}

#[derive(Debug, Serialize)]
struct UploadErrorResponse {
    filename: String,
    status: &'static str,
    detail: String,
}

#[derive(Debug, Deserialize)]
struct ChatParams {
    query: String,
}

/// Build the application router with a fully permissive CORS layer
/// (development default).
#[inline]
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(health))
        .route("/upload", post(upload))
        .route("/chat", post(chat))
        .layer(cors)
        .with_state(state)
}

/// `GET /` — fixed status payload, independent of system state.
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "running",
        model: state.generator.model_id().to_string(),
    })
}

/// `POST /upload` — persist the uploaded PDF, extract and chunk its text,
/// embed the chunks, and append them to the vector store.
///
/// Any failure along the way is reported as a structured 400 body. There is
/// no rollback: chunks stored before a later failure remain stored.
async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let (filename, data) = match read_upload(&mut multipart).await {
        Ok(parts) => parts,
        Err(error) => return upload_error(String::new(), &error),
    };

    match ingest_document(&state, &filename, data).await {
        Ok(chunks) => {
            info!("Ingested {} as {} chunks", filename, chunks);
            (
                StatusCode::CREATED,
                Json(UploadResponse {
                    filename,
                    status: "uploaded and ingested",
                    chunks,
                }),
            )
                .into_response()
        }
        Err(error) => {
            warn!("Ingestion of {} failed: {}", filename, error);
            upload_error(filename, &error)
        }
    }
}

/// `POST /chat?query=..` — retrieve the top-k chunks nearest to the query and
/// stream the model's answer as plain text, fragment by fragment.
///
/// Failures after the first byte has been sent terminate the body early;
/// there is no trailing error indicator.
async fn chat(
    State(state): State<AppState>,
    Query(params): Query<ChatParams>,
) -> Result<Response> {
    let query = params.query;

    let query_vectors = state.embedder.embed(std::slice::from_ref(&query)).await?;
    let query_vector = query_vectors.first().ok_or_else(|| {
        RagError::Model("Embedding service returned no vector for query".to_string())
    })?;

    let store = VectorStore::open(&state.config.vector_db_dir).await?;
    let hits = store.search_similar(query_vector, TOP_K).await?;
    debug!("Retrieved {} context chunks for query", hits.len());

    let context = if hits.is_empty() {
        NO_CONTEXT_PLACEHOLDER.to_string()
    } else {
        hits.iter()
            .map(|hit| hit.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    };

    let prompt = build_prompt(&context, &query);
    let fragments = state.generator.generate(&prompt).await?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Body::from_stream(fragments))
        .map_err(|e| RagError::Other(anyhow::anyhow!("Failed to build response: {e}")))
}

/// Fixed instructional template combining retrieved context and the verbatim
/// question.
fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "Você é um assistente de IA prestativo e inteligente.\n\
         Responda à pergunta do usuário usando o contexto fornecido abaixo.\n\
         Se a resposta não estiver no contexto, use seu conhecimento para responder \
         da melhor forma possível em Português.\n\
         \n\
         Contexto:\n\
         {context}\n\
         \n\
         Pergunta do Usuário:\n\
         {question}\n"
    )
}

async fn ingest_document(state: &AppState, raw_filename: &str, data: Bytes) -> Result<usize> {
    let filename = sanitize_filename(raw_filename)?;

    let path = state.config.upload_dir.join(&filename);
    tokio::fs::write(&path, &data).await?;
    debug!("Saved upload to {}", path.display());

    let text = task::spawn_blocking(move || extract::extract_text(&data))
        .await
        .map_err(|e| RagError::Extraction(format!("Extraction task failed: {e}")))??;

    let chunks = chunking::split_text(&text, &state.config.chunking);
    if chunks.is_empty() {
        return Ok(0);
    }

    let vectors = state.embedder.embed(&chunks).await?;
    let created_at = Utc::now().to_rfc3339();

    let records = chunks
        .iter()
        .zip(vectors)
        .enumerate()
        .map(|(index, (content, vector))| ChunkRecord {
            id: Uuid::new_v4().to_string(),
            vector,
            content: content.clone(),
            source_file: filename.clone(),
            chunk_index: index as u32,
            created_at: created_at.clone(),
        })
        .collect();

    let store = VectorStore::open(&state.config.vector_db_dir).await?;
    store.add_chunks(records).await?;

    Ok(chunks.len())
}

/// Pull the first file field out of the multipart body.
async fn read_upload(multipart: &mut Multipart) -> Result<(String, Bytes)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| RagError::Upload(format!("Malformed multipart request: {e}")))?
    {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let data = field
            .bytes()
            .await
            .map_err(|e| RagError::Upload(format!("Failed to read upload body: {e}")))?;
        return Ok((filename, data));
    }

    Err(RagError::Upload("No file field in upload".to_string()))
}

/// Reduce a client-supplied filename to its final path component. Uploads
/// are stored under the configured directory only; directory components in
/// the client name are discarded rather than trusted.
fn sanitize_filename(raw: &str) -> Result<String> {
    match Path::new(raw).file_name().and_then(|name| name.to_str()) {
        Some(name) if !name.is_empty() => Ok(name.to_string()),
        _ => Err(RagError::Upload(format!("Unusable filename: {raw:?}"))),
    }
}

fn upload_error(filename: String, error: &RagError) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(UploadErrorResponse {
            filename,
            status: "error",
            detail: error.to_string(),
        }),
    )
        .into_response()
}

impl IntoResponse for RagError {
    #[inline]
    fn into_response(self) -> Response {
        warn!("Request failed: {}", self);
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}
