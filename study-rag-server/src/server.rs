use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    response::IntoResponse,
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use study_rag::{
    Answer, BackendFailure, EmbeddingProvider, HashEmbeddingProvider, InMemorySimilarityIndex,
    ModelInfo, OllamaBackend, OllamaEmbeddingProvider, Pipeline, extractor_for,
};
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::{
    config::{EmbedderChoice, ServerConfig},
    error::ApiError,
};

/// Largest accepted upload body.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Name an upload is stored under when the client sends no file name.
const UNNAMED_UPLOAD: &str = "upload.txt";

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self {
        Self { pipeline: Arc::new(pipeline) }
    }
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub message: String,
    pub document_name: String,
    pub chunk_count: usize,
}

#[derive(Debug, Serialize)]
struct ModelsResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    models: Option<Vec<ModelInfo>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/models", get(list_models))
        .route("/upload", post(upload))
        .route("/ask", post(ask))
        .route("/clear", delete(clear))
        .with_state(state)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Assemble the pipeline described by `config`.
pub async fn build_pipeline(config: &ServerConfig) -> anyhow::Result<Pipeline> {
    let embedder: Arc<dyn EmbeddingProvider> = match &config.embedder {
        EmbedderChoice::Ollama { model } => Arc::new(
            OllamaEmbeddingProvider::new(&config.generation.base_url, model.as_str())
                .context("failed to create Ollama embedding provider")?,
        ),
        EmbedderChoice::Hash { dimensions } => Arc::new(HashEmbeddingProvider::new(*dimensions)),
    };
    let backend = OllamaBackend::from_config(&config.generation)
        .context("failed to create Ollama backend")?;

    Pipeline::builder()
        .config(config.rag.clone())
        .generation(config.generation.clone())
        .index(Arc::new(InMemorySimilarityIndex::new(embedder)))
        .backend(Arc::new(backend))
        .build()
        .await
        .context("failed to initialise the document store")
}

pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let pipeline = build_pipeline(&config).await?;
    let app = app_router(AppState::new(pipeline));
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| "invalid host/port for study-rag server")?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        model = %config.generation.primary_model,
        ollama = %config.generation.base_url,
        "study-rag listening on http://{}",
        addr
    );
    axum::serve(listener, app).await?;
    Ok(())
}

async fn index() -> impl IntoResponse {
    Json(json!({ "message": "AI Study Assistant API is running with Ollama" }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.pipeline.health().await)
}

async fn list_models(State(state): State<AppState>) -> impl IntoResponse {
    let response = match state.pipeline.list_models().await {
        Ok(models) => ModelsResponse {
            status: "success",
            count: Some(models.len()),
            models: Some(models),
            error: None,
        },
        Err(failure) => {
            let error = match failure {
                BackendFailure::Connect(_) => {
                    "Cannot connect to Ollama. Please run 'ollama serve' in terminal.".to_string()
                }
                BackendFailure::Status { status, .. } => format!("Ollama returned status {status}"),
                other => other.to_string(),
            };
            ModelsResponse { status: "error", models: None, count: None, error: Some(error) }
        }
    };
    Json(response)
}

async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or(UNNAMED_UPLOAD).to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("failed to read upload: {e}")))?;
        upload = Some((name, bytes));
        break;
    }
    let (name, bytes) =
        upload.ok_or_else(|| ApiError::BadRequest("missing multipart field 'file'".to_string()))?;

    let extractor = extractor_for(&name)?;
    let text = tokio::task::spawn_blocking(move || extractor.extract(&bytes))
        .await
        .map_err(|e| ApiError::Internal(format!("text extraction panicked: {e}")))??;

    if text.trim().is_empty() {
        warn!(document = %name, "upload has no extractable text");
        return Err(ApiError::BadRequest("No text found in document".to_string()));
    }

    let report = state.pipeline.ingest(&name, &text).await?;
    Ok(Json(UploadResponse {
        message: "Document uploaded successfully".to_string(),
        document_name: report.document_name,
        chunk_count: report.chunk_count,
    }))
}

async fn ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<Answer>, ApiError> {
    let answer = state.pipeline.ask(&request.question).await?;
    Ok(Json(answer))
}

async fn clear(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    state.pipeline.reset().await?;
    Ok(Json(json!({ "message": "Database cleared successfully" })))
}
