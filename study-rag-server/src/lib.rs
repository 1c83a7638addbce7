//! `study-rag-server` exposes the study assistant over HTTP: upload documents,
//! ask questions about them, and inspect the local Ollama daemon.

pub mod config;
pub mod error;
pub mod server;

pub use config::{EmbedderChoice, ServerConfig};
pub use error::ApiError;
pub use server::{AppState, app_router, build_pipeline, run_server};
