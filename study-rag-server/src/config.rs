//! Server configuration read from `STUDY_RAG_*` environment variables.

use std::str::FromStr;

use anyhow::{Context, bail};
use study_rag::{DEFAULT_EMBEDDING_MODEL, GenerationConfig, RagConfig};

/// Which embedding provider backs the similarity index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EmbedderChoice {
    /// Ollama `/api/embeddings` with the given model.
    Ollama { model: String },
    /// Offline feature hashing with the given vector size.
    Hash { dimensions: usize },
}

impl Default for EmbedderChoice {
    fn default() -> Self {
        Self::Ollama { model: DEFAULT_EMBEDDING_MODEL.to_string() }
    }
}

impl FromStr for EmbedderChoice {
    type Err = anyhow::Error;

    /// Parses `ollama`, `ollama:<model>`, `hash` or `hash:<dimensions>`.
    fn from_str(value: &str) -> anyhow::Result<Self> {
        let (kind, arg) = match value.trim().split_once(':') {
            Some((kind, arg)) => (kind, Some(arg.trim())),
            None => (value.trim(), None),
        };
        match (kind, arg) {
            ("ollama", None) => Ok(Self::default()),
            ("ollama", Some(model)) if !model.is_empty() => Ok(Self::Ollama { model: model.to_string() }),
            ("hash", None) => Ok(Self::Hash { dimensions: 256 }),
            ("hash", Some(dims)) => {
                let dimensions: usize =
                    dims.parse().with_context(|| format!("invalid hash embedder size '{dims}'"))?;
                if dimensions == 0 {
                    bail!("hash embedder size must be greater than zero");
                }
                Ok(Self::Hash { dimensions })
            }
            _ => bail!("unknown embedder '{value}', expected 'ollama[:<model>]' or 'hash[:<dims>]'"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub rag: RagConfig,
    pub generation: GenerationConfig,
    pub embedder: EmbedderChoice,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            rag: RagConfig::default(),
            generation: GenerationConfig::default(),
            embedder: EmbedderChoice::default(),
        }
    }
}

impl ServerConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`, falling back to defaults for
    /// unset variables.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let host = var("STUDY_RAG_HOST").unwrap_or(defaults.host);
        let port = parse_or(var("STUDY_RAG_PORT"), "STUDY_RAG_PORT", defaults.port)?;

        let mut generation = defaults.generation;
        if let Some(url) = var("STUDY_RAG_OLLAMA_URL") {
            generation.base_url = url;
        }
        if let Some(model) = var("STUDY_RAG_MODEL") {
            generation.primary_model = model;
        }
        if let Some(list) = var("STUDY_RAG_FALLBACK_MODELS") {
            generation.fallback_models = list
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string)
                .collect();
        }
        generation.request_timeout_secs = parse_or(
            var("STUDY_RAG_TIMEOUT_SECS"),
            "STUDY_RAG_TIMEOUT_SECS",
            generation.request_timeout_secs,
        )?;

        let rag_defaults = defaults.rag;
        let rag = RagConfig::builder()
            .chunk_size(parse_or(var("STUDY_RAG_CHUNK_SIZE"), "STUDY_RAG_CHUNK_SIZE", rag_defaults.chunk_size)?)
            .chunk_overlap(parse_or(
                var("STUDY_RAG_CHUNK_OVERLAP"),
                "STUDY_RAG_CHUNK_OVERLAP",
                rag_defaults.chunk_overlap,
            )?)
            .top_k(parse_or(var("STUDY_RAG_TOP_K"), "STUDY_RAG_TOP_K", rag_defaults.top_k)?)
            .build()
            .context("invalid retrieval settings")?;

        let embedder = match var("STUDY_RAG_EMBEDDER") {
            Some(value) => value.parse().context("invalid STUDY_RAG_EMBEDDER")?,
            None => defaults.embedder,
        };

        Ok(Self { host, port, rag, generation, embedder })
    }
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(raw) => raw.parse().with_context(|| format!("invalid {key} '{raw}'")),
        None => Ok(default),
    }
}
