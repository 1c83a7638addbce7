use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{
    StatusCode,
    multipart::{Form, Part},
};
use serde_json::Value;
use study_rag::{
    BackendFailure, CompletionBackend, HashEmbeddingProvider, InMemorySimilarityIndex, ModelInfo,
    Pipeline,
};
use study_rag_server::{AppState, app_router};

/// Answers every prompt with a fixed reply, or fails with a fixed failure.
struct FixedBackend {
    reply: Result<String, BackendFailure>,
}

#[async_trait]
impl CompletionBackend for FixedBackend {
    async fn complete(&self, _model: &str, _prompt: &str) -> Result<String, BackendFailure> {
        self.reply.clone()
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, BackendFailure> {
        match &self.reply {
            Ok(_) => Ok(vec![ModelInfo {
                name: "llama3.2:1b".to_string(),
                size: 1_300_000_000,
                modified: "2024-10-01T10:00:00Z".to_string(),
            }]),
            Err(failure) => Err(failure.clone()),
        }
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

async fn spawn_server(reply: Result<&str, BackendFailure>) -> (String, tokio::task::JoinHandle<()>) {
    let backend = Arc::new(FixedBackend { reply: reply.map(str::to_string) });
    let pipeline = Pipeline::builder()
        .index(Arc::new(InMemorySimilarityIndex::new(Arc::new(HashEmbeddingProvider::default()))))
        .backend(backend)
        .build()
        .await
        .expect("pipeline");
    let app = app_router(AppState::new(pipeline));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server run");
    });

    (format!("http://{}", addr), handle)
}

async fn upload_text(client: &reqwest::Client, base: &str, name: &str, text: &str) -> reqwest::Response {
    let form = Form::new().part("file", Part::bytes(text.as_bytes().to_vec()).file_name(name.to_string()));
    client
        .post(format!("{}/upload", base))
        .multipart(form)
        .send()
        .await
        .expect("upload response")
}

async fn ask(client: &reqwest::Client, base: &str, question: &str) -> Value {
    let response = client
        .post(format!("{}/ask", base))
        .json(&serde_json::json!({ "question": question }))
        .send()
        .await
        .expect("ask response");
    assert_eq!(response.status(), StatusCode::OK);
    response.json().await.expect("ask json")
}

#[tokio::test]
async fn root_and_health_report_running() {
    let (base, handle) = spawn_server(Ok("ok")).await;
    let client = reqwest::Client::new();

    let root: Value = client.get(&base).send().await.expect("root").json().await.expect("root json");
    assert!(root["message"].as_str().expect("message").contains("running"));

    let health: Value =
        client.get(format!("{}/health", base)).send().await.expect("health").json().await.expect("json");
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["ollama"], "running");
    assert_eq!(health["default_model"], "llama3.2:1b");
    assert_eq!(health["model_available"], true);

    handle.abort();
}

#[tokio::test]
async fn upload_then_ask_returns_answer_and_sources() {
    let (base, handle) = spawn_server(Ok("Osmosis is the movement of water.")).await;
    let client = reqwest::Client::new();

    let response = upload_text(&client, &base, "notes.txt", &"study notes ".repeat(250)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("upload json");
    assert_eq!(body["documentName"], "notes.txt");
    assert_eq!(body["chunkCount"], 4);
    assert_eq!(body["message"], "Document uploaded successfully");

    let answer = ask(&client, &base, "What are my notes about?").await;
    assert_eq!(answer["answer"], "Osmosis is the movement of water.");
    let sources = answer["sources"].as_array().expect("sources array");
    assert_eq!(sources.len(), 3);
    for source in sources {
        assert_eq!(source["source"], "notes.txt");
        assert!(source["chunk"].as_u64().expect("chunk index") < 4);
    }

    handle.abort();
}

#[tokio::test]
async fn upload_without_text_is_rejected() {
    let (base, handle) = spawn_server(Ok("ok")).await;
    let client = reqwest::Client::new();

    let response = upload_text(&client, &base, "blank.txt", "  \n\t  ").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.expect("error json");
    assert_eq!(body["detail"], "No text found in document");

    let missing = client
        .post(format!("{}/upload", base))
        .multipart(Form::new().text("other", "value"))
        .send()
        .await
        .expect("upload response");
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

    handle.abort();
}

#[tokio::test]
async fn ask_with_empty_store_has_no_sources() {
    let (base, handle) = spawn_server(Ok("I could not find that in your notes.")).await;
    let client = reqwest::Client::new();

    let answer = ask(&client, &base, "What is osmosis?").await;
    assert_eq!(answer["answer"], "I could not find that in your notes.");
    assert_eq!(answer["sources"], serde_json::json!([]));

    handle.abort();
}

#[tokio::test]
async fn generation_failure_is_returned_as_answer_text() {
    let (base, handle) =
        spawn_server(Err(BackendFailure::Connect("connection refused".to_string()))).await;
    let client = reqwest::Client::new();

    let response = upload_text(&client, &base, "notes.txt", "Mitochondria produce energy.").await;
    assert_eq!(response.status(), StatusCode::OK);

    let answer = ask(&client, &base, "What do mitochondria do?").await;
    let text = answer["answer"].as_str().expect("answer text");
    assert!(text.starts_with("Error: Cannot connect to Ollama"));
    assert!(text.contains("ollama serve"));
    assert_eq!(answer["sources"], serde_json::json!([]));

    handle.abort();
}

#[tokio::test]
async fn clear_is_idempotent_and_empties_the_store() {
    let (base, handle) = spawn_server(Ok("ok")).await;
    let client = reqwest::Client::new();

    upload_text(&client, &base, "notes.txt", "Photosynthesis turns light into sugar.").await;

    for _ in 0..2 {
        let response = client.delete(format!("{}/clear", base)).send().await.expect("clear response");
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = response.json().await.expect("clear json");
        assert_eq!(body["message"], "Database cleared successfully");
    }

    let answer = ask(&client, &base, "What is photosynthesis?").await;
    assert_eq!(answer["sources"], serde_json::json!([]));

    handle.abort();
}

#[tokio::test]
async fn models_lists_installed_models_or_error() {
    let (base, handle) = spawn_server(Ok("ok")).await;
    let client = reqwest::Client::new();

    let body: Value =
        client.get(format!("{}/models", base)).send().await.expect("models").json().await.expect("json");
    assert_eq!(body["status"], "success");
    assert_eq!(body["count"], 1);
    assert_eq!(body["models"][0]["name"], "llama3.2:1b");
    assert_eq!(body["models"][0]["modified"], "2024-10-01T10:00:00Z");
    handle.abort();

    let (base, handle) =
        spawn_server(Err(BackendFailure::Connect("connection refused".to_string()))).await;
    let body: Value =
        client.get(format!("{}/models", base)).send().await.expect("models").json().await.expect("json");
    assert_eq!(body["status"], "error");
    assert!(body["error"].as_str().expect("error").contains("ollama serve"));

    let health: Value =
        client.get(format!("{}/health", base)).send().await.expect("health").json().await.expect("json");
    assert_eq!(health["status"], "unhealthy");
    assert_eq!(health["ollama"], "not running");

    handle.abort();
}
