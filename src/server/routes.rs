//! HTTP route handlers for the studio API.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::errors::StudioError;
use crate::core::ids::ConversationId;
use crate::models::{ComparisonResult, ModelInfo};
use crate::storage::{
    Conversation, ConversationPatch, ConversationSummary, ExportDocument, ImportDocument, Message,
    NewConversation, NewMessage, NewTranscript, SettingsMap, Transcript,
};

use super::error::{ApiError, ApiJson, ApiResult};
use super::state::AppState;

/// Create the API router with all routes.
#[must_use]
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/chat", post(chat))
        .route(
            "/api/conversations",
            get(list_conversations).post(create_conversation),
        )
        .route("/api/conversations/import", post(import_conversation))
        .route(
            "/api/conversations/{id}",
            get(get_conversation)
                .put(update_conversation)
                .delete(delete_conversation),
        )
        .route(
            "/api/conversations/{id}/messages",
            get(list_messages).post(create_message),
        )
        .route(
            "/api/conversations/{id}/transcripts",
            get(list_transcripts).post(create_transcript),
        )
        .route("/api/conversations/{id}/export", get(export_conversation))
        .route("/api/settings", get(get_settings).put(update_settings))
        .route("/api/models", get(list_models))
        .route("/api/models/compare", post(compare_models))
        .route("/load_model/{name}", post(load_model))
        .route("/unload_model", post(unload_model))
        .route("/ablate_model/{name}", post(ablate_model))
        .with_state(state)
}

/// Path ids that do not parse cannot name an existing conversation.
fn parse_conversation_id(raw: &str) -> ApiResult<ConversationId> {
    raw.parse()
        .map_err(|_| ApiError::from(StudioError::not_found("conversation", raw)))
}

fn require_text(field: &str, value: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::from(StudioError::validation(format!(
            "{field} cannot be empty."
        ))));
    }
    Ok(())
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "lambeck-studio",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Chat request.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// The user's message.
    pub message: String,
}

/// Chat response.
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    /// The generated reply.
    pub response: String,
}

async fn chat(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<ChatRequest>,
) -> ApiResult<Json<ChatResponse>> {
    let response = state.chat.generate(&request.message)?;
    Ok(Json(ChatResponse { response }))
}

async fn list_conversations(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<ConversationSummary>>> {
    Ok(Json(state.conversations.list().await?))
}

async fn create_conversation(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<NewConversation>,
) -> ApiResult<Json<ConversationSummary>> {
    require_text("Title", &request.title)?;
    let created = state.conversations.create(request).await?;
    Ok(Json(state.conversations.summary(created.id).await?))
}

async fn get_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Conversation>> {
    let id = parse_conversation_id(&id)?;
    Ok(Json(state.conversations.get(id).await?))
}

async fn update_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<ConversationPatch>,
) -> ApiResult<Json<ConversationSummary>> {
    let id = parse_conversation_id(&id)?;
    if let Some(title) = &request.title {
        require_text("Title", title)?;
    }
    state.conversations.update(id, request).await?;
    Ok(Json(state.conversations.summary(id).await?))
}

async fn delete_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_conversation_id(&id)?;
    state.conversations.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_messages(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Message>>> {
    let id = parse_conversation_id(&id)?;
    Ok(Json(state.messages.list(id).await?))
}

async fn create_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<NewMessage>,
) -> ApiResult<Json<Message>> {
    let id = parse_conversation_id(&id)?;
    Ok(Json(state.messages.create(id, request).await?))
}

async fn list_transcripts(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Transcript>>> {
    let id = parse_conversation_id(&id)?;
    Ok(Json(state.transcripts.list(id).await?))
}

async fn create_transcript(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<NewTranscript>,
) -> ApiResult<Json<Transcript>> {
    let id = parse_conversation_id(&id)?;
    Ok(Json(state.transcripts.create(id, request).await?))
}

async fn export_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<ExportDocument>> {
    let id = parse_conversation_id(&id)?;
    Ok(Json(state.exchange.export(id).await?))
}

async fn import_conversation(
    State(state): State<Arc<AppState>>,
    ApiJson(document): ApiJson<ImportDocument>,
) -> ApiResult<Json<ConversationSummary>> {
    Ok(Json(state.exchange.import(document).await?))
}

/// Settings request and response body.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SettingsPayload {
    /// Settings keyed by name.
    #[serde(default)]
    pub values: SettingsMap,
}

async fn get_settings(State(state): State<Arc<AppState>>) -> ApiResult<Json<SettingsPayload>> {
    let values = state.settings.get_all().await?;
    Ok(Json(SettingsPayload { values }))
}

async fn update_settings(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<SettingsPayload>,
) -> ApiResult<Json<SettingsPayload>> {
    let values = state.settings.update(request.values).await?;
    Ok(Json(SettingsPayload { values }))
}

/// Model listing response.
#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    /// Model files available.
    pub models: Vec<ModelInfo>,
    /// Active model name.
    pub active: Option<String>,
}

/// Response of load, unload and ablate.
#[derive(Debug, Serialize)]
pub struct ModelResponse {
    /// Model affected by the operation.
    pub model: Option<String>,
}

/// Comparison request.
#[derive(Debug, Deserialize)]
pub struct CompareRequest {
    /// Models to compare.
    pub models: Vec<String>,
    /// Prompt sent to every model.
    pub message: String,
}

/// Comparison response.
#[derive(Debug, Serialize)]
pub struct CompareResponse {
    /// One reply per model.
    pub results: Vec<ComparisonResult>,
}

async fn list_models(State(state): State<Arc<AppState>>) -> ApiResult<Json<ModelsResponse>> {
    let models = state.models.list().await?;
    let active = state.models.active().await;
    Ok(Json(ModelsResponse { models, active }))
}

async fn load_model(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<Json<ModelResponse>> {
    let loaded = state.models.load(&name).await?;
    Ok(Json(ModelResponse {
        model: Some(loaded.name),
    }))
}

async fn unload_model(State(state): State<Arc<AppState>>) -> Json<ModelResponse> {
    let model = state.models.unload().await;
    Json(ModelResponse { model })
}

async fn ablate_model(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<Json<ModelResponse>> {
    let ablated = state.models.ablate(&name).await?;
    Ok(Json(ModelResponse {
        model: Some(ablated.name),
    }))
}

async fn compare_models(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<CompareRequest>,
) -> ApiResult<Json<CompareResponse>> {
    let results = state
        .models
        .compare(state.chat.as_ref(), &request.models, &request.message)
        .await?;
    debug!("Comparison finished for {} models", results.len());
    Ok(Json(CompareResponse { results }))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Method, Request};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::core::config::ModelConfig;
    use crate::storage::Database;

    async fn app() -> Router {
        let db = Database::open_in_memory().await.unwrap();
        let models = ModelConfig {
            models_dir: std::env::temp_dir().join(format!("lambeck-none-{}", uuid::Uuid::new_v4())),
        };
        create_router(AppState::new(&db, &models))
    }

    async fn send_raw(app: &Router, method: Method, uri: &str, body: Body) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body)
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let body = body.map_or_else(Body::empty, |b| Body::from(b.to_string()));
        send_raw(app, method, uri, body).await
    }

    async fn create(app: &Router, title: &str) -> String {
        let (status, created) = send(
            app,
            Method::POST,
            "/api/conversations",
            Some(json!({"title": title})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        created["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let app = app().await;
        let (status, body) = send(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "lambeck-studio");
    }

    #[tokio::test]
    async fn test_chat() {
        let app = app().await;
        let (ok_status, reply) = send(&app, Method::POST, "/chat", Some(json!({"message": "hi"}))).await;
        assert_eq!(ok_status, StatusCode::OK);
        assert_eq!(reply["response"], "(placeholder) You said: hi");

        let (blank_status, error) = send(&app, Method::POST, "/chat", Some(json!({"message": "  "}))).await;
        assert_eq!(blank_status, StatusCode::BAD_REQUEST);
        assert_eq!(error["detail"], "Prompt cannot be empty.");
    }

    #[tokio::test]
    async fn test_conversation_scenario() {
        let app = app().await;
        let (_, listed_before) = send(&app, Method::GET, "/api/conversations", None).await;
        assert_eq!(listed_before, json!([]));

        let c1 = create(&app, "T").await;
        let (message_status, m1) = send(
            &app,
            Method::POST,
            &format!("/api/conversations/{c1}/messages"),
            Some(json!({"sender": "user", "content": "hi"})),
        )
        .await;
        assert_eq!(message_status, StatusCode::OK);

        let (_, messages) = send(&app, Method::GET, &format!("/api/conversations/{c1}/messages"), None).await;
        assert_eq!(messages, json!([m1.clone()]));
        assert_eq!(messages[0]["sender"], "user");

        let (export_status, doc) = send(&app, Method::GET, &format!("/api/conversations/{c1}/export"), None).await;
        assert_eq!(export_status, StatusCode::OK);
        assert_eq!(doc["conversation"]["id"], c1.as_str());
        assert_eq!(doc["conversation"]["title"], "T");
        assert_eq!(doc["conversation"]["message_count"], 1);
        assert_eq!(doc["messages"], json!([m1]));
        assert_eq!(doc["transcripts"], json!([]));

        let (import_status, imported) = send(&app, Method::POST, "/api/conversations/import", Some(doc)).await;
        assert_eq!(import_status, StatusCode::OK);
        assert_ne!(imported["id"], c1.as_str());
        assert_eq!(imported["title"], "T");
        assert_eq!(imported["message_count"], 1);

        let (_, listed) = send(&app, Method::GET, "/api/conversations", None).await;
        assert_eq!(listed.as_array().map(Vec::len), Some(2));
        assert_eq!(listed[0]["id"], imported["id"]);
    }

    #[tokio::test]
    async fn test_transcripts_endpoints() {
        let app = app().await;
        let id = create(&app, "call").await;
        let uri = format!("/api/conversations/{id}/transcripts");

        let (_, empty) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(empty, json!([]));

        let (created_status, spoken) = send(
            &app,
            Method::POST,
            &uri,
            Some(json!({"speaker": "user", "content": "hello"})),
        )
        .await;
        assert_eq!(created_status, StatusCode::OK);
        assert_eq!(spoken["conversation_id"], id.as_str());

        let (list_status, listed) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(list_status, StatusCode::OK);
        assert_eq!(listed, json!([spoken]));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let app = app().await;
        let (_, created) = send(
            &app,
            Method::POST,
            "/api/conversations",
            Some(json!({"title": "draft", "metadata": {"tag": "x"}})),
        )
        .await;
        let uri = format!("/api/conversations/{}", created["id"].as_str().unwrap());

        let (update_status, updated) = send(&app, Method::PUT, &uri, Some(json!({"title": "final"}))).await;
        assert_eq!(update_status, StatusCode::OK);
        assert_eq!(updated["title"], "final");

        let (_, full) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(full["metadata"], json!({"tag": "x"}));

        let (delete_status, _) = send(&app, Method::DELETE, &uri, None).await;
        assert_eq!(delete_status, StatusCode::NO_CONTENT);
        let (gone_status, _) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(gone_status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_blank_title_is_rejected() {
        let app = app().await;
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/conversations",
            Some(json!({"title": " "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Title cannot be empty.");
    }

    #[tokio::test]
    async fn test_malformed_bodies_use_detail_shape() {
        let app = app().await;
        let (syntax_status, syntax) = send_raw(
            &app,
            Method::POST,
            "/api/conversations/import",
            Body::from("{\"conversation\": "),
        )
        .await;
        assert_eq!(syntax_status, StatusCode::BAD_REQUEST);
        assert!(syntax["detail"].is_string());

        let (shape_status, shape) = send(
            &app,
            Method::POST,
            "/api/conversations/import",
            Some(json!({"messages": []})),
        )
        .await;
        assert_eq!(shape_status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(shape["detail"].is_string());
    }

    #[tokio::test]
    async fn test_missing_conversation_is_404() {
        let app = app().await;
        let missing = ConversationId::new();
        for id in [missing.to_string(), "not-a-uuid".to_string()] {
            let (message_status, body) = send(
                &app,
                Method::POST,
                &format!("/api/conversations/{id}/messages"),
                Some(json!({"sender": "user", "content": "hi"})),
            )
            .await;
            assert_eq!(message_status, StatusCode::NOT_FOUND);
            assert_eq!(body["detail"], format!("conversation {id} not found"));

            let (transcript_status, _) = send(
                &app,
                Method::POST,
                &format!("/api/conversations/{id}/transcripts"),
                Some(json!({"speaker": "user", "content": "hi"})),
            )
            .await;
            assert_eq!(transcript_status, StatusCode::NOT_FOUND);

            let (listing_status, _) =
                send(&app, Method::GET, &format!("/api/conversations/{id}/transcripts"), None).await;
            assert_eq!(listing_status, StatusCode::NOT_FOUND);

            let (export_status, _) = send(&app, Method::GET, &format!("/api/conversations/{id}/export"), None).await;
            assert_eq!(export_status, StatusCode::NOT_FOUND);

            let (update_status, _) = send(
                &app,
                Method::PUT,
                &format!("/api/conversations/{id}"),
                Some(json!({"title": "x"})),
            )
            .await;
            assert_eq!(update_status, StatusCode::NOT_FOUND);
        }
    }

    #[tokio::test]
    async fn test_settings_merge() {
        let app = app().await;
        let (_, empty) = send(&app, Method::GET, "/api/settings", None).await;
        assert_eq!(empty, json!({"values": {}}));

        send(&app, Method::PUT, "/api/settings", Some(json!({"values": {"a": 1}}))).await;
        let (status, merged) = send(&app, Method::PUT, "/api/settings", Some(json!({"values": {"b": 2}}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(merged, json!({"values": {"a": 1, "b": 2}}));
    }

    #[tokio::test]
    async fn test_model_endpoints_without_models() {
        let app = app().await;
        let (list_status, listed) = send(&app, Method::GET, "/api/models", None).await;
        assert_eq!(list_status, StatusCode::OK);
        assert_eq!(listed, json!({"models": [], "active": null}));

        let (load_status, _) = send(&app, Method::POST, "/load_model/test_model.gguf", None).await;
        assert_eq!(load_status, StatusCode::NOT_FOUND);

        let (unload_status, unloaded) = send(&app, Method::POST, "/unload_model", None).await;
        assert_eq!(unload_status, StatusCode::OK);
        assert_eq!(unloaded, json!({"model": null}));

        let (compare_status, _) = send(
            &app,
            Method::POST,
            "/api/models/compare",
            Some(json!({"models": ["a.gguf"], "message": "hi"})),
        )
        .await;
        assert_eq!(compare_status, StatusCode::BAD_REQUEST);
    }
}
