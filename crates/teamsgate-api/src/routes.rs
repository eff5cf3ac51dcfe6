//! HTTP routes and the JSON envelope.
//!
//! Every response except health is `{"result": "success", ...}` or
//! `{"result": "error", "error": "..."}`.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use teamsgate_core::{Chat, ContentType, CoreError, GraphClient, OutboundMessage};

#[derive(Clone)]
pub struct AppState {
    pub graph: Arc<GraphClient>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health).fallback(method_not_allowed))
        .route("/api/chat_list", get(chat_list).fallback(method_not_allowed))
        .route("/api/message", post(message).fallback(method_not_allowed))
        .route("/api/id", post(chat_id).fallback(method_not_allowed))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct Envelope<T> {
    result: &'static str,
    #[serde(flatten)]
    body: T,
}

impl<T: Serialize> Envelope<T> {
    const fn success(body: T) -> Json<Self> {
        Json(Self {
            result: "success",
            body,
        })
    }
}

#[derive(Serialize)]
struct Empty {}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Serialize)]
struct ChatListBody {
    chats: Vec<Chat>,
}

#[derive(Serialize)]
struct ChatIdBody {
    #[serde(rename = "chat-id")]
    chat_id: String,
    name: String,
}

#[derive(Deserialize)]
struct MessageRequest {
    #[serde(rename = "chat-id")]
    chat_id: Option<String>,
    message: Option<String>,
    #[serde(rename = "content-type", default)]
    content_type: ContentType,
}

#[derive(Deserialize)]
struct ChatIdRequest {
    #[serde(rename = "user-id")]
    user_id: Option<String>,
}

/// A `CoreError` rendered as the error envelope.
struct ApiError(CoreError);

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        Self(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(CoreError::Validation(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            CoreError::Validation(_) => StatusCode::BAD_REQUEST,
            CoreError::ChatNotFound(_) => StatusCode::NOT_FOUND,
            CoreError::Graph(_) => StatusCode::BAD_GATEWAY,
            CoreError::AuthUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CoreError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            log::error!("request failed: {}", self.0);
        } else {
            log::warn!("request rejected: {}", self.0);
        }

        error_response(status, self.0.to_string())
    }
}

fn error_response(status: StatusCode, error: String) -> Response {
    (
        status,
        Json(Envelope {
            result: "error",
            body: ErrorBody { error },
        }),
    )
        .into_response()
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn chat_list(State(state): State<AppState>) -> Result<Json<Envelope<ChatListBody>>, ApiError> {
    let chats = state.graph.list_chats().await?;
    Ok(Envelope::success(ChatListBody { chats }))
}

async fn message(
    State(state): State<AppState>,
    payload: Result<Json<MessageRequest>, JsonRejection>,
) -> Result<Json<Envelope<Empty>>, ApiError> {
    let Json(request) = payload?;

    let (Some(chat_id), Some(body)) = (request.chat_id, request.message) else {
        return Err(CoreError::Validation("Missing chat-id or message".to_string()).into());
    };

    let outbound = OutboundMessage::new(chat_id, body).with_content_type(request.content_type);
    state.graph.send_message(&outbound).await?;

    Ok(Envelope::success(Empty {}))
}

async fn chat_id(
    State(state): State<AppState>,
    payload: Result<Json<ChatIdRequest>, JsonRejection>,
) -> Result<Json<Envelope<ChatIdBody>>, ApiError> {
    let Json(request) = payload?;

    let Some(user_id) = request.user_id else {
        return Err(CoreError::Validation("Missing user-id".to_string()).into());
    };

    let lookup = state.graph.find_chat(&user_id).await?;
    Ok(Envelope::success(ChatIdBody {
        chat_id: lookup.chat_id,
        name: lookup.name,
    }))
}

async fn not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, "not found".to_string())
}

async fn method_not_allowed() -> Response {
    error_response(StatusCode::METHOD_NOT_ALLOWED, "method not allowed".to_string())
}
