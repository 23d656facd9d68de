use actix_web::http::header::CACHE_CONTROL;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use futures::StreamExt;
use log::{error, info};
use serde_json::json;
use tokio::time::{timeout_at, Instant};
use uuid::Uuid;

use crate::auth::is_authorized;
use crate::error::AppError;
use crate::model::prompt::SYSTEM_PROMPT;
use crate::model::CompletionRequest;
use crate::web::models::ChatRequest;
use crate::web::relay::relay;
use crate::AppState;

/// Conversations larger than this are refused.
pub const CHAT_PAYLOAD_LIMIT: usize = 1024 * 1024;

// Health check endpoint
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

// Chat API endpoint: relays the conversation to the model and streams the reply
pub async fn chat(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Payload,
) -> Result<HttpResponse, AppError> {
    // The whole exchange, connect included, shares one deadline.
    let deadline = Instant::now() + data.config.max_duration;

    let session = data.sessions.verify(&req);
    if !is_authorized(session.as_ref(), data.config.permissive_mode) {
        return Err(AppError::Unauthorized);
    }

    let body = read_body(payload, CHAT_PAYLOAD_LIMIT).await?;
    let chat: ChatRequest = serde_json::from_slice(&body).map_err(|e| {
        error!("Rejected chat request body: {}", e);
        AppError::Internal(format!("invalid chat request: {}", e))
    })?;

    if data.config.openai_api_key.is_none() {
        error!("Chat request received but OPENAI_API_KEY is not set");
        return Err(AppError::Misconfigured("OpenAI API key"));
    }

    let request_id = Uuid::new_v4();
    info!(
        "Chat request {} from {}: {} messages",
        request_id,
        session.as_ref().map(|s| s.sub.as_str()).unwrap_or("permissive mode"),
        chat.messages.len()
    );

    let request = CompletionRequest {
        system: SYSTEM_PROMPT.to_string(),
        messages: chat.messages,
    };

    let fragments = match timeout_at(deadline, data.model.stream_chat(request)).await {
        Ok(Ok(fragments)) => fragments,
        Ok(Err(e)) => {
            error!("Chat request {} could not reach the model: {}", request_id, e);
            return Err(AppError::from(e));
        }
        Err(_) => {
            error!("Chat request {} got no model response before its deadline", request_id);
            return Err(AppError::Internal("model did not respond in time".to_string()));
        }
    };

    Ok(HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .insert_header((CACHE_CONTROL, "no-cache"))
        .insert_header(("X-Accel-Buffering", "no"))
        .streaming(relay(fragments, deadline, request_id)))
}

async fn read_body(mut payload: web::Payload, limit: usize) -> Result<web::BytesMut, AppError> {
    let mut body = web::BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk.map_err(|e| AppError::Internal(format!("reading chat body: {}", e)))?;
        if body.len() + chunk.len() > limit {
            error!("Rejected chat request body over {} bytes", limit);
            return Err(AppError::Internal("chat request body too large".to_string()));
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}
