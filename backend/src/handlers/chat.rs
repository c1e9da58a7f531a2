//! Chat API handlers
//!
//! Thin surface: validate the request, hand it to the chat service, return
//! the envelope. All analysis lives in the services layer.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::models::{ChatResponse, RowTable};
use crate::services::extractor::DateContext;
use crate::services::router::ChatTurn;
use crate::utils::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct ChatRequest {
    #[validate(length(min = 1, max = 2000, message = "질문은 1자 이상 2000자 이하여야 합니다"))]
    pub question: String,
    #[validate(length(min = 1, max = 128))]
    pub conversation_id: String,
    pub property_id: Option<String>,
    pub file_name: Option<String>,
    #[serde(default)]
    pub beginner_mode: bool,
}

/// POST /api/chat
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<Json<ChatResponse>> {
    request
        .validate()
        .map_err(|e| ApiError::bad_request(format!("요청이 올바르지 않습니다: {}", e)))?;

    let turn_id = uuid::Uuid::new_v4();
    tracing::info!(%turn_id, conversation_id = %request.conversation_id, "Chat turn received");

    let turn = ChatTurn {
        question: request.question,
        conversation_id: request.conversation_id,
        property_id: request.property_id,
        file_name: request.file_name,
        beginner_mode: request.beginner_mode,
    };

    let response = state.chat_service.handle(turn, &DateContext::current()).await;
    Ok(Json(response))
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterFileRequest {
    #[validate(length(min = 1, max = 256))]
    pub name: String,
    #[validate(length(min = 1, message = "비어 있지 않은 행 목록이 필요합니다"))]
    pub rows: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct RegisterFileResponse {
    pub name: String,
    pub row_count: usize,
    pub column_count: usize,
}

/// POST /api/files — register an in-memory table for the file route
pub async fn register_file(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterFileRequest>,
) -> ApiResult<Json<RegisterFileResponse>> {
    request
        .validate()
        .map_err(|e| ApiError::bad_request(format!("요청이 올바르지 않습니다: {}", e)))?;

    let table = RowTable::from_json_records(&request.rows);
    if table.columns.is_empty() {
        return Err(ApiError::bad_request("행 데이터에서 컬럼을 찾지 못했습니다."));
    }

    let response = RegisterFileResponse {
        name: request.name.clone(),
        row_count: table.len(),
        column_count: table.columns.len(),
    };
    state.chat_service.tables.register(&request.name, table);
    tracing::info!(
        "Registered table {:?}: {} rows, {} columns",
        response.name,
        response.row_count,
        response.column_count
    );
    Ok(Json(response))
}

/// GET /api/health
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
