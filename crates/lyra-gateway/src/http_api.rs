//! HTTP surface over the orchestrator: platform webhooks on one side,
//! delivery workers and the operator console on the other.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use lyra_contract::{ConversationMode, ConversationPriority, InboundMessage, Origin, SenderRole};
use lyra_orchestrator::{Orchestrator, OrchestratorError};
use lyra_store::ConversationFilters;


pub const INBOUND_MESSAGE_ENDPOINT: &str = "/orchestrator/inbound-message";
pub const OUTBOUND_POLL_ENDPOINT: &str = "/orchestrator/outbound/poll";
pub const OUTBOUND_CONFIRM_ENDPOINT: &str = "/orchestrator/outbound/confirm";
pub const CONVERSATIONS_ENDPOINT: &str = "/orchestrator/conversations";
pub const CONVERSATION_DETAIL_ENDPOINT: &str = "/orchestrator/conversations/{conversation_id}";
pub const CONVERSATION_REPLY_ENDPOINT: &str =
    "/orchestrator/conversations/{conversation_id}/reply";
pub const CONVERSATION_MODE_ENDPOINT: &str = "/orchestrator/conversations/{conversation_id}/mode";
pub const HEALTH_ENDPOINT: &str = "/healthz";

const DEFAULT_POLL_LIMIT: usize = 20;

/// Shared state behind every HTTP handler.
pub struct GatewayState {
    pub orchestrator: Orchestrator,
}

#[derive(Debug)]
/// JSON API error with the stable Lyra error codes.
struct GatewayApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl GatewayApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: lyra_contract::LYRA_ERROR_INVALID_INPUT,
            message: message.into(),
        }
    }
}

impl From<OrchestratorError> for GatewayApiError {
    fn from(error: OrchestratorError) -> Self {
        let status = match &error {
            OrchestratorError::PerformerNotFound(_)
            | OrchestratorError::ConversationNotFound(_)
            | OrchestratorError::DraftNotFound(_) => StatusCode::NOT_FOUND,
            OrchestratorError::MessageNotADraft(_) | OrchestratorError::InvalidInput(_) => {
                StatusCode::BAD_REQUEST
            }
            OrchestratorError::Infrastructure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %error, "gateway request hit infrastructure failure");
        }
        Self {
            status,
            code: error.error_code(),
            message: error.to_string(),
        }
    }
}

impl IntoResponse for GatewayApiError {
    fn into_response(self) -> Response {
        let error_type = if self.status.is_client_error() {
            "invalid_request_error"
        } else {
            "server_error"
        };
        (
            self.status,
            Json(json!({
                "error": {
                    "type": error_type,
                    "code": self.code,
                    "message": self.message,
                }
            })),
        )
            .into_response()
    }
}

pub fn build_gateway_router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route(INBOUND_MESSAGE_ENDPOINT, post(handle_inbound_message))
        .route(OUTBOUND_POLL_ENDPOINT, get(handle_outbound_poll))
        .route(OUTBOUND_CONFIRM_ENDPOINT, post(handle_outbound_confirm))
        .route(CONVERSATIONS_ENDPOINT, get(handle_conversation_list))
        .route(CONVERSATION_DETAIL_ENDPOINT, get(handle_conversation_detail))
        .route(CONVERSATION_REPLY_ENDPOINT, post(handle_conversation_reply))
        .route(CONVERSATION_MODE_ENDPOINT, patch(handle_conversation_mode))
        .route(HEALTH_ENDPOINT, get(handle_health))
        .with_state(state)
}

async fn handle_health() -> Response {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "schema_version": lyra_contract::CONVERSATION_CONTRACT_SCHEMA_VERSION,
        })),
    )
        .into_response()
}

async fn handle_inbound_message(
    State(state): State<Arc<GatewayState>>,
    payload: Result<Json<InboundMessage>, JsonRejection>,
) -> Response {
    // A body that fails schema deserialization (unknown origin tag,
    // missing field) gets the same error envelope as every other handler.
    let Json(message) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            return GatewayApiError::bad_request(rejection.body_text()).into_response();
        }
    };
    match state.orchestrator.handle_inbound(message).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(error) => GatewayApiError::from(error).into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct OutboundPollQuery {
    origin: String,
    limit: Option<usize>,
}

async fn handle_outbound_poll(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<OutboundPollQuery>,
) -> Response {
    let origin = match Origin::parse(&query.origin) {
        Ok(origin) => origin,
        Err(error) => return GatewayApiError::bad_request(error.to_string()).into_response(),
    };
    let limit = query.limit.unwrap_or(DEFAULT_POLL_LIMIT);
    let jobs = state.orchestrator.outbound().poll(origin, limit);
    (StatusCode::OK, Json(json!({ "jobs": jobs }))).into_response()
}

#[derive(Debug, Deserialize)]
struct OutboundConfirmRequest {
    origin: String,
    external_user_id: String,
    message_id: i64,
}

async fn handle_outbound_confirm(
    State(state): State<Arc<GatewayState>>,
    Json(request): Json<OutboundConfirmRequest>,
) -> Response {
    let origin = match Origin::parse(&request.origin) {
        Ok(origin) => origin,
        Err(error) => return GatewayApiError::bad_request(error.to_string()).into_response(),
    };
    let confirmed =
        state
            .orchestrator
            .outbound()
            .confirm(origin, &request.external_user_id, request.message_id);
    (StatusCode::OK, Json(json!({ "confirmed": confirmed }))).into_response()
}

#[derive(Debug, Default, Deserialize)]
struct ConversationListQuery {
    operator_id: Option<i64>,
    mode: Option<String>,
    priority: Option<String>,
    origin: Option<String>,
    active_only: Option<bool>,
    limit: Option<i64>,
    offset: Option<i64>,
}

fn build_filters(query: ConversationListQuery) -> Result<ConversationFilters, GatewayApiError> {
    let mode = query
        .mode
        .as_deref()
        .map(ConversationMode::parse)
        .transpose()
        .map_err(|error| GatewayApiError::bad_request(error.to_string()))?;
    let priority = query
        .priority
        .as_deref()
        .map(ConversationPriority::parse)
        .transpose()
        .map_err(|error| GatewayApiError::bad_request(error.to_string()))?;
    let origin = query
        .origin
        .as_deref()
        .map(Origin::parse)
        .transpose()
        .map_err(|error| GatewayApiError::bad_request(error.to_string()))?;
    Ok(ConversationFilters {
        operator_id: query.operator_id,
        mode,
        priority,
        origin,
        active_only: query.active_only.unwrap_or(true),
        limit: query.limit,
        offset: query.offset,
    })
}

async fn handle_conversation_list(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<ConversationListQuery>,
) -> Response {
    let filters = match build_filters(query) {
        Ok(filters) => filters,
        Err(error) => return error.into_response(),
    };
    match state.orchestrator.list_conversations(&filters) {
        Ok(conversations) => (
            StatusCode::OK,
            Json(json!({ "conversations": conversations })),
        )
            .into_response(),
        Err(error) => GatewayApiError::from(error).into_response(),
    }
}

async fn handle_conversation_detail(
    State(state): State<Arc<GatewayState>>,
    Path(conversation_id): Path<i64>,
) -> Response {
    match state.orchestrator.conversation_detail(conversation_id) {
        Ok(detail) => (StatusCode::OK, Json(detail)).into_response(),
        Err(error) => GatewayApiError::from(error).into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct ConversationReplyRequest {
    text: String,
    send_as: Option<SenderRole>,
    edit_draft_id: Option<i64>,
}

async fn handle_conversation_reply(
    State(state): State<Arc<GatewayState>>,
    Path(conversation_id): Path<i64>,
    Json(request): Json<ConversationReplyRequest>,
) -> Response {
    let send_as = request.send_as.unwrap_or(SenderRole::Operator);
    match state.orchestrator.submit_reply(
        conversation_id,
        &request.text,
        send_as,
        request.edit_draft_id,
    ) {
        Ok(receipt) => (StatusCode::OK, Json(receipt)).into_response(),
        Err(error) => GatewayApiError::from(error).into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct ConversationModeRequest {
    mode: ConversationMode,
}

async fn handle_conversation_mode(
    State(state): State<Arc<GatewayState>>,
    Path(conversation_id): Path<i64>,
    Json(request): Json<ConversationModeRequest>,
) -> Response {
    match state
        .orchestrator
        .set_conversation_mode(conversation_id, request.mode)
    {
        Ok(change) => (StatusCode::OK, Json(change)).into_response(),
        Err(error) => GatewayApiError::from(error).into_response(),
    }
}
