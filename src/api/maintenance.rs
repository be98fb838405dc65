use crate::api::MgmtState;
use crate::api::messages::parse_id;
use crate::api::schemas::messaging::RepairResponse;
use crate::error::Result;
use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};

/// Recomputes a conversation's unread counters from its messages.
///
/// # Errors
/// Returns `AppError::NotFound` if the conversation does not exist.
pub async fn repair_unread_counts(
    State(state): State<MgmtState>,
    Path(conversation_id): Path<String>,
) -> Result<impl IntoResponse> {
    let conversation_id = parse_id("conversationId", &conversation_id)?;
    let unread_counts = state.message_service.repair_unread_counts(conversation_id).await?;

    tracing::info!(%conversation_id, "Unread counters repaired on request");
    Ok(Json(RepairResponse { conversation_id, unread_counts }))
}
