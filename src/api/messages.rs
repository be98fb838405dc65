use crate::api::AppState;
use crate::api::schemas::messaging::{
    ConversationsResponse, EditMessageRequest, MarkReadResponse, MessageDto, MessagesQuery, MessagesResponse,
    PageQuery, PaginationDto, SendMessageRequest, SendMessageResponse, StatusResponse, UnreadCountResponse,
    UserActionRequest,
};
use crate::domain::message::{MessageType, OutgoingMessage};
use crate::error::{AppError, Result};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

/// Parses a path or body identifier, rejecting malformed ids as a bad request.
pub(crate) fn parse_id(field: &str, raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::BadRequest(format!("{field} is not a valid id")))
}

/// Sends a direct message.
///
/// # Errors
/// Returns `AppError::BadRequest` if required fields are missing or malformed.
/// Returns `AppError::Unauthorized` if the users are not connected.
pub async fn send_message(
    State(state): State<AppState>,
    Json(payload): Json<SendMessageRequest>,
) -> Result<impl IntoResponse> {
    let message_type = match payload.message_type.as_deref() {
        Some(raw) if !raw.trim().is_empty() => raw.trim().parse::<MessageType>()?,
        _ => MessageType::default(),
    };
    let reply_to = match payload.reply_to.as_deref() {
        Some(raw) if !raw.trim().is_empty() => Some(parse_id("replyTo", raw)?),
        _ => None,
    };

    let outgoing = OutgoingMessage {
        sender_id: payload.sender_id.unwrap_or_default(),
        receiver_id: payload.receiver_id.unwrap_or_default(),
        content: payload.content.unwrap_or_default(),
        message_type,
        media_key: payload.media_url,
        media_file_name: payload.media_file_name,
        reply_to,
    };

    let view = state.message_service.send_message(outgoing).await?;

    Ok((
        StatusCode::CREATED,
        Json(SendMessageResponse { message: "Message sent successfully".to_string(), data: view.into() }),
    ))
}

/// Lists a user's conversations.
///
/// # Errors
/// Returns `AppError::BadRequest` if the user id is blank.
pub async fn get_conversations(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse> {
    let page = state.message_service.get_conversations(&user_id, query.page(), query.limit()).await?;

    Ok(Json(ConversationsResponse {
        conversations: page.items.into_iter().map(Into::into).collect(),
        pagination: PaginationDto::new(page.page, page.total),
    }))
}

/// Lists the messages of a conversation, oldest first within the page.
///
/// # Errors
/// Returns `AppError::BadRequest` if the ids are missing or malformed.
/// Returns `AppError::Forbidden` if the user is not a participant.
pub async fn get_messages(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    Query(query): Query<MessagesQuery>,
) -> Result<impl IntoResponse> {
    let conversation_id = parse_id("conversationId", &conversation_id)?;
    let user_id = query.user_id.unwrap_or_default();

    let page = state
        .message_service
        .get_messages(conversation_id, &user_id, query.paging.page(), query.paging.limit())
        .await?;

    Ok(Json(MessagesResponse {
        messages: page.items.into_iter().map(MessageDto::from).collect(),
        pagination: PaginationDto::new(page.page, page.total),
    }))
}

/// Marks a conversation as read for a user.
///
/// # Errors
/// Returns `AppError::Forbidden` if the user is not a participant.
pub async fn mark_as_read(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    Json(payload): Json<UserActionRequest>,
) -> Result<impl IntoResponse> {
    let conversation_id = parse_id("conversationId", &conversation_id)?;
    let user_id = payload.user_id.unwrap_or_default();

    let marked_count = state.message_service.mark_as_read(conversation_id, &user_id).await?;

    Ok(Json(MarkReadResponse { message: "Messages marked as read".to_string(), marked_count }))
}

/// Soft-deletes one of the user's messages.
///
/// # Errors
/// Returns `AppError::NotFound` if the message does not exist.
/// Returns `AppError::Forbidden` if the user did not send it.
pub async fn delete_message(
    State(state): State<AppState>,
    Path(message_id): Path<String>,
    Json(payload): Json<UserActionRequest>,
) -> Result<impl IntoResponse> {
    let message_id = parse_id("messageId", &message_id)?;
    let user_id = payload.user_id.unwrap_or_default();

    state.message_service.delete_message(message_id, &user_id).await?;

    Ok(Json(StatusResponse { message: "Message deleted successfully".to_string() }))
}

/// Replaces the content of one of the user's messages.
///
/// # Errors
/// Returns `AppError::BadRequest` if the content is blank or too long.
/// Returns `AppError::NotFound` if the message does not exist.
/// Returns `AppError::Forbidden` if the user did not send it.
pub async fn edit_message(
    State(state): State<AppState>,
    Path(message_id): Path<String>,
    Json(payload): Json<EditMessageRequest>,
) -> Result<impl IntoResponse> {
    let message_id = parse_id("messageId", &message_id)?;
    let user_id = payload.user_id.unwrap_or_default();
    let content = payload.content.unwrap_or_default();

    let view = state.message_service.edit_message(message_id, &user_id, &content).await?;

    Ok(Json(SendMessageResponse { message: "Message updated successfully".to_string(), data: view.into() }))
}

pub async fn get_unread_count(State(state): State<AppState>, Path(user_id): Path<String>) -> Result<impl IntoResponse> {
    let unread_count = state.message_service.get_unread_count(&user_id).await?;
    Ok(Json(UnreadCountResponse { unread_count }))
}
