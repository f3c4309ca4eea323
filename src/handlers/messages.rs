//! Direct messages between users, with a derived conversations view.

use std::collections::{HashMap, HashSet};

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::extract::{Json, Query};
use crate::models::Message;
use crate::AppState;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationPartner {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

/// One entry per messaging partner, carrying the most recent message.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub other_user: ConversationPartner,
    pub last_message: Message,
}

pub async fn list_conversations(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<Vec<Conversation>>> {
    let mut conn = db::get_conn(&state.pool).await?;
    let messages = db::messages::involving(&mut conn, user.id).await?;

    // Messages arrive newest first, so the first message seen per partner
    // is the latest one in that conversation.
    let mut latest: Vec<(Uuid, Message)> = Vec::new();
    let mut seen: HashSet<Uuid> = HashSet::new();
    for message in messages {
        let other = if message.sender_id == user.id {
            message.receiver_id
        } else {
            message.sender_id
        };
        if seen.insert(other) {
            latest.push((other, message));
        }
    }

    let partner_ids: Vec<Uuid> = latest.iter().map(|(id, _)| *id).collect();
    let partners = db::users::by_ids(&mut conn, &partner_ids).await?;
    let partners: HashMap<Uuid, ConversationPartner> = partners
        .into_iter()
        .map(|u| {
            (
                u.id,
                ConversationPartner {
                    id: u.id,
                    name: u.name,
                    email: u.email,
                },
            )
        })
        .collect();

    let conversations = latest
        .into_iter()
        .filter_map(|(other, message)| {
            partners.get(&other).map(|partner| Conversation {
                other_user: partner.clone(),
                last_message: message,
            })
        })
        .collect();

    Ok(Json(conversations))
}

#[derive(Debug, Deserialize)]
pub struct ThreadQuery {
    pub with: Option<Uuid>,
}

pub async fn get_thread(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<ThreadQuery>,
) -> ApiResult<Json<Vec<Message>>> {
    let other = params
        .with
        .ok_or_else(|| ApiError::bad_request("\"with\" query param (userId) is required"))?;

    let mut conn = db::get_conn(&state.pool).await?;
    let messages = db::messages::thread(&mut conn, user.id, other).await?;

    Ok(Json(messages))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub to: Uuid,
    pub content: String,
    pub listing_id: Option<Uuid>,
}

pub async fn send_message(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<SendMessageRequest>,
) -> ApiResult<Response> {
    if payload.content.trim().is_empty() {
        return Err(ApiError::bad_request("Recipient and content required"));
    }

    let mut conn = db::get_conn(&state.pool).await?;

    db::users::get_by_id(&mut conn, payload.to)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    let message = db::messages::create(
        &mut conn,
        user.id,
        payload.to,
        &payload.content,
        payload.listing_id,
    )
    .await?;

    // Best effort: a failed notification must not fail the send.
    let note = format!("New message from {}", user.name);
    if let Err(e) =
        db::notifications::create(&mut conn, payload.to, &note, Some("/messages")).await
    {
        tracing::warn!("Failed to create message notification: {:?}", e);
    }

    Ok((StatusCode::CREATED, Json(message)).into_response())
}
