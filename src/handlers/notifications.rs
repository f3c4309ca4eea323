//! Per-user notifications, currently produced on message receipt.

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::Notification;
use crate::AppState;

pub async fn list_notifications(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<Vec<Notification>>> {
    let mut conn = db::get_conn(&state.pool).await?;
    let notifications = db::notifications::for_user(&mut conn, user.id).await?;

    Ok(Json(notifications))
}

pub async fn mark_notification_read(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let mut conn = db::get_conn(&state.pool).await?;
    let touched = db::notifications::mark_read(&mut conn, id, user.id).await?;

    if touched == 0 {
        return Err(ApiError::not_found("Notification"));
    }

    Ok(Json(json!({ "message": "Notification read" })))
}
