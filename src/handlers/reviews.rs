//! Reviews left on user profiles.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::extract::{Json, Query};
use crate::models::{ReviewerInfo, ReviewWithReviewer};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewsQuery {
    pub target_user: Option<Uuid>,
}

pub async fn list_reviews(
    State(state): State<AppState>,
    Query(params): Query<ReviewsQuery>,
) -> ApiResult<Json<Vec<ReviewWithReviewer>>> {
    let target = params
        .target_user
        .ok_or_else(|| ApiError::bad_request("targetUser query param required"))?;

    let mut conn = db::get_conn(&state.pool).await?;
    let rows = db::reviews::for_target(&mut conn, target).await?;

    Ok(Json(
        rows.into_iter()
            .map(|(review, reviewer)| ReviewWithReviewer { review, reviewer })
            .collect(),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReviewRequest {
    pub target_user: Uuid,
    pub rating: i32,
    pub comment: Option<String>,
}

pub async fn create_review(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<CreateReviewRequest>,
) -> ApiResult<Response> {
    if !(1..=5).contains(&payload.rating) {
        return Err(ApiError::bad_request("Rating must be between 1 and 5"));
    }

    let mut conn = db::get_conn(&state.pool).await?;

    db::users::get_by_id(&mut conn, payload.target_user)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    let review = db::reviews::create(
        &mut conn,
        user.id,
        payload.target_user,
        payload.rating,
        payload.comment.as_deref(),
    )
    .await?;

    let response = ReviewWithReviewer {
        review,
        reviewer: ReviewerInfo {
            id: user.id,
            name: user.name,
        },
    };

    Ok((StatusCode::CREATED, Json(response)).into_response())
}
