//! Abuse reports filed by users; moderation lives under `admin`.

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
use crate::extract::Json;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReportRequest {
    pub reported_user: Option<Uuid>,
    pub reported_listing: Option<Uuid>,
    pub description: String,
}

pub async fn create_report(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<CreateReportRequest>,
) -> ApiResult<Response> {
    if payload.description.trim().is_empty()
        || (payload.reported_user.is_none() && payload.reported_listing.is_none())
    {
        return Err(ApiError::bad_request(
            "Report must include description and a target.",
        ));
    }

    let kind = if payload.reported_user.is_some() {
        "user"
    } else {
        "listing"
    };

    let mut conn = db::get_conn(&state.pool).await?;
    let report = db::reports::create(
        &mut conn,
        user.id,
        payload.reported_user,
        payload.reported_listing,
        &payload.description,
        kind,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(report)).into_response())
}
