//! Moderation endpoints. Every handler takes `AdminUser`, so anonymous
//! callers get 401 and non-admin sessions get 403.

use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::auth::AdminUser;
use crate::db::{self, ListingFilter};
use crate::error::{ApiError, ApiResult};
use crate::extract::Json;
use crate::models::{ListingWithSeller, Report, User};
use crate::AppState;

pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<Vec<User>>> {
    let mut conn = db::get_conn(&state.pool).await?;
    let users = db::users::list_all(&mut conn).await?;

    Ok(Json(users))
}

pub async fn list_listings(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<Vec<ListingWithSeller>>> {
    let mut conn = db::get_conn(&state.pool).await?;
    let rows = db::listings::list(&mut conn, &ListingFilter::default()).await?;

    Ok(Json(
        rows.into_iter()
            .map(|(listing, seller)| ListingWithSeller { listing, seller })
            .collect(),
    ))
}

#[derive(Debug, Deserialize)]
pub struct BanRequest {
    #[serde(default)]
    pub banned: bool,
}

pub async fn ban_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<BanRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let mut conn = db::get_conn(&state.pool).await?;
    let user = db::users::set_banned(&mut conn, id, payload.banned)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    tracing::info!(
        "Admin set banned={} for user {}",
        user.banned,
        user.email
    );

    let message = if user.banned {
        "User banned"
    } else {
        "User unbanned"
    };
    Ok(Json(json!({ "message": message })))
}

#[derive(Debug, Deserialize)]
pub struct FeatureRequest {
    #[serde(default)]
    pub featured: bool,
}

pub async fn feature_listing(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<FeatureRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let mut conn = db::get_conn(&state.pool).await?;
    let listing = db::listings::set_featured(&mut conn, id, payload.featured)
        .await?
        .ok_or_else(|| ApiError::not_found("Listing"))?;

    let message = if listing.is_featured {
        "Listing featured"
    } else {
        "Listing unfeatured"
    };
    Ok(Json(json!({ "message": message })))
}

pub async fn list_reports(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<Vec<Report>>> {
    let mut conn = db::get_conn(&state.pool).await?;
    let reports = db::reports::list_all(&mut conn).await?;

    Ok(Json(reports))
}

pub async fn resolve_report(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let mut conn = db::get_conn(&state.pool).await?;
    let deleted = db::reports::delete(&mut conn, id).await?;

    if deleted == 0 {
        return Err(ApiError::not_found("Report"));
    }

    Ok(Json(json!({ "message": "Report resolved" })))
}
