//! Public profiles, own-profile updates and favorites.

use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::extract::Json;
use crate::models::{Listing, User};
use crate::AppState;

pub async fn get_profile(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<User>> {
    let mut conn = db::get_conn(&state.pool).await?;
    let user = db::users::get_by_id(&mut conn, id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    Ok(Json(user))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub bio: Option<String>,
    pub photo: Option<String>,
    pub links: Option<String>,
}

pub async fn update_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> ApiResult<Json<User>> {
    if let Some(ref name) = payload.name {
        if name.trim().is_empty() {
            return Err(ApiError::bad_request("Name must not be empty"));
        }
    }

    let mut conn = db::get_conn(&state.pool).await?;
    let updated = db::users::update_profile(
        &mut conn,
        user.id,
        payload.name.as_deref(),
        payload.bio.as_deref(),
        payload.photo.as_deref(),
        payload.links.as_deref(),
    )
    .await?;

    Ok(Json(updated))
}

pub async fn list_favorites(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<Vec<Listing>>> {
    let mut conn = db::get_conn(&state.pool).await?;
    let saved = db::favorites::listings_for_user(&mut conn, user.id).await?;

    Ok(Json(saved))
}

pub async fn add_favorite(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(listing_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let mut conn = db::get_conn(&state.pool).await?;

    // 404 before touching favorites so a dangling id cannot be saved
    db::listings::get_by_id(&mut conn, listing_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Listing"))?;

    db::favorites::add(&mut conn, user.id, listing_id).await?;

    Ok(Json(json!({ "message": "Added to favorites" })))
}

pub async fn remove_favorite(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(listing_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let mut conn = db::get_conn(&state.pool).await?;
    db::favorites::remove(&mut conn, user.id, listing_id).await?;

    Ok(Json(json!({ "message": "Removed from favorites" })))
}
