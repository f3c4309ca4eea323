//! Listing CRUD. Reads are public; writes require a session, and updates
//! and deletes are restricted to the seller or an administrator.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::db::{self, ListingFilter};
use crate::error::{ApiError, ApiResult};
use crate::extract::{Json, Query};
use crate::models::{Listing, ListingWithSeller};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingQuery {
    pub category: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub condition: Option<String>,
    pub seller: Option<Uuid>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list_listings(
    State(state): State<AppState>,
    Query(params): Query<ListingQuery>,
) -> ApiResult<Json<Vec<ListingWithSeller>>> {
    let filter = ListingFilter {
        category: params.category,
        min_price: params.min_price,
        max_price: params.max_price,
        condition: params.condition,
        seller: params.seller,
        search: params.search,
        newest_first: params.sort.as_deref() == Some("createdAt_desc"),
        limit: params.limit,
    };

    let mut conn = db::get_conn(&state.pool).await?;
    let rows = db::listings::list(&mut conn, &filter).await?;

    Ok(Json(
        rows.into_iter()
            .map(|(listing, seller)| ListingWithSeller { listing, seller })
            .collect(),
    ))
}

pub async fn get_listing(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ListingWithSeller>> {
    let mut conn = db::get_conn(&state.pool).await?;
    let (listing, seller) = db::listings::get_with_seller(&mut conn, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Listing"))?;

    Ok(Json(ListingWithSeller { listing, seller }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateListingRequest {
    pub title: String,
    pub description: Option<String>,
    pub price: f64,
    pub category: Option<String>,
    pub condition: Option<String>,
    pub image_url: Option<String>,
}

pub async fn create_listing(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<CreateListingRequest>,
) -> ApiResult<Response> {
    if payload.title.trim().is_empty() {
        return Err(ApiError::bad_request("Title is required"));
    }
    if payload.price < 0.0 {
        return Err(ApiError::bad_request("Price must not be negative"));
    }

    let mut conn = db::get_conn(&state.pool).await?;
    let listing = db::listings::create(
        &mut conn,
        user.id,
        &payload.title,
        payload.description.as_deref(),
        payload.price,
        payload.category.as_deref(),
        payload.condition.as_deref(),
        payload.image_url.as_deref(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(listing)).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateListingRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub category: Option<String>,
    pub condition: Option<String>,
    pub image_url: Option<String>,
}

/// Load a listing and check the caller may modify it.
async fn load_owned_listing(
    conn: &mut diesel_async::AsyncPgConnection,
    id: Uuid,
    user: &crate::models::User,
) -> ApiResult<Listing> {
    let listing = db::listings::get_by_id(conn, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Listing"))?;

    if listing.seller_id != user.id && !user.is_admin {
        return Err(ApiError::forbidden("Forbidden"));
    }

    Ok(listing)
}

pub async fn update_listing(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateListingRequest>,
) -> ApiResult<Json<Listing>> {
    let mut conn = db::get_conn(&state.pool).await?;
    load_owned_listing(&mut conn, id, &user).await?;

    let updated = db::listings::update(
        &mut conn,
        id,
        payload.title.as_deref(),
        payload.description.as_deref(),
        payload.price,
        payload.category.as_deref(),
        payload.condition.as_deref(),
        payload.image_url.as_deref(),
    )
    .await?;

    Ok(Json(updated))
}

pub async fn delete_listing(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let mut conn = db::get_conn(&state.pool).await?;
    load_owned_listing(&mut conn, id, &user).await?;

    db::listings::delete(&mut conn, id).await?;

    Ok(Json(json!({ "message": "Listing removed" })))
}
