//! Leaderboard: the one aggregation query in the system. Sold listings are
//! grouped by seller (and buyer), counted, and the top five joined back to
//! user names.

use std::collections::HashMap;

use axum::{extract::State, Json};
use serde::Serialize;
use uuid::Uuid;

use crate::db;
use crate::error::ApiResult;
use crate::AppState;

const TOP_N: i64 = 5;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopSeller {
    pub id: Uuid,
    pub name: String,
    pub items_sold: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopBuyer {
    pub id: Uuid,
    pub name: String,
    pub items_bought: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardResponse {
    pub top_sellers: Vec<TopSeller>,
    pub top_buyers: Vec<TopBuyer>,
}

pub async fn get_leaderboard(
    State(state): State<AppState>,
) -> ApiResult<Json<LeaderboardResponse>> {
    let mut conn = db::get_conn(&state.pool).await?;

    let seller_counts = db::leaderboard::top_sellers(&mut conn, TOP_N).await?;
    let buyer_counts = db::leaderboard::top_buyers(&mut conn, TOP_N).await?;

    let mut ids: Vec<Uuid> = seller_counts.iter().map(|(id, _)| *id).collect();
    ids.extend(buyer_counts.iter().map(|(id, _)| *id));
    let names: HashMap<Uuid, String> = db::users::by_ids(&mut conn, &ids)
        .await?
        .into_iter()
        .map(|u| (u.id, u.name))
        .collect();

    // Counts for users that no longer resolve are dropped rather than shown
    // nameless.
    let top_sellers = seller_counts
        .into_iter()
        .filter_map(|(id, count)| {
            names.get(&id).map(|name| TopSeller {
                id,
                name: name.clone(),
                items_sold: count,
            })
        })
        .collect();

    let top_buyers = buyer_counts
        .into_iter()
        .filter_map(|(id, count)| {
            names.get(&id).map(|name| TopBuyer {
                id,
                name: name.clone(),
                items_bought: count,
            })
        })
        .collect();

    Ok(Json(LeaderboardResponse {
        top_sellers,
        top_buyers,
    }))
}
