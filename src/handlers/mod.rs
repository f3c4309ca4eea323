//! HTTP handlers for the marketplace resources. Authentication lives in
//! `crate::auth`.

pub mod admin;
pub mod leaderboard;
pub mod listings;
pub mod messages;
pub mod notifications;
pub mod reports;
pub mod reviews;
pub mod users;
