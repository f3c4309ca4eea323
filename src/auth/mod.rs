//! Authentication and access control.
//!
//! This module provides:
//! - the Google OAuth login flow (consent redirect, code exchange)
//! - account resolution with domain allow-listing and ban enforcement
//! - server-side sessions delivered via a signed cookie
//! - `CurrentUser` / `AdminUser` extractors for protecting routes

mod google;
mod guard;
pub mod handlers;
mod resolver;
mod session;

pub use guard::{AdminUser, CurrentUser};
pub use resolver::{DeniedReason, Resolution};
pub use session::SessionManager;
