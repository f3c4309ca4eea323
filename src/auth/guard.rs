//! Typed request guards.
//!
//! Instead of stashing the logged-in user on the request object, handlers
//! declare the access level they need in their signature: `CurrentUser`
//! rejects with 401, `AdminUser` runs the same resolution first and then
//! rejects non-admins with 403.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};

use crate::db;
use crate::error::ApiError;
use crate::models::User;
use crate::AppState;

/// The authenticated account for this request.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// An authenticated account with the administrator flag set.
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

/// Pull the session token out of the Cookie header.
pub(super) fn session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;

    for cookie_str in cookie_header.split(';') {
        if let Ok(parsed) = cookie::Cookie::parse(cookie_str.trim()) {
            if parsed.name() == cookie_name {
                return Some(parsed.value().to_string());
            }
        }
    }

    None
}

async fn resolve_request_user(parts: &Parts, state: &AppState) -> Result<User, ApiError> {
    let token = session_token(&parts.headers, state.sessions.cookie_name())
        .ok_or_else(|| ApiError::unauthorized("Not logged in"))?;

    let account_id = state
        .sessions
        .resolve(&token)
        .await
        .ok_or_else(|| ApiError::unauthorized("Not logged in"))?;

    let mut conn = db::get_conn(&state.pool).await?;
    let user = db::users::get_by_id(&mut conn, account_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Not logged in"))?;

    // Ban status is re-checked on every request, not just at login, so a
    // user banned mid-session loses access immediately.
    if user.banned {
        tracing::warn!("Rejected request from banned user {}", user.email);
        return Err(ApiError::unauthorized("Not logged in"));
    }

    Ok(user)
}

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        resolve_request_user(parts, state).await.map(CurrentUser)
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Authentication first, so anonymous requests get 401 rather
        // than 403.
        let user = resolve_request_user(parts, state).await?;

        if !user.is_admin {
            return Err(ApiError::forbidden("Forbidden (admin only)"));
        }

        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with_cookie(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn finds_session_cookie_among_others() {
        let headers =
            headers_with_cookie("theme=dark; campus_session=tok-123; other=1");
        assert_eq!(
            session_token(&headers, "campus_session"),
            Some("tok-123".to_string())
        );
    }

    #[test]
    fn missing_cookie_header_yields_none() {
        assert_eq!(session_token(&HeaderMap::new(), "campus_session"), None);
    }

    #[test]
    fn other_cookies_do_not_match() {
        let headers = headers_with_cookie("theme=dark");
        assert_eq!(session_token(&headers, "campus_session"), None);
    }
}
