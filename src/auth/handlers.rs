//! Authentication HTTP handlers: login redirect, OAuth callback, logout,
//! current-user lookup.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::Deserialize;

use super::guard::{session_token, CurrentUser};
use super::{google, resolver, Resolution};
use crate::db;
use crate::error::{ApiError, ApiResult, ErrorResponse};
use crate::AppState;

/// Redirect the browser to the Google consent screen, carrying a signed
/// `state` value that the callback verifies.
pub async fn auth_google(State(state): State<AppState>) -> ApiResult<Redirect> {
    let csrf_state = state
        .sessions
        .issue_login_state()
        .map_err(|e| ApiError::Internal(e.into()))?;
    Ok(Redirect::to(&google::authorize_url(
        &state.config,
        &csrf_state,
    )))
}

#[derive(Debug, Deserialize)]
pub struct AuthCallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set by the provider when the user cancels the consent screen.
    pub error: Option<String>,
}

/// Handle the provider redirect back to us.
///
/// The browser, not a script, is the caller here, so every failure path is
/// a redirect to the client's login page rather than a JSON error.
pub async fn auth_callback(
    State(state): State<AppState>,
    Query(params): Query<AuthCallbackParams>,
) -> Response {
    match handle_callback_inner(&state, params).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!("Auth callback error: {:?}", e);
            login_redirect(&state).into_response()
        }
    }
}

async fn handle_callback_inner(
    state: &AppState,
    params: AuthCallbackParams,
) -> anyhow::Result<Response> {
    if let Some(provider_error) = params.error {
        tracing::warn!("Provider returned error on callback: {}", provider_error);
        return Ok(login_redirect(state).into_response());
    }

    let state_ok = params
        .state
        .as_deref()
        .map(|s| state.sessions.verify_login_state(s))
        .unwrap_or(false);
    if !state_ok {
        tracing::warn!("Callback with missing or invalid state parameter");
        return Ok(login_redirect(state).into_response());
    }

    let code = match params.code {
        Some(code) => code,
        None => {
            tracing::warn!("Callback without authorization code");
            return Ok(login_redirect(state).into_response());
        }
    };

    let identity = match google::fetch_identity(&state.config, &code).await {
        Ok(identity) => identity,
        Err(e) => {
            tracing::error!("OAuth handshake failed: {}", e);
            return Ok(login_redirect(state).into_response());
        }
    };

    tracing::info!("OAuth login attempt from: {}", identity.email);

    let mut conn = db::get_conn(&state.pool).await?;
    let user = match resolver::resolve(&mut conn, &state.config, &identity).await? {
        Resolution::Allowed(user) => user,
        Resolution::Denied(reason) => {
            tracing::warn!("Login denied for {}: {}", identity.email, reason.message());
            return Ok(login_redirect(state).into_response());
        }
    };

    let token = state.sessions.establish(user.id).await?;
    let cookie = state.sessions.cookie_header(&token);

    tracing::info!("Successful login for: {}", user.email);

    let location = format!("{}/", state.config.client_url);
    Ok((
        StatusCode::SEE_OTHER,
        [
            (header::LOCATION, location),
            (header::SET_COOKIE, cookie),
        ],
    )
        .into_response())
}

fn login_redirect(state: &AppState) -> Redirect {
    Redirect::to(&format!("{}/login", state.config.client_url))
}

/// Terminate the session and send the browser back to the client root.
pub async fn auth_logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = session_token(&headers, state.sessions.cookie_name()) {
        state.sessions.terminate(&token).await;
    }

    let location = format!("{}/", state.config.client_url);
    (
        StatusCode::SEE_OTHER,
        [
            (header::LOCATION, location),
            (header::SET_COOKIE, state.sessions.clear_cookie_header()),
        ],
    )
        .into_response()
}

/// Current authenticated account, or 401 for anonymous requests.
pub async fn auth_me(user: Option<CurrentUser>) -> Response {
    match user {
        Some(CurrentUser(user)) => Json(user).into_response(),
        None => (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                message: "Not logged in".to_string(),
                details: None,
            }),
        )
            .into_response(),
    }
}
