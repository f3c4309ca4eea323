//! Google OAuth handshake: consent URL, code exchange, profile fetch.

use serde::Deserialize;
use thiserror::Error;

use crate::config::AppConfig;

const AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const USERINFO_ENDPOINT: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Provider-asserted profile used only to populate or refresh an account.
#[derive(Debug, Clone)]
pub struct ExternalIdentity {
    pub email: String,
    pub name: String,
    /// Empty when the provider supplied no photo.
    pub photo: String,
    /// The provider's subject id for this user.
    pub subject: String,
}

/// OAuth handshake failure.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("token exchange rejected: {0}")]
    TokenExchange(String),

    #[error("malformed provider profile: {0}")]
    MalformedProfile(&'static str),
}

/// Build the consent screen URL the browser is redirected to.
pub fn authorize_url(config: &AppConfig, csrf_state: &str) -> String {
    let scopes = ["openid", "email", "profile"].join(" ");

    format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&prompt=select_account&state={}",
        AUTH_ENDPOINT,
        urlencoding::encode(&config.google_client_id),
        urlencoding::encode(&config.google_redirect_uri),
        urlencoding::encode(&scopes),
        urlencoding::encode(csrf_state),
    )
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    id: String,
    email: Option<String>,
    verified_email: Option<bool>,
    name: Option<String>,
    picture: Option<String>,
}

/// Exchange an authorization code for a verified profile.
///
/// The email comes back provider-verified; no further verification happens
/// here. A profile without an email (or with an explicitly unverified one)
/// is rejected.
pub async fn fetch_identity(
    config: &AppConfig,
    code: &str,
) -> Result<ExternalIdentity, ProviderError> {
    let client = reqwest::Client::new();

    #[derive(serde::Serialize)]
    struct TokenRequest<'a> {
        code: &'a str,
        client_id: &'a str,
        client_secret: &'a str,
        redirect_uri: &'a str,
        grant_type: &'a str,
    }

    let token_response = client
        .post(TOKEN_ENDPOINT)
        .form(&TokenRequest {
            code,
            client_id: &config.google_client_id,
            client_secret: &config.google_client_secret,
            redirect_uri: &config.google_redirect_uri,
            grant_type: "authorization_code",
        })
        .send()
        .await?;

    if !token_response.status().is_success() {
        let status = token_response.status();
        let body = token_response.text().await.unwrap_or_default();
        return Err(ProviderError::TokenExchange(format!("{} - {}", status, body)));
    }

    let tokens: TokenResponse = token_response.json().await?;

    let info: UserInfo = client
        .get(USERINFO_ENDPOINT)
        .bearer_auth(&tokens.access_token)
        .send()
        .await?
        .json()
        .await?;

    let email = info
        .email
        .filter(|e| !e.is_empty())
        .ok_or(ProviderError::MalformedProfile("missing email"))?;

    if info.verified_email == Some(false) {
        return Err(ProviderError::MalformedProfile("email not verified"));
    }

    Ok(ExternalIdentity {
        email,
        name: info.name.unwrap_or_default(),
        photo: info.picture.unwrap_or_default(),
        subject: info.id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AppConfig {
        AppConfig {
            database_url: "postgres://localhost/test".to_string(),
            port: 5000,
            google_client_id: "client id".to_string(),
            google_client_secret: "secret".to_string(),
            google_redirect_uri: "http://localhost:5000/auth/google/callback".to_string(),
            allowed_domain: None,
            session_secret: "test-secret".to_string(),
            client_url: "http://localhost:3000".to_string(),
            production: false,
        }
    }

    #[test]
    fn authorize_url_encodes_parameters() {
        let url = authorize_url(&test_config(), "state-123");

        assert!(url.starts_with(AUTH_ENDPOINT));
        assert!(url.contains("client_id=client%20id"));
        assert!(url.contains(
            "redirect_uri=http%3A%2F%2Flocalhost%3A5000%2Fauth%2Fgoogle%2Fcallback"
        ));
        assert!(url.contains("scope=openid%20email%20profile"));
        assert!(url.contains("prompt=select_account"));
        assert!(url.contains("state=state-123"));
    }
}
