//! Application configuration, collected once from the environment at startup.

use anyhow::{Context, Result};
use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub google_client_id: String,
    pub google_client_secret: String,
    pub google_redirect_uri: String,
    /// Email domain restriction for login. `None` means no restriction,
    /// the literal `"edu"` accepts any `.edu` domain, anything else is an
    /// exact domain match.
    pub allowed_domain: Option<String>,
    pub session_secret: String,
    /// Origin of the client application, used for CORS and post-login
    /// redirects.
    pub client_url: String,
    /// Enables the Secure cookie flag. The session cookie crosses origins
    /// between the API and the client, so it is always SameSite=None.
    pub production: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            google_client_id: env::var("GOOGLE_CLIENT_ID")
                .context("GOOGLE_CLIENT_ID must be set")?,
            google_client_secret: env::var("GOOGLE_CLIENT_SECRET")
                .context("GOOGLE_CLIENT_SECRET must be set")?,
            google_redirect_uri: env::var("GOOGLE_REDIRECT_URI")
                .context("GOOGLE_REDIRECT_URI must be set")?,
            allowed_domain: env::var("ALLOWED_DOMAIN").ok().filter(|d| !d.is_empty()),
            session_secret: env::var("SESSION_SECRET")
                .unwrap_or_else(|_| "development-secret-change-in-production".to_string()),
            client_url: env::var("CLIENT_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string())
                .trim_end_matches('/')
                .to_string(),
            production: env::var("RUST_ENV").unwrap_or_default() == "production",
        })
    }
}
