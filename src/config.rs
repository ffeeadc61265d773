use std::sync::Arc;

use anyhow::{Context, Result};
use google::{GoogleClient, OAuthConfig};
use sea_orm::Database;
use serde::Deserialize;
use tracing::{debug, info};

use crate::mail::SmtpMailer;
use crate::schemas::AppState;

/// Google OAuth client registration.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleSettings {
    pub client_id: String,
    pub client_secret: String,
    /// Defaults to `{backend_api_url}google-auth/callback`.
    pub redirect_uri: Option<String>,
}

/// SMTP relay used for verification mail.
#[derive(Clone, Deserialize)]
pub struct MailSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

impl std::fmt::Debug for MailSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("from_address", &self.from_address)
            .finish_non_exhaustive()
    }
}

/// Application settings.
///
/// Loaded from defaults, then an optional `talentdesk.toml`, then the
/// environment. Nested keys use a double underscore, e.g. `GOOGLE__CLIENT_ID`.
#[derive(Clone, Deserialize)]
pub struct Settings {
    pub database_url: String,
    pub bind_address: String,
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,
    /// Base URL of the admin frontend, with trailing slash.
    pub frontend_base_url: String,
    /// Public base URL of this API including `/api/v1/`, with trailing slash.
    pub backend_api_url: String,
    pub google: GoogleSettings,
    pub mail: MailSettings,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("database_url", &self.database_url)
            .field("bind_address", &self.bind_address)
            .field("jwt_expiry_hours", &self.jwt_expiry_hours)
            .field("frontend_base_url", &self.frontend_base_url)
            .field("backend_api_url", &self.backend_api_url)
            .field("google", &self.google.client_id)
            .field("mail", &self.mail)
            .finish_non_exhaustive()
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let settings: Settings = config::Config::builder()
            .set_default("database_url", "sqlite://talentdesk.db?mode=rwc")?
            .set_default("bind_address", "0.0.0.0:3000")?
            .set_default("jwt_expiry_hours", 12_i64)?
            .set_default("frontend_base_url", "http://localhost:5173/")?
            .set_default("backend_api_url", "http://localhost:3000/api/v1/")?
            .set_default("mail.port", 587_i64)?
            .add_source(config::File::with_name("talentdesk").required(false))
            .add_source(config::Environment::default().separator("__").try_parsing(true))
            .build()?
            .try_deserialize()
            .context("Invalid configuration")?;

        debug!("Loaded settings: {:?}", settings);
        Ok(settings)
    }

    pub fn oauth_config(&self) -> OAuthConfig {
        let redirect_uri = self
            .google
            .redirect_uri
            .clone()
            .unwrap_or_else(|| format!("{}google-auth/callback", self.backend_api_url));
        OAuthConfig {
            client_id: self.google.client_id.clone(),
            client_secret: self.google.client_secret.clone(),
            redirect_uri,
        }
    }
}

/// Initialize application configuration and state
pub async fn initialize_app_state(settings: Settings) -> Result<AppState> {
    info!("Connecting to database: {}", settings.database_url);
    let db = Database::connect(&settings.database_url)
        .await
        .with_context(|| format!("Failed to connect to {}", settings.database_url))?;

    let google = GoogleClient::new(settings.oauth_config());
    let mailer = SmtpMailer::new(&settings.mail)?;

    Ok(AppState {
        db,
        settings: Arc::new(settings),
        google: Arc::new(google),
        mailer: Arc::new(mailer),
    })
}
