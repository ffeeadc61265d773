//! Google OAuth, Drive, Sheets and Gmail access.
//!
//! Nothing here holds a user's tokens between calls. Every request takes the
//! access token it should run with, and [`refresh::with_fresh_credentials`]
//! handles the one-shot refresh when Google rejects it.

pub mod api;
pub mod client;
pub mod error;
pub mod mime;
pub mod oauth;
pub mod refresh;

pub use api::{DriveFile, GoogleApi, SentMessage, TokenSet, UserInfo};
pub use client::GoogleClient;
pub use error::{GoogleError, Result};
pub use oauth::OAuthConfig;
pub use refresh::{Credentials, RefreshedTokens, TokenSink, with_fresh_credentials};
