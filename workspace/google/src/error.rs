use thiserror::Error;

/// Error types for Google API access
#[derive(Error, Debug)]
pub enum GoogleError {
    /// The access token was rejected (HTTP 401)
    #[error("Google rejected the access token")]
    Unauthorized,

    /// The refresh token or authorization code is no longer valid
    #[error("Google reported invalid_grant: {0}")]
    InvalidGrant(String),

    /// A refresh did not help; the user has to go through consent again
    #[error("Token refresh failed. Please reauthenticate your Google account.")]
    ReauthenticationRequired,

    /// Any other non-success response
    #[error("Google API error ({status}): {detail}")]
    Api { status: u16, detail: String },

    /// Transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body did not have the expected shape
    #[error("Unexpected response from Google: {0}")]
    Decode(String),

    /// The OAuth state blob was malformed, forged or stale
    #[error("Invalid OAuth state: {0}")]
    InvalidState(String),

    /// Refreshed tokens could not be saved
    #[error("Failed to persist refreshed tokens: {0}")]
    Store(String),
}

impl GoogleError {
    /// Failures a token refresh may fix.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, GoogleError::Unauthorized | GoogleError::InvalidGrant(_))
    }
}

/// Result type for Google API operations
pub type Result<T> = std::result::Result<T, GoogleError>;
