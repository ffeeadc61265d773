use std::future::Future;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::{GoogleApi, GoogleError, Result};

/// Stored tokens of one connected account.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

/// What gets written back after a successful refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshedTokens {
    pub access_token: String,
    /// The rotated refresh token, or the previous one when Google sent none.
    pub refresh_token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Persists refreshed tokens before the retried call runs.
#[async_trait]
pub trait TokenSink: Send + Sync {
    async fn persist(&self, tokens: &RefreshedTokens) -> Result<()>;
}

/// Runs `operation` with the stored access token. On an auth-class failure
/// it refreshes exactly once, persists the new tokens and retries once.
///
/// A missing refresh token, an `invalid_grant` from the refresh, or a second
/// auth failure all end in [`GoogleError::ReauthenticationRequired`].
pub async fn with_fresh_credentials<T, F, Fut>(
    api: &dyn GoogleApi,
    credentials: &Credentials,
    sink: &dyn TokenSink,
    operation: F,
) -> Result<T>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    if let Some(access_token) = credentials.access_token.clone() {
        match operation(access_token).await {
            Err(e) if e.is_auth_failure() => {
                info!("Access token rejected ({}), refreshing once", e);
            }
            other => return other,
        }
    } else {
        debug!("No stored access token, refreshing before the first call");
    }

    let Some(refresh_token) = credentials.refresh_token.as_deref() else {
        warn!("No refresh token stored, reauthentication required");
        return Err(GoogleError::ReauthenticationRequired);
    };

    let tokens = match api.refresh_access_token(refresh_token).await {
        Ok(tokens) => tokens,
        Err(e) if e.is_auth_failure() => {
            warn!("Token refresh refused: {}", e);
            return Err(GoogleError::ReauthenticationRequired);
        }
        Err(e) => return Err(e),
    };

    let refreshed = RefreshedTokens {
        access_token: tokens.access_token.clone(),
        refresh_token: tokens
            .refresh_token
            .clone()
            .unwrap_or_else(|| refresh_token.to_string()),
        expires_at: tokens.expires_at(Utc::now()),
    };
    sink.persist(&refreshed).await?;
    debug!("Refreshed tokens persisted, retrying operation");

    match operation(refreshed.access_token).await {
        Err(e) if e.is_auth_failure() => {
            warn!("Operation still unauthorized after refresh: {}", e);
            Err(GoogleError::ReauthenticationRequired)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DriveFile, SentMessage, TokenSet, UserInfo};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeApi {
        refreshed: TokenSet,
        refresh_fails_with_invalid_grant: bool,
        refresh_calls: AtomicUsize,
    }

    impl FakeApi {
        fn new(rotated: Option<&str>) -> Self {
            Self {
                refreshed: TokenSet {
                    access_token: "fresh".to_string(),
                    refresh_token: rotated.map(str::to_string),
                    expires_in: Some(3600),
                    scope: None,
                    token_type: None,
                },
                refresh_fails_with_invalid_grant: false,
                refresh_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl GoogleApi for FakeApi {
        async fn exchange_code(&self, _code: &str) -> Result<TokenSet> {
            unimplemented!()
        }

        async fn refresh_access_token(&self, _refresh_token: &str) -> Result<TokenSet> {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            if self.refresh_fails_with_invalid_grant {
                return Err(GoogleError::InvalidGrant("Token has been expired or revoked.".into()));
            }
            Ok(self.refreshed.clone())
        }

        async fn fetch_user_info(&self, _access_token: &str) -> Result<UserInfo> {
            unimplemented!()
        }

        async fn list_drive_files(&self, _access_token: &str, _folder_id: &str) -> Result<Vec<DriveFile>> {
            unimplemented!()
        }

        async fn get_sheet_values(&self, _: &str, _: &str, _: &str) -> Result<Vec<Vec<String>>> {
            unimplemented!()
        }

        async fn send_message(&self, _access_token: &str, _raw: &str) -> Result<SentMessage> {
            unimplemented!()
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        saved: Mutex<Vec<RefreshedTokens>>,
    }

    #[async_trait]
    impl TokenSink for RecordingSink {
        async fn persist(&self, tokens: &RefreshedTokens) -> Result<()> {
            self.saved.lock().unwrap().push(tokens.clone());
            Ok(())
        }
    }

    fn stored(access: &str) -> Credentials {
        Credentials {
            access_token: Some(access.to_string()),
            refresh_token: Some("refresh-1".to_string()),
        }
    }

    async fn only_fresh_works(token: String) -> Result<String> {
        if token == "fresh" {
            Ok(format!("listed with {token}"))
        } else {
            Err(GoogleError::Unauthorized)
        }
    }

    #[tokio::test]
    async fn test_valid_token_skips_refresh() {
        let api = FakeApi::new(None);
        let sink = RecordingSink::default();
        let result = with_fresh_credentials(&api, &stored("fresh"), &sink, only_fresh_works).await;
        assert_eq!(result.unwrap(), "listed with fresh");
        assert_eq!(api.refresh_calls.load(Ordering::SeqCst), 0);
        assert!(sink.saved.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_expired_token_refreshes_and_retries_once() {
        let api = FakeApi::new(None);
        let sink = RecordingSink::default();
        let result = with_fresh_credentials(&api, &stored("stale"), &sink, only_fresh_works).await;
        assert_eq!(result.unwrap(), "listed with fresh");
        assert_eq!(api.refresh_calls.load(Ordering::SeqCst), 1);

        let saved = sink.saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].access_token, "fresh");
        assert_eq!(saved[0].refresh_token, "refresh-1");
        assert!(saved[0].expires_at.is_some());
    }

    #[tokio::test]
    async fn test_rotated_refresh_token_is_kept() {
        let api = FakeApi::new(Some("refresh-2"));
        let sink = RecordingSink::default();
        with_fresh_credentials(&api, &stored("stale"), &sink, only_fresh_works)
            .await
            .unwrap();
        assert_eq!(sink.saved.lock().unwrap()[0].refresh_token, "refresh-2");
    }

    #[tokio::test]
    async fn test_invalid_grant_on_refresh_requires_reauthentication() {
        let mut api = FakeApi::new(None);
        api.refresh_fails_with_invalid_grant = true;
        let sink = RecordingSink::default();
        let result = with_fresh_credentials(&api, &stored("stale"), &sink, only_fresh_works).await;
        assert!(matches!(result, Err(GoogleError::ReauthenticationRequired)));
        assert!(sink.saved.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_second_auth_failure_is_terminal() {
        let api = FakeApi::new(None);
        let sink = RecordingSink::default();
        let calls = AtomicUsize::new(0);
        let result: Result<()> = with_fresh_credentials(&api, &stored("stale"), &sink, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(GoogleError::Unauthorized) }
        })
        .await;
        assert!(matches!(result, Err(GoogleError::ReauthenticationRequired)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(api.refresh_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let api = FakeApi::new(None);
        let sink = RecordingSink::default();
        let result: Result<()> = with_fresh_credentials(&api, &stored("stale"), &sink, |_| async {
            Err(GoogleError::Api {
                status: 404,
                detail: "File not found".to_string(),
            })
        })
        .await;
        assert!(matches!(result, Err(GoogleError::Api { status: 404, .. })));
        assert_eq!(api.refresh_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_tokens() {
        let api = FakeApi::new(None);
        let sink = RecordingSink::default();

        let no_refresh = Credentials {
            access_token: Some("stale".to_string()),
            refresh_token: None,
        };
        let result = with_fresh_credentials(&api, &no_refresh, &sink, only_fresh_works).await;
        assert!(matches!(result, Err(GoogleError::ReauthenticationRequired)));

        let no_access = Credentials {
            access_token: None,
            refresh_token: Some("refresh-1".to_string()),
        };
        let result = with_fresh_credentials(&api, &no_access, &sink, only_fresh_works).await;
        assert_eq!(result.unwrap(), "listed with fresh");
    }
}
