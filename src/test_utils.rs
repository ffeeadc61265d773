#[cfg(test)]
pub mod test_utils {
    use crate::auth::issue_token;
    use crate::config::{GoogleSettings, MailSettings, Settings};
    use crate::mail::{MailError, Mailer, OutgoingMail};
    use crate::router::create_router;
    use crate::schemas::AppState;
    use async_trait::async_trait;
    use axum_test::TestServer;
    use google::{DriveFile, GoogleApi, GoogleError, SentMessage, TokenSet, UserInfo};
    use migration::{Migrator, MigratorTrait};
    use model::entities::{connected_account, post, user};
    use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use tracing::Level;
    use tracing_subscriber::FmtSubscriber;
    use uuid::Uuid;

    pub const JWT_SECRET: &str = "test-secret";
    pub const FRONTEND: &str = "http://frontend.test/";
    pub const PASSWORD: &str = "password123";
    /// The only access token the fake Google API accepts.
    pub const VALID_ACCESS_TOKEN: &str = "fresh-access-token";
    pub const STALE_ACCESS_TOKEN: &str = "stale-access-token";

    /// Create an in-memory SQLite database for testing
    pub async fn setup_test_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("Failed to connect to in-memory database");

        // Run migrations
        Migrator::up(&db, None)
            .await
            .expect("Failed to run migrations");

        db
    }

    pub fn test_settings() -> Settings {
        Settings {
            database_url: "sqlite::memory:".to_string(),
            bind_address: "127.0.0.1:0".to_string(),
            jwt_secret: JWT_SECRET.to_string(),
            jwt_expiry_hours: 12,
            frontend_base_url: FRONTEND.to_string(),
            backend_api_url: "http://backend.test/api/v1/".to_string(),
            google: GoogleSettings {
                client_id: "client-id".to_string(),
                client_secret: "client-secret".to_string(),
                redirect_uri: None,
            },
            mail: MailSettings {
                host: "smtp.test".to_string(),
                port: 587,
                username: "mailer".to_string(),
                password: "mailer-password".to_string(),
                from_address: "noreply@talentdesk.test".to_string(),
            },
        }
    }

    /// Scripted Google behavior and a record of every call.
    #[derive(Debug)]
    pub struct FakeGoogleState {
        /// `None` makes every refresh fail with `invalid_grant`
        pub refreshed_token: Option<String>,
        pub refresh_calls: usize,
        /// Keyed by spreadsheet id
        pub sheets: HashMap<String, Vec<Vec<String>>>,
        pub drive_files: Vec<DriveFile>,
        /// Raw messages handed to Gmail
        pub sent: Vec<String>,
        pub user_info: UserInfo,
    }

    #[derive(Debug)]
    pub struct FakeGoogle {
        pub state: Mutex<FakeGoogleState>,
    }

    impl FakeGoogle {
        pub fn new() -> Self {
            Self {
                state: Mutex::new(FakeGoogleState {
                    refreshed_token: Some(VALID_ACCESS_TOKEN.to_string()),
                    refresh_calls: 0,
                    sheets: HashMap::new(),
                    drive_files: Vec::new(),
                    sent: Vec::new(),
                    user_info: UserInfo {
                        email: "scout@gmail.com".to_string(),
                        name: Some("Casting Scout".to_string()),
                        given_name: Some("Casting".to_string()),
                        family_name: Some("Scout".to_string()),
                        picture: Some("https://lh3.test/photo.jpg".to_string()),
                    },
                }),
            }
        }

        pub fn set_sheet(&self, spreadsheet_id: &str, rows: &[&[&str]]) {
            let rows = rows
                .iter()
                .map(|row| row.iter().map(|c| c.to_string()).collect())
                .collect();
            self.state.lock().unwrap().sheets.insert(spreadsheet_id.to_string(), rows);
        }

        pub fn sent(&self) -> Vec<String> {
            self.state.lock().unwrap().sent.clone()
        }

        pub fn refresh_calls(&self) -> usize {
            self.state.lock().unwrap().refresh_calls
        }

        fn authorize(access_token: &str) -> google::Result<()> {
            if access_token == VALID_ACCESS_TOKEN {
                Ok(())
            } else {
                Err(GoogleError::Unauthorized)
            }
        }
    }

    #[async_trait]
    impl GoogleApi for FakeGoogle {
        async fn exchange_code(&self, code: &str) -> google::Result<TokenSet> {
            if code == "bad-code" {
                return Err(GoogleError::InvalidGrant("Malformed auth code.".to_string()));
            }
            Ok(TokenSet {
                access_token: VALID_ACCESS_TOKEN.to_string(),
                refresh_token: Some("refresh-from-consent".to_string()),
                expires_in: Some(3600),
                scope: None,
                token_type: Some("Bearer".to_string()),
            })
        }

        async fn refresh_access_token(&self, _refresh_token: &str) -> google::Result<TokenSet> {
            let mut state = self.state.lock().unwrap();
            state.refresh_calls += 1;
            match state.refreshed_token.clone() {
                Some(access_token) => Ok(TokenSet {
                    access_token,
                    refresh_token: None,
                    expires_in: Some(3600),
                    scope: None,
                    token_type: Some("Bearer".to_string()),
                }),
                None => Err(GoogleError::InvalidGrant("Token has been expired or revoked.".to_string())),
            }
        }

        async fn fetch_user_info(&self, access_token: &str) -> google::Result<UserInfo> {
            Self::authorize(access_token)?;
            Ok(self.state.lock().unwrap().user_info.clone())
        }

        async fn list_drive_files(&self, access_token: &str, _folder_id: &str) -> google::Result<Vec<DriveFile>> {
            Self::authorize(access_token)?;
            Ok(self.state.lock().unwrap().drive_files.clone())
        }

        async fn get_sheet_values(
            &self,
            access_token: &str,
            spreadsheet_id: &str,
            _range: &str,
        ) -> google::Result<Vec<Vec<String>>> {
            Self::authorize(access_token)?;
            self.state
                .lock()
                .unwrap()
                .sheets
                .get(spreadsheet_id)
                .cloned()
                .ok_or_else(|| GoogleError::Api {
                    status: 404,
                    detail: "Requested entity was not found.".to_string(),
                })
        }

        async fn send_message(&self, access_token: &str, raw: &str) -> google::Result<SentMessage> {
            Self::authorize(access_token)?;
            let mut state = self.state.lock().unwrap();
            state.sent.push(raw.to_string());
            Ok(SentMessage {
                id: format!("msg-{}", state.sent.len()),
                thread_id: None,
            })
        }
    }

    /// Keeps outgoing mail in memory.
    #[derive(Debug, Default)]
    pub struct MemoryMailer {
        pub outbox: Mutex<Vec<OutgoingMail>>,
        pub fail: bool,
    }

    impl MemoryMailer {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        pub fn last(&self) -> Option<OutgoingMail> {
            self.outbox.lock().unwrap().last().cloned()
        }
    }

    #[async_trait]
    impl Mailer for MemoryMailer {
        async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
            if self.fail {
                return Err(MailError::Address(
                    "not an address".parse::<lettre::Address>().unwrap_err(),
                ));
            }
            self.outbox.lock().unwrap().push(mail);
            Ok(())
        }
    }

    /// A running router plus handles on its collaborators.
    pub struct TestApp {
        pub server: TestServer,
        pub state: AppState,
        pub google: Arc<FakeGoogle>,
        pub mailer: Arc<MemoryMailer>,
        /// Keeps the test's subscriber installed until the app is dropped
        pub _tracing: tracing::subscriber::DefaultGuard,
    }

    /// Create AppState for testing
    pub async fn setup_test_app_state(mailer: MemoryMailer) -> (AppState, Arc<FakeGoogle>, Arc<MemoryMailer>) {
        let db = setup_test_db().await;
        let google = Arc::new(FakeGoogle::new());
        let mailer = Arc::new(mailer);
        let state = AppState {
            db,
            settings: Arc::new(test_settings()),
            google: google.clone(),
            mailer: mailer.clone(),
        };
        (state, google, mailer)
    }

    /// Initialize tracing for tests with output to STDERR.
    ///
    /// The log level is determined by the RUST_LOG environment variable,
    /// defaulting to WARN if not set.
    fn init_test_tracing() -> tracing::subscriber::DefaultGuard {
        let log_level = std::env::var("RUST_LOG")
            .ok()
            .and_then(|level| match level.to_uppercase().as_str() {
                "ERROR" => Some(Level::ERROR),
                "WARN" => Some(Level::WARN),
                "INFO" => Some(Level::INFO),
                "DEBUG" => Some(Level::DEBUG),
                "TRACE" => Some(Level::TRACE),
                _ => None,
            })
            .unwrap_or(Level::WARN);

        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    /// Create axum app for testing
    pub async fn setup_test_app_with(mailer: MemoryMailer) -> TestApp {
        let tracing_guard = init_test_tracing();

        let (state, google, mailer) = setup_test_app_state(mailer).await;
        let server = TestServer::new(create_router(state.clone())).unwrap();
        TestApp {
            server,
            state,
            google,
            mailer,
            _tracing: tracing_guard,
        }
    }

    pub async fn setup_test_app() -> TestApp {
        setup_test_app_with(MemoryMailer::default()).await
    }

    /// An active user whose password is [`PASSWORD`].
    pub async fn create_user(db: &DatabaseConnection, username: &str, role: user::Role) -> user::Model {
        let password_hash = crate::hasher::hash_password(PASSWORD.to_string())
            .await
            .expect("Failed to hash password");
        user::ActiveModel {
            name: Set(format!("{username} name")),
            email: Set(format!("{username}@example.com")),
            username: Set(username.to_string()),
            password_hash: Set(password_hash),
            role: Set(role),
            is_active: Set(true),
            verification_token: Set(None),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("Failed to create test user")
    }

    pub fn token_for(user: &user::Model) -> String {
        issue_token(user, JWT_SECRET, 12).expect("Failed to issue token")
    }

    /// A user plus a bearer token for them.
    pub async fn signed_in(db: &DatabaseConnection, username: &str, role: user::Role) -> (user::Model, String) {
        let user = create_user(db, username, role).await;
        let token = token_for(&user);
        (user, token)
    }

    pub async fn create_account(
        db: &DatabaseConnection,
        owner: Uuid,
        access_token: &str,
    ) -> connected_account::Model {
        connected_account::ActiveModel {
            email: Set("scout@gmail.com".to_string()),
            name: Set(Some("Casting Scout".to_string())),
            picture: Set(None),
            access_token: Set(Some(access_token.to_string())),
            refresh_token: Set(Some("stored-refresh-token".to_string())),
            token_expiry: Set(None),
            is_active: Set(true),
            last_synced_at: Set(None),
            created_by: Set(owner),
            deleted_at: Set(None),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("Failed to create connected account")
    }

    pub async fn insert_post(
        db: &DatabaseConnection,
        owner: Uuid,
        post_id: &str,
        data: serde_json::Value,
    ) -> post::Model {
        let post_date = data
            .get("postDate")
            .and_then(|d| d.as_str())
            .map(str::to_string);
        post::ActiveModel {
            post_id: Set(post_id.to_string()),
            data: Set(data),
            post_date: Set(post_date),
            memo: Set(None),
            created_by: Set(owner),
            deleted_at: Set(None),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("Failed to insert post")
    }
}
