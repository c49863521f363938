pub mod client;
pub mod models;
pub mod storage;

use std::sync::Arc;

use tokio::sync::RwLock;

use self::client::PROFILE_PATH;
use self::models::{AuthTokens, SessionUser, UserProfile};
use self::storage::TokenStorage;
use crate::api::ApiClient;

/// In-memory session state. `loading` is true while the startup
/// restoration is still in flight; command gating waits for it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub user: Option<SessionUser>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub loading: bool,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

/// Single source of truth for identity and tokens.
///
/// Explicit mutation API (`login`, `logout`, `restore`) over shared
/// ambient state; consumers receive the store by handle, never by
/// global lookup. Storage is shared with the request pipeline; both
/// sides write whole values only.
pub struct SessionStore {
    api: Arc<ApiClient>,
    storage: TokenStorage,
    state: RwLock<Session>,
}

impl SessionStore {
    pub fn new(api: Arc<ApiClient>, storage: TokenStorage) -> Self {
        Self {
            api,
            storage,
            state: RwLock::new(Session {
                loading: true,
                ..Session::default()
            }),
        }
    }

    pub async fn snapshot(&self) -> Session {
        self.state.read().await.clone()
    }

    /// Record a completed login: memory, default credential, durable
    /// storage. No network call: the caller already holds the tokens.
    pub async fn login(&self, user: SessionUser, tokens: AuthTokens) -> anyhow::Result<()> {
        self.api
            .set_default_auth(Some(tokens.access_token.clone()));

        self.storage.store_access_token(&tokens.access_token)?;
        match &tokens.refresh_token {
            Some(refresh) => self.storage.store_refresh_token(refresh)?,
            None => self.storage.clear_refresh_token(),
        }

        let mut state = self.state.write().await;
        state.user = Some(user);
        state.access_token = Some(tokens.access_token);
        state.refresh_token = tokens.refresh_token;

        Ok(())
    }

    /// Full teardown. Idempotent, no network call.
    pub async fn logout(&self) {
        let mut state = self.state.write().await;
        state.user = None;
        state.access_token = None;
        state.refresh_token = None;
        drop(state);

        self.storage.clear();
        self.api.set_default_auth(None);
    }

    /// Startup restoration: validate the stored access token against
    /// the profile endpoint and rebuild the session from it.
    ///
    /// No stored token means anonymous with zero network calls. Any
    /// validation failure (bad token, network, server error) lands in
    /// `logout` rather than a half-populated session. The loading flag
    /// goes false exactly once, on every path, as the final step.
    pub async fn restore(&self) {
        let result = self.try_restore().await;
        if let Err(err) = result {
            tracing::warn!(error = %err, "session restore failed, clearing state");
            self.logout().await;
        }

        let mut state = self.state.write().await;
        state.loading = false;
    }

    async fn try_restore(&self) -> Result<(), crate::api::ApiError> {
        let Some(access_token) = self.storage.access_token() else {
            tracing::debug!("no stored access token, staying anonymous");
            return Ok(());
        };

        self.api.set_default_auth(Some(access_token.clone()));
        let profile: UserProfile = self.api.get_json(PROFILE_PATH).await?;

        // The pipeline may have refreshed the token while validating;
        // the stored value is authoritative.
        let access_token = self.storage.access_token().unwrap_or(access_token);
        let refresh_token = self.storage.refresh_token();

        let mut state = self.state.write().await;
        state.user = Some(SessionUser {
            id: Some(profile.id),
            email: profile.email,
        });
        state.access_token = Some(access_token);
        state.refresh_token = refresh_token;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use url::Url;

    use super::models::{AuthTokens, SessionUser};
    use super::storage::TokenStorage;
    use super::SessionStore;
    use crate::api::ApiClient;

    const PROFILE: &str = "/api/auth/profile";
    const PROFILE_BODY: &str = r#"{"id":"42","email":"a@b.com"}"#;

    fn store_for(server: &mockito::ServerGuard, tmp: &tempfile::TempDir) -> SessionStore {
        let storage = TokenStorage::at(tmp.path().to_path_buf()).unwrap();
        let api = ApiClient::new(Url::parse(&server.url()).unwrap(), storage.clone()).unwrap();
        SessionStore::new(Arc::new(api), storage)
    }

    fn tokens(access: &str, refresh: Option<&str>) -> AuthTokens {
        AuthTokens {
            access_token: access.to_string(),
            refresh_token: refresh.map(str::to_string),
        }
    }

    fn user(email: &str) -> SessionUser {
        SessionUser {
            id: None,
            email: email.to_string(),
        }
    }

    #[tokio::test]
    async fn restore_without_stored_token_is_anonymous_and_offline() {
        let mut server = mockito::Server::new_async().await;
        let tmp = tempfile::tempdir().unwrap();
        let store = store_for(&server, &tmp);

        let profile = server
            .mock("GET", PROFILE)
            .expect(0)
            .create_async()
            .await;

        assert!(store.snapshot().await.loading);
        store.restore().await;

        let session = store.snapshot().await;
        assert!(!session.loading);
        assert_eq!(session.user, None);
        assert_eq!(session.access_token, None);
        profile.assert_async().await;
    }

    #[tokio::test]
    async fn restore_with_valid_token_populates_the_session() {
        let mut server = mockito::Server::new_async().await;
        let tmp = tempfile::tempdir().unwrap();
        let store = store_for(&server, &tmp);
        store.storage.store_access_token("aaa.bbb.ccc").unwrap();
        store.storage.store_refresh_token("rt1").unwrap();

        server
            .mock("GET", PROFILE)
            .match_header("authorization", "Bearer aaa.bbb.ccc")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(PROFILE_BODY)
            .create_async()
            .await;

        store.restore().await;

        let session = store.snapshot().await;
        assert!(!session.loading);
        assert_eq!(
            session.user,
            Some(SessionUser {
                id: Some("42".to_string()),
                email: "a@b.com".to_string(),
            })
        );
        assert_eq!(session.access_token.as_deref(), Some("aaa.bbb.ccc"));
        assert_eq!(session.refresh_token.as_deref(), Some("rt1"));
        assert_eq!(store.api.default_auth().as_deref(), Some("aaa.bbb.ccc"));
    }

    #[tokio::test]
    async fn restore_is_idempotent_against_a_stable_backend() {
        let mut server = mockito::Server::new_async().await;
        let tmp = tempfile::tempdir().unwrap();
        let store = store_for(&server, &tmp);
        store.storage.store_access_token("aaa.bbb.ccc").unwrap();

        let profile = server
            .mock("GET", PROFILE)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(PROFILE_BODY)
            .expect(2)
            .create_async()
            .await;

        store.restore().await;
        let first = store.snapshot().await;
        store.restore().await;
        let second = store.snapshot().await;

        assert_eq!(first, second);
        profile.assert_async().await;
    }

    #[tokio::test]
    async fn restore_failure_clears_everything_but_still_finishes_loading() {
        let mut server = mockito::Server::new_async().await;
        let tmp = tempfile::tempdir().unwrap();
        let store = store_for(&server, &tmp);
        store.storage.store_access_token("aaa.bbb.ccc").unwrap();
        store.storage.store_refresh_token("rt1").unwrap();

        server
            .mock("GET", PROFILE)
            .with_status(500)
            .with_body(r#"{"error":"db down"}"#)
            .create_async()
            .await;

        store.restore().await;

        let session = store.snapshot().await;
        assert!(!session.loading);
        assert_eq!(session.user, None);
        assert_eq!(store.storage.access_token(), None);
        assert_eq!(store.storage.refresh_token(), None);
        assert_eq!(store.api.default_auth(), None);
    }

    #[tokio::test]
    async fn restore_picks_up_a_token_refreshed_mid_validation() {
        let mut server = mockito::Server::new_async().await;
        let tmp = tempfile::tempdir().unwrap();
        let store = store_for(&server, &tmp);
        store.storage.store_access_token("old.aaa.bbb").unwrap();
        store.storage.store_refresh_token("rt1").unwrap();

        server
            .mock("GET", PROFILE)
            .match_header("authorization", "Bearer old.aaa.bbb")
            .with_status(401)
            .create_async()
            .await;
        server
            .mock("POST", "/api/auth/refresh")
            .match_header("authorization", "Bearer rt1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":"success","access_token":"new.access.token"}"#)
            .create_async()
            .await;
        server
            .mock("GET", PROFILE)
            .match_header("authorization", "Bearer new.access.token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(PROFILE_BODY)
            .create_async()
            .await;

        store.restore().await;

        // The session holds the refreshed token, not the stale one.
        let session = store.snapshot().await;
        assert_eq!(session.access_token.as_deref(), Some("new.access.token"));
        assert!(session.is_authenticated());
    }

    #[tokio::test]
    async fn login_persists_tokens_and_arms_the_default_credential() {
        let server = mockito::Server::new_async().await;
        let tmp = tempfile::tempdir().unwrap();
        let store = store_for(&server, &tmp);

        store
            .login(user("a@b.com"), tokens("aaa.bbb.ccc", Some("rt1")))
            .await
            .unwrap();

        let session = store.snapshot().await;
        assert!(session.is_authenticated());
        assert_eq!(store.storage.access_token().as_deref(), Some("aaa.bbb.ccc"));
        assert_eq!(store.storage.refresh_token().as_deref(), Some("rt1"));
        assert_eq!(store.api.default_auth().as_deref(), Some("aaa.bbb.ccc"));

        // A login without a refresh token clears the stored one.
        store
            .login(user("a@b.com"), tokens("ddd.eee.fff", None))
            .await
            .unwrap();
        assert_eq!(store.storage.refresh_token(), None);
    }

    #[tokio::test]
    async fn logout_clears_memory_storage_and_credential_idempotently() {
        let server = mockito::Server::new_async().await;
        let tmp = tempfile::tempdir().unwrap();
        let store = store_for(&server, &tmp);

        store
            .login(user("a@b.com"), tokens("aaa.bbb.ccc", Some("rt1")))
            .await
            .unwrap();

        store.logout().await;
        store.logout().await;

        let session = store.snapshot().await;
        assert_eq!(session.user, None);
        assert_eq!(session.access_token, None);
        assert_eq!(session.refresh_token, None);
        assert_eq!(store.storage.access_token(), None);
        assert_eq!(store.storage.refresh_token(), None);
        assert_eq!(store.api.default_auth(), None);
    }
}
