use std::sync::{Arc, RwLock};

use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::auth::storage::TokenStorage;

const REFRESH_PATH: &str = "/api/auth/refresh";

/// Why the pipeline tore the session down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionExpiry {
    MissingRefreshToken,
    RefreshRejected,
}

/// Invoked after the pipeline has cleared both stored tokens. The
/// application layer decides what "go back to login" means; the
/// transport layer only reports that the session is gone.
pub type ExpiryHook = Arc<dyn Fn(SessionExpiry) + Send + Sync>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid request URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("token storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// 401 with no refresh token stored. The session has been cleared.
    #[error("session expired and no refresh token is stored")]
    UnauthorizedNoRefresh,

    /// 401, and the refresh call itself failed or returned a malformed
    /// token. The session has been cleared.
    #[error("session expired and token refresh failed: {0}")]
    RefreshFailed(#[source] Box<ApiError>),

    /// 401, refresh succeeded, and the replayed request was 401 again.
    #[error("request still unauthorized after token refresh")]
    RetriedStillUnauthorized,

    #[error("server returned {status}: {message}")]
    Server { status: StatusCode, message: String },

    #[error("refresh response did not contain a usable access token")]
    MalformedRefreshResponse,
}

impl ApiError {
    /// True for the variants that end with the session torn down.
    pub fn is_fatal_auth(&self) -> bool {
        matches!(
            self,
            ApiError::UnauthorizedNoRefresh | ApiError::RefreshFailed(_)
        )
    }
}

/// A replayable description of one outbound call. Keeping the request as
/// data (rather than a consumed builder) is what lets the pipeline
/// re-issue it exactly once after a token refresh.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            body: Some(body),
        }
    }
}

/// Structural check only: three non-empty dot-separated segments, the
/// shape of a signed token. Anything else is never sent as a credential.
pub fn looks_like_jwt(token: &str) -> bool {
    token.split('.').count() == 3 && !token.split('.').any(str::is_empty)
}

#[derive(Debug, Deserialize)]
struct RefreshEnvelope {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Authenticated request pipeline.
///
/// Every outbound call is decorated with the stored access token, and a
/// first-time 401 is recovered transparently: one refresh, one replay.
/// A second 401, a missing refresh token, or a failed refresh are
/// terminal and clear the session.
pub struct ApiClient {
    http: Client,
    base_url: Url,
    storage: TokenStorage,
    // In-memory mirror of the access token (the "default outbound
    // credential"). Updated on login/restore/refresh, cleared on
    // logout/teardown. Per-request decoration still reads storage.
    default_auth: RwLock<Option<String>>,
    expiry_hook: Option<ExpiryHook>,
}

impl ApiClient {
    pub fn new(base_url: Url, storage: TokenStorage) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url,
            storage,
            default_auth: RwLock::new(None),
            expiry_hook: None,
        })
    }

    pub fn with_expiry_hook(mut self, hook: ExpiryHook) -> Self {
        self.expiry_hook = Some(hook);
        self
    }

    pub fn set_default_auth(&self, token: Option<String>) {
        *self.default_auth.write().expect("default_auth poisoned") = token;
    }

    pub fn default_auth(&self) -> Option<String> {
        self.default_auth
            .read()
            .expect("default_auth poisoned")
            .clone()
    }

    /// Send one request through the pipeline.
    ///
    /// Non-401 responses (success or failure) pass through unchanged;
    /// the caller decides what a 404 or a 500 means. A 401 enters the
    /// refresh-and-retry path exactly once: `execute` itself is the
    /// retry scope, so the "already retried" marker is plain control
    /// flow here instead of a flag smuggled onto a shared request object.
    pub async fn execute(&self, request: &ApiRequest) -> Result<Response, ApiError> {
        let response = self.send(request, None).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        // First 401 for this request: refresh or tear down.
        let Some(refresh_token) = self.storage.refresh_token() else {
            tracing::warn!("401 with no refresh token stored, clearing session");
            self.teardown(SessionExpiry::MissingRefreshToken);
            return Err(ApiError::UnauthorizedNoRefresh);
        };

        let fresh = match self.refresh_access_token(&refresh_token).await {
            Ok(token) => token,
            Err(err) => {
                tracing::warn!(error = %err, "token refresh failed, clearing session");
                self.teardown(SessionExpiry::RefreshRejected);
                return Err(ApiError::RefreshFailed(Box::new(err)));
            }
        };

        self.storage.store_access_token(&fresh)?;
        self.set_default_auth(Some(fresh.clone()));
        tracing::debug!("access token refreshed, replaying original request");

        // Replay once with the fresh token patched in. Whatever comes
        // back belongs to the caller, except another 401.
        let replay = self.send(request, Some(&fresh)).await?;
        if replay.status() == StatusCode::UNAUTHORIZED {
            return Err(ApiError::RetriedStillUnauthorized);
        }
        Ok(replay)
    }

    /// Execute and decode a JSON body, mapping non-success statuses to
    /// `ApiError::Server`.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.execute(&ApiRequest::get(path)).await?;
        Self::expect_json(response).await
    }

    pub async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Value,
    ) -> Result<T, ApiError> {
        let response = self.execute(&ApiRequest::post(path, body)).await?;
        Self::expect_json(response).await
    }

    /// Execute and require a 2xx, discarding the body.
    pub async fn post_ok(&self, path: &str, body: Value) -> Result<(), ApiError> {
        let response = self.execute(&ApiRequest::post(path, body)).await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ApiError::Server {
                status,
                message: Self::error_message(response).await,
            })
        }
    }

    pub async fn expect_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let status = response.status();
        if status.is_success() {
            Ok(response.json::<T>().await?)
        } else {
            Err(ApiError::Server {
                status,
                message: Self::error_message(response).await,
            })
        }
    }

    async fn error_message(response: Response) -> String {
        match response.json::<ErrorBody>().await {
            Ok(body) => body
                .message
                .or(body.error)
                .unwrap_or_else(|| "no error details".to_string()),
            Err(_) => "no error details".to_string(),
        }
    }

    async fn send(
        &self,
        request: &ApiRequest,
        token_override: Option<&str>,
    ) -> Result<Response, ApiError> {
        let url = self.base_url.join(&request.path)?;
        let mut builder = self.http.request(request.method.clone(), url);

        // Decoration: the stored token wins, and only a structurally
        // valid one is attached. A malformed or absent token means no
        // Authorization header at all, not a stale one.
        let token = match token_override {
            Some(fresh) => Some(fresh.to_string()),
            None => self.storage.access_token().filter(|t| looks_like_jwt(t)),
        };
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        Ok(builder.send().await?)
    }

    /// The refresh token, not the expired access token, is the bearer
    /// credential for this one call.
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<String, ApiError> {
        let url = self.base_url.join(REFRESH_PATH)?;
        let response = self
            .http
            .post(url)
            .bearer_auth(refresh_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Server {
                status,
                message: Self::error_message(response).await,
            });
        }

        let envelope = response.json::<RefreshEnvelope>().await?;
        let ok = envelope.status.as_deref() == Some("success");
        match envelope.access_token {
            Some(token) if ok && looks_like_jwt(&token) => Ok(token),
            _ => Err(ApiError::MalformedRefreshResponse),
        }
    }

    /// Unrecoverable auth failure: clear both stored tokens, drop the
    /// default credential, and let the application layer react.
    fn teardown(&self, reason: SessionExpiry) {
        self.storage.clear();
        self.set_default_auth(None);
        if let Some(hook) = &self.expiry_hook {
            hook(reason);
        }
    }
}
