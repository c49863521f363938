pub mod auth;
pub mod completions;
pub mod config;
pub mod devices;
pub mod profile;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use colored::*;
use url::Url;

use crate::api::{ApiClient, ExpiryHook, SessionExpiry};
use crate::auth::storage::TokenStorage;
use crate::auth::{Session, SessionStore};
use crate::config::Config;

/// Everything a command needs: config, token storage, and the
/// authenticated pipeline wired with the session-expiry notice.
pub(crate) struct AppContext {
    pub config: Config,
    pub storage: TokenStorage,
    pub api: Arc<ApiClient>,
}

pub(crate) fn build_context() -> Result<AppContext> {
    let config = Config::load()?;
    let storage = TokenStorage::new()?;
    let base_url = Url::parse(&config.api_endpoint)
        .with_context(|| format!("Invalid api_endpoint: {}", config.api_endpoint))?;

    let mut api = ApiClient::new(base_url, storage.clone())?;
    if config.session_expiry_notice {
        api = api.with_expiry_hook(expiry_notice());
    }

    Ok(AppContext {
        config,
        storage,
        api: Arc::new(api),
    })
}

/// The CLI's stand-in for the SPA's forced navigation to the login
/// screen: a loud notice pointing at `auth login`. Switched off with
/// `config set session_expiry_notice false`.
fn expiry_notice() -> ExpiryHook {
    Arc::new(|reason: SessionExpiry| {
        let detail = match reason {
            SessionExpiry::MissingRefreshToken => "no refresh token is stored",
            SessionExpiry::RefreshRejected => "the refresh token was rejected",
        };
        eprintln!(
            "{}  Your session has expired ({}). Run {} to sign in again.",
            "!".yellow().bold(),
            detail,
            "momentbox auth login".cyan()
        );
    })
}

/// Run the startup restoration and hand back the store. Commands that
/// need an identity call `require_user` on the result.
pub(crate) async fn restored_store(ctx: &AppContext) -> SessionStore {
    let store = SessionStore::new(ctx.api.clone(), ctx.storage.clone());
    store.restore().await;
    store
}

/// Command-level route guard: protected commands refuse to run
/// anonymously and point at the login flow instead.
pub(crate) async fn require_user(store: &SessionStore) -> Result<Session> {
    let session = store.snapshot().await;
    if !session.is_authenticated() {
        bail!(
            "Not signed in. Run {} first.",
            "momentbox auth login".cyan()
        );
    }
    Ok(session)
}
