use std::sync::Arc;

use serde_json::json;

use super::models::{LoginRequest, LoginResponse, RegisterResponse, UserProfile};
use crate::api::{ApiClient, ApiError};

pub const PROFILE_PATH: &str = "/api/auth/profile";
pub const LOGIN_PATH: &str = "/api/auth/login";
pub const REGISTER_PATH: &str = "/api/auth/register";

/// Typed calls to the auth endpoints. Login and register go out without
/// a credential (there is nothing stored yet); the profile fetch rides
/// the authenticated pipeline like everything else.
#[derive(Clone)]
pub struct AuthApi {
    api: Arc<ApiClient>,
}

impl AuthApi {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ApiError> {
        tracing::info!(email = %request.email, "logging in");
        self.api
            .post_json(
                LOGIN_PATH,
                json!({ "email": request.email, "password": request.password }),
            )
            .await
    }

    pub async fn register(&self, email: &str, password: &str) -> Result<RegisterResponse, ApiError> {
        self.api
            .post_json(
                REGISTER_PATH,
                json!({ "email": email, "password": password }),
            )
            .await
    }

    pub async fn profile(&self) -> Result<UserProfile, ApiError> {
        self.api.get_json(PROFILE_PATH).await
    }
}
