use tracing::{info, instrument, warn};

use crate::error::ClientResult;
use crate::http::ApiClient;

pub mod dto;
pub(crate) mod services;

use dto::{AuthResponse, LoginRequest, RefreshRequest, RegisterRequest};
pub use services::MIN_PASSWORD_LEN;

/// `/auth/*` endpoints. Login and register start the session.
#[derive(Clone)]
pub struct AuthApi {
    client: ApiClient,
}

impl AuthApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        first_name: &str,
        email: &str,
        password: &str,
    ) -> ClientResult<AuthResponse> {
        let email = services::normalize_email(email)?;
        services::check_new_password(password)?;
        let body = RegisterRequest {
            first_name: first_name.trim().to_string(),
            email,
            password: password.to_string(),
        };
        let response: AuthResponse = self.client.post("/auth/register/", &body).await?;
        self.client.session().begin(&response.tokens).await?;
        info!(user_id = response.user.id, "user registered");
        Ok(response)
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> ClientResult<AuthResponse> {
        let body = LoginRequest {
            email: services::normalize_email(email)?,
            password: password.to_string(),
        };
        let response: AuthResponse = self.client.post("/auth/login/", &body).await?;
        self.client.session().begin(&response.tokens).await?;
        info!(user_id = response.user.id, "user logged in");
        Ok(response)
    }

    /// Tells the server to blacklist the refresh token, then always clears
    /// the local session.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> ClientResult<()> {
        let session = self.client.session();
        if let Some(refresh) = session.refresh_token().await? {
            let result: ClientResult<serde_json::Value> = self
                .client
                .post("/auth/logout/", &RefreshRequest { refresh })
                .await;
            if let Err(e) = result {
                warn!(error = %e, "server logout failed; clearing local session anyway");
            }
        }
        session.end().await
    }
}
