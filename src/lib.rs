//! Typed async client for the Calorio nutrition tracking API.
//!
//! [`Calorio`] bundles one [`ApiClient`] per session with an API group for
//! each backend area. The form state machines ([`dishes::AddDishForm`],
//! [`dishes::RecognizeDishFlow`], [`goals::GoalCalculator`]) sit on top of
//! the API groups through small traits so they can be driven without a
//! server.

use std::collections::BTreeMap;
use std::sync::Arc;

use reqwest::StatusCode;
use serde::Deserialize;
use tracing::instrument;

pub mod auth;
pub mod config;
pub mod dates;
pub mod days;
pub mod dishes;
pub mod error;
pub mod goals;
pub mod http;
pub mod numeric;
pub mod page;
pub mod profile;
pub mod session;
pub mod subscription;
pub mod summary;

pub use config::{BuildMode, ClientConfig, LookupConfig};
pub use error::{ClientError, ClientResult};
pub use http::ApiClient;
pub use session::{Session, SessionEvent, TokenPair};

use auth::AuthApi;
use days::DaysApi;
use dishes::{DishCatalog, DishesApi};
use goals::{GoalPlanner, GoalsApi};
use profile::ProfileApi;
use session::FileTokenStore;
use subscription::SubscriptionApi;

/// `GET /health/` answer. Also returned for a 503 so callers can see which
/// component is down.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub components: BTreeMap<String, String>,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// Every API group bound to one session.
#[derive(Clone)]
pub struct Calorio {
    pub client: ApiClient,
    pub auth: AuthApi,
    pub profile: ProfileApi,
    pub days: DaysApi,
    pub goals: GoalsApi,
    pub dishes: DishesApi,
    pub subscription: SubscriptionApi,
}

impl Calorio {
    /// Client whose tokens persist in the configured token file.
    pub fn from_config(config: &ClientConfig) -> ClientResult<Self> {
        let store = Arc::new(FileTokenStore::new(config.token_file.clone()));
        Self::with_session(config, Session::new(store))
    }

    pub fn with_session(config: &ClientConfig, session: Session) -> ClientResult<Self> {
        let client = ApiClient::new(config, session)?;
        Ok(Self {
            auth: AuthApi::new(client.clone()),
            profile: ProfileApi::new(client.clone()),
            days: DaysApi::new(client.clone()),
            goals: GoalsApi::new(client.clone()),
            dishes: DishesApi::new(client.clone()),
            subscription: SubscriptionApi::new(client.clone()),
            client,
        })
    }

    pub fn session(&self) -> &Session {
        self.client.session()
    }

    pub fn catalog(&self) -> Arc<dyn DishCatalog> {
        Arc::new(self.dishes.clone())
    }

    pub fn planner(&self) -> Arc<dyn GoalPlanner> {
        Arc::new(self.goals.clone())
    }

    #[instrument(skip(self))]
    pub async fn health(&self) -> ClientResult<HealthStatus> {
        match self.client.get("/health/").await {
            Ok(status) => Ok(status),
            Err(ClientError::Http { status, body, .. })
                if status == StatusCode::SERVICE_UNAVAILABLE =>
            {
                serde_json::from_value(body).map_err(ClientError::Decode)
            }
            Err(e) => Err(e),
        }
    }
}
