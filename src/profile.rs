use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::auth::services::check_new_password;
use crate::error::{ClientError, ClientResult};
use crate::goals::ActivityLevel;
use crate::http::ApiClient;
use crate::numeric::opt_decimal;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Profile {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default, deserialize_with = "opt_decimal")]
    pub weight: Option<f64>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub activity_level: Option<ActivityLevel>,
}

impl Profile {
    pub fn display_name(&self) -> &str {
        if !self.first_name.trim().is_empty() {
            &self.first_name
        } else {
            self.username.as_deref().unwrap_or(&self.email)
        }
    }
}

/// PATCH body; unset fields are left untouched on the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_level: Option<ActivityLevel>,
}

#[derive(Debug, Serialize)]
struct PasswordChange<'a> {
    old_password: &'a str,
    new_password: &'a str,
    new_password_confirm: &'a str,
}

#[derive(Clone)]
pub struct ProfileApi {
    client: ApiClient,
}

impl ProfileApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    #[instrument(skip(self))]
    pub async fn get(&self) -> ClientResult<Profile> {
        self.client.get("/profile/").await
    }

    #[instrument(skip(self, update))]
    pub async fn update(&self, update: &ProfileUpdate) -> ClientResult<Profile> {
        self.client.patch("/profile/", update).await
    }

    #[instrument(skip_all)]
    pub async fn change_password(&self, old_password: &str, new_password: &str) -> ClientResult<()> {
        if old_password.is_empty() {
            return Err(ClientError::validation("old_password", "Enter your current password"));
        }
        check_new_password(new_password)?;
        let body = PasswordChange {
            old_password,
            new_password,
            new_password_confirm: new_password,
        };
        let _: serde_json::Value = self.client.post("/profile/change-password/", &body).await?;
        info!("password changed");
        Ok(())
    }
}
