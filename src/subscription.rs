use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use tracing::{info, instrument};

use crate::error::ClientResult;
use crate::http::ApiClient;
use crate::numeric::{decimal, opt_decimal};
use crate::page::Page;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Expired,
    Cancelled,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Subscription {
    pub id: i64,
    #[serde(default)]
    pub plan_name: Option<String>,
    pub status: SubscriptionStatus,
    /// Only reported for active subscriptions.
    #[serde(default)]
    pub days_remaining: Option<i64>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub end_date: Option<OffsetDateTime>,
    #[serde(default)]
    pub auto_renew: bool,
}

impl Subscription {
    pub fn is_active(&self) -> bool {
        self.status == SubscriptionStatus::Active
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Plan {
    pub id: i64,
    pub name: String,
    #[serde(deserialize_with = "decimal")]
    pub price_monthly: f64,
    #[serde(deserialize_with = "decimal")]
    pub price_yearly: f64,
    #[serde(default)]
    pub features: Value,
    #[serde(default)]
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
    #[serde(other)]
    Unknown,
}

/// Returned by the pay endpoints; the user finishes payment at `payment_url`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PaymentIntent {
    pub payment_id: i64,
    #[serde(deserialize_with = "decimal")]
    pub amount: f64,
    #[serde(default)]
    pub payment_url: Option<String>,
    pub status: PaymentStatus,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Payment {
    pub id: i64,
    #[serde(default)]
    pub plan_name: Option<String>,
    #[serde(default, deserialize_with = "opt_decimal")]
    pub amount: Option<f64>,
    #[serde(default)]
    pub payment_type: Option<String>,
    pub status: PaymentStatus,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AutoRenewState {
    #[serde(default)]
    pub detail: String,
    pub auto_renew: bool,
}

#[derive(Debug, Serialize)]
struct PayRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    plan_id: Option<i64>,
}

#[derive(Clone)]
pub struct SubscriptionApi {
    client: ApiClient,
}

impl SubscriptionApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    #[instrument(skip(self))]
    pub async fn get(&self) -> ClientResult<Subscription> {
        self.client.get("/subscription/").await
    }

    pub async fn plans(&self) -> ClientResult<Page<Plan>> {
        self.client.get("/subscription/plans/").await
    }

    #[instrument(skip(self))]
    pub async fn pay_monthly(&self, plan_id: Option<i64>) -> ClientResult<PaymentIntent> {
        self.pay("/subscription/pay-monthly/", plan_id).await
    }

    #[instrument(skip(self))]
    pub async fn pay_yearly(&self, plan_id: Option<i64>) -> ClientResult<PaymentIntent> {
        self.pay("/subscription/pay-yearly/", plan_id).await
    }

    async fn pay(&self, path: &str, plan_id: Option<i64>) -> ClientResult<PaymentIntent> {
        let intent: PaymentIntent = self.client.post(path, &PayRequest { plan_id }).await?;
        info!(payment_id = intent.payment_id, amount = intent.amount, "payment created");
        Ok(intent)
    }

    #[instrument(skip(self))]
    pub async fn disable_auto_renew(&self) -> ClientResult<AutoRenewState> {
        self.client.post_empty("/subscription/disable-auto-renew/").await
    }

    #[instrument(skip(self))]
    pub async fn enable_auto_renew(&self) -> ClientResult<AutoRenewState> {
        self.client.post_empty("/subscription/enable-auto-renew/").await
    }

    pub async fn payments(&self) -> ClientResult<Page<Payment>> {
        self.client.get("/subscription/payments/").await
    }
}
