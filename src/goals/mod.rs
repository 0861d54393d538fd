use async_trait::async_trait;
use time::Date;
use tracing::{debug, instrument};

use crate::dates::format_date;
use crate::error::ClientResult;
use crate::http::ApiClient;

pub mod calculator;
pub mod dto;

pub use calculator::{GoalCalculator, GoalDraft, GoalStage};
pub use dto::{ActivityLevel, BodyProfile, Gender, Goal, GoalTargets, WeightGoal};

/// What the goal calculator needs from the server.
#[async_trait]
pub trait GoalPlanner: Send + Sync {
    async fn calculate(&self, date: Date, profile: &BodyProfile) -> ClientResult<Goal>;
    async fn save(&self, date: Date, targets: &GoalTargets) -> ClientResult<Goal>;
}

/// `/goals/*` endpoints.
#[derive(Clone)]
pub struct GoalsApi {
    client: ApiClient,
}

impl GoalsApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// `None` when no goal is set for that day.
    #[instrument(skip(self), fields(date = %date))]
    pub async fn get(&self, date: Date) -> ClientResult<Option<Goal>> {
        match self.client.get(&goal_path(date)).await {
            Ok(goal) => Ok(Some(goal)),
            Err(e) if e.is_not_found() => {
                debug!("no goal for date");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Creates or replaces the goal for `date`.
    #[instrument(skip(self, targets), fields(date = %date))]
    pub async fn create(&self, date: Date, targets: &GoalTargets) -> ClientResult<Goal> {
        self.client.post(&goal_path(date), targets).await
    }

    #[instrument(skip(self, profile), fields(date = %date))]
    pub async fn calculate(&self, date: Date, profile: &BodyProfile) -> ClientResult<Goal> {
        let body = dto::AutoCalculateRequest { profile, date };
        self.client.post("/goals/auto-calculate/", &body).await
    }
}

fn goal_path(date: Date) -> String {
    format!("/goals/{}/", format_date(date))
}

#[async_trait]
impl GoalPlanner for GoalsApi {
    async fn calculate(&self, date: Date, profile: &BodyProfile) -> ClientResult<Goal> {
        GoalsApi::calculate(self, date, profile).await
    }

    async fn save(&self, date: Date, targets: &GoalTargets) -> ClientResult<Goal> {
        self.create(date, targets).await
    }
}
