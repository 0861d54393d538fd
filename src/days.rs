use serde::Deserialize;
use time::Date;
use tracing::instrument;

use crate::dates::format_date;
use crate::dishes::{Dish, MealType};
use crate::error::ClientResult;
use crate::goals::Goal;
use crate::http::ApiClient;
use crate::numeric::decimal;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DayMeals {
    #[serde(default)]
    pub breakfast: Vec<Dish>,
    #[serde(default)]
    pub lunch: Vec<Dish>,
    #[serde(default)]
    pub dinner: Vec<Dish>,
    #[serde(default)]
    pub snack: Vec<Dish>,
}

impl DayMeals {
    pub fn for_meal(&self, meal: MealType) -> &[Dish] {
        match meal {
            MealType::Breakfast => &self.breakfast,
            MealType::Lunch => &self.lunch,
            MealType::Dinner => &self.dinner,
            MealType::Snack => &self.snack,
        }
    }

    pub fn dish_count(&self) -> usize {
        MealType::ALL.iter().map(|m| self.for_meal(*m).len()).sum()
    }
}

/// Percent of each daily target reached so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct GoalProgress {
    #[serde(default, deserialize_with = "decimal")]
    pub calories_percent: f64,
    #[serde(default, deserialize_with = "decimal")]
    pub proteins_percent: f64,
    #[serde(default, deserialize_with = "decimal")]
    pub fats_percent: f64,
    #[serde(default, deserialize_with = "decimal")]
    pub carbohydrates_percent: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DaySummary {
    #[serde(default, deserialize_with = "decimal")]
    pub total_calories: f64,
    #[serde(default, deserialize_with = "decimal")]
    pub total_proteins: f64,
    #[serde(default, deserialize_with = "decimal")]
    pub total_fats: f64,
    #[serde(default, deserialize_with = "decimal")]
    pub total_carbohydrates: f64,
    #[serde(default)]
    pub goal_progress: Option<GoalProgress>,
}

/// Everything shown for one day: goal, dishes per meal, totals.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DayData {
    #[serde(with = "crate::dates::iso")]
    pub date: Date,
    #[serde(default)]
    pub goal: Option<Goal>,
    #[serde(default)]
    pub meals: DayMeals,
    #[serde(default)]
    pub summary: DaySummary,
}

#[derive(Clone)]
pub struct DaysApi {
    client: ApiClient,
}

impl DaysApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    #[instrument(skip(self), fields(date = %date))]
    pub async fn get(&self, date: Date) -> ClientResult<DayData> {
        self.client
            .get(&format!("/days/{}/", format_date(date)))
            .await
    }
}
