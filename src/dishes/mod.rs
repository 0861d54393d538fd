use async_trait::async_trait;
use time::Date;
use tracing::instrument;

use crate::dates::format_date;
use crate::error::ClientResult;
use crate::http::ApiClient;
use crate::page::Page;

pub mod draft;
pub mod dto;
pub mod lookup;
pub mod recognition;

#[cfg(test)]
pub(crate) mod fake;

pub use draft::{AddDishForm, DishDraft};
pub use dto::{
    Dish, DishPatch, Macros, MealType, NewDish, NutritionEstimate, RecognitionResult,
    RecognizeRequest, RecognizedDish,
};
pub use recognition::{RecognitionStage, RecognizeDishFlow, SelectedImage};

pub const DEFAULT_LOOKUP_WEIGHT: u32 = 100;

/// The dish operations the forms depend on.
#[async_trait]
pub trait DishCatalog: Send + Sync {
    async fn create(&self, dish: &NewDish) -> ClientResult<Dish>;
    async fn recognize(&self, request: &RecognizeRequest) -> ClientResult<RecognitionResult>;
    async fn search_nutrition(&self, food_name: &str, weight: u32)
        -> ClientResult<NutritionEstimate>;
}

/// `/dishes/*` endpoints.
#[derive(Clone)]
pub struct DishesApi {
    client: ApiClient,
}

impl DishesApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    #[instrument(skip(self))]
    pub async fn list(&self, date: Option<Date>) -> ClientResult<Page<Dish>> {
        match date {
            Some(d) => {
                self.client
                    .get_with_query("/dishes/", &[("date", format_date(d))])
                    .await
            }
            None => self.client.get("/dishes/").await,
        }
    }

    pub async fn get(&self, id: i64) -> ClientResult<Dish> {
        self.client.get(&format!("/dishes/{}/", id)).await
    }

    #[instrument(skip(self, patch))]
    pub async fn update(&self, id: i64, patch: &DishPatch) -> ClientResult<Dish> {
        self.client.patch(&format!("/dishes/{}/", id), patch).await
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> ClientResult<()> {
        self.client.delete(&format!("/dishes/{}/", id)).await
    }
}

#[async_trait]
impl DishCatalog for DishesApi {
    #[instrument(skip(self, dish), fields(name = %dish.name, meal = %dish.meal_type))]
    async fn create(&self, dish: &NewDish) -> ClientResult<Dish> {
        self.client.post("/dishes/", dish).await
    }

    #[instrument(skip(self, request))]
    async fn recognize(&self, request: &RecognizeRequest) -> ClientResult<RecognitionResult> {
        self.client.post("/dishes/recognize/", request).await
    }

    #[instrument(skip(self))]
    async fn search_nutrition(
        &self,
        food_name: &str,
        weight: u32,
    ) -> ClientResult<NutritionEstimate> {
        let query = dto::NutritionQuery {
            food_name: food_name.to_string(),
            weight,
        };
        self.client.post("/dishes/search-nutrition/", &query).await
    }
}
