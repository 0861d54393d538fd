use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::StatusCode;

use super::{Dish, DishCatalog, NewDish, NutritionEstimate, RecognitionResult, RecognizeRequest};
use crate::error::{ClientError, ClientResult};

/// In-memory `DishCatalog` recording every call it receives.
pub(crate) struct FakeCatalog {
    estimate: Option<NutritionEstimate>,
    recognition: Option<RecognitionResult>,
    reject_names: Vec<String>,
    next_id: AtomicI64,
    lookups: Mutex<Vec<(String, u32)>>,
    created: Mutex<Vec<NewDish>>,
    recognized: Mutex<Vec<RecognizeRequest>>,
}

impl FakeCatalog {
    pub const NOT_FOUND_DETAIL: &'static str = "Could not find nutrition data";

    fn build(estimate: Option<NutritionEstimate>, recognition: Option<RecognitionResult>) -> Self {
        Self {
            estimate,
            recognition,
            reject_names: Vec::new(),
            next_id: AtomicI64::new(1),
            lookups: Mutex::new(Vec::new()),
            created: Mutex::new(Vec::new()),
            recognized: Mutex::new(Vec::new()),
        }
    }

    pub fn answering(estimate: NutritionEstimate) -> Self {
        Self::build(Some(estimate), None)
    }

    /// Every lookup and recognition fails with a 404.
    pub fn failing() -> Self {
        Self::build(None, None)
    }

    pub fn recognizing(result: RecognitionResult) -> Self {
        Self::build(None, Some(result))
    }

    /// Creating a dish with this name fails with a 400.
    pub fn rejecting(mut self, name: &str) -> Self {
        self.reject_names.push(name.to_string());
        self
    }

    pub fn lookups(&self) -> Vec<(String, u32)> {
        self.lookups.lock().unwrap().clone()
    }

    pub fn created(&self) -> Vec<NewDish> {
        self.created.lock().unwrap().clone()
    }

    pub fn recognize_requests(&self) -> Vec<RecognizeRequest> {
        self.recognized.lock().unwrap().clone()
    }

    fn not_found() -> ClientError {
        let body = serde_json::json!({ "detail": Self::NOT_FOUND_DETAIL });
        ClientError::from_response(StatusCode::NOT_FOUND, body.to_string().as_bytes())
    }
}

#[async_trait]
impl DishCatalog for FakeCatalog {
    async fn create(&self, dish: &NewDish) -> ClientResult<Dish> {
        if self.reject_names.iter().any(|n| n == &dish.name) {
            let body = serde_json::json!({ "name": ["Dish name is not allowed."] });
            return Err(ClientError::from_response(
                StatusCode::BAD_REQUEST,
                body.to_string().as_bytes(),
            ));
        }
        self.created.lock().unwrap().push(dish.clone());
        Ok(Dish {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            name: dish.name.clone(),
            weight: dish.weight.unwrap_or(100),
            calories: dish.calories.unwrap_or(0.0),
            proteins: dish.proteins.unwrap_or(0.0),
            fats: dish.fats.unwrap_or(0.0),
            carbohydrates: dish.carbohydrates.unwrap_or(0.0),
            created_at: None,
        })
    }

    async fn recognize(&self, request: &RecognizeRequest) -> ClientResult<RecognitionResult> {
        self.recognized.lock().unwrap().push(request.clone());
        self.recognition.clone().ok_or_else(Self::not_found)
    }

    async fn search_nutrition(
        &self,
        food_name: &str,
        weight: u32,
    ) -> ClientResult<NutritionEstimate> {
        self.lookups
            .lock()
            .unwrap()
            .push((food_name.to_string(), weight));
        self.estimate.clone().ok_or_else(Self::not_found)
    }
}
