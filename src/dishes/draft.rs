use std::sync::{Arc, Mutex};

use time::Date;
use tracing::{info, instrument, warn};

use super::lookup::{lock, LookupState, NutritionLookup, SharedState};
use super::{Dish, DishCatalog, Macros, MealType, NewDish, NutritionEstimate, DEFAULT_LOOKUP_WEIGHT};
use crate::config::LookupConfig;
use crate::error::{ClientError, ClientResult};

/// Unsaved dish form contents.
#[derive(Debug, Clone, PartialEq)]
pub struct DishDraft {
    pub name: String,
    /// Grams.
    pub weight: u32,
    pub macros: Macros,
}

impl Default for DishDraft {
    fn default() -> Self {
        Self {
            name: String::new(),
            weight: DEFAULT_LOOKUP_WEIGHT,
            macros: Macros::default(),
        }
    }
}

impl DishDraft {
    pub fn has_macros(&self) -> bool {
        !self.macros.is_empty()
    }

    /// Overwrites the four macro fields, leaving name and weight alone.
    pub fn apply_estimate(&mut self, estimate: &NutritionEstimate) {
        self.macros = estimate.macros();
    }

    pub fn validate(&self) -> ClientResult<()> {
        if self.name.trim().is_empty() {
            return Err(ClientError::validation("name", "Enter a dish name"));
        }
        if self.weight < 1 {
            return Err(ClientError::validation("weight", "Weight must be at least 1 g"));
        }
        let m = &self.macros;
        for (field, value) in [
            ("calories", m.calories),
            ("proteins", m.proteins),
            ("fats", m.fats),
            ("carbohydrates", m.carbohydrates),
        ] {
            if !(value >= 0.0) {
                return Err(ClientError::validation(field, format!("{} cannot be negative", field)));
            }
        }
        Ok(())
    }

    pub fn to_new_dish(&self, date: Date, meal_type: MealType) -> ClientResult<NewDish> {
        self.validate()?;
        Ok(NewDish::new(
            self.name.trim(),
            date,
            meal_type,
            self.weight,
            self.macros,
        ))
    }
}

/// The "add dish" form: a draft for one meal slot, with nutrition auto-fill.
pub struct AddDishForm {
    date: Date,
    meal_type: MealType,
    catalog: Arc<dyn DishCatalog>,
    state: SharedState,
    lookup: NutritionLookup,
    error: Option<String>,
}

impl AddDishForm {
    pub fn new(
        catalog: Arc<dyn DishCatalog>,
        date: Date,
        meal_type: MealType,
        settings: LookupConfig,
    ) -> Self {
        let state: SharedState = Arc::new(Mutex::new(LookupState::default()));
        let lookup = NutritionLookup::new(Arc::clone(&catalog), Arc::clone(&state), settings);
        Self {
            date,
            meal_type,
            catalog,
            state,
            lookup,
            error: None,
        }
    }

    pub fn date(&self) -> Date {
        self.date
    }

    pub fn meal_type(&self) -> MealType {
        self.meal_type
    }

    pub fn draft(&self) -> DishDraft {
        lock(&self.state).draft.clone()
    }

    pub fn is_searching(&self) -> bool {
        lock(&self.state).is_searching()
    }

    /// Message from the last manual lookup, if it failed.
    pub fn nutrition_error(&self) -> Option<String> {
        lock(&self.state).error.clone()
    }

    /// Message from the last failed submit.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn lookup_pending(&self) -> bool {
        self.lookup.is_pending()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        lock(&self.state).draft.name = name.into();
        self.lookup.schedule();
    }

    pub fn set_weight(&mut self, grams: u32) {
        lock(&self.state).draft.weight = grams;
        self.lookup.schedule();
    }

    pub fn set_calories(&mut self, value: f64) {
        lock(&self.state).draft.macros.calories = value;
    }

    pub fn set_proteins(&mut self, value: f64) {
        lock(&self.state).draft.macros.proteins = value;
    }

    pub fn set_fats(&mut self, value: f64) {
        lock(&self.state).draft.macros.fats = value;
    }

    pub fn set_carbohydrates(&mut self, value: f64) {
        lock(&self.state).draft.macros.carbohydrates = value;
    }

    /// The "search" button.
    pub async fn lookup_now(&self) -> ClientResult<NutritionEstimate> {
        self.lookup.run_manual().await
    }

    #[instrument(skip(self), fields(date = %self.date, meal = %self.meal_type))]
    pub async fn submit(&mut self) -> ClientResult<Dish> {
        self.error = None;
        let payload = match self.draft().to_new_dish(self.date, self.meal_type) {
            Ok(p) => p,
            Err(e) => {
                self.error = Some(e.user_message());
                return Err(e);
            }
        };

        match self.catalog.create(&payload).await {
            Ok(dish) => {
                info!(dish_id = dish.id, "dish created");
                Ok(dish)
            }
            Err(e) => {
                warn!(error = %e, "dish create failed");
                self.error = Some(e.user_message());
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod add_dish_tests {
    use std::time::Duration;

    use time::macros::date;

    use super::*;
    use crate::dishes::fake::FakeCatalog;

    fn form(catalog: &Arc<FakeCatalog>) -> AddDishForm {
        AddDishForm::new(
            catalog.clone(),
            date!(2024 - 01 - 15),
            MealType::Breakfast,
            LookupConfig::default(),
        )
    }

    fn oatmeal() -> NutritionEstimate {
        NutritionEstimate {
            calories: Some(250.0),
            proteins: Some(8.0),
            fats: Some(5.0),
            carbohydrates: Some(40.0),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_edits_fires_one_lookup_with_final_values() {
        let catalog = Arc::new(FakeCatalog::answering(oatmeal()));
        let mut form = form(&catalog);

        form.set_name("Ов");
        form.set_name("Овс");
        tokio::time::sleep(Duration::from_millis(700)).await;
        form.set_name("Овсянка");
        tokio::time::sleep(Duration::from_millis(700)).await;
        form.set_name("Овсянка с фруктами");
        form.set_weight(150);

        tokio::time::sleep(Duration::from_millis(1499)).await;
        assert!(catalog.lookups().is_empty());
        assert!(form.lookup_pending());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(
            catalog.lookups(),
            vec![("Овсянка с фруктами".to_string(), 150)]
        );

        let draft = form.draft();
        assert_eq!(draft.name, "Овсянка с фруктами");
        assert_eq!(draft.weight, 150);
        assert_eq!(
            draft.macros,
            Macros {
                calories: 250.0,
                proteins: 8.0,
                fats: 5.0,
                carbohydrates: 40.0,
            }
        );
        assert!(!form.is_searching());
    }

    #[test]
    fn edits_without_a_runtime_skip_the_lookup() {
        let catalog = Arc::new(FakeCatalog::answering(oatmeal()));
        let mut form = form(&catalog);

        form.set_name("Овсянка");
        form.set_weight(200);

        assert!(!form.lookup_pending());
        assert_eq!(form.draft().name, "Овсянка");
        assert_eq!(form.draft().weight, 200);
        assert!(catalog.lookups().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn filled_macros_suppress_automatic_lookup() {
        let catalog = Arc::new(FakeCatalog::answering(oatmeal()));
        let mut form = form(&catalog);

        form.set_fats(2.0);
        form.set_name("Борщ");
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert!(catalog.lookups().is_empty());
        assert_eq!(form.draft().macros.fats, 2.0);
    }

    #[tokio::test(start_paused = true)]
    async fn macros_typed_while_waiting_are_kept() {
        let catalog = Arc::new(FakeCatalog::answering(oatmeal()));
        let mut form = form(&catalog);

        form.set_name("Борщ");
        tokio::time::sleep(Duration::from_millis(500)).await;
        form.set_calories(180.0);
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert!(catalog.lookups().is_empty());
        assert_eq!(form.draft().macros.calories, 180.0);
    }

    #[tokio::test(start_paused = true)]
    async fn short_names_never_trigger() {
        let catalog = Arc::new(FakeCatalog::answering(oatmeal()));
        let mut form = form(&catalog);

        form.set_name("Чай");
        form.set_name("Ча");
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert!(catalog.lookups().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn automatic_failure_is_silent() {
        let catalog = Arc::new(FakeCatalog::failing());
        let mut form = form(&catalog);

        form.set_name("Непонятная еда");
        tokio::time::sleep(Duration::from_millis(1600)).await;

        assert_eq!(catalog.lookups().len(), 1);
        assert_eq!(form.nutrition_error(), None);
        assert!(!form.is_searching());
        assert!(!form.draft().has_macros());
    }

    #[tokio::test(start_paused = true)]
    async fn closing_the_form_cancels_the_timer() {
        let catalog = Arc::new(FakeCatalog::answering(oatmeal()));
        let mut form = form(&catalog);

        form.set_name("Омлет");
        drop(form);
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert!(catalog.lookups().is_empty());
    }

    #[tokio::test]
    async fn manual_lookup_requires_a_name() {
        let catalog = Arc::new(FakeCatalog::answering(oatmeal()));
        let form = form(&catalog);

        let err = form.lookup_now().await.unwrap_err();
        assert!(matches!(err, ClientError::Validation { field: "name", .. }));
        assert_eq!(form.nutrition_error().as_deref(), Some("Enter a dish name"));
        assert!(catalog.lookups().is_empty());
    }

    #[tokio::test]
    async fn manual_lookup_surfaces_server_message() {
        let catalog = Arc::new(FakeCatalog::failing());
        let mut form = form(&catalog);
        form.set_calories(10.0);
        form.set_name("Абракадабра");

        assert!(form.lookup_now().await.is_err());
        assert_eq!(
            form.nutrition_error().as_deref(),
            Some(FakeCatalog::NOT_FOUND_DETAIL)
        );
    }

    #[tokio::test]
    async fn manual_lookup_overwrites_existing_macros() {
        let catalog = Arc::new(FakeCatalog::answering(oatmeal()));
        let mut form = form(&catalog);
        form.set_calories(999.0);
        form.set_name("Овсянка");

        form.lookup_now().await.unwrap();
        assert_eq!(form.draft().macros.calories, 250.0);
        assert_eq!(form.nutrition_error(), None);
    }

    #[tokio::test]
    async fn submit_omits_zero_macros() {
        let catalog = Arc::new(FakeCatalog::answering(oatmeal()));
        let mut form = form(&catalog);
        form.set_proteins(12.5);
        form.set_name("  Творог  ");
        form.set_weight(200);

        let dish = form.submit().await.unwrap();
        assert_eq!(dish.name, "Творог");

        let created = catalog.created();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].weight, Some(200));
        assert_eq!(created[0].proteins, Some(12.5));
        assert_eq!(created[0].calories, None);
        assert_eq!(created[0].fats, None);
        assert_eq!(created[0].carbohydrates, None);
        assert_eq!(created[0].meal_type, MealType::Breakfast);
    }

    #[tokio::test]
    async fn submit_validates_before_sending() {
        let catalog = Arc::new(FakeCatalog::answering(oatmeal()));
        let mut form = form(&catalog);
        form.set_calories(5.0);
        form.set_name("Суп");
        form.set_weight(0);

        let err = form.submit().await.unwrap_err();
        assert!(matches!(err, ClientError::Validation { field: "weight", .. }));
        assert_eq!(form.error(), Some("Weight must be at least 1 g"));
        assert!(catalog.created().is_empty());
    }
}
