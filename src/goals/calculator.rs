use std::sync::Arc;

use time::Date;
use tracing::{info, instrument, warn};

use super::{ActivityLevel, BodyProfile, Gender, Goal, GoalPlanner, WeightGoal};
use crate::error::{ClientError, ClientResult};

const AGE_RANGE: (u32, u32) = (1, 120);
const WEIGHT_RANGE: (f64, f64) = (1.0, 300.0);
const HEIGHT_RANGE: (u32, u32) = (50, 250);

/// Unvalidated calculator input. Empty fields are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GoalDraft {
    pub age: Option<u32>,
    pub gender: Gender,
    pub weight: Option<f64>,
    pub height: Option<u32>,
    pub activity_level: ActivityLevel,
    pub goal: Option<WeightGoal>,
}

impl GoalDraft {
    /// Checks presence of age, weight and height in that order, then
    /// their ranges in the same order. Zero counts as missing.
    pub fn validate(&self) -> ClientResult<BodyProfile> {
        let age = self
            .age
            .filter(|a| *a != 0)
            .ok_or_else(|| ClientError::validation("age", "Please enter your age"))?;
        let weight = self
            .weight
            .filter(|w| *w != 0.0)
            .ok_or_else(|| ClientError::validation("weight", "Please enter your weight"))?;
        let height = self
            .height
            .filter(|h| *h != 0)
            .ok_or_else(|| ClientError::validation("height", "Please enter your height"))?;

        if age < AGE_RANGE.0 || age > AGE_RANGE.1 {
            return Err(ClientError::validation("age", "Age must be between 1 and 120"));
        }
        if !(WEIGHT_RANGE.0..=WEIGHT_RANGE.1).contains(&weight) {
            return Err(ClientError::validation(
                "weight",
                "Weight must be between 1 and 300 kg",
            ));
        }
        if height < HEIGHT_RANGE.0 || height > HEIGHT_RANGE.1 {
            return Err(ClientError::validation(
                "height",
                "Height must be between 50 and 250 cm",
            ));
        }

        Ok(BodyProfile {
            age,
            gender: self.gender,
            weight,
            height,
            activity_level: self.activity_level,
            goal: self.goal,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GoalStage {
    Editing,
    /// Shown read-only until applied.
    Calculated(Goal),
    Applied(Goal),
}

/// Calculate, review, then apply a daily goal.
pub struct GoalCalculator {
    planner: Arc<dyn GoalPlanner>,
    date: Date,
    draft: GoalDraft,
    stage: GoalStage,
    error: Option<String>,
}

impl GoalCalculator {
    pub fn new(planner: Arc<dyn GoalPlanner>, date: Date) -> Self {
        Self {
            planner,
            date,
            draft: GoalDraft::default(),
            stage: GoalStage::Editing,
            error: None,
        }
    }

    pub fn draft(&self) -> &GoalDraft {
        &self.draft
    }

    /// Only while editing; a calculated result must be revised first.
    pub fn draft_mut(&mut self) -> Option<&mut GoalDraft> {
        match self.stage {
            GoalStage::Editing => Some(&mut self.draft),
            _ => None,
        }
    }

    pub fn stage(&self) -> &GoalStage {
        &self.stage
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn result(&self) -> Option<&Goal> {
        match &self.stage {
            GoalStage::Calculated(goal) | GoalStage::Applied(goal) => Some(goal),
            GoalStage::Editing => None,
        }
    }

    #[instrument(skip(self), fields(date = %self.date))]
    pub async fn calculate(&mut self) -> ClientResult<&Goal> {
        self.error = None;
        let profile = match self.draft.validate() {
            Ok(p) => p,
            Err(e) => {
                self.error = Some(e.user_message());
                return Err(e);
            }
        };

        match self.planner.calculate(self.date, &profile).await {
            Ok(goal) => {
                info!(calories = goal.calories, "goal calculated");
                self.stage = GoalStage::Calculated(goal);
                self.result()
                    .ok_or_else(|| ClientError::validation("goal", "No calculated goal"))
            }
            Err(e) => {
                warn!(error = %e, "goal calculation failed");
                self.error = Some(e.user_message());
                Err(e)
            }
        }
    }

    /// Persists the calculated targets through a separate save call.
    #[instrument(skip(self), fields(date = %self.date))]
    pub async fn apply(&mut self) -> ClientResult<Goal> {
        let targets = match &self.stage {
            GoalStage::Calculated(goal) => goal.targets(),
            _ => {
                return Err(ClientError::validation(
                    "goal",
                    "Calculate a goal before applying it",
                ))
            }
        };
        self.error = None;

        match self.planner.save(self.date, &targets).await {
            Ok(saved) => {
                info!(calories = saved.calories, "goal applied");
                self.stage = GoalStage::Applied(saved.clone());
                Ok(saved)
            }
            Err(e) => {
                warn!(error = %e, "goal save failed");
                self.error = Some(e.user_message());
                Err(e)
            }
        }
    }

    /// Drops the calculated result and returns to editing with the same
    /// inputs.
    pub fn revise(&mut self) {
        self.stage = GoalStage::Editing;
        self.error = None;
    }
}

#[cfg(test)]
mod calculator_tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use reqwest::StatusCode;
    use time::macros::date;

    use super::*;
    use crate::goals::GoalTargets;

    #[derive(Default)]
    struct FakePlanner {
        fail_calculate: bool,
        fail_save: bool,
        calculated: Mutex<Vec<BodyProfile>>,
        saved: Mutex<Vec<GoalTargets>>,
    }

    fn computed() -> Goal {
        Goal {
            id: Some(1),
            date: Some(date!(2024 - 01 - 15)),
            calories: 2759.0,
            proteins: 206.93,
            fats: 76.64,
            carbohydrates: 310.39,
            is_auto_calculated: true,
        }
    }

    #[async_trait]
    impl GoalPlanner for FakePlanner {
        async fn calculate(&self, _date: Date, profile: &BodyProfile) -> ClientResult<Goal> {
            self.calculated.lock().unwrap().push(profile.clone());
            if self.fail_calculate {
                return Err(ClientError::from_response(
                    StatusCode::BAD_REQUEST,
                    br#"{"age": ["Ensure this value is less than or equal to 120."]}"#,
                ));
            }
            Ok(computed())
        }

        async fn save(&self, date: Date, targets: &GoalTargets) -> ClientResult<Goal> {
            self.saved.lock().unwrap().push(*targets);
            if self.fail_save {
                return Err(ClientError::from_response(StatusCode::INTERNAL_SERVER_ERROR, b""));
            }
            Ok(Goal {
                id: Some(9),
                date: Some(date),
                calories: targets.calories as f64,
                proteins: targets.proteins,
                fats: targets.fats,
                carbohydrates: targets.carbohydrates,
                is_auto_calculated: false,
            })
        }
    }

    fn filled() -> GoalDraft {
        GoalDraft {
            age: Some(30),
            gender: Gender::Male,
            weight: Some(80.0),
            height: Some(180),
            activity_level: ActivityLevel::Moderate,
            goal: None,
        }
    }

    #[test]
    fn defaults_are_male_and_moderate() {
        let draft = GoalDraft::default();
        assert_eq!(draft.gender, Gender::Male);
        assert_eq!(draft.activity_level, ActivityLevel::Moderate);
    }

    #[test]
    fn presence_checked_in_order() {
        let err = GoalDraft::default().validate().unwrap_err();
        assert!(matches!(err, ClientError::Validation { field: "age", .. }));

        let draft = GoalDraft {
            age: Some(30),
            height: Some(0),
            ..GoalDraft::default()
        };
        let err = draft.validate().unwrap_err();
        assert!(matches!(err, ClientError::Validation { field: "weight", .. }));

        let draft = GoalDraft {
            age: Some(30),
            weight: Some(70.0),
            ..GoalDraft::default()
        };
        let err = draft.validate().unwrap_err();
        assert!(matches!(err, ClientError::Validation { field: "height", .. }));
    }

    #[test]
    fn missing_field_reported_before_out_of_range_one() {
        let draft = GoalDraft {
            age: Some(500),
            weight: None,
            height: Some(180),
            ..GoalDraft::default()
        };
        let err = draft.validate().unwrap_err();
        assert!(matches!(err, ClientError::Validation { field: "weight", .. }));
    }

    #[test]
    fn ranges_are_enforced() {
        let mut draft = filled();
        draft.age = Some(121);
        assert_eq!(draft.validate().unwrap_err().user_message(), "Age must be between 1 and 120");

        let mut draft = filled();
        draft.weight = Some(300.5);
        assert!(matches!(
            draft.validate().unwrap_err(),
            ClientError::Validation { field: "weight", .. }
        ));

        let mut draft = filled();
        draft.height = Some(49);
        assert!(matches!(
            draft.validate().unwrap_err(),
            ClientError::Validation { field: "height", .. }
        ));
    }

    #[tokio::test]
    async fn calculate_then_apply() {
        let planner = Arc::new(FakePlanner::default());
        let mut calc = GoalCalculator::new(planner.clone(), date!(2024 - 01 - 15));
        *calc.draft_mut().unwrap() = filled();

        let goal = calc.calculate().await.unwrap().clone();
        assert_eq!(goal.calories, 2759.0);
        assert!(matches!(calc.stage(), GoalStage::Calculated(_)));
        assert!(calc.draft_mut().is_none());
        assert!(planner.saved.lock().unwrap().is_empty());

        let sent = planner.calculated.lock().unwrap().clone();
        assert_eq!(sent[0].age, 30);
        assert_eq!(sent[0].weight, 80.0);
        assert_eq!(sent[0].height, 180);

        let saved = calc.apply().await.unwrap();
        assert_eq!(saved.calories, 2759.0);
        assert_eq!(
            planner.saved.lock().unwrap()[0],
            GoalTargets {
                calories: 2759,
                proteins: 206.93,
                fats: 76.64,
                carbohydrates: 310.39,
            }
        );
        assert!(matches!(calc.stage(), GoalStage::Applied(_)));
    }

    #[tokio::test]
    async fn invalid_draft_never_reaches_planner() {
        let planner = Arc::new(FakePlanner::default());
        let mut calc = GoalCalculator::new(planner.clone(), date!(2024 - 01 - 15));

        assert!(calc.calculate().await.is_err());
        assert_eq!(calc.error(), Some("Please enter your age"));
        assert!(planner.calculated.lock().unwrap().is_empty());
        assert_eq!(calc.stage(), &GoalStage::Editing);
    }

    #[tokio::test]
    async fn server_field_errors_are_shown() {
        let planner = Arc::new(FakePlanner {
            fail_calculate: true,
            ..FakePlanner::default()
        });
        let mut calc = GoalCalculator::new(planner, date!(2024 - 01 - 15));
        *calc.draft_mut().unwrap() = filled();

        assert!(calc.calculate().await.is_err());
        assert_eq!(
            calc.error(),
            Some("Ensure this value is less than or equal to 120.")
        );
        assert_eq!(calc.stage(), &GoalStage::Editing);
    }

    #[tokio::test]
    async fn failed_apply_keeps_result() {
        let planner = Arc::new(FakePlanner {
            fail_save: true,
            ..FakePlanner::default()
        });
        let mut calc = GoalCalculator::new(planner, date!(2024 - 01 - 15));
        *calc.draft_mut().unwrap() = filled();
        calc.calculate().await.unwrap();

        assert!(calc.apply().await.is_err());
        assert!(matches!(calc.stage(), GoalStage::Calculated(_)));
        assert!(calc.error().is_some());
    }

    #[tokio::test]
    async fn apply_requires_a_result_and_revise_keeps_inputs() {
        let planner = Arc::new(FakePlanner::default());
        let mut calc = GoalCalculator::new(planner, date!(2024 - 01 - 15));
        assert!(calc.apply().await.is_err());

        *calc.draft_mut().unwrap() = filled();
        calc.calculate().await.unwrap();
        calc.revise();
        assert_eq!(calc.stage(), &GoalStage::Editing);
        assert_eq!(calc.draft().age, Some(30));
    }
}
