use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::numeric::{decimal, opt_decimal};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl MealType {
    pub const ALL: [MealType; 4] = [
        MealType::Breakfast,
        MealType::Lunch,
        MealType::Dinner,
        MealType::Snack,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MealType::Breakfast => "breakfast",
            MealType::Lunch => "lunch",
            MealType::Dinner => "dinner",
            MealType::Snack => "snack",
        }
    }
}

impl fmt::Display for MealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MealType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MealType::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown meal type: {}", s))
    }
}

/// A dish as stored on the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dish {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub weight: u32,
    #[serde(default, deserialize_with = "decimal")]
    pub calories: f64,
    #[serde(default, deserialize_with = "decimal")]
    pub proteins: f64,
    #[serde(default, deserialize_with = "decimal")]
    pub fats: f64,
    #[serde(default, deserialize_with = "decimal")]
    pub carbohydrates: f64,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
}

/// Create payload. Macro fields left at `None` are not sent at all so the
/// server can fill them in itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewDish {
    pub name: String,
    #[serde(with = "crate::dates::iso")]
    pub date: Date,
    pub meal_type: MealType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calories: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proteins: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fats: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carbohydrates: Option<f64>,
}

impl NewDish {
    /// Builds the payload, treating any macro equal to zero as not provided.
    pub fn new(
        name: impl Into<String>,
        date: Date,
        meal_type: MealType,
        weight: u32,
        macros: Macros,
    ) -> Self {
        Self {
            name: name.into(),
            date,
            meal_type,
            weight: Some(weight),
            calories: provided(macros.calories),
            proteins: provided(macros.proteins),
            fats: provided(macros.fats),
            carbohydrates: provided(macros.carbohydrates),
        }
    }
}

fn provided(value: f64) -> Option<f64> {
    (value > 0.0).then_some(value)
}

/// Partial update; only the fields set are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DishPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calories: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proteins: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fats: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carbohydrates: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meal_type: Option<MealType>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "crate::dates::iso::option"
    )]
    pub date: Option<Date>,
}

/// Calories plus the three macronutrients.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Macros {
    #[serde(default, deserialize_with = "decimal")]
    pub calories: f64,
    #[serde(default, deserialize_with = "decimal")]
    pub proteins: f64,
    #[serde(default, deserialize_with = "decimal")]
    pub fats: f64,
    #[serde(default, deserialize_with = "decimal")]
    pub carbohydrates: f64,
}

impl Macros {
    pub fn is_empty(&self) -> bool {
        self.calories == 0.0 && self.proteins == 0.0 && self.fats == 0.0 && self.carbohydrates == 0.0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NutritionQuery {
    pub food_name: String,
    pub weight: u32,
}

/// Estimated nutrition for a named food at a given weight.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NutritionEstimate {
    #[serde(default, deserialize_with = "opt_decimal")]
    pub calories: Option<f64>,
    #[serde(default, deserialize_with = "opt_decimal")]
    pub proteins: Option<f64>,
    #[serde(default, deserialize_with = "opt_decimal")]
    pub fats: Option<f64>,
    #[serde(default, deserialize_with = "opt_decimal")]
    pub carbohydrates: Option<f64>,
}

impl NutritionEstimate {
    /// Missing values count as zero.
    pub fn macros(&self) -> Macros {
        Macros {
            calories: self.calories.unwrap_or(0.0),
            proteins: self.proteins.unwrap_or(0.0),
            fats: self.fats.unwrap_or(0.0),
            carbohydrates: self.carbohydrates.unwrap_or(0.0),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecognizeRequest {
    /// Full `data:<mime>;base64,...` URL.
    pub image_base64: String,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "crate::dates::iso::option"
    )]
    pub date: Option<Date>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meal_type: Option<MealType>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecognizedDish {
    pub name: String,
    #[serde(default = "default_weight")]
    pub weight: u32,
    #[serde(default, deserialize_with = "decimal")]
    pub calories: f64,
    #[serde(default, deserialize_with = "decimal")]
    pub proteins: f64,
    #[serde(default, deserialize_with = "decimal")]
    pub fats: f64,
    #[serde(default, deserialize_with = "decimal")]
    pub carbohydrates: f64,
    /// In `[0, 1]` when the recognizer reports it.
    #[serde(default, deserialize_with = "opt_decimal")]
    pub confidence: Option<f64>,
}

fn default_weight() -> u32 {
    100
}

impl RecognizedDish {
    pub fn macros(&self) -> Macros {
        Macros {
            calories: self.calories,
            proteins: self.proteins,
            fats: self.fats,
            carbohydrates: self.carbohydrates,
        }
    }

    pub fn confidence_percent(&self) -> Option<u32> {
        self.confidence
            .map(|c| (c.clamp(0.0, 1.0) * 100.0).round() as u32)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecognitionResult {
    #[serde(default)]
    pub recognized_dishes: Vec<RecognizedDish>,
    #[serde(default, with = "crate::dates::iso::option")]
    pub suggested_date: Option<Date>,
    #[serde(default)]
    pub suggested_meal_type: Option<MealType>,
}
