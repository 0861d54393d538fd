use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::Date;

use crate::dishes::Macros;
use crate::numeric::decimal;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    #[default]
    Male,
    Female,
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" | "m" => Ok(Gender::Male),
            "female" | "f" => Ok(Gender::Female),
            other => Err(format!("unknown gender: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Sedentary,
    Light,
    #[default]
    Moderate,
    Active,
    VeryActive,
}

impl ActivityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityLevel::Sedentary => "sedentary",
            ActivityLevel::Light => "light",
            ActivityLevel::Moderate => "moderate",
            ActivityLevel::Active => "active",
            ActivityLevel::VeryActive => "very_active",
        }
    }
}

impl fmt::Display for ActivityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        [
            ActivityLevel::Sedentary,
            ActivityLevel::Light,
            ActivityLevel::Moderate,
            ActivityLevel::Active,
            ActivityLevel::VeryActive,
        ]
        .into_iter()
        .find(|a| a.as_str() == wanted)
        .ok_or_else(|| format!("unknown activity level: {}", s))
    }
}

/// Body-weight direction the server adjusts calories for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightGoal {
    Lose,
    Maintain,
    Gain,
}

impl FromStr for WeightGoal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lose" => Ok(WeightGoal::Lose),
            "maintain" => Ok(WeightGoal::Maintain),
            "gain" => Ok(WeightGoal::Gain),
            other => Err(format!("unknown weight goal: {}", other)),
        }
    }
}

/// Validated input for the auto-calculation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BodyProfile {
    pub age: u32,
    pub gender: Gender,
    /// Kilograms.
    pub weight: f64,
    /// Centimetres.
    pub height: u32,
    pub activity_level: ActivityLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal: Option<WeightGoal>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AutoCalculateRequest<'a> {
    #[serde(flatten)]
    pub profile: &'a BodyProfile,
    #[serde(with = "crate::dates::iso")]
    pub date: Date,
}

/// Daily targets as sent when saving a goal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GoalTargets {
    pub calories: u32,
    pub proteins: f64,
    pub fats: f64,
    pub carbohydrates: f64,
}

/// A stored (or freshly calculated) daily goal.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Goal {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default, with = "crate::dates::iso::option")]
    pub date: Option<Date>,
    #[serde(deserialize_with = "decimal")]
    pub calories: f64,
    #[serde(deserialize_with = "decimal")]
    pub proteins: f64,
    #[serde(deserialize_with = "decimal")]
    pub fats: f64,
    #[serde(deserialize_with = "decimal")]
    pub carbohydrates: f64,
    #[serde(default)]
    pub is_auto_calculated: bool,
}

impl Goal {
    pub fn targets(&self) -> GoalTargets {
        GoalTargets {
            calories: self.calories.round().max(0.0) as u32,
            proteins: self.proteins,
            fats: self.fats,
            carbohydrates: self.carbohydrates,
        }
    }

    pub fn macros(&self) -> Macros {
        Macros {
            calories: self.calories,
            proteins: self.proteins,
            fats: self.fats,
            carbohydrates: self.carbohydrates,
        }
    }
}
