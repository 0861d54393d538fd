//! Daily totals and goal progress as a view model.

use std::fmt;

use crate::days::{DayData, GoalProgress};

const BAR_CELLS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressTier {
    Complete,
    Close,
    Halfway,
    Low,
}

impl ProgressTier {
    pub fn for_percent(percent: f64) -> Self {
        if percent >= 100.0 {
            ProgressTier::Complete
        } else if percent >= 75.0 {
            ProgressTier::Close
        } else if percent >= 50.0 {
            ProgressTier::Halfway
        } else {
            ProgressTier::Low
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProgressTier::Complete => "complete",
            ProgressTier::Close => "close",
            ProgressTier::Halfway => "halfway",
            ProgressTier::Low => "low",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    /// Rounded for display.
    pub percent: i64,
    /// Bar fill in `[0, 100]`.
    pub bar_width: f64,
    pub tier: ProgressTier,
}

impl Progress {
    pub fn new(percent: f64) -> Self {
        Self {
            percent: percent.round() as i64,
            bar_width: percent.clamp(0.0, 100.0),
            tier: ProgressTier::for_percent(percent),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatRow {
    pub label: &'static str,
    pub unit: &'static str,
    pub total: f64,
    pub progress: Option<Progress>,
}

/// One row per nutrient. Progress is only filled in when the day has a
/// goal and the server reported progress for it.
#[derive(Debug, Clone, PartialEq)]
pub struct DayStats {
    pub rows: Vec<StatRow>,
}

impl DayStats {
    pub fn from_day(day: &DayData) -> Self {
        let s = &day.summary;
        let progress = match (&day.goal, &s.goal_progress) {
            (Some(_), Some(p)) => Some(*p),
            _ => None,
        };
        let pct = |pick: fn(&GoalProgress) -> f64| progress.as_ref().map(pick);

        Self {
            rows: vec![
                row("Calories", "kcal", s.total_calories, pct(|p| p.calories_percent)),
                row("Proteins", "g", s.total_proteins, pct(|p| p.proteins_percent)),
                row("Fats", "g", s.total_fats, pct(|p| p.fats_percent)),
                row("Carbohydrates", "g", s.total_carbohydrates, pct(|p| p.carbohydrates_percent)),
            ],
        }
    }
}

fn row(label: &'static str, unit: &'static str, total: f64, percent: Option<f64>) -> StatRow {
    StatRow {
        label,
        unit,
        total,
        progress: percent.map(Progress::new),
    }
}

impl fmt::Display for DayStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.rows {
            let total = format!("{} {}", trim_number(row.total), row.unit);
            match &row.progress {
                Some(p) => {
                    let filled = ((p.bar_width / 100.0) * BAR_CELLS as f64).round() as usize;
                    writeln!(
                        f,
                        "{:<14}{:>12}  [{}{}] {:>4}% {}",
                        row.label,
                        total,
                        "#".repeat(filled),
                        ".".repeat(BAR_CELLS - filled),
                        p.percent,
                        p.tier.label()
                    )?;
                }
                None => writeln!(f, "{:<14}{:>12}", row.label, total)?,
            }
        }
        Ok(())
    }
}

fn trim_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.1}", value)
    }
}
