use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::analysis::NutritionEstimate;

/// Grams of each macronutrient in one logged meal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MacroNutrients {
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

/// Advisory confidence tag reported by the analysis service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    /// Case-insensitive match, anything unrecognised is dropped.
    pub fn parse_lenient(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

/// One logged meal observation, persisted as part of the food log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodEntry {
    pub id: Uuid,
    pub name: String,
    pub calories: f64,
    pub macros: MacroNutrients,
    pub timestamp: i64, // ms since epoch, capture time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Confidence>,
}

impl FoodEntry {
    /// Stamp a validated estimate with the identity and capture time
    /// assigned before the analysis call went out.
    pub fn from_estimate(
        id: Uuid,
        timestamp: i64,
        estimate: NutritionEstimate,
        image_url: Option<String>,
    ) -> Self {
        Self {
            id,
            name: estimate.name,
            calories: estimate.calories,
            macros: estimate.macros,
            timestamp,
            image_url,
            confidence: estimate.confidence,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("food entry has no id")]
    MissingId,
}

/// Ordered history of food entries; insertion order is append order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FoodLog {
    entries: Vec<FoodEntry>,
}

impl FoodLog {
    pub fn new(entries: Vec<FoodEntry>) -> Self {
        Self { entries }
    }

    /// Returns the log with `entry` added at the end. No deduplication.
    pub fn append(mut self, entry: FoodEntry) -> Result<Self, StoreError> {
        if entry.id.is_nil() {
            return Err(StoreError::MissingId);
        }
        self.entries.push(entry);
        Ok(self)
    }

    /// Returns an empty log, discarding every entry.
    pub fn clear(self) -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[FoodEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    pub fn last(&self) -> Option<&FoodEntry> {
        self.entries.last()
    }

    pub fn find(&self, id: Uuid) -> Option<&FoodEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Newest first, as the history screen lists them.
    pub fn history(&self, limit: usize, offset: usize) -> Vec<&FoodEntry> {
        self.entries.iter().rev().skip(offset).take(limit).collect()
    }
}

/// Milliseconds since the unix epoch for `at`.
pub fn unix_millis(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000_000) as i64
}

#[cfg(test)]
pub(crate) fn sample_entry(calories: f64, timestamp: i64) -> FoodEntry {
    FoodEntry {
        id: Uuid::new_v4(),
        name: "sample".into(),
        calories,
        macros: MacroNutrients {
            protein: 1.0,
            carbs: 2.0,
            fat: 3.0,
        },
        timestamp,
        image_url: None,
        confidence: None,
    }
}
