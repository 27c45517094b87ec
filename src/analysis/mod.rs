use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::entries::model::{Confidence, MacroNutrients};
use crate::images::services::CapturedImage;

pub mod gemini;

pub use gemini::GeminiAnalyzer;

/// Shown to the user whenever analysis fails, whatever the cause.
pub const ANALYSIS_FAILED_MESSAGE: &str = "Could not identify food. Please try again.";

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("analysis request failed: {0}")]
    Transport(String),
    #[error("analysis service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("no response from analysis service")]
    EmptyResponse,
    #[error("analysis payload is not valid JSON: {0}")]
    Decode(String),
    #[error("analysis payload rejected: {0}")]
    Invalid(String),
}

/// Validated nutrition estimate, safe to stamp into a food entry.
#[derive(Debug, Clone, PartialEq)]
pub struct NutritionEstimate {
    pub name: String,
    pub calories: f64,
    pub macros: MacroNutrients,
    pub confidence: Option<Confidence>,
}

/// Maps a captured image to a nutrition estimate.
#[async_trait]
pub trait FoodAnalyzer: Send + Sync {
    async fn analyze(&self, image: &CapturedImage) -> Result<NutritionEstimate, AnalysisError>;
}

/// Payload shape as the model returns it, before validation.
#[derive(Debug, Deserialize)]
struct RawEstimate {
    name: Option<String>,
    calories: Option<f64>,
    macros: Option<RawMacros>,
    confidence: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawMacros {
    protein: Option<f64>,
    carbs: Option<f64>,
    fat: Option<f64>,
}

/// Decodes and validates the model's JSON text.
///
/// Missing or non-numeric nutrition fields reject the whole estimate;
/// negative values are clamped to zero; an unknown confidence is dropped.
pub fn parse_estimate(text: &str) -> Result<NutritionEstimate, AnalysisError> {
    let raw: RawEstimate =
        serde_json::from_str(text).map_err(|e| AnalysisError::Decode(e.to_string()))?;

    let name = raw
        .name
        .ok_or_else(|| AnalysisError::Invalid("missing name".into()))?
        .trim()
        .to_string();
    let calories = amount("calories", raw.calories)?;
    let macros = raw
        .macros
        .ok_or_else(|| AnalysisError::Invalid("missing macros".into()))?;

    Ok(NutritionEstimate {
        name,
        calories,
        macros: MacroNutrients {
            protein: amount("macros.protein", macros.protein)?,
            carbs: amount("macros.carbs", macros.carbs)?,
            fat: amount("macros.fat", macros.fat)?,
        },
        confidence: raw.confidence.as_deref().and_then(Confidence::parse_lenient),
    })
}

fn amount(field: &str, value: Option<f64>) -> Result<f64, AnalysisError> {
    match value {
        Some(v) if v.is_finite() => Ok(v.max(0.0)),
        Some(_) => Err(AnalysisError::Invalid(format!("{field} is not finite"))),
        None => Err(AnalysisError::Invalid(format!("missing {field}"))),
    }
}
