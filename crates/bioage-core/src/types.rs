use crate::recommendations::Recommendation;
use serde::{Deserialize, Serialize};

/// Gender label reported by the age regressor. Not used for scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Female,
    Male,
}

/// Raw output of the face detection / age estimation capability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgeEstimate {
    /// Estimated age in years, unrounded.
    pub age: f32,
    pub gender: Gender,
    /// Confidence of the gender label in [0, 1].
    pub gender_probability: f32,
}

/// A successful face analysis: the surfaced predicted age and its face score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceAnalysisResult {
    /// Model age rounded to the nearest year.
    pub predicted_age: u32,
    pub gender: Gender,
    pub gender_probability: f32,
    /// Face score in [20, 100].
    pub face_score: u8,
}

/// Why a scan completed without a usable face analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoFaceReason {
    /// The detector ran but found no face, failed, or timed out.
    NoFaceDetected,
    /// The models were never loaded, so no analysis could run.
    ModelsUnavailable,
}

/// Outcome of the analysis phase of a scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FaceOutcome {
    Analyzed(FaceAnalysisResult),
    /// Labelled substitute used when no face could be analyzed.
    Fallback { reason: NoFaceReason },
}

impl FaceOutcome {
    /// Face score of someone who looks exactly their age.
    pub const FALLBACK_FACE_SCORE: u8 = 70;

    pub fn face_score(&self) -> u8 {
        match self {
            Self::Analyzed(analysis) => analysis.face_score,
            Self::Fallback { .. } => Self::FALLBACK_FACE_SCORE,
        }
    }

    /// Predicted age to anchor on; the fallback assumes the actual age.
    pub fn predicted_age(&self, actual_age: u32) -> u32 {
        match self {
            Self::Analyzed(analysis) => analysis.predicted_age,
            Self::Fallback { .. } => actual_age,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

/// Final result shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyResult {
    /// Biological age, clamped to the policy's [min_age, max_age].
    pub biological_age: u32,
    pub actual_age: u32,
    /// `actual_age - biological_age`. Positive means younger than actual.
    pub difference: i32,
    /// Composite health score in [0, 100].
    pub score: u8,
    pub lifestyle_score: u8,
    pub face_score: u8,
    /// Set when the face half of the score is the labelled fallback.
    pub face_fallback: bool,
    pub recommendations: Vec<Recommendation>,
}

impl SurveyResult {
    pub fn is_younger(&self) -> bool {
        self.difference > 0
    }
}

/// Round half up (`-2.5 → -2`, `2.5 → 3`).
pub fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}
