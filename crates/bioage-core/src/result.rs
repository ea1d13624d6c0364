//! Composite result: blend lifestyle and face scores, derive biological age.

use crate::recommendations;
use crate::types::{round_half_up, FaceOutcome, SurveyResult};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Years of correction at a lifestyle score of 0 or 100.
const ANCHORED_MAX_CORRECTION: f64 = 3.0;
/// Composite points per year of adjustment.
const LINEAR_POINTS_PER_YEAR: f64 = 10.0;

/// Biological age never goes below this, whatever the policy.
pub const ADULT_MIN_AGE: u32 = 18;

const GAUGE_MIN_AGE: f64 = 20.0;
const GAUGE_MAX_AGE: f64 = 80.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PolicyError {
    #[error("weights must be finite and non-negative (lifestyle {lifestyle}, face {face})")]
    NegativeWeight { lifestyle: f64, face: f64 },
    #[error("weights must sum to 1, got {0}")]
    WeightSum(f64),
    #[error("min_age {min} is greater than max_age {max}")]
    AgeBounds { min: u32, max: u32 },
    #[error("min_age {0} is below the adult floor of 18")]
    MinAgeBelowFloor(u32),
}

/// How the biological age is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgePolicy {
    /// `actual - round((composite - 50) / 10)`.
    ScoreLinear,
    /// `round(predicted - (lifestyle - 50) / 50 * 3)`.
    PredictedAgeAnchored,
}

/// Scoring constants. Exactly one age policy is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScoringPolicy {
    pub lifestyle_weight: f64,
    pub face_weight: f64,
    pub age_policy: AgePolicy,
    pub min_age: u32,
    pub max_age: u32,
}

impl ScoringPolicy {
    /// Lifestyle 30% / face 70%, anchored on the predicted age, clamped to [18, 120].
    pub const DEFAULT: Self = Self {
        lifestyle_weight: 0.3,
        face_weight: 0.7,
        age_policy: AgePolicy::PredictedAgeAnchored,
        min_age: 18,
        max_age: 120,
    };

    pub fn validate(&self) -> Result<(), PolicyError> {
        let (l, f) = (self.lifestyle_weight, self.face_weight);
        if !l.is_finite() || !f.is_finite() || l < 0.0 || f < 0.0 {
            return Err(PolicyError::NegativeWeight { lifestyle: l, face: f });
        }
        if ((l + f) - 1.0).abs() > 1e-6 {
            return Err(PolicyError::WeightSum(l + f));
        }
        if self.min_age < ADULT_MIN_AGE {
            return Err(PolicyError::MinAgeBelowFloor(self.min_age));
        }
        if self.min_age > self.max_age {
            return Err(PolicyError::AgeBounds { min: self.min_age, max: self.max_age });
        }
        Ok(())
    }

    /// Composite score in [0, 100].
    pub fn composite_score(&self, lifestyle_score: u8, face_score: u8) -> u8 {
        let blended = lifestyle_score as f64 * self.lifestyle_weight + face_score as f64 * self.face_weight;
        round_half_up(blended).clamp(0.0, 100.0) as u8
    }

    /// Biological age before clamping.
    fn raw_biological_age(&self, composite: u8, lifestyle_score: u8, predicted_age: u32, actual_age: u32) -> f64 {
        match self.age_policy {
            AgePolicy::ScoreLinear => {
                let adjustment = round_half_up((composite as f64 - 50.0) / LINEAR_POINTS_PER_YEAR);
                actual_age as f64 - adjustment
            }
            AgePolicy::PredictedAgeAnchored => {
                let correction = (lifestyle_score as f64 - 50.0) / 50.0 * ANCHORED_MAX_CORRECTION;
                round_half_up(predicted_age as f64 - correction)
            }
        }
    }

    fn clamp_age(&self, age: f64) -> u32 {
        let min = self.min_age.max(ADULT_MIN_AGE);
        let max = self.max_age.max(min);
        age.clamp(min as f64, max as f64) as u32
    }
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Combine the two scores into a result. Pure and total.
pub fn compute_result(
    lifestyle_score: u8,
    face_score: u8,
    predicted_age: u32,
    actual_age: u32,
    policy: &ScoringPolicy,
) -> SurveyResult {
    let score = policy.composite_score(lifestyle_score, face_score);
    let raw_age = policy.raw_biological_age(score, lifestyle_score, predicted_age, actual_age);
    let biological_age = policy.clamp_age(raw_age);
    let difference = actual_age as i32 - biological_age as i32;

    tracing::debug!(
        lifestyle_score,
        face_score,
        predicted_age,
        actual_age,
        score,
        biological_age,
        policy = ?policy.age_policy,
        "computed result"
    );

    SurveyResult {
        biological_age,
        actual_age,
        difference,
        score,
        lifestyle_score,
        face_score,
        face_fallback: false,
        recommendations: recommendations::select(),
    }
}

/// Compute a result from a scan outcome, carrying the fallback flag.
pub fn compute_from_outcome(
    lifestyle_score: u8,
    outcome: &FaceOutcome,
    actual_age: u32,
    policy: &ScoringPolicy,
) -> SurveyResult {
    let mut result = compute_result(
        lifestyle_score,
        outcome.face_score(),
        outcome.predicted_age(actual_age),
        actual_age,
        policy,
    );
    result.face_fallback = outcome.is_fallback();
    result
}

/// Needle angle on a 0–180° half dial spanning ages 20 to 80.
pub fn gauge_angle(age: u32) -> f64 {
    let clamped = (age as f64).clamp(GAUGE_MIN_AGE, GAUGE_MAX_AGE);
    (clamped - GAUGE_MIN_AGE) / (GAUGE_MAX_AGE - GAUGE_MIN_AGE) * 180.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::face::face_score;
    use crate::types::NoFaceReason;

    #[test]
    fn test_end_to_end_default_policy() {
        let policy = ScoringPolicy::DEFAULT;
        let face = face_score(35.0 - 28.0);
        assert_eq!(face, 94);

        let result = compute_result(80, face, 28, 35, &policy);
        assert_eq!(result.score, 90);
        assert_eq!(result.biological_age, 26);
        assert_eq!(result.difference, 9);
        assert!(result.is_younger());
        assert!(!result.face_fallback);
        assert_eq!(result.recommendations.len(), 3);
    }

    #[test]
    fn test_biological_age_floor() {
        let result = compute_result(100, 100, 5, 10, &ScoringPolicy::DEFAULT);
        assert_eq!(result.biological_age, 18);
        assert_eq!(result.difference, 10 - 18);
    }

    #[test]
    fn test_biological_age_ceiling() {
        let result = compute_result(0, 20, 200, 90, &ScoringPolicy::DEFAULT);
        assert_eq!(result.biological_age, 120);
        assert_eq!(result.difference, 90 - 120);
    }

    #[test]
    fn test_score_linear_policy() {
        let policy = ScoringPolicy {
            lifestyle_weight: 0.6,
            face_weight: 0.4,
            age_policy: AgePolicy::ScoreLinear,
            ..ScoringPolicy::DEFAULT
        };
        // 0.6*80 + 0.4*90 = 84 → adjustment round(3.4) = 3
        let result = compute_result(80, 90, 99, 40, &policy);
        assert_eq!(result.score, 84);
        assert_eq!(result.biological_age, 37);
        assert_eq!(result.difference, 3);

        // 0.6*20 + 0.4*30 = 24 → adjustment round(-2.6) = -3
        let result = compute_result(20, 30, 0, 40, &policy);
        assert_eq!(result.score, 24);
        assert_eq!(result.biological_age, 43);

        // 25 → adjustment round(-2.5) = -2 (half rounds up)
        let result = compute_result(25, 25, 0, 40, &policy);
        assert_eq!(result.score, 25);
        assert_eq!(result.biological_age, 42);
    }

    #[test]
    fn test_score_linear_ignores_predicted_age() {
        let policy = ScoringPolicy { age_policy: AgePolicy::ScoreLinear, ..ScoringPolicy::DEFAULT };
        let a = compute_result(60, 70, 20, 45, &policy);
        let b = compute_result(60, 70, 80, 45, &policy);
        assert_eq!(a.biological_age, b.biological_age);
    }

    #[test]
    fn test_invariants_hold_across_inputs() {
        for policy in [
            ScoringPolicy::DEFAULT,
            ScoringPolicy { age_policy: AgePolicy::ScoreLinear, ..ScoringPolicy::DEFAULT },
        ] {
            for lifestyle in (0..=100).step_by(7) {
                for face in (20..=100).step_by(9) {
                    for predicted in [0u32, 5, 18, 40, 119, 300] {
                        for actual in [1u32, 17, 18, 35, 120] {
                            let r = compute_result(lifestyle, face, predicted, actual, &policy);
                            assert!(r.score <= 100);
                            assert!(r.biological_age >= 18 && r.biological_age <= 120);
                            assert_eq!(r.difference, actual as i32 - r.biological_age as i32);
                            let expected = round_half_up(
                                lifestyle as f64 * policy.lifestyle_weight + face as f64 * policy.face_weight,
                            );
                            assert_eq!(r.score as f64, expected);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_fallback_outcome_sets_flag() {
        let outcome = FaceOutcome::Fallback { reason: NoFaceReason::NoFaceDetected };
        let result = compute_from_outcome(50, &outcome, 40, &ScoringPolicy::DEFAULT);
        assert!(result.face_fallback);
        assert_eq!(result.face_score, 70);
        // 0.3*50 + 0.7*70 = 64; anchored on actual age with zero correction.
        assert_eq!(result.score, 64);
        assert_eq!(result.biological_age, 40);
        assert_eq!(result.difference, 0);
    }

    #[test]
    fn test_policy_validation() {
        assert!(ScoringPolicy::DEFAULT.validate().is_ok());
        let bad = ScoringPolicy { lifestyle_weight: 0.5, face_weight: 0.6, ..ScoringPolicy::DEFAULT };
        assert!(matches!(bad.validate(), Err(PolicyError::WeightSum(_))));
        let bad = ScoringPolicy { lifestyle_weight: -0.5, face_weight: 1.5, ..ScoringPolicy::DEFAULT };
        assert!(matches!(bad.validate(), Err(PolicyError::NegativeWeight { .. })));
        let bad = ScoringPolicy { min_age: 50, max_age: 40, ..ScoringPolicy::DEFAULT };
        assert_eq!(bad.validate(), Err(PolicyError::AgeBounds { min: 50, max: 40 }));
    }

    #[test]
    fn test_policy_cannot_lower_adult_floor() {
        let loose = ScoringPolicy { min_age: 0, ..ScoringPolicy::DEFAULT };
        assert_eq!(loose.validate(), Err(PolicyError::MinAgeBelowFloor(0)));

        // Even unvalidated, the floor holds.
        let result = compute_result(100, 100, 5, 10, &loose);
        assert_eq!(result.biological_age, 18);
        assert_eq!(result.difference, -8);
    }

    #[test]
    fn test_gauge_angle() {
        assert_eq!(gauge_angle(20), 0.0);
        assert_eq!(gauge_angle(50), 90.0);
        assert_eq!(gauge_angle(80), 180.0);
        assert_eq!(gauge_angle(5), 0.0);
        assert_eq!(gauge_angle(99), 180.0);
    }
}
