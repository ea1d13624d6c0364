//! Face score: how much younger or older a face looks than its owner's age.
//!
//! The score is a piecewise linear function of
//! `age_difference = actual_age - predicted_age`, so looking younger
//! scores higher. The pieces live in one ordered table evaluated by a
//! single routine.

use crate::capability::FaceModels;
use crate::models::ModelService;
use crate::types::{round_half_up, AgeEstimate, FaceAnalysisResult};
use image::RgbImage;
use std::time::Duration;

pub const MIN_FACE_SCORE: u8 = 20;
pub const MAX_FACE_SCORE: u8 = 100;

/// One linear piece: for `diff >= from`, `score = base + (diff - anchor) * slope`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub from: f64,
    pub anchor: f64,
    pub base: f64,
    pub slope: f64,
}

impl Segment {
    fn eval(&self, diff: f64) -> f64 {
        // Flat pieces must not turn an infinite difference into NaN.
        if self.slope == 0.0 {
            return self.base;
        }
        self.base + (diff - self.anchor) * self.slope
    }
}

/// Pieces ordered by descending lower bound; the first match wins.
pub const FACE_SCORE_TABLE: [Segment; 6] = [
    // 10+ years younger
    Segment { from: 10.0, anchor: 10.0, base: 100.0, slope: 0.0 },
    // 5-10 years younger
    Segment { from: 5.0, anchor: 5.0, base: 90.0, slope: 2.0 },
    // 0-5 years younger
    Segment { from: 0.0, anchor: 0.0, base: 70.0, slope: 4.0 },
    // 0-10 years older
    Segment { from: -10.0, anchor: 0.0, base: 70.0, slope: 3.0 },
    // 10-30 years older
    Segment { from: -30.0, anchor: -10.0, base: 40.0, slope: 1.0 },
    // 30+ years older
    Segment { from: f64::NEG_INFINITY, anchor: -30.0, base: 20.0, slope: 0.5 },
];

fn segment_for(age_difference: f64) -> &'static Segment {
    FACE_SCORE_TABLE
        .iter()
        .find(|segment| age_difference >= segment.from)
        .unwrap_or(&FACE_SCORE_TABLE[FACE_SCORE_TABLE.len() - 1])
}

/// Unrounded, unclamped value of the piecewise function.
pub fn raw_face_score(age_difference: f64) -> f64 {
    segment_for(age_difference).eval(age_difference)
}

/// Face score in [20, 100] for `actual_age - predicted_age`.
pub fn face_score(age_difference: f64) -> u8 {
    let raw = raw_face_score(age_difference);
    if raw.is_nan() {
        return MIN_FACE_SCORE;
    }
    round_half_up(raw).clamp(MIN_FACE_SCORE as f64, MAX_FACE_SCORE as f64) as u8
}

/// Turn a raw model estimate into the surfaced analysis result.
pub fn analyze_estimate(estimate: &AgeEstimate, actual_age: u32) -> FaceAnalysisResult {
    let age = estimate.age as f64;
    let age_difference = actual_age as f64 - age;
    FaceAnalysisResult {
        predicted_age: round_half_up(age).max(0.0) as u32,
        gender: estimate.gender,
        gender_probability: estimate.gender_probability,
        face_score: face_score(age_difference),
    }
}

/// Wraps the external age estimator. Never fails: every detector error,
/// timeout or missing face resolves to `None`.
#[derive(Debug, Clone)]
pub struct FaceAnalysisAdapter {
    timeout: Duration,
}

impl FaceAnalysisAdapter {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub async fn estimate_face_score<M: FaceModels>(
        &self,
        models: &mut ModelService<M>,
        image: &RgbImage,
        actual_age: u32,
    ) -> Option<FaceAnalysisResult> {
        let estimate = match tokio::time::timeout(self.timeout, models.estimate(image)).await {
            Ok(Ok(Some(estimate))) => estimate,
            Ok(Ok(None)) => {
                tracing::warn!("no face detected");
                return None;
            }
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "face analysis failed");
                return None;
            }
            Err(_) => {
                tracing::warn!(timeout_ms = self.timeout.as_millis() as u64, "face analysis timed out");
                return None;
            }
        };

        if !estimate.age.is_finite() || estimate.age < 0.0 {
            tracing::warn!(age = estimate.age, "age estimator returned an invalid age");
            return None;
        }

        let analysis = analyze_estimate(&estimate, actual_age);
        tracing::info!(
            predicted_age = analysis.predicted_age,
            actual_age,
            face_score = analysis.face_score,
            "face analyzed"
        );
        Some(analysis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeEstimate, FakeModels};
    use crate::types::Gender;

    #[test]
    fn test_anchor_points() {
        assert_eq!(face_score(10.0), 100);
        assert_eq!(face_score(7.0), 94);
        assert_eq!(face_score(5.0), 90);
        assert_eq!(face_score(0.0), 70);
        assert_eq!(face_score(-10.0), 40);
        assert_eq!(face_score(-30.0), 20);
    }

    #[test]
    fn test_each_piece() {
        assert_eq!(face_score(25.0), 100);
        assert_eq!(face_score(2.0), 78);
        assert_eq!(face_score(-4.0), 58);
        assert_eq!(face_score(-20.0), 30);
        assert_eq!(face_score(-31.0), 20);
    }

    #[test]
    fn test_continuous_at_boundaries() {
        for segment in &FACE_SCORE_TABLE[..FACE_SCORE_TABLE.len() - 1] {
            let b = segment.from;
            let left = raw_face_score(b - 1e-9);
            let right = raw_face_score(b);
            assert!((left - right).abs() < 1e-6, "discontinuity at {b}: {left} vs {right}");
        }
    }

    #[test]
    fn test_clamped_for_extremes() {
        assert_eq!(face_score(-1000.0), 20);
        assert_eq!(face_score(1000.0), 100);
        assert_eq!(face_score(f64::NEG_INFINITY), 20);
        assert_eq!(face_score(f64::INFINITY), 100);
        assert_eq!(face_score(f64::NAN), 20);
        for d in -200..=200 {
            let s = face_score(d as f64);
            assert!((20..=100).contains(&s), "diff {d} gave {s}");
        }
    }

    #[test]
    fn test_monotonic_non_decreasing() {
        let mut prev = 0u8;
        for d in -100..=50 {
            let s = face_score(d as f64 * 0.5);
            assert!(s >= prev, "score fell at diff {}", d as f64 * 0.5);
            prev = s;
        }
    }

    #[test]
    fn test_fractional_difference_rounds() {
        // actual 35, predicted 32.6 → diff 2.4 → 79.6 → 80
        let estimate = AgeEstimate { age: 32.6, gender: Gender::Female, gender_probability: 0.7 };
        let analysis = analyze_estimate(&estimate, 35);
        assert_eq!(analysis.predicted_age, 33);
        assert_eq!(analysis.face_score, 80);
    }

    async fn ready_service(estimate: FakeEstimate) -> ModelService<FakeModels> {
        let mut service = ModelService::new(FakeModels::with_estimate(estimate));
        service.init().await.unwrap();
        service
    }

    #[tokio::test]
    async fn test_adapter_scores_detected_face() {
        let mut service = ready_service(FakeEstimate::Age(28.0)).await;
        let adapter = FaceAnalysisAdapter::new(Duration::from_secs(1));
        let result = adapter
            .estimate_face_score(&mut service, &RgbImage::new(8, 8), 35)
            .await
            .unwrap();
        assert_eq!(result.predicted_age, 28);
        assert_eq!(result.face_score, 94);
    }

    #[tokio::test]
    async fn test_adapter_is_idempotent() {
        let mut service = ready_service(FakeEstimate::Age(41.3)).await;
        let adapter = FaceAnalysisAdapter::new(Duration::from_secs(1));
        let image = RgbImage::new(8, 8);
        let first = adapter.estimate_face_score(&mut service, &image, 40).await;
        let second = adapter.estimate_face_score(&mut service, &image, 40).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_adapter_returns_none_without_face() {
        let mut service = ready_service(FakeEstimate::NoFace).await;
        let adapter = FaceAnalysisAdapter::new(Duration::from_secs(1));
        assert!(adapter.estimate_face_score(&mut service, &RgbImage::new(8, 8), 35).await.is_none());
    }

    #[tokio::test]
    async fn test_adapter_swallows_detector_error() {
        let mut service = ready_service(FakeEstimate::Error).await;
        let adapter = FaceAnalysisAdapter::new(Duration::from_secs(1));
        assert!(adapter.estimate_face_score(&mut service, &RgbImage::new(8, 8), 35).await.is_none());
    }

    #[tokio::test]
    async fn test_adapter_treats_timeout_as_no_face() {
        let mut service = ready_service(FakeEstimate::Hang).await;
        let adapter = FaceAnalysisAdapter::new(Duration::from_millis(20));
        assert!(adapter.estimate_face_score(&mut service, &RgbImage::new(8, 8), 35).await.is_none());
    }

    #[tokio::test]
    async fn test_adapter_returns_none_when_models_not_loaded() {
        let mut service = ModelService::new(FakeModels::ready(30.0));
        let adapter = FaceAnalysisAdapter::new(Duration::from_secs(1));
        assert!(adapter.estimate_face_score(&mut service, &RgbImage::new(8, 8), 35).await.is_none());
        assert_eq!(service.models().estimate_calls, 0);
    }
}
