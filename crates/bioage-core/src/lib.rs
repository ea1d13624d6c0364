//! bioage-core: Biological age estimation pipeline.
//!
//! Turns a lifestyle questionnaire and a face-based age estimate into a
//! composite health score and a biological age, and sequences the face
//! scan through model loading, camera capture and analysis.

pub mod capability;
pub mod face;
pub mod models;
pub mod recommendations;
pub mod result;
pub mod scan;
pub mod survey;
#[cfg(test)]
mod testing;
pub mod types;
pub mod wizard;

pub use capability::{CameraError, CameraSource, CameraStream, EstimateError, FaceModels, ModelLoadError};
pub use face::{analyze_estimate, face_score, FaceAnalysisAdapter};
pub use models::{LoadProgress, ModelService, ModelStatus};
pub use result::{compute_from_outcome, compute_result, gauge_angle, AgePolicy, PolicyError, ScoringPolicy};
pub use scan::{FallbackCause, ScanConfig, ScanController, ScanError, ScanPhase};
pub use survey::{
    compute_lifestyle_score, lifestyle_breakdown, parse_actual_age, Bucket, LifestyleBreakdown, SurveyAnswers, SurveyError,
    SurveyForm,
};
pub use types::{AgeEstimate, FaceAnalysisResult, FaceOutcome, Gender, NoFaceReason, SurveyResult};
pub use wizard::{Wizard, WizardError, WizardStep};
