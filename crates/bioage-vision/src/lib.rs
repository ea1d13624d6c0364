//! bioage-vision: Face detection and age estimation.
//!
//! Uses SCRFD for face detection and the InsightFace gender/age regressor
//! for age estimation, both running via ONNX Runtime for CPU inference.

pub mod age;
pub mod crop;
pub mod detector;
pub mod pipeline;

pub use age::{AgeEstimator, EstimatorError, FaceAttributes};
pub use crop::CropWindow;
pub use detector::{BoundingBox, DetectorError, FaceDetector};
pub use pipeline::{FacePipeline, FaceReading, VisionError};

use std::path::PathBuf;

/// File name of the SCRFD detection bundle.
pub const DETECTOR_MODEL_FILE: &str = "det_10g.onnx";
/// File name of the gender/age regression bundle.
pub const AGE_MODEL_FILE: &str = "genderage.onnx";

/// Default model directory: `$XDG_DATA_HOME/bioage/models`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("bioage/models")
}
