//! Narrow interfaces to the external collaborators of a scan: the face
//! model runtime and the camera. Concrete implementations live outside
//! this crate; tests use in-memory fakes.

use crate::types::AgeEstimate;
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelLoadError {
    #[error("model bundle {bundle} not found at {path}")]
    NotFound { bundle: String, path: String },
    #[error("failed to load model bundle {bundle}: {reason}")]
    Failed { bundle: String, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EstimateError {
    #[error("face models are not loaded")]
    NotLoaded,
    #[error("face analysis failed: {0}")]
    Inference(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    #[error("camera permission denied: {0}")]
    PermissionDenied(String),
    #[error("camera not found: {0}")]
    NotFound(String),
    #[error("camera busy: {0}")]
    Busy(String),
    #[error("camera stream is not active")]
    StreamInactive,
    #[error("capture failed: {0}")]
    CaptureFailed(String),
}

/// Face detection and age estimation runtime, loaded as named bundles.
#[allow(async_fn_in_trait)]
pub trait FaceModels {
    /// Bundle names in load order.
    fn bundles(&self) -> &[&'static str];

    async fn load_bundle(&mut self, name: &'static str) -> Result<(), ModelLoadError>;

    /// Drop every loaded bundle.
    fn unload(&mut self);

    /// Detect a single face and estimate its age. `Ok(None)` means no face.
    async fn estimate(&mut self, image: &RgbImage) -> Result<Option<AgeEstimate>, EstimateError>;
}

/// Something that can hand out a live camera stream.
#[allow(async_fn_in_trait)]
pub trait CameraSource {
    type Stream: CameraStream;

    async fn request_stream(&mut self) -> Result<Self::Stream, CameraError>;
}

/// A live camera stream. Holding one keeps the device open.
#[allow(async_fn_in_trait)]
pub trait CameraStream {
    fn is_active(&self) -> bool;

    /// Grab exactly one still frame from the live stream.
    async fn capture_still(&mut self) -> Result<RgbImage, CameraError>;

    /// Stop every track. Must be idempotent.
    fn stop(&mut self);
}
