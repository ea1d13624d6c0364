//! Engine-backed implementations of the core capability traits.

use crate::engine::{EngineHandle, AGE_BUNDLE, DETECTOR_BUNDLE};
use bioage_core::{AgeEstimate, CameraError, CameraSource, CameraStream, EstimateError, FaceModels, ModelLoadError};
use image::RgbImage;

const BUNDLES: [&str; 2] = [DETECTOR_BUNDLE, AGE_BUNDLE];

/// SCRFD + genderage running on the engine thread.
pub struct OnnxModels {
    engine: EngineHandle,
}

impl OnnxModels {
    pub fn new(engine: EngineHandle) -> Self {
        Self { engine }
    }
}

impl FaceModels for OnnxModels {
    fn bundles(&self) -> &[&'static str] {
        &BUNDLES
    }

    async fn load_bundle(&mut self, name: &'static str) -> Result<(), ModelLoadError> {
        self.engine.load_bundle(name).await
    }

    fn unload(&mut self) {
        self.engine.unload();
    }

    async fn estimate(&mut self, image: &RgbImage) -> Result<Option<AgeEstimate>, EstimateError> {
        self.engine.analyze(image.clone()).await
    }
}

/// A V4L2 device opened on the engine thread.
pub struct V4lCamera {
    engine: EngineHandle,
    device: String,
    warmup_frames: usize,
}

impl V4lCamera {
    pub fn new(engine: EngineHandle, device: impl Into<String>, warmup_frames: usize) -> Self {
        Self {
            engine,
            device: device.into(),
            warmup_frames,
        }
    }
}

impl CameraSource for V4lCamera {
    type Stream = V4lStream;

    async fn request_stream(&mut self) -> Result<V4lStream, CameraError> {
        self.engine.open_camera(&self.device).await?;
        tracing::info!(device = %self.device, "camera acquired");
        Ok(V4lStream {
            engine: self.engine.clone(),
            warmup_frames: self.warmup_frames,
            active: true,
        })
    }
}

/// Open device handle. Stopping closes the device on the engine thread.
pub struct V4lStream {
    engine: EngineHandle,
    warmup_frames: usize,
    active: bool,
}

impl CameraStream for V4lStream {
    fn is_active(&self) -> bool {
        self.active
    }

    async fn capture_still(&mut self) -> Result<RgbImage, CameraError> {
        if !self.active {
            return Err(CameraError::StreamInactive);
        }
        self.engine.capture(self.warmup_frames).await
    }

    fn stop(&mut self) {
        if self.active {
            self.active = false;
            self.engine.close_camera();
        }
    }
}

/// Camera disabled on the command line; every request is refused.
pub struct NoCamera;

impl CameraSource for NoCamera {
    type Stream = V4lStream;

    async fn request_stream(&mut self) -> Result<V4lStream, CameraError> {
        Err(CameraError::NotFound("camera disabled with --no-camera".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::spawn_engine;
    use bioage_core::{FaceAnalysisAdapter, ModelService, ModelStatus, ScanConfig, ScanController, ScanPhase};
    use bioage_core::{FallbackCause, FaceOutcome, NoFaceReason};
    use std::time::Duration;

    fn engine() -> EngineHandle {
        spawn_engine(std::env::temp_dir().join("bioage-cli-backend-no-models")).unwrap()
    }

    #[tokio::test]
    async fn test_model_service_fails_without_bundles() {
        let mut service = ModelService::new(OnnxModels::new(engine()));
        assert!(service.init().await.is_err());
        assert_eq!(service.status(), ModelStatus::Failed);
        assert!(matches!(service.last_error(), Some(ModelLoadError::NotFound { .. })));

        let adapter = FaceAnalysisAdapter::new(Duration::from_secs(1));
        assert!(adapter.estimate_face_score(&mut service, &RgbImage::new(8, 8), 30).await.is_none());
    }

    #[tokio::test]
    async fn test_scan_without_models_falls_back_to_upload() {
        let mut service = ModelService::new(OnnxModels::new(engine()));
        let mut scan = ScanController::new(&mut service, NoCamera, 40, &ScanConfig::default());
        assert_eq!(scan.start().await.unwrap(), ScanPhase::UploadFallback);
        assert!(matches!(scan.fallback_cause(), Some(FallbackCause::ModelLoad(_))));

        let outcome = scan.submit_upload(RgbImage::new(8, 8)).await.unwrap();
        assert_eq!(outcome, FaceOutcome::Fallback { reason: NoFaceReason::ModelsUnavailable });
        assert_eq!(scan.phase(), ScanPhase::Complete);
    }

    #[tokio::test]
    async fn test_stream_stop_is_idempotent() {
        let mut stream = V4lStream { engine: engine(), warmup_frames: 0, active: true };
        stream.stop();
        stream.stop();
        assert!(!stream.is_active());
        assert_eq!(stream.capture_still().await.unwrap_err(), CameraError::StreamInactive);
    }

    #[tokio::test]
    async fn test_no_camera_refuses() {
        let err = NoCamera.request_stream().await.err();
        assert!(matches!(err, Some(CameraError::NotFound(_))));
    }
}
