//! Scan phase controller.
//!
//! Sequences one face scan:
//!
//! ```text
//! ModelLoading ──► CameraReady ──► Capturing ──► Analyzing ──► Complete
//!      │               │                              ▲
//!      └───────────────┴──► UploadFallback ───────────┘
//! ```
//!
//! Model load failures and camera failures are never fatal: they route to
//! `UploadFallback`, from which the user can upload an image or retry the
//! camera. The live camera stream is owned by a guard that stops it on every
//! exit path, so at most one stream is ever open.

use crate::capability::{CameraError, CameraSource, CameraStream, FaceModels, ModelLoadError};
use crate::face::FaceAnalysisAdapter;
use crate::models::ModelService;
use crate::types::{FaceOutcome, NoFaceReason};
use image::RgbImage;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanPhase {
    ModelLoading,
    CameraReady,
    Capturing,
    Analyzing,
    Complete,
    UploadFallback,
    /// The user navigated back; the scan is abandoned.
    Cancelled,
}

/// Why the scan is in `UploadFallback`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FallbackCause {
    #[error("models unavailable: {0}")]
    ModelLoad(ModelLoadError),
    #[error("camera unavailable: {0}")]
    Camera(CameraError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("cannot {action} while in {phase:?}")]
    InvalidTransition { phase: ScanPhase, action: &'static str },
    #[error(transparent)]
    Camera(#[from] CameraError),
}

#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Upper bound on a single face analysis.
    pub analysis_timeout: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            analysis_timeout: Duration::from_secs(10),
        }
    }
}

/// Owns a live stream and stops it when released or dropped.
struct StreamGuard<S: CameraStream> {
    stream: S,
}

impl<S: CameraStream> StreamGuard<S> {
    fn is_active(&self) -> bool {
        self.stream.is_active()
    }

    fn release(mut self) {
        self.stream.stop();
    }
}

impl<S: CameraStream> Drop for StreamGuard<S> {
    fn drop(&mut self) {
        if self.stream.is_active() {
            self.stream.stop();
        }
    }
}

/// State machine for one face scan. Borrows the process-wide model service.
pub struct ScanController<'a, M: FaceModels, C: CameraSource> {
    id: Uuid,
    phase: ScanPhase,
    history: Vec<ScanPhase>,
    models: &'a mut ModelService<M>,
    camera: C,
    stream: Option<StreamGuard<C::Stream>>,
    adapter: FaceAnalysisAdapter,
    actual_age: u32,
    fallback: Option<FallbackCause>,
    outcome: Option<FaceOutcome>,
}

impl<'a, M: FaceModels, C: CameraSource> ScanController<'a, M, C> {
    pub fn new(models: &'a mut ModelService<M>, camera: C, actual_age: u32, config: &ScanConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            phase: ScanPhase::ModelLoading,
            history: vec![ScanPhase::ModelLoading],
            models,
            camera,
            stream: None,
            adapter: FaceAnalysisAdapter::new(config.analysis_timeout),
            actual_age,
            fallback: None,
            outcome: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> ScanPhase {
        self.phase
    }

    /// Every phase entered so far, in order.
    pub fn history(&self) -> &[ScanPhase] {
        &self.history
    }

    pub fn fallback_cause(&self) -> Option<&FallbackCause> {
        self.fallback.as_ref()
    }

    pub fn outcome(&self) -> Option<&FaceOutcome> {
        self.outcome.as_ref()
    }

    pub fn has_active_stream(&self) -> bool {
        self.stream.as_ref().is_some_and(|guard| guard.is_active())
    }

    /// Model load progress, 0–100.
    pub fn load_progress(&self) -> watch::Receiver<u8> {
        self.models.progress().subscribe()
    }

    pub fn camera(&self) -> &C {
        &self.camera
    }

    /// Load the models and open the camera.
    pub async fn start(&mut self) -> Result<ScanPhase, ScanError> {
        self.expect(&[ScanPhase::ModelLoading], "start")?;
        self.load_models_then_camera().await;
        Ok(self.phase)
    }

    /// Re-attempt model loading (if needed) and camera acquisition.
    pub async fn retry_camera(&mut self) -> Result<ScanPhase, ScanError> {
        self.expect(&[ScanPhase::UploadFallback], "retry the camera")?;
        self.fallback = None;
        self.load_models_then_camera().await;
        Ok(self.phase)
    }

    /// The live stream failed or permission was revoked while waiting.
    pub fn camera_failed(&mut self, err: CameraError) -> Result<(), ScanError> {
        self.expect(&[ScanPhase::CameraReady], "report a camera failure")?;
        self.enter_fallback(FallbackCause::Camera(err));
        Ok(())
    }

    /// Capture one still from the live stream and analyze it.
    pub async fn capture(&mut self) -> Result<FaceOutcome, ScanError> {
        self.expect(&[ScanPhase::CameraReady], "capture")?;

        let mut guard = match self.stream.take() {
            Some(guard) if guard.is_active() => guard,
            _ => {
                self.enter_fallback(FallbackCause::Camera(CameraError::StreamInactive));
                return Err(CameraError::StreamInactive.into());
            }
        };

        self.transition(ScanPhase::Capturing);
        let frame = guard.stream.capture_still().await;
        guard.release();

        match frame {
            Ok(image) => Ok(self.analyze(image).await),
            Err(err) => {
                self.enter_fallback(FallbackCause::Camera(err.clone()));
                Err(err.into())
            }
        }
    }

    /// Analyze a user-supplied image instead of a camera still.
    pub async fn submit_upload(&mut self, image: RgbImage) -> Result<FaceOutcome, ScanError> {
        self.expect(&[ScanPhase::UploadFallback, ScanPhase::CameraReady], "submit an upload")?;
        self.release_stream();
        Ok(self.analyze(image).await)
    }

    /// Abandon the scan, stopping the camera first.
    pub fn back(&mut self) -> Result<(), ScanError> {
        self.expect(
            &[ScanPhase::ModelLoading, ScanPhase::CameraReady, ScanPhase::UploadFallback],
            "go back",
        )?;
        self.release_stream();
        self.transition(ScanPhase::Cancelled);
        Ok(())
    }

    async fn load_models_then_camera(&mut self) {
        self.transition(ScanPhase::ModelLoading);
        if let Err(err) = self.models.init().await {
            self.enter_fallback(FallbackCause::ModelLoad(err));
            return;
        }

        self.transition(ScanPhase::CameraReady);
        self.release_stream();
        match self.camera.request_stream().await {
            Ok(stream) => {
                tracing::info!(session = %self.id, "camera stream open");
                self.stream = Some(StreamGuard { stream });
            }
            Err(err) => self.enter_fallback(FallbackCause::Camera(err)),
        }
    }

    async fn analyze(&mut self, image: RgbImage) -> FaceOutcome {
        self.transition(ScanPhase::Analyzing);

        let outcome = if self.models.is_ready() {
            match self
                .adapter
                .estimate_face_score(&mut *self.models, &image, self.actual_age)
                .await
            {
                Some(analysis) => FaceOutcome::Analyzed(analysis),
                None => FaceOutcome::Fallback { reason: NoFaceReason::NoFaceDetected },
            }
        } else {
            FaceOutcome::Fallback { reason: NoFaceReason::ModelsUnavailable }
        };

        if let FaceOutcome::Fallback { reason } = &outcome {
            tracing::warn!(session = %self.id, ?reason, "scan completed with fallback face score");
        }

        self.outcome = Some(outcome.clone());
        self.transition(ScanPhase::Complete);
        outcome
    }

    fn enter_fallback(&mut self, cause: FallbackCause) {
        self.release_stream();
        tracing::warn!(session = %self.id, ?cause, "falling back to upload");
        self.fallback = Some(cause);
        self.transition(ScanPhase::UploadFallback);
    }

    fn release_stream(&mut self) {
        if let Some(guard) = self.stream.take() {
            guard.release();
            tracing::debug!(session = %self.id, "camera stream stopped");
        }
    }

    fn transition(&mut self, next: ScanPhase) {
        if self.phase == next {
            return;
        }
        tracing::info!(session = %self.id, from = ?self.phase, to = ?next, "scan phase");
        self.phase = next;
        self.history.push(next);
    }

    fn expect(&self, allowed: &[ScanPhase], action: &'static str) -> Result<(), ScanError> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(ScanError::InvalidTransition { phase: self.phase, action })
        }
    }
}
