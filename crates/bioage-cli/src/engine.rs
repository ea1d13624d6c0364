//! Blocking ONNX inference and V4L2 capture on a dedicated OS thread.
//!
//! The async side talks to the thread through an `EngineHandle`; every
//! request carries a oneshot reply. Results are already expressed in
//! `bioage_core` capability types.

use bioage_core::{AgeEstimate, CameraError, EstimateError, Gender, ModelLoadError};
use bioage_hw::Camera;
use bioage_vision::{DetectorError, EstimatorError, FacePipeline, VisionError};
use image::RgbImage;
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// Bundle names in load order.
pub const DETECTOR_BUNDLE: &str = "detector";
pub const AGE_BUNDLE: &str = "age_gender";

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[from] std::io::Error),
}

enum EngineRequest {
    LoadBundle {
        name: &'static str,
        reply: oneshot::Sender<Result<(), ModelLoadError>>,
    },
    Unload,
    Analyze {
        image: RgbImage,
        reply: oneshot::Sender<Result<Option<AgeEstimate>, EstimateError>>,
    },
    OpenCamera {
        device: String,
        reply: oneshot::Sender<Result<(), CameraError>>,
    },
    Capture {
        warmup: usize,
        reply: oneshot::Sender<Result<RgbImage, CameraError>>,
    },
    CloseCamera,
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::UnboundedSender<EngineRequest>,
}

impl EngineHandle {
    pub async fn load_bundle(&self, name: &'static str) -> Result<(), ModelLoadError> {
        let gone = || ModelLoadError::Failed {
            bundle: name.to_string(),
            reason: "engine thread exited".into(),
        };
        let (reply, rx) = oneshot::channel();
        self.tx.send(EngineRequest::LoadBundle { name, reply }).map_err(|_| gone())?;
        rx.await.map_err(|_| gone())?
    }

    pub fn unload(&self) {
        let _ = self.tx.send(EngineRequest::Unload);
    }

    pub async fn analyze(&self, image: RgbImage) -> Result<Option<AgeEstimate>, EstimateError> {
        let gone = || EstimateError::Inference("engine thread exited".into());
        let (reply, rx) = oneshot::channel();
        self.tx.send(EngineRequest::Analyze { image, reply }).map_err(|_| gone())?;
        rx.await.map_err(|_| gone())?
    }

    pub async fn open_camera(&self, device: &str) -> Result<(), CameraError> {
        let gone = || CameraError::CaptureFailed("engine thread exited".into());
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::OpenCamera { device: device.to_string(), reply })
            .map_err(|_| gone())?;
        rx.await.map_err(|_| gone())?
    }

    pub async fn capture(&self, warmup: usize) -> Result<RgbImage, CameraError> {
        let gone = || CameraError::CaptureFailed("engine thread exited".into());
        let (reply, rx) = oneshot::channel();
        self.tx.send(EngineRequest::Capture { warmup, reply }).map_err(|_| gone())?;
        rx.await.map_err(|_| gone())?
    }

    pub fn close_camera(&self) {
        let _ = self.tx.send(EngineRequest::CloseCamera);
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// Nothing is loaded up front: bundles and the camera are opened on request
/// so the scan controller can report progress and fall back per resource.
/// The thread exits when every handle is dropped.
pub fn spawn_engine(model_dir: PathBuf) -> Result<EngineHandle, EngineError> {
    let (tx, mut rx) = mpsc::unbounded_channel::<EngineRequest>();

    std::thread::Builder::new().name("bioage-engine".into()).spawn(move || {
        tracing::debug!(model_dir = %model_dir.display(), "engine thread started");
        let mut pipeline = FacePipeline::new(model_dir);
        let mut camera: Option<Camera> = None;

        while let Some(req) = rx.blocking_recv() {
            match req {
                EngineRequest::LoadBundle { name, reply } => {
                    let _ = reply.send(load_bundle(&mut pipeline, name));
                }
                EngineRequest::Unload => pipeline.unload(),
                EngineRequest::Analyze { image, reply } => {
                    let _ = reply.send(analyze(&mut pipeline, &image));
                }
                EngineRequest::OpenCamera { device, reply } => {
                    camera = None;
                    let result = Camera::open(&device).map(|cam| camera = Some(cam)).map_err(camera_error);
                    let _ = reply.send(result);
                }
                EngineRequest::Capture { warmup, reply } => {
                    let result = match &camera {
                        Some(cam) => capture(cam, warmup),
                        None => Err(CameraError::StreamInactive),
                    };
                    let _ = reply.send(result);
                }
                EngineRequest::CloseCamera => {
                    if camera.take().is_some() {
                        tracing::debug!("camera closed");
                    }
                }
            }
        }
        tracing::debug!("engine thread exiting");
    })?;

    Ok(EngineHandle { tx })
}

fn load_bundle(pipeline: &mut FacePipeline, name: &'static str) -> Result<(), ModelLoadError> {
    let loaded = match name {
        DETECTOR_BUNDLE => pipeline.load_detector().map_err(|e| detector_load_error(name, e)),
        AGE_BUNDLE => pipeline.load_estimator().map_err(|e| estimator_load_error(name, e)),
        other => Err(ModelLoadError::Failed {
            bundle: other.to_string(),
            reason: "unknown bundle".into(),
        }),
    };
    if loaded.is_ok() {
        tracing::debug!(bundle = name, "bundle loaded");
    }
    loaded
}

fn analyze(pipeline: &mut FacePipeline, image: &RgbImage) -> Result<Option<AgeEstimate>, EstimateError> {
    let reading = pipeline.analyze(image).map_err(|e| match e {
        VisionError::NotLoaded(_) => EstimateError::NotLoaded,
        other => EstimateError::Inference(other.to_string()),
    })?;

    Ok(reading.map(|r| AgeEstimate {
        age: r.attributes.age,
        gender: if r.attributes.is_male { Gender::Male } else { Gender::Female },
        gender_probability: r.attributes.gender_probability,
    }))
}

fn capture(camera: &Camera, warmup: usize) -> Result<RgbImage, CameraError> {
    let frame = camera.capture_still(warmup).map_err(camera_error)?;
    frame
        .into_image()
        .map_err(|e| CameraError::CaptureFailed(e.to_string()))
}

fn detector_load_error(bundle: &str, err: DetectorError) -> ModelLoadError {
    match err {
        DetectorError::ModelNotFound(path) => ModelLoadError::NotFound { bundle: bundle.to_string(), path },
        other => ModelLoadError::Failed { bundle: bundle.to_string(), reason: other.to_string() },
    }
}

fn estimator_load_error(bundle: &str, err: EstimatorError) -> ModelLoadError {
    match err {
        EstimatorError::ModelNotFound(path) => ModelLoadError::NotFound { bundle: bundle.to_string(), path },
        other => ModelLoadError::Failed { bundle: bundle.to_string(), reason: other.to_string() },
    }
}

/// Collapse V4L2 failures into the camera failure classes of a scan.
pub fn camera_error(err: bioage_hw::CameraError) -> CameraError {
    use bioage_hw::CameraError as Hw;
    match err {
        Hw::PermissionDenied(detail) => CameraError::PermissionDenied(detail),
        Hw::DeviceNotFound(detail) | Hw::CaptureNotSupported(detail) => CameraError::NotFound(detail),
        Hw::DeviceBusy(detail) => CameraError::Busy(detail),
        other => CameraError::CaptureFailed(other.to_string()),
    }
}
