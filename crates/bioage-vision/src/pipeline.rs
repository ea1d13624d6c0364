//! Detector plus regressor, loaded one model at a time.

use crate::age::{AgeEstimator, EstimatorError, FaceAttributes};
use crate::detector::{BoundingBox, DetectorError, FaceDetector};
use crate::{AGE_MODEL_FILE, DETECTOR_MODEL_FILE};
use image::RgbImage;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VisionError {
    #[error("{0} model is not loaded")]
    NotLoaded(&'static str),
    #[error("detector: {0}")]
    Detector(#[from] DetectorError),
    #[error("age estimator: {0}")]
    Estimator(#[from] EstimatorError),
}

/// The most confident face in a still and its attributes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceReading {
    pub face: BoundingBox,
    pub attributes: FaceAttributes,
}

pub struct FacePipeline {
    model_dir: PathBuf,
    detector: Option<FaceDetector>,
    estimator: Option<AgeEstimator>,
}

impl FacePipeline {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
            detector: None,
            estimator: None,
        }
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    pub fn load_detector(&mut self) -> Result<(), DetectorError> {
        if self.detector.is_none() {
            self.detector = Some(FaceDetector::load(&self.model_dir.join(DETECTOR_MODEL_FILE))?);
        }
        Ok(())
    }

    pub fn load_estimator(&mut self) -> Result<(), EstimatorError> {
        if self.estimator.is_none() {
            self.estimator = Some(AgeEstimator::load(&self.model_dir.join(AGE_MODEL_FILE))?);
        }
        Ok(())
    }

    pub fn unload(&mut self) {
        self.detector = None;
        self.estimator = None;
    }

    pub fn is_ready(&self) -> bool {
        self.detector.is_some() && self.estimator.is_some()
    }

    /// Read the most confident face, or `None` when no face is found.
    pub fn analyze(&mut self, image: &RgbImage) -> Result<Option<FaceReading>, VisionError> {
        let detector = self.detector.as_mut().ok_or(VisionError::NotLoaded("detector"))?;
        let estimator = self.estimator.as_mut().ok_or(VisionError::NotLoaded("age estimator"))?;

        let Some(face) = detector.detect(image)?.into_iter().next() else {
            tracing::debug!("no face in still");
            return Ok(None);
        };
        let attributes = estimator.estimate(image, &face)?;
        Ok(Some(FaceReading { face, attributes }))
    }
}
