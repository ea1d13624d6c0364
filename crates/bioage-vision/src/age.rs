//! InsightFace gender/age regressor via ONNX Runtime.
//!
//! Input is a 96×96 RGB crop with raw pixel values. Output is three floats:
//! female logit, male logit, and age divided by 100.

use crate::crop::{crop_face, CropWindow};
use crate::detector::BoundingBox;
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

const AGE_INPUT_SIZE: u32 = 96;
const AGE_MEAN: f32 = 0.0;
const AGE_STD: f32 = 1.0;
const AGE_SCALE: f32 = 100.0;

#[derive(Error, Debug)]
pub enum EstimatorError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("unexpected output length {0}, expected 3")]
    BadOutput(usize),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Regressor output for one face.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FaceAttributes {
    /// Apparent age in years, unrounded.
    pub age: f32,
    pub is_male: bool,
    /// Softmax probability of the chosen gender.
    pub gender_probability: f32,
}

pub struct AgeEstimator {
    session: Session,
}

impl AgeEstimator {
    pub fn load(model_path: &Path) -> Result<Self, EstimatorError> {
        if !model_path.exists() {
            return Err(EstimatorError::ModelNotFound(model_path.display().to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = %model_path.display(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded genderage model"
        );

        Ok(Self { session })
    }

    /// Estimate age and gender for a detected face.
    pub fn estimate(&mut self, image: &RgbImage, face: &BoundingBox) -> Result<FaceAttributes, EstimatorError> {
        let window = CropWindow::around(face, AGE_INPUT_SIZE);
        let crop = crop_face(image, &window, AGE_INPUT_SIZE);
        let input = preprocess(&crop);

        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;
        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EstimatorError::InferenceFailed(e.to_string()))?;

        let attributes = decode(raw)?;
        tracing::debug!(age = attributes.age, male = attributes.is_male, "age estimated");
        Ok(attributes)
    }
}

fn preprocess(crop: &RgbImage) -> Array4<f32> {
    let side = AGE_INPUT_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, side, side));
    for (x, y, pixel) in crop.enumerate_pixels() {
        for channel in 0..3 {
            tensor[[0, channel, y as usize, x as usize]] = (pixel[channel] as f32 - AGE_MEAN) / AGE_STD;
        }
    }
    tensor
}

/// Turn `[female, male, age / 100]` into attributes.
fn decode(raw: &[f32]) -> Result<FaceAttributes, EstimatorError> {
    let &[female, male, age] = raw else {
        return Err(EstimatorError::BadOutput(raw.len()));
    };

    let is_male = male > female;
    let (winner, loser) = if is_male { (male, female) } else { (female, male) };
    let gender_probability = 1.0 / (1.0 + (loser - winner).exp());

    Ok(FaceAttributes {
        age: age * AGE_SCALE,
        is_male,
        gender_probability,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_age_and_gender() {
        let attrs = decode(&[0.2, 1.4, 0.283]).unwrap();
        assert!((attrs.age - 28.3).abs() < 1e-4);
        assert!(attrs.is_male);
        assert!(attrs.gender_probability > 0.5 && attrs.gender_probability < 1.0);

        let attrs = decode(&[2.0, -1.0, 0.5]).unwrap();
        assert!(!attrs.is_male);
        assert!((attrs.gender_probability - 1.0 / (1.0 + (-3.0f32).exp())).abs() < 1e-6);
    }

    #[test]
    fn test_decode_tie_is_female_at_half() {
        let attrs = decode(&[0.0, 0.0, 0.4]).unwrap();
        assert!(!attrs.is_male);
        assert!((attrs.gender_probability - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        assert!(matches!(decode(&[0.1, 0.2]), Err(EstimatorError::BadOutput(2))));
        assert!(matches!(decode(&[0.0; 5]), Err(EstimatorError::BadOutput(5))));
    }

    #[test]
    fn test_preprocess_keeps_raw_pixels() {
        let crop = RgbImage::from_pixel(96, 96, image::Rgb([10, 20, 30]));
        let tensor = preprocess(&crop);
        assert_eq!(tensor.shape(), &[1, 3, 96, 96]);
        assert_eq!(tensor[[0, 0, 5, 5]], 10.0);
        assert_eq!(tensor[[0, 2, 95, 0]], 30.0);
    }
}
