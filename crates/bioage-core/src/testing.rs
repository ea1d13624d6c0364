//! In-memory fakes of the model and camera capabilities.

use crate::capability::{CameraError, CameraSource, CameraStream, EstimateError, FaceModels, ModelLoadError};
use crate::types::{AgeEstimate, Gender};
use image::RgbImage;
use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

pub const FAKE_BUNDLES: [&str; 3] = ["detector", "landmarks", "age_gender"];

#[derive(Debug, Clone, Copy)]
pub enum FakeEstimate {
    Age(f32),
    NoFace,
    Error,
    Hang,
}

pub struct FakeModels {
    pub fail_on: Option<&'static str>,
    pub loaded: Vec<&'static str>,
    pub load_calls: usize,
    pub estimate: FakeEstimate,
    pub estimate_calls: usize,
}

impl FakeModels {
    pub fn ready(age: f32) -> Self {
        Self::with_estimate(FakeEstimate::Age(age))
    }

    pub fn with_estimate(estimate: FakeEstimate) -> Self {
        Self {
            fail_on: None,
            loaded: Vec::new(),
            load_calls: 0,
            estimate,
            estimate_calls: 0,
        }
    }

    pub fn failing_on(bundle: &'static str) -> Self {
        Self {
            fail_on: Some(bundle),
            ..Self::ready(30.0)
        }
    }
}

impl FaceModels for FakeModels {
    fn bundles(&self) -> &[&'static str] {
        &FAKE_BUNDLES
    }

    async fn load_bundle(&mut self, name: &'static str) -> Result<(), ModelLoadError> {
        self.load_calls += 1;
        if self.fail_on == Some(name) {
            return Err(ModelLoadError::Failed {
                bundle: name.to_string(),
                reason: "fetch failed".into(),
            });
        }
        self.loaded.push(name);
        Ok(())
    }

    fn unload(&mut self) {
        self.loaded.clear();
    }

    async fn estimate(&mut self, _image: &RgbImage) -> Result<Option<AgeEstimate>, EstimateError> {
        self.estimate_calls += 1;
        match self.estimate {
            FakeEstimate::Age(age) => Ok(Some(AgeEstimate {
                age,
                gender: Gender::Male,
                gender_probability: 0.8,
            })),
            FakeEstimate::NoFace => Ok(None),
            FakeEstimate::Error => Err(EstimateError::Inference("backend crashed".into())),
            FakeEstimate::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(None)
            }
        }
    }
}

/// Camera whose streams share a live-track counter with the test.
pub struct FakeCamera {
    pub tracks: Tracks,
    pub deny: Option<CameraError>,
    /// How many requests are denied before the camera starts working.
    pub denials: usize,
    pub capture_fails: bool,
    pub requests: usize,
}

/// Live and peak track counts shared between a camera and its streams.
#[derive(Clone, Default)]
pub struct Tracks {
    live: Rc<Cell<usize>>,
    peak: Rc<Cell<usize>>,
}

impl Tracks {
    pub fn live(&self) -> usize {
        self.live.get()
    }

    pub fn peak(&self) -> usize {
        self.peak.get()
    }

    fn open(&self) {
        self.live.set(self.live.get() + 1);
        self.peak.set(self.peak.get().max(self.live.get()));
    }

    fn close(&self) {
        self.live.set(self.live.get() - 1);
    }
}

impl FakeCamera {
    pub fn working() -> Self {
        Self {
            tracks: Tracks::default(),
            deny: None,
            denials: 0,
            capture_fails: false,
            requests: 0,
        }
    }

    pub fn denied() -> Self {
        Self::denied_times(usize::MAX)
    }

    pub fn denied_times(denials: usize) -> Self {
        Self {
            deny: Some(CameraError::PermissionDenied("user dismissed prompt".into())),
            denials,
            ..Self::working()
        }
    }

    pub fn failing_capture() -> Self {
        Self {
            capture_fails: true,
            ..Self::working()
        }
    }
}

impl CameraSource for FakeCamera {
    type Stream = FakeStream;

    async fn request_stream(&mut self) -> Result<FakeStream, CameraError> {
        self.requests += 1;
        if let Some(err) = &self.deny {
            if self.denials > 0 {
                self.denials -= 1;
                return Err(err.clone());
            }
        }
        self.tracks.open();
        Ok(FakeStream {
            active: true,
            tracks: self.tracks.clone(),
            capture_fails: self.capture_fails,
        })
    }
}

pub struct FakeStream {
    active: bool,
    tracks: Tracks,
    capture_fails: bool,
}

impl CameraStream for FakeStream {
    fn is_active(&self) -> bool {
        self.active
    }

    async fn capture_still(&mut self) -> Result<RgbImage, CameraError> {
        if !self.active {
            return Err(CameraError::StreamInactive);
        }
        if self.capture_fails {
            return Err(CameraError::CaptureFailed("track ended".into()));
        }
        Ok(RgbImage::new(8, 8))
    }

    fn stop(&mut self) {
        if self.active {
            self.active = false;
            self.tracks.close();
        }
    }
}
