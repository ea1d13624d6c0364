//! Model lifecycle service: load, report progress, dispose.

use crate::capability::{EstimateError, FaceModels, ModelLoadError};
use crate::types::AgeEstimate;
use image::RgbImage;
use tokio::sync::watch;

/// Progress published once loading starts, before the first bundle lands.
const LOAD_STARTED_PCT: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelStatus {
    Idle,
    Loading,
    Ready,
    Failed,
}

/// Load progress in percent, published on a watch channel.
///
/// Never decreases within a load attempt.
#[derive(Debug)]
pub struct LoadProgress {
    tx: watch::Sender<u8>,
}

impl Default for LoadProgress {
    fn default() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx }
    }
}

impl LoadProgress {
    pub fn subscribe(&self) -> watch::Receiver<u8> {
        self.tx.subscribe()
    }

    pub fn get(&self) -> u8 {
        *self.tx.borrow()
    }

    /// Raise progress to `pct` (capped at 100). Lower values are ignored.
    pub fn advance(&self, pct: u8) {
        let pct = pct.min(100);
        self.tx.send_if_modified(|current| {
            if pct > *current {
                *current = pct;
                true
            } else {
                false
            }
        });
    }

    fn restart(&self) {
        self.tx.send_replace(0);
    }
}

/// Owns the face models and their load status.
pub struct ModelService<M> {
    models: M,
    status: ModelStatus,
    progress: LoadProgress,
    last_error: Option<ModelLoadError>,
}

impl<M: FaceModels> ModelService<M> {
    pub fn new(models: M) -> Self {
        Self {
            models,
            status: ModelStatus::Idle,
            progress: LoadProgress::default(),
            last_error: None,
        }
    }

    /// Load every bundle in order. A no-op when already ready.
    ///
    /// On failure the partially loaded bundles are dropped and the status
    /// becomes `Failed`; calling `init` again starts a fresh attempt.
    pub async fn init(&mut self) -> Result<(), ModelLoadError> {
        if self.status == ModelStatus::Ready {
            return Ok(());
        }

        self.progress.restart();
        self.status = ModelStatus::Loading;
        self.last_error = None;
        self.progress.advance(LOAD_STARTED_PCT);

        let bundles = self.models.bundles().to_vec();
        let total = bundles.len();
        for (i, name) in bundles.into_iter().enumerate() {
            if let Err(err) = self.models.load_bundle(name).await {
                tracing::warn!(bundle = name, error = %err, "model bundle failed to load");
                self.models.unload();
                self.status = ModelStatus::Failed;
                self.last_error = Some(err.clone());
                return Err(err);
            }
            let pct = LOAD_STARTED_PCT as usize + (100 - LOAD_STARTED_PCT as usize) * (i + 1) / total;
            self.progress.advance(pct as u8);
            tracing::debug!(bundle = name, progress = pct, "model bundle loaded");
        }

        self.progress.advance(100);
        self.status = ModelStatus::Ready;
        tracing::info!(bundles = total, "face models ready");
        Ok(())
    }

    pub fn status(&self) -> ModelStatus {
        self.status
    }

    pub fn is_ready(&self) -> bool {
        self.status == ModelStatus::Ready
    }

    pub fn progress(&self) -> &LoadProgress {
        &self.progress
    }

    pub fn last_error(&self) -> Option<&ModelLoadError> {
        self.last_error.as_ref()
    }

    /// Unload the models and return to `Idle`.
    pub fn dispose(&mut self) {
        if self.status != ModelStatus::Idle {
            tracing::debug!(status = ?self.status, "disposing face models");
        }
        self.models.unload();
        self.status = ModelStatus::Idle;
    }

    /// Run the age estimator. Fails with `NotLoaded` unless ready.
    pub async fn estimate(&mut self, image: &RgbImage) -> Result<Option<AgeEstimate>, EstimateError> {
        if !self.is_ready() {
            return Err(EstimateError::NotLoaded);
        }
        self.models.estimate(image).await
    }

    pub fn models(&self) -> &M {
        &self.models
    }
}
