//! Frame → feature vector extraction.
//!
//! The extractor is a collaborator behind [`FeatureExtractor`]. The bundled
//! [`ThumbnailExtractor`] downsamples the frame bilinearly and scales channels
//! into `[0, 1]`, which is enough signal for two coarse gestures.

use std::sync::Arc;

use image::{RgbImage, imageops::FilterType};
use thiserror::Error;
use tracing::{debug, info};

use crate::camera::Frame;
use crate::config::FeatureSettings;

/// Fixed-length feature vector. Clones share the same buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureVector(Arc<[f32]>);

impl FeatureVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values.into())
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<f32>> for FeatureVector {
    fn from(values: Vec<f32>) -> Self {
        Self::new(values)
    }
}

/// Failures while turning a frame into features.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractionError {
    /// The extractor has not finished loading.
    #[error("Feature extractor is not loaded yet")]
    NotLoaded,
    /// The frame has no pixels.
    #[error("Malformed frame ({width}x{height})")]
    MalformedFrame { width: u32, height: u32 },
}

/// Maps a frame to a fixed-length feature vector.
pub trait FeatureExtractor: Send + Sync {
    fn is_ready(&self) -> bool;

    /// Length of every vector this extractor produces.
    fn feature_len(&self) -> usize;

    fn extract(&self, frame: &Frame) -> Result<FeatureVector, ExtractionError>;
}

/// Bilinear thumbnail features, `width * height * 3` values.
#[derive(Debug, Clone)]
pub struct ThumbnailExtractor {
    width: u32,
    height: u32,
    loaded: bool,
}

impl ThumbnailExtractor {
    /// Create an extractor; it reports not-ready until [`Self::load`] runs.
    pub fn new(settings: &FeatureSettings) -> Self {
        Self {
            width: settings.input_width.max(1),
            height: settings.input_height.max(1),
            loaded: false,
        }
    }

    /// Warm up on a blank frame and mark the extractor ready.
    pub fn load(mut self) -> Self {
        let warm = self.features_from_image(&RgbImage::new(self.width, self.height));
        debug!("Feature extractor warm-up produced {} values", warm.len());
        self.loaded = true;
        info!(
            "Feature extractor loaded ({}x{} thumbnail, {} features)",
            self.width,
            self.height,
            self.feature_len()
        );
        self
    }

    fn features_from_image(&self, image: &RgbImage) -> FeatureVector {
        let resized = image::imageops::resize(image, self.width, self.height, FilterType::Triangle);
        resized
            .into_raw()
            .into_iter()
            .map(|channel| f32::from(channel) / 255.0)
            .collect::<Vec<_>>()
            .into()
    }
}

impl FeatureExtractor for ThumbnailExtractor {
    fn is_ready(&self) -> bool {
        self.loaded
    }

    fn feature_len(&self) -> usize {
        (self.width * self.height * 3) as usize
    }

    fn extract(&self, frame: &Frame) -> Result<FeatureVector, ExtractionError> {
        if !self.loaded {
            return Err(ExtractionError::NotLoaded);
        }
        let (width, height) = (frame.width(), frame.height());
        if width == 0 || height == 0 {
            return Err(ExtractionError::MalformedFrame { width, height });
        }
        Ok(self.features_from_image(frame.image()))
    }
}
