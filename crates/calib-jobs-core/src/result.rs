//! Per-image outcomes, accumulated correspondences and the final result.

use crate::board::{ImageSize, ModelPoints};
use nalgebra::{Matrix3, Point2, Point3};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Result of pushing one image through fetch → decode → detect → refine.
#[derive(Clone, Debug, PartialEq)]
pub enum ImageOutcome {
    /// Board found; refined corner positions in model-point order.
    Processed(Vec<Point2<f32>>),
    FetchFailed(String),
    DecodeFailed,
    CornersNotFound,
    /// Decoded resolution differs from the job's reference size
    /// (only produced under the strict size policy).
    SizeMismatch {
        expected: ImageSize,
        actual: ImageSize,
    },
}

impl ImageOutcome {
    pub fn status(&self) -> ImageStatus {
        match self {
            Self::Processed(_) => ImageStatus::Processed,
            Self::FetchFailed(_) => ImageStatus::FetchFailed,
            Self::DecodeFailed => ImageStatus::DecodeFailed,
            Self::CornersNotFound => ImageStatus::CornersNotFound,
            Self::SizeMismatch { .. } => ImageStatus::SizeMismatch,
        }
    }
}

/// Payload-free tag of an [`ImageOutcome`], kept for reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageStatus {
    Processed,
    FetchFailed,
    DecodeFailed,
    CornersNotFound,
    SizeMismatch,
}

impl ImageStatus {
    #[inline]
    pub fn is_processed(self) -> bool {
        matches!(self, Self::Processed)
    }
}

/// What happened to one image reference of a job.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub image: String,
    pub status: ImageStatus,
}

/// One detected view: the shared board model paired with its image points.
#[derive(Clone, Debug)]
pub struct Correspondence {
    pub object_points: Arc<[Point3<f32>]>,
    pub image_points: Vec<Point2<f32>>,
}

/// Collects correspondences and per-image records over one job.
#[derive(Debug)]
pub struct CorrespondenceSet {
    model: ModelPoints,
    views: Vec<Correspondence>,
    records: Vec<ImageRecord>,
    image_size: Option<ImageSize>,
}

impl CorrespondenceSet {
    pub fn new(model: ModelPoints) -> Self {
        Self {
            model,
            views: Vec::new(),
            records: Vec::new(),
            image_size: None,
        }
    }

    /// Record an image's outcome; processed images contribute a view.
    pub fn record(&mut self, image: &str, outcome: ImageOutcome) {
        let status = outcome.status();
        if let ImageOutcome::Processed(points) = outcome {
            self.views.push(Correspondence {
                object_points: self.model.shared(),
                image_points: points,
            });
        }
        self.records.push(ImageRecord {
            image: image.to_string(),
            status,
        });
    }

    pub fn set_image_size(&mut self, size: ImageSize) {
        self.image_size = Some(size);
    }

    #[inline]
    pub fn image_size(&self) -> Option<ImageSize> {
        self.image_size
    }

    #[inline]
    pub fn model(&self) -> &ModelPoints {
        &self.model
    }

    #[inline]
    pub fn views(&self) -> &[Correspondence] {
        &self.views
    }

    #[inline]
    pub fn records(&self) -> &[ImageRecord] {
        &self.records
    }

    /// Number of images that contributed a detection.
    #[inline]
    pub fn processed(&self) -> usize {
        self.views.len()
    }

    pub fn into_records(self) -> Vec<ImageRecord> {
        self.records
    }
}

/// Camera intrinsics fitted from a job's correspondences.
///
/// Persisted as `{run_id}/result.json`. `camera_matrix` is row-major.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    pub camera_matrix: [[f64; 3]; 3],
    pub dist: Vec<f64>,
    pub processed_images: usize,
    pub total_images: usize,
}

impl CalibrationResult {
    pub fn new(
        camera_matrix: &Matrix3<f64>,
        dist: Vec<f64>,
        processed_images: usize,
        total_images: usize,
    ) -> Self {
        let mut rows = [[0.0; 3]; 3];
        for (r, row) in rows.iter_mut().enumerate() {
            for (c, v) in row.iter_mut().enumerate() {
                *v = camera_matrix[(r, c)];
            }
        }
        Self {
            camera_matrix: rows,
            dist,
            processed_images,
            total_images,
        }
    }

    pub fn camera_matrix(&self) -> Matrix3<f64> {
        let m = &self.camera_matrix;
        Matrix3::new(
            m[0][0], m[0][1], m[0][2], //
            m[1][0], m[1][1], m[1][2], //
            m[2][0], m[2][1], m[2][2],
        )
    }

    /// True when every matrix entry and distortion coefficient is finite.
    pub fn is_finite(&self) -> bool {
        self.camera_matrix.iter().flatten().all(|v| v.is_finite())
            && self.dist.iter().all(|v| v.is_finite())
    }
}
