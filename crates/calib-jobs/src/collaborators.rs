//! Seams between the job runner and the outside world.
//!
//! The runner never touches a network client, a detector or a solver
//! directly; it is handed one implementation of each trait at construction.
//! All traits require `Send + Sync` so one runner can serve concurrent jobs.

use crate::error::{FitError, StorageError};
use calib_jobs_core::{
    BoardSize, CalibrationResult, Correspondence, ImageSize, JobMetadata, RefineParams,
};
use image::GrayImage;
use nalgebra::{Matrix3, Point2};

/// Returns the raw (still encoded) bytes of an image by object key.
pub trait ImageSource: Send + Sync {
    fn fetch(&self, key: &str) -> Result<Vec<u8>, StorageError>;
}

/// Checkerboard corner detection and sub-pixel refinement.
pub trait PointExtractor: Send + Sync {
    /// Locate the `board.corner_count()` inner corners, ordered row-major to
    /// match [`ModelPoints`](calib_jobs_core::ModelPoints). `None` when the
    /// board is not (fully) visible.
    fn detect_corners(&self, image: &GrayImage, board: BoardSize) -> Option<Vec<Point2<f32>>>;

    /// Refine detected corners in place.
    ///
    /// The default leaves corners untouched, which suits detectors that
    /// already report sub-pixel positions.
    fn refine_corners(
        &self,
        image: &GrayImage,
        corners: &mut [Point2<f32>],
        params: &RefineParams,
    ) {
        let _ = (image, corners, params);
    }
}

/// Fitted intrinsics: row-major camera matrix plus distortion coefficients.
#[derive(Clone, Debug, PartialEq)]
pub struct CameraFit {
    pub camera_matrix: Matrix3<f64>,
    /// Coefficient layout is defined by the fitter's distortion model.
    pub dist: Vec<f64>,
}

/// Input for one camera-model fit.
#[derive(Clone, Copy, Debug)]
pub struct FitRequest<'a> {
    pub views: &'a [Correspondence],
    pub image_size: ImageSize,
    /// Starting point for the optimizer; `None` asks the fitter to
    /// initialize from the data.
    pub initial: Option<&'a CameraFit>,
}

/// Camera-model fitting over accumulated correspondences.
pub trait CalibrationFitter: Send + Sync {
    fn fit(&self, request: &FitRequest<'_>) -> Result<CameraFit, FitError>;
}

/// Persists and retrieves job artifacts keyed by run identifier.
pub trait ResultSink: Send + Sync {
    fn save_metadata(&self, run_id: &str, metadata: &JobMetadata) -> Result<(), StorageError>;
    fn save_result(&self, run_id: &str, result: &CalibrationResult) -> Result<(), StorageError>;
    /// Must return [`StorageError::NotFound`] when no result was written.
    fn load_result(&self, run_id: &str) -> Result<CalibrationResult, StorageError>;
    fn load_metadata(&self, run_id: &str) -> Result<JobMetadata, StorageError>;
}
