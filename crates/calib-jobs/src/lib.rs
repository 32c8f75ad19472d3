//! Checkerboard camera-calibration jobs.
//!
//! A job names a set of images in an object store and the inner-corner
//! dimensions of the checkerboard they show. The [`CalibrationRunner`]
//! fetches and decodes every image, detects and refines board corners,
//! pairs them with the planar model points, fits a camera model and
//! persists the result under the job's run identifier.
//!
//! Image access, corner detection, model fitting and persistence are
//! collaborators behind traits (see [`collaborators`]), so the runner can be
//! wired to any backend and tested with fakes.
//!
//! ## Quickstart
//!
//! ```no_run
//! use calib_jobs::{CalibrationRunner, FsStore, RunStore};
//! use std::sync::Arc;
//!
//! # fn wire(
//! #     extractor: Arc<dyn calib_jobs::PointExtractor>,
//! #     fitter: Arc<dyn calib_jobs::CalibrationFitter>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let objects = FsStore::new("/srv/objects/calibration");
//! let runner = CalibrationRunner::new(
//!     Arc::new(objects.clone()),
//!     extractor,
//!     fitter,
//!     Arc::new(RunStore::new(objects)),
//! );
//!
//! let payload = std::fs::read_to_string("job.json")?;
//! let run = runner.run_payload(&payload)?;
//! println!("{}", serde_json::to_string_pretty(&run.result)?);
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `calib_jobs::core`: job envelope, validation, board geometry, result types.
//! - [`collaborators`]: `ImageSource`, `PointExtractor`, `CalibrationFitter`, `ResultSink`.
//! - [`store`]: in-memory and filesystem object stores, run artifact layout, retrieval.
//! - [`grid`]: ordering grid-labelled detections into model-point order.
//! - `calib_jobs::chessboard` (feature `chessboard`): a `PointExtractor` over
//!   the `calib-targets` chessboard detector.

pub use calib_jobs_core as core;

pub mod collaborators;
pub mod grid;
pub mod store;

mod error;
mod options;
mod runner;
mod settings;

#[cfg(feature = "chessboard")]
pub mod chessboard;

pub use calib_jobs_core::{
    init_from_env, init_with_level, BoardSize, CalibrationResult, ImageOutcome, ImageRecord,
    ImageSize, ImageStatus, JobDescriptor, JobMetadata, ValidationError,
};
#[cfg(feature = "tracing")]
pub use calib_jobs_core::init_tracing;

pub use collaborators::{
    CalibrationFitter, CameraFit, FitRequest, ImageSource, PointExtractor, ResultSink,
};
pub use error::{CalibrationError, Fault, FitError, StorageError};
pub use options::{RunnerOptions, SizePolicy};
pub use runner::{CalibrationRun, CalibrationRunner, JobStage};
pub use settings::{SettingsError, StorageSettings};
pub use store::{retrieve_run, FsStore, MemoryStore, ObjectStore, RunStore, StoredRun};
