//! Core types for checkerboard calibration jobs.
//!
//! This crate is intentionally small and free of I/O: it holds the job
//! envelope and its validation, board geometry, the shared model point set,
//! per-image outcomes and the calibration result record. Orchestration and
//! storage live in `calib-jobs`.

mod board;
mod job;
mod logger;
mod result;

pub use board::{BoardSize, ImageSize, ModelPoints, RefineParams, TermCriteria};
pub use job::{
    validate_run_id, JobDescriptor, JobMetadata, JobPayload, RawMetadata, ValidationError,
};
pub use result::{
    CalibrationResult, Correspondence, CorrespondenceSet, ImageOutcome, ImageRecord, ImageStatus,
};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_from_env, init_with_level, level_from_env, LOG_ENV};
