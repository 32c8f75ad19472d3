//! The calibration job runner.
//!
//! One call to [`CalibrationRunner::run`] walks a validated job through
//! `Validated → Processing(i/n) → Fitting → Persisted`, or stops in `Failed`
//! with a [`CalibrationError`]. Per-image problems are recorded and skipped;
//! nothing is written to the sink unless the fit succeeds.

use crate::collaborators::{
    CalibrationFitter, FitRequest, ImageSource, PointExtractor, ResultSink,
};
use crate::error::{CalibrationError, FitError};
use crate::options::{RunnerOptions, SizePolicy};
use crate::store::{retrieve_run, StoredRun};
use calib_jobs_core::{
    CalibrationResult, CorrespondenceSet, ImageOutcome, ImageRecord, ImageSize, JobDescriptor,
    ModelPoints, RefineParams,
};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Lifecycle of one job, used for progress logging.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobStage {
    Validated,
    Processing { current: usize, total: usize },
    Fitting,
    Persisted,
    Failed,
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validated => f.write_str("validated"),
            Self::Processing { current, total } => write!(f, "processing {current}/{total}"),
            Self::Fitting => f.write_str("fitting"),
            Self::Persisted => f.write_str("persisted"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// Output of a successful job.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CalibrationRun {
    pub run_id: String,
    pub result: CalibrationResult,
    /// One record per input image, in input order.
    pub images: Vec<ImageRecord>,
}

impl CalibrationRun {
    /// Images that did not contribute a view, in input order.
    pub fn skipped(&self) -> impl Iterator<Item = &ImageRecord> + '_ {
        self.images
            .iter()
            .filter(|record| !record.status.is_processed())
    }
}

/// Orchestrates fetch → decode → detect → fit → persist for calibration jobs.
///
/// The runner holds no per-job state, so a single instance can execute
/// jobs for different run identifiers concurrently.
#[derive(Clone)]
pub struct CalibrationRunner {
    source: Arc<dyn ImageSource>,
    extractor: Arc<dyn PointExtractor>,
    fitter: Arc<dyn CalibrationFitter>,
    sink: Arc<dyn ResultSink>,
    options: RunnerOptions,
}

impl CalibrationRunner {
    pub fn new(
        source: Arc<dyn ImageSource>,
        extractor: Arc<dyn PointExtractor>,
        fitter: Arc<dyn CalibrationFitter>,
        sink: Arc<dyn ResultSink>,
    ) -> Self {
        Self {
            source,
            extractor,
            fitter,
            sink,
            options: RunnerOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RunnerOptions) -> Self {
        self.options = options;
        self
    }

    #[inline]
    pub fn options(&self) -> &RunnerOptions {
        &self.options
    }

    /// Parse, validate and run a JSON job payload.
    pub fn run_payload(&self, raw: &str) -> Result<CalibrationRun, CalibrationError> {
        let job = JobDescriptor::from_json(raw).map_err(|err| {
            log::warn!("rejected job payload: {err}");
            err
        })?;
        self.run(&job)
    }

    /// Run a validated job to completion.
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "info",
            skip(self, job),
            fields(run_id = job.run_id(), images = job.images().len())
        )
    )]
    pub fn run(&self, job: &JobDescriptor) -> Result<CalibrationRun, CalibrationError> {
        let run_id = job.run_id();
        log_stage(run_id, JobStage::Validated);
        log::info!(
            "run `{run_id}`: {} images from `{}`, board {}",
            job.images().len(),
            job.dataset(),
            job.board()
        );

        let set = self.collect_views(job);
        let outcome = self
            .fit_views(job, &set)
            .and_then(|result| self.persist(job, &result).map(|_| result));

        match outcome {
            Ok(result) => {
                log_stage(run_id, JobStage::Persisted);
                log::info!(
                    "run `{run_id}`: calibration finished ({}/{} images used)",
                    result.processed_images,
                    result.total_images
                );
                let run = CalibrationRun {
                    run_id: run_id.to_string(),
                    result,
                    images: set.into_records(),
                };
                for record in run.skipped() {
                    log::debug!("run `{run_id}`: skipped {} ({:?})", record.image, record.status);
                }
                Ok(run)
            }
            Err(err) => {
                log_stage(run_id, JobStage::Failed);
                log::error!("run `{run_id}`: {err} ({:?} fault)", err.fault());
                Err(err)
            }
        }
    }

    /// Look up a previously persisted run.
    pub fn retrieve(&self, run_id: &str) -> Result<StoredRun, CalibrationError> {
        retrieve_run(self.sink.as_ref(), run_id)
    }

    fn collect_views(&self, job: &JobDescriptor) -> CorrespondenceSet {
        let mut set = CorrespondenceSet::new(ModelPoints::new(job.board()));
        let refine = RefineParams {
            half_window: self.options.refine_half_window,
            criteria: job.criteria(),
        };
        let total = job.images().len();

        for (idx, name) in job.images().iter().enumerate() {
            log::debug!(
                "run `{}`: {}",
                job.run_id(),
                JobStage::Processing {
                    current: idx + 1,
                    total
                }
            );
            let outcome = self.process_image(job, name, &refine, &mut set);
            log_outcome(job, name, &outcome);
            set.record(name, outcome);
        }
        set
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, job, refine, set), fields(run_id = job.run_id()))
    )]
    fn process_image(
        &self,
        job: &JobDescriptor,
        name: &str,
        refine: &RefineParams,
        set: &mut CorrespondenceSet,
    ) -> ImageOutcome {
        let key = job.image_key(name);
        let bytes = match self.source.fetch(&key) {
            Ok(bytes) => bytes,
            Err(err) => return ImageOutcome::FetchFailed(err.to_string()),
        };

        let gray = match image::load_from_memory(&bytes) {
            Ok(decoded) => decoded.to_luma8(),
            Err(err) => {
                log::debug!("decode `{key}`: {err}");
                return ImageOutcome::DecodeFailed;
            }
        };
        let size = ImageSize::new(gray.width(), gray.height());

        match self.options.size_policy {
            SizePolicy::LastDecoded => set.set_image_size(size),
            SizePolicy::Strict => {
                if let Some(expected) = set.image_size() {
                    if expected != size {
                        return ImageOutcome::SizeMismatch {
                            expected,
                            actual: size,
                        };
                    }
                }
            }
        }

        let board = job.board();
        let Some(mut corners) = self.extractor.detect_corners(&gray, board) else {
            return ImageOutcome::CornersNotFound;
        };
        if corners.len() != set.model().len() {
            log::warn!(
                "extractor returned {} corners for a {board} board in `{key}`",
                corners.len()
            );
            return ImageOutcome::CornersNotFound;
        }
        self.extractor.refine_corners(&gray, &mut corners, refine);

        if set.image_size().is_none() {
            set.set_image_size(size);
        }
        ImageOutcome::Processed(corners)
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, job, set), fields(run_id = job.run_id(), views = set.processed()))
    )]
    fn fit_views(
        &self,
        job: &JobDescriptor,
        set: &CorrespondenceSet,
    ) -> Result<CalibrationResult, CalibrationError> {
        let processed = set.processed();
        let total = job.images().len();
        let image_size = set
            .image_size()
            .filter(|_| processed >= self.options.min_processed());
        let Some(image_size) = image_size else {
            return Err(CalibrationError::InsufficientData { processed, total });
        };

        log_stage(job.run_id(), JobStage::Fitting);
        let fit = self.fitter.fit(&FitRequest {
            views: set.views(),
            image_size,
            initial: None,
        })?;

        let result = CalibrationResult::new(&fit.camera_matrix, fit.dist, processed, total);
        if !result.is_finite() {
            return Err(FitError::NonFinite.into());
        }
        Ok(result)
    }

    fn persist(
        &self,
        job: &JobDescriptor,
        result: &CalibrationResult,
    ) -> Result<(), CalibrationError> {
        let run_id = job.run_id();
        self.sink.save_metadata(run_id, job.metadata())?;
        self.sink.save_result(run_id, result)?;
        Ok(())
    }
}

impl fmt::Debug for CalibrationRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CalibrationRunner")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

fn log_stage(run_id: &str, stage: JobStage) {
    log::info!("run `{run_id}`: {stage}");
}

fn log_outcome(job: &JobDescriptor, name: &str, outcome: &ImageOutcome) {
    let run_id = job.run_id();
    let dataset = job.dataset();
    match outcome {
        ImageOutcome::Processed(corners) => {
            log::info!(
                "run `{run_id}`: {dataset}/{name}: {} corners",
                corners.len()
            )
        }
        ImageOutcome::FetchFailed(reason) => {
            log::warn!("run `{run_id}`: {dataset}/{name}: fetch failed: {reason}")
        }
        ImageOutcome::DecodeFailed => {
            log::warn!("run `{run_id}`: {dataset}/{name}: could not decode image")
        }
        ImageOutcome::CornersNotFound => {
            log::warn!("run `{run_id}`: {dataset}/{name}: no checkerboard corners found")
        }
        ImageOutcome::SizeMismatch { expected, actual } => {
            log::warn!("run `{run_id}`: {dataset}/{name}: size {actual} differs from {expected}")
        }
    }
}
