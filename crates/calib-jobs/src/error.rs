use calib_jobs_core::ValidationError;

/// Object-store and persistence failures.
#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("object `{key}` not found")]
    NotFound { key: String },
    #[error("invalid object key `{key}`")]
    InvalidKey { key: String },
    #[error("i/o error on `{key}`: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot encode or decode `{key}`: {source}")]
    Json {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Failures reported by a [`CalibrationFitter`](crate::CalibrationFitter).
#[derive(thiserror::Error, Debug)]
pub enum FitError {
    #[error("not enough views to fit a camera model (got {got}, need {needed})")]
    TooFewViews { got: usize, needed: usize },
    #[error("optimization did not converge")]
    NotConverged,
    #[error("fitter returned non-finite camera parameters")]
    NonFinite,
    #[error("{0}")]
    Solver(String),
}

/// Who is at fault for a failed job, used by transports to pick a response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fault {
    /// The caller's input must change (bad payload, unusable images).
    Client,
    /// Infrastructure failed; the same request may succeed later.
    Server,
    /// The requested run has no persisted result.
    NotFound,
}

impl Fault {
    /// HTTP-equivalent status code.
    pub fn status_code(self) -> u16 {
        match self {
            Self::Client => 400,
            Self::Server => 500,
            Self::NotFound => 404,
        }
    }
}

/// Job-level failures. Per-image problems never surface here.
#[derive(thiserror::Error, Debug)]
pub enum CalibrationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("no usable checkerboard views ({processed} of {total} images processed)")]
    InsufficientData { processed: usize, total: usize },
    #[error("camera calibration failed: {0}")]
    FitFailed(#[from] FitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("calibration results not found for run_id `{run_id}`")]
    NotFound { run_id: String },
}

impl CalibrationError {
    pub fn fault(&self) -> Fault {
        match self {
            Self::Validation(_) | Self::InsufficientData { .. } | Self::FitFailed(_) => {
                Fault::Client
            }
            Self::Storage(_) => Fault::Server,
            Self::NotFound { .. } => Fault::NotFound,
        }
    }
}
