//! Wire payload of a calibration job and its validated form.
//!
//! The envelope (`metadata` + `images`) is a fixed contract: any other
//! top-level key is rejected. The `metadata` object may grow; unknown keys
//! inside it are kept verbatim and written back with the audit copy.

use crate::board::{BoardSize, TermCriteria};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Reasons a job payload is rejected before any I/O happens.
#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("malformed job payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("`{field}` must not be empty")]
    Empty { field: String },
    #[error("invalid `{field}`: {reason}")]
    Invalid { field: String, reason: String },
}

impl ValidationError {
    fn empty(field: impl Into<String>) -> Self {
        Self::Empty {
            field: field.into(),
        }
    }

    fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Offending field path, when the failure is tied to one field.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Malformed(_) => None,
            Self::Empty { field } | Self::Invalid { field, .. } => Some(field),
        }
    }
}

/// Raw job envelope as it arrives over HTTP or a queue.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobPayload {
    pub metadata: RawMetadata,
    pub images: Vec<String>,
}

/// `metadata` object before numeric fields are range-checked.
#[derive(Debug, Clone, Deserialize)]
pub struct RawMetadata {
    pub run_id: String,
    pub dataset: String,
    pub checkerboard_size: Vec<Number>,
    #[serde(default)]
    pub calibration_accuracy: Option<f64>,
    #[serde(default)]
    pub iterations: Option<Number>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Normalized job metadata, persisted as `{run_id}/metadata.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobMetadata {
    pub run_id: String,
    pub dataset: String,
    pub checkerboard_size: [u32; 2],
    #[serde(default = "default_accuracy")]
    pub calibration_accuracy: f64,
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    /// Producer-defined keys, carried through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_accuracy() -> f64 {
    TermCriteria::DEFAULT_EPSILON
}

fn default_iterations() -> u32 {
    TermCriteria::DEFAULT_MAX_ITERATIONS
}

impl JobMetadata {
    /// Metadata with default convergence settings and no extra keys.
    pub fn new(run_id: impl Into<String>, dataset: impl Into<String>, board: BoardSize) -> Self {
        Self {
            run_id: run_id.into(),
            dataset: dataset.into(),
            checkerboard_size: [board.width, board.height],
            calibration_accuracy: default_accuracy(),
            iterations: default_iterations(),
            extra: Map::new(),
        }
    }
}

impl TryFrom<RawMetadata> for JobMetadata {
    type Error = ValidationError;

    fn try_from(raw: RawMetadata) -> Result<Self, Self::Error> {
        let [w, h] = raw.checkerboard_size.as_slice() else {
            return Err(ValidationError::invalid(
                SIZE_FIELD,
                format!(
                    "expected [width, height], got {} values",
                    raw.checkerboard_size.len()
                ),
            ));
        };
        let width = positive_u32(w).ok_or_else(|| {
            ValidationError::invalid(SIZE_FIELD, format!("width must be a positive integer, got {w}"))
        })?;
        let height = positive_u32(h).ok_or_else(|| {
            ValidationError::invalid(SIZE_FIELD, format!("height must be a positive integer, got {h}"))
        })?;

        let iterations = match raw.iterations {
            None => default_iterations(),
            Some(n) => positive_u32(&n).ok_or_else(|| {
                ValidationError::invalid(
                    "metadata.iterations",
                    format!("must be a positive integer, got {n}"),
                )
            })?,
        };

        Ok(Self {
            run_id: raw.run_id,
            dataset: raw.dataset,
            checkerboard_size: [width, height],
            calibration_accuracy: raw.calibration_accuracy.unwrap_or_else(default_accuracy),
            iterations,
            extra: raw.extra,
        })
    }
}

const SIZE_FIELD: &str = "metadata.checkerboard_size";

fn positive_u32(n: &Number) -> Option<u32> {
    n.as_u64()
        .and_then(|v| u32::try_from(v).ok())
        .filter(|&v| v > 0)
}

/// A validated calibration request.
#[derive(Debug, Clone, PartialEq)]
pub struct JobDescriptor {
    metadata: JobMetadata,
    board: BoardSize,
    criteria: TermCriteria,
    images: Vec<String>,
}

impl JobDescriptor {
    /// Validate metadata and an image list into a descriptor.
    pub fn new(metadata: JobMetadata, images: Vec<String>) -> Result<Self, ValidationError> {
        validate_key_prefix("metadata.run_id", &metadata.run_id, false)?;
        validate_key_prefix("metadata.dataset", &metadata.dataset, true)?;

        let [width, height] = metadata.checkerboard_size;
        if width == 0 || height == 0 {
            return Err(ValidationError::invalid(
                "metadata.checkerboard_size",
                format!("both dimensions must be positive, got [{width}, {height}]"),
            ));
        }
        if !metadata.calibration_accuracy.is_finite() || metadata.calibration_accuracy <= 0.0 {
            return Err(ValidationError::invalid(
                "metadata.calibration_accuracy",
                format!(
                    "must be a positive finite number, got {}",
                    metadata.calibration_accuracy
                ),
            ));
        }
        if metadata.iterations == 0 {
            return Err(ValidationError::invalid(
                "metadata.iterations",
                "must be a positive integer, got 0",
            ));
        }

        if images.is_empty() {
            return Err(ValidationError::empty("images"));
        }
        if let Some(idx) = images.iter().position(|name| name.trim().is_empty()) {
            return Err(ValidationError::empty(format!("images[{idx}]")));
        }

        Ok(Self {
            board: BoardSize::new(width, height),
            criteria: TermCriteria {
                epsilon: metadata.calibration_accuracy,
                max_iterations: metadata.iterations,
            },
            metadata,
            images,
        })
    }

    pub fn from_payload(payload: JobPayload) -> Result<Self, ValidationError> {
        let metadata = JobMetadata::try_from(payload.metadata)?;
        Self::new(metadata, payload.images)
    }

    /// Parse and validate a JSON job payload.
    ///
    /// Only text that is not JSON at all yields [`ValidationError::Malformed`];
    /// missing or mistyped fields are reported by path.
    pub fn from_json(raw: &str) -> Result<Self, ValidationError> {
        let value: Value = serde_json::from_str(raw)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, ValidationError> {
        check_envelope(&value)?;
        let payload: JobPayload = serde_json::from_value(value)?;
        Self::from_payload(payload)
    }

    #[inline]
    pub fn run_id(&self) -> &str {
        &self.metadata.run_id
    }

    #[inline]
    pub fn dataset(&self) -> &str {
        &self.metadata.dataset
    }

    #[inline]
    pub fn board(&self) -> BoardSize {
        self.board
    }

    #[inline]
    pub fn criteria(&self) -> TermCriteria {
        self.criteria
    }

    #[inline]
    pub fn images(&self) -> &[String] {
        &self.images
    }

    #[inline]
    pub fn metadata(&self) -> &JobMetadata {
        &self.metadata
    }

    /// Object-store key of an image inside the job's dataset.
    pub fn image_key(&self, image: &str) -> String {
        let prefix = self.metadata.dataset.trim_end_matches('/');
        if prefix.is_empty() {
            image.to_string()
        } else {
            format!("{prefix}/{image}")
        }
    }
}

/// Check a caller-supplied run identifier before it is used as a key prefix.
pub fn validate_run_id(run_id: &str) -> Result<(), ValidationError> {
    validate_key_prefix("run_id", run_id, false)
}

fn validate_key_prefix(field: &str, value: &str, allow_empty: bool) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        if allow_empty {
            return Ok(());
        }
        return Err(ValidationError::empty(field));
    }
    if value.starts_with('/') {
        return Err(ValidationError::invalid(field, "must be a relative key prefix"));
    }
    if value.contains('\\') {
        return Err(ValidationError::invalid(field, "must use `/` as the separator"));
    }
    // Dataset prefixes are joined to image names after trailing `/` is trimmed.
    let body = if allow_empty {
        value.trim_end_matches('/')
    } else {
        value
    };
    for segment in body.split('/') {
        match segment {
            "" => return Err(ValidationError::invalid(field, "must not contain empty segments")),
            "." | ".." => {
                return Err(ValidationError::invalid(
                    field,
                    format!("must not contain `{segment}` segments"),
                ))
            }
            _ => {}
        }
    }
    Ok(())
}

/// JSON type expected at a payload field.
#[derive(Clone, Copy)]
enum Shape {
    String,
    Number,
    Array,
    Object,
}

impl Shape {
    fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::String => "a string",
            Self::Number => "a number",
            Self::Array => "an array",
            Self::Object => "an object",
        }
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Look up `key` in `object`, failing with `path` when it is missing or has
/// the wrong JSON type. Optional fields may be absent or `null`.
fn typed_field<'a>(
    object: &'a Map<String, Value>,
    path: &str,
    key: &str,
    shape: Shape,
    required: bool,
) -> Result<Option<&'a Value>, ValidationError> {
    match object.get(key) {
        None | Some(Value::Null) if !required => Ok(None),
        None => Err(ValidationError::invalid(path, "is required")),
        Some(value) if shape.matches(value) => Ok(Some(value)),
        Some(value) => Err(ValidationError::invalid(
            path,
            format!("expected {}, got {}", shape.name(), kind(value)),
        )),
    }
}

/// Envelope shape checks, so type errors name the field they come from.
/// Anything that is not a JSON object is left to the deserializer.
fn check_envelope(value: &Value) -> Result<(), ValidationError> {
    let Some(envelope) = value.as_object() else {
        return Ok(());
    };
    if let Some(key) = envelope
        .keys()
        .find(|key| !matches!(key.as_str(), "metadata" | "images"))
    {
        return Err(ValidationError::invalid(key.as_str(), "unknown top-level key"));
    }

    let metadata = typed_field(envelope, "metadata", "metadata", Shape::Object, true)?
        .and_then(Value::as_object);
    if let Some(metadata) = metadata {
        typed_field(metadata, "metadata.run_id", "run_id", Shape::String, true)?;
        typed_field(metadata, "metadata.dataset", "dataset", Shape::String, true)?;
        let size = typed_field(metadata, SIZE_FIELD, "checkerboard_size", Shape::Array, true)?
            .and_then(Value::as_array);
        if let Some(bad) = size.and_then(|dims| dims.iter().find(|dim| !dim.is_number())) {
            return Err(ValidationError::invalid(
                SIZE_FIELD,
                format!("expected numbers, got {}", kind(bad)),
            ));
        }
        typed_field(
            metadata,
            "metadata.calibration_accuracy",
            "calibration_accuracy",
            Shape::Number,
            false,
        )?;
        typed_field(metadata, "metadata.iterations", "iterations", Shape::Number, false)?;
    }

    let images = typed_field(envelope, "images", "images", Shape::Array, true)?
        .and_then(Value::as_array);
    if let Some(images) = images {
        if let Some((idx, bad)) = images.iter().enumerate().find(|(_, name)| !name.is_string()) {
            return Err(ValidationError::invalid(
                format!("images[{idx}]"),
                format!("expected a string, got {}", kind(bad)),
            ));
        }
    }
    Ok(())
}
