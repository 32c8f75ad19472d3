//! Object-store backed image source and result sink.
//!
//! Keys are `/`-separated relative paths. Run artifacts follow the
//! `{run_id}/metadata.json` and `{run_id}/result.json` convention.

use crate::collaborators::{ImageSource, ResultSink};
use crate::error::{CalibrationError, StorageError};
use crate::settings::{SettingsError, StorageSettings};
use calib_jobs_core::{validate_run_id, CalibrationResult, JobMetadata};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tempfile::NamedTempFile;

/// Minimal key/value blob store.
pub trait ObjectStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;
    /// Create or overwrite `key`.
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError>;
}

impl<T: ObjectStore + ?Sized> ObjectStore for Arc<T> {
    fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        (**self).get(key)
    }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        (**self).put(key, bytes)
    }
}

/// In-process store, mostly for tests and local pipelines.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with_object(self, key: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(key, bytes);
        self
    }

    pub fn insert(&self, key: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.lock().insert(key.into(), bytes.into());
    }

    pub fn remove(&self, key: &str) -> Option<Vec<u8>> {
        self.lock().remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    /// Sorted snapshot of stored keys.
    pub fn keys(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ObjectStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.lock()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                key: key.to_string(),
            })
    }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.lock().insert(key.to_string(), bytes.to_vec());
        Ok(())
    }
}

impl ImageSource for MemoryStore {
    fn fetch(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.get(key)
    }
}

/// Store rooted at a local directory; each key maps to a file below `root`.
#[derive(Clone, Debug)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Open the bucket named by `settings` under a `file://` endpoint.
    pub fn from_settings(settings: &StorageSettings) -> Result<Self, SettingsError> {
        let Some(base) = settings.endpoint_url.strip_prefix("file://") else {
            return Err(SettingsError::UnsupportedEndpoint(
                settings.endpoint_url.clone(),
            ));
        };
        if base.is_empty() {
            return Err(SettingsError::UnsupportedEndpoint(
                settings.endpoint_url.clone(),
            ));
        }
        Ok(Self::new(Path::new(base).join(&settings.bucket)))
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let invalid = || StorageError::InvalidKey {
            key: key.to_string(),
        };
        if key.is_empty() || key.starts_with('/') || key.contains('\\') {
            return Err(invalid());
        }
        let mut path = self.root.clone();
        for segment in key.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                return Err(invalid());
            }
            path.push(segment);
        }
        Ok(path)
    }
}

impl ObjectStore for FsStore {
    fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(key)?;
        fs::read(&path).map_err(|source| match source.kind() {
            ErrorKind::NotFound => StorageError::NotFound {
                key: key.to_string(),
            },
            _ => StorageError::Io {
                key: key.to_string(),
                source,
            },
        })
    }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let io_err = |source: std::io::Error| StorageError::Io {
            key: key.to_string(),
            source,
        };
        let parent = path.parent().unwrap_or(self.root.as_path());
        fs::create_dir_all(parent).map_err(io_err)?;
        // Readers never observe a half-written object; the last rename wins.
        let mut staged = NamedTempFile::new_in(parent).map_err(io_err)?;
        staged.write_all(bytes).map_err(io_err)?;
        staged.persist(&path).map_err(|err| io_err(err.error))?;
        Ok(())
    }
}

impl ImageSource for FsStore {
    fn fetch(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.get(key)
    }
}

/// [`ResultSink`] writing pretty-printed JSON artifacts into an object store.
#[derive(Clone, Debug)]
pub struct RunStore<S> {
    store: S,
}

impl<S: ObjectStore> RunStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn metadata_key(run_id: &str) -> String {
        format!("{run_id}/metadata.json")
    }

    pub fn result_key(run_id: &str) -> String {
        format!("{run_id}/result.json")
    }

    #[inline]
    pub fn store(&self) -> &S {
        &self.store
    }

    fn put_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let text = serde_json::to_string_pretty(value).map_err(|source| StorageError::Json {
            key: key.to_string(),
            source,
        })?;
        self.store.put(key, text.as_bytes())
    }

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<T, StorageError> {
        let bytes = self.store.get(key)?;
        serde_json::from_slice(&bytes).map_err(|source| StorageError::Json {
            key: key.to_string(),
            source,
        })
    }
}

impl<S: ObjectStore> ResultSink for RunStore<S> {
    fn save_metadata(&self, run_id: &str, metadata: &JobMetadata) -> Result<(), StorageError> {
        self.put_json(&Self::metadata_key(run_id), metadata)
    }

    fn save_result(&self, run_id: &str, result: &CalibrationResult) -> Result<(), StorageError> {
        self.put_json(&Self::result_key(run_id), result)
    }

    fn load_result(&self, run_id: &str) -> Result<CalibrationResult, StorageError> {
        self.get_json(&Self::result_key(run_id))
    }

    fn load_metadata(&self, run_id: &str) -> Result<JobMetadata, StorageError> {
        self.get_json(&Self::metadata_key(run_id))
    }
}

/// A persisted run as returned by the retrieval surface.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StoredRun {
    pub run_id: String,
    pub result: CalibrationResult,
    /// Best effort: `None` when the audit copy is missing or unreadable.
    pub metadata: Option<JobMetadata>,
}

/// Fetch the result (and, if present, the metadata) stored for `run_id`.
///
/// A missing result is [`CalibrationError::NotFound`]; any other sink
/// failure is a storage error. Metadata problems never fail the call.
pub fn retrieve_run(sink: &dyn ResultSink, run_id: &str) -> Result<StoredRun, CalibrationError> {
    validate_run_id(run_id)?;

    let result = match sink.load_result(run_id) {
        Ok(result) => result,
        Err(err) if err.is_not_found() => {
            log::info!("run `{run_id}`: no result stored");
            return Err(CalibrationError::NotFound {
                run_id: run_id.to_string(),
            });
        }
        Err(err) => {
            log::error!("run `{run_id}`: loading result failed: {err}");
            return Err(err.into());
        }
    };

    let metadata = match sink.load_metadata(run_id) {
        Ok(metadata) => Some(metadata),
        Err(err) => {
            if !err.is_not_found() {
                log::warn!("run `{run_id}`: ignoring unreadable metadata: {err}");
            }
            None
        }
    };

    Ok(StoredRun {
        run_id: run_id.to_string(),
        result,
        metadata,
    })
}
