//! Process-wide storage settings, read once from the environment.

use std::collections::HashMap;
use std::fmt;

#[derive(thiserror::Error, Debug)]
pub enum SettingsError {
    #[error("missing required setting `{0}`")]
    Missing(&'static str),
    #[error("unsupported storage endpoint `{0}` (only file:// endpoints are served locally)")]
    UnsupportedEndpoint(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Object-store endpoint and credentials.
///
/// Variable names are matched case-insensitively; an exact upper-case name
/// wins over other spellings.
#[derive(Clone, PartialEq, Eq)]
pub struct StorageSettings {
    pub endpoint_url: String,
    pub access_key: String,
    pub secret_access_key: String,
    pub bucket: String,
}

impl StorageSettings {
    pub const ENDPOINT_URL: &'static str = "R2_ENDPOINT_URL";
    pub const ACCESS_KEY: &'static str = "R2_ACCESS_KEY";
    pub const SECRET_ACCESS_KEY: &'static str = "R2_SECRET_ACCESS_KEY";
    pub const BUCKET: &'static str = "R2_BUCKET";

    /// Read settings from the current process environment.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_vars(std::env::vars())
    }

    /// Read settings from an explicit variable list.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, SettingsError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut found: HashMap<String, String> = HashMap::new();
        for (key, value) in vars {
            let key = key.as_ref();
            let upper = key.to_ascii_uppercase();
            if key == upper || !found.contains_key(&upper) {
                found.insert(upper, value.into());
            }
        }

        let mut take = |name: &'static str| {
            found
                .remove(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(SettingsError::Missing(name))
        };

        Ok(Self {
            endpoint_url: take(Self::ENDPOINT_URL)?,
            access_key: take(Self::ACCESS_KEY)?,
            secret_access_key: take(Self::SECRET_ACCESS_KEY)?,
            bucket: take(Self::BUCKET)?,
        })
    }
}

impl fmt::Debug for StorageSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageSettings")
            .field("endpoint_url", &self.endpoint_url)
            .field("access_key", &"<redacted>")
            .field("secret_access_key", &"<redacted>")
            .field("bucket", &self.bucket)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FsStore;

    fn full_env() -> Vec<(&'static str, &'static str)> {
        vec![
            ("R2_ENDPOINT_URL", "file:///srv/objects"),
            ("R2_ACCESS_KEY", "AKIA0000"),
            ("R2_SECRET_ACCESS_KEY", "s3cr3t"),
            ("R2_BUCKET", "calibration"),
        ]
    }

    #[test]
    fn reads_all_settings() {
        let s = StorageSettings::from_vars(full_env()).expect("settings");
        assert_eq!(s.endpoint_url, "file:///srv/objects");
        assert_eq!(s.bucket, "calibration");
    }

    #[test]
    fn names_are_case_insensitive_with_exact_match_preferred() {
        let mut vars = vec![("r2_bucket", "lower"), ("R2_BUCKET", "upper")];
        vars.extend(full_env().into_iter().filter(|(k, _)| *k != "R2_BUCKET"));
        let s = StorageSettings::from_vars(vars).expect("settings");
        assert_eq!(s.bucket, "upper");

        let vars = full_env()
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect::<Vec<_>>();
        let s = StorageSettings::from_vars(vars).expect("settings");
        assert_eq!(s.access_key, "AKIA0000");
    }

    #[test]
    fn missing_or_blank_values_are_reported_by_name() {
        let vars = full_env()
            .into_iter()
            .map(|(k, v)| (k, if k == "R2_SECRET_ACCESS_KEY" { " " } else { v }));
        let err = StorageSettings::from_vars(vars).unwrap_err();
        assert!(matches!(err, SettingsError::Missing("R2_SECRET_ACCESS_KEY")));
    }

    #[test]
    fn debug_output_redacts_credentials() {
        let s = StorageSettings::from_vars(full_env()).expect("settings");
        let text = format!("{s:?}");
        assert!(!text.contains("s3cr3t"));
        assert!(!text.contains("AKIA0000"));
    }

    #[test]
    fn fs_store_opens_bucket_under_file_endpoint() {
        let s = StorageSettings::from_vars(full_env()).expect("settings");
        let store = FsStore::from_settings(&s).expect("file endpoint");
        assert_eq!(store.root(), std::path::Path::new("/srv/objects/calibration"));

        let mut remote = s.clone();
        remote.endpoint_url = "https://account.r2.cloudflarestorage.com".into();
        assert!(matches!(
            FsStore::from_settings(&remote),
            Err(SettingsError::UnsupportedEndpoint(_))
        ));
    }
}
