//! Named settings profiles, one JSON file per profile under a directory.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use serde_json::Value;
use tokio::fs;

use crate::{
    error::AppError,
    settings::{JsonSettingsStore, Settings, write_private},
};

const PROFILE_EXTENSION: &str = "json";

#[derive(Clone, Debug)]
pub struct ProfileStore {
    dir: PathBuf,
}

impl ProfileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Profile names in lexical order. A missing directory lists as empty.
    pub async fn list(&self) -> Result<Vec<String>, AppError> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(PROFILE_EXTENSION) {
                continue;
            }
            if let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) {
                if is_valid_profile_name(name) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Creates a new profile; an existing one with the same name is left
    /// untouched and reported as a validation error.
    pub async fn create(&self, name: &str, settings: &Settings) -> Result<(), AppError> {
        let path = self.profile_path(name)?;
        let json = serde_json::to_vec_pretty(settings)?;
        match write_private(&path, &json, true).await {
            Ok(()) => {
                tracing::info!(profile = name, "profile created");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => Err(AppError::validation(
                format!("profile '{name}' already exists"),
            )),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn load(&self, name: &str) -> Result<Settings, AppError> {
        let path = self.profile_path(name)?;
        let raw = match fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(AppError::settings(format!("profile '{name}' does not exist")));
            }
            Err(err) => return Err(err.into()),
        };
        Settings::from_value(serde_json::from_str::<Value>(&raw)?)
    }

    /// Writes the profile, replacing any previous contents.
    pub async fn save(&self, name: &str, settings: &Settings) -> Result<(), AppError> {
        let path = self.profile_path(name)?;
        let json = serde_json::to_vec_pretty(settings)?;
        write_private(&path, &json, false).await?;
        tracing::debug!(profile = name, "profile saved");
        Ok(())
    }

    /// Returns whether a profile was removed.
    pub async fn delete(&self, name: &str) -> Result<bool, AppError> {
        let path = self.profile_path(name)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(profile = name, "profile deleted");
                Ok(true)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// A [`SettingsStore`](crate::settings::SettingsStore) bound to one
    /// profile's file.
    pub fn settings_store(&self, name: &str) -> Result<JsonSettingsStore, AppError> {
        Ok(JsonSettingsStore::new(self.profile_path(name)?))
    }

    fn profile_path(&self, name: &str) -> Result<PathBuf, AppError> {
        let name = name.trim();
        if !is_valid_profile_name(name) {
            return Err(AppError::validation(format!(
                "profile name '{name}' must contain only letters, digits, spaces, '-', '_' or '.'"
            )));
        }
        Ok(self.dir.join(format!("{name}.{PROFILE_EXTENSION}")))
    }
}

/// Names become file stems, so anything that could escape the directory is
/// rejected.
pub fn is_valid_profile_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && !name.starts_with('.')
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, ' ' | '-' | '_' | '.'))
}
