use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::{fs, io::AsyncWriteExt};

use crate::{
    encoders::EncoderDescriptor,
    error::AppError,
    stream::{EgressTarget, StreamConfig},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

/// The operator's saved form. Stored as JSON; every key is optional on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub ingest_port: String,
    pub ingest_app: String,
    pub egress_targets: Vec<EgressTarget>,
    pub video_encoder: EncoderDescriptor,
    pub resolution: String,
    pub video_bitrate: String,
    pub framerate: String,
    pub preset: String,
    pub audio_encoder: String,
    pub audio_bitrate: String,
    pub theme: Theme,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ingest_port: "1935".to_string(),
            ingest_app: "live".to_string(),
            egress_targets: vec![
                EgressTarget::new(
                    "YouTube (primary)",
                    "YOUTUBE_PRIMARY_INGEST_URL",
                    "YOUR_YOUTUBE_STREAM_KEY",
                ),
                EgressTarget::new(
                    "YouTube (backup)",
                    "YOUTUBE_BACKUP_INGEST_URL",
                    "YOUR_YOUTUBE_STREAM_KEY",
                ),
                EgressTarget::new("Twitch", "TWITCH_INGEST_URL", "YOUR_TWITCH_STREAM_KEY"),
            ],
            video_encoder: EncoderDescriptor::default(),
            resolution: "1080p".to_string(),
            video_bitrate: "6000k".to_string(),
            framerate: "30".to_string(),
            preset: "medium".to_string(),
            audio_encoder: "AAC".to_string(),
            audio_bitrate: "192k".to_string(),
            theme: Theme::Light,
        }
    }
}

impl Settings {
    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            ingest_port: self.ingest_port.clone(),
            ingest_app: self.ingest_app.clone(),
            egress_targets: self.egress_targets.clone(),
            video_encoder: self.video_encoder.clone(),
            resolution: self.resolution.clone(),
            video_bitrate: self.video_bitrate.clone(),
            framerate: self.framerate.clone(),
            preset: self.preset.clone(),
            audio_encoder: self.audio_encoder.clone(),
            audio_bitrate: self.audio_bitrate.clone(),
        }
    }

    /// Rebuilds settings from a JSON document. Missing or malformed keys get
    /// their defaults individually; only a non-object document is an error.
    pub fn from_value(value: Value) -> Result<Self, AppError> {
        let Value::Object(mut loaded) = value else {
            return Err(AppError::settings("settings file is not a JSON object"));
        };

        repair_legacy_keys(&mut loaded);

        let defaults = match serde_json::to_value(Settings::default())? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for (key, default) in &defaults {
            loaded.entry(key.clone()).or_insert_with(|| default.clone());
        }

        let encoder_ok = loaded
            .get("video_encoder")
            .cloned()
            .and_then(|raw| serde_json::from_value::<EncoderDescriptor>(raw).ok())
            .is_some_and(|descriptor| !descriptor.code.trim().is_empty());
        if !encoder_ok {
            tracing::warn!("saved encoder selection is malformed; resetting to default");
            loaded.insert(
                "video_encoder".to_string(),
                serde_json::to_value(EncoderDescriptor::default())?,
            );
        }

        for key in ["ingest_port", "video_bitrate", "framerate", "audio_bitrate"] {
            if let Some(Value::Number(number)) = loaded.get(key) {
                let text = number.to_string();
                loaded.insert(key.to_string(), Value::String(text));
            }
        }

        if let Some(Value::Array(targets)) = loaded.get_mut("egress_targets") {
            targets.retain(|target| {
                let usable = serde_json::from_value::<EgressTarget>(target.clone()).is_ok();
                if !usable {
                    tracing::warn!("dropping malformed saved egress target");
                }
                usable
            });
        }

        // A field of the wrong shape falls back to its default on its own,
        // keeping everything else the operator saved.
        for (key, default) in &defaults {
            let Some(value) = loaded.get(key) else {
                continue;
            };
            let mut candidate = defaults.clone();
            candidate.insert(key.clone(), value.clone());
            if serde_json::from_value::<Settings>(Value::Object(candidate)).is_err() {
                tracing::warn!(key = %key, "saved setting has the wrong shape; resetting to default");
                loaded.insert(key.clone(), default.clone());
            }
        }

        Ok(serde_json::from_value(Value::Object(loaded))?)
    }
}

/// Carries forward files written before the theme became an enum.
fn repair_legacy_keys(loaded: &mut Map<String, Value>) {
    if !loaded.contains_key("theme") {
        if let Some(Value::Bool(dark)) = loaded.remove("dark_mode") {
            let theme = if dark { "dark" } else { "light" };
            loaded.insert("theme".to_string(), Value::String(theme.to_string()));
        }
    }
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn load(&self) -> Result<Settings, AppError>;
    async fn save(&self, settings: &Settings) -> Result<(), AppError>;
}

pub type DynSettingsStore = Arc<dyn SettingsStore>;

#[derive(Clone, Debug)]
pub struct JsonSettingsStore {
    path: PathBuf,
}

impl JsonSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SettingsStore for JsonSettingsStore {
    /// Never fails on bad content: unreadable or corrupt files yield the
    /// defaults so the operator can fix them from the form.
    async fn load(&self) -> Result<Settings, AppError> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no saved settings, using defaults");
                return Ok(Settings::default());
            }
            Err(err) => {
                tracing::warn!(path = %self.path.display(), ?err, "failed to read settings, using defaults");
                return Ok(Settings::default());
            }
        };

        let parsed = serde_json::from_str::<Value>(&raw)
            .map_err(AppError::from)
            .and_then(Settings::from_value);

        match parsed {
            Ok(settings) => Ok(settings),
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "failed to parse settings, using defaults");
                Ok(Settings::default())
            }
        }
    }

    async fn save(&self, settings: &Settings) -> Result<(), AppError> {
        let json = serde_json::to_vec_pretty(settings)?;
        write_private(&self.path, &json, false).await?;
        tracing::debug!(path = %self.path.display(), "settings saved");
        Ok(())
    }
}

/// Writes a file readable only by its owner; saved settings carry stream
/// keys. With `create_new` an existing file is an `AlreadyExists` error.
pub(crate) async fn write_private(
    path: &Path,
    contents: &[u8],
    create_new: bool,
) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let mut options = fs::OpenOptions::new();
    options.write(true);
    if create_new {
        options.create_new(true);
    } else {
        options.create(true).truncate(true);
    }
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))
            .await?;
    }
    file.write_all(contents).await?;
    file.flush().await?;
    Ok(())
}
