use std::{
    env,
    ffi::OsStr,
    path::{Path, PathBuf},
    time::Duration,
};

/// Process-wide supervisor settings, read once at startup and passed by
/// reference to the renderer and the supervisor.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub root_dir: PathBuf,
    pub ingest_binary: PathBuf,
    pub transcoder_binary: PathBuf,
    pub template_path: Option<PathBuf>,
    pub stop_timeout: Duration,
    pub startup_grace: Duration,
    pub sweep_orphans: bool,
    pub settings_path: PathBuf,
    pub profiles_dir: PathBuf,
    /// Named profile to run instead of the single settings file.
    pub profile: Option<String>,
}

impl SupervisorConfig {
    pub fn from_env() -> Self {
        let root_dir = env::var("RESTREAM_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("relay"));

        let ingest_binary = env::var("RESTREAM_INGEST_BIN")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(binary_name("nginx")));

        let transcoder_binary = env::var("RESTREAM_TRANSCODER_BIN")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(binary_name("ffmpeg")));

        let template_path = env::var("RESTREAM_TEMPLATE")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        let stop_timeout = env::var("RESTREAM_STOP_TIMEOUT_SECS")
            .ok()
            .and_then(|val| val.parse::<u64>().ok())
            .filter(|&secs| secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(10));

        let startup_grace = env::var("RESTREAM_STARTUP_GRACE_MS")
            .ok()
            .and_then(|val| val.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(500));

        let sweep_orphans = env::var("RESTREAM_SWEEP_ORPHANS")
            .ok()
            .map(|val| !matches!(val.to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off"))
            .unwrap_or(true);

        let settings_path = env::var("RESTREAM_SETTINGS")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_settings_path());

        let profiles_dir = env::var("RESTREAM_PROFILES_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_profiles_dir(&settings_path));

        let profile = env::var("RESTREAM_PROFILE")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        Self {
            root_dir,
            ingest_binary,
            transcoder_binary,
            template_path,
            stop_timeout,
            startup_grace,
            sweep_orphans,
            settings_path,
            profiles_dir,
            profile,
        }
    }

    /// Builds a config around explicit binaries, with every other knob at its
    /// default. Used by embedders and tests that do not go through the
    /// environment.
    pub fn with_binaries(
        root_dir: impl Into<PathBuf>,
        ingest_binary: impl Into<PathBuf>,
        transcoder_binary: impl Into<PathBuf>,
    ) -> Self {
        let root_dir = root_dir.into();
        Self {
            settings_path: root_dir.join("settings.json"),
            profiles_dir: root_dir.join("profiles"),
            profile: None,
            root_dir,
            ingest_binary: ingest_binary.into(),
            transcoder_binary: transcoder_binary.into(),
            template_path: None,
            stop_timeout: Duration::from_secs(10),
            startup_grace: Duration::from_millis(500),
            sweep_orphans: true,
        }
    }
}

fn default_settings_path() -> PathBuf {
    let base = if cfg!(target_os = "windows") {
        env::var_os("APPDATA").map(|dir| PathBuf::from(dir).join("restream"))
    } else {
        env::var_os("HOME").map(|dir| PathBuf::from(dir).join(".restream"))
    };
    base.unwrap_or_else(|| PathBuf::from(".restream"))
        .join("settings.json")
}

fn default_profiles_dir(settings_path: &Path) -> PathBuf {
    settings_path
        .parent()
        .map(|dir| dir.join("profiles"))
        .unwrap_or_else(|| PathBuf::from("profiles"))
}

pub(crate) fn binary_name(base: &str) -> String {
    if cfg!(target_os = "windows") {
        format!("{base}.exe")
    } else {
        base.to_string()
    }
}

/// Resolves an executable given either as a path or as a bare name looked up
/// on `PATH`. Returns `None` when no regular file is found.
pub fn resolve_executable(binary: &Path) -> Option<PathBuf> {
    if binary.components().count() > 1 || binary.is_absolute() {
        return binary.is_file().then(|| binary.to_path_buf());
    }

    let search_path = env::var_os("PATH")?;
    env::split_paths(&search_path)
        .map(|dir| dir.join(binary))
        .find(|candidate| candidate.is_file())
}

/// Lowercased file stem used to recognise the binary in the process table.
pub fn process_stem(binary: &Path) -> Option<String> {
    binary
        .file_stem()
        .and_then(OsStr::to_str)
        .map(str::to_ascii_lowercase)
        .filter(|stem| !stem.is_empty())
}
