use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use tokio::fs;

use crate::error::AppError;

const RENDERED_CONFIG: &str = "relay.conf";
const TEMPLATE_FILE: &str = "relay.conf.template";
const PID_FILE: &str = "ingest.pid";
const ERROR_LOG: &str = "error.log";
const TEMP_SUBDIRS: [&str; 5] = [
    "client_body_temp",
    "proxy_temp",
    "fastcgi_temp",
    "uwsgi_temp",
    "scgi_temp",
];

/// Working tree shared with the ingest server: rendered config, pid file,
/// logs and the scratch directories the server expects to exist.
#[derive(Clone, Debug)]
pub struct RelayLayout {
    inner: Arc<LayoutInner>,
}

#[derive(Debug)]
struct LayoutInner {
    root_dir: PathBuf,
    conf_dir: PathBuf,
    logs_dir: PathBuf,
    temp_dir: PathBuf,
}

impl RelayLayout {
    pub async fn initialize(root: impl AsRef<Path>) -> Result<Self, AppError> {
        let root = absolute(root.as_ref())?;
        let conf_dir = root.join("conf");
        let logs_dir = root.join("logs");
        let temp_dir = root.join("temp");

        ensure_dir(&conf_dir).await?;
        ensure_dir(&logs_dir).await?;
        ensure_dir(&temp_dir).await?;
        for subdir in TEMP_SUBDIRS {
            ensure_dir(&temp_dir.join(subdir)).await?;
        }

        Ok(Self {
            inner: Arc::new(LayoutInner {
                root_dir: root,
                conf_dir,
                logs_dir,
                temp_dir,
            }),
        })
    }

    pub fn root_dir(&self) -> PathBuf {
        self.inner.root_dir.clone()
    }

    pub fn conf_dir(&self) -> PathBuf {
        self.inner.conf_dir.clone()
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.inner.logs_dir.clone()
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.inner.temp_dir.clone()
    }

    /// The file passed to the ingest server with `-c`.
    pub fn rendered_config_path(&self) -> PathBuf {
        self.inner.conf_dir.join(RENDERED_CONFIG)
    }

    /// Operator-supplied template that overrides the built-in one when present.
    pub fn template_override_path(&self) -> PathBuf {
        self.inner.conf_dir.join(TEMPLATE_FILE)
    }

    pub fn pid_path(&self) -> PathBuf {
        self.inner.logs_dir.join(PID_FILE)
    }

    pub fn error_log_path(&self) -> PathBuf {
        self.inner.logs_dir.join(ERROR_LOG)
    }

    /// Removes a pid file left behind by an ungraceful ingest shutdown.
    /// Returns whether a file was removed; failures other than "not found"
    /// are logged and otherwise ignored.
    pub async fn clear_stale_pid(&self) -> bool {
        let path = self.pid_path();
        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(path = %path.display(), "removed stale ingest pid file");
                true
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => false,
            Err(err) => {
                tracing::warn!(path = %path.display(), ?err, "failed to remove stale ingest pid file");
                false
            }
        }
    }
}

fn absolute(path: &Path) -> Result<PathBuf, AppError> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

pub async fn ensure_dir(dir: &Path) -> Result<(), AppError> {
    if !dir.exists() {
        fs::create_dir_all(dir).await?;
    }
    Ok(())
}

pub async fn ensure_parent(path: &Path) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent).await?;
    }
    Ok(())
}
