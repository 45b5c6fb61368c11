//! Relay configuration rendering.
//!
//! Rendering is plain placeholder substitution over already-sanitized values;
//! nothing here validates input.

use std::path::Path;

use tokio::fs;

use crate::{
    error::AppError,
    layout::{RelayLayout, ensure_parent},
    stream::{DISTRIBUTION_APP, SanitizedConfig, SanitizedTarget},
};

pub const TEMPLATE_VERSION: &str = "v1";

const BUILTIN_TEMPLATE: &str = r#"# restream relay template v1
# Generated on every start; manual edits are overwritten.
daemon off;
worker_processes 1;
pid "{pid_file}";
error_log "{error_log}" warn;

events {
    worker_connections 1024;
}

rtmp {
    server {
        listen {ingest_port};
        chunk_size 4096;

        application {ingest_app} {
            live on;
            record off;
            allow play 127.0.0.1;
            deny play all;
        }

        application {distribution_app} {
            live on;
            record off;
            allow publish 127.0.0.1;
            deny publish all;
{egress_pushes}
        }
    }
}
"#;

const PUSH_INDENT: &str = "            ";

#[derive(Debug, Clone)]
pub struct RelayTemplate {
    text: String,
}

impl RelayTemplate {
    pub fn builtin() -> Self {
        Self {
            text: BUILTIN_TEMPLATE.to_string(),
        }
    }

    /// Loads an operator template. It must at least bind the ingest port and
    /// app, otherwise the ingest server would listen somewhere unexpected.
    pub async fn from_file(path: &Path) -> Result<Self, AppError> {
        let text = fs::read_to_string(path).await.map_err(|err| {
            AppError::config_write(format!("cannot read template {}: {err}", path.display()))
        })?;

        for required in ["{ingest_port}", "{ingest_app}"] {
            if !text.contains(required) {
                return Err(AppError::config_write(format!(
                    "template {} lacks the {required} placeholder",
                    path.display()
                )));
            }
        }

        Ok(Self { text })
    }

    /// Picks the explicitly configured template, then the override in the
    /// layout's conf directory, then the built-in one.
    pub async fn resolve(explicit: Option<&Path>, layout: &RelayLayout) -> Result<Self, AppError> {
        if let Some(path) = explicit {
            return Self::from_file(path).await;
        }
        let override_path = layout.template_override_path();
        if override_path.is_file() {
            tracing::debug!(path = %override_path.display(), "using relay template override");
            return Self::from_file(&override_path).await;
        }
        Ok(Self::builtin())
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Named values substituted into the template.
#[derive(Debug, Clone)]
pub struct RelayTemplateFields {
    pub ingest_port: u16,
    pub ingest_app: String,
    pub distribution_app: String,
    pub pid_file: String,
    pub error_log: String,
    pub targets: Vec<SanitizedTarget>,
}

impl RelayTemplateFields {
    pub fn new(config: &SanitizedConfig, layout: &RelayLayout) -> Self {
        Self {
            ingest_port: config.ingest_port,
            ingest_app: config.ingest_app.clone(),
            distribution_app: DISTRIBUTION_APP.to_string(),
            pid_file: layout.pid_path().display().to_string(),
            error_log: layout.error_log_path().display().to_string(),
            targets: config.targets.clone(),
        }
    }

    /// Same fields with every stream key replaced by asterisks, for display.
    pub fn masked(&self) -> Self {
        let mut masked = self.clone();
        for target in &mut masked.targets {
            target.stream_key = mask_stream_key(&target.stream_key);
        }
        masked
    }

    fn push_block(&self) -> String {
        self.targets
            .iter()
            .map(|target| format!("{PUSH_INDENT}push {}/{};", target.url, target.stream_key))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn lookup(&self, name: &str) -> Option<String> {
        match name {
            "ingest_port" => Some(self.ingest_port.to_string()),
            "ingest_app" => Some(self.ingest_app.clone()),
            "distribution_app" => Some(self.distribution_app.clone()),
            "pid_file" => Some(self.pid_file.clone()),
            "error_log" => Some(self.error_log.clone()),
            "egress_pushes" => Some(self.push_block()),
            indexed => {
                let rest = indexed.strip_prefix("target_")?;
                let (index, field) = rest.split_once('_')?;
                let index = index.parse::<usize>().ok()?;
                let target = self.targets.get(index);
                match field {
                    "url" => Some(target.map(|t| t.url.clone()).unwrap_or_default()),
                    "key" => Some(target.map(|t| t.stream_key.clone()).unwrap_or_default()),
                    _ => None,
                }
            }
        }
    }
}

/// Substitutes `{name}` placeholders in a single pass. Braces that do not
/// enclose a known placeholder name are copied through untouched, so the
/// template's own block syntax survives.
pub fn render(fields: &RelayTemplateFields, template: &RelayTemplate) -> String {
    let text = template.text();
    let mut output = String::with_capacity(text.len() + 256);
    let mut rest = text;

    while let Some(open) = rest.find('{') {
        output.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let substituted = after.find('}').and_then(|close| {
            let name = &after[..close];
            let is_ident = !name.is_empty()
                && name
                    .bytes()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_');
            if !is_ident {
                return None;
            }
            fields.lookup(name).map(|value| (value, close))
        });

        match substituted {
            Some((value, close)) => {
                output.push_str(&value);
                rest = &after[close + 1..];
            }
            None => {
                output.push('{');
                rest = after;
            }
        }
    }
    output.push_str(rest);

    output
}

/// Replaces the previous config file with `contents`. The old file is
/// removed first so stale directives can never survive a partial write.
pub async fn write_config(path: &Path, contents: &str) -> Result<(), AppError> {
    match fs::remove_file(path).await {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => {
            return Err(AppError::config_write(format!(
                "cannot remove previous config {}: {err}",
                path.display()
            )));
        }
    }

    ensure_parent(path)
        .await
        .map_err(|err| AppError::config_write(format!("{}: {err}", path.display())))?;

    fs::write(path, contents).await.map_err(|err| {
        AppError::config_write(format!("cannot write {}: {err}", path.display()))
    })?;

    tracing::debug!(path = %path.display(), bytes = contents.len(), "relay config written");
    Ok(())
}

pub fn mask_stream_key(key: &str) -> String {
    "*".repeat(key.chars().count())
}
