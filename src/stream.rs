use serde::{Deserialize, Serialize};

use crate::{
    encoders::{self, EncoderDescriptor},
    error::AppError,
    sanitize::{
        is_config_safe_key, sanitize_bitrate, sanitize_framerate, sanitize_numeric,
        sanitize_resolution, sanitize_stream_key, sanitize_url,
    },
};

pub const DEFAULT_INGEST_PORT: u16 = 1935;
pub const DEFAULT_VIDEO_BITRATE: &str = "6000k";
pub const DEFAULT_AUDIO_BITRATE: &str = "192k";
/// Ingest-server application that receives the transcoded stream and pushes
/// it to every egress target.
pub const DISTRIBUTION_APP: &str = "distribute";

/// Operator intent as collected from the form. Fields are raw strings and are
/// untrusted until [`StreamConfig::sanitize`] has run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
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
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EgressTarget {
    pub label: String,
    pub ingest_url: String,
    pub stream_key: String,
}

impl EgressTarget {
    pub fn new(
        label: impl Into<String>,
        ingest_url: impl Into<String>,
        stream_key: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            ingest_url: ingest_url.into(),
            stream_key: stream_key.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AudioEncoder {
    #[default]
    Aac,
    Mp3,
    Opus,
}

impl AudioEncoder {
    pub const ALL: [AudioEncoder; 3] = [AudioEncoder::Aac, AudioEncoder::Mp3, AudioEncoder::Opus];

    /// Case-insensitive match on the label shown to operators.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL
            .into_iter()
            .find(|encoder| encoder.label().eq_ignore_ascii_case(label))
    }

    pub fn label(self) -> &'static str {
        match self {
            AudioEncoder::Aac => "AAC",
            AudioEncoder::Mp3 => "MP3",
            AudioEncoder::Opus => "Opus",
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            AudioEncoder::Aac => "aac",
            AudioEncoder::Mp3 => "libmp3lame",
            AudioEncoder::Opus => "libopus",
        }
    }
}

/// Output of sanitization; every string field is within a closed character
/// set and safe to render or pass as an argument.
#[derive(Debug, Clone, PartialEq)]
pub struct SanitizedConfig {
    pub ingest_port: u16,
    pub ingest_app: String,
    pub targets: Vec<SanitizedTarget>,
    pub video_encoder: EncoderDescriptor,
    pub resolution: &'static str,
    pub video_bitrate_kbps: u32,
    pub framerate: u32,
    pub preset: Option<String>,
    pub audio_encoder: AudioEncoder,
    pub audio_bitrate: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedTarget {
    pub label: String,
    pub url: String,
    pub stream_key: String,
}

impl SanitizedConfig {
    pub fn video_bitrate(&self) -> String {
        format!("{}k", self.video_bitrate_kbps)
    }

    pub fn buffer_size(&self) -> String {
        format!("{}k", u64::from(self.video_bitrate_kbps) * 2)
    }

    /// Where the transcoder reads the operator's feed.
    pub fn ingest_url(&self) -> String {
        format!("rtmp://127.0.0.1:{}/{}", self.ingest_port, self.ingest_app)
    }

    /// Where the transcoder publishes; the relay fans out from here.
    pub fn distribution_url(&self) -> String {
        format!("rtmp://127.0.0.1:{}/{}", self.ingest_port, DISTRIBUTION_APP)
    }
}

impl StreamConfig {
    pub fn sanitize(&self) -> Result<SanitizedConfig, AppError> {
        let ingest_app = self.ingest_app.trim();
        if ingest_app.is_empty() {
            return Err(AppError::validation("ingest app is required"));
        }
        if !ingest_app
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.'))
            || ingest_app.starts_with('.')
        {
            return Err(AppError::validation(format!(
                "ingest app '{ingest_app}' must contain only letters, digits, '-', '_' or '.'"
            )));
        }
        if ingest_app == DISTRIBUTION_APP {
            return Err(AppError::validation(format!(
                "ingest app '{DISTRIBUTION_APP}' is reserved for the relay"
            )));
        }

        let ingest_port = u16::try_from(sanitize_numeric(
            &self.ingest_port,
            u32::from(DEFAULT_INGEST_PORT),
        ))
        .ok()
        .filter(|port| *port != 0)
        .ok_or_else(|| AppError::validation("ingest port must be between 1 and 65535"))?;

        let targets = self.enabled_targets()?;
        if targets.is_empty() {
            return Err(AppError::validation(
                "at least one egress target with both an ingest URL and a stream key is required",
            ));
        }

        let video_encoder = encoders::lookup(self.video_encoder.code.trim()).ok_or_else(|| {
            AppError::validation(format!(
                "video encoder '{}' is not supported",
                self.video_encoder.code
            ))
        })?;

        let preset = resolve_preset(&video_encoder, &self.preset)?;

        let video_bitrate_kbps = parse_kbps(&sanitize_bitrate(
            &normalize_bare_kbps(&self.video_bitrate),
            DEFAULT_VIDEO_BITRATE,
        ))
        .filter(|kbps| *kbps > 0)
        .or_else(|| parse_kbps(DEFAULT_VIDEO_BITRATE))
        .unwrap_or(6000);

        let framerate = sanitize_framerate(&self.framerate)
            .parse::<u32>()
            .ok()
            .filter(|fps| *fps > 0)
            .unwrap_or(30);

        let audio_encoder = AudioEncoder::from_label(&self.audio_encoder).unwrap_or_else(|| {
            tracing::warn!(
                audio_encoder = %self.audio_encoder,
                "unknown audio encoder, falling back to AAC"
            );
            AudioEncoder::Aac
        });

        Ok(SanitizedConfig {
            ingest_port,
            ingest_app: ingest_app.to_string(),
            targets,
            video_encoder,
            resolution: sanitize_resolution(&self.resolution),
            video_bitrate_kbps,
            framerate,
            preset,
            audio_encoder,
            audio_bitrate: sanitize_bitrate(
                &normalize_bare_kbps(&self.audio_bitrate),
                DEFAULT_AUDIO_BITRATE,
            ),
        })
    }

    fn enabled_targets(&self) -> Result<Vec<SanitizedTarget>, AppError> {
        let mut enabled = Vec::new();
        for target in &self.egress_targets {
            let url = sanitize_url(&target.ingest_url);
            let stream_key = sanitize_stream_key(&target.stream_key);

            if url.is_empty() {
                tracing::debug!(target = %target.label, "egress target has no usable URL; disabled");
                continue;
            }
            if stream_key.is_empty() {
                tracing::warn!(target = %target.label, "egress target has a URL but no stream key; disabled");
                continue;
            }
            if !is_config_safe_key(&stream_key) {
                return Err(AppError::validation(format!(
                    "stream key for target '{}' contains unsupported characters",
                    target.label
                )));
            }

            enabled.push(SanitizedTarget {
                label: target.label.trim().to_string(),
                url,
                stream_key,
            });
        }
        Ok(enabled)
    }
}

fn resolve_preset(
    encoder: &EncoderDescriptor,
    requested: &str,
) -> Result<Option<String>, AppError> {
    let requested = requested.trim();
    if encoder.supported_presets.is_empty() {
        return Ok(None);
    }
    if requested.is_empty() {
        return Ok(encoder.default_preset().map(str::to_string));
    }
    if encoder.supports_preset(requested) {
        return Ok(Some(requested.to_string()));
    }
    Err(AppError::validation(format!(
        "preset '{requested}' is not supported by {}",
        encoder.display_name
    )))
}

/// Settings written by older front ends store bitrates as bare kilobit
/// counts ("6000"); treat those as "6000k".
fn normalize_bare_kbps(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        format!("{trimmed}k")
    } else {
        trimmed.to_string()
    }
}

fn parse_kbps(bitrate: &str) -> Option<u32> {
    bitrate.strip_suffix('k')?.parse::<u32>().ok()
}
