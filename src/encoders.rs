use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::error::AppError;

/// One selectable video encoder.
///
/// Values are copied into a [`crate::stream::StreamConfig`], so refreshing the
/// catalog never changes a session that is already running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderDescriptor {
    pub code: String,
    pub display_name: String,
    pub preferred_container: String,
    /// Ordered; the first entry is the fallback preset. Empty when the encoder
    /// takes no `-preset` argument.
    #[serde(default)]
    pub supported_presets: Vec<String>,
}

impl EncoderDescriptor {
    pub fn default_preset(&self) -> Option<&str> {
        self.supported_presets.first().map(String::as_str)
    }

    pub fn supports_preset(&self, preset: &str) -> bool {
        self.supported_presets.iter().any(|known| known == preset)
    }

    pub fn is_hardware(&self) -> bool {
        HardwareVendor::for_code(&self.code).is_some()
    }
}

impl Default for EncoderDescriptor {
    fn default() -> Self {
        lookup(DEFAULT_ENCODER_CODE).unwrap_or_else(|| EncoderDescriptor {
            code: DEFAULT_ENCODER_CODE.to_string(),
            display_name: "H.264 (libx264)".to_string(),
            preferred_container: "flv".to_string(),
            supported_presets: Vec::new(),
        })
    }
}

pub const DEFAULT_ENCODER_CODE: &str = "libx264";

struct EncoderEntry {
    code: &'static str,
    display_name: &'static str,
    container: &'static str,
    presets: &'static [&'static str],
}

const X26X_PRESETS: &[&str] = &[
    "medium",
    "ultrafast",
    "superfast",
    "veryfast",
    "faster",
    "fast",
    "slow",
    "slower",
    "veryslow",
];
const QSV_PRESETS: &[&str] = &[
    "medium", "veryfast", "faster", "fast", "slow", "slower", "veryslow",
];
const NVENC_PRESETS: &[&str] = &["p4", "p1", "p2", "p3", "p5", "p6", "p7"];
const AMF_PRESETS: &[&str] = &["balanced", "speed", "quality"];

// Everything is pushed over RTMP to the local relay, so every container is FLV
// (enhanced FLV for HEVC and AV1).
const ENCODER_TABLE: &[EncoderEntry] = &[
    EncoderEntry {
        code: "libx264",
        display_name: "H.264 (libx264)",
        container: "flv",
        presets: X26X_PRESETS,
    },
    EncoderEntry {
        code: "libx265",
        display_name: "HEVC (libx265)",
        container: "flv",
        presets: X26X_PRESETS,
    },
    EncoderEntry {
        code: "libaom-av1",
        display_name: "AV1 (libaom-av1)",
        container: "flv",
        presets: &[],
    },
    EncoderEntry {
        code: "h264_qsv",
        display_name: "H.264 (Intel Quick Sync)",
        container: "flv",
        presets: QSV_PRESETS,
    },
    EncoderEntry {
        code: "hevc_qsv",
        display_name: "HEVC (Intel Quick Sync)",
        container: "flv",
        presets: QSV_PRESETS,
    },
    EncoderEntry {
        code: "h264_nvenc",
        display_name: "H.264 (NVIDIA NVENC)",
        container: "flv",
        presets: NVENC_PRESETS,
    },
    EncoderEntry {
        code: "hevc_nvenc",
        display_name: "HEVC (NVIDIA NVENC)",
        container: "flv",
        presets: NVENC_PRESETS,
    },
    EncoderEntry {
        code: "h264_amf",
        display_name: "H.264 (AMD AMF)",
        container: "flv",
        presets: AMF_PRESETS,
    },
    EncoderEntry {
        code: "hevc_amf",
        display_name: "HEVC (AMD AMF)",
        container: "flv",
        presets: AMF_PRESETS,
    },
    EncoderEntry {
        code: "h264_vaapi",
        display_name: "H.264 (VA-API)",
        container: "flv",
        presets: &[],
    },
    EncoderEntry {
        code: "h264_videotoolbox",
        display_name: "H.264 (VideoToolbox)",
        container: "flv",
        presets: &[],
    },
];

impl EncoderEntry {
    fn descriptor(&self) -> EncoderDescriptor {
        EncoderDescriptor {
            code: self.code.to_string(),
            display_name: self.display_name.to_string(),
            preferred_container: self.container.to_string(),
            supported_presets: self.presets.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// Looks up the trusted descriptor for an encoder code.
pub fn lookup(code: &str) -> Option<EncoderDescriptor> {
    ENCODER_TABLE
        .iter()
        .find(|entry| entry.code == code)
        .map(EncoderEntry::descriptor)
}

/// Every descriptor this crate knows how to drive, regardless of host support.
pub fn known_encoders() -> Vec<EncoderDescriptor> {
    ENCODER_TABLE.iter().map(EncoderEntry::descriptor).collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum HardwareVendor {
    QuickSync,
    Nvenc,
    Amf,
    Vaapi,
    VideoToolbox,
}

impl HardwareVendor {
    pub(crate) fn for_code(code: &str) -> Option<Self> {
        let (_, suffix) = code.rsplit_once('_')?;
        match suffix {
            "qsv" => Some(Self::QuickSync),
            "nvenc" => Some(Self::Nvenc),
            "amf" => Some(Self::Amf),
            "vaapi" => Some(Self::Vaapi),
            "videotoolbox" => Some(Self::VideoToolbox),
            _ => None,
        }
    }

    /// Names `-hwaccels` prints when this vendor's backend is compiled in.
    fn backend_tokens(self) -> &'static [&'static str] {
        match self {
            Self::QuickSync => &["qsv"],
            Self::Nvenc => &["cuda", "nvenc"],
            Self::Amf => &["amf", "d3d11va"],
            Self::Vaapi => &["vaapi"],
            Self::VideoToolbox => &["videotoolbox"],
        }
    }
}

/// Queries `transcoder` for compiled-in encoders and hardware backends and
/// returns the usable subset of the static table.
pub async fn discover(transcoder: &Path) -> Result<Vec<EncoderDescriptor>, AppError> {
    let encoders_output = run_listing(transcoder, "-encoders").await?;
    let hwaccels_output = run_listing(transcoder, "-hwaccels").await?;

    let candidates = parse_encoder_listing(&encoders_output);
    let backends = parse_hwaccel_listing(&hwaccels_output);
    let catalog = filter_by_hardware(candidates, &backends);

    tracing::info!(
        transcoder = %transcoder.display(),
        encoders = %catalog.iter().map(|e| e.code.as_str()).collect::<Vec<_>>().join(", "),
        backends = %backends.join(", "),
        "encoder catalog discovered"
    );

    Ok(catalog)
}

async fn run_listing(transcoder: &Path, mode: &str) -> Result<String, AppError> {
    let output = Command::new(transcoder)
        .arg("-hide_banner")
        .arg(mode)
        .output()
        .await
        .map_err(|err| {
            AppError::discovery(format!(
                "failed to run {} {mode}: {err}",
                transcoder.display()
            ))
        })?;

    if !output.status.success() {
        return Err(AppError::discovery(format!(
            "{} {mode} exited with status {}",
            transcoder.display(),
            output.status
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Keeps video encoders from the listing that appear in the static table, in
/// table order and without duplicates.
pub fn parse_encoder_listing(listing: &str) -> Vec<EncoderDescriptor> {
    let reported: Vec<&str> = listing
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let flags = fields.next()?;
            let code = fields.next()?;
            flags.starts_with('V').then_some(code)
        })
        .collect();

    ENCODER_TABLE
        .iter()
        .filter(|entry| reported.contains(&entry.code))
        .map(EncoderEntry::descriptor)
        .collect()
}

pub fn parse_hwaccel_listing(listing: &str) -> Vec<String> {
    listing
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.ends_with(':'))
        .map(str::to_ascii_lowercase)
        .collect()
}

pub fn filter_by_hardware(
    candidates: Vec<EncoderDescriptor>,
    backends: &[String],
) -> Vec<EncoderDescriptor> {
    candidates
        .into_iter()
        .filter(|descriptor| match HardwareVendor::for_code(&descriptor.code) {
            None => true,
            Some(vendor) => vendor
                .backend_tokens()
                .iter()
                .any(|token| backends.iter().any(|backend| backend == token)),
        })
        .collect()
}
