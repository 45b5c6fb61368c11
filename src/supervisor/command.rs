use std::{ffi::OsString, path::Path};

use crate::stream::SanitizedConfig;

pub(crate) fn os<S: Into<OsString>>(value: S) -> OsString {
    value.into()
}

pub(crate) fn os_path(path: &Path) -> OsString {
    path.as_os_str().to_os_string()
}

/// Arguments for the single transcode process: read the operator's feed from
/// the ingest app, re-encode at a constant bitrate, publish to the
/// distribution app.
pub fn transcode_args(config: &SanitizedConfig) -> Vec<OsString> {
    let mut args = vec![
        os("-hide_banner"),
        os("-loglevel"),
        os("warning"),
        os("-i"),
        os(config.ingest_url()),
        os("-r"),
        os(config.framerate.to_string()),
        os("-s"),
        os(config.resolution),
        os("-b:v"),
        os(config.video_bitrate()),
        os("-maxrate"),
        os(config.video_bitrate()),
        os("-minrate"),
        os(config.video_bitrate()),
        os("-bufsize"),
        os(config.buffer_size()),
        os("-c:v"),
        os(config.video_encoder.code.as_str()),
    ];

    if let Some(preset) = &config.preset {
        args.push(os("-preset"));
        args.push(os(preset.as_str()));
    }

    args.extend([
        os("-b:a"),
        os(config.audio_bitrate.as_str()),
        os("-c:a"),
        os(config.audio_encoder.code()),
        os("-f"),
        os(config.video_encoder.preferred_container.as_str()),
        os(config.distribution_url()),
    ]);

    args
}

/// `-p` points the ingest server's relative paths (default error log,
/// `temp/*_temp` scratch dirs) at the relay layout root.
pub fn ingest_args(prefix: &Path, config_path: &Path) -> Vec<OsString> {
    vec![os("-p"), prefix_arg(prefix), os("-c"), os_path(config_path)]
}

pub fn ingest_stop_args(prefix: &Path, config_path: &Path) -> Vec<OsString> {
    let mut args = ingest_args(prefix, config_path);
    args.extend([os("-s"), os("stop")]);
    args
}

/// The prefix must end with a separator or the server glues it to the
/// relative path.
fn prefix_arg(prefix: &Path) -> OsString {
    let mut arg = os_path(prefix);
    if !arg.to_string_lossy().ends_with(std::path::MAIN_SEPARATOR) {
        arg.push(std::path::MAIN_SEPARATOR_STR);
    }
    arg
}

pub(crate) fn printable(args: &[OsString]) -> String {
    args.iter()
        .map(|arg| arg.to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join(" ")
}
