#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;

use restream::{encoders, error::AppError};
use tempfile::tempdir;

/// Answers `-encoders` and `-hwaccels` the way the real transcoder lays out
/// its listings.
fn fake_transcoder(hwaccels: &str) -> String {
    format!(
        r#"#!/bin/sh
case "$2" in
    -encoders)
        cat <<'LIST'
Encoders:
 V..... = Video
 ------
 V....D libx264              libx264 H.264 / AVC / MPEG-4 AVC (codec h264)
 V....D h264_nvenc           NVIDIA NVENC H.264 encoder (codec h264)
 V....D hevc_vaapi           H.265/HEVC (VAAPI) (codec hevc)
 A....D aac                  AAC (Advanced Audio Coding)
LIST
        ;;
    -hwaccels)
        printf 'Hardware acceleration methods:\n{hwaccels}'
        ;;
    *)
        exit 1
        ;;
esac
"#
    )
}

async fn discover_with(hwaccels: &str) -> Result<Vec<String>, AppError> {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("transcoder");
    std::fs::write(&path, fake_transcoder(hwaccels)).expect("write script");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod");

    let catalog = encoders::discover(&path).await?;
    Ok(catalog.into_iter().map(|e| e.code).collect())
}

#[tokio::test]
async fn host_without_accelerators_gets_software_encoders() -> Result<(), AppError> {
    assert_eq!(discover_with("\\n").await?, vec!["libx264"]);
    Ok(())
}

#[tokio::test]
async fn cuda_host_unlocks_nvenc() -> Result<(), AppError> {
    assert_eq!(
        discover_with("cuda\\nvaapi\\n").await?,
        vec!["libx264", "h264_nvenc"]
    );
    Ok(())
}
