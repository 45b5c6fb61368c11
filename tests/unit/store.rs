use std::sync::Arc;

use restream::{
    error::AppError,
    settings::{DynSettingsStore, JsonSettingsStore, Settings, SettingsStore, Theme},
    stream::EgressTarget,
};
use tempfile::tempdir;

#[tokio::test]
async fn saved_settings_drive_a_valid_stream_config() -> Result<(), AppError> {
    let temp = tempdir().expect("tempdir");
    let store: DynSettingsStore = Arc::new(JsonSettingsStore::new(temp.path().join("settings.json")));

    let mut settings = store.load().await?;
    settings.egress_targets[0] = EgressTarget::new("YouTube (primary)", "rtmp://a.rtmp.youtube.com/live2", "abcd-1234");
    settings.video_bitrate = "4500".into();
    settings.theme = Theme::Dark;
    store.save(&settings).await?;

    let reloaded = store.load().await?;
    assert_eq!(reloaded, settings);

    let sanitized = reloaded.stream_config().sanitize()?;
    assert_eq!(sanitized.targets.len(), 1);
    assert_eq!(sanitized.targets[0].stream_key, "abcd-1234");
    assert_eq!(sanitized.video_bitrate(), "4500k");
    Ok(())
}

#[tokio::test]
async fn partial_file_from_older_release_loads() -> Result<(), AppError> {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("settings.json");
    tokio::fs::write(
        &path,
        r#"{ "ingest_app": "studio", "dark_mode": true, "video_encoder": [] }"#,
    )
    .await?;

    let settings = JsonSettingsStore::new(&path).load().await?;
    assert_eq!(settings.ingest_app, "studio");
    assert_eq!(settings.theme, Theme::Dark);
    assert_eq!(settings.video_encoder, Settings::default().video_encoder);
    assert_eq!(settings.egress_targets.len(), 3);
    Ok(())
}
