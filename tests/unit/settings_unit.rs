use serde_json::json;
use tempfile::tempdir;

#[test]
fn missing_keys_are_filled_with_defaults() {
    let settings = Settings::from_value(json!({
        "ingest_app": "studio",
        "egress_targets": [
            { "label": "only", "ingest_url": "rtmp://a", "stream_key": "k1" }
        ]
    }))
    .expect("settings");

    assert_eq!(settings.ingest_app, "studio");
    assert_eq!(settings.egress_targets.len(), 1);
    assert_eq!(settings.ingest_port, "1935");
    assert_eq!(settings.preset, "medium");
    assert_eq!(settings.theme, Theme::Light);
    assert_eq!(settings.video_encoder, EncoderDescriptor::default());
}

#[test]
fn malformed_encoder_is_reset() {
    let legacy_tuple = Settings::from_value(json!({
        "video_encoder": ["libx265", "HEVC (libx265)", "mp4"]
    }))
    .expect("settings");
    assert_eq!(legacy_tuple.video_encoder, EncoderDescriptor::default());

    let blank_code = Settings::from_value(json!({
        "video_encoder": {
            "code": " ",
            "display_name": "nothing",
            "preferred_container": "flv"
        }
    }))
    .expect("settings");
    assert_eq!(blank_code.video_encoder.code, "libx264");
}

#[test]
fn encoder_without_presets_is_kept() {
    let settings = Settings::from_value(json!({
        "video_encoder": {
            "code": "libaom-av1",
            "display_name": "AV1 (libaom-av1)",
            "preferred_container": "flv"
        }
    }))
    .expect("settings");
    assert_eq!(settings.video_encoder.code, "libaom-av1");
    assert!(settings.video_encoder.supported_presets.is_empty());
}

#[test]
fn numbers_and_dark_mode_flag_are_carried_forward() {
    let settings = Settings::from_value(json!({
        "ingest_port": 1936,
        "video_bitrate": 4500,
        "dark_mode": true
    }))
    .expect("settings");
    assert_eq!(settings.ingest_port, "1936");
    assert_eq!(settings.video_bitrate, "4500");
    assert_eq!(settings.theme, Theme::Dark);
}

#[test]
fn non_object_documents_are_rejected() {
    assert!(matches!(
        Settings::from_value(json!(["not", "an", "object"])),
        Err(AppError::Settings(_))
    ));
}

#[test]
fn default_targets_are_disabled_placeholders() {
    let config = Settings::default().stream_config();
    assert_eq!(config.egress_targets.len(), 3);
    assert!(matches!(config.sanitize(), Err(AppError::Validation(_))));
}

#[tokio::test]
async fn store_round_trips_and_tolerates_corruption() -> Result<(), AppError> {
    let temp = tempdir().expect("tempdir");
    let store = JsonSettingsStore::new(temp.path().join("nested").join("settings.json"));

    assert_eq!(store.load().await?, Settings::default());

    let mut settings = Settings::default();
    settings.ingest_app = "studio".into();
    settings.theme = Theme::Dark;
    store.save(&settings).await?;
    assert_eq!(store.load().await?, settings);

    fs::write(store.path(), b"{ not json").await?;
    assert_eq!(store.load().await?, Settings::default());

    Ok(())
}

#[test]
fn one_bad_field_keeps_the_rest() {
    let settings = Settings::from_value(json!({
        "theme": "blue",
        "ingest_app": "studio",
        "egress_targets": [
            { "label": "primary", "ingest_url": "rtmp://a", "stream_key": "k1" },
            { "label": 7 }
        ]
    }))
    .expect("settings");

    assert_eq!(settings.theme, Theme::Light);
    assert_eq!(settings.ingest_app, "studio");
    assert_eq!(
        settings.egress_targets,
        vec![EgressTarget::new("primary", "rtmp://a", "k1")]
    );
}

#[test]
fn targets_of_the_wrong_shape_fall_back_to_defaults() {
    let settings = Settings::from_value(json!({
        "egress_targets": 5,
        "ingest_app": "studio",
        "preset": ["medium"]
    }))
    .expect("settings");

    assert_eq!(settings.ingest_app, "studio");
    assert_eq!(settings.egress_targets, Settings::default().egress_targets);
    assert_eq!(settings.preset, "medium");
}

#[tokio::test]
async fn store_keeps_stream_keys_when_another_field_is_corrupt() -> Result<(), AppError> {
    let temp = tempdir().expect("tempdir");
    let store = JsonSettingsStore::new(temp.path().join("settings.json"));
    fs::write(
        store.path(),
        br#"{ "theme": 3, "egress_targets": [
            { "label": "primary", "ingest_url": "rtmp://a", "stream_key": "k1" } ] }"#,
    )
    .await?;

    let settings = store.load().await?;
    assert_eq!(settings.egress_targets[0].stream_key, "k1");
    assert_eq!(settings.theme, Theme::Light);
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn saved_file_is_owner_only() -> Result<(), AppError> {
    use std::os::unix::fs::PermissionsExt;

    let temp = tempdir().expect("tempdir");
    let store = JsonSettingsStore::new(temp.path().join("settings.json"));
    fs::write(store.path(), b"{}").await?;
    fs::set_permissions(store.path(), std::fs::Permissions::from_mode(0o644)).await?;

    store.save(&Settings::default()).await?;

    let mode = fs::metadata(store.path()).await?.permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
    Ok(())
}
