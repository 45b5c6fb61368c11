fn base_config() -> StreamConfig {
    StreamConfig {
        ingest_port: "1935".into(),
        ingest_app: "live".into(),
        egress_targets: vec![EgressTarget::new("primary", "rtmp://a", "k1")],
        video_encoder: EncoderDescriptor::default(),
        resolution: "1080p".into(),
        video_bitrate: "6000".into(),
        framerate: "30".into(),
        preset: "medium".into(),
        audio_encoder: "AAC".into(),
        audio_bitrate: "192k".into(),
    }
}

#[test]
fn sanitize_accepts_reference_config() {
    let sanitized = base_config().sanitize().expect("valid config");
    assert_eq!(sanitized.ingest_port, 1935);
    assert_eq!(sanitized.ingest_app, "live");
    assert_eq!(sanitized.targets.len(), 1);
    assert_eq!(sanitized.targets[0].url, "rtmp://a");
    assert_eq!(sanitized.targets[0].stream_key, "k1");
    assert_eq!(sanitized.resolution, "1920x1080");
    assert_eq!(sanitized.video_bitrate(), "6000k");
    assert_eq!(sanitized.buffer_size(), "12000k");
    assert_eq!(sanitized.framerate, 30);
    assert_eq!(sanitized.preset.as_deref(), Some("medium"));
    assert_eq!(sanitized.audio_encoder, AudioEncoder::Aac);
    assert_eq!(sanitized.ingest_url(), "rtmp://127.0.0.1:1935/live");
    assert_eq!(sanitized.distribution_url(), "rtmp://127.0.0.1:1935/distribute");
}

#[test]
fn missing_app_is_named_in_error() {
    let mut config = base_config();
    config.ingest_app = "   ".into();
    match config.sanitize() {
        Err(AppError::Validation(message)) => assert!(message.contains("ingest app")),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn app_must_be_path_segment_safe() {
    let mut config = base_config();
    config.ingest_app = "live/../x".into();
    assert!(matches!(config.sanitize(), Err(AppError::Validation(_))));

    config.ingest_app = DISTRIBUTION_APP.into();
    assert!(matches!(config.sanitize(), Err(AppError::Validation(_))));
}

#[test]
fn port_zero_is_rejected_and_garbage_defaults() {
    let mut config = base_config();
    config.ingest_port = "0".into();
    match config.sanitize() {
        Err(AppError::Validation(message)) => assert!(message.contains("ingest port")),
        other => panic!("unexpected result: {other:?}"),
    }

    config.ingest_port = "70000".into();
    assert!(matches!(config.sanitize(), Err(AppError::Validation(_))));

    config.ingest_port = "not-a-port".into();
    assert_eq!(config.sanitize().expect("defaulted").ingest_port, 1935);
}

#[test]
fn disabled_targets_are_skipped_and_none_left_is_an_error() {
    let mut config = base_config();
    config.egress_targets = vec![
        EgressTarget::new("youtube primary", "YOUTUBE_PRIMARY_INGEST_URL", "key"),
        EgressTarget::new("twitch", "rtmp://live.twitch.tv/app", ""),
    ];
    match config.sanitize() {
        Err(AppError::Validation(message)) => assert!(message.contains("egress target")),
        other => panic!("unexpected result: {other:?}"),
    }

    config
        .egress_targets
        .push(EgressTarget::new("backup", "rtmp://b.example/live2/", " k2 "));
    let sanitized = config.sanitize().expect("one target enabled");
    assert_eq!(sanitized.targets.len(), 1);
    assert_eq!(sanitized.targets[0].label, "backup");
    assert_eq!(sanitized.targets[0].url, "rtmp://b.example/live2");
    assert_eq!(sanitized.targets[0].stream_key, "k2");
}

#[test]
fn unsafe_stream_key_is_rejected() {
    let mut config = base_config();
    config.egress_targets = vec![EgressTarget::new("t", "rtmp://a", "k1; push rtmp://evil")];
    match config.sanitize() {
        Err(AppError::Validation(message)) => assert!(message.contains("'t'")),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn preset_must_belong_to_encoder() {
    let mut config = base_config();
    config.preset = "p4".into();
    assert!(matches!(config.sanitize(), Err(AppError::Validation(_))));

    config.preset = String::new();
    assert_eq!(config.sanitize().expect("fallback").preset.as_deref(), Some("medium"));

    config.video_encoder = encoders::lookup("libaom-av1").expect("table entry");
    config.preset = "medium".into();
    assert_eq!(config.sanitize().expect("no presets").preset, None);
}

#[test]
fn unknown_encoder_code_is_rejected() {
    let mut config = base_config();
    config.video_encoder.code = "libx264 -f null".into();
    assert!(matches!(config.sanitize(), Err(AppError::Validation(_))));
}

#[test]
fn malformed_numbers_fall_back_to_defaults() {
    let mut config = base_config();
    config.video_bitrate = "fast".into();
    config.framerate = "0".into();
    config.audio_bitrate = "loud".into();
    config.audio_encoder = "flac".into();
    config.resolution = "8K".into();

    let sanitized = config.sanitize().expect("defaults applied");
    assert_eq!(sanitized.video_bitrate_kbps, 6000);
    assert_eq!(sanitized.framerate, 30);
    assert_eq!(sanitized.audio_bitrate, "192k");
    assert_eq!(sanitized.audio_encoder, AudioEncoder::Aac);
    assert_eq!(sanitized.resolution, "1920x1080");
}

#[test]
fn audio_encoder_labels_round_trip() {
    for encoder in AudioEncoder::ALL {
        assert_eq!(AudioEncoder::from_label(encoder.label()), Some(encoder));
    }
    assert_eq!(AudioEncoder::from_label("opus"), Some(AudioEncoder::Opus));
    assert_eq!(AudioEncoder::Mp3.code(), "libmp3lame");
}
