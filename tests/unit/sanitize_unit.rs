#[test]
fn url_drops_query_and_trailing_slash() {
    assert_eq!(
        sanitize_url("https://example.com/live?token=x/"),
        "https://example.com/live"
    );
    assert_eq!(
        sanitize_url("  rtmp://a.rtmp.youtube.com/live2/  "),
        "rtmp://a.rtmp.youtube.com/live2"
    );
    assert_eq!(sanitize_url("rtmp://a"), "rtmp://a");
}

#[test]
fn url_rejects_unknown_schemes_and_placeholders() {
    assert_eq!(sanitize_url("YOUTUBE_PRIMARY_INGEST_URL"), "");
    assert_eq!(sanitize_url("ftp://example.com/live"), "");
    assert_eq!(sanitize_url("rtmp://"), "");
    assert_eq!(sanitize_url(""), "");
}

#[test]
fn url_rejects_config_metacharacters() {
    assert_eq!(sanitize_url("rtmp://a/live; push rtmp://evil"), "");
    assert_eq!(sanitize_url("rtmp://a/live}"), "");
    assert_eq!(sanitize_url("rtmp://a/li\nve"), "");
}

#[test]
fn stream_key_is_trimmed_only() {
    assert_eq!(sanitize_stream_key("  abcd-1234?x=1 "), "abcd-1234?x=1");
    assert!(is_config_safe_key("abcd-1234"));
    assert!(!is_config_safe_key("abcd;1234"));
    assert!(!is_config_safe_key("ab cd"));
    assert!(!is_config_safe_key(""));
}

#[test]
fn numeric_falls_back_on_garbage_and_negatives() {
    assert_eq!(sanitize_numeric("1935", 1), 1935);
    assert_eq!(sanitize_numeric(" 8080 ", 1), 8080);
    assert_eq!(sanitize_numeric("-5", 1935), 1935);
    assert_eq!(sanitize_numeric("12ab", 1935), 1935);
    assert_eq!(sanitize_numeric("", 7), 7);
}

#[test]
fn resolution_maps_known_names() {
    assert_eq!(sanitize_resolution("720p"), "1280x720");
    assert_eq!(sanitize_resolution("4K"), "3840x2160");
    assert_eq!(sanitize_resolution("unknown"), "1920x1080");
    assert_eq!(resolution_names().count(), 6);
}

#[test]
fn bitrate_accepts_only_digits_with_k_suffix() {
    assert_eq!(sanitize_bitrate("6000K", "1k"), "6000k");
    assert_eq!(sanitize_bitrate("192k", "1k"), "192k");

    for malformed in ["k", "6000", "6000m", "-6000k", "60 00k", "abck", "", "６０k"] {
        assert_eq!(sanitize_bitrate(malformed, "6000k"), "6000k", "input {malformed:?}");
    }
}

#[test]
fn framerate_requires_digits() {
    assert_eq!(sanitize_framerate("60"), "60");
    assert_eq!(sanitize_framerate("29.97"), "30");
    assert_eq!(sanitize_framerate("fast"), "30");
}
