use crate::settings::{SettingsStore, Theme};
use tempfile::tempdir;

#[test]
fn profile_names_cannot_escape_the_directory() {
    assert!(is_valid_profile_name("Evening show"));
    assert!(is_valid_profile_name("backup-1.v2"));
    assert!(!is_valid_profile_name(""));
    assert!(!is_valid_profile_name("../settings"));
    assert!(!is_valid_profile_name(".hidden"));
    assert!(!is_valid_profile_name("a/b"));
    assert!(!is_valid_profile_name(&"x".repeat(65)));
}

#[tokio::test]
async fn create_refuses_existing_name() -> Result<(), AppError> {
    let temp = tempdir().expect("tempdir");
    let store = ProfileStore::new(temp.path().join("profiles"));

    let mut first = Settings::default();
    first.ingest_app = "first".into();
    store.create("main", &first).await?;

    let mut second = Settings::default();
    second.ingest_app = "second".into();
    let err = store.create("main", &second).await.expect_err("duplicate name");
    assert!(matches!(err, AppError::Validation(ref msg) if msg.contains("already exists")));

    assert_eq!(store.load("main").await?.ingest_app, "first");
    Ok(())
}

#[tokio::test]
async fn profiles_list_save_load_and_delete() -> Result<(), AppError> {
    let temp = tempdir().expect("tempdir");
    let store = ProfileStore::new(temp.path().join("profiles"));
    assert!(store.list().await?.is_empty());

    store.create("zeta", &Settings::default()).await?;
    store.create("alpha", &Settings::default()).await?;
    fs::write(store.dir().join("notes.txt"), b"ignored").await?;
    assert_eq!(store.list().await?, vec!["alpha".to_string(), "zeta".to_string()]);

    let mut updated = Settings::default();
    updated.theme = Theme::Dark;
    store.save("alpha", &updated).await?;
    assert_eq!(store.load("alpha").await?, updated);
    assert_eq!(store.settings_store("alpha")?.load().await?, updated);

    assert!(store.delete("zeta").await?);
    assert!(!store.delete("zeta").await?);
    assert!(matches!(store.load("zeta").await, Err(AppError::Settings(_))));
    assert_eq!(store.list().await?, vec!["alpha".to_string()]);
    Ok(())
}

#[tokio::test]
async fn invalid_names_are_rejected_before_touching_disk() {
    let temp = tempdir().expect("tempdir");
    let store = ProfileStore::new(temp.path().join("profiles"));

    let err = store
        .save("../escape", &Settings::default())
        .await
        .expect_err("path traversal");
    assert!(err.is_recoverable());
    assert!(!temp.path().join("escape.json").exists());
}

#[cfg(unix)]
#[tokio::test]
async fn profiles_are_private_to_the_owner() -> Result<(), AppError> {
    use std::os::unix::fs::PermissionsExt;

    let temp = tempdir().expect("tempdir");
    let store = ProfileStore::new(temp.path().join("profiles"));
    store.create("main", &Settings::default()).await?;

    let mode = fs::metadata(store.dir().join("main.json")).await?.permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
    Ok(())
}
