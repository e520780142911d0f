mod common;

use common::{meta, read_all, user_ctx};

use std::io::Write;

use strongroom_service::{ArtifactRef, Config, PolicyOptions, State};

#[tokio::test]
async fn test_default_config_gives_working_ephemeral_engine() {
    let state = State::from_config(&Config::default()).await.unwrap();

    let summary = state
        .vault()
        .create_artifact(
            "alice",
            &b"ephemeral"[..],
            meta("ephemeral.txt"),
            PolicyOptions::default(),
        )
        .await
        .unwrap();

    let mut file = state
        .vault()
        .retrieve(ArtifactRef::Id(summary.id), &user_ctx("alice"))
        .await
        .unwrap();
    assert_eq!(read_all(&mut file).await, b"ephemeral");
}

#[tokio::test]
async fn test_persistent_backends_from_config() {
    let dir = tempfile::tempdir().unwrap();

    let mut key_file = tempfile::NamedTempFile::new().unwrap();
    key_file.write_all(&[42u8; 32]).unwrap();

    let config = Config {
        sqlite_path: Some(dir.path().join("vault.db")),
        store_root: Some(dir.path().join("objects")),
        master_key_path: Some(key_file.path().to_path_buf()),
        ..Default::default()
    };

    let state = State::from_config(&config).await.unwrap();
    let summary = state
        .vault()
        .create_artifact(
            "alice",
            &b"durable"[..],
            meta("durable.txt"),
            PolicyOptions::default(),
        )
        .await
        .unwrap();

    // a second state over the same paths and key sees the same artifact
    drop(state);
    let state = State::from_config(&config).await.unwrap();
    let mut file = state
        .vault()
        .retrieve(ArtifactRef::Id(summary.id), &user_ctx("alice"))
        .await
        .unwrap();
    assert_eq!(read_all(&mut file).await, b"durable");
}

#[tokio::test]
async fn test_invalid_master_key_file_is_rejected() {
    let mut key_file = tempfile::NamedTempFile::new().unwrap();
    key_file.write_all(b"way too short").unwrap();

    let config = Config {
        master_key_path: Some(key_file.path().to_path_buf()),
        ..Default::default()
    };
    assert!(State::from_config(&config).await.is_err());
}
