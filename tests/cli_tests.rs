//! Command handlers driven the way `main` drives them.

use catalog_collect::cli::{CollectArgs, cmd_collect};
use catalog_collect::collect::{CollectionSource, RunStateStore};
use catalog_collect::config::Config;
use catalog_collect::domain::SourceId;
use catalog_collect::state::SharedState;
use std::time::Duration;

async fn state() -> SharedState {
    let db_path =
        std::env::temp_dir().join(format!("catalog-collect-cli-{}.db", uuid::Uuid::new_v4()));
    let mut config = Config::default();
    config.general.database_path = format!("sqlite:{}", db_path.display());
    config.general.images_path = std::env::temp_dir()
        .join(format!("catalog-cli-images-{}", uuid::Uuid::new_v4()))
        .display()
        .to_string();
    config.collect.resolve_target_hosts = false;

    SharedState::new(config).await.expect("failed to build state")
}

#[tokio::test]
async fn test_collect_from_loopback_source_returns_error() {
    let state = state().await;
    let source = CollectionSource::new(SourceId::default(), "lo", "http://127.0.0.1:8080/api.php");
    state.store.add_source(&source).await.unwrap();

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        cmd_collect(&state, "lo", "video", CollectArgs::default()),
    )
    .await
    .expect("collect command did not return");

    let err = result.unwrap_err();
    assert!(err.to_string().contains("loopback"), "{err}");
    assert!(state.store.list_runs().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_collect_with_unknown_source_returns() {
    let state = state().await;

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        cmd_collect(&state, "missing", "video", CollectArgs::default()),
    )
    .await
    .expect("collect command did not return");

    assert!(result.is_ok());
}
