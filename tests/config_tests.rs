use reqflow_core::config::{ConfigManager, ReqflowConfig};
use reqflow_core::orchestration::BatchRequestManager;
use reqflow_core::resilience::RetryPolicy;
use std::io::Write;
use std::time::Duration;

fn write_yaml(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_sample_configuration_loads() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/reqflow.yaml");
    let manager = ConfigManager::load_file_only(path).unwrap();
    let config = manager.config();

    assert_eq!(config.database.database, "admin_reporting");
    assert_eq!(config.file_store.root, "/mnt/sftp");
    assert_eq!(config.retry.max_retries, 3);
    assert_eq!(config.batch.restore_max_concurrent, 3);
    assert_eq!(config.query.default_type_names, vec!["SAT", "PSAT"]);
    assert_eq!(manager.source_path().unwrap().to_str(), Some(path));
}

#[test]
fn test_partial_file_keeps_defaults() {
    let file = write_yaml(
        r#"
retry:
  max_retries: 5
batch:
  download_max_concurrent: 8
  timeout_seconds: 600
"#,
    );
    let manager = ConfigManager::load_file_only(file.path()).unwrap();
    let config = manager.config();

    assert_eq!(config.retry.max_retries, 5);
    assert_eq!(config.retry.initial_delay_ms, 1000);
    assert_eq!(config.batch.download_max_concurrent, 8);
    assert_eq!(config.batch.rerun_max_concurrent, 5);
    assert_eq!(config.batch.timeout(), Some(Duration::from_secs(600)));
}

#[test]
fn test_invalid_values_are_rejected() {
    let file = write_yaml(
        r#"
batch:
  restore_max_concurrent: 0
"#,
    );
    let err = ConfigManager::load_file_only(file.path()).err().unwrap();
    assert!(err.to_string().contains("restore_max_concurrent"));
}

#[test]
fn test_missing_file_is_an_error() {
    assert!(ConfigManager::load_from_file("/definitely/not/here.yaml").is_err());
}

#[test]
fn test_retry_policy_follows_configuration() {
    let mut config = ReqflowConfig::default();
    config.retry.max_retries = 6;
    config.retry.initial_delay_ms = 250;
    config.retry.backoff_factor = 3.0;
    config.retry.max_delay_ms = 2000;

    let policy = RetryPolicy::from(&config.retry);
    assert_eq!(policy.max_retries, 6);
    assert_eq!(policy.delay_for(0), Duration::from_millis(250));
    assert_eq!(policy.delay_for(1), Duration::from_millis(750));
    assert_eq!(policy.delay_for(2), Duration::from_millis(2000));
}

#[test]
fn test_manager_options_follow_batch_limits() {
    let mut config = ReqflowConfig::default();
    config.batch.download_max_concurrent = 7;
    config.batch.restore_max_concurrent = 2;
    config.batch.timeout_seconds = Some(30);

    let manager = BatchRequestManager::new(
        std::sync::Arc::new(reqflow_core::gateways::InMemoryDataStore::new()),
        std::sync::Arc::new(reqflow_core::gateways::InMemoryFileStore::new()),
        std::sync::Arc::new(reqflow_core::gateways::EnvCredentialProvider::default()),
        config,
    );

    assert_eq!(manager.download_options().max_concurrent, 7);
    assert_eq!(manager.restore_options().max_concurrent, 2);
    assert_eq!(
        manager.rerun_options().timeout,
        Some(Duration::from_secs(30))
    );
    assert_eq!(manager.retry_policy().max_retries, 3);
}
