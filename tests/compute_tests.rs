//! Integration tests for the feature-computation phase
//!
//! Each test seeds a pending id set on disk, mocks the platform with
//! wiremock, runs the compute loop, and inspects the CSV table and the
//! checkpoint files it leaves behind.

use quarry::checkpoint::{load_ids, save_ids, save_names};
use quarry::config::{
    BlobConfig, CheckpointConfig, ComputeConfig, Config, ProviderConfig, SearchConfig, TargetSet,
};
use quarry::features::run_compute;
use chrono::Utc;
use serde_json::json;
use std::collections::HashSet;
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(api_base: &str, dir: &Path, features: &[&str]) -> Config {
    Config {
        search: SearchConfig {
            from_year: 2015,
            to_year: 2016,
            query: "created:{date}".to_string(),
            target_set: TargetSet::Unmaintained,
            target_count: 1,
            sample_size: 50,
        },
        compute: ComputeConfig {
            features: features.iter().map(|s| s.to_string()).collect(),
            maintained_csv: dir.join("maintained.csv").display().to_string(),
            unmaintained_csv: dir.join("unmaintained.csv").display().to_string(),
        },
        checkpoint: CheckpointConfig {
            unmaintained_ids: dir.join("unmaintained.json").display().to_string(),
            maintained_ids: dir.join("maintained.json").display().to_string(),
            not_suitable_ids: dir.join("not_suitable.json").display().to_string(),
            seen_names: dir.join("seen_names.json").display().to_string(),
            run_log: dir.join("quarry.log").display().to_string(),
            flush_interval: 10,
        },
        blob: BlobConfig::default(),
        provider: ProviderConfig {
            api_base: api_base.to_string(),
            token_env: vec![],
            max_wait_minutes: 1,
            acquire_attempts: 2,
            tokens: vec!["token-a".to_string()],
        },
    }
}

async fn mount_quota(server: &MockServer, remaining: u32) {
    let reset = Utc::now().timestamp() + 3600;
    Mock::given(method("GET"))
        .and(path("/rate_limit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resources": { "core": { "remaining": remaining, "reset": reset } }
        })))
        .mount(server)
        .await;
}

async fn mount_repository(server: &MockServer, id: u64, full_name: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/repositories/{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": id,
            "name": full_name.split('/').last().unwrap(),
            "full_name": full_name,
            "description": "a project",
            "created_at": "2015-03-01T00:00:00Z",
            "pushed_at": "2020-03-01T00:00:00Z",
            "archived": false,
            "size": 1024,
            "stargazers_count": 7,
            "watchers_count": 7,
            "forks_count": 2,
            "owner": { "login": full_name.split('/').next().unwrap(), "type": "User" }
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_quota_starved_feature_gets_the_sentinel() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_quota(&server, 10).await;
    mount_repository(&server, 7, "o7/r7").await;

    // The branches endpoint reports exhausted quota on every attempt;
    // after one identity rotation the cell becomes the sentinel while
    // the remaining features still compute.
    Mock::given(method("GET"))
        .and(path("/repos/o7/r7/branches"))
        .respond_with(
            ResponseTemplate::new(403).insert_header("x-ratelimit-remaining", "0"),
        )
        .mount(&server)
        .await;

    let config = test_config(
        &server.uri(),
        dir.path(),
        &["stargazers-count", "branches-count", "forks-count"],
    );
    save_ids(
        Path::new(&config.checkpoint.unmaintained_ids),
        &HashSet::from([7]),
    )
    .unwrap();

    run_compute(&config, TargetSet::Unmaintained)
        .await
        .expect("compute failed");

    let csv = std::fs::read_to_string(&config.compute.unmaintained_csv).unwrap();
    let mut lines = csv.lines();
    assert_eq!(
        lines.next(),
        Some("stargazers-count,branches-count,forks-count")
    );
    assert_eq!(lines.next(), Some("7,Could not compute,2"));
    assert_eq!(lines.next(), None);

    // The row was written, so the id has left the pending set.
    let pending = load_ids(Path::new(&config.checkpoint.unmaintained_ids));
    assert!(pending.is_empty());
}

#[tokio::test]
async fn test_known_name_is_skipped_but_leaves_pending() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_quota(&server, 10).await;
    mount_repository(&server, 7, "o7/r7").await;

    let config = test_config(&server.uri(), dir.path(), &["stargazers-count"]);
    save_ids(
        Path::new(&config.checkpoint.unmaintained_ids),
        &HashSet::from([7]),
    )
    .unwrap();
    save_names(
        Path::new(&config.checkpoint.seen_names),
        &HashSet::from(["o7/r7".to_string()]),
    )
    .unwrap();

    run_compute(&config, TargetSet::Unmaintained)
        .await
        .expect("compute failed");

    // No row appended, but the duplicate still counts as handled.
    let csv = std::fs::read_to_string(&config.compute.unmaintained_csv).unwrap();
    assert_eq!(csv, "stargazers-count\n");
    let pending = load_ids(Path::new(&config.checkpoint.unmaintained_ids));
    assert!(pending.is_empty());
}

#[tokio::test]
async fn test_vanished_repository_abandons_the_row() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_quota(&server, 10).await;
    Mock::given(method("GET"))
        .and(path("/repositories/8"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let config = test_config(&server.uri(), dir.path(), &["stargazers-count"]);
    save_ids(
        Path::new(&config.checkpoint.unmaintained_ids),
        &HashSet::from([8]),
    )
    .unwrap();

    run_compute(&config, TargetSet::Unmaintained)
        .await
        .expect("compute failed");

    // Nothing written, and the id stays pending for the next run.
    let csv = std::fs::read_to_string(&config.compute.unmaintained_csv).unwrap();
    assert_eq!(csv, "stargazers-count\n");
    let pending = load_ids(Path::new(&config.checkpoint.unmaintained_ids));
    assert_eq!(pending, HashSet::from([8]));
}
