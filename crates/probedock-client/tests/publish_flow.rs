//! End-to-end publishing tests.
//!
//! Runs go from collector events to an HTTP collector mocked with wiremock,
//! through the cache and the workspace files.

use probedock_client::client::{CLIENT_USER_AGENT, PAYLOAD_V0_CONTENT_TYPE, PAYLOAD_V1_CONTENT_TYPE};
use probedock_client::{
    Collector, Config, Console, Holder, HolderMeta, PublishOptions, Publisher, ServerProfile,
    TestRun, UID_ENV_ALIAS, UID_ENV_VAR,
};
use serde_json::{json, Value};
use serial_test::serial;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CONFIG: &str = r#"
project:
  version: 1.2.3
  apiId: abc
servers:
  test:
    apiToken: test-token
    projectApiId: abc
server: test
"#;

fn config(mock_server: &MockServer, workspace: &TempDir) -> Config {
    let mut config = Config::from_yaml_str(CONFIG).expect("valid config");
    if let Some(server) = config.servers.get_mut("test") {
        server.api_url = Some(format!("{}/api", mock_server.uri()));
    }
    config.with_workspace(workspace.path())
}

fn clear_uid_env() {
    std::env::remove_var(UID_ENV_VAR);
    std::env::remove_var(UID_ENV_ALIAS);
}

fn publisher(config: &Config) -> Publisher<probedock_client::HttpUploader> {
    Publisher::new(config.selected_server(), config.publish_options())
        .expect("failed to create publisher")
        .with_console(Console::silent())
}

fn collect(config: &Config) -> TestRun {
    let mut collector = Collector::new(config.resolved_project());
    collector.start();
    collector.enter_group(Holder::with_meta(
        "Calculator",
        HolderMeta::default().with_category("unit"),
    ));
    collector.start_test();
    collector.test_passed(&Holder::with_meta(
        "should add",
        HolderMeta::default().with_key("t1").with_tags(["math"]),
    ));
    collector.exit_group();
    collector.stop();
    collector.finish()
}

async fn mount_publish(mock_server: &MockServer, status: u16, body: &str) {
    Mock::given(method("POST"))
        .and(path("/api/publish"))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(mock_server)
        .await;
}

async fn published_bodies(mock_server: &MockServer) -> Vec<Value> {
    mock_server
        .received_requests()
        .await
        .expect("request recording enabled")
        .iter()
        .filter(|r| r.method.as_str() == "POST")
        .map(|r| serde_json::from_slice(&r.body).expect("json body"))
        .collect()
}

#[tokio::test]
#[serial]
async fn test_publish_end_to_end() {
    clear_uid_env();
    let mock_server = MockServer::start().await;
    let workspace = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(path("/api/publish"))
        .and(header("authorization", "Bearer test-token"))
        .and(header("content-type", PAYLOAD_V1_CONTENT_TYPE))
        .and(header("user-agent", CLIENT_USER_AGENT))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = config(&mock_server, &workspace);
    let mut run = collect(&config);
    let outcome = publisher(&config).process(&mut run).await;

    assert!(outcome.published, "notices: {:?}", outcome.notices);

    let bodies = published_bodies(&mock_server).await;
    let result = &bodies[0]["results"][0];
    assert_eq!(bodies[0]["projectId"], "abc");
    assert_eq!(bodies[0]["version"], "1.2.3");
    assert_eq!(result["key"], "t1");
    assert_eq!(result["passed"], true);
    assert_eq!(result["name"], "Calculator should add");
    assert_eq!(result["category"], "unit");
    assert_eq!(result["tags"], json!(["math"]));
    assert!(result["data"]["fingerprint"].is_string());
    assert!(bodies[0].get("reports").is_none());
}

#[tokio::test]
#[serial]
async fn test_cached_results_omit_descriptions() {
    clear_uid_env();
    let mock_server = MockServer::start().await;
    let workspace = TempDir::new().unwrap();
    mount_publish(&mock_server, 202, "").await;

    let mut config = config(&mock_server, &workspace);
    config.payload.cache = true;
    let publisher = publisher(&config);

    assert!(publisher.process(&mut collect(&config)).await.published);
    assert!(publisher.process(&mut collect(&config)).await.published);

    let bodies = published_bodies(&mock_server).await;
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[0]["results"][0]["name"], "Calculator should add");

    let cached = bodies[1]["results"][0].as_object().unwrap();
    let mut fields: Vec<&str> = cached.keys().map(String::as_str).collect();
    fields.sort_unstable();
    assert_eq!(fields, ["duration", "key", "passed"]);

    let cache_file = workspace.path().join("servers").join("test").join("cache.json");
    let cache: Value = serde_json::from_str(&std::fs::read_to_string(cache_file).unwrap()).unwrap();
    assert!(cache["abc"]["t1"].is_string());
}

#[tokio::test]
#[serial]
async fn test_publish_disabled_makes_no_network_call() {
    clear_uid_env();
    let mock_server = MockServer::start().await;
    let workspace = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(202))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = config(&mock_server, &workspace).with_publish(false);
    let outcome = publisher(&config).process(&mut collect(&config)).await;

    assert!(!outcome.published);
    assert!(outcome.payload.is_some());
    assert!(outcome.error.is_none());
}

#[tokio::test]
#[serial]
async fn test_server_error_leaves_cache_untouched() {
    clear_uid_env();
    let mock_server = MockServer::start().await;
    let workspace = TempDir::new().unwrap();
    mount_publish(&mock_server, 500, "fubar").await;

    let mut config = config(&mock_server, &workspace);
    config.payload.cache = true;
    let outcome = publisher(&config).process(&mut collect(&config)).await;

    assert!(!outcome.published);
    assert_eq!(outcome.response_body(), Some("fubar"));
    assert_eq!(outcome.error.as_ref().and_then(|e| e.response()).map(|r| r.status), Some(500));
    assert!(!workspace.path().join("servers").join("test").join("cache.json").exists());
}

#[tokio::test]
#[serial]
async fn test_uid_and_saved_payload() {
    let mock_server = MockServer::start().await;
    let workspace = TempDir::new().unwrap();
    mount_publish(&mock_server, 202, "").await;
    clear_uid_env();
    std::fs::write(workspace.path().join("uid"), "20240102030405-run\n").unwrap();

    let mut config = config(&mock_server, &workspace);
    config.payload.save = true;
    let outcome = publisher(&config).process(&mut collect(&config)).await;
    assert!(outcome.published);

    let bodies = published_bodies(&mock_server).await;
    assert_eq!(bodies[0]["reports"], json!([{ "uid": "20240102030405-run" }]));

    let saved = std::fs::read_to_string(
        workspace.path().join("servers").join("test").join("payload.json"),
    )
    .unwrap();
    assert_eq!(serde_json::from_str::<Value>(&saved).unwrap(), bodies[0]);
}

#[tokio::test]
#[serial]
async fn test_discovery_protocol() {
    clear_uid_env();
    let mock_server = MockServer::start().await;
    let workspace = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/api"))
        .and(header("accept", "application/hal+json"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"_links":{"v1:test-payloads":{"href":"/api/payloads"}}}"#,
            "application/hal+json",
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/payloads"))
        .and(header("authorization", r#"ProbeDockApiKey id="kid" secret="ksecret""#))
        .and(header("content-type", PAYLOAD_V0_CONTENT_TYPE))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = Config::default()
        .with_project(config(&mock_server, &workspace).resolved_project())
        .with_server_profile(
            ServerProfile::new("legacy", format!("{}/api", mock_server.uri()))
                .with_api_key("kid", "ksecret")
                .with_api_version(probedock_client::ProtocolVersion::V0)
                .with_project_api_id("abc"),
        )
        .with_server("legacy");
    let outcome = publisher(&config).process(&mut collect(&config)).await;

    assert!(outcome.published, "notices: {:?}", outcome.notices);
    let bodies = published_bodies(&mock_server).await;
    assert_eq!(bodies[0]["r"][0]["p"], "abc");
    assert_eq!(bodies[0]["r"][0]["r"][0]["k"], "t1");
    assert_eq!(bodies[0]["r"][0]["r"][0]["c"], "unit");
}

#[tokio::test]
#[serial]
async fn test_local_mode_sends_nothing() {
    clear_uid_env();
    let mock_server = MockServer::start().await;
    let workspace = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(202))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = config(&mock_server, &workspace).with_local_mode(true);
    let outcome = publisher(&config).process(&mut collect(&config)).await;

    assert!(outcome.published);
    assert!(outcome
        .notices
        .iter()
        .any(|n| n.message == "LOCAL MODE: not actually sending payload."));
}

#[test]
fn test_publish_options_default() {
    let options = PublishOptions::default();
    assert!(options.publish);
    assert!(!options.local_mode && !options.cache_payload);
}
