// Plugin adapter lifecycle over an in-memory MCP connection

mod common;

use std::time::Duration;

use serde_json::{Map, Value, json};

use common::{NAMESPACES, connect_fake_cluster};
use kube_discovery::{CapabilityError, PluginError};

fn args(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[tokio::test]
async fn test_tools_discovered_at_startup() {
    let (plugin, cluster) = connect_fake_cluster().await;

    let names: Vec<_> = plugin.tools().iter().map(|t| t.name.to_string()).collect();
    assert_eq!(names, ["kubectl_get", "kubectl_describe", "kubectl_logs", "kubectl_rollout"]);
    assert_eq!(plugin.name(), "kubernetes");
    assert!(plugin.is_running().await);
    // Discovery alone invokes nothing
    assert_eq!(cluster.calls(), 0);

    plugin.stop().await;
}

#[tokio::test]
async fn test_call_returns_text_content() {
    let (plugin, cluster) = connect_fake_cluster().await;

    let out = plugin
        .call("kubectl_get", args(json!({ "resourceType": "namespaces" })))
        .await
        .unwrap();
    assert_eq!(out, NAMESPACES);

    let logs = plugin.call("kubectl_logs", Map::new()).await.unwrap();
    assert_eq!(logs, "line one\nline two");
    assert_eq!(cluster.calls(), 2);

    plugin.stop().await;
}

#[tokio::test]
async fn test_error_result_is_remote_failure() {
    let (plugin, _cluster) = connect_fake_cluster().await;

    let err = plugin
        .call("kubectl_describe", args(json!({ "resourceType": "pod" })))
        .await
        .unwrap_err();

    match err {
        CapabilityError::Remote { name, message } => {
            assert_eq!(name, "kubectl_describe");
            assert!(message.contains("NotFound"), "{message}");
        }
        other => panic!("expected a remote failure, got {other}"),
    }

    plugin.stop().await;
}

#[tokio::test]
async fn test_stop_is_idempotent_and_disables_calls() {
    let (plugin, cluster) = connect_fake_cluster().await;

    assert!(plugin.stop().await);
    assert!(!plugin.stop().await);
    assert!(!plugin.is_running().await);

    let err = plugin
        .call("kubectl_get", args(json!({ "resourceType": "pods" })))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CapabilityError::Plugin(PluginError::Unavailable(_))
    ));
    assert_eq!(cluster.calls(), 0);

    tokio::time::timeout(Duration::from_secs(5), cluster.task)
        .await
        .expect("fake server should exit once the client stops")
        .unwrap();
}

#[tokio::test]
async fn test_dropping_running_plugin_releases_connection() {
    let (plugin, cluster) = connect_fake_cluster().await;
    assert!(plugin.is_running().await);

    drop(plugin);

    tokio::time::timeout(Duration::from_secs(5), cluster.task)
        .await
        .expect("fake server should exit once the plugin is dropped")
        .unwrap();
}

#[tokio::test]
async fn test_crashed_server_fails_calls_without_hanging() {
    let (plugin, cluster) = connect_fake_cluster().await;

    cluster.task.abort();
    let _ = cluster.task.await;

    // Every call after the crash reports the plugin as gone
    for _ in 0..2 {
        let err = tokio::time::timeout(
            Duration::from_secs(5),
            plugin.call("kubectl_get", args(json!({ "resourceType": "pods" }))),
        )
        .await
        .expect("call against a dead plugin must not hang")
        .unwrap_err();

        assert!(
            matches!(err, CapabilityError::Plugin(PluginError::Unavailable(_))),
            "unexpected error: {err}"
        );
    }
    assert!(!plugin.is_running().await);
    assert!(!plugin.stop().await);
}

#[tokio::test]
async fn test_slow_call_times_out() {
    let (plugin, _cluster) = connect_fake_cluster().await;
    let plugin = plugin.with_call_timeout(Duration::from_millis(100));

    let err = plugin.call("kubectl_rollout", Map::new()).await.unwrap_err();

    assert!(matches!(
        err,
        CapabilityError::Plugin(PluginError::Timeout { .. })
    ));
    // A timeout does not take the plugin down
    assert!(plugin.is_running().await);
    plugin.stop().await;
}
