//! End-to-end: build the app over fakes and fixture files, then scrape it.

use std::sync::Arc;
use std::time::Duration;
use swift_exporter::{
    registry::CONTENT_TYPE,
    sources::{cluster::SwiftInfoClient, DriveKind, Mount},
    swift::SwiftVersion,
    Module,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[path = "../helpers/mod.rs"]
mod helpers;
use helpers::{
    app::TestAppBuilder,
    fixtures::{SwiftNode, NODE_UUID},
};

const FQDN: &str = "storage01.example.com";
const WAIT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_scrape_serves_script_version_with_exposition_content_type() {
    let node = SwiftNode::new();
    let app = TestAppBuilder::new(node.config()).build().await.unwrap();

    let response = app.scrape().await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()[reqwest::header::CONTENT_TYPE].to_str().unwrap(),
        CONTENT_TYPE
    );
    let body = response.text().await.unwrap();
    assert!(body.contains("# TYPE ac_script_version gauge"));
    assert!(body.contains(&format!(
        "ac_script_version{{script_version=\"{}\"}} 0",
        env!("CARGO_PKG_VERSION")
    )));

    app.shutdown(WAIT).await.unwrap();
}

#[tokio::test]
async fn test_collected_values_appear_in_scrape() {
    let node = SwiftNode::new();
    let app = TestAppBuilder::new(node.config())
        .with_fakes(|fakes| {
            fakes.cluster.set_version(Some(SwiftVersion::new(2, 20)));
            fakes.system.set_mounts(vec![Mount {
                device: "/dev/sdb1".into(),
                mount_point: node.drive_root().join("d1"),
                kind: DriveKind::Hdd,
            }]);
            fakes.system.set_sockets(6000, 3);
        })
        .build()
        .await
        .unwrap();

    let value = app
        .wait_for("swift_object_server_connection", &[FQDN, NODE_UUID], WAIT)
        .await;
    assert_eq!(value, Some(3.0));
    assert_eq!(
        app.wait_for("object_server", &["server", "async_pending", FQDN, NODE_UUID], WAIT)
            .await,
        Some(7.0)
    );
    assert_eq!(
        app.wait_for(
            "swift_drive_primary_partitions",
            &[FQDN, NODE_UUID, "d1", "Silver", "objects-1", "HDD"],
            WAIT
        )
        .await,
        Some(300.0)
    );

    let body = app.scrape_body().await.unwrap();
    assert!(body.contains(&format!(
        "swift_object_server_connection{{FQDN=\"{FQDN}\",UUID=\"{NODE_UUID}\"}} 3"
    )));
    // Families that were never set are not rendered.
    assert!(!body.contains("swift_drive_reallocated_sector_count"));

    app.shutdown(WAIT).await.unwrap();
}

#[tokio::test]
async fn test_values_stay_published_after_inputs_disappear() {
    let node = SwiftNode::new();
    let app = TestAppBuilder::new(node.config()).build().await.unwrap();
    let labels = ["auditor", "passed", FQDN, NODE_UUID];

    assert_eq!(app.wait_for("account_server", &labels, WAIT).await, Some(12.0));

    node.remove("account.recon");
    node.remove("object.recon");
    // Let at least two more one-second cycles fail.
    tokio::time::sleep(Duration::from_millis(2500)).await;

    assert_eq!(app.registry.snapshot().value("account_server", &labels), Some(12.0));
    let body = app.scrape_body().await.unwrap();
    assert!(body.contains(&format!(
        "account_server{{service_name=\"auditor\",metrics_name=\"passed\",FQDN=\"{FQDN}\",UUID=\"{NODE_UUID}\"}} 12"
    )));

    app.shutdown(WAIT).await.unwrap();
}

#[tokio::test]
async fn test_missing_prerequisites_are_disabled_at_startup() {
    let node = SwiftNode::new();
    node.remove("container.recon");
    let app = TestAppBuilder::new(node.config()).build().await.unwrap();

    tokio::time::sleep(Duration::from_millis(1500)).await;
    let snapshot = app.registry.snapshot();
    assert_eq!(snapshot.series_count("account_server"), 0);
    assert_eq!(snapshot.series_count("object_server"), 0);

    app.shutdown(WAIT).await.unwrap();
}

#[tokio::test]
async fn test_unknown_identity_falls_back_to_unknown_labels() {
    let node = SwiftNode::new();
    node.remove("ssnode.conf");
    let app = TestAppBuilder::new(node.config().with_only(&[Module::CheckObjectServerConnection]))
        .with_fakes(|fakes| {
            fakes.commands.set_fqdn(None);
            fakes.system.set_sockets(6000, 1);
        })
        .build()
        .await
        .unwrap();

    assert_eq!(
        app.wait_for("swift_object_server_connection", &["unknown", "unknown"], WAIT)
            .await,
        Some(1.0)
    );
    app.shutdown(WAIT).await.unwrap();
}

#[tokio::test]
async fn test_swift_version_is_read_from_the_proxy() {
    let proxy = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "swift": {"version": "2.20.1"}
        })))
        .mount(&proxy)
        .await;
    let client = SwiftInfoClient::new(format!("{}/info", proxy.uri()), Duration::from_secs(2)).unwrap();

    let node = SwiftNode::new();
    let app = TestAppBuilder::new(node.config().with_only(&[Module::ReadReconFile]))
        .with_cluster(Arc::new(client))
        .build()
        .await
        .unwrap();

    assert_eq!(
        app.wait_for(
            "swift_object_replication_per_disk",
            &["replicator_per_disk", "attempted", "d1", FQDN, NODE_UUID],
            WAIT
        )
        .await,
        Some(30.0)
    );
    app.shutdown(WAIT).await.unwrap();
}

#[tokio::test]
async fn test_self_metrics_follow_the_registry_body() {
    let node = SwiftNode::new();
    let app = TestAppBuilder::new(node.config().with_only(&[Module::CheckObjectServerConnection]))
        .with_config_modifier(|config| config.self_metrics = true)
        .build()
        .await
        .unwrap();
    let runs = "swift_exporter_collector_runs_total{collector=\"object_server_connections\",outcome=\"success\"}";

    // The run is counted once the collector returns, just after its write.
    let deadline = tokio::time::Instant::now() + WAIT;
    let body = loop {
        let body = app.scrape_body().await.unwrap();
        if body.contains(runs) || tokio::time::Instant::now() >= deadline {
            break body;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    };
    assert!(body.contains(runs));
    let registry_at = body.find("# TYPE ac_script_version gauge").unwrap();
    let scrapes_at = body.find("swift_exporter_scrapes_total").unwrap();
    assert!(registry_at < scrapes_at);

    app.shutdown(WAIT).await.unwrap();
}
