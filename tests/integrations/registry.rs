//! Concurrent use of the registry from writers, snapshot readers and scrapes.

use std::sync::Arc;
use swift_exporter::registry::{MetricRegistry, RegistryError};

#[test]
fn test_read_your_writes() {
    let registry = MetricRegistry::new();
    registry.register("nic_mtu", "MTU.", &["nic_name", "FQDN", "UUID"]).unwrap();

    registry.set("nic_mtu", &["eth0", "n1", "u1"], 1500.0).unwrap();
    registry.set("nic_mtu", &["eth0", "n1", "u1"], 9000.0).unwrap();

    let snapshot = registry.snapshot();
    assert_eq!(snapshot.value("nic_mtu", &["eth0", "n1", "u1"]), Some(9000.0));
    assert_eq!(snapshot.series_count("nic_mtu"), 1);
}

#[test]
fn test_rejected_writes_keep_previous_value() {
    let registry = MetricRegistry::new();
    registry.register("cpu_stat", "CPU.", &["cpu_name"]).unwrap();
    registry.set("cpu_stat", &["cpu0"], 0.25).unwrap();

    assert!(matches!(
        registry.set("cpu_stat", &["cpu0"], f64::NAN),
        Err(RegistryError::NonFiniteValue { .. })
    ));
    assert!(matches!(
        registry.set("cpu_stat", &["cpu0", "extra"], 1.0),
        Err(RegistryError::LabelMismatch { expected: 1, actual: 2, .. })
    ));
    assert_eq!(
        registry.set("nope", &[], 1.0),
        Err(RegistryError::UnknownFamily("nope".into()))
    );
    assert_eq!(registry.snapshot().value("cpu_stat", &["cpu0"]), Some(0.25));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_and_readers() {
    const WRITERS: usize = 8;
    const SERIES: usize = 50;
    const ROUNDS: usize = 200;

    let registry = Arc::new(MetricRegistry::new());
    registry
        .register("swift_drive_usage", "Usage.", &["swift_drive_label", "state"])
        .unwrap();

    let mut writers = Vec::new();
    for writer in 0..WRITERS {
        let registry = registry.clone();
        writers.push(tokio::spawn(async move {
            for round in 0..ROUNDS {
                for series in 0..SERIES {
                    let label = format!("d{series}");
                    let state = format!("w{writer}");
                    registry
                        .set("swift_drive_usage", &[label.as_str(), state.as_str()], round as f64)
                        .unwrap();
                }
                tokio::task::yield_now().await;
            }
        }));
    }

    let reader = {
        let registry = registry.clone();
        tokio::spawn(async move {
            let mut previous = 0;
            for _ in 0..100 {
                let snapshot = registry.snapshot();
                let count = snapshot.series_count("swift_drive_usage");
                // Series are never removed, so the count only grows.
                assert!(count >= previous);
                assert!(count <= WRITERS * SERIES);
                for sample in &snapshot.family("swift_drive_usage").unwrap().samples {
                    assert!(sample.value >= 0.0 && sample.value < ROUNDS as f64);
                }
                let body = registry.render();
                assert!(body.is_empty() || body.starts_with("# HELP swift_drive_usage"));
                previous = count;
                tokio::task::yield_now().await;
            }
        })
    };

    for writer in writers {
        writer.await.unwrap();
    }
    reader.await.unwrap();

    let snapshot = registry.snapshot();
    assert_eq!(snapshot.series_count("swift_drive_usage"), WRITERS * SERIES);
    assert_eq!(
        snapshot.value("swift_drive_usage", &["d7", "w3"]),
        Some((ROUNDS - 1) as f64)
    );
}
