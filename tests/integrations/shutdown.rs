//! Graceful shutdown of every task the app spawns.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use swift_exporter::collectors::{Collector, CollectorContext, CollectorError, FamilySpec};
use swift_exporter::Module;
use tokio::time::timeout;

#[path = "../helpers/mod.rs"]
mod helpers;
use helpers::{app::TestAppBuilder, fixtures::SwiftNode};

/// Never finishes on its own.
struct Stuck;

#[async_trait::async_trait]
impl Collector for Stuck {
    fn name(&self) -> &'static str {
        "stuck"
    }

    fn module(&self) -> Module {
        Module::RunSMARTCTL
    }

    fn families(&self) -> &'static [FamilySpec] {
        &[]
    }

    async fn collect(&self, _ctx: &CollectorContext) -> Result<(), CollectorError> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

#[tokio::test]
async fn test_app_shuts_down_promptly() -> Result<()> {
    let node = SwiftNode::new();
    let app = TestAppBuilder::new(node.config()).build().await?;
    tokio::time::sleep(Duration::from_millis(200)).await;
    app.shutdown(Duration::from_secs(5)).await
}

#[tokio::test]
async fn test_shutdown_interrupts_a_hung_collector() -> Result<()> {
    let node = SwiftNode::new();
    let app = TestAppBuilder::new(node.config())
        .with_collectors(vec![Arc::new(Stuck)])
        .build()
        .await?;
    tokio::time::sleep(Duration::from_millis(200)).await;
    app.shutdown(Duration::from_secs(5)).await
}

#[tokio::test]
async fn test_server_stops_accepting_after_shutdown() -> Result<()> {
    let node = SwiftNode::new();
    let app = TestAppBuilder::new(node.config()).build().await?;
    let url = app.metrics_url();
    assert!(reqwest::get(&url).await?.status().is_success());

    app.shutdown(Duration::from_secs(5)).await?;

    let after = timeout(Duration::from_secs(2), reqwest::get(&url)).await;
    assert!(matches!(after, Ok(Err(_))), "scrape after shutdown should fail to connect");
    Ok(())
}
