//! systemd state of the Swift services.

use super::{Collector, CollectorContext, CollectorError, FamilySpec};
use crate::config::Module;
use async_trait::async_trait;
use tracing::warn;

static FAMILIES: &[FamilySpec] = &[
    FamilySpec::new(
        "swift_service_status",
        "1 if the Swift service unit is active, 0 otherwise.",
        &["FQDN", "UUID", "SwiftServiceName"],
    ),
    FamilySpec::new(
        "swift_sub_service_status",
        "1 if the Swift background daemon unit is active, 0 otherwise.",
        &["FQDN", "UUID", "SwiftSubServiceName"],
    ),
];

pub struct ServiceStatusCollector;

impl ServiceStatusCollector {
    async fn publish(&self, ctx: &CollectorContext, family: &str, units: &[String]) -> Result<(), CollectorError> {
        for unit in units {
            let active = match ctx.probes.services.is_active(unit).await {
                Ok(active) => active,
                Err(e) => {
                    warn!(collector = self.name(), unit = %unit, error = %e, "Failed to query unit state");
                    continue;
                }
            };
            let value = if active { 1.0 } else { 0.0 };
            ctx.set(family, &[ctx.fqdn(), ctx.uuid(), unit.as_str()], value)?;
        }
        Ok(())
    }
}

#[async_trait]
impl Collector for ServiceStatusCollector {
    fn name(&self) -> &'static str {
        "services"
    }

    fn module(&self) -> Module {
        Module::CheckSwiftService
    }

    fn families(&self) -> &'static [FamilySpec] {
        FAMILIES
    }

    async fn collect(&self, ctx: &CollectorContext) -> Result<(), CollectorError> {
        self.publish(ctx, "swift_service_status", &ctx.config.swift_services)
            .await?;
        self.publish(ctx, "swift_sub_service_status", &ctx.config.swift_sub_services)
            .await
    }
}
