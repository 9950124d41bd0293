//! Host-level statistics: CPU, network interfaces and object-server sockets.

use super::{Collector, CollectorContext, CollectorError, FamilySpec};
use crate::config::Module;
use crate::derived::{self, CpuTimes};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

static CONNECTION_FAMILIES: &[FamilySpec] = &[FamilySpec::new(
    "swift_object_server_connection",
    "Number of open TCP connections on the object server port.",
    &["FQDN", "UUID"],
)];

pub struct ObjectServerConnectionCollector;

#[async_trait]
impl Collector for ObjectServerConnectionCollector {
    fn name(&self) -> &'static str {
        "object_server_connections"
    }

    fn module(&self) -> Module {
        Module::CheckObjectServerConnection
    }

    fn families(&self) -> &'static [FamilySpec] {
        CONNECTION_FAMILIES
    }

    async fn collect(&self, ctx: &CollectorContext) -> Result<(), CollectorError> {
        let count = ctx
            .probes
            .system
            .tcp_sockets_on_port(ctx.config.object_server_port)
            .await?;
        ctx.set("swift_object_server_connection", &[ctx.fqdn(), ctx.uuid()], count as f64)?;
        Ok(())
    }
}

static CPU_FAMILIES: &[FamilySpec] = &[FamilySpec::new(
    "cpu_stat",
    "Share of CPU time per state since the previous collection (1.0 = 100%).",
    &["cpu_name", "metrics_name", "FQDN", "UUID"],
)];

/// Per-CPU time breakdown. Keeps the previous sample of each CPU so the
/// published shares cover the last interval only.
#[derive(Debug, Default)]
pub struct CpuCollector {
    previous: Mutex<HashMap<String, CpuTimes>>,
}

#[async_trait]
impl Collector for CpuCollector {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn module(&self) -> Module {
        Module::ExposePerCPUUsage
    }

    fn families(&self) -> &'static [FamilySpec] {
        CPU_FAMILIES
    }

    async fn collect(&self, ctx: &CollectorContext) -> Result<(), CollectorError> {
        let samples = ctx.probes.system.cpu_times().await?;

        let breakdowns: Vec<_> = {
            let mut previous = self.previous.lock().unwrap_or_else(PoisonError::into_inner);
            samples
                .into_iter()
                .map(|sample| {
                    let shares = derived::cpu_breakdown(previous.get(&sample.name), &sample.times);
                    previous.insert(sample.name.clone(), sample.times);
                    (sample.name, shares)
                })
                .collect()
        };

        for (cpu, shares) in breakdowns {
            let Some(shares) = shares else {
                continue;
            };
            for (state, share) in shares {
                ctx.set("cpu_stat", &[cpu.as_str(), state, ctx.fqdn(), ctx.uuid()], share)?;
            }
        }
        Ok(())
    }
}

static NIC_FAMILIES: &[FamilySpec] = &[FamilySpec::new(
    "nic_stat",
    "Cumulative network interface counters.",
    &["nic_name", "mac_address", "metrics_name", "FQDN", "UUID"],
)];

pub struct NicCollector;

#[async_trait]
impl Collector for NicCollector {
    fn name(&self) -> &'static str {
        "nic"
    }

    fn module(&self) -> Module {
        Module::ExposePerNICMetric
    }

    fn families(&self) -> &'static [FamilySpec] {
        NIC_FAMILIES
    }

    async fn collect(&self, ctx: &CollectorContext) -> Result<(), CollectorError> {
        for nic in ctx.probes.system.nic_counters().await? {
            for (metric, value) in [
                ("byte_sent", nic.bytes_sent),
                ("byte_recv", nic.bytes_recv),
                ("pckt_sent", nic.packets_sent),
                ("pckt_recv", nic.packets_recv),
                ("err_in", nic.errors_in),
                ("err_out", nic.errors_out),
            ] {
                ctx.set(
                    "nic_stat",
                    &[nic.name.as_str(), nic.mac_address.as_str(), metric, ctx.fqdn(), ctx.uuid()],
                    value as f64,
                )?;
            }
        }
        Ok(())
    }
}

static MTU_FAMILIES: &[FamilySpec] = &[FamilySpec::new(
    "nic_mtu",
    "MTU of each physical network interface.",
    &["nic_name", "FQDN", "UUID"],
)];

pub struct NicMtuCollector;

#[async_trait]
impl Collector for NicMtuCollector {
    fn name(&self) -> &'static str {
        "nic_mtu"
    }

    fn module(&self) -> Module {
        Module::GrabNICMTU
    }

    fn families(&self) -> &'static [FamilySpec] {
        MTU_FAMILIES
    }

    async fn collect(&self, ctx: &CollectorContext) -> Result<(), CollectorError> {
        for (nic, mtu) in ctx.probes.system.nic_mtus().await? {
            ctx.set("nic_mtu", &[nic.as_str(), ctx.fqdn(), ctx.uuid()], f64::from(mtu))?;
        }
        Ok(())
    }
}
