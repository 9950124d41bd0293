//! Collaborators implemented by running system utilities.

use super::{DiskUsageProbe, DriveHealthProbe, HostnameProbe, ServiceProbe, SmartReport, SourceError};
use async_trait::async_trait;
use std::path::Path;
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;
use tracing::trace;

/// Runs `du`, `smartctl`, `systemctl` and `hostname`, each bounded by a
/// timeout. A command still running when the timeout fires is killed.
#[derive(Debug, Clone)]
pub struct SystemCommands {
    timeout: Duration,
}

impl SystemCommands {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn run(&self, program: &str, args: &[&str]) -> Result<Output, SourceError> {
        let rendered = render(program, args);
        trace!(command = %rendered, "Running command");

        let child = Command::new(program).args(args).kill_on_drop(true).output();
        match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(SourceError::Command {
                command: rendered,
                reason: e.to_string(),
            }),
            Err(_) => Err(SourceError::Timeout(rendered)),
        }
    }
}

fn render(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

fn failed(command: String, output: &Output) -> SourceError {
    SourceError::Command {
        command,
        reason: format!(
            "exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ),
    }
}

/// Parses the first field of `du -s` output (`315160\t/srv/node/d5/objects`).
pub fn parse_du_output(stdout: &str) -> Result<u64, SourceError> {
    let first = stdout
        .split_whitespace()
        .next()
        .ok_or_else(|| SourceError::parse("du", "empty output"))?;
    first.parse().map_err(|e| SourceError::parse("du", e))
}

#[async_trait]
impl DiskUsageProbe for SystemCommands {
    async fn directory_usage_kib(&self, path: &Path) -> Result<u64, SourceError> {
        let path = path.to_string_lossy();
        let output = self.run("du", &["-s", &path]).await?;
        if !output.status.success() {
            return Err(failed(render("du", &["-s", &path]), &output));
        }
        parse_du_output(&String::from_utf8_lossy(&output.stdout))
    }
}

#[async_trait]
impl DriveHealthProbe for SystemCommands {
    async fn smart_report(&self, device: &str) -> Result<SmartReport, SourceError> {
        // smartctl encodes drive warnings in its exit status bits, so a
        // non-zero status with output on stdout is still a usable report.
        let info = self.run("smartctl", &["-i", device]).await?;
        let attributes = self.run("smartctl", &["-A", device]).await?;
        if attributes.stdout.is_empty() {
            return Err(failed(render("smartctl", &["-A", device]), &attributes));
        }
        Ok(SmartReport {
            info: String::from_utf8_lossy(&info.stdout).into_owned(),
            attributes: String::from_utf8_lossy(&attributes.stdout).into_owned(),
        })
    }
}

#[async_trait]
impl ServiceProbe for SystemCommands {
    async fn is_active(&self, unit: &str) -> Result<bool, SourceError> {
        let output = self.run("systemctl", &["check", unit]).await?;
        let state = String::from_utf8_lossy(&output.stdout);
        Ok(output.status.success() && state.trim() == "active")
    }
}

#[async_trait]
impl HostnameProbe for SystemCommands {
    async fn fqdn(&self) -> Result<String, SourceError> {
        let output = self.run("hostname", &["-f"]).await?;
        if !output.status.success() {
            return Err(failed(render("hostname", &["-f"]), &output));
        }
        let fqdn = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if fqdn.is_empty() {
            return Err(SourceError::parse("hostname -f", "empty output"));
        }
        Ok(fqdn)
    }
}
