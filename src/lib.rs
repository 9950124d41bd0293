//! swift-exporter - a Prometheus exporter for OpenStack Swift storage nodes.
//!
//! Collectors read recon caches, replication progress, kernel counters and a
//! handful of system commands, then upsert gauges into a shared
//! [`MetricRegistry`]. Five collection tasks run on fixed cadences and an
//! HTTP server renders the registry on every scrape.

pub mod app;
pub mod cli;
pub mod collectors;
pub mod config;
pub mod derived;
pub mod identity;
pub mod internal_metrics;
pub mod registry;
pub mod scheduler;
pub mod sources;
pub mod swift;
pub mod task_manager;

pub use config::{Config, Module};
pub use registry::MetricRegistry;
