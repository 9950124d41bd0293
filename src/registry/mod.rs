//! # Metric Registry
//!
//! The single shared mutable resource of the exporter: a set of named gauge
//! families, each with a fixed list of label keys and a static help text,
//! holding one `f64` per distinct label-value combination.
//!
//! Families are declared once at startup with [`MetricRegistry::register`].
//! After that the family table is only ever read, so writers and scrapers
//! take an uncontended read lock on it. Series values live in a sharded
//! `metrics_util` registry where every series is its own `AtomicU64`, so a
//! `set` on one series never blocks a `set` on another and a scraper can
//! never observe a half-written value.

mod text;

use metrics::{Key, Label};
use metrics_util::registry::{AtomicStorage, Registry};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::Ordering;
use std::sync::{PoisonError, RwLock};
use thiserror::Error;

pub use text::{encode, CONTENT_TYPE};

/// Errors returned by registry operations.
#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("metric family '{0}' is already registered")]
    AlreadyRegistered(String),
    #[error("metric family '{0}' is not registered")]
    UnknownFamily(String),
    #[error("invalid metric or label name '{0}'")]
    InvalidName(String),
    #[error("metric family '{name}' expects {expected} label values, got {actual}")]
    LabelMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },
    #[error("refusing to store non-finite value {value} for '{name}'")]
    NonFiniteValue { name: String, value: f64 },
}

#[derive(Debug, Clone)]
struct FamilyDescriptor {
    help: &'static str,
    label_keys: Vec<&'static str>,
}

/// A process-wide collection of labeled gauges.
///
/// Construct one per process (or one per test) and share it behind an `Arc`.
pub struct MetricRegistry {
    families: RwLock<BTreeMap<&'static str, FamilyDescriptor>>,
    series: Registry<Key, AtomicStorage>,
}

impl std::fmt::Debug for MetricRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricRegistry").finish_non_exhaustive()
    }
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self {
            families: RwLock::new(BTreeMap::new()),
            series: Registry::new(AtomicStorage),
        }
    }

    /// Declares a gauge family.
    ///
    /// Fails if a family with the same name already exists, or if the name or
    /// any label key is not a valid exposition identifier.
    pub fn register(
        &self,
        name: &'static str,
        help: &'static str,
        label_keys: &[&'static str],
    ) -> Result<(), RegistryError> {
        if !is_valid_metric_name(name) {
            return Err(RegistryError::InvalidName(name.to_string()));
        }
        if let Some(bad) = label_keys.iter().find(|key| !is_valid_label_key(key)) {
            return Err(RegistryError::InvalidName((*bad).to_string()));
        }

        let mut families = self.families.write().unwrap_or_else(PoisonError::into_inner);
        if families.contains_key(name) {
            return Err(RegistryError::AlreadyRegistered(name.to_string()));
        }
        families.insert(
            name,
            FamilyDescriptor {
                help,
                label_keys: label_keys.to_vec(),
            },
        );
        Ok(())
    }

    /// Returns `true` if a family with this name has been registered.
    pub fn is_registered(&self, name: &str) -> bool {
        self.families
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Upserts the current value of one series.
    ///
    /// `label_values` must be given in the order of the family's label keys.
    /// Non-finite values are rejected and leave the previous value in place.
    pub fn set(&self, name: &str, label_values: &[&str], value: f64) -> Result<(), RegistryError> {
        if !value.is_finite() {
            return Err(RegistryError::NonFiniteValue {
                name: name.to_string(),
                value,
            });
        }

        let key = {
            let families = self.families.read().unwrap_or_else(PoisonError::into_inner);
            let (family_name, family) = families
                .get_key_value(name)
                .ok_or_else(|| RegistryError::UnknownFamily(name.to_string()))?;
            if family.label_keys.len() != label_values.len() {
                return Err(RegistryError::LabelMismatch {
                    name: name.to_string(),
                    expected: family.label_keys.len(),
                    actual: label_values.len(),
                });
            }
            let labels: Vec<Label> = family
                .label_keys
                .iter()
                .zip(label_values)
                .map(|(key, value)| Label::new(*key, (*value).to_string()))
                .collect();
            Key::from_parts(*family_name, labels)
        };

        self.series
            .get_or_create_gauge(&key, |gauge| gauge.store(value.to_bits(), Ordering::Release));
        Ok(())
    }

    /// Takes a point-in-time view of every registered family.
    ///
    /// Families are ordered by name and series by label values, so two
    /// snapshots of identical state are equal.
    pub fn snapshot(&self) -> Snapshot {
        let families = self
            .families
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut grouped: HashMap<String, Vec<Sample>> = HashMap::new();
        for (key, gauge) in self.series.get_gauge_handles() {
            let value = f64::from_bits(gauge.load(Ordering::Acquire));
            let label_values = key.labels().map(|label| label.value().to_string()).collect();
            grouped
                .entry(key.name().to_string())
                .or_default()
                .push(Sample { label_values, value });
        }

        let families = families
            .into_iter()
            .map(|(name, descriptor)| {
                let mut samples = grouped.remove(name).unwrap_or_default();
                samples.sort_by(|a, b| a.label_values.cmp(&b.label_values));
                FamilySnapshot {
                    name: name.to_string(),
                    help: descriptor.help.to_string(),
                    label_keys: descriptor.label_keys.iter().map(|k| k.to_string()).collect(),
                    samples,
                }
            })
            .collect();

        Snapshot { families }
    }

    /// Renders the current state in the text exposition format.
    pub fn render(&self) -> String {
        encode(&self.snapshot())
    }
}

/// One series inside a [`FamilySnapshot`].
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub label_values: Vec<String>,
    pub value: f64,
}

/// The state of a single gauge family at snapshot time.
#[derive(Debug, Clone, PartialEq)]
pub struct FamilySnapshot {
    pub name: String,
    pub help: String,
    pub label_keys: Vec<String>,
    pub samples: Vec<Sample>,
}

/// A consistent copy of the whole registry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub families: Vec<FamilySnapshot>,
}

impl Snapshot {
    pub fn family(&self, name: &str) -> Option<&FamilySnapshot> {
        self.families.iter().find(|family| family.name == name)
    }

    /// Looks up the value of one series by its label values.
    pub fn value(&self, name: &str, label_values: &[&str]) -> Option<f64> {
        self.family(name)?
            .samples
            .iter()
            .find(|sample| sample.label_values.iter().map(String::as_str).eq(label_values.iter().copied()))
            .map(|sample| sample.value)
    }

    /// Number of series currently held by a family (zero if unknown).
    pub fn series_count(&self, name: &str) -> usize {
        self.family(name).map_or(0, |family| family.samples.len())
    }

    /// Total number of series across all families.
    pub fn total_series(&self) -> usize {
        self.families.iter().map(|family| family.samples.len()).sum()
    }
}

fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

fn is_valid_label_key(key: &str) -> bool {
    let mut chars = key.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !key.starts_with("__")
}
