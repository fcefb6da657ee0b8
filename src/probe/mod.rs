//! Probe and module definitions exchanged between providers and the exporter.
//!
//! Each type keeps the fields this crate interprets as typed members and
//! carries every other key in an `extra` side-map, so definitions survive a
//! parse/serialize round trip without losing options the exporter or the
//! monitoring system understand.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Unrecognized keys preserved verbatim.
pub type Extra = serde_json::Map<String, serde_json::Value>;

/// Probing module definitions keyed by module name.
pub type ModuleMap = BTreeMap<String, ModuleSpec>;

/// Key under `params` listing the probing modules a job uses.
pub const MODULE_PARAM: &str = "module";

/// One monitoring job contributed by a provider.
///
/// A subset of the monitoring system's `<scrape_config>`: `job_name`,
/// `params` and `static_configs` are interpreted, anything else is passed
/// through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub job_name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub static_configs: Vec<StaticConfig>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl ProbeSpec {
    /// Create a probe for the given modules and targets.
    pub fn new(
        job_name: impl Into<String>,
        modules: impl IntoIterator<Item = impl Into<String>>,
        static_configs: Vec<StaticConfig>,
    ) -> Self {
        let mut params = BTreeMap::new();
        params.insert(
            MODULE_PARAM.to_string(),
            modules.into_iter().map(Into::into).collect(),
        );
        Self {
            job_name: job_name.into(),
            params,
            static_configs,
            extra: Extra::new(),
        }
    }

    /// Module names referenced by `params.module`, empty if absent.
    pub fn modules(&self) -> &[String] {
        self.params
            .get(MODULE_PARAM)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub(crate) fn modules_mut(&mut self) -> Option<&mut Vec<String>> {
        self.params.get_mut(MODULE_PARAM)
    }
}

/// A group of targets sharing the same labels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaticConfig {
    #[serde(default)]
    pub targets: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl StaticConfig {
    pub fn new(targets: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            targets: targets.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(name.into(), value.into());
        self
    }
}

/// A named probing strategy.
///
/// Only the name (the key in a [`ModuleMap`]) matters to this crate; the
/// prober-specific options are opaque and kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub prober: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl ModuleSpec {
    pub fn new(prober: impl Into<String>) -> Self {
        Self {
            prober: prober.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: impl Into<String>) -> Self {
        self.timeout = Some(timeout.into());
        self
    }
}
