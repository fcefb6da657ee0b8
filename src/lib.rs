//! Blackbox probes - probe exchange for a probing exporter.
//!
//! Probe providers publish namespaced probe and module definitions over a
//! shared relation channel. The exporter side collects them from every
//! connected provider and merges them with a locally supplied probes file
//! into the scrape jobs the monitoring system needs.

pub mod bus;
pub mod config;
pub mod namespace;
pub mod probe;
pub mod provider;
pub mod requirer;
pub mod scrape;
pub mod topology;
pub mod utils;
pub mod validation;

pub use probe::{ModuleMap, ModuleSpec, ProbeSpec, StaticConfig};
pub use provider::ProbeRegistry;
pub use requirer::{AggregatedConfiguration, ProbeCollector, TargetsChanged};
pub use scrape::{ExporterEndpoint, MergedScrapeConfig, ScrapeConfigBuilder};
pub use topology::TopologyIdentity;
