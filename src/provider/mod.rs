//! Provider-side probe registry.
//!
//! Owns one provider's probes and modules, namespaced under its topology
//! identity whenever they are set, and republishes the full snapshot to every
//! relation whenever a publish trigger fires:
//! - a relation joins or the exporter side changes (see [`ProbeRegistry::start`])
//! - the embedding application calls [`ProbeRegistry::publish`], or
//!   [`ProbeRegistry::publish_probes`] with rebuilt definitions, on its own
//!   refresh triggers
//!
//! Each publish replaces three databag fields: `scrape_metadata`,
//! `scrape_probes` and `scrape_modules`.

use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::bus::{
    self, Databag, RelationEvent, RelationPublisher, SCRAPE_METADATA, SCRAPE_MODULES,
    SCRAPE_PROBES,
};
use crate::namespace::namespace;
use crate::probe::{ModuleMap, ProbeSpec};
use crate::topology::TopologyIdentity;
use crate::validation::{validate_probe, InvalidProbeError};

/// Signal capacity for broadcast.
const SIGNAL_CAPACITY: usize = 64;

/// Signals raised to the embedding application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderSignal {
    /// A probe failed validation; it is still published.
    InvalidProbe(InvalidProbeError),
    /// The snapshot was written to this many relations.
    /// Relations whose write failed are not counted.
    Published { relations: usize },
}

/// Result of a publish attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// This replica is not the elected writer; nothing was written.
    NotWriter,
    Published { relations: usize },
}

/// Validated, namespaced definitions as last set.
struct Snapshot {
    probes: Vec<ProbeSpec>,
    modules: ModuleMap,
    invalid: Vec<InvalidProbeError>,
}

impl Snapshot {
    fn build(topology: &TopologyIdentity, probes: Vec<ProbeSpec>, modules: ModuleMap) -> Self {
        let invalid: Vec<InvalidProbeError> = probes
            .iter()
            .filter_map(|probe| validate_probe(probe).err())
            .collect();
        for err in &invalid {
            warn!(job_name = %err.job_name(), error = %err, "Invalid probe");
        }

        let (probes, modules) = namespace(probes, modules, topology);
        Self {
            probes,
            modules,
            invalid,
        }
    }
}

/// One provider's probes and modules, ready to publish.
pub struct ProbeRegistry {
    publisher: Arc<dyn RelationPublisher>,
    topology: TopologyIdentity,
    snapshot: RwLock<Snapshot>,
    signals: broadcast::Sender<ProviderSignal>,
}

impl ProbeRegistry {
    /// Validate and namespace a provider's definitions.
    ///
    /// Invalid probes are kept; they are reported through
    /// [`ProbeRegistry::invalid_probes`] and as signals on every publish.
    pub fn new(
        publisher: Arc<dyn RelationPublisher>,
        topology: TopologyIdentity,
        probes: Vec<ProbeSpec>,
        modules: ModuleMap,
    ) -> Self {
        let snapshot = Snapshot::build(&topology, probes, modules);
        let (signals, _) = broadcast::channel(SIGNAL_CAPACITY);

        Self {
            publisher,
            topology,
            snapshot: RwLock::new(snapshot),
            signals,
        }
    }

    /// Namespaced probes.
    pub async fn probes(&self) -> Vec<ProbeSpec> {
        self.snapshot.read().await.probes.clone()
    }

    /// Namespaced modules.
    pub async fn modules(&self) -> ModuleMap {
        self.snapshot.read().await.modules.clone()
    }

    pub fn topology(&self) -> &TopologyIdentity {
        &self.topology
    }

    /// Probes that failed validation, by their un-namespaced job names.
    pub async fn invalid_probes(&self) -> Vec<InvalidProbeError> {
        self.snapshot.read().await.invalid.clone()
    }

    pub fn signals(&self) -> broadcast::Receiver<ProviderSignal> {
        self.signals.subscribe()
    }

    /// Replace the definitions later publishes carry.
    pub async fn set_probes(&self, probes: Vec<ProbeSpec>, modules: ModuleMap) {
        let snapshot = Snapshot::build(&self.topology, probes, modules);
        *self.snapshot.write().await = snapshot;
    }

    /// Replace the definitions, then publish them.
    pub async fn publish_probes(
        &self,
        probes: Vec<ProbeSpec>,
        modules: ModuleMap,
    ) -> bus::Result<PublishOutcome> {
        self.set_probes(probes, modules).await;
        self.publish().await
    }

    /// Serialize the snapshot into the databag fields.
    pub async fn databag(&self) -> bus::Result<Databag> {
        let snapshot = self.snapshot.read().await;
        let mut data = Databag::new();
        data.insert(
            SCRAPE_METADATA.to_string(),
            serde_json::to_string(&self.topology)?,
        );
        data.insert(
            SCRAPE_PROBES.to_string(),
            serde_json::to_string(&snapshot.probes)?,
        );
        data.insert(
            SCRAPE_MODULES.to_string(),
            serde_json::to_string(&snapshot.modules)?,
        );
        Ok(data)
    }

    /// Write the full snapshot to every relation.
    ///
    /// Invalid probes are signalled on every attempt, writer or not. Only
    /// the elected writer writes. A failed relation does not stop the
    /// others; the first failure is returned once all were attempted.
    /// Republishing identical content is harmless.
    #[tracing::instrument(name = "provider.publish", skip_all, fields(app = %self.topology.application))]
    pub async fn publish(&self) -> bus::Result<PublishOutcome> {
        for err in self.invalid_probes().await {
            let _ = self.signals.send(ProviderSignal::InvalidProbe(err));
        }

        if !self.publisher.is_writer() {
            debug!("Not the elected writer, skipping publish");
            return Ok(PublishOutcome::NotWriter);
        }

        let data = self.databag().await?;
        let relation_ids = self.publisher.relation_ids().await;
        let mut written = 0;
        let mut first_error = None;
        for relation_id in relation_ids {
            match self.publisher.write(relation_id, data.clone()).await {
                Ok(()) => written += 1,
                Err(e) => {
                    warn!(relation_id = %relation_id, error = %e, "Write to relation failed");
                    first_error.get_or_insert(e);
                }
            }
        }

        let _ = self
            .signals
            .send(ProviderSignal::Published { relations: written });
        info!(relations = written, "Published probes");

        match first_error {
            Some(e) => Err(e),
            None => Ok(PublishOutcome::Published { relations: written }),
        }
    }

    /// Republish on relation lifecycle triggers.
    ///
    /// Spawns a task that publishes whenever a relation joins or the
    /// exporter side changes.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        let mut events = registry.publisher.events();

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(RelationEvent::Joined(relation_id))
                    | Ok(RelationEvent::Changed(relation_id)) => {
                        debug!(relation_id = %relation_id, "Publish trigger");
                        if let Err(e) = registry.publish().await {
                            error!(relation_id = %relation_id, error = %e, "Publish failed");
                        }
                    }
                    Ok(RelationEvent::Departed(_)) => {}
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // Snapshots are full replaces, one publish covers every missed trigger
                        warn!(skipped = n, "Provider lagged on relation events");
                        if let Err(e) = registry.publish().await {
                            error!(error = %e, "Publish failed");
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Relation events closed, stopping provider");
                        break;
                    }
                }
            }
        })
    }
}
