//! Exporter-side probe collector.
//!
//! Reads the probes and modules every connected provider published and
//! flattens them into one [`AggregatedConfiguration`]. A [`TargetsChanged`]
//! notification is raised once per relation event that could change the
//! aggregate (a provider's databag changing, or a provider departing).
//!
//! Notifications carry only the relation id. A single event is never
//! assumed to be the only change since the last read, so consumers always
//! recompute the whole aggregate from [`ProbeCollector::aggregate`].

use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info, warn};

use crate::bus::{
    RelationEvent, RelationId, RelationSnapshot, RelationSubscriber, SCRAPE_METADATA,
    SCRAPE_MODULES, SCRAPE_PROBES,
};
use crate::probe::{ModuleMap, ProbeSpec};
use crate::topology::TopologyIdentity;
use crate::validation::validate_probe;

/// Notification capacity for broadcast.
const NOTIFICATION_CAPACITY: usize = 256;

/// The aggregate may have changed; recompute it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetsChanged {
    /// Relation whose event triggered the notification.
    pub relation_id: RelationId,
}

/// Probes and modules flattened across every connected provider.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregatedConfiguration {
    /// In connection order, then publication order.
    pub probes: Vec<ProbeSpec>,
    /// Later providers win on name collision.
    pub modules: ModuleMap,
}

/// One provider's parsed publication.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderProbes {
    pub relation_id: RelationId,
    pub app: String,
    /// `None` when absent or unparseable.
    pub topology: Option<TopologyIdentity>,
    pub probes: Vec<ProbeSpec>,
    pub modules: ModuleMap,
}

/// Collects probe publications from every related provider.
pub struct ProbeCollector {
    subscriber: Arc<dyn RelationSubscriber>,
    sender: broadcast::Sender<TargetsChanged>,
    consuming: Arc<RwLock<bool>>,
}

impl ProbeCollector {
    pub fn new(subscriber: Arc<dyn RelationSubscriber>) -> Self {
        let (sender, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Self {
            subscriber,
            sender,
            consuming: Arc::new(RwLock::new(false)),
        }
    }

    /// Receive change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<TargetsChanged> {
        self.sender.subscribe()
    }

    /// Notification owed for a relation event, if any.
    ///
    /// Joins carry no provider data yet; the provider's first write raises
    /// `Changed`.
    pub fn notification_for(event: &RelationEvent) -> Option<TargetsChanged> {
        match event {
            RelationEvent::Changed(relation_id) | RelationEvent::Departed(relation_id) => {
                Some(TargetsChanged {
                    relation_id: *relation_id,
                })
            }
            RelationEvent::Joined(_) => None,
        }
    }

    /// Handle one relation event, notifying subscribers when owed.
    pub fn handle_event(&self, event: &RelationEvent) -> Option<TargetsChanged> {
        let notification = Self::notification_for(event)?;
        emit(&self.sender, notification);
        Some(notification)
    }

    /// Start forwarding relation events as notifications.
    ///
    /// Calling this more than once has no further effect.
    pub async fn start_consuming(&self) {
        {
            let mut consuming = self.consuming.write().await;
            if *consuming {
                return;
            }
            *consuming = true;
        }

        let mut events = self.subscriber.events();
        let sender = self.sender.clone();

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        if let Some(notification) = Self::notification_for(&event) {
                            emit(&sender, notification);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        error!(skipped = n, "Collector lagged, skipped relation events");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Relation events closed, stopping collector");
                        break;
                    }
                }
            }
        });

        info!("Probe collector started");
    }

    /// Every connected provider's publication, in connection order.
    ///
    /// A malformed field degrades to empty for that provider only.
    pub async fn providers(&self) -> Vec<ProviderProbes> {
        self.subscriber
            .snapshots()
            .await
            .into_iter()
            .map(parse_snapshot)
            .collect()
    }

    /// Probes from every provider, flattened.
    pub async fn probes(&self) -> Vec<ProbeSpec> {
        self.aggregate().await.probes
    }

    /// Modules from every provider; the later provider wins a name collision.
    pub async fn modules(&self) -> ModuleMap {
        self.aggregate().await.modules
    }

    /// Recompute the aggregate from all connections.
    pub async fn aggregate(&self) -> AggregatedConfiguration {
        let mut aggregate = AggregatedConfiguration::default();
        for provider in self.providers().await {
            for probe in &provider.probes {
                if let Err(e) = validate_probe(probe) {
                    warn!(
                        relation_id = %provider.relation_id,
                        app = %provider.app,
                        error = %e,
                        "Provider published an invalid probe"
                    );
                }
            }
            aggregate.probes.extend(provider.probes);
            aggregate.modules.extend(provider.modules);
        }
        aggregate
    }
}

fn emit(sender: &broadcast::Sender<TargetsChanged>, notification: TargetsChanged) {
    match sender.send(notification) {
        Ok(receivers) => debug!(
            relation_id = %notification.relation_id,
            receivers = receivers,
            "Targets changed"
        ),
        Err(_) => debug!(
            relation_id = %notification.relation_id,
            "Targets changed (no receivers)"
        ),
    }
}

fn parse_snapshot(snapshot: RelationSnapshot) -> ProviderProbes {
    let RelationSnapshot {
        relation_id,
        app,
        data,
    } = snapshot;

    let topology = data.get(SCRAPE_METADATA).and_then(|raw| {
        serde_json::from_str(raw)
            .map_err(|e| {
                warn!(relation_id = %relation_id, app = %app, error = %e, "Malformed scrape_metadata");
            })
            .ok()
    });

    let probes = data
        .get(SCRAPE_PROBES)
        .map(|raw| parse_probes(relation_id, &app, raw))
        .unwrap_or_default();

    let modules = data
        .get(SCRAPE_MODULES)
        .and_then(|raw| {
            serde_json::from_str(raw)
                .map_err(|e| {
                    warn!(relation_id = %relation_id, app = %app, error = %e, "Malformed scrape_modules");
                })
                .ok()
        })
        .unwrap_or_default();

    ProviderProbes {
        relation_id,
        app,
        topology,
        probes,
        modules,
    }
}

/// Parse a probe list entry by entry; entries that are not probe objects
/// are dropped.
fn parse_probes(relation_id: RelationId, app: &str, raw: &str) -> Vec<ProbeSpec> {
    let entries: Vec<serde_json::Value> = match serde_json::from_str(raw) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(relation_id = %relation_id, app = %app, error = %e, "Malformed scrape_probes");
            return Vec::new();
        }
    };

    entries
        .into_iter()
        .filter_map(|entry| {
            if !entry.is_object() {
                warn!(relation_id = %relation_id, app = %app, "Skipping non-object probe entry");
                return None;
            }
            serde_json::from_value(entry)
                .map_err(|e| {
                    warn!(relation_id = %relation_id, app = %app, error = %e, "Skipping malformed probe entry");
                })
                .ok()
        })
        .collect()
}
