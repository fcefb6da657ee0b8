//! In-process relation channel.
//!
//! Uses tokio broadcast channels for lifecycle notifications and shared
//! databags for relation data, all within a single process. Ideal for
//! embedding both sides in one application and for testing without a
//! platform relation mechanism.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};

use super::{
    BusError, Databag, RelationEvent, RelationId, RelationPublisher, RelationSnapshot,
    RelationSubscriber, Result,
};

/// Channel capacity for broadcast.
const CHANNEL_CAPACITY: usize = 1024;

/// One provider's side of a relation, held by the exporter end.
struct RelationSlot {
    relation_id: RelationId,
    app: String,
    data: Databag,
    /// Lifecycle events for the provider on the other end.
    provider_events: broadcast::Sender<RelationEvent>,
}

/// Exporter end of the relation channel.
///
/// Every related provider owns one databag here. Writes that change a
/// databag raise `Changed` to subscribers; writes of identical content do
/// not. Cloning shares the same relations and notification channel.
#[derive(Clone)]
pub struct ChannelRelationBus {
    relations: Arc<RwLock<Vec<RelationSlot>>>,
    sender: broadcast::Sender<RelationEvent>,
    next_id: Arc<AtomicU64>,
}

impl ChannelRelationBus {
    /// Create a new exporter end with no related providers.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            relations: Arc::new(RwLock::new(Vec::new())),
            sender,
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Relate a provider to this exporter.
    ///
    /// Both sides observe `Joined`.
    pub async fn relate(&self, provider: &ChannelProvider) -> RelationId {
        let relation_id = RelationId(self.next_id.fetch_add(1, Ordering::SeqCst));

        self.relations.write().await.push(RelationSlot {
            relation_id,
            app: provider.app().to_string(),
            data: Databag::new(),
            provider_events: provider.sender.clone(),
        });
        provider.attach(relation_id, self.clone()).await;

        info!(
            relation_id = %relation_id,
            app = %provider.app(),
            "Provider related"
        );

        // No receivers is fine on either side
        let _ = self.sender.send(RelationEvent::Joined(relation_id));
        let _ = provider.sender.send(RelationEvent::Joined(relation_id));

        relation_id
    }

    /// Remove a relation and its databag.
    ///
    /// Both sides observe `Departed`.
    pub async fn depart(&self, relation_id: RelationId) -> Result<()> {
        let slot = {
            let mut relations = self.relations.write().await;
            let index = relations
                .iter()
                .position(|slot| slot.relation_id == relation_id)
                .ok_or(BusError::RelationNotFound(relation_id))?;
            relations.remove(index)
        };

        info!(relation_id = %relation_id, app = %slot.app, "Provider departed");

        let _ = self.sender.send(RelationEvent::Departed(relation_id));
        let _ = slot
            .provider_events
            .send(RelationEvent::Departed(relation_id));
        Ok(())
    }

    /// Whether the relation is still established.
    pub async fn contains(&self, relation_id: RelationId) -> bool {
        self.relations
            .read()
            .await
            .iter()
            .any(|slot| slot.relation_id == relation_id)
    }

    /// Replace a provider's databag. Returns whether the content changed.
    async fn update(&self, relation_id: RelationId, data: Databag) -> Result<bool> {
        {
            let mut relations = self.relations.write().await;
            let slot = relations
                .iter_mut()
                .find(|slot| slot.relation_id == relation_id)
                .ok_or(BusError::RelationNotFound(relation_id))?;

            if slot.data == data {
                debug!(relation_id = %relation_id, "Databag unchanged, no change event");
                return Ok(false);
            }
            slot.data = data;
        }

        match self.sender.send(RelationEvent::Changed(relation_id)) {
            Ok(receivers) => {
                debug!(
                    relation_id = %relation_id,
                    receivers = receivers,
                    "Databag changed"
                );
            }
            Err(_) => {
                debug!(relation_id = %relation_id, "Databag changed (no receivers)");
            }
        }
        Ok(true)
    }
}

impl Default for ChannelRelationBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RelationSubscriber for ChannelRelationBus {
    async fn snapshots(&self) -> Vec<RelationSnapshot> {
        self.relations
            .read()
            .await
            .iter()
            .map(|slot| RelationSnapshot {
                relation_id: slot.relation_id,
                app: slot.app.clone(),
                data: slot.data.clone(),
            })
            .collect()
    }

    fn events(&self) -> broadcast::Receiver<RelationEvent> {
        self.sender.subscribe()
    }
}

/// Provider end of the relation channel.
///
/// Writer status stands in for the platform's leader election; a provider
/// created with [`ChannelProvider::new`] is the writer.
pub struct ChannelProvider {
    app: String,
    writer: AtomicBool,
    relations: RwLock<Vec<(RelationId, ChannelRelationBus)>>,
    sender: broadcast::Sender<RelationEvent>,
}

impl ChannelProvider {
    /// Create a provider that may write.
    pub fn new(app: impl Into<String>) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            app: app.into(),
            writer: AtomicBool::new(true),
            relations: RwLock::new(Vec::new()),
            sender,
        }
    }

    /// Create a read-only replica.
    pub fn follower(app: impl Into<String>) -> Self {
        let provider = Self::new(app);
        provider.set_writer(false);
        provider
    }

    pub fn app(&self) -> &str {
        &self.app
    }

    pub fn set_writer(&self, writer: bool) {
        self.writer.store(writer, Ordering::SeqCst);
    }

    async fn attach(&self, relation_id: RelationId, bus: ChannelRelationBus) {
        self.relations.write().await.push((relation_id, bus));
    }

    async fn bus_for(&self, relation_id: RelationId) -> Option<ChannelRelationBus> {
        self.relations
            .read()
            .await
            .iter()
            .find(|(id, _)| *id == relation_id)
            .map(|(_, bus)| bus.clone())
    }
}

#[async_trait]
impl RelationPublisher for ChannelProvider {
    fn is_writer(&self) -> bool {
        self.writer.load(Ordering::SeqCst)
    }

    /// Live relations; departed ones are pruned.
    async fn relation_ids(&self) -> Vec<RelationId> {
        let attached: Vec<_> = self.relations.read().await.clone();
        let mut live = Vec::with_capacity(attached.len());
        let mut departed = Vec::new();
        for (relation_id, bus) in attached {
            if bus.contains(relation_id).await {
                live.push(relation_id);
            } else {
                departed.push(relation_id);
            }
        }

        if !departed.is_empty() {
            self.relations
                .write()
                .await
                .retain(|(relation_id, _)| !departed.contains(relation_id));
        }
        live
    }

    #[tracing::instrument(name = "bus.write", skip_all, fields(app = %self.app, relation_id = %relation_id))]
    async fn write(&self, relation_id: RelationId, data: Databag) -> Result<()> {
        let bus = self
            .bus_for(relation_id)
            .await
            .ok_or(BusError::RelationNotFound(relation_id))?;
        bus.update(relation_id, data).await?;
        Ok(())
    }

    fn events(&self) -> broadcast::Receiver<RelationEvent> {
        self.sender.subscribe()
    }
}
