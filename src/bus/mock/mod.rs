//! Mock relation publisher for testing.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};

use super::{BusError, Databag, RelationEvent, RelationId, RelationPublisher, Result};

/// Mock publisher that records every write.
pub struct MockRelationPublisher {
    relations: RwLock<Vec<RelationId>>,
    written: RwLock<Vec<(RelationId, Databag)>>,
    writer: AtomicBool,
    fail_on_write: RwLock<bool>,
    failing_relations: RwLock<Vec<RelationId>>,
    sender: broadcast::Sender<RelationEvent>,
}

impl MockRelationPublisher {
    pub fn new(relations: Vec<RelationId>) -> Self {
        let (sender, _) = broadcast::channel(16);
        Self {
            relations: RwLock::new(relations),
            written: RwLock::new(Vec::new()),
            writer: AtomicBool::new(true),
            fail_on_write: RwLock::new(false),
            failing_relations: RwLock::new(Vec::new()),
            sender,
        }
    }

    pub fn set_writer(&self, writer: bool) {
        self.writer.store(writer, Ordering::SeqCst);
    }

    pub async fn set_fail_on_write(&self, fail: bool) {
        *self.fail_on_write.write().await = fail;
    }

    /// Fail writes to one relation only.
    pub async fn fail_relation(&self, relation_id: RelationId) {
        self.failing_relations.write().await.push(relation_id);
    }

    pub async fn add_relation(&self, relation_id: RelationId) {
        self.relations.write().await.push(relation_id);
    }

    /// Deliver a lifecycle event to subscribers.
    pub fn emit(&self, event: RelationEvent) {
        let _ = self.sender.send(event);
    }

    pub async fn written_count(&self) -> usize {
        self.written.read().await.len()
    }

    pub async fn take_written(&self) -> Vec<(RelationId, Databag)> {
        std::mem::take(&mut *self.written.write().await)
    }
}

#[async_trait]
impl RelationPublisher for MockRelationPublisher {
    fn is_writer(&self) -> bool {
        self.writer.load(Ordering::SeqCst)
    }

    async fn relation_ids(&self) -> Vec<RelationId> {
        self.relations.read().await.clone()
    }

    async fn write(&self, relation_id: RelationId, data: Databag) -> Result<()> {
        if *self.fail_on_write.read().await {
            return Err(BusError::Write("Mock write failure".to_string()));
        }
        if self.failing_relations.read().await.contains(&relation_id) {
            return Err(BusError::Write(format!("Mock write failure on relation {}", relation_id)));
        }
        if !self.relations.read().await.contains(&relation_id) {
            return Err(BusError::RelationNotFound(relation_id));
        }
        self.written.write().await.push((relation_id, data));
        Ok(())
    }

    fn events(&self) -> broadcast::Receiver<RelationEvent> {
        self.sender.subscribe()
    }
}
