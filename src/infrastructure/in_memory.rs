use crate::domain::contract::{ContractEvent, ContractStage, NewContractEvent};
use crate::domain::ports::EventLog;
use crate::error::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory event log.
///
/// Uses `Arc<RwLock<Vec<ContractEvent>>>` so clones share the same log.
/// Ids start at 1 and timestamps never go backwards, mirroring what the
/// database backend guarantees. Nothing survives a restart, so this is meant
/// for development and tests.
#[derive(Default, Clone)]
pub struct InMemoryEventLog {
    events: Arc<RwLock<Vec<ContractEvent>>>,
}

impl InMemoryEventLog {
    /// Creates a new, empty in-memory event log.
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }
}

#[async_trait]
impl EventLog for InMemoryEventLog {
    async fn log_event(&self, event: NewContractEvent) -> Result<i64> {
        let mut events = self.events.write().await;
        let id = events.last().map_or(1, |last| last.id + 1);
        let now = Utc::now();
        let created_at = events
            .last()
            .map_or(now, |last| last.created_at.max(now));

        events.push(ContractEvent {
            id,
            contract_id: event.contract_id,
            payload: event.payload,
            order_id: event.order_id,
            created_at,
        });
        Ok(id)
    }

    async fn get_contract_by_id(&self, id: i64) -> Result<Option<ContractEvent>> {
        let events = self.events.read().await;
        Ok(events
            .iter()
            .find(|e| e.id == id && e.stage() == ContractStage::FormSubmitted)
            .cloned())
    }

    async fn get_contract_events(&self, contract_id: i64) -> Result<Vec<ContractEvent>> {
        let events = self.events.read().await;
        // Appended in id and time order already.
        Ok(events
            .iter()
            .filter(|e| e.id == contract_id || e.contract_id == Some(contract_id))
            .cloned()
            .collect())
    }
}
