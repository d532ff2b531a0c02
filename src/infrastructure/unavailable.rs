use crate::domain::contract::{ContractEvent, NewContractEvent};
use crate::domain::ports::EventLog;
use crate::error::{CheckoutError, Result};
use async_trait::async_trait;

/// Stand-in event log for when the database is not configured.
///
/// The service still starts; every store operation fails with the
/// configuration error so the problem surfaces as a 500 on first use.
#[derive(Debug, Clone)]
pub struct UnavailableEventLog {
    reason: String,
}

impl UnavailableEventLog {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn error(&self) -> CheckoutError {
        CheckoutError::ConfigError(self.reason.clone())
    }
}

#[async_trait]
impl EventLog for UnavailableEventLog {
    async fn log_event(&self, _event: NewContractEvent) -> Result<i64> {
        Err(self.error())
    }

    async fn get_contract_by_id(&self, _id: i64) -> Result<Option<ContractEvent>> {
        Err(self.error())
    }

    async fn get_contract_events(&self, _contract_id: i64) -> Result<Vec<ContractEvent>> {
        Err(self.error())
    }
}
