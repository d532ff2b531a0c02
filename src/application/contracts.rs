use super::form::SimulationForm;
use crate::domain::contract::{ContractEvent, NewContractEvent};
use crate::domain::ports::SharedEventLog;
use crate::error::{CheckoutError, Result};
use serde::Serialize;

/// Returned once a submission has been recorded.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractReceipt {
    pub contract_id: i64,
    pub redirect_to: String,
}

impl ContractReceipt {
    fn new(contract_id: i64) -> Self {
        Self {
            contract_id,
            redirect_to: format!("/pagamento?c={contract_id}"),
        }
    }
}

/// A contract's submission, optionally with its full event history.
#[derive(Debug, Clone, Serialize)]
pub struct ContractView {
    #[serde(flatten)]
    pub contract: ContractEvent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<ContractEvent>>,
}

/// Records simulation forms as contracts and reads them back.
#[derive(Clone)]
pub struct ContractService {
    events: SharedEventLog,
}

impl ContractService {
    pub fn new(events: SharedEventLog) -> Self {
        Self { events }
    }

    pub async fn submit(&self, form: SimulationForm) -> Result<ContractReceipt> {
        let form = form.normalize()?;
        let plan = form.plano.clone();
        let contract_id = self
            .events
            .log_event(NewContractEvent::form_submitted(form))
            .await?;

        tracing::info!(contract_id, plan = %plan, "Contract submitted");
        Ok(ContractReceipt::new(contract_id))
    }

    pub async fn get(&self, contract_id: i64, with_events: bool) -> Result<ContractView> {
        if contract_id < 1 {
            return Err(CheckoutError::validation("invalid contract id"));
        }
        let contract = self
            .events
            .get_contract_by_id(contract_id)
            .await?
            .ok_or_else(|| CheckoutError::not_found("contract not found"))?;

        let events = if with_events {
            Some(self.events.get_contract_events(contract_id).await?)
        } else {
            None
        };
        Ok(ContractView { contract, events })
    }
}
