use super::order::{Order, OrderStatus};
use super::pricing::Quote;
use crate::error::{CheckoutError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

const CONTRACT_REF_PREFIX: &str = "contract_";

/// Where a contract is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStage {
    /// Reserved; nothing emits it.
    FormView,
    FormSubmitted,
    PaymentCreated,
    PaymentCompleted,
    PaymentFailed,
    PaymentCanceled,
}

impl ContractStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FormView => "form_view",
            Self::FormSubmitted => "form_submitted",
            Self::PaymentCreated => "payment_created",
            Self::PaymentCompleted => "payment_completed",
            Self::PaymentFailed => "payment_failed",
            Self::PaymentCanceled => "payment_canceled",
        }
    }

    /// Stage recorded after the gateway reports `status` for an order.
    pub fn for_order_status(status: &OrderStatus) -> Self {
        match status {
            OrderStatus::Processed => Self::PaymentCompleted,
            OrderStatus::Canceled | OrderStatus::Expired => Self::PaymentCanceled,
            OrderStatus::Failed => Self::PaymentFailed,
            _ => Self::PaymentCreated,
        }
    }
}

impl fmt::Display for ContractStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContractStage {
    type Err = CheckoutError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "form_view" => Ok(Self::FormView),
            "form_submitted" => Ok(Self::FormSubmitted),
            "payment_created" => Ok(Self::PaymentCreated),
            "payment_completed" => Ok(Self::PaymentCompleted),
            "payment_failed" => Ok(Self::PaymentFailed),
            "payment_canceled" => Ok(Self::PaymentCanceled),
            other => Err(CheckoutError::InternalError(
                format!("unknown contract stage {other:?}").into(),
            )),
        }
    }
}

/// The simulation form as stored on submission, after normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractForm {
    pub nome: String,
    pub cpf: String,
    pub endereco: String,
    pub whatsapp: String,
    pub email: String,
    pub locais: String,
    pub qtd_locais: u32,
    pub fidelidade_anos: u8,
    pub plano: String,
    pub valor_base_unitario: Decimal,
    pub valor_mensal_total: Decimal,
    #[serde(default)]
    pub resumo: String,
    pub timestamp: DateTime<Utc>,
}

impl ContractForm {
    /// Tier selection priced from the rate table, when the stored plan and
    /// fidelity resolve to one.
    pub fn quote(&self) -> Option<Quote> {
        Some(Quote {
            fidelity: self.fidelidade_anos.try_into().ok()?,
            plan: self.plano.parse().ok()?,
            locations: self.qtd_locais,
        })
    }
}

/// What the gateway said about an order at the time of the event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentSnapshot {
    pub order_id: String,
    pub status: OrderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_detail: Option<String>,
    pub total_amount: String,
    pub external_reference: String,
}

impl From<&Order> for PaymentSnapshot {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id.clone(),
            status: order.status.clone(),
            status_detail: order.status_detail.clone(),
            total_amount: order.total_amount.clone(),
            external_reference: order.external_reference.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentFailure {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub external_reference: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
}

/// Event content, one schema per stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", content = "payload", rename_all = "snake_case")]
pub enum EventPayload {
    FormView(Value),
    FormSubmitted(ContractForm),
    PaymentCreated(PaymentSnapshot),
    PaymentCompleted(PaymentSnapshot),
    PaymentFailed(PaymentFailure),
    PaymentCanceled(PaymentSnapshot),
}

impl EventPayload {
    pub fn stage(&self) -> ContractStage {
        match self {
            Self::FormView(_) => ContractStage::FormView,
            Self::FormSubmitted(_) => ContractStage::FormSubmitted,
            Self::PaymentCreated(_) => ContractStage::PaymentCreated,
            Self::PaymentCompleted(_) => ContractStage::PaymentCompleted,
            Self::PaymentFailed(_) => ContractStage::PaymentFailed,
            Self::PaymentCanceled(_) => ContractStage::PaymentCanceled,
        }
    }

    /// Snapshot event for `order`, with the stage derived from its status.
    pub fn for_order(order: &Order) -> Self {
        let snapshot = PaymentSnapshot::from(order);
        match ContractStage::for_order_status(&order.status) {
            ContractStage::PaymentCompleted => Self::PaymentCompleted(snapshot),
            ContractStage::PaymentCanceled => Self::PaymentCanceled(snapshot),
            ContractStage::PaymentFailed => Self::PaymentFailed(PaymentFailure {
                message: order
                    .status_detail
                    .clone()
                    .unwrap_or_else(|| order.status.to_string()),
                status: None,
                external_reference: order.external_reference.clone(),
                order_id: Some(order.id.clone()),
            }),
            _ => Self::PaymentCreated(snapshot),
        }
    }

    /// Payload column content, without the stage tag.
    pub fn to_value(&self) -> Result<Value> {
        let value = match self {
            Self::FormView(v) => v.clone(),
            Self::FormSubmitted(form) => serde_json::to_value(form)?,
            Self::PaymentCreated(s) | Self::PaymentCompleted(s) | Self::PaymentCanceled(s) => {
                serde_json::to_value(s)?
            }
            Self::PaymentFailed(failure) => serde_json::to_value(failure)?,
        };
        Ok(value)
    }

    /// Rebuilds a payload from its stored `(stage, payload)` columns.
    pub fn from_parts(stage: ContractStage, payload: Value) -> Result<Self> {
        let event = match stage {
            ContractStage::FormView => Self::FormView(payload),
            ContractStage::FormSubmitted => Self::FormSubmitted(serde_json::from_value(payload)?),
            ContractStage::PaymentCreated => Self::PaymentCreated(serde_json::from_value(payload)?),
            ContractStage::PaymentCompleted => {
                Self::PaymentCompleted(serde_json::from_value(payload)?)
            }
            ContractStage::PaymentFailed => Self::PaymentFailed(serde_json::from_value(payload)?),
            ContractStage::PaymentCanceled => {
                Self::PaymentCanceled(serde_json::from_value(payload)?)
            }
        };
        Ok(event)
    }
}

/// An event to append. The store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NewContractEvent {
    pub payload: EventPayload,
    pub order_id: Option<String>,
    pub contract_id: Option<i64>,
}

impl NewContractEvent {
    pub fn form_submitted(form: ContractForm) -> Self {
        Self {
            payload: EventPayload::FormSubmitted(form),
            order_id: None,
            contract_id: None,
        }
    }

    pub fn for_contract(contract_id: i64, payload: EventPayload, order_id: Option<String>) -> Self {
        Self {
            payload,
            order_id,
            contract_id: Some(contract_id),
        }
    }
}

/// A stored lifecycle event. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractEvent {
    pub id: i64,
    pub contract_id: Option<i64>,
    #[serde(flatten)]
    pub payload: EventPayload,
    pub order_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ContractEvent {
    pub fn stage(&self) -> ContractStage {
        self.payload.stage()
    }

    /// The submitted form, if this is a `form_submitted` event.
    pub fn form(&self) -> Option<&ContractForm> {
        match &self.payload {
            EventPayload::FormSubmitted(form) => Some(form),
            _ => None,
        }
    }
}

/// External reference that ties a gateway order back to a contract.
pub fn contract_reference(contract_id: i64) -> String {
    format!("{CONTRACT_REF_PREFIX}{contract_id}")
}

/// Whether `reference` uses the prefix reserved for contract orders.
pub fn is_contract_reference(reference: &str) -> bool {
    reference.starts_with(CONTRACT_REF_PREFIX)
}

/// Contract id named by an order's external reference, if any.
pub fn parse_contract_reference(reference: &str) -> Option<i64> {
    reference
        .strip_prefix(CONTRACT_REF_PREFIX)?
        .parse()
        .ok()
        .filter(|id| *id > 0)
}
