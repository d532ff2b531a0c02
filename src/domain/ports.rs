use super::contract::{ContractEvent, NewContractEvent};
use super::order::{
    CreateOrderRequest, IdempotencyKey, Order, RefundRequest, SearchOrdersParams,
    SearchOrdersResponse,
};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Append-only record of contract lifecycle events.
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Appends one event and returns its id. For a `form_submitted` event
    /// without a contract id, that id is the new contract's id.
    async fn log_event(&self, event: NewContractEvent) -> Result<i64>;

    /// The `form_submitted` event with this id, if any.
    async fn get_contract_by_id(&self, id: i64) -> Result<Option<ContractEvent>>;

    /// The originating submission plus every event referencing it, oldest first.
    async fn get_contract_events(&self, contract_id: i64) -> Result<Vec<ContractEvent>>;
}

/// Order operations of the external payment processor.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_order(
        &self,
        order: CreateOrderRequest,
        idempotency_key: Option<IdempotencyKey>,
    ) -> Result<Order>;

    async fn get_order(&self, order_id: &str) -> Result<Order>;

    async fn cancel_order(&self, order_id: &str) -> Result<Order>;

    async fn capture_order(
        &self,
        order_id: &str,
        idempotency_key: Option<IdempotencyKey>,
    ) -> Result<Order>;

    async fn refund_order(
        &self,
        order_id: &str,
        refund: RefundRequest,
        idempotency_key: Option<IdempotencyKey>,
    ) -> Result<Order>;

    async fn search_orders(&self, params: SearchOrdersParams) -> Result<SearchOrdersResponse>;
}

pub type SharedEventLog = Arc<dyn EventLog>;
pub type SharedGateway = Arc<dyn PaymentGateway>;
