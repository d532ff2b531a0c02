//! Order schema of the payment gateway.
//!
//! Field names serialize in the gateway's snake_case wire format. Inbound
//! bodies from the front-end may use camelCase, so every multi-word field
//! also accepts its camelCase alias.

use super::payer::{EntityType, IdentificationType};
use crate::error::{CheckoutError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use validator::ValidateEmail;

pub const DEFAULT_PROCESSING_MODE: ProcessingMode = ProcessingMode::Automatic;
pub const DEFAULT_CAPTURE_MODE: CaptureMode = CaptureMode::AutomaticAsync;

/// Token that lets a mutating gateway call be retried without repeating its
/// effect.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(CheckoutError::validation("idempotency key cannot be empty"));
        }
        Ok(Self(key))
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    #[default]
    Online,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingMode {
    Automatic,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    AutomaticAsync,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethodType {
    CreditCard,
    DebitCard,
    Pix,
    Ticket,
    BankTransfer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identification {
    #[serde(rename = "type")]
    pub kind: IdentificationType,
    pub number: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phone {
    #[serde(alias = "areaCode")]
    pub area_code: String,
    pub number: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    #[serde(alias = "zipCode")]
    pub zip_code: String,
    #[serde(alias = "streetName")]
    pub street_name: String,
    #[serde(alias = "streetNumber")]
    pub street_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub neighborhood: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complement: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payer {
    #[serde(default)]
    pub email: String,
    #[serde(default, alias = "entityType", skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<EntityType>,
    #[serde(default, alias = "firstName")]
    pub first_name: String,
    #[serde(default, alias = "lastName")]
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identification: Option<Identification>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<Phone>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMethod {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<PaymentMethodType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installments: Option<u32>,
    #[serde(
        default,
        alias = "statementDescriptor",
        skip_serializing_if = "Option::is_none"
    )]
    pub statement_descriptor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentLine {
    #[serde(default)]
    pub amount: String,
    #[serde(default, alias = "paymentMethod", skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default, alias = "expirationTime", skip_serializing_if = "Option::is_none")]
    pub expiration_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Transactions {
    #[serde(default)]
    pub payments: Vec<PaymentLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub title: String,
    #[serde(alias = "unitPrice")]
    pub unit_price: String,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, alias = "externalCode", skip_serializing_if = "Option::is_none")]
    pub external_code: Option<String>,
    #[serde(default, alias = "pictureUrl", skip_serializing_if = "Option::is_none")]
    pub picture_url: Option<String>,
    #[serde(default, alias = "categoryId", skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    pub address: Address,
}

/// Body of a create-order call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    #[serde(rename = "type", default)]
    pub kind: OrderType,
    #[serde(default, alias = "externalReference")]
    pub external_reference: String,
    #[serde(default, alias = "totalAmount")]
    pub total_amount: String,
    #[serde(default, alias = "processingMode", skip_serializing_if = "Option::is_none")]
    pub processing_mode: Option<ProcessingMode>,
    #[serde(default, alias = "captureMode", skip_serializing_if = "Option::is_none")]
    pub capture_mode: Option<CaptureMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<Payer>,
    #[serde(default)]
    pub transactions: Transactions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<Item>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipment: Option<Shipment>,
    #[serde(default, alias = "integrationData", skip_serializing_if = "Option::is_none")]
    pub integration_data: Option<Map<String, Value>>,
}

impl CreateOrderRequest {
    /// Checks the fields the gateway needs before any call is made.
    pub fn validate(&self) -> Result<()> {
        if self.external_reference.trim().is_empty() {
            return Err(CheckoutError::validation("externalReference is required"));
        }
        if self.total_amount.trim().is_empty() {
            return Err(CheckoutError::validation("totalAmount is required"));
        }
        let payer = self
            .payer
            .as_ref()
            .ok_or_else(|| CheckoutError::validation("payer is required"))?;
        if payer.email.trim().is_empty() {
            return Err(CheckoutError::validation("payer.email is required"));
        }
        if !payer.email.trim().to_string().validate_email() {
            return Err(CheckoutError::validation("payer.email is not a valid email"));
        }
        if self.transactions.payments.is_empty() {
            return Err(CheckoutError::validation(
                "transactions.payments must contain at least one payment",
            ));
        }
        for (i, payment) in self.transactions.payments.iter().enumerate() {
            if payment.amount.trim().is_empty() {
                return Err(CheckoutError::validation(format!(
                    "transactions.payments[{i}].amount is required"
                )));
            }
            let method_ok = payment
                .payment_method
                .as_ref()
                .is_some_and(|m| !m.id.trim().is_empty() && m.kind.is_some());
            if !method_ok {
                return Err(CheckoutError::validation(format!(
                    "transactions.payments[{i}].paymentMethod requires id and type"
                )));
            }
        }
        Ok(())
    }

    /// Fills processing and capture modes the caller left unset.
    pub fn with_defaults(mut self) -> Self {
        self.processing_mode.get_or_insert(DEFAULT_PROCESSING_MODE);
        self.capture_mode.get_or_insert(DEFAULT_CAPTURE_MODE);
        self
    }
}

/// Order status as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Created,
    ActionRequired,
    Processing,
    Processed,
    Canceled,
    Refunded,
    Failed,
    Expired,
    #[serde(untagged)]
    Other(String),
}

impl OrderStatus {
    /// States from which the gateway accepts a cancel.
    pub fn is_cancelable(&self) -> bool {
        matches!(self, Self::Created | Self::ActionRequired)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_value(self) {
            Ok(Value::String(s)) => f.write_str(&s),
            _ => write!(f, "{self:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPayment {
    pub id: String,
    #[serde(default)]
    pub amount: String,
    #[serde(default)]
    pub status: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRefund {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub amount: String,
    #[serde(default)]
    pub status: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OrderTransactions {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub payments: Vec<OrderPayment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub refunds: Vec<OrderRefund>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An order as returned by the gateway.
///
/// Fields not modelled here are kept in `extra` so the order can be handed
/// back to the front-end unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub status: OrderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_detail: Option<String>,
    #[serde(default)]
    pub external_reference: String,
    #[serde(default)]
    pub total_amount: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transactions: Option<OrderTransactions>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body of a refund call. No lines (or an empty list) refunds the whole order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RefundRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transactions: Option<Vec<RefundLine>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefundLine {
    pub id: String,
    pub amount: String,
}

impl RefundRequest {
    pub fn full() -> Self {
        Self::default()
    }

    pub fn is_full(&self) -> bool {
        self.transactions.as_ref().is_none_or(Vec::is_empty)
    }

    /// Shape check for partial refunds. Whether the payment ids exist on the
    /// order is left to the gateway.
    pub fn validate(&self) -> Result<()> {
        for (i, line) in self.transactions.iter().flatten().enumerate() {
            if line.id.trim().is_empty() {
                return Err(CheckoutError::validation(format!(
                    "transactions[{i}].id is required"
                )));
            }
            let amount = Decimal::from_str(line.amount.trim()).map_err(|_| {
                CheckoutError::validation(format!("transactions[{i}].amount is not a number"))
            })?;
            if amount <= Decimal::ZERO {
                return Err(CheckoutError::validation(format!(
                    "transactions[{i}].amount must be positive"
                )));
            }
        }
        Ok(())
    }
}

/// Optional filters for an order search, passed through verbatim.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchOrdersParams {
    #[serde(default, alias = "externalReference", skip_serializing_if = "Option::is_none")]
    pub external_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, alias = "dateCreatedFrom", skip_serializing_if = "Option::is_none")]
    pub date_created_from: Option<String>,
    #[serde(default, alias = "dateCreatedTo", skip_serializing_if = "Option::is_none")]
    pub date_created_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paging {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchOrdersResponse {
    #[serde(default)]
    pub results: Vec<Order>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paging: Option<Paging>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
