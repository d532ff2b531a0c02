//! HTTP client for the Mercado Pago Orders API.
//!
//! Every call is a single round-trip; nothing is retried here. Mutating
//! calls carry an idempotency key so the front-end can retry safely.

use crate::config::GatewayConfig;
use crate::domain::order::{
    CreateOrderRequest, IdempotencyKey, Order, RefundRequest, SearchOrdersParams,
    SearchOrdersResponse,
};
use crate::domain::ports::PaymentGateway;
use crate::error::{CheckoutError, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

pub const IDEMPOTENCY_HEADER: &str = "X-Idempotency-Key";

/// Live gateway client.
///
/// The access token is checked on every call rather than at construction,
/// so a missing token is reported as a configuration error on first use.
#[derive(Clone)]
pub struct MercadoPagoClient {
    http: Client,
    base_url: Url,
    access_token: Option<SecretString>,
}

impl MercadoPagoClient {
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            CheckoutError::ConfigError(format!("invalid gateway URL {:?}: {e}", config.base_url))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(CheckoutError::ConfigError(format!(
                "gateway URL {:?} cannot be used as a base",
                config.base_url
            )));
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CheckoutError::ConfigError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url,
            access_token: config.access_token,
        })
    }

    fn access_token(&self) -> Result<&SecretString> {
        self.access_token.as_ref().ok_or_else(|| {
            CheckoutError::ConfigError("MERCADOPAGO_ACCESS_TOKEN is not set".to_string())
        })
    }

    /// `base_url` with `segments` appended, each percent-encoded as one
    /// path segment.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn order_url(&self, order_id: &str, action: Option<&str>) -> Result<Url> {
        if order_id.trim().is_empty() {
            return Err(CheckoutError::validation("order id is required"));
        }
        let mut segments = vec!["orders", order_id];
        segments.extend(action);
        Ok(self.url(&segments))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, operation: &str) -> Result<T> {
        let token = self.access_token()?;
        let response = request
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(operation, error = %e, "Gateway request failed");
                CheckoutError::gateway(None, format!("Gateway request failed: {e}"))
            })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            CheckoutError::gateway(Some(status.as_u16()), format!("Gateway: {e}"))
        })?;
        let data: Value =
            serde_json::from_slice(&body).unwrap_or_else(|_| Value::Object(Default::default()));

        if !status.is_success() {
            let err = error_from_response(status.as_u16(), &data);
            tracing::warn!(operation, status = status.as_u16(), error = %err, "Gateway rejected request");
            return Err(err);
        }

        tracing::debug!(operation, status = status.as_u16(), "Gateway call succeeded");
        serde_json::from_value(data).map_err(|e| {
            CheckoutError::gateway(
                Some(status.as_u16()),
                format!("Gateway: unexpected response for {operation}: {e}"),
            )
        })
    }
}

/// Error for a non-2xx gateway response: `message`, else `error`, else a
/// generic `"Gateway: <status>"`.
pub fn error_from_response(status: u16, body: &Value) -> CheckoutError {
    let message = ["message", "error"]
        .iter()
        .find_map(|key| body.get(key).and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| format!("Gateway: {status}"));
    CheckoutError::gateway(Some(status), message)
}

#[async_trait]
impl PaymentGateway for MercadoPagoClient {
    async fn create_order(
        &self,
        order: CreateOrderRequest,
        idempotency_key: Option<IdempotencyKey>,
    ) -> Result<Order> {
        order.validate()?;
        let key = idempotency_key.unwrap_or_else(IdempotencyKey::generate);
        tracing::info!(
            external_reference = %order.external_reference,
            total_amount = %order.total_amount,
            idempotency_key = %key,
            "Creating order"
        );

        let request = self
            .http
            .post(self.url(&["orders"]))
            .header(IDEMPOTENCY_HEADER, key.as_str())
            .json(&order.with_defaults());
        self.send(request, "create_order").await
    }

    async fn get_order(&self, order_id: &str) -> Result<Order> {
        let request = self.http.get(self.order_url(order_id, None)?);
        self.send(request, "get_order").await
    }

    async fn cancel_order(&self, order_id: &str) -> Result<Order> {
        let request = self.http.post(self.order_url(order_id, Some("cancel"))?);
        self.send(request, "cancel_order").await
    }

    async fn capture_order(
        &self,
        order_id: &str,
        idempotency_key: Option<IdempotencyKey>,
    ) -> Result<Order> {
        let key = idempotency_key.unwrap_or_else(IdempotencyKey::generate);
        tracing::info!(order_id, idempotency_key = %key, "Capturing order");

        let request = self
            .http
            .post(self.order_url(order_id, Some("capture"))?)
            .header(IDEMPOTENCY_HEADER, key.as_str());
        self.send(request, "capture_order").await
    }

    async fn refund_order(
        &self,
        order_id: &str,
        refund: RefundRequest,
        idempotency_key: Option<IdempotencyKey>,
    ) -> Result<Order> {
        let key = idempotency_key.unwrap_or_else(IdempotencyKey::generate);
        tracing::info!(order_id, full = refund.is_full(), idempotency_key = %key, "Refunding order");

        let request = self
            .http
            .post(self.order_url(order_id, Some("refund"))?)
            .header(IDEMPOTENCY_HEADER, key.as_str())
            .json(&refund);
        self.send(request, "refund_order").await
    }

    async fn search_orders(&self, params: SearchOrdersParams) -> Result<SearchOrdersResponse> {
        let request = self.http.get(self.url(&["orders"])).query(&params);
        self.send(request, "search_orders").await
    }
}
