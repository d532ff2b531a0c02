#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response};
use fonomar_checkout::domain::order::{
    CreateOrderRequest, IdempotencyKey, Order, RefundRequest, SearchOrdersParams,
    SearchOrdersResponse,
};
use fonomar_checkout::domain::ports::PaymentGateway;
use fonomar_checkout::error::{CheckoutError, Result};
use fonomar_checkout::infrastructure::in_memory::InMemoryEventLog;
use fonomar_checkout::interfaces::http::{AppState, router};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

/// One call as seen by [`RecordingGateway`].
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    Create(CreateOrderRequest, Option<String>),
    Get(String),
    Cancel(String),
    Capture(String, Option<String>),
    Refund(String, RefundRequest, Option<String>),
    Search(SearchOrdersParams),
}

/// In-process gateway that records every call and answers with a canned
/// order, or with `fail_with` when set.
#[derive(Default)]
pub struct RecordingGateway {
    pub calls: Mutex<Vec<GatewayCall>>,
    pub fail_with: Mutex<Option<(u16, String)>>,
    pub status: Mutex<Option<String>>,
    pub external_reference: Mutex<Option<String>>,
}

impl RecordingGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing(status: u16, message: &str) -> Arc<Self> {
        let gateway = Self::default();
        *gateway.fail_with.lock().unwrap() = Some((status, message.to_string()));
        Arc::new(gateway)
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().unwrap().clone()
    }

    fn answer(&self, call: GatewayCall, id: &str, reference: &str, total: &str) -> Result<Order> {
        self.calls.lock().unwrap().push(call);
        if let Some((status, message)) = self.fail_with.lock().unwrap().clone() {
            return Err(CheckoutError::gateway(Some(status), message));
        }
        let status = self
            .status
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| "action_required".to_string());
        let reference = self
            .external_reference
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| reference.to_string());
        Ok(serde_json::from_value(json!({
            "id": id,
            "type": "online",
            "status": status,
            "external_reference": reference,
            "total_amount": total,
            "country_code": "BRA",
        }))
        .unwrap())
    }
}

#[async_trait]
impl PaymentGateway for RecordingGateway {
    async fn create_order(
        &self,
        order: CreateOrderRequest,
        idempotency_key: Option<IdempotencyKey>,
    ) -> Result<Order> {
        let reference = order.external_reference.clone();
        let total = order.total_amount.clone();
        let key = idempotency_key.map(|k| k.as_str().to_string());
        self.answer(GatewayCall::Create(order, key), "ORD01", &reference, &total)
    }

    async fn get_order(&self, order_id: &str) -> Result<Order> {
        self.answer(GatewayCall::Get(order_id.into()), order_id, "checkout_1", "80.00")
    }

    async fn cancel_order(&self, order_id: &str) -> Result<Order> {
        self.answer(GatewayCall::Cancel(order_id.into()), order_id, "checkout_1", "80.00")
    }

    async fn capture_order(
        &self,
        order_id: &str,
        idempotency_key: Option<IdempotencyKey>,
    ) -> Result<Order> {
        let key = idempotency_key.map(|k| k.as_str().to_string());
        self.answer(
            GatewayCall::Capture(order_id.into(), key),
            order_id,
            "checkout_1",
            "80.00",
        )
    }

    async fn refund_order(
        &self,
        order_id: &str,
        refund: RefundRequest,
        idempotency_key: Option<IdempotencyKey>,
    ) -> Result<Order> {
        let key = idempotency_key.map(|k| k.as_str().to_string());
        self.answer(
            GatewayCall::Refund(order_id.into(), refund, key),
            order_id,
            "checkout_1",
            "80.00",
        )
    }

    async fn search_orders(&self, params: SearchOrdersParams) -> Result<SearchOrdersResponse> {
        self.calls.lock().unwrap().push(GatewayCall::Search(params));
        Ok(serde_json::from_value(json!({
            "results": [],
            "paging": { "total": 0, "limit": 10, "offset": 0 }
        }))
        .unwrap())
    }
}

pub struct TestApp {
    pub router: Router,
    pub gateway: Arc<RecordingGateway>,
    pub events: InMemoryEventLog,
}

impl TestApp {
    pub fn new(gateway: Arc<RecordingGateway>) -> Self {
        let events = InMemoryEventLog::new();
        let state = AppState::new(gateway.clone(), Arc::new(events.clone()));
        Self {
            router: router(state),
            gateway,
            events,
        }
    }

    pub async fn get(&self, uri: &str) -> (u16, Value) {
        let request = Request::get(uri).body(Body::empty()).unwrap();
        self.send(request).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (u16, Value) {
        self.post_with_headers(uri, body, &[]).await
    }

    pub async fn post_with_headers(
        &self,
        uri: &str,
        body: Value,
        headers: &[(&str, &str)],
    ) -> (u16, Value) {
        let mut builder = Request::post(uri).header("content-type", "application/json");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = builder.body(Body::from(body.to_string())).unwrap();
        self.send(request).await
    }

    pub async fn post_empty(&self, uri: &str) -> (u16, Value) {
        let request = Request::post(uri).body(Body::empty()).unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> (u16, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        read_json(response).await
    }
}

async fn read_json(response: Response<Body>) -> (u16, Value) {
    let status = response.status().as_u16();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, body)
}

/// A complete simulation form: two locations, two years, Prata.
pub fn simulation_form() -> Value {
    json!({
        "nome": "Ana Maria Souza",
        "cpf": "123.456.789-01",
        "endereco": "Rua das Flores, 10 - Recife/PE",
        "whatsapp": "(81) 98888-7777",
        "email": "ana@example.com",
        "locais": ["Clínica Fonomar", "Perrelli's Bistro"],
        "qtd_locais": 2,
        "fidelidade_anos": 2,
        "plano": "Prata 30 seg.",
        "valor_base_unitario": 126,
        "valor_mensal_total": 252,
        "resumo": "2 locais, 2 anos, Prata 30 seg."
    })
}

pub fn order_body() -> Value {
    json!({
        "type": "online",
        "externalReference": "ext_123",
        "totalAmount": "80.00",
        "payer": { "email": "ana@example.com", "firstName": "Ana", "lastName": "Souza" },
        "transactions": {
            "payments": [
                { "amount": "80.00", "paymentMethod": { "id": "pix", "type": "pix" } }
            ]
        }
    })
}
