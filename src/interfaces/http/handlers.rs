use super::AppState;
use crate::application::checkout::ContractCheckout;
use crate::application::contracts::{ContractReceipt, ContractView};
use crate::application::form::SimulationForm;
use crate::domain::order::{
    CreateOrderRequest, IdempotencyKey, Order, RefundRequest, SearchOrdersParams,
    SearchOrdersResponse,
};
use crate::error::{CheckoutError, Result};
use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;

const IDEMPOTENCY_HEADERS: [&str; 2] = ["idempotency-key", "x-idempotency-key"];

#[derive(Debug, Default, Deserialize)]
pub struct CaptureBody {
    #[serde(default, alias = "idempotencyKey")]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ContractQuery {
    #[serde(default)]
    pub events: Option<String>,
}

pub async fn create_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: std::result::Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Order>)> {
    let order = json_body(payload)?;
    let key = idempotency_key(&headers)?;
    let created = state.checkout.create_order(order, key).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn checkout_with_contract(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: std::result::Result<Json<ContractCheckout>, JsonRejection>,
) -> Result<(StatusCode, Json<Order>)> {
    let request = json_body(payload)?;
    let key = idempotency_key(&headers)?;
    let created = state.checkout.checkout_with_contract(request, key).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn submit_contract(
    State(state): State<AppState>,
    payload: std::result::Result<Json<SimulationForm>, JsonRejection>,
) -> Result<Json<ContractReceipt>> {
    let form = json_body(payload)?;
    Ok(Json(state.contracts.submit(form).await?))
}

pub async fn get_contract(
    State(state): State<AppState>,
    Path(id): Path<String>,
    query: std::result::Result<Query<ContractQuery>, QueryRejection>,
) -> Result<Json<ContractView>> {
    let Query(query) = query.map_err(|r| CheckoutError::validation(r.body_text()))?;
    let id: i64 = id
        .trim()
        .parse()
        .map_err(|_| CheckoutError::validation("invalid contract id"))?;
    let with_events = matches!(query.events.as_deref(), Some("1" | "true"));
    Ok(Json(state.contracts.get(id, with_events).await?))
}

pub async fn search_orders(
    State(state): State<AppState>,
    query: std::result::Result<Query<SearchOrdersParams>, QueryRejection>,
) -> Result<Json<SearchOrdersResponse>> {
    let Query(params) = query.map_err(|r| CheckoutError::validation(r.body_text()))?;
    Ok(Json(state.checkout.search_orders(params).await?))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<Order>> {
    Ok(Json(state.checkout.get_order(&order_id).await?))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<Order>> {
    Ok(Json(state.checkout.cancel_order(&order_id).await?))
}

/// Body is optional. A key in the body wins over the request header.
pub async fn capture_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Order>> {
    let body: CaptureBody = optional_json(&body)?;
    let key = match body.idempotency_key.filter(|k| !k.trim().is_empty()) {
        Some(key) => Some(IdempotencyKey::new(key)?),
        None => idempotency_key(&headers)?,
    };
    Ok(Json(state.checkout.capture_order(&order_id, key).await?))
}

/// An empty body refunds the whole order.
pub async fn refund_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Order>)> {
    let refund: RefundRequest = optional_json(&body)?;
    let key = idempotency_key(&headers)?;
    let order = state.checkout.refund_order(&order_id, refund, key).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

fn json_body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| CheckoutError::validation(rejection.body_text()))
}

fn optional_json<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| CheckoutError::validation(format!("invalid JSON body: {e}")))
}

fn idempotency_key(headers: &HeaderMap) -> Result<Option<IdempotencyKey>> {
    let Some(value) = IDEMPOTENCY_HEADERS
        .iter()
        .find_map(|name| headers.get(*name))
    else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| CheckoutError::validation("idempotency key must be visible ASCII"))?;
    if value.trim().is_empty() {
        return Ok(None);
    }
    IdempotencyKey::new(value).map(Some)
}
