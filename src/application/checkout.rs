use super::form::SimulationForm;
use crate::config::DEFAULT_STATEMENT_DESCRIPTOR;
use crate::domain::contract::{
    ContractForm, EventPayload, NewContractEvent, PaymentFailure, PaymentSnapshot,
    contract_reference, is_contract_reference, parse_contract_reference,
};
use crate::domain::order::{
    CreateOrderRequest, IdempotencyKey, Identification, Item, Order, OrderType, Payer,
    PaymentLine, PaymentMethod, PaymentMethodType, Phone, RefundRequest, SearchOrdersParams,
    SearchOrdersResponse, Transactions,
};
use crate::domain::payer::{IdentificationType, only_digits, split_name, split_phone};
use crate::domain::ports::{SharedEventLog, SharedGateway};
use crate::domain::pricing::format_amount;
use crate::error::{CheckoutError, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;

/// Payment method chosen on the payment page.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PaymentSelection {
    #[serde(default, alias = "methodId")]
    pub method_id: String,
    #[serde(default, rename = "type")]
    pub kind: Option<PaymentMethodType>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub installments: Option<u32>,
}

/// Body of a checkout for a simulated contract.
///
/// Either the form itself or the id of a stored contract must be given.
/// With a contract id the stored form is charged and `form_data` is ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ContractCheckout {
    #[serde(default, alias = "formData")]
    pub form_data: Option<SimulationForm>,
    #[serde(default, alias = "contractId")]
    pub contract_id: Option<i64>,
    #[serde(default)]
    pub payment: PaymentSelection,
}

/// Turns checkout requests into gateway orders and records what happened to
/// each linked contract.
///
/// Writes to the event log never fail a request once the gateway has
/// accepted it; the failure is logged and the order is returned.
#[derive(Clone)]
pub struct CheckoutService {
    gateway: SharedGateway,
    events: SharedEventLog,
    statement_descriptor: String,
}

impl CheckoutService {
    pub fn new(gateway: SharedGateway, events: SharedEventLog) -> Self {
        Self {
            gateway,
            events,
            statement_descriptor: DEFAULT_STATEMENT_DESCRIPTOR.to_string(),
        }
    }

    pub fn with_statement_descriptor(mut self, descriptor: impl Into<String>) -> Self {
        self.statement_descriptor = descriptor.into();
        self
    }

    /// Forwards a fully formed order after checking it locally.
    ///
    /// `contract_` external references are reserved for contract checkouts,
    pub async fn create_order(
        &self,
        order: CreateOrderRequest,
        idempotency_key: Option<IdempotencyKey>,
    ) -> Result<Order> {
        order.validate()?;
        if is_contract_reference(&order.external_reference) {
            return Err(CheckoutError::validation(
                "externalReference must not start with contract_; use /checkout/with-contract",
            ));
        }
        self.gateway.create_order(order, idempotency_key).await
    }

    pub async fn checkout_with_contract(
        &self,
        request: ContractCheckout,
        idempotency_key: Option<IdempotencyKey>,
    ) -> Result<Order> {
        let (method_id, method_type) = match &request.payment {
            PaymentSelection {
                method_id,
                kind: Some(kind),
                ..
            } if !method_id.trim().is_empty() => (method_id.trim().to_string(), *kind),
            _ => {
                return Err(CheckoutError::validation(
                    "payment.methodId and payment.type are required",
                ));
            }
        };

        let (form, contract_id) = self.resolve_form(request.form_data, request.contract_id).await?;
        let order = self.build_order(&form, contract_id, method_id, method_type, &request.payment)?;
        order.validate()?;

        let external_reference = order.external_reference.clone();
        let result = self.gateway.create_order(order, idempotency_key).await;

        match (&result, contract_id) {
            (Ok(order), Some(contract_id)) => {
                tracing::info!(contract_id, order_id = %order.id, status = %order.status, "Contract order created");
                self.record(NewContractEvent::for_contract(
                    contract_id,
                    EventPayload::for_order(order),
                    Some(order.id.clone()),
                ))
                .await;
            }
            (Err(CheckoutError::GatewayError { status, message }), Some(contract_id)) => {
                self.record(NewContractEvent::for_contract(
                    contract_id,
                    EventPayload::PaymentFailed(PaymentFailure {
                        message: message.clone(),
                        status: *status,
                        external_reference,
                        order_id: None,
                    }),
                    None,
                ))
                .await;
            }
            _ => {}
        }
        result
    }

    pub async fn get_order(&self, order_id: &str) -> Result<Order> {
        self.gateway.get_order(order_id).await
    }

    pub async fn search_orders(&self, params: SearchOrdersParams) -> Result<SearchOrdersResponse> {
        self.gateway.search_orders(params).await
    }

    pub async fn cancel_order(&self, order_id: &str) -> Result<Order> {
        let order = self.gateway.cancel_order(order_id).await?;
        self.record_for_order(&order, EventPayload::PaymentCanceled(PaymentSnapshot::from(&order)))
            .await;
        Ok(order)
    }

    pub async fn capture_order(
        &self,
        order_id: &str,
        idempotency_key: Option<IdempotencyKey>,
    ) -> Result<Order> {
        let order = self.gateway.capture_order(order_id, idempotency_key).await?;
        self.record_for_order(&order, EventPayload::for_order(&order))
            .await;
        Ok(order)
    }

    pub async fn refund_order(
        &self,
        order_id: &str,
        refund: RefundRequest,
        idempotency_key: Option<IdempotencyKey>,
    ) -> Result<Order> {
        refund.validate()?;
        self.gateway
            .refund_order(order_id, refund, idempotency_key)
            .await
    }

    async fn resolve_form(
        &self,
        form_data: Option<SimulationForm>,
        contract_id: Option<i64>,
    ) -> Result<(ContractForm, Option<i64>)> {
        let Some(contract_id) = contract_id else {
            let form = form_data
                .ok_or_else(|| CheckoutError::validation("formData or contractId is required"))?;
            return Ok((form.normalize_for_checkout()?, None));
        };

        if contract_id < 1 {
            return Err(CheckoutError::validation("invalid contract id"));
        }
        let stored = self
            .events
            .get_contract_by_id(contract_id)
            .await?
            .ok_or_else(|| CheckoutError::not_found("contract not found"))?;

        if form_data.is_some() {
            tracing::warn!(contract_id, "Ignoring formData; charging the stored contract");
        }
        let form = stored
            .form()
            .cloned()
            .ok_or_else(|| CheckoutError::not_found("contract not found"))?;
        Ok((form, Some(contract_id)))
    }

    fn build_order(
        &self,
        form: &ContractForm,
        contract_id: Option<i64>,
        method_id: String,
        method_type: PaymentMethodType,
        selection: &PaymentSelection,
    ) -> Result<CreateOrderRequest> {
        let quote = form.quote();
        let total = quote.map_or(form.valor_mensal_total, |q| q.monthly_total());
        if total <= Decimal::ZERO {
            return Err(CheckoutError::validation(
                "valor_mensal_total must be greater than zero",
            ));
        }
        let unit_price = quote
            .map(|q| q.unit_price())
            .or(Some(form.valor_base_unitario).filter(|p| *p > Decimal::ZERO))
            .unwrap_or(total);
        let amount = format_amount(total);

        let external_reference = contract_id.map_or_else(
            || format!("checkout_{}", Utc::now().timestamp_millis()),
            contract_reference,
        );
        let resumo = Some(form.resumo.trim().to_string()).filter(|r| !r.is_empty());

        Ok(CreateOrderRequest {
            kind: OrderType::Online,
            external_reference,
            total_amount: amount.clone(),
            processing_mode: None,
            capture_mode: None,
            description: Some(
                resumo
                    .clone()
                    .unwrap_or_else(|| format!("Plano {}", form.plano)),
            ),
            payer: Some(payer_from_form(form)),
            transactions: Transactions {
                payments: vec![PaymentLine {
                    amount,
                    payment_method: Some(PaymentMethod {
                        id: method_id,
                        kind: Some(method_type),
                        token: selection.token.clone(),
                        installments: Some(selection.installments.unwrap_or(1)),
                        statement_descriptor: Some(self.statement_descriptor.clone()),
                    }),
                    expiration_time: None,
                }],
            },
            items: Some(vec![Item {
                title: form.plano.clone(),
                unit_price: format_amount(unit_price),
                quantity: form.qtd_locais.max(1),
                description: resumo,
                external_code: None,
                picture_url: None,
                category_id: None,
            }]),
            shipment: None,
            integration_data: None,
        })
    }

    /// Logs `payload` against the contract named by the order's external
    /// reference. Orders naming no stored contract are skipped.
    async fn record_for_order(&self, order: &Order, payload: EventPayload) {
        let Some(contract_id) = parse_contract_reference(&order.external_reference) else {
            return;
        };
        match self.events.get_contract_by_id(contract_id).await {
            Ok(Some(_)) => {
                self.record(NewContractEvent::for_contract(
                    contract_id,
                    payload,
                    Some(order.id.clone()),
                ))
                .await;
            }
            Ok(None) => {
                tracing::warn!(contract_id, order_id = %order.id, "Order references an unknown contract; not logged");
            }
            Err(err) => {
                tracing::error!(contract_id, order_id = %order.id, error = %err, "Failed to look up contract for order");
            }
        }
    }

    async fn record(&self, event: NewContractEvent) {
        let stage = event.payload.stage();
        let contract_id = event.contract_id;
        if let Err(err) = self.events.log_event(event).await {
            tracing::error!(?contract_id, %stage, error = %err, "Failed to log contract event");
        }
    }
}

/// Gateway payer built from the submitted personal data.
pub fn payer_from_form(form: &ContractForm) -> Payer {
    let (first_name, last_name) = split_name(&form.nome);
    let tax_id = only_digits(&form.cpf);
    let id_type = IdentificationType::classify(&tax_id);
    let (area_code, number) = split_phone(&form.whatsapp);

    Payer {
        email: form.email.trim().to_string(),
        entity_type: (!tax_id.is_empty()).then_some(id_type.entity_type()),
        first_name,
        last_name,
        identification: (!tax_id.is_empty()).then_some(Identification {
            kind: id_type,
            number: tax_id,
        }),
        phone: (!number.is_empty()).then_some(Phone { area_code, number }),
        address: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::contract::ContractStage;
    use crate::domain::order::OrderStatus;
    use crate::domain::payer::EntityType;
    use crate::domain::ports::{EventLog, PaymentGateway};
    use crate::infrastructure::in_memory::InMemoryEventLog;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    /// Gateway double that answers with a fixed status and remembers what it
    /// was asked to create.
    #[derive(Default)]
    struct FakeGateway {
        created: Mutex<Vec<CreateOrderRequest>>,
        status: Option<OrderStatus>,
        reject_with: Option<u16>,
    }

    impl FakeGateway {
        fn order(&self, id: &str, external_reference: &str, total: &str) -> Order {
            serde_json::from_value(json!({
                "id": id,
                "status": self.status.clone().unwrap_or(OrderStatus::ActionRequired),
                "external_reference": external_reference,
                "total_amount": total,
            }))
            .unwrap()
        }
    }

    #[async_trait]
    impl PaymentGateway for FakeGateway {
        async fn create_order(
            &self,
            order: CreateOrderRequest,
            _key: Option<IdempotencyKey>,
        ) -> Result<Order> {
            if let Some(status) = self.reject_with {
                return Err(CheckoutError::gateway(Some(status), "card rejected"));
            }
            let created = self.order("ORD1", &order.external_reference, &order.total_amount);
            self.created.lock().unwrap().push(order);
            Ok(created)
        }

        async fn get_order(&self, order_id: &str) -> Result<Order> {
            Ok(self.order(order_id, "checkout_1", "80.00"))
        }

        async fn cancel_order(&self, order_id: &str) -> Result<Order> {
            Ok(self.order(order_id, "contract_1", "80.00"))
        }

        async fn capture_order(&self, order_id: &str, _key: Option<IdempotencyKey>) -> Result<Order> {
            Ok(self.order(order_id, "contract_1", "80.00"))
        }

        async fn refund_order(
            &self,
            order_id: &str,
            _refund: RefundRequest,
            _key: Option<IdempotencyKey>,
        ) -> Result<Order> {
            Ok(self.order(order_id, "contract_1", "80.00"))
        }

        async fn search_orders(&self, _params: SearchOrdersParams) -> Result<SearchOrdersResponse> {
            Ok(SearchOrdersResponse::default())
        }
    }

    fn form_json() -> serde_json::Value {
        json!({
            "nome": "Ana Maria Souza",
            "cpf": "123.456.789-01",
            "endereco": "Rua X, 1",
            "whatsapp": "(11) 98888-7777",
            "email": "ana@example.com",
            "locais": ["Clínica Fonomar", "Perrelli's Bistro"],
            "qtd_locais": 2,
            "fidelidade_anos": 2,
            "plano": "Prata 30 seg.",
            "valor_mensal_total": 252
        })
    }

    fn setup(gateway: FakeGateway) -> (CheckoutService, Arc<FakeGateway>, InMemoryEventLog) {
        let gateway = Arc::new(gateway);
        let log = InMemoryEventLog::new();
        let service = CheckoutService::new(gateway.clone(), Arc::new(log.clone()));
        (service, gateway, log)
    }

    fn pix() -> PaymentSelection {
        PaymentSelection {
            method_id: "pix".into(),
            kind: Some(PaymentMethodType::Pix),
            ..Default::default()
        }
    }

    #[test]
    fn test_payer_shaping() {
        let form = serde_json::from_value::<SimulationForm>(form_json())
            .unwrap()
            .normalize()
            .unwrap();
        let payer = payer_from_form(&form);
        assert_eq!(payer.first_name, "Ana");
        assert_eq!(payer.last_name, "Maria Souza");
        assert_eq!(payer.entity_type, Some(EntityType::Individual));
        let identification = payer.identification.unwrap();
        assert_eq!(identification.kind, IdentificationType::Cpf);
        assert_eq!(identification.number, "12345678901");
        let phone = payer.phone.unwrap();
        assert_eq!(phone.area_code, "11");
        assert_eq!(phone.number, "988887777");
    }

    #[tokio::test]
    async fn test_unlinked_checkout_builds_the_gateway_order() {
        let (service, gateway, log) = setup(FakeGateway::default());
        let request = ContractCheckout {
            form_data: Some(serde_json::from_value(form_json()).unwrap()),
            contract_id: None,
            payment: pix(),
        };

        service.checkout_with_contract(request, None).await.unwrap();
        assert!(log.is_empty().await);

        let created = gateway.created.lock().unwrap();
        let order = &created[0];
        assert!(order.external_reference.starts_with("checkout_"));
        assert_eq!(order.total_amount, "252.00");
        let line = &order.transactions.payments[0];
        assert_eq!(line.amount, "252.00");
        let method = line.payment_method.as_ref().unwrap();
        assert_eq!(method.installments, Some(1));
        assert_eq!(method.statement_descriptor.as_deref(), Some("TV Fonomar"));
        let item = &order.items.as_ref().unwrap()[0];
        assert_eq!(item.title, "Prata 30 seg.");
        assert_eq!(item.unit_price, "126.00");
        assert_eq!(item.quantity, 2);
    }

    #[tokio::test]
    async fn test_linked_checkout_uses_stored_form_and_logs() {
        let (service, gateway, log) = setup(FakeGateway::default());
        let form = serde_json::from_value::<SimulationForm>(form_json())
            .unwrap()
            .normalize()
            .unwrap();
        let contract_id = log
            .log_event(NewContractEvent::form_submitted(form))
            .await
            .unwrap();

        let request = ContractCheckout {
            form_data: None,
            contract_id: Some(contract_id),
            payment: pix(),
        };
        let order = service.checkout_with_contract(request, None).await.unwrap();
        assert_eq!(order.external_reference, format!("contract_{contract_id}"));
        assert_eq!(gateway.created.lock().unwrap()[0].total_amount, "252.00");

        let events = log.get_contract_events(contract_id).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].stage(), ContractStage::PaymentCreated);
        assert_eq!(events[1].order_id.as_deref(), Some("ORD1"));
    }

    #[tokio::test]
    async fn test_processed_order_logs_completion() {
        let (service, _gateway, log) = setup(FakeGateway {
            status: Some(OrderStatus::Processed),
            ..Default::default()
        });
        let form = serde_json::from_value::<SimulationForm>(form_json())
            .unwrap()
            .normalize()
            .unwrap();
        let contract_id = log
            .log_event(NewContractEvent::form_submitted(form))
            .await
            .unwrap();

        let request = ContractCheckout {
            form_data: None,
            contract_id: Some(contract_id),
            payment: pix(),
        };
        service.checkout_with_contract(request, None).await.unwrap();

        let events = log.get_contract_events(contract_id).await.unwrap();
        assert_eq!(events[1].stage(), ContractStage::PaymentCompleted);
    }

    #[tokio::test]
    async fn test_gateway_rejection_is_logged_as_failure() {
        let (service, _gateway, log) = setup(FakeGateway {
            reject_with: Some(400),
            ..Default::default()
        });
        let form = serde_json::from_value::<SimulationForm>(form_json())
            .unwrap()
            .normalize()
            .unwrap();
        let contract_id = log
            .log_event(NewContractEvent::form_submitted(form))
            .await
            .unwrap();

        let request = ContractCheckout {
            form_data: None,
            contract_id: Some(contract_id),
            payment: pix(),
        };
        let err = service
            .checkout_with_contract(request, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::GatewayError { status: Some(400), .. }));

        let events = log.get_contract_events(contract_id).await.unwrap();
        assert_eq!(events[1].stage(), ContractStage::PaymentFailed);
        assert_eq!(events[1].order_id, None);
    }

    #[tokio::test]
    async fn test_unknown_contract_is_not_found() {
        let (service, gateway, _log) = setup(FakeGateway::default());
        let request = ContractCheckout {
            form_data: None,
            contract_id: Some(42),
            payment: pix(),
        };
        let err = service
            .checkout_with_contract(request, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::NotFound(_)));
        assert!(gateway.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_payment_selection_is_required() {
        let (service, gateway, _log) = setup(FakeGateway::default());
        let request = ContractCheckout {
            form_data: Some(serde_json::from_value(form_json()).unwrap()),
            contract_id: None,
            payment: PaymentSelection::default(),
        };
        let err = service
            .checkout_with_contract(request, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::ValidationError(m) if m.contains("payment")));
        assert!(gateway.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_zero_total_is_rejected() {
        let (service, gateway, _log) = setup(FakeGateway::default());
        let mut raw = form_json();
        raw["qtd_locais"] = json!(0);
        let request = ContractCheckout {
            form_data: Some(serde_json::from_value(raw).unwrap()),
            contract_id: None,
            payment: pix(),
        };
        let err = service
            .checkout_with_contract(request, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::ValidationError(_)));
        assert!(gateway.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_and_capture_log_linked_contracts() {
        let (service, _gateway, log) = setup(FakeGateway {
            status: Some(OrderStatus::Canceled),
            ..Default::default()
        });
        let form = serde_json::from_value::<SimulationForm>(form_json())
            .unwrap()
            .normalize()
            .unwrap();
        let contract_id = log
            .log_event(NewContractEvent::form_submitted(form))
            .await
            .unwrap();
        assert_eq!(contract_id, 1);

        service.cancel_order("ORD1").await.unwrap();
        service.refund_order("ORD1", RefundRequest::full(), None).await.unwrap();

        let events = log.get_contract_events(1).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].stage(), ContractStage::PaymentCanceled);
        assert_eq!(events[1].contract_id, Some(1));
        assert_eq!(events[1].order_id.as_deref(), Some("ORD1"));
    }

    #[tokio::test]
    async fn test_orders_naming_unknown_contracts_are_not_logged() {
        let (service, _gateway, log) = setup(FakeGateway {
            status: Some(OrderStatus::Canceled),
            ..Default::default()
        });
        service.cancel_order("ORD1").await.unwrap();
        service.capture_order("ORD1", None).await.unwrap();

        assert!(log.is_empty().await);
        assert!(log.get_contract_by_id(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_raw_orders_cannot_use_contract_references() {
        let (service, gateway, _log) = setup(FakeGateway::default());
        let order: CreateOrderRequest = serde_json::from_value(json!({
            "type": "online",
            "external_reference": "contract_1",
            "total_amount": "80.00",
            "payer": { "email": "ana@example.com" },
            "transactions": {
                "payments": [
                    { "amount": "80.00", "payment_method": { "id": "pix", "type": "pix" } }
                ]
            }
        }))
        .unwrap();

        let err = service.create_order(order, None).await.unwrap_err();
        assert!(matches!(err, CheckoutError::ValidationError(m) if m.contains("contract_")));
        assert!(gateway.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_linked_checkout_ignores_submitted_form() {
        let (service, gateway, log) = setup(FakeGateway::default());
        let form = serde_json::from_value::<SimulationForm>(form_json())
            .unwrap()
            .normalize()
            .unwrap();
        let contract_id = log
            .log_event(NewContractEvent::form_submitted(form))
            .await
            .unwrap();

        let mut other = form_json();
        other["plano"] = json!("Ouro 60 seg.");
        other["fidelidade_anos"] = json!(1);
        other["qtd_locais"] = json!(5);
        other["valor_mensal_total"] = json!(1000);
        let request = ContractCheckout {
            form_data: Some(serde_json::from_value(other).unwrap()),
            contract_id: Some(contract_id),
            payment: pix(),
        };
        let order = service.checkout_with_contract(request, None).await.unwrap();

        assert_eq!(order.external_reference, format!("contract_{contract_id}"));
        let created = gateway.created.lock().unwrap();
        assert_eq!(created[0].total_amount, "252.00");
        let item = &created[0].items.as_ref().unwrap()[0];
        assert_eq!(item.title, "Prata 30 seg.");
        assert_eq!(item.quantity, 2);
    }

    #[tokio::test]
    async fn test_form_only_checkout_without_tax_id() {
        let (service, gateway, _log) = setup(FakeGateway::default());
        let raw = json!({
            "email": "ana@example.com",
            "plano": "Bronze 15 seg.",
            "fidelidade_anos": 1,
            "qtd_locais": 1,
            "valor_mensal_total": 80
        });
        let request = ContractCheckout {
            form_data: Some(serde_json::from_value(raw).unwrap()),
            contract_id: None,
            payment: pix(),
        };
        service.checkout_with_contract(request, None).await.unwrap();

        let created = gateway.created.lock().unwrap();
        assert_eq!(created[0].total_amount, "80.00");
        let payer = created[0].payer.as_ref().unwrap();
        assert_eq!(payer.identification, None);
        assert_eq!(payer.entity_type, None);
    }

    #[tokio::test]
    async fn test_invalid_refund_never_reaches_gateway() {
        let (service, _gateway, _log) = setup(FakeGateway::default());
        let refund: RefundRequest = serde_json::from_value(json!({
            "transactions": [ { "id": "", "amount": "10.00" } ]
        }))
        .unwrap();
        let err = service.refund_order("ORD1", refund, None).await.unwrap_err();
        assert!(matches!(err, CheckoutError::ValidationError(_)));
    }
}
