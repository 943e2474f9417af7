use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::entity::enums::PaymentStatus;
use crate::gateway::{
    GatewayError, GatewayPayment, GatewayPreference, GatewayResult, PaymentGateway,
    PaymentRequest, PreferenceRequest,
};

/// How the mock answers `create_payment`.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// 201 with the given status and status detail.
    Respond(PaymentStatus, String),
    /// 400 with the given provider message.
    Decline(String),
    ServerError,
    Timeout,
}

/// In-memory gateway for local runs (`GATEWAY_PROVIDER=mock`) and tests.
/// Payments it creates are kept so later `fetch_payment` calls see them.
pub struct MockGateway {
    behavior: Mutex<MockBehavior>,
    payments: Mutex<HashMap<String, GatewayPayment>>,
    fetch_unavailable: AtomicBool,
    sequence: AtomicU64,
    create_calls: AtomicUsize,
    preference_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
    annotations: Mutex<Option<Value>>,
}

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockGateway {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            payments: Mutex::new(HashMap::new()),
            fetch_unavailable: AtomicBool::new(false),
            // Random base keeps ids unique across runs against the same database.
            sequence: AtomicU64::new(Uuid::new_v4().as_u64_pair().0 % 1_000_000_000_000),
            create_calls: AtomicUsize::new(0),
            preference_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            annotations: Mutex::new(None),
        }
    }

    pub fn approving() -> Self {
        Self::new(MockBehavior::Respond(
            PaymentStatus::Approved,
            "accredited".to_string(),
        ))
    }

    pub fn set_behavior(&self, behavior: MockBehavior) {
        *guard(&self.behavior) = behavior;
    }

    /// Make every `fetch_payment` fail at the transport level.
    pub fn set_fetch_unavailable(&self, unavailable: bool) {
        self.fetch_unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Register a payment that was made outside our API, e.g. in hosted checkout.
    pub fn insert_payment(
        &self,
        status: PaymentStatus,
        external_reference: Option<String>,
        amount: Decimal,
        method_id: &str,
    ) -> GatewayPayment {
        let id = self.next_id();
        let payment = build_payment(
            id,
            status,
            status_detail_for(status).to_string(),
            external_reference,
            amount,
            method_id,
        );
        guard(&self.payments).insert(payment.id.clone(), payment.clone());
        payment
    }

    /// Change the status the gateway reports for an existing payment.
    pub fn set_status(&self, id: &str, status: PaymentStatus) {
        if let Some(payment) = guard(&self.payments).get_mut(id) {
            payment.status = status;
            payment.status_detail = Some(status_detail_for(status).to_string());
            payment.raw["status"] = json!(status);
        }
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn preference_calls(&self) -> usize {
        self.preference_calls.load(Ordering::SeqCst)
    }

    /// Merge the keys of `extra` into the raw body of every payment created
    /// from now on, e.g. provider fields the typed view does not read.
    pub fn annotate_payments(&self, extra: Value) {
        *guard(&self.annotations) = Some(extra);
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Id the next created payment will get.
    pub fn upcoming_id(&self) -> String {
        (1_000_000 + self.sequence.load(Ordering::SeqCst)).to_string()
    }

    fn next_id(&self) -> String {
        (1_000_000 + self.sequence.fetch_add(1, Ordering::SeqCst)).to_string()
    }
}

fn status_detail_for(status: PaymentStatus) -> &'static str {
    match status {
        PaymentStatus::Pending => "pending_waiting_payment",
        PaymentStatus::Approved => "accredited",
        PaymentStatus::Rejected => "cc_rejected_other_reason",
        PaymentStatus::Refunded => "refunded",
        PaymentStatus::Cancelled => "expired",
    }
}

fn build_payment(
    id: String,
    status: PaymentStatus,
    status_detail: String,
    external_reference: Option<String>,
    amount: Decimal,
    method_id: &str,
) -> GatewayPayment {
    let (payment_type, qr_code, boleto_url, barcode) = match method_id {
        "pix" => (
            "bank_transfer",
            Some(format!("00020126mock{id}")),
            None,
            None,
        ),
        "bolbradesco" => (
            "ticket",
            None,
            Some(format!("https://mock.gateway/boleto/{id}")),
            Some(format!("23790{id}")),
        ),
        _ => ("credit_card", None, None, None),
    };
    let raw = json!({
        "id": id,
        "status": status,
        "status_detail": status_detail,
        "external_reference": external_reference,
        "transaction_amount": amount.to_f64(),
        "payment_method_id": method_id,
        "payment_type_id": payment_type,
    });

    GatewayPayment {
        pix_qr_code_base64: qr_code.as_ref().map(|_| "bW9jaw==".to_string()),
        pix_qr_code: qr_code,
        boleto_url,
        boleto_barcode: barcode,
        id,
        status,
        status_detail: Some(status_detail),
        external_reference,
        transaction_amount: Some(amount),
        payment_method_id: Some(method_id.to_string()),
        payment_type_id: Some(payment_type.to_string()),
        preference_id: None,
        raw,
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn create_payment(
        &self,
        request: &PaymentRequest,
    ) -> Result<GatewayResult<GatewayPayment>, GatewayError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let behavior = guard(&self.behavior).clone();
        match behavior {
            MockBehavior::Respond(status, detail) => {
                let mut payment = build_payment(
                    self.next_id(),
                    status,
                    detail,
                    Some(request.external_reference.clone()),
                    request.amount,
                    &request.payment_method_id,
                );
                let annotations = guard(&self.annotations).clone();
                if let (Some(Value::Object(extra)), Value::Object(raw)) =
                    (annotations, &mut payment.raw)
                {
                    raw.extend(extra);
                }
                guard(&self.payments).insert(payment.id.clone(), payment.clone());
                Ok(GatewayResult::Success(payment))
            }
            MockBehavior::Decline(message) => Ok(GatewayResult::ClientError {
                status: 400,
                body: json!({ "message": message, "error": "bad_request", "status": 400 }),
            }),
            MockBehavior::ServerError => Ok(GatewayResult::ServerError {
                status: 500,
                body: json!({ "message": "internal_error", "status": 500 }),
            }),
            MockBehavior::Timeout => Err(GatewayError::Timeout),
        }
    }

    async fn create_preference(
        &self,
        request: &PreferenceRequest,
    ) -> Result<GatewayResult<GatewayPreference>, GatewayError> {
        self.preference_calls.fetch_add(1, Ordering::SeqCst);
        let behavior = guard(&self.behavior).clone();
        match behavior {
            MockBehavior::Respond(..) => {}
            MockBehavior::Decline(message) => {
                return Ok(GatewayResult::ClientError {
                    status: 400,
                    body: json!({ "message": message, "error": "bad_request", "status": 400 }),
                });
            }
            MockBehavior::ServerError => {
                return Ok(GatewayResult::ServerError {
                    status: 500,
                    body: json!({ "message": "internal_error", "status": 500 }),
                });
            }
            MockBehavior::Timeout => return Err(GatewayError::Timeout),
        }
        let id = format!("pref-{}", self.next_id());
        let init_point = format!("https://mock.gateway/checkout?pref_id={id}");
        let raw = json!({
            "id": id,
            "init_point": init_point,
            "external_reference": request.external_reference,
            "items": request.items.len(),
        });
        Ok(GatewayResult::Success(GatewayPreference {
            sandbox_init_point: Some(format!("{init_point}&sandbox=true")),
            id,
            init_point,
            raw,
        }))
    }

    async fn fetch_payment(
        &self,
        id: &str,
    ) -> Result<GatewayResult<GatewayPayment>, GatewayError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fetch_unavailable.load(Ordering::SeqCst) {
            return Err(GatewayError::Timeout);
        }
        match guard(&self.payments).get(id) {
            Some(payment) => Ok(GatewayResult::Success(payment.clone())),
            None => Ok(GatewayResult::ClientError {
                status: 404,
                body: json!({ "message": "Payment not found", "status": 404 }),
            }),
        }
    }

    async fn list_payment_methods(&self) -> Result<GatewayResult<Value>, GatewayError> {
        Ok(GatewayResult::Success(json!([
            { "id": "pix", "payment_type_id": "bank_transfer" },
            { "id": "bolbradesco", "payment_type_id": "ticket" },
            { "id": "visa", "payment_type_id": "credit_card" },
            { "id": "master", "payment_type_id": "credit_card" },
        ])))
    }

    async fn compute_installments(
        &self,
        amount: Decimal,
        bin: &str,
    ) -> Result<GatewayResult<Value>, GatewayError> {
        let options: Vec<Value> = (1..=3u32)
            .map(|n| {
                let per = (amount / Decimal::from(n)).round_dp(2);
                json!({ "installments": n, "installment_amount": per.to_f64() })
            })
            .collect();
        Ok(GatewayResult::Success(json!([{
            "bin": bin,
            "payment_method_id": "visa",
            "payer_costs": options,
        }])))
    }
}
