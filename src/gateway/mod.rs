//! Payment gateway adapter.
//!
//! Everything outside this module talks to the provider through
//! [`PaymentGateway`] and the typed views below; only the provider
//! implementations know its wire format and status vocabulary.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::entity::enums::{PaymentMethod, PaymentStatus};

pub mod mercadopago;
pub mod mock;

/// Outcome of one outbound call that got an HTTP answer.
#[derive(Debug, Clone)]
pub enum GatewayResult<T> {
    Success(T),
    ClientError { status: u16, body: Value },
    ServerError { status: u16, body: Value },
}

impl<T> GatewayResult<T> {
    /// Provider-supplied message of an error body, if any.
    pub fn error_message(&self) -> Option<String> {
        match self {
            GatewayResult::Success(_) => None,
            GatewayResult::ClientError { body, .. } | GatewayResult::ServerError { body, .. } => {
                body.get("message")
                    .and_then(Value::as_str)
                    .map(ToString::to_string)
            }
        }
    }

    pub fn error_body(&self) -> Option<&Value> {
        match self {
            GatewayResult::Success(_) => None,
            GatewayResult::ClientError { body, .. } | GatewayResult::ServerError { body, .. } => {
                Some(body)
            }
        }
    }
}

/// The call never produced a usable answer.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway timed out")]
    Timeout,

    #[error("gateway transport error: {0}")]
    Transport(String),

    #[error("gateway response could not be decoded: {0}")]
    Decode(String),
}

/// Gateway ids end up in request paths, so only plain tokens are accepted.
pub fn is_valid_payment_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[derive(Debug, Clone, Serialize)]
pub struct Identification {
    #[serde(rename = "type")]
    pub kind: String,
    pub number: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Payer {
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub identification: Option<Identification>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentRequest {
    pub idempotency_key: Uuid,
    pub amount: Decimal,
    pub description: String,
    /// Provider method id: `pix`, `bolbradesco` or a card brand.
    pub payment_method_id: String,
    #[serde(skip_serializing)]
    pub token: Option<String>,
    pub installments: Option<u32>,
    pub issuer_id: Option<String>,
    pub payer: Payer,
    pub external_reference: String,
    pub notification_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreferenceItem {
    pub id: String,
    pub title: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub currency_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackUrls {
    pub success: String,
    pub failure: String,
    pub pending: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreferenceRequest {
    pub items: Vec<PreferenceItem>,
    pub payer: Option<Payer>,
    pub back_urls: Option<BackUrls>,
    pub external_reference: String,
    pub notification_url: Option<String>,
    pub default_payment_method_id: Option<String>,
    pub max_installments: u32,
}

/// Provider payment translated into local vocabulary.
#[derive(Debug, Clone)]
pub struct GatewayPayment {
    pub id: String,
    pub status: PaymentStatus,
    pub status_detail: Option<String>,
    pub external_reference: Option<String>,
    pub transaction_amount: Option<Decimal>,
    pub payment_method_id: Option<String>,
    pub payment_type_id: Option<String>,
    pub preference_id: Option<String>,
    pub pix_qr_code: Option<String>,
    pub pix_qr_code_base64: Option<String>,
    pub boleto_url: Option<String>,
    pub boleto_barcode: Option<String>,
    /// Provider body as received, kept for the transaction log.
    pub raw: Value,
}

impl GatewayPayment {
    pub fn method(&self) -> Option<PaymentMethod> {
        match (
            self.payment_method_id.as_deref(),
            self.payment_type_id.as_deref(),
        ) {
            (Some("pix"), _) | (_, Some("bank_transfer")) => Some(PaymentMethod::Pix),
            (_, Some("ticket")) => Some(PaymentMethod::Boleto),
            (_, Some("credit_card" | "debit_card" | "prepaid_card")) => {
                Some(PaymentMethod::CreditCard)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayPreference {
    pub id: String,
    pub init_point: String,
    pub sandbox_init_point: Option<String>,
    pub raw: Value,
}

/// Outbound calls to the payment provider. Each method is one request
/// with no internal retry; `Err` means no answer was obtained.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn name(&self) -> &'static str;

    async fn create_payment(
        &self,
        request: &PaymentRequest,
    ) -> Result<GatewayResult<GatewayPayment>, GatewayError>;

    async fn create_preference(
        &self,
        request: &PreferenceRequest,
    ) -> Result<GatewayResult<GatewayPreference>, GatewayError>;

    async fn fetch_payment(
        &self,
        id: &str,
    ) -> Result<GatewayResult<GatewayPayment>, GatewayError>;

    async fn list_payment_methods(&self) -> Result<GatewayResult<Value>, GatewayError>;

    async fn compute_installments(
        &self,
        amount: Decimal,
        bin: &str,
    ) -> Result<GatewayResult<Value>, GatewayError>;
}
