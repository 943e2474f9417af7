use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::enums::{PaymentMethod, PaymentStatus};
use crate::models::Payment;

#[derive(Debug, Deserialize, ToSchema)]
pub struct PreferenceRequest {
    pub order_id: Uuid,
    /// Preselects PIX or boleto on the hosted checkout page.
    pub payment_method: Option<PaymentMethod>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PreferenceResponse {
    pub preference_id: String,
    pub init_point: String,
    pub sandbox_init_point: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CardDetails {
    /// Card token produced by the gateway's client-side SDK.
    pub token: String,
    pub installments: u32,
    /// Card brand as known to the gateway, e.g. `visa`.
    pub payment_method_id: String,
    pub issuer_id: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DirectPaymentRequest {
    pub order_id: Uuid,
    pub payment_method: PaymentMethod,
    /// Required when `payment_method` is `credit_card`.
    pub card: Option<CardDetails>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProcessPaymentResponse {
    pub success: bool,
    pub payment_id: String,
    pub status: PaymentStatus,
    pub status_detail: Option<String>,
    pub external_reference: String,
    pub pix_qr_code: Option<String>,
    pub pix_qr_code_base64: Option<String>,
    pub boleto_url: Option<String>,
    pub boleto_barcode: Option<String>,
}

/// Either our stored record or, when we have none, the gateway's own view.
#[derive(Debug, Serialize, ToSchema)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum PaymentDetail {
    Local { payment: Payment },
    Gateway {
        #[schema(value_type = Object)]
        payment: Value,
    },
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct InstallmentsQuery {
    #[schema(value_type = String)]
    pub amount: Decimal,
    pub bin: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PublicKeyResponse {
    pub public_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AckStatus {
    Ok,
    Received,
    Error,
}

/// Body returned to the webhook notifier. Always sent with HTTP 200.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WebhookAck {
    pub status: AckStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl WebhookAck {
    pub fn new(status: AckStatus) -> Self {
        Self {
            status,
            message: None,
        }
    }

    pub fn with_message(status: AckStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: Some(message.into()),
        }
    }
}
