use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::enums::PaymentStatus;
use crate::gateway::{
    GatewayError, GatewayPayment, GatewayPreference, GatewayResult, PaymentGateway,
    PaymentRequest, PreferenceRequest,
};

pub struct MercadoPagoGateway {
    pub base_url: String,
    pub access_token: String,
    pub client: reqwest::Client,
}

impl MercadoPagoGateway {
    pub fn new(
        base_url: impl Into<String>,
        access_token: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T>(
        &self,
        builder: RequestBuilder,
        parse: fn(Value) -> Result<T, GatewayError>,
    ) -> Result<GatewayResult<T>, GatewayError> {
        let resp = builder
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(transport_error)?;
        let status = resp.status();
        let text = resp.text().await.map_err(transport_error)?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        classify(status, body, parse)
    }
}

fn transport_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Transport(err.to_string())
    }
}

/// Split an HTTP answer into the three result classes. 408 and 429 say
/// nothing about the payment itself, so they count as server-side.
pub fn classify<T>(
    status: StatusCode,
    body: Value,
    parse: fn(Value) -> Result<T, GatewayError>,
) -> Result<GatewayResult<T>, GatewayError> {
    let code = status.as_u16();
    if status.is_success() {
        return parse(body).map(GatewayResult::Success);
    }
    if status.is_client_error()
        && status != StatusCode::REQUEST_TIMEOUT
        && status != StatusCode::TOO_MANY_REQUESTS
    {
        Ok(GatewayResult::ClientError { status: code, body })
    } else {
        Ok(GatewayResult::ServerError { status: code, body })
    }
}

#[derive(Debug, Serialize)]
pub struct MpIdentification {
    #[serde(rename = "type")]
    pub kind: String,
    pub number: String,
}

#[derive(Debug, Serialize)]
pub struct MpPayer {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identification: Option<MpIdentification>,
}

#[derive(Debug, Serialize)]
pub struct MpPaymentBody {
    #[serde(with = "rust_decimal::serde::float")]
    pub transaction_amount: Decimal,
    pub description: String,
    pub payment_method_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installments: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer_id: Option<String>,
    pub payer: MpPayer,
    pub external_reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_url: Option<String>,
}

pub fn payment_body(req: &PaymentRequest) -> MpPaymentBody {
    MpPaymentBody {
        transaction_amount: req.amount,
        description: req.description.clone(),
        payment_method_id: req.payment_method_id.clone(),
        token: req.token.clone(),
        installments: req.installments,
        issuer_id: req.issuer_id.clone(),
        payer: MpPayer {
            email: req.payer.email.clone(),
            first_name: req.payer.first_name.clone(),
            last_name: req.payer.last_name.clone(),
            identification: req.payer.identification.as_ref().map(|id| MpIdentification {
                kind: id.kind.clone(),
                number: id.number.clone(),
            }),
        },
        external_reference: req.external_reference.clone(),
        notification_url: req.notification_url.clone(),
    }
}

#[derive(Debug, Serialize)]
pub struct MpPreferenceItem {
    pub id: String,
    pub title: String,
    pub quantity: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
    pub currency_id: String,
}

#[derive(Debug, Serialize)]
pub struct MpPreferencePayer {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surname: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MpBackUrls {
    pub success: String,
    pub failure: String,
    pub pending: String,
}

#[derive(Debug, Serialize)]
pub struct MpPaymentMethods {
    pub excluded_payment_types: Vec<Value>,
    pub installments: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_payment_method_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MpPreferenceBody {
    pub items: Vec<MpPreferenceItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer: Option<MpPreferencePayer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub back_urls: Option<MpBackUrls>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_return: Option<String>,
    pub external_reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_url: Option<String>,
    pub payment_methods: MpPaymentMethods,
}

pub fn preference_body(req: &PreferenceRequest) -> MpPreferenceBody {
    MpPreferenceBody {
        items: req
            .items
            .iter()
            .map(|item| MpPreferenceItem {
                id: item.id.clone(),
                title: item.title.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price,
                currency_id: item.currency_id.clone(),
            })
            .collect(),
        payer: req.payer.as_ref().map(|payer| MpPreferencePayer {
            email: payer.email.clone(),
            name: payer.first_name.clone(),
            surname: payer.last_name.clone(),
        }),
        back_urls: req.back_urls.as_ref().map(|urls| MpBackUrls {
            success: urls.success.clone(),
            failure: urls.failure.clone(),
            pending: urls.pending.clone(),
        }),
        auto_return: req.back_urls.as_ref().map(|_| "approved".to_string()),
        external_reference: req.external_reference.clone(),
        notification_url: req.notification_url.clone(),
        payment_methods: MpPaymentMethods {
            excluded_payment_types: Vec::new(),
            installments: req.max_installments,
            default_payment_method_id: req.default_payment_method_id.clone(),
        },
    }
}

/// Map the provider's status vocabulary onto ours. Unknown values are
/// treated as still pending, never as approved.
pub fn map_status(status: &str) -> PaymentStatus {
    match status {
        "approved" => PaymentStatus::Approved,
        "rejected" => PaymentStatus::Rejected,
        "refunded" | "charged_back" => PaymentStatus::Refunded,
        "cancelled" => PaymentStatus::Cancelled,
        "pending" | "in_process" | "authorized" | "in_mediation" => PaymentStatus::Pending,
        other => {
            tracing::warn!(status = %other, "unknown gateway payment status");
            PaymentStatus::Pending
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct MpTransactionData {
    qr_code: Option<String>,
    qr_code_base64: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct MpPointOfInteraction {
    transaction_data: Option<MpTransactionData>,
}

#[derive(Debug, Default, Deserialize)]
struct MpTransactionDetails {
    external_resource_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct MpBarcode {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MpPayment {
    id: Value,
    status: String,
    status_detail: Option<String>,
    external_reference: Option<String>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    transaction_amount: Option<Decimal>,
    payment_method_id: Option<String>,
    payment_type_id: Option<String>,
    preference_id: Option<String>,
    point_of_interaction: Option<MpPointOfInteraction>,
    transaction_details: Option<MpTransactionDetails>,
    barcode: Option<MpBarcode>,
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn parse_payment(body: Value) -> Result<GatewayPayment, GatewayError> {
    let mp: MpPayment =
        serde_json::from_value(body.clone()).map_err(|e| GatewayError::Decode(e.to_string()))?;
    let id = id_string(&mp.id).ok_or_else(|| GatewayError::Decode("payment without id".into()))?;
    let transaction_data = mp
        .point_of_interaction
        .and_then(|poi| poi.transaction_data)
        .unwrap_or_default();

    Ok(GatewayPayment {
        id,
        status: map_status(&mp.status),
        status_detail: mp.status_detail,
        external_reference: mp.external_reference.filter(|r| !r.is_empty()),
        transaction_amount: mp.transaction_amount.map(|amount| amount.round_dp(2)),
        payment_method_id: mp.payment_method_id,
        payment_type_id: mp.payment_type_id,
        preference_id: mp.preference_id,
        pix_qr_code: transaction_data.qr_code,
        pix_qr_code_base64: transaction_data.qr_code_base64,
        boleto_url: mp.transaction_details.and_then(|d| d.external_resource_url),
        boleto_barcode: mp.barcode.and_then(|b| b.content),
        raw: body,
    })
}

#[derive(Debug, Deserialize)]
struct MpPreference {
    id: String,
    init_point: String,
    sandbox_init_point: Option<String>,
}

pub fn parse_preference(body: Value) -> Result<GatewayPreference, GatewayError> {
    let mp: MpPreference =
        serde_json::from_value(body.clone()).map_err(|e| GatewayError::Decode(e.to_string()))?;
    Ok(GatewayPreference {
        id: mp.id,
        init_point: mp.init_point,
        sandbox_init_point: mp.sandbox_init_point,
        raw: body,
    })
}

fn passthrough(body: Value) -> Result<Value, GatewayError> {
    Ok(body)
}

#[async_trait]
impl PaymentGateway for MercadoPagoGateway {
    fn name(&self) -> &'static str {
        "mercadopago"
    }

    async fn create_payment(
        &self,
        request: &PaymentRequest,
    ) -> Result<GatewayResult<GatewayPayment>, GatewayError> {
        let builder = self
            .client
            .post(self.url("/v1/payments"))
            .header("X-Idempotency-Key", request.idempotency_key.to_string())
            .json(&payment_body(request));
        self.send(builder, parse_payment).await
    }

    async fn create_preference(
        &self,
        request: &PreferenceRequest,
    ) -> Result<GatewayResult<GatewayPreference>, GatewayError> {
        let builder = self
            .client
            .post(self.url("/checkout/preferences"))
            .json(&preference_body(request));
        self.send(builder, parse_preference).await
    }

    async fn fetch_payment(
        &self,
        id: &str,
    ) -> Result<GatewayResult<GatewayPayment>, GatewayError> {
        let builder = self.client.get(self.url(&format!("/v1/payments/{id}")));
        self.send(builder, parse_payment).await
    }

    async fn list_payment_methods(&self) -> Result<GatewayResult<Value>, GatewayError> {
        let builder = self.client.get(self.url("/v1/payment_methods"));
        self.send(builder, passthrough).await
    }

    async fn compute_installments(
        &self,
        amount: Decimal,
        bin: &str,
    ) -> Result<GatewayResult<Value>, GatewayError> {
        let builder = self
            .client
            .get(self.url("/v1/payment_methods/installments"))
            .query(&[("amount", amount.to_string()), ("bin", bin.to_string())]);
        self.send(builder, passthrough).await
    }
}
