use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State, rejection::BytesRejection},
    routing::{get, post},
};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    dto::payments::{
        DirectPaymentRequest, InstallmentsQuery, PaymentDetail, PreferenceRequest,
        PreferenceResponse, ProcessPaymentResponse, PublicKeyResponse, WebhookAck,
    },
    error::AppResult,
    middleware::auth::{AuthUser, InternalCaller},
    models::Payment,
    response::ApiResponse,
    services::{payment_service, webhook_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/public-key", get(public_key))
        .route("/preference", post(create_preference))
        .route("/process", post(process_payment))
        .route("/methods", get(payment_methods))
        .route("/installments", get(installments))
        .route("/status/{order_id}", get(payment_status))
        .route("/{id}", get(get_payment))
}

#[utoipa::path(
    get,
    path = "/payment/public-key",
    responses(
        (status = 200, description = "Public key for client-side card tokenisation", body = ApiResponse<PublicKeyResponse>),
    ),
    tag = "Payments"
)]
pub async fn public_key(State(state): State<AppState>) -> Json<ApiResponse<PublicKeyResponse>> {
    Json(payment_service::public_key(&state))
}

#[utoipa::path(
    post,
    path = "/payment/preference",
    request_body = PreferenceRequest,
    responses(
        (status = 200, description = "Hosted checkout preference", body = ApiResponse<PreferenceResponse>),
        (status = 400, description = "Order already paid or cancelled"),
        (status = 403, description = "Order belongs to another user"),
        (status = 404, description = "Order not found"),
        (status = 500, description = "Preference could not be created"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn create_preference(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<PreferenceRequest>,
) -> AppResult<Json<ApiResponse<PreferenceResponse>>> {
    let resp = payment_service::create_preference(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/payment/process",
    request_body = DirectPaymentRequest,
    responses(
        (status = 200, description = "Payment created; check `status`", body = ApiResponse<ProcessPaymentResponse>),
        (status = 400, description = "Invalid request, order not payable or payment declined"),
        (status = 403, description = "Order belongs to another user"),
        (status = 404, description = "Order not found"),
        (status = 502, description = "Gateway unavailable; the outcome is unknown"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn process_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<DirectPaymentRequest>,
) -> AppResult<Json<ApiResponse<ProcessPaymentResponse>>> {
    let resp = payment_service::create_direct_payment(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/payment/methods",
    responses(
        (status = 200, description = "Payment methods offered by the gateway, passed through"),
        (status = 502, description = "Gateway unavailable"),
    ),
    tag = "Payments"
)]
pub async fn payment_methods(State(state): State<AppState>) -> AppResult<Json<ApiResponse<Value>>> {
    let resp = payment_service::list_payment_methods(&state).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/payment/installments",
    params(
        ("amount" = String, Query, description = "Amount to split"),
        ("bin" = String, Query, description = "First 6 to 8 card digits")
    ),
    responses(
        (status = 200, description = "Installment options, passed through"),
        (status = 400, description = "Invalid amount or bin"),
        (status = 502, description = "Gateway unavailable"),
    ),
    tag = "Payments"
)]
pub async fn installments(
    State(state): State<AppState>,
    Query(query): Query<InstallmentsQuery>,
) -> AppResult<Json<ApiResponse<Value>>> {
    let resp = payment_service::installments(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/payment/status/{order_id}",
    params(("order_id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Payment of the order", body = ApiResponse<Payment>),
        (status = 403, description = "Order belongs to another user"),
        (status = 404, description = "Order or payment not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn payment_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Payment>>> {
    let resp = payment_service::get_payment_status(&state, &user, order_id).await?;
    Ok(Json(resp))
}

/// Gateway notifications. Always answers 200 so the notifier does not retry
/// on our internal failures.
#[utoipa::path(
    post,
    path = "/payment/webhook",
    request_body(
        content = Object,
        content_type = "application/json",
        description = "Provider notification envelope `{type, action, data: {id}}`"
    ),
    responses(
        (status = 200, description = "Notification acknowledged", body = WebhookAck),
    ),
    tag = "Payments"
)]
pub async fn webhook(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Json<WebhookAck> {
    let ack = match body {
        Ok(body) => webhook_service::handle_notification(&state, &body).await,
        Err(rejection) => webhook_service::handle_unreadable(&state, rejection.body_text()).await,
    };
    Json(ack)
}

#[utoipa::path(
    get,
    path = "/payment/{id}",
    params(("id" = String, Path, description = "Gateway payment ID")),
    responses(
        (status = 200, description = "Stored payment, or the gateway's view of it", body = ApiResponse<PaymentDetail>),
        (status = 400, description = "Invalid payment id"),
        (status = 401, description = "Missing or wrong API key"),
        (status = 404, description = "Not Found"),
    ),
    security(("api_key" = [])),
    tag = "Payments"
)]
pub async fn get_payment(
    State(state): State<AppState>,
    _caller: InternalCaller,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<PaymentDetail>>> {
    let resp = payment_service::get_payment(&state, &id).await?;
    Ok(Json(resp))
}
