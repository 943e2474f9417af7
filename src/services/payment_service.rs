use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder,
    TransactionTrait,
};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    audit::{TransactionEntry, record_detached, record_transaction},
    config::PaymentSettings,
    dto::payments::{
        CardDetails, DirectPaymentRequest, InstallmentsQuery, PaymentDetail,
        PreferenceRequest as CreatePreferenceRequest, PreferenceResponse, ProcessPaymentResponse,
        PublicKeyResponse,
    },
    entity::{
        enums::{OrderStatus, PaymentMethod, PaymentStatus, TransactionAction, TransactionOutcome},
        order_items::{Column as OrderItemCol, Entity as OrderItems, Model as OrderItemModel},
        orders::{Entity as Orders, Model as OrderModel},
        payments::{Column as PayCol, Entity as Payments},
        users::{Entity as Users, Model as UserModel},
    },
    error::{AppError, AppResult},
    gateway::{
        BackUrls, GatewayPayment, GatewayResult, Identification, Payer, PaymentRequest,
        PreferenceItem, PreferenceRequest, is_valid_payment_id,
    },
    middleware::auth::AuthUser,
    models::Payment,
    response::ApiResponse,
    services::settlement::{Settlement, apply_gateway_payment},
    state::AppState,
};

/// Split a full name into the first and last whitespace-separated tokens.
pub fn split_name(full_name: &str) -> (String, Option<String>) {
    let tokens: Vec<&str> = full_name.split_whitespace().collect();
    match tokens.as_slice() {
        [] => ("Customer".to_string(), None),
        [only] => (only.to_string(), None),
        [first, .., last] => (first.to_string(), Some(last.to_string())),
    }
}

/// Strip punctuation from a CPF/CNPJ, keeping digits only.
pub fn normalize_tax_id(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

pub fn identification_for(raw: &str) -> Option<Identification> {
    let number = normalize_tax_id(raw);
    let kind = match number.len() {
        11 => "CPF",
        14 => "CNPJ",
        _ => return None,
    };
    Some(Identification {
        kind: kind.to_string(),
        number,
    })
}

pub fn build_payer(user: &UserModel) -> Payer {
    let (first_name, last_name) = split_name(&user.name);
    Payer {
        email: user.email.clone(),
        first_name: Some(first_name),
        last_name,
        identification: user.tax_id.as_deref().and_then(identification_for),
    }
}

fn order_description(order: &OrderModel) -> String {
    let id = order.id.simple().to_string();
    format!("Order #{}", &id[..8])
}

/// Gateway payment request for `order`. The amount is always the order total.
pub fn build_payment_request(
    settings: &PaymentSettings,
    order: &OrderModel,
    buyer: &UserModel,
    method: PaymentMethod,
    card: Option<&CardDetails>,
) -> AppResult<PaymentRequest> {
    let payer = build_payer(buyer);
    let (payment_method_id, token, installments, issuer_id) = match method {
        PaymentMethod::Pix => ("pix".to_string(), None, None, None),
        PaymentMethod::Boleto => {
            if payer.identification.is_none() {
                return Err(AppError::BadRequest(
                    "A valid CPF or CNPJ is required for boleto payments".into(),
                ));
            }
            ("bolbradesco".to_string(), None, None, None)
        }
        PaymentMethod::CreditCard => {
            let card = card.ok_or_else(|| {
                AppError::BadRequest("Card details are required for credit card payments".into())
            })?;
            if card.token.trim().is_empty() || card.payment_method_id.trim().is_empty() {
                return Err(AppError::BadRequest("Card token and brand are required".into()));
            }
            if card.installments == 0 || card.installments > settings.max_installments {
                return Err(AppError::BadRequest(format!(
                    "Installments must be between 1 and {}",
                    settings.max_installments
                )));
            }
            (
                card.payment_method_id.clone(),
                Some(card.token.clone()),
                Some(card.installments),
                card.issuer_id.clone(),
            )
        }
    };

    Ok(PaymentRequest {
        idempotency_key: Uuid::new_v4(),
        amount: order.total,
        description: order_description(order),
        payment_method_id,
        token,
        installments,
        issuer_id,
        payer,
        external_reference: order.id.to_string(),
        notification_url: settings.notification_url.clone(),
    })
}

pub fn build_preference_request(
    settings: &PaymentSettings,
    order: &OrderModel,
    items: &[OrderItemModel],
    buyer: &UserModel,
    method_hint: Option<PaymentMethod>,
) -> PreferenceRequest {
    let base = settings.frontend_url.trim_end_matches('/');
    PreferenceRequest {
        items: items
            .iter()
            .map(|item| PreferenceItem {
                id: item.product_id.to_string(),
                title: item.product_name.clone(),
                quantity: item.quantity.max(0) as u32,
                unit_price: item.unit_price,
                currency_id: settings.currency.clone(),
            })
            .collect(),
        payer: Some(build_payer(buyer)),
        back_urls: Some(BackUrls {
            success: format!("{base}/payment/success"),
            failure: format!("{base}/payment/failure"),
            pending: format!("{base}/payment/pending"),
        }),
        external_reference: order.id.to_string(),
        notification_url: settings.notification_url.clone(),
        default_payment_method_id: match method_hint {
            Some(PaymentMethod::Pix) => Some("pix".to_string()),
            Some(PaymentMethod::Boleto) => Some("bolbradesco".to_string()),
            Some(PaymentMethod::CreditCard) | None => None,
        },
        max_installments: settings.max_installments,
    }
}

/// Load an order the caller may pay: it must exist, be theirs and still be pending.
pub async fn load_payable_order<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
    user: &AuthUser,
) -> AppResult<OrderModel> {
    let order = Orders::find_by_id(order_id)
        .one(conn)
        .await?
        .ok_or(AppError::OrderNotFound)?;
    if order.user_id != user.user_id {
        return Err(AppError::OrderNotOwned);
    }
    match order.status {
        OrderStatus::Pending => Ok(order),
        OrderStatus::Paid | OrderStatus::Processing | OrderStatus::Completed => {
            Err(AppError::OrderAlreadyPaid)
        }
        OrderStatus::Cancelled => Err(AppError::OrderNotPayable),
    }
}

async fn load_buyer<C: ConnectionTrait>(conn: &C, user: &AuthUser) -> AppResult<UserModel> {
    Users::find_by_id(user.user_id)
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)
}

fn snapshot<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

pub async fn create_preference(
    state: &AppState,
    user: &AuthUser,
    payload: CreatePreferenceRequest,
) -> AppResult<ApiResponse<PreferenceResponse>> {
    let order = load_payable_order(&state.orm, payload.order_id, user).await?;
    let buyer = load_buyer(&state.orm, user).await?;
    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .order_by_asc(OrderItemCol::CreatedAt)
        .all(&state.orm)
        .await?;

    let request =
        build_preference_request(&state.settings, &order, &items, &buyer, payload.payment_method);
    let entry = TransactionEntry::new(TransactionAction::CreatePreference, TransactionOutcome::Success)
        .request(snapshot(&request));

    let result = match state.gateway.create_preference(&request).await {
        Ok(result) => result,
        Err(err) => {
            tracing::warn!(order_id = %order.id, error = %err, "preference request failed");
            let entry = TransactionEntry {
                outcome: TransactionOutcome::Error,
                ..entry
            }
            .error(err.to_string());
            record_detached(&state.orm, entry).await;
            return Err(AppError::GatewayUnavailable(err.to_string()));
        }
    };

    let preference = match result {
        GatewayResult::Success(preference) => preference,
        failed => {
            tracing::warn!(order_id = %order.id, message = ?failed.error_message(), "gateway refused preference");
            let mut entry = TransactionEntry {
                outcome: TransactionOutcome::Error,
                ..entry
            }
            .error(failed.error_message().unwrap_or_else(|| "preference rejected".into()));
            entry.response_payload = failed.error_body().cloned();
            record_detached(&state.orm, entry).await;
            return Err(AppError::PreferenceFailed);
        }
    };

    record_detached(&state.orm, entry.response(preference.raw.clone())).await;

    Ok(ApiResponse::ok(
        "Preference created",
        PreferenceResponse {
            preference_id: preference.id,
            init_point: preference.init_point,
            sandbox_init_point: preference.sandbox_init_point,
        },
    ))
}

/// Pay an order directly (PIX, boleto or card). Whatever status the gateway
/// reports is stored verbatim; only an approval settles the order.
pub async fn create_direct_payment(
    state: &AppState,
    user: &AuthUser,
    payload: DirectPaymentRequest,
) -> AppResult<ApiResponse<ProcessPaymentResponse>> {
    let order = load_payable_order(&state.orm, payload.order_id, user).await?;
    let buyer = load_buyer(&state.orm, user).await?;
    let request = build_payment_request(
        &state.settings,
        &order,
        &buyer,
        payload.payment_method,
        payload.card.as_ref(),
    )?;
    let request_snapshot = snapshot(&request);

    let failed_entry = |message: String, response: Option<Value>| {
        let mut entry =
            TransactionEntry::new(TransactionAction::CreatePayment, TransactionOutcome::Error)
                .request(request_snapshot.clone())
                .error(message);
        entry.response_payload = response;
        entry
    };

    let observed = match state.gateway.create_payment(&request).await {
        Ok(GatewayResult::Success(payment)) => payment,
        Ok(GatewayResult::ClientError { status, body }) => {
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Payment was declined")
                .to_string();
            tracing::info!(order_id = %order.id, status, message = %message, "gateway rejected payment");
            record_detached(&state.orm, failed_entry(message.clone(), Some(body))).await;
            return Err(AppError::GatewayRejected(message));
        }
        Ok(GatewayResult::ServerError { status, body }) => {
            let message = format!("gateway answered {status}");
            record_detached(&state.orm, failed_entry(message.clone(), Some(body))).await;
            return Err(AppError::GatewayUnavailable(message));
        }
        Err(err) => {
            tracing::warn!(order_id = %order.id, error = %err, "payment request got no answer");
            record_detached(&state.orm, failed_entry(err.to_string(), None)).await;
            return Err(AppError::GatewayUnavailable(err.to_string()));
        }
    };

    let settlement = match persist_payment(
        &state.orm,
        &order,
        &observed,
        payload.payment_method,
        request_snapshot,
    )
    .await
    {
        Ok(settlement) => settlement,
        Err(err) => {
            // The gateway holds a payment we could not record; the webhook
            // reconciler will pick it up through the external reference.
            tracing::error!(
                order_id = %order.id,
                gateway_payment_id = %observed.id,
                error = %err,
                "payment accepted by gateway but not stored"
            );
            return Err(AppError::Storage(err));
        }
    };

    let payment = settlement.payment;
    let success = !matches!(
        payment.status,
        PaymentStatus::Rejected | PaymentStatus::Cancelled
    );
    let message = if success {
        "Payment processed"
    } else {
        "Payment not approved"
    };

    Ok(ApiResponse::ok(
        message,
        ProcessPaymentResponse {
            success,
            payment_id: observed.id,
            status: payment.status,
            status_detail: payment.status_detail,
            external_reference: payment.external_reference,
            pix_qr_code: payment.pix_qr_code,
            pix_qr_code_base64: payment.pix_qr_code_base64,
            boleto_url: payment.boleto_url,
            boleto_barcode: payment.boleto_barcode,
        },
    ))
}

/// Payment row, order settlement and log entry commit together or not at all.
async fn persist_payment(
    db: &DatabaseConnection,
    order: &OrderModel,
    observed: &GatewayPayment,
    method: PaymentMethod,
    request_snapshot: Value,
) -> Result<Settlement, DbErr> {
    let txn = db.begin().await?;
    let settlement = apply_gateway_payment(&txn, order, observed, Some(method)).await?;
    record_transaction(
        &txn,
        TransactionEntry::new(TransactionAction::CreatePayment, TransactionOutcome::Success)
            .gateway_payment_id(observed.id.clone())
            .request(request_snapshot)
            .response(observed.raw.clone()),
    )
    .await?;
    txn.commit().await?;
    Ok(settlement)
}

pub async fn get_payment(state: &AppState, gateway_id: &str) -> AppResult<ApiResponse<PaymentDetail>> {
    if !is_valid_payment_id(gateway_id) {
        return Err(AppError::BadRequest("Invalid payment id".into()));
    }

    let local = Payments::find()
        .filter(PayCol::GatewayPaymentId.eq(gateway_id))
        .one(&state.orm)
        .await?;
    if let Some(payment) = local {
        return Ok(ApiResponse::ok(
            "Payment found",
            PaymentDetail::Local {
                payment: payment.into(),
            },
        ));
    }

    match state.gateway.fetch_payment(gateway_id).await {
        Ok(GatewayResult::Success(payment)) => Ok(ApiResponse::ok(
            "Payment found",
            PaymentDetail::Gateway {
                payment: payment.raw,
            },
        )),
        Ok(GatewayResult::ClientError { .. }) => Err(AppError::NotFound),
        Ok(GatewayResult::ServerError { status, .. }) => Err(AppError::GatewayUnavailable(format!(
            "gateway answered {status}"
        ))),
        Err(err) => Err(AppError::GatewayUnavailable(err.to_string())),
    }
}

pub async fn get_payment_status(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
) -> AppResult<ApiResponse<Payment>> {
    let order = Orders::find_by_id(order_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::OrderNotFound)?;
    if order.user_id != user.user_id {
        return Err(AppError::OrderNotOwned);
    }

    let payment = Payments::find()
        .filter(PayCol::OrderId.eq(order.id))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    Ok(ApiResponse::ok(
        "Payment found",
        payment.into(),
    ))
}

fn passthrough(result: Result<GatewayResult<Value>, crate::gateway::GatewayError>) -> AppResult<Value> {
    match result {
        Ok(GatewayResult::Success(body)) => Ok(body),
        Ok(failed @ GatewayResult::ClientError { .. }) => Err(AppError::BadRequest(
            failed
                .error_message()
                .unwrap_or_else(|| "Request refused by gateway".into()),
        )),
        Ok(GatewayResult::ServerError { status, .. }) => Err(AppError::GatewayUnavailable(format!(
            "gateway answered {status}"
        ))),
        Err(err) => Err(AppError::GatewayUnavailable(err.to_string())),
    }
}

pub async fn list_payment_methods(state: &AppState) -> AppResult<ApiResponse<Value>> {
    let methods = passthrough(state.gateway.list_payment_methods().await)?;
    Ok(ApiResponse::ok("Payment methods", methods))
}

pub async fn installments(
    state: &AppState,
    query: InstallmentsQuery,
) -> AppResult<ApiResponse<Value>> {
    if query.amount <= Decimal::ZERO {
        return Err(AppError::BadRequest("amount must be positive".into()));
    }
    let bin_ok = (6..=8).contains(&query.bin.len()) && query.bin.chars().all(|c| c.is_ascii_digit());
    if !bin_ok {
        return Err(AppError::BadRequest("bin must be 6 to 8 digits".into()));
    }

    let options = passthrough(
        state
            .gateway
            .compute_installments(query.amount, &query.bin)
            .await,
    )?;
    Ok(ApiResponse::ok(
        "Installments",
        options,
    ))
}

pub fn public_key(state: &AppState) -> ApiResponse<PublicKeyResponse> {
    ApiResponse::ok(
        "Public key",
        PublicKeyResponse {
            public_key: state.settings.public_key.clone(),
        },
    )
}
