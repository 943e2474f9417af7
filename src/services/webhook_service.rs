use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, TransactionTrait};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    audit::{TransactionEntry, record_detached, record_transaction},
    dto::payments::{AckStatus, WebhookAck},
    entity::{
        enums::{TransactionAction, TransactionOutcome},
        orders::{Entity as Orders, Model as OrderModel},
        payments::{Column as PayCol, Entity as Payments},
    },
    gateway::{GatewayPayment, GatewayResult, is_valid_payment_id},
    services::settlement::apply_gateway_payment,
    state::AppState,
};

/// What a notification points at, read from its envelope only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationTarget {
    Payment(String),
    MissingId,
    Other(String),
}

/// Extract the resource a notification refers to. Anything else the body
/// carries, a status included, is ignored.
pub fn notification_target(body: &Value) -> NotificationTarget {
    let kind = body
        .get("type")
        .or_else(|| body.get("topic"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    if kind != "payment" {
        return NotificationTarget::Other(kind.to_string());
    }

    let id = match body.get("data").and_then(|data| data.get("id")) {
        Some(Value::String(id)) if !id.is_empty() => Some(id.clone()),
        Some(Value::Number(id)) => Some(id.to_string()),
        _ => None,
    };
    id.map_or(NotificationTarget::MissingId, NotificationTarget::Payment)
}

fn webhook_entry(outcome: TransactionOutcome, body: &Value) -> TransactionEntry {
    TransactionEntry::new(TransactionAction::Webhook, outcome).request(body.clone())
}

/// Acknowledge a notification whose body could not be read at all, e.g. one
/// over the size limit. Still leaves exactly one log entry.
pub async fn handle_unreadable(state: &AppState, reason: String) -> WebhookAck {
    tracing::warn!(reason = %reason, "webhook body could not be read");
    let entry = TransactionEntry::new(TransactionAction::Webhook, TransactionOutcome::Error)
        .error(format!("unreadable payload: {reason}"));
    record_detached(&state.orm, entry).await;
    WebhookAck::with_message(AckStatus::Error, "unreadable payload")
}

/// Handle one gateway notification. Never fails: every outcome becomes an
/// acknowledgment plus exactly one transaction log entry.
pub async fn handle_notification(state: &AppState, raw: &[u8]) -> WebhookAck {
    let body: Value = match serde_json::from_slice(raw) {
        Ok(body) => body,
        Err(err) => {
            tracing::warn!(error = %err, "webhook body is not json");
            let entry = TransactionEntry::new(TransactionAction::Webhook, TransactionOutcome::Error)
                .request(Value::String(String::from_utf8_lossy(raw).into_owned()))
                .error(format!("invalid payload: {err}"));
            record_detached(&state.orm, entry).await;
            return WebhookAck::with_message(AckStatus::Error, "invalid payload");
        }
    };

    let gateway_id = match notification_target(&body) {
        NotificationTarget::Payment(id) => id,
        NotificationTarget::Other(kind) => {
            tracing::debug!(kind = %kind, "ignoring non-payment notification");
            record_detached(&state.orm, webhook_entry(TransactionOutcome::Received, &body)).await;
            return WebhookAck::new(AckStatus::Received);
        }
        NotificationTarget::MissingId => {
            record_detached(
                &state.orm,
                webhook_entry(TransactionOutcome::Received, &body).error("notification has no data.id"),
            )
            .await;
            return WebhookAck::with_message(AckStatus::Received, "missing payment id");
        }
    };

    if !is_valid_payment_id(&gateway_id) {
        record_detached(
            &state.orm,
            webhook_entry(TransactionOutcome::Error, &body).error("invalid payment id"),
        )
        .await;
        return WebhookAck::with_message(AckStatus::Error, "invalid payment id");
    }

    let observed = match state.gateway.fetch_payment(&gateway_id).await {
        Ok(GatewayResult::Success(payment)) => payment,
        Ok(failed) => {
            let message = failed
                .error_message()
                .unwrap_or_else(|| "payment lookup refused".to_string());
            tracing::warn!(gateway_payment_id = %gateway_id, message = %message, "webhook re-fetch failed");
            let mut entry = webhook_entry(TransactionOutcome::Error, &body)
                .gateway_payment_id(gateway_id.clone())
                .error(message.clone());
            entry.response_payload = failed.error_body().cloned();
            record_detached(&state.orm, entry).await;
            return WebhookAck::with_message(AckStatus::Error, message);
        }
        Err(err) => {
            tracing::warn!(gateway_payment_id = %gateway_id, error = %err, "webhook re-fetch got no answer");
            record_detached(
                &state.orm,
                webhook_entry(TransactionOutcome::Error, &body)
                    .gateway_payment_id(gateway_id.clone())
                    .error(err.to_string()),
            )
            .await;
            return WebhookAck::with_message(AckStatus::Error, err.to_string());
        }
    };

    match reconcile(state, &body, &observed).await {
        Ok(true) => WebhookAck::new(AckStatus::Ok),
        Ok(false) => {
            tracing::warn!(
                gateway_payment_id = %observed.id,
                external_reference = ?observed.external_reference,
                "webhook payment matches no order"
            );
            record_detached(
                &state.orm,
                webhook_entry(TransactionOutcome::Error, &body)
                    .gateway_payment_id(observed.id.clone())
                    .response(observed.raw.clone())
                    .error("no order matches this payment"),
            )
            .await;
            WebhookAck::with_message(AckStatus::Error, "order not found")
        }
        Err(err) => {
            tracing::error!(gateway_payment_id = %observed.id, error = %err, "webhook reconciliation failed");
            record_detached(
                &state.orm,
                webhook_entry(TransactionOutcome::Error, &body)
                    .gateway_payment_id(observed.id.clone())
                    .response(observed.raw.clone())
                    .error(err.to_string()),
            )
            .await;
            WebhookAck::with_message(AckStatus::Error, "reconciliation failed")
        }
    }
}

/// Apply `observed` to its order and log it, all in one transaction.
/// `Ok(false)` means the payment could not be tied to any order.
async fn reconcile(
    state: &AppState,
    body: &Value,
    observed: &GatewayPayment,
) -> Result<bool, DbErr> {
    let txn = state.orm.begin().await?;

    let Some(order) = locate_order(&txn, observed).await? else {
        txn.rollback().await?;
        return Ok(false);
    };

    let settlement = apply_gateway_payment(&txn, &order, observed, None).await?;
    record_transaction(
        &txn,
        webhook_entry(TransactionOutcome::Processed, body)
            .gateway_payment_id(observed.id.clone())
            .response(observed.raw.clone()),
    )
    .await?;
    txn.commit().await?;

    tracing::info!(
        order_id = %order.id,
        gateway_payment_id = %observed.id,
        status = ?settlement.payment.status,
        created = settlement.created,
        stale = settlement.stale,
        "webhook processed"
    );
    Ok(true)
}

/// Prefer the payment row we already hold for this gateway id; otherwise
/// follow the external reference, which carries the order id.
async fn locate_order<C: ConnectionTrait>(
    conn: &C,
    observed: &GatewayPayment,
) -> Result<Option<OrderModel>, DbErr> {
    let known = Payments::find()
        .filter(PayCol::GatewayPaymentId.eq(observed.id.as_str()))
        .one(conn)
        .await?;
    if let Some(payment) = known {
        return Orders::find_by_id(payment.order_id).one(conn).await;
    }

    let order_id = observed
        .external_reference
        .as_deref()
        .and_then(|reference| Uuid::parse_str(reference).ok());
    match order_id {
        Some(order_id) => Orders::find_by_id(order_id).one(conn).await,
        None => Ok(None),
    }
}
