mod common;

use axum_payments_api::{
    dto::payments::{AckStatus, CardDetails, DirectPaymentRequest},
    entity::enums::{
        OrderStatus, PaymentMethod, PaymentStatus, TransactionAction, TransactionOutcome,
    },
    gateway::mock::{MockBehavior, MockGateway},
    services::{payment_service, webhook_service},
};
use serde_json::json;
use uuid::Uuid;

fn payment_notification(id: &str) -> Vec<u8> {
    json!({
        "type": "payment",
        "action": "payment.updated",
        "data": { "id": id }
    })
    .to_string()
    .into_bytes()
}

#[tokio::test]
async fn non_payment_notification_only_leaves_a_log_entry() -> anyhow::Result<()> {
    let Some(app) = common::setup(MockGateway::approving()).await? else {
        return Ok(());
    };
    let marker = Uuid::new_v4().to_string();
    let body = json!({ "type": "merchant_order", "data": { "id": marker } }).to_string();

    let ack = webhook_service::handle_notification(&app.state, body.as_bytes()).await;
    assert_eq!(ack.status, AckStatus::Received);
    assert_eq!(app.gateway.fetch_calls(), 0);

    let entries = common::log_entries(&app.state, TransactionAction::Webhook, &marker).await?;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].outcome, TransactionOutcome::Received);

    Ok(())
}

#[tokio::test]
async fn malformed_body_is_acknowledged() -> anyhow::Result<()> {
    let Some(app) = common::setup(MockGateway::approving()).await? else {
        return Ok(());
    };

    let ack = webhook_service::handle_notification(&app.state, b"not json").await;
    assert_eq!(ack.status, AckStatus::Error);

    let ack = webhook_service::handle_notification(
        &app.state,
        json!({ "type": "payment", "data": {} }).to_string().as_bytes(),
    )
    .await;
    assert_eq!(ack.status, AckStatus::Received);
    assert_eq!(app.gateway.fetch_calls(), 0);

    Ok(())
}

#[tokio::test]
async fn repeated_notification_is_idempotent() -> anyhow::Result<()> {
    let Some(app) = common::setup(MockGateway::approving()).await? else {
        return Ok(());
    };
    let user = common::create_user(&app.state, None).await?;
    let order = common::create_order(&app.state, &user).await?;
    let remote = app.gateway.insert_payment(
        PaymentStatus::Approved,
        Some(order.id.to_string()),
        order.total,
        "visa",
    );

    let first = webhook_service::handle_notification(&app.state, &payment_notification(&remote.id))
        .await;
    assert_eq!(first.status, AckStatus::Ok);
    let after_first = common::reload_order(&app.state, order.id).await?;
    assert_eq!(after_first.status, OrderStatus::Paid);
    assert!(after_first.paid_at.is_some());

    let second = webhook_service::handle_notification(&app.state, &payment_notification(&remote.id))
        .await;
    assert_eq!(second.status, AckStatus::Ok);
    let after_second = common::reload_order(&app.state, order.id).await?;
    assert_eq!(after_second.status, OrderStatus::Paid);
    assert_eq!(after_second.paid_at, after_first.paid_at);

    let payments = common::payments_for(&app.state, order.id).await?;
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].status, PaymentStatus::Approved);
    assert_eq!(payments[0].amount, order.total);

    let entries = common::log_entries(&app.state, TransactionAction::Webhook, &remote.id).await?;
    assert_eq!(entries.len(), 2);
    assert!(
        entries
            .iter()
            .all(|entry| entry.outcome == TransactionOutcome::Processed)
    );

    Ok(())
}

#[tokio::test]
async fn hosted_checkout_payment_follows_gateway_status() -> anyhow::Result<()> {
    let Some(app) = common::setup(MockGateway::approving()).await? else {
        return Ok(());
    };
    let user = common::create_user(&app.state, None).await?;
    let order = common::create_order(&app.state, &user).await?;
    let remote = app.gateway.insert_payment(
        PaymentStatus::Pending,
        Some(order.id.to_string()),
        order.total,
        "pix",
    );

    let ack = webhook_service::handle_notification(&app.state, &payment_notification(&remote.id))
        .await;
    assert_eq!(ack.status, AckStatus::Ok);
    let payments = common::payments_for(&app.state, order.id).await?;
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].status, PaymentStatus::Pending);
    assert_eq!(payments[0].method, Some(PaymentMethod::Pix));
    assert_eq!(payments[0].external_reference, order.id.to_string());
    assert_eq!(
        common::reload_order(&app.state, order.id).await?.status,
        OrderStatus::Pending
    );

    app.gateway.set_status(&remote.id, PaymentStatus::Approved);
    webhook_service::handle_notification(&app.state, &payment_notification(&remote.id)).await;
    let paid = common::reload_order(&app.state, order.id).await?;
    assert_eq!(paid.status, OrderStatus::Paid);

    // A late "pending" observation must not undo the approval.
    app.gateway.set_status(&remote.id, PaymentStatus::Pending);
    let ack = webhook_service::handle_notification(&app.state, &payment_notification(&remote.id))
        .await;
    assert_eq!(ack.status, AckStatus::Ok);
    let payments = common::payments_for(&app.state, order.id).await?;
    assert_eq!(payments[0].status, PaymentStatus::Approved);
    let still_paid = common::reload_order(&app.state, order.id).await?;
    assert_eq!(still_paid.status, OrderStatus::Paid);
    assert_eq!(still_paid.paid_at, paid.paid_at);

    Ok(())
}

#[tokio::test]
async fn failed_refetch_is_logged_and_acknowledged() -> anyhow::Result<()> {
    let Some(app) = common::setup(MockGateway::approving()).await? else {
        return Ok(());
    };
    let user = common::create_user(&app.state, None).await?;
    let order = common::create_order(&app.state, &user).await?;
    let remote = app.gateway.insert_payment(
        PaymentStatus::Approved,
        Some(order.id.to_string()),
        order.total,
        "visa",
    );
    app.gateway.set_fetch_unavailable(true);

    let ack = webhook_service::handle_notification(&app.state, &payment_notification(&remote.id))
        .await;
    assert_eq!(ack.status, AckStatus::Error);

    let entries = common::log_entries(&app.state, TransactionAction::Webhook, &remote.id).await?;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].outcome, TransactionOutcome::Error);
    assert!(common::payments_for(&app.state, order.id).await?.is_empty());
    assert_eq!(
        common::reload_order(&app.state, order.id).await?.status,
        OrderStatus::Pending
    );

    Ok(())
}

#[tokio::test]
async fn payment_for_unknown_order_is_logged() -> anyhow::Result<()> {
    let Some(app) = common::setup(MockGateway::approving()).await? else {
        return Ok(());
    };
    let remote = app.gateway.insert_payment(
        PaymentStatus::Approved,
        Some(Uuid::new_v4().to_string()),
        rust_decimal::Decimal::new(1000, 2),
        "visa",
    );

    let ack = webhook_service::handle_notification(&app.state, &payment_notification(&remote.id))
        .await;
    assert_eq!(ack.status, AckStatus::Error);

    let entries = common::log_entries(&app.state, TransactionAction::Webhook, &remote.id).await?;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].outcome, TransactionOutcome::Error);

    Ok(())
}

#[tokio::test]
async fn concurrent_card_response_and_webhook_settle_once() -> anyhow::Result<()> {
    let Some(app) = common::setup(MockGateway::approving()).await? else {
        return Ok(());
    };
    let user = common::create_user(&app.state, None).await?;
    let order = common::create_order(&app.state, &user).await?;
    let gateway_id = app.gateway.upcoming_id();
    let notification = payment_notification(&gateway_id);

    let request = DirectPaymentRequest {
        order_id: order.id,
        payment_method: PaymentMethod::CreditCard,
        card: Some(CardDetails {
            token: "tok_test".into(),
            installments: 2,
            payment_method_id: "master".into(),
            issuer_id: None,
        }),
    };
    let (paid, _ack) = tokio::join!(
        payment_service::create_direct_payment(&app.state, &user, request),
        webhook_service::handle_notification(&app.state, &notification),
    );
    let paid = paid?.data.expect("payment data");
    assert_eq!(paid.payment_id, gateway_id);

    let order_after = common::reload_order(&app.state, order.id).await?;
    assert_eq!(order_after.status, OrderStatus::Paid);
    assert!(order_after.paid_at.is_some());
    assert_eq!(common::payments_for(&app.state, order.id).await?.len(), 1);

    // A redelivery after both settled must not restamp the order.
    let ack = webhook_service::handle_notification(&app.state, &notification).await;
    assert_eq!(ack.status, AckStatus::Ok);
    let order_final = common::reload_order(&app.state, order.id).await?;
    assert_eq!(order_final.paid_at, order_after.paid_at);

    Ok(())
}

#[tokio::test]
async fn concurrent_duplicate_webhooks_create_one_payment() -> anyhow::Result<()> {
    let Some(app) = common::setup(MockGateway::approving()).await? else {
        return Ok(());
    };
    let user = common::create_user(&app.state, None).await?;
    let order = common::create_order(&app.state, &user).await?;
    let remote = app.gateway.insert_payment(
        PaymentStatus::Approved,
        Some(order.id.to_string()),
        order.total,
        "pix",
    );
    let notification = payment_notification(&remote.id);

    let (first, second) = tokio::join!(
        webhook_service::handle_notification(&app.state, &notification),
        webhook_service::handle_notification(&app.state, &notification),
    );
    assert_eq!(first.status, AckStatus::Ok);
    assert_eq!(second.status, AckStatus::Ok);

    assert_eq!(common::payments_for(&app.state, order.id).await?.len(), 1);
    let order = common::reload_order(&app.state, order.id).await?;
    assert_eq!(order.status, OrderStatus::Paid);

    Ok(())
}

fn card_request(order_id: Uuid) -> DirectPaymentRequest {
    DirectPaymentRequest {
        order_id,
        payment_method: PaymentMethod::CreditCard,
        card: Some(CardDetails {
            token: "tok_test".into(),
            installments: 1,
            payment_method_id: "visa".into(),
            issuer_id: None,
        }),
    }
}

#[tokio::test]
async fn late_failure_of_an_abandoned_attempt_keeps_the_current_one() -> anyhow::Result<()> {
    let Some(app) = common::setup(MockGateway::new(MockBehavior::Respond(
        PaymentStatus::Pending,
        "pending_contingency".into(),
    )))
    .await?
    else {
        return Ok(());
    };
    let user = common::create_user(&app.state, None).await?;
    let order = common::create_order(&app.state, &user).await?;

    let card = payment_service::create_direct_payment(&app.state, &user, card_request(order.id))
        .await?
        .data
        .expect("card attempt");
    let pix = payment_service::create_direct_payment(
        &app.state,
        &user,
        DirectPaymentRequest {
            order_id: order.id,
            payment_method: PaymentMethod::Pix,
            card: None,
        },
    )
    .await?
    .data
    .expect("pix attempt");
    assert_ne!(card.payment_id, pix.payment_id);

    app.gateway.set_status(&card.payment_id, PaymentStatus::Rejected);
    let ack = webhook_service::handle_notification(&app.state, &payment_notification(&card.payment_id))
        .await;
    assert_eq!(ack.status, AckStatus::Ok);

    let payments = common::payments_for(&app.state, order.id).await?;
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].gateway_payment_id.as_deref(), Some(pix.payment_id.as_str()));
    assert_eq!(payments[0].status, PaymentStatus::Pending);
    assert_eq!(payments[0].method, Some(PaymentMethod::Pix));
    assert!(payments[0].pix_qr_code.is_some());

    // The live attempt still settles the order.
    app.gateway.set_status(&pix.payment_id, PaymentStatus::Approved);
    webhook_service::handle_notification(&app.state, &payment_notification(&pix.payment_id)).await;
    assert_eq!(
        common::reload_order(&app.state, order.id).await?.status,
        OrderStatus::Paid
    );

    Ok(())
}

#[tokio::test]
async fn new_attempt_clears_method_fields_of_the_old_one() -> anyhow::Result<()> {
    let Some(app) = common::setup(MockGateway::new(MockBehavior::Respond(
        PaymentStatus::Pending,
        "pending_waiting_transfer".into(),
    )))
    .await?
    else {
        return Ok(());
    };
    let user = common::create_user(&app.state, None).await?;
    let order = common::create_order(&app.state, &user).await?;

    payment_service::create_direct_payment(
        &app.state,
        &user,
        DirectPaymentRequest {
            order_id: order.id,
            payment_method: PaymentMethod::Pix,
            card: None,
        },
    )
    .await?;
    assert!(common::payments_for(&app.state, order.id).await?[0].pix_qr_code.is_some());

    app.gateway.set_behavior(MockBehavior::Respond(
        PaymentStatus::Approved,
        "accredited".into(),
    ));
    let card = payment_service::create_direct_payment(&app.state, &user, card_request(order.id))
        .await?
        .data
        .expect("card attempt");
    assert!(card.pix_qr_code.is_none());

    let payments = common::payments_for(&app.state, order.id).await?;
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].gateway_payment_id.as_deref(), Some(card.payment_id.as_str()));
    assert_eq!(payments[0].method, Some(PaymentMethod::CreditCard));
    assert_eq!(payments[0].status, PaymentStatus::Approved);
    assert!(payments[0].pix_qr_code.is_none());
    assert!(payments[0].pix_qr_code_base64.is_none());

    Ok(())
}
