use axum_payments_api::{
    config::PaymentSettings,
    dto::payments::CardDetails,
    entity::{
        enums::{OrderStatus, PaymentMethod, PaymentStatus, PersonType},
        orders::Model as OrderModel,
        users::Model as UserModel,
    },
    error::AppError,
    gateway::{
        GatewayResult, is_valid_payment_id,
        mock::MockGateway,
        mercadopago::{classify, map_status, parse_payment, payment_body, preference_body},
    },
    services::{
        payment_service::{
            build_payment_request, build_preference_request, identification_for,
            normalize_tax_id, split_name,
        },
        webhook_service::{NotificationTarget, notification_target},
    },
};
use chrono::Utc;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;

fn order(total_cents: i64) -> OrderModel {
    let now = Utc::now().into();
    OrderModel {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        status: OrderStatus::Pending,
        person_type: PersonType::Individual,
        subtotal: Decimal::new(total_cents, 2),
        total: Decimal::new(total_cents, 2),
        notes: None,
        paid_at: None,
        completed_at: None,
        created_at: now,
        updated_at: now,
    }
}

fn buyer(tax_id: Option<&str>) -> UserModel {
    UserModel {
        id: Uuid::new_v4(),
        name: "Ana Maria Costa".into(),
        email: "ana@example.com".into(),
        tax_id: tax_id.map(ToString::to_string),
        person_type: PersonType::Individual,
        role: "user".into(),
        created_at: Utc::now().into(),
    }
}

fn card(installments: u32) -> CardDetails {
    CardDetails {
        token: "card-token-123".into(),
        installments,
        payment_method_id: "visa".into(),
        issuer_id: Some("25".into()),
    }
}

#[test]
fn gateway_statuses_map_onto_closed_enum() {
    assert_eq!(map_status("approved"), PaymentStatus::Approved);
    assert_eq!(map_status("in_process"), PaymentStatus::Pending);
    assert_eq!(map_status("authorized"), PaymentStatus::Pending);
    assert_eq!(map_status("in_mediation"), PaymentStatus::Pending);
    assert_eq!(map_status("charged_back"), PaymentStatus::Refunded);
    assert_eq!(map_status("cancelled"), PaymentStatus::Cancelled);
    assert_eq!(map_status("something_new"), PaymentStatus::Pending);
}

#[test]
fn parses_pix_payment_with_numeric_id() {
    let body = json!({
        "id": 123456789,
        "status": "pending",
        "status_detail": "pending_waiting_transfer",
        "external_reference": "ref-1",
        "transaction_amount": 229.7,
        "payment_method_id": "pix",
        "payment_type_id": "bank_transfer",
        "point_of_interaction": {
            "transaction_data": { "qr_code": "000201pix", "qr_code_base64": "aW1n" }
        }
    });

    let payment = parse_payment(body).expect("valid payment");
    assert_eq!(payment.id, "123456789");
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert_eq!(payment.transaction_amount, Some(Decimal::new(22970, 2)));
    assert_eq!(payment.pix_qr_code.as_deref(), Some("000201pix"));
    assert_eq!(payment.pix_qr_code_base64.as_deref(), Some("aW1n"));
    assert_eq!(payment.method(), Some(PaymentMethod::Pix));
}

#[test]
fn parses_boleto_links() {
    let body = json!({
        "id": "987",
        "status": "pending",
        "payment_method_id": "bolbradesco",
        "payment_type_id": "ticket",
        "transaction_details": { "external_resource_url": "https://boleto.example/987" },
        "barcode": { "content": "23791234" }
    });

    let payment = parse_payment(body).expect("valid payment");
    assert_eq!(payment.boleto_url.as_deref(), Some("https://boleto.example/987"));
    assert_eq!(payment.boleto_barcode.as_deref(), Some("23791234"));
    assert_eq!(payment.method(), Some(PaymentMethod::Boleto));
    assert_eq!(payment.external_reference, None);
}

#[test]
fn payment_without_id_is_a_decode_error() {
    assert!(parse_payment(json!({ "status": "approved" })).is_err());
}

#[test]
fn classify_splits_client_and_server_errors() {
    let declined = classify(
        StatusCode::BAD_REQUEST,
        json!({ "message": "Invalid card" }),
        parse_payment,
    )
    .expect("http answer");
    assert!(matches!(declined, GatewayResult::ClientError { status: 400, .. }));
    assert_eq!(declined.error_message().as_deref(), Some("Invalid card"));

    let throttled = classify(StatusCode::TOO_MANY_REQUESTS, json!({}), parse_payment)
        .expect("http answer");
    assert!(matches!(throttled, GatewayResult::ServerError { status: 429, .. }));

    let down = classify(StatusCode::BAD_GATEWAY, json!(null), parse_payment).expect("http answer");
    assert!(matches!(down, GatewayResult::ServerError { status: 502, .. }));
}

#[test]
fn names_split_into_first_and_last_token() {
    assert_eq!(
        split_name("Ana Maria Costa"),
        ("Ana".to_string(), Some("Costa".to_string()))
    );
    assert_eq!(split_name("Cher"), ("Cher".to_string(), None));
    assert_eq!(split_name("   "), ("Customer".to_string(), None));
}

#[test]
fn tax_ids_are_normalized_and_typed() {
    assert_eq!(normalize_tax_id("123.456.789-09"), "12345678909");

    let cpf = identification_for("123.456.789-09").expect("cpf");
    assert_eq!(cpf.kind, "CPF");
    let cnpj = identification_for("12.345.678/0001-95").expect("cnpj");
    assert_eq!(cnpj.kind, "CNPJ");
    assert_eq!(cnpj.number, "12345678000195");
    assert!(identification_for("1234").is_none());
}

#[test]
fn card_request_uses_order_total_and_serializes_float_amount() {
    let settings = PaymentSettings::default();
    let order = order(22970);
    let request = build_payment_request(
        &settings,
        &order,
        &buyer(Some("123.456.789-09")),
        PaymentMethod::CreditCard,
        Some(&card(3)),
    )
    .expect("valid request");

    assert_eq!(request.amount, order.total);
    assert_eq!(request.external_reference, order.id.to_string());
    assert_eq!(request.installments, Some(3));

    let body = serde_json::to_value(payment_body(&request)).expect("serializable");
    let amount = body["transaction_amount"].as_f64().expect("amount is a json number");
    assert!((amount - 229.7).abs() < 1e-9);
    assert_eq!(body["token"], json!("card-token-123"));
    assert_eq!(body["payer"]["identification"]["type"], json!("CPF"));
    assert_eq!(body["payer"]["first_name"], json!("Ana"));
}

#[test]
fn card_request_rejects_out_of_range_installments() {
    let settings = PaymentSettings::default();
    for installments in [0, settings.max_installments + 1] {
        let result = build_payment_request(
            &settings,
            &order(1000),
            &buyer(None),
            PaymentMethod::CreditCard,
            Some(&card(installments)),
        );
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }
}

#[test]
fn card_request_requires_card_details() {
    let result = build_payment_request(
        &PaymentSettings::default(),
        &order(1000),
        &buyer(None),
        PaymentMethod::CreditCard,
        None,
    );
    assert!(matches!(result, Err(AppError::BadRequest(_))));
}

#[test]
fn boleto_requires_a_tax_id() {
    let settings = PaymentSettings::default();
    let missing = build_payment_request(
        &settings,
        &order(1000),
        &buyer(None),
        PaymentMethod::Boleto,
        None,
    );
    assert!(matches!(missing, Err(AppError::BadRequest(_))));

    let request = build_payment_request(
        &settings,
        &order(1000),
        &buyer(Some("123.456.789-09")),
        PaymentMethod::Boleto,
        None,
    )
    .expect("valid boleto request");
    assert_eq!(request.payment_method_id, "bolbradesco");
}

#[test]
fn preference_carries_back_urls_and_notification_url() {
    let settings = PaymentSettings {
        frontend_url: "https://shop.example.com/".into(),
        notification_url: Some("https://api.example.com/payment/webhook".into()),
        ..PaymentSettings::default()
    };
    let order = order(1000);
    let request = build_preference_request(
        &settings,
        &order,
        &[],
        &buyer(None),
        Some(PaymentMethod::Pix),
    );

    let body = serde_json::to_value(preference_body(&request)).expect("serializable");
    assert_eq!(
        body["back_urls"]["success"],
        json!("https://shop.example.com/payment/success")
    );
    assert_eq!(body["auto_return"], json!("approved"));
    assert_eq!(body["external_reference"], json!(order.id.to_string()));
    assert_eq!(
        body["notification_url"],
        json!("https://api.example.com/payment/webhook")
    );
    assert_eq!(body["payment_methods"]["default_payment_method_id"], json!("pix"));
}

#[test]
fn notifications_only_point_at_payments() {
    assert_eq!(
        notification_target(&json!({ "type": "payment", "data": { "id": "42" } })),
        NotificationTarget::Payment("42".into())
    );
    assert_eq!(
        notification_target(&json!({ "type": "payment", "data": { "id": 42 } })),
        NotificationTarget::Payment("42".into())
    );
    assert_eq!(
        notification_target(&json!({ "type": "payment", "data": {} })),
        NotificationTarget::MissingId
    );
    assert_eq!(
        notification_target(&json!({ "type": "merchant_order", "data": { "id": "1" } })),
        NotificationTarget::Other("merchant_order".into())
    );
}

#[test]
fn payment_ids_must_be_plain_tokens() {
    assert!(is_valid_payment_id("1234567890"));
    assert!(!is_valid_payment_id(""));
    assert!(!is_valid_payment_id("../v1/users"));
    assert!(!is_valid_payment_id(&"9".repeat(65)));
}

#[test]
fn mock_payments_read_back_like_provider_bodies() {
    let gateway = MockGateway::approving();
    let remote = gateway.insert_payment(
        PaymentStatus::Pending,
        Some("order-1".into()),
        Decimal::new(22970, 2),
        "pix",
    );
    assert!(remote.raw["transaction_amount"].is_number());

    let parsed = parse_payment(remote.raw.clone()).expect("mock body parses");
    assert_eq!(parsed.id, remote.id);
    assert_eq!(parsed.status, PaymentStatus::Pending);
    assert_eq!(parsed.transaction_amount, Some(Decimal::new(22970, 2)));
    assert_eq!(parsed.external_reference.as_deref(), Some("order-1"));
}
