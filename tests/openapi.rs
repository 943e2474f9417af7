use axum_payments_api::routes::doc::ApiDoc;
use utoipa::OpenApi;

#[test]
fn webhook_documents_a_json_body_and_a_bare_ack() -> anyhow::Result<()> {
    let doc = serde_json::to_value(ApiDoc::openapi())?;
    let webhook = &doc["paths"]["/payment/webhook"]["post"];

    assert!(webhook["requestBody"]["content"]["application/json"].is_object());
    assert!(webhook["responses"]["200"].is_object());
    assert!(doc["components"]["schemas"]["WebhookAck"].is_object());

    Ok(())
}

#[test]
fn every_payment_route_is_documented() -> anyhow::Result<()> {
    let doc = serde_json::to_value(ApiDoc::openapi())?;
    for path in [
        "/payment/public-key",
        "/payment/preference",
        "/payment/process",
        "/payment/methods",
        "/payment/installments",
        "/payment/status/{order_id}",
        "/payment/webhook",
        "/payment/{id}",
    ] {
        assert!(doc["paths"][path].is_object(), "{path} missing from the document");
    }

    Ok(())
}
