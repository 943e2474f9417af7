#![allow(dead_code)]

use std::sync::Arc;

use axum_payments_api::{
    config::PaymentSettings,
    db::{create_orm_conn, run_migrations},
    dto::orders::{CreateOrderRequest, OrderItemInput},
    entity::{
        enums::{PersonType, TransactionAction},
        orders::{Entity as Orders, Model as OrderModel},
        payments::{Column as PayCol, Entity as Payments, Model as PaymentModel},
        products::ActiveModel as ProductActive,
        transactions::{Column as TxCol, Entity as Transactions, Model as TransactionModel},
        users::ActiveModel as UserActive,
    },
    gateway::mock::MockGateway,
    middleware::auth::AuthUser,
    services::order_service,
    state::AppState,
};
use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use uuid::Uuid;

pub struct TestApp {
    pub state: AppState,
    pub gateway: Arc<MockGateway>,
}

/// Connect to the test database, or `None` when none is configured.
pub async fn setup(gateway: MockGateway) -> anyhow::Result<Option<TestApp>> {
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(None);
        }
    };

    let orm = create_orm_conn(&database_url).await?;
    run_migrations(&orm).await?;

    let gateway = Arc::new(gateway);
    let state = AppState {
        orm,
        gateway: gateway.clone(),
        settings: Arc::new(PaymentSettings {
            public_key: "TEST-public-key".into(),
            notification_url: Some("https://shop.example.com/api/payment/webhook".into()),
            internal_api_key: Some("internal-secret".into()),
            ..PaymentSettings::default()
        }),
    };
    Ok(Some(TestApp { state, gateway }))
}

pub async fn create_user(state: &AppState, tax_id: Option<&str>) -> anyhow::Result<AuthUser> {
    let id = Uuid::new_v4();
    UserActive {
        id: Set(id),
        name: Set("Joana Pereira Santos".into()),
        email: Set(format!("{id}@example.com")),
        tax_id: Set(tax_id.map(ToString::to_string)),
        person_type: Set(PersonType::Individual),
        role: Set("user".into()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(AuthUser {
        user_id: id,
        role: "user".into(),
    })
}

pub async fn create_product(
    state: &AppState,
    individual_cents: i64,
    business_cents: i64,
) -> anyhow::Result<Uuid> {
    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        name: Set(format!("Test product {}", Uuid::new_v4())),
        description: Set(None),
        price_individual: Set(Decimal::new(individual_cents, 2)),
        price_business: Set(Decimal::new(business_cents, 2)),
        is_active: Set(true),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(product.id)
}

/// A pending order with two lines: 2 x 49.90 and 1 x 129.90.
pub async fn create_order(state: &AppState, user: &AuthUser) -> anyhow::Result<OrderModel> {
    let first = create_product(state, 4990, 4490).await?;
    let second = create_product(state, 12990, 11690).await?;
    let resp = order_service::create_order(
        state,
        user,
        CreateOrderRequest {
            items: vec![
                OrderItemInput {
                    product_id: first,
                    quantity: 2,
                },
                OrderItemInput {
                    product_id: second,
                    quantity: 1,
                },
            ],
            person_type: None,
            notes: None,
        },
    )
    .await?;
    let order_id = resp.data.expect("order data").order.id;
    reload_order(state, order_id).await
}

pub async fn reload_order(state: &AppState, id: Uuid) -> anyhow::Result<OrderModel> {
    Ok(Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .expect("order exists"))
}

pub async fn payments_for(state: &AppState, order_id: Uuid) -> anyhow::Result<Vec<PaymentModel>> {
    Ok(Payments::find()
        .filter(PayCol::OrderId.eq(order_id))
        .all(&state.orm)
        .await?)
}

/// Log entries whose request or response payload mentions `needle`.
pub async fn log_entries(
    state: &AppState,
    action: TransactionAction,
    needle: &str,
) -> anyhow::Result<Vec<TransactionModel>> {
    let entries = Transactions::find()
        .filter(TxCol::Action.eq(action))
        .order_by_asc(TxCol::CreatedAt)
        .all(&state.orm)
        .await?;
    Ok(entries
        .into_iter()
        .filter(|entry| {
            let mentions = |payload: &Option<serde_json::Value>| {
                payload
                    .as_ref()
                    .is_some_and(|value| value.to_string().contains(needle))
            };
            mentions(&entry.request_payload)
                || mentions(&entry.response_payload)
                || entry.gateway_payment_id.as_deref() == Some(needle)
        })
        .collect())
}
