use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    dto::orders::{CreateOrderRequest, OrderList, OrderWithItems},
    entity::{
        enums::{OrderStatus, PersonType},
        order_items::{ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders},
        products::{Column as ProdCol, Entity as Products, Model as ProductModel},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderItem},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    state::AppState,
};

/// A line priced at order time. The unit price is captured here and never
/// read from the product again.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedLine {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

impl PricedLine {
    pub fn new(product: &ProductModel, quantity: i32, person_type: PersonType) -> Self {
        let unit_price = unit_price_for(product, person_type);
        Self {
            product_id: product.id,
            product_name: product.name.clone(),
            quantity,
            unit_price,
            total_price: line_total(unit_price, quantity),
        }
    }
}

pub fn unit_price_for(product: &ProductModel, person_type: PersonType) -> Decimal {
    match person_type {
        PersonType::Individual => product.price_individual,
        PersonType::Business => product.price_business,
    }
}

pub fn line_total(unit_price: Decimal, quantity: i32) -> Decimal {
    unit_price * Decimal::from(quantity)
}

pub fn order_subtotal(lines: &[PricedLine]) -> Decimal {
    lines.iter().map(|line| line.total_price).sum()
}

pub async fn create_order(
    state: &AppState,
    user: &AuthUser,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    if payload.items.is_empty() {
        return Err(AppError::BadRequest("Order has no items".into()));
    }
    if payload.items.iter().any(|item| item.quantity <= 0) {
        return Err(AppError::BadRequest("Quantity must be positive".into()));
    }

    let txn = state.orm.begin().await?;

    let buyer = Users::find_by_id(user.user_id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;
    let person_type = payload.person_type.unwrap_or(buyer.person_type);

    let product_ids: HashSet<Uuid> = payload.items.iter().map(|item| item.product_id).collect();
    let products: HashMap<Uuid, ProductModel> = Products::find()
        .filter(
            Condition::all()
                .add(ProdCol::Id.is_in(product_ids))
                .add(ProdCol::IsActive.eq(true)),
        )
        .all(&txn)
        .await?
        .into_iter()
        .map(|product| (product.id, product))
        .collect();

    let mut lines = Vec::with_capacity(payload.items.len());
    for item in &payload.items {
        let product = products.get(&item.product_id).ok_or(AppError::NotFound)?;
        lines.push(PricedLine::new(product, item.quantity, person_type));
    }
    let subtotal = order_subtotal(&lines);

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        status: Set(OrderStatus::Pending),
        person_type: Set(person_type),
        subtotal: Set(subtotal),
        total: Set(subtotal),
        notes: Set(payload.notes),
        paid_at: Set(None),
        completed_at: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut items: Vec<OrderItem> = Vec::with_capacity(lines.len());
    for line in lines {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(line.product_id),
            product_name: Set(line.product_name),
            quantity: Set(line.quantity),
            unit_price: Set(line.unit_price),
            total_price: Set(line.total_price),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
        items.push(item.into());
    }

    txn.commit().await?;

    tracing::info!(order_id = %order.id, total = %order.total, "order created");

    Ok(ApiResponse::ok(
        "Order created",
        OrderWithItems {
            order: order.into(),
            items,
        },
    ))
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all().add(OrderCol::UserId.eq(user.user_id));
    if let Some(status) = query.status {
        condition = condition.add(OrderCol::Status.eq(status));
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);

    let mut finder = Orders::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Order::from)
        .collect();

    Ok(ApiResponse::paged(
        "Orders",
        OrderList { items: orders },
        Meta::paged(page, limit, total),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(id)),
        )
        .one(&state.orm)
        .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .order_by_asc(OrderItemCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(OrderItem::from)
        .collect();

    Ok(ApiResponse::ok(
        "OK",
        OrderWithItems {
            order: order.into(),
            items,
        },
    ))
}
