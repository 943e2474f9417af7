use chrono::Utc;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveEnum, ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use crate::{
    dto::orders::UpdateOrderStatusRequest,
    entity::{
        enums::OrderStatus,
        orders::{Column as OrderCol, Entity as Orders},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Order,
    response::ApiResponse,
    state::AppState,
};

/// Move an order one step along the transition table. `paid` is only ever
/// reached through a gateway confirmation, never by hand.
pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;
    let next = payload.status;
    if next == OrderStatus::Paid {
        return Err(AppError::BadRequest(
            "Orders become paid only through a confirmed payment".into(),
        ));
    }

    let existing = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    if !existing.status.can_transition_to(next) {
        return Err(AppError::BadRequest(format!(
            "Cannot move order from {:?} to {:?}",
            existing.status, next
        )));
    }

    let now: DateTimeWithTimeZone = Utc::now().into();
    let mut update = Orders::update_many()
        .col_expr(OrderCol::Status, Expr::value(next.to_value()))
        .col_expr(OrderCol::UpdatedAt, Expr::value(now));
    if next == OrderStatus::Completed {
        update = update.col_expr(OrderCol::CompletedAt, Expr::value(now));
    }
    let result = update
        .filter(OrderCol::Id.eq(id))
        .filter(OrderCol::Status.eq(existing.status.to_value()))
        .exec(&state.orm)
        .await?;

    // Someone else moved the order between our read and the update.
    if result.rows_affected == 0 {
        return Err(AppError::BadRequest(
            "Order status changed concurrently, retry".into(),
        ));
    }

    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    tracing::info!(
        order_id = %order.id,
        from = ?existing.status,
        to = ?order.status,
        admin_id = %user.user_id,
        "order status updated"
    );

    Ok(ApiResponse::ok(
        "Order updated",
        Order::from(order),
    ))
}
