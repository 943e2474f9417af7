//! The single place where a gateway payment observation is written back to
//! our payment and order rows. Both the synchronous payment flow and the
//! webhook reconciler go through [`apply_gateway_payment`], so the
//! "approved settles the order" rule exists exactly once.

use chrono::Utc;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::{Expr, LockType, OnConflict};
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter,
    QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    entity::{
        enums::{OrderStatus, PaymentMethod, PaymentStatus},
        orders::{Column as OrderCol, Entity as Orders, Model as OrderModel},
        payments::{ActiveModel as PaymentActive, Column as PayCol, Entity as Payments, Model as PaymentModel},
    },
    gateway::GatewayPayment,
};

#[derive(Debug, Clone)]
pub struct Settlement {
    pub payment: PaymentModel,
    /// The payment row was inserted by this call.
    pub created: bool,
    /// This call moved the order to `paid`.
    pub order_settled: bool,
    /// The observation was older than what we already store and was not applied.
    pub stale: bool,
}

/// Move an order to `paid` with a compare-and-set update. Returns `false`
/// when the order was already paid or can no longer become paid; the
/// first caller to commit stamps `paid_at` and every later one is a no-op.
pub async fn settle_order<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
    at: DateTimeWithTimeZone,
) -> Result<bool, DbErr> {
    let sources: Vec<String> = OrderStatus::Paid
        .predecessors()
        .iter()
        .map(|status| status.to_value())
        .collect();

    let result = Orders::update_many()
        .col_expr(OrderCol::Status, Expr::value(OrderStatus::Paid.to_value()))
        .col_expr(OrderCol::PaidAt, Expr::value(at))
        .col_expr(OrderCol::UpdatedAt, Expr::value(at))
        .filter(OrderCol::Id.eq(order_id))
        .filter(OrderCol::Status.is_in(sources))
        .filter(OrderCol::PaidAt.is_null())
        .exec(conn)
        .await?;

    Ok(result.rows_affected == 1)
}

/// Record `observed` against `order`: insert the order's payment row if it
/// does not exist yet, otherwise update it in place under a row lock, then
/// settle the order if the gateway reports approval. `amount` is always the
/// order total and is never rewritten.
pub async fn apply_gateway_payment<C: ConnectionTrait>(
    conn: &C,
    order: &OrderModel,
    observed: &GatewayPayment,
    method_hint: Option<PaymentMethod>,
) -> Result<Settlement, DbErr> {
    let now: DateTimeWithTimeZone = Utc::now().into();
    let method = observed.method().or(method_hint);
    let approved = observed.status.settles_order();

    if let Some(amount) = observed
        .transaction_amount
        .filter(|amount| *amount != order.total)
    {
        tracing::warn!(
            order_id = %order.id,
            gateway_payment_id = %observed.id,
            gateway_amount = %amount,
            order_total = %order.total,
            "gateway amount differs from order total"
        );
    }

    let inserted = Payments::insert(PaymentActive {
        id: Set(Uuid::new_v4()),
        order_id: Set(order.id),
        gateway_payment_id: Set(Some(observed.id.clone())),
        gateway_preference_id: Set(observed.preference_id.clone()),
        external_reference: Set(order.id.to_string()),
        method: Set(method),
        status: Set(observed.status),
        status_detail: Set(observed.status_detail.clone()),
        amount: Set(order.total),
        pix_qr_code: Set(observed.pix_qr_code.clone()),
        pix_qr_code_base64: Set(observed.pix_qr_code_base64.clone()),
        boleto_url: Set(observed.boleto_url.clone()),
        boleto_barcode: Set(observed.boleto_barcode.clone()),
        paid_at: Set(approved.then_some(now)),
        created_at: Set(now),
        updated_at: Set(now),
    })
    .on_conflict(OnConflict::column(PayCol::OrderId).do_nothing().to_owned())
    .exec_without_returning(conn)
    .await?;
    let created = inserted == 1;

    let current = Payments::find()
        .filter(PayCol::OrderId.eq(order.id))
        .lock(LockType::Update)
        .one(conn)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound(format!("payment for order {}", order.id)))?;

    let mut stale = false;
    let payment = if created {
        current
    } else {
        let same_attempt = current.gateway_payment_id.as_deref() == Some(observed.id.as_str());
        let accept = if same_attempt {
            current.status.accepts(observed.status)
        } else {
            current.status.yields_to_attempt(observed.status)
        };

        let paid_at_missing = current.paid_at.is_none();
        let previous = current.status;
        let mut active: PaymentActive = current.into();
        if accept {
            active.gateway_payment_id = Set(Some(observed.id.clone()));
            active.status = Set(observed.status);
            active.status_detail = Set(observed.status_detail.clone());
            if observed.preference_id.is_some() {
                active.gateway_preference_id = Set(observed.preference_id.clone());
            }
            if same_attempt {
                if method.is_some() {
                    active.method = Set(method);
                }
                if observed.pix_qr_code.is_some() {
                    active.pix_qr_code = Set(observed.pix_qr_code.clone());
                    active.pix_qr_code_base64 = Set(observed.pix_qr_code_base64.clone());
                }
                if observed.boleto_url.is_some() {
                    active.boleto_url = Set(observed.boleto_url.clone());
                    active.boleto_barcode = Set(observed.boleto_barcode.clone());
                }
            } else {
                // A new attempt owns the row outright; nothing of the old one survives.
                active.method = Set(method);
                active.pix_qr_code = Set(observed.pix_qr_code.clone());
                active.pix_qr_code_base64 = Set(observed.pix_qr_code_base64.clone());
                active.boleto_url = Set(observed.boleto_url.clone());
                active.boleto_barcode = Set(observed.boleto_barcode.clone());
            }
            if approved && paid_at_missing {
                active.paid_at = Set(Some(now));
            }
        } else {
            stale = true;
            tracing::warn!(
                order_id = %order.id,
                gateway_payment_id = %observed.id,
                stored = ?previous,
                observed = ?observed.status,
                "ignoring gateway status that would move the payment backwards"
            );
        }
        active.updated_at = Set(now);
        active.update(conn).await?
    };

    let order_settled = if approved && !stale {
        let settled = settle_order(conn, order.id, now).await?;
        if settled {
            tracing::info!(order_id = %order.id, gateway_payment_id = %observed.id, "order paid");
        } else if order.status == OrderStatus::Cancelled {
            tracing::warn!(order_id = %order.id, "approved payment for a cancelled order");
        }
        settled
    } else {
        false
    };

    Ok(Settlement {
        payment,
        created,
        order_settled,
        stale,
    })
}
