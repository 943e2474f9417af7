use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::{
    enums::{OrderStatus, PaymentMethod, PaymentStatus, PersonType},
    order_items::Model as OrderItemModel,
    orders::Model as OrderModel,
    payments::Model as PaymentModel,
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: OrderStatus,
    pub person_type: PersonType,
    pub subtotal: Decimal,
    pub total: Decimal,
    pub notes: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Payment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub gateway_payment_id: Option<String>,
    pub gateway_preference_id: Option<String>,
    pub external_reference: String,
    pub method: Option<PaymentMethod>,
    pub status: PaymentStatus,
    pub status_detail: Option<String>,
    pub amount: Decimal,
    pub pix_qr_code: Option<String>,
    pub pix_qr_code_base64: Option<String>,
    pub boleto_url: Option<String>,
    pub boleto_barcode: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<OrderModel> for Order {
    fn from(model: OrderModel) -> Self {
        Order {
            id: model.id,
            user_id: model.user_id,
            status: model.status,
            person_type: model.person_type,
            subtotal: model.subtotal,
            total: model.total,
            notes: model.notes,
            paid_at: model.paid_at.map(|dt| dt.with_timezone(&Utc)),
            completed_at: model.completed_at.map(|dt| dt.with_timezone(&Utc)),
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

impl From<OrderItemModel> for OrderItem {
    fn from(model: OrderItemModel) -> Self {
        OrderItem {
            id: model.id,
            order_id: model.order_id,
            product_id: model.product_id,
            product_name: model.product_name,
            quantity: model.quantity,
            unit_price: model.unit_price,
            total_price: model.total_price,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

impl From<PaymentModel> for Payment {
    fn from(model: PaymentModel) -> Self {
        Payment {
            id: model.id,
            order_id: model.order_id,
            gateway_payment_id: model.gateway_payment_id,
            gateway_preference_id: model.gateway_preference_id,
            external_reference: model.external_reference,
            method: model.method,
            status: model.status,
            status_detail: model.status_detail,
            amount: model.amount,
            pix_qr_code: model.pix_qr_code,
            pix_qr_code_base64: model.pix_qr_code_base64,
            boleto_url: model.boleto_url,
            boleto_barcode: model.boleto_barcode,
            paid_at: model.paid_at.map(|dt| dt.with_timezone(&Utc)),
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}
