use sea_orm::entity::prelude::*;

use super::enums::{PaymentMethod, PaymentStatus};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub order_id: Uuid,
    pub gateway_payment_id: Option<String>,
    pub gateway_preference_id: Option<String>,
    /// Order id as a string, echoed back by the gateway.
    pub external_reference: String,
    pub method: Option<PaymentMethod>,
    pub status: PaymentStatus,
    pub status_detail: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub amount: Decimal,
    pub pix_qr_code: Option<String>,
    pub pix_qr_code_base64: Option<String>,
    pub boleto_url: Option<String>,
    pub boleto_barcode: Option<String>,
    pub paid_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::orders::Entity",
        from = "Column::OrderId",
        to = "super::orders::Column::Id"
    )]
    Orders,
}

impl Related<super::orders::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
