use sea_orm::entity::prelude::*;
use serde_json::Value;

use super::enums::{TransactionAction, TransactionOutcome};

/// Append-only record of one gateway interaction.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: Uuid,
    pub action: TransactionAction,
    pub gateway_payment_id: Option<String>,
    pub request_payload: Option<Value>,
    pub response_payload: Option<Value>,
    pub outcome: TransactionOutcome,
    pub error_message: Option<String>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
