use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "paid")]
    Paid,
    #[sea_orm(string_value = "processing")]
    Processing,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

/// Every legal order status move. Anything not listed here is rejected.
pub const ORDER_TRANSITIONS: &[(OrderStatus, OrderStatus)] = &[
    (OrderStatus::Pending, OrderStatus::Paid),
    (OrderStatus::Pending, OrderStatus::Cancelled),
    (OrderStatus::Paid, OrderStatus::Processing),
    (OrderStatus::Paid, OrderStatus::Cancelled),
    (OrderStatus::Processing, OrderStatus::Completed),
    (OrderStatus::Processing, OrderStatus::Cancelled),
];

impl OrderStatus {
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        ORDER_TRANSITIONS.contains(&(self, next))
    }

    /// Statuses from which `self` may be reached in one step.
    pub fn predecessors(self) -> Vec<OrderStatus> {
        ORDER_TRANSITIONS
            .iter()
            .filter(|(_, to)| *to == self)
            .map(|(from, _)| *from)
            .collect()
    }

    pub fn is_terminal(self) -> bool {
        !ORDER_TRANSITIONS.iter().any(|(from, _)| *from == self)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
    #[sea_orm(string_value = "refunded")]
    Refunded,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl PaymentStatus {
    /// Whether a gateway observation of `next` may replace `self` for the
    /// same gateway payment. Re-observing the current status is allowed
    /// (idempotent); moving back to an earlier state is not.
    pub fn accepts(self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        match (self, next) {
            (current, next) if current == next => true,
            (Pending, _) => true,
            (Approved, Refunded) => true,
            _ => false,
        }
    }

    /// Whether a row holding `self` may be taken over by an observation of
    /// a *different* gateway attempt reporting `next`. Failed attempts give
    /// way to anything; a pending one only to another live attempt, so a late
    /// failure of an abandoned attempt cannot displace the one in use.
    pub fn yields_to_attempt(self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        match self {
            Rejected | Cancelled => true,
            Pending => matches!(next, Pending | Approved),
            Approved | Refunded => false,
        }
    }

    /// The terminal "funds captured" value; the only status that settles an order.
    pub fn settles_order(self) -> bool {
        self == PaymentStatus::Approved
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[sea_orm(string_value = "pix")]
    Pix,
    #[sea_orm(string_value = "boleto")]
    Boleto,
    #[sea_orm(string_value = "credit_card")]
    CreditCard,
}

/// Pricing tier of the buyer: individual (CPF) or business (CNPJ).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum PersonType {
    #[sea_orm(string_value = "individual")]
    Individual,
    #[sea_orm(string_value = "business")]
    Business,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(30))")]
#[serde(rename_all = "snake_case")]
pub enum TransactionAction {
    #[sea_orm(string_value = "create_payment")]
    CreatePayment,
    #[sea_orm(string_value = "create_preference")]
    CreatePreference,
    #[sea_orm(string_value = "webhook")]
    Webhook,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum TransactionOutcome {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "success")]
    Success,
    #[sea_orm(string_value = "error")]
    Error,
    #[sea_orm(string_value = "processed")]
    Processed,
    #[sea_orm(string_value = "received")]
    Received,
}
