use sea_orm::{ActiveModelTrait, ConnectionTrait, DbErr, Set};
use sea_orm::ActiveValue::NotSet;
use serde_json::Value;
use uuid::Uuid;

use crate::entity::{
    enums::{TransactionAction, TransactionOutcome},
    transactions::ActiveModel as TransactionActive,
};

/// One gateway interaction, as written to the append-only transaction log.
#[derive(Debug, Clone)]
pub struct TransactionEntry {
    pub action: TransactionAction,
    pub gateway_payment_id: Option<String>,
    pub request_payload: Option<Value>,
    pub response_payload: Option<Value>,
    pub outcome: TransactionOutcome,
    pub error_message: Option<String>,
}

impl TransactionEntry {
    pub fn new(action: TransactionAction, outcome: TransactionOutcome) -> Self {
        Self {
            action,
            gateway_payment_id: None,
            request_payload: None,
            response_payload: None,
            outcome,
            error_message: None,
        }
    }

    pub fn gateway_payment_id(mut self, id: impl Into<String>) -> Self {
        self.gateway_payment_id = Some(id.into());
        self
    }

    pub fn request(mut self, payload: Value) -> Self {
        self.request_payload = Some(payload);
        self
    }

    pub fn response(mut self, payload: Value) -> Self {
        self.response_payload = Some(payload);
        self
    }

    pub fn error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}

/// Append an entry using `conn`, which may be an open transaction.
pub async fn record_transaction<C: ConnectionTrait>(
    conn: &C,
    entry: TransactionEntry,
) -> Result<(), DbErr> {
    TransactionActive {
        id: Set(Uuid::new_v4()),
        action: Set(entry.action),
        gateway_payment_id: Set(entry.gateway_payment_id),
        request_payload: Set(entry.request_payload),
        response_payload: Set(entry.response_payload),
        outcome: Set(entry.outcome),
        error_message: Set(entry.error_message),
        created_at: NotSet,
    }
    .insert(conn)
    .await?;

    Ok(())
}

/// Append an entry outside any business transaction. A failed write is
/// logged and otherwise ignored.
pub async fn record_detached<C: ConnectionTrait>(conn: &C, entry: TransactionEntry) {
    let action = entry.action;
    if let Err(err) = record_transaction(conn, entry).await {
        tracing::warn!(error = %err, action = ?action, "transaction log failed");
    }
}
