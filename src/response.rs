use serde::Serialize;
use utoipa::ToSchema;

/// Pagination block of the envelope. All fields are null on single-item responses.
#[derive(Debug, Serialize, ToSchema, Clone, Default)]
pub struct Meta {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub total: Option<i64>,
    pub total_pages: Option<i64>,
}

impl Meta {
    pub fn paged(page: i64, per_page: i64, total: i64) -> Self {
        let total_pages = if per_page > 0 {
            (total + per_page - 1) / per_page
        } else {
            0
        };
        Self {
            page: Some(page),
            per_page: Some(per_page),
            total: Some(total),
            total_pages: Some(total_pages),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

/// `{message, data, meta}` envelope used by every endpoint except the webhook.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub message: String,
    pub data: Option<T>,
    pub meta: Option<Meta>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            message: message.into(),
            data: Some(data),
            meta: Some(Meta::empty()),
        }
    }

    pub fn paged(message: impl Into<String>, data: T, meta: Meta) -> Self {
        Self {
            message: message.into(),
            data: Some(data),
            meta: Some(meta),
        }
    }
}
