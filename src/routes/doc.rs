use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        orders::{CreateOrderRequest, OrderItemInput, OrderList, OrderWithItems, UpdateOrderStatusRequest},
        payments::{
            AckStatus, CardDetails, DirectPaymentRequest, InstallmentsQuery, PaymentDetail,
            PreferenceRequest, PreferenceResponse, ProcessPaymentResponse, PublicKeyResponse,
            WebhookAck,
        },
    },
    entity::enums::{OrderStatus, PaymentMethod, PaymentStatus, PersonType},
    middleware::auth::INTERNAL_API_KEY_HEADER,
    models::{Order, OrderItem, Payment},
    response::{ApiResponse, Meta},
    routes::{admin, health, orders, params, payments},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
        components.add_security_scheme(
            "api_key",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(INTERNAL_API_KEY_HEADER))),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        orders::create_order,
        orders::list_orders,
        orders::get_order,
        admin::update_order_status,
        payments::public_key,
        payments::create_preference,
        payments::process_payment,
        payments::payment_methods,
        payments::installments,
        payments::payment_status,
        payments::webhook,
        payments::get_payment
    ),
    components(
        schemas(
            Order,
            OrderItem,
            Payment,
            OrderStatus,
            PaymentStatus,
            PaymentMethod,
            PersonType,
            OrderItemInput,
            CreateOrderRequest,
            UpdateOrderStatusRequest,
            OrderList,
            OrderWithItems,
            PreferenceRequest,
            PreferenceResponse,
            CardDetails,
            DirectPaymentRequest,
            ProcessPaymentResponse,
            PaymentDetail,
            InstallmentsQuery,
            PublicKeyResponse,
            AckStatus,
            WebhookAck,
            params::Pagination,
            params::OrderListQuery,
            Meta,
            ApiResponse<Order>,
            ApiResponse<OrderList>,
            ApiResponse<OrderWithItems>,
            ApiResponse<Payment>,
            ApiResponse<PaymentDetail>,
            ApiResponse<PreferenceResponse>,
            ApiResponse<ProcessPaymentResponse>,
            ApiResponse<PublicKeyResponse>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Orders", description = "Order endpoints"),
        (name = "Payments", description = "Payment and gateway notification endpoints"),
        (name = "Admin", description = "Admin endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
