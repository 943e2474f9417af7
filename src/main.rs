use std::{net::SocketAddr, sync::Arc, time::Duration};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use axum_payments_api::{
    config::{AppConfig, GatewayConfig, GatewayProvider},
    db::{create_orm_conn, run_migrations},
    gateway::{PaymentGateway, mercadopago::MercadoPagoGateway, mock::MockGateway},
    routes::create_app,
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,axum_payments_api=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm).await?;

    let gateway = build_gateway(&config.gateway)?;
    tracing::info!(provider = gateway.name(), "payment gateway ready");

    let app = create_app(AppState {
        orm,
        gateway,
        settings: Arc::new(config.payments.clone()),
    });

    let addr = SocketAddr::from((config.host.parse::<std::net::IpAddr>()?, config.port));
    tracing::info!("listening on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn build_gateway(config: &GatewayConfig) -> anyhow::Result<Arc<dyn PaymentGateway>> {
    let gateway: Arc<dyn PaymentGateway> = match config.provider {
        GatewayProvider::MercadoPago => Arc::new(MercadoPagoGateway::new(
            config.base_url.clone(),
            config.access_token.clone(),
            Duration::from_millis(config.timeout_ms),
        )?),
        GatewayProvider::Mock => {
            tracing::warn!("using the in-memory mock gateway");
            Arc::new(MockGateway::approving())
        }
    };
    Ok(gateway)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("shutdown signal received, draining connections");
}
