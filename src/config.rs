use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub gateway: GatewayConfig,
    pub payments: PaymentSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayProvider {
    MercadoPago,
    Mock,
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub provider: GatewayProvider,
    pub base_url: String,
    pub access_token: String,
    pub timeout_ms: u64,
}

/// Settings the payment services read at request time.
#[derive(Debug, Clone)]
pub struct PaymentSettings {
    pub currency: String,
    pub public_key: String,
    pub frontend_url: String,
    pub notification_url: Option<String>,
    pub internal_api_key: Option<String>,
    pub max_installments: u32,
}

impl Default for PaymentSettings {
    fn default() -> Self {
        Self {
            currency: "BRL".to_string(),
            public_key: String::new(),
            frontend_url: "http://localhost:8080".to_string(),
            notification_url: None,
            internal_api_key: None,
            max_installments: 12,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);

        let provider = match env::var("GATEWAY_PROVIDER").as_deref() {
            Ok("mock") => GatewayProvider::Mock,
            Ok("mercadopago") | Err(_) => GatewayProvider::MercadoPago,
            Ok(other) => anyhow::bail!("unknown GATEWAY_PROVIDER {other}"),
        };
        let access_token = env::var("MP_ACCESS_TOKEN").unwrap_or_default();
        if provider == GatewayProvider::MercadoPago && access_token.is_empty() {
            anyhow::bail!("MP_ACCESS_TOKEN must be set for the mercadopago provider");
        }
        let gateway = GatewayConfig {
            provider,
            base_url: env::var("MP_BASE_URL")
                .unwrap_or_else(|_| "https://api.mercadopago.com".to_string()),
            access_token,
            timeout_ms: env::var("GATEWAY_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(10_000),
        };

        let defaults = PaymentSettings::default();
        let payments = PaymentSettings {
            currency: env::var("PAYMENT_CURRENCY").unwrap_or(defaults.currency),
            public_key: env::var("MP_PUBLIC_KEY").unwrap_or_default(),
            frontend_url: env::var("FRONTEND_URL").unwrap_or(defaults.frontend_url),
            notification_url: env::var("NOTIFICATION_URL").ok().filter(|v| !v.is_empty()),
            internal_api_key: env::var("INTERNAL_API_KEY").ok().filter(|v| !v.is_empty()),
            max_installments: env::var("MAX_INSTALLMENTS")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(defaults.max_installments),
        };

        Ok(Self {
            port,
            database_url,
            host,
            gateway,
            payments,
        })
    }
}
