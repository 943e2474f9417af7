use std::sync::Arc;

use crate::{config::PaymentSettings, db::OrmConn, gateway::PaymentGateway};

#[derive(Clone)]
pub struct AppState {
    pub orm: OrmConn,
    pub gateway: Arc<dyn PaymentGateway>,
    pub settings: Arc<PaymentSettings>,
}
