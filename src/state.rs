use std::sync::Arc;

use crate::{
    config::AppConfig,
    db::{DbPool, OrmConn, orm_from_pool},
    integrations::{
        mailer::{EmailSender, HttpEmailSender, LogEmailSender},
        mercadopago::{MercadoPagoGateway, PaymentGateway},
    },
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub config: Arc<AppConfig>,
    pub payments: Option<Arc<dyn PaymentGateway>>,
    pub mailer: Arc<dyn EmailSender>,
}

impl AppState {
    pub fn new(pool: DbPool, config: AppConfig) -> Self {
        let payments = config
            .payments
            .clone()
            .map(|cfg| Arc::new(MercadoPagoGateway::new(cfg)) as Arc<dyn PaymentGateway>);
        let mailer: Arc<dyn EmailSender> = match config.email.clone() {
            Some(cfg) => Arc::new(HttpEmailSender::new(cfg)),
            None => Arc::new(LogEmailSender),
        };
        Self {
            orm: orm_from_pool(pool.clone()),
            pool,
            config: Arc::new(config),
            payments,
            mailer,
        }
    }
}
