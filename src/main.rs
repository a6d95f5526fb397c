use std::net::{IpAddr, SocketAddr};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use urban_indumentaria_api::{
    config::AppConfig,
    db::{create_pool, run_migrations},
    routes::create_app,
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,urban_indumentaria_api=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    let pool = create_pool(&config.database_url, config.db_max_connections).await?;
    run_migrations(&pool).await?;

    if config.payments.is_none() {
        tracing::warn!("MP_ACCESS_TOKEN not set; online payments are disabled");
    }
    if config.email.is_none() {
        tracing::info!("EMAIL_API_URL not set; emails are only logged");
    }

    let addr = SocketAddr::from((config.host.parse::<IpAddr>()?, config.port));
    let app = create_app(AppState::new(pool, config));

    tracing::info!(%addr, "listening");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;

    Ok(())
}
