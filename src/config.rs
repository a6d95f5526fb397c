use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub db_max_connections: u32,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub low_stock_threshold: i32,
    pub public_base_url: String,
    pub store: StoreConfig,
    pub payments: Option<PaymentsConfig>,
    pub email: Option<EmailConfig>,
}

/// Sender block printed on shipping labels.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub name: String,
    pub address: String,
    pub phone: String,
}

#[derive(Debug, Clone)]
pub struct PaymentsConfig {
    pub access_token: String,
    pub api_url: String,
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub api_url: String,
    pub api_key: String,
    pub from: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET is not set"))?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parse_or("APP_PORT", 3000);

        let store = StoreConfig {
            name: env::var("STORE_NAME").unwrap_or_else(|_| "Urban Indumentaria".to_string()),
            address: env::var("STORE_ADDRESS").unwrap_or_else(|_| "Sin dirección".to_string()),
            phone: env::var("STORE_PHONE").unwrap_or_default(),
        };

        let payments = env::var("MP_ACCESS_TOKEN").ok().filter(|t| !t.is_empty()).map(
            |access_token| PaymentsConfig {
                access_token,
                api_url: env::var("MP_API_URL")
                    .unwrap_or_else(|_| "https://api.mercadopago.com".to_string()),
            },
        );

        let email = match (env::var("EMAIL_API_URL"), env::var("EMAIL_API_KEY")) {
            (Ok(api_url), Ok(api_key)) if !api_url.is_empty() => Some(EmailConfig {
                api_url,
                api_key,
                from: env::var("EMAIL_FROM")
                    .unwrap_or_else(|_| "Urban Indumentaria <ventas@urban.local>".to_string()),
            }),
            _ => None,
        };

        Ok(Self {
            port,
            database_url,
            host,
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", 10),
            jwt_secret,
            jwt_ttl_hours: parse_or("JWT_TTL_HOURS", 24),
            low_stock_threshold: parse_or("LOW_STOCK_THRESHOLD", 5),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            store,
            payments,
            email,
        })
    }

    /// Configuration for tests and tools that only need a database.
    pub fn for_database(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            host: "127.0.0.1".to_string(),
            port: 3000,
            db_max_connections: 5,
            jwt_secret: "test-secret".to_string(),
            jwt_ttl_hours: 24,
            low_stock_threshold: 5,
            public_base_url: "http://localhost:3000".to_string(),
            store: StoreConfig {
                name: "Urban Indumentaria".to_string(),
                address: "Sin dirección".to_string(),
                phone: String::new(),
            },
            payments: None,
            email: None,
        }
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
