use std::env;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageBackend,
    pub database: DatabaseConfig,
    pub pricing: PricingConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" | "in-memory" => Ok(Self::Memory),
            other => Err(format!("unknown storage backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub ssl_mode: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct PricingConfig {
    pub base_fare: f64,
    pub per_km: f64,
    pub center_lat: f64,
    pub center_lng: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        // São Paulo
        Self {
            base_fare: 8.0,
            per_km: 1.5,
            center_lat: -23.5505,
            center_lng: -46.6333,
        }
    }
}

fn parsed_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn load() -> Self {
        dotenvy::dotenv().ok();

        let pricing_defaults = PricingConfig::default();

        Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parsed_or("SERVER_PORT", 8080),
                environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            },
            storage: env::var("STORAGE_BACKEND")
                .ok()
                .and_then(|s| match s.parse::<StorageBackend>() {
                    Ok(backend) => Some(backend),
                    Err(e) => {
                        tracing::warn!("{}, falling back to postgres", e);
                        None
                    }
                })
                .unwrap_or(StorageBackend::Postgres),
            database: DatabaseConfig {
                host: env::var("DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
                port: parsed_or("DB_PORT", 5432),
                user: env::var("DB_USER").unwrap_or_else(|_| "postgres".to_string()),
                password: env::var("DB_PASSWORD").unwrap_or_else(|_| "postgres".to_string()),
                database: env::var("DB_NAME").unwrap_or_else(|_| "rides".to_string()),
                ssl_mode: env::var("DB_SSL_MODE").unwrap_or_else(|_| "disable".to_string()),
                max_connections: parsed_or("DB_MAX_CONNS", 25),
            },
            pricing: PricingConfig {
                base_fare: parsed_or("PRICING_BASE_FARE", pricing_defaults.base_fare),
                per_km: parsed_or("PRICING_PER_KM", pricing_defaults.per_km),
                center_lat: parsed_or("CITY_CENTER_LAT", pricing_defaults.center_lat),
                center_lng: parsed_or("CITY_CENTER_LNG", pricing_defaults.center_lng),
            },
        }
    }

    pub fn database_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            self.database.user,
            self.database.password,
            self.database.host,
            self.database.port,
            self.database.database,
            self.database.ssl_mode
        )
    }
}
