use std::env;

pub const DEFAULT_LOW_STOCK_THRESHOLD: i32 = 5;

/// Environment-driven configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub admin_email: String,
    pub low_stock_threshold: i32,
    pub bind_addr: String,
    pub smtp: Option<SmtpConfig>,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub relay: String,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, String> {
        dotenvy::dotenv().ok();

        let database_url =
            env::var("DATABASE_URL").map_err(|e| format!("DATABASE_URL must be set: {}", e))?;
        let admin_email =
            env::var("ADMIN_EMAIL").map_err(|e| format!("ADMIN_EMAIL must be set: {}", e))?;

        let low_stock_threshold = match env::var("LOW_STOCK_THRESHOLD") {
            Ok(raw) => raw
                .parse::<i32>()
                .map_err(|e| format!("LOW_STOCK_THRESHOLD must be an integer: {}", e))?,
            Err(_) => DEFAULT_LOW_STOCK_THRESHOLD,
        };

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_owned());

        let smtp = match (
            env::var("SMTP_RELAY"),
            env::var("SMTP_USERNAME"),
            env::var("SMTP_PASSWORD"),
        ) {
            (Ok(relay), Ok(username), Ok(password)) => Some(SmtpConfig {
                relay,
                username,
                password,
                from_address: env::var("SMTP_FROM")
                    .unwrap_or_else(|_| "no-reply@storefront.shop".to_owned()),
            }),
            _ => None,
        };

        Ok(AppConfig {
            database_url,
            admin_email,
            low_stock_threshold,
            bind_addr,
            smtp,
        })
    }
}
