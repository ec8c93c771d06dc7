use std::env;

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub paytr: PaytrConfig,
    pub mail: MailConfig,
}

/// Merchant credentials and endpoints for the PayTR gateway.
#[derive(Debug, Clone)]
pub struct PaytrConfig {
    pub merchant_id: String,
    pub merchant_key: String,
    pub merchant_salt: String,
    pub token_url: String,
    pub payment_url: String,
    pub ok_url: String,
    pub fail_url: String,
    pub test_mode: bool,
    pub currency: String,
    pub payment_type: String,
    pub installment_count: u32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub from: String,
    pub admin_email: Option<String>,
    pub queue_capacity: usize,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET is not set")?;
        Ok(Self {
            port,
            database_url,
            host,
            jwt_secret,
            paytr: PaytrConfig::from_env()?,
            mail: MailConfig::from_env(),
        })
    }
}

impl PaytrConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let required = |key: &str| env::var(key).with_context(|| format!("{key} is not set"));
        Ok(Self {
            merchant_id: required("PAYTR_MERCHANT_ID")?,
            merchant_key: required("PAYTR_MERCHANT_KEY")?,
            merchant_salt: required("PAYTR_MERCHANT_SALT")?,
            ok_url: required("PAYTR_OK_URL")?,
            fail_url: required("PAYTR_FAIL_URL")?,
            token_url: env::var("PAYTR_TOKEN_URL")
                .unwrap_or_else(|_| "https://www.paytr.com/odeme/api/get-token".to_string()),
            payment_url: env::var("PAYTR_PAYMENT_URL")
                .unwrap_or_else(|_| "https://www.paytr.com/odeme/guvenli".to_string()),
            test_mode: env::var("PAYTR_TEST_MODE")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            currency: env::var("PAYTR_CURRENCY").unwrap_or_else(|_| "TL".to_string()),
            payment_type: env::var("PAYTR_PAYMENT_TYPE").unwrap_or_else(|_| "card".to_string()),
            installment_count: env::var("PAYTR_INSTALLMENT_COUNT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            timeout_secs: env::var("PAYTR_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
        })
    }

    pub fn test_mode_flag(&self) -> &'static str {
        if self.test_mode { "1" } else { "0" }
    }
}

impl MailConfig {
    pub fn from_env() -> Self {
        Self {
            from: env::var("MAIL_FROM").unwrap_or_else(|_| "no-reply@localhost".to_string()),
            admin_email: env::var("ADMIN_EMAIL").ok().filter(|v| !v.trim().is_empty()),
            queue_capacity: env::var("NOTIFICATION_QUEUE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(256),
        }
    }
}
