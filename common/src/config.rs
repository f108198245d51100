use once_cell::sync::OnceCell;
use serde::Deserialize;
use std::{env, fs};

#[derive(Debug, Deserialize)]
pub struct Config {
    pub project_name: String,
    pub log_level: String,
    pub log_file: String,
    pub database_url: String,
    pub host: String,
    pub port: u16,

    /// Base URL of the external chat-messaging gateway.
    pub gateway_base_url: String,
    /// API token presented on every gateway request.
    pub gateway_token: String,
    /// Shared secret used by the gateway for webhook callbacks.
    pub gateway_secret: String,
    /// Device identifier registered with the gateway.
    pub gateway_device_id: String,
    /// Token expected as the webhook URL path segment.
    pub webhook_token: String,

    /// Country dialling code used when canonicalizing local phone numbers.
    pub default_country_code: String,
    /// Language tag used when a template has no better match.
    pub default_language: String,
    /// School name injected into message templates.
    pub school_name: String,
    /// Upper bound on automatic resend attempts per notification.
    pub max_send_retries: u32,

    pub smtp_host: String,
    pub smtp_username: String,
    pub smtp_password: String,
    pub email_from_name: String,
}

static CONFIG: OnceCell<Config> = OnceCell::new();

impl Config {
    pub fn init(env_path: &str) -> &'static Self {
        dotenvy::from_filename(env_path).ok();

        CONFIG.get_or_init(Self::from_env)
    }

    pub fn get() -> &'static Self {
        CONFIG.get_or_init(Self::from_env)
    }

    fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let project_name = env::var("PROJECT_NAME").unwrap_or_else(|_| "kelasku-api".into());
        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "debug".into());
        let log_file = env::var("LOG_FILE").unwrap_or_else(|_| "logs/api.log".into());
        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".into());
        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        if let Some(parent) = std::path::Path::new(&log_file).parent() {
            fs::create_dir_all(parent).expect("Failed to create log directory");
        }

        let gateway_base_url =
            env::var("GATEWAY_BASE_URL").unwrap_or_else(|_| "http://localhost:8100".into());
        let gateway_token = env::var("GATEWAY_TOKEN").unwrap_or_default();
        let gateway_secret = env::var("GATEWAY_SECRET").unwrap_or_default();
        let gateway_device_id = env::var("GATEWAY_DEVICE_ID").unwrap_or_else(|_| "default".into());
        let webhook_token = env::var("WEBHOOK_TOKEN").unwrap_or_else(|_| "change-me".into());

        let default_country_code = env::var("DEFAULT_COUNTRY_CODE").unwrap_or_else(|_| "62".into());
        let default_language = env::var("DEFAULT_LANGUAGE").unwrap_or_else(|_| "id".into());
        let school_name = env::var("SCHOOL_NAME").unwrap_or_else(|_| "Our School".into());
        let max_send_retries = env::var("MAX_SEND_RETRIES")
            .ok()
            .and_then(|m| m.parse().ok())
            .unwrap_or(3);

        let smtp_host = env::var("SMTP_HOST").unwrap_or_else(|_| "smtp.gmail.com".into());
        let smtp_username = env::var("SMTP_USERNAME").unwrap_or_default();
        let smtp_password = env::var("SMTP_PASSWORD").unwrap_or_default();
        let email_from_name =
            env::var("EMAIL_FROM_NAME").unwrap_or_else(|_| "Attendance Office".into());

        Config {
            project_name,
            log_level,
            log_file,
            database_url,
            host,
            port,
            gateway_base_url,
            gateway_token,
            gateway_secret,
            gateway_device_id,
            webhook_token,
            default_country_code,
            default_language,
            school_name,
            max_send_retries,
            smtp_host,
            smtp_username,
            smtp_password,
            email_from_name,
        }
    }
}
