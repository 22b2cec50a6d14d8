use std::env;
use std::fmt::Display;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub jwt_secret: String,
    /// Lifetime of access tokens in seconds. Activation links use the same window.
    pub access_token_lifetime: i64,
    /// Lifetime of refresh tokens in seconds.
    pub refresh_token_lifetime: i64,
    /// Lifetime of password reset tokens in seconds.
    pub password_reset_timeout: i64,
    pub page_size: i64,
    /// Seconds between completed-task sweeps.
    pub sweep_interval: u64,
    /// Either "console" (log outgoing mail) or "smtp".
    pub email_backend: String,
    pub email_from: String,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    /// Base URL used in activation and password reset links sent by email.
    pub public_base_url: String,
    pub weather_api_key: String,
    pub weather_geo_url: String,
    pub weather_data_url: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            server_port: parse_var("SERVER_PORT", 8080),
            jwt_secret: env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
            access_token_lifetime: parse_var("ACCESS_TOKEN_LIFETIME", 86_400),
            refresh_token_lifetime: parse_var("REFRESH_TOKEN_LIFETIME", 604_800),
            password_reset_timeout: parse_var("PASSWORD_RESET_TIMEOUT", 3_600),
            page_size: parse_var("PAGE_SIZE", 10),
            sweep_interval: parse_var("SWEEP_INTERVAL", 600),
            email_backend: env::var("EMAIL_BACKEND").unwrap_or_else(|_| "console".to_string()),
            email_from: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "taskdeck <no-reply@taskdeck.local>".to_string()),
            smtp_host: env::var("SMTP_HOST").unwrap_or_else(|_| "localhost".to_string()),
            smtp_port: parse_var("SMTP_PORT", 587),
            smtp_username: env::var("SMTP_USERNAME").ok(),
            smtp_password: env::var("SMTP_PASSWORD").ok(),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8080".to_string()),
            weather_api_key: env::var("WEATHER_API_KEY").unwrap_or_default(),
            weather_geo_url: env::var("WEATHER_GEO_URL")
                .unwrap_or_else(|_| "https://api.openweathermap.org/geo/1.0/direct".to_string()),
            weather_data_url: env::var("WEATHER_DATA_URL")
                .unwrap_or_else(|_| "https://api.openweathermap.org/data/2.5/weather".to_string()),
        }
    }

    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.server_host, self.server_port)
    }
}

fn parse_var<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(err) => panic!("{} is not a valid value: {}", key, err),
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        // Set required environment variables
        env::set_var("DATABASE_URL", "postgres://test");
        env::set_var("JWT_SECRET", "config-test-secret");

        let config = Config::from_env();

        assert_eq!(config.database_url, "postgres://test");
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.server_host, "127.0.0.1");
        assert_eq!(config.access_token_lifetime, 86_400);
        assert_eq!(config.refresh_token_lifetime, 604_800);
        assert_eq!(config.password_reset_timeout, 3_600);
        assert_eq!(config.page_size, 10);
        assert_eq!(config.sweep_interval, 600);
        assert_eq!(config.email_backend, "console");
        assert_eq!(config.smtp_port, 587);
        assert!(config.smtp_username.is_none());
        assert_eq!(config.public_base_url, "http://127.0.0.1:8080");
        assert_eq!(config.server_url(), "http://127.0.0.1:8080");

        // Test custom values
        env::set_var("SERVER_PORT", "3000");
        env::set_var("SERVER_HOST", "0.0.0.0");
        env::set_var("PAGE_SIZE", "25");
        env::set_var("SWEEP_INTERVAL", "30");

        let config = Config::from_env();

        assert_eq!(config.server_port, 3000);
        assert_eq!(config.server_host, "0.0.0.0");
        assert_eq!(config.page_size, 25);
        assert_eq!(config.sweep_interval, 30);

        env::remove_var("SERVER_PORT");
        env::remove_var("SERVER_HOST");
        env::remove_var("PAGE_SIZE");
        env::remove_var("SWEEP_INTERVAL");
    }
}
