// config.rs
use anyhow::{Context, Result};
use tracing_subscriber::filter::LevelFilter;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub run_migrations: bool,
    pub port: u16,
    pub app_url: String,
    pub cors_origins: Vec<String>,
    pub log_level: LevelFilter,
    // Identity
    pub firebase_project_id: String,
    // Payment providers
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub stripe_currency: String,
    pub khalti_secret_key: String,
    pub khalti_base_url: String,
    pub khalti_return_url: String,
    // Image storage
    pub cloudinary_cloud_name: String,
    pub cloudinary_api_key: String,
    pub cloudinary_api_secret: String,
}

impl Config {
    pub fn init() -> Result<Config> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup, so tests can feed a map instead of the process env.
    pub fn from_lookup<F>(lookup: F) -> Result<Config>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or_default = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

        let database_url = var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let firebase_project_id =
            var("FIREBASE_PROJECT_ID").context("FIREBASE_PROJECT_ID must be set")?;

        let port = or_default("PORT", "8000")
            .parse::<u16>()
            .context("PORT must be a valid port number")?;
        let database_max_connections = or_default("DATABASE_MAX_CONNECTIONS", "10")
            .parse::<u32>()
            .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?;
        let run_migrations = or_default("RUN_MIGRATIONS", "true")
            .parse::<bool>()
            .context("RUN_MIGRATIONS must be true or false")?;
        let log_level = or_default("LOG_LEVEL", "info")
            .parse::<LevelFilter>()
            .context("LOG_LEVEL must be one of off, error, warn, info, debug, trace")?;

        let app_url = or_default("APP_URL", "http://localhost:5173");
        let cors_origins = var("CORS_ORIGINS")
            .map(|origins| {
                origins
                    .split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_else(|| vec![app_url.clone()]);

        let khalti_return_url = var("KHALTI_RETURN_URL")
            .unwrap_or_else(|| format!("{}/payment/khalti/return", app_url.trim_end_matches('/')));

        Ok(Config {
            database_url,
            database_max_connections,
            run_migrations,
            port,
            cors_origins,
            log_level,
            firebase_project_id,
            stripe_secret_key: or_default("STRIPE_SECRET_KEY", ""),
            stripe_webhook_secret: or_default("STRIPE_WEBHOOK_SECRET", ""),
            stripe_currency: or_default("STRIPE_CURRENCY", "usd").to_lowercase(),
            khalti_secret_key: or_default("KHALTI_SECRET_KEY", ""),
            khalti_base_url: or_default("KHALTI_BASE_URL", "https://a.khalti.com/api/v2")
                .trim_end_matches('/')
                .to_string(),
            khalti_return_url,
            cloudinary_cloud_name: or_default("CLOUDINARY_CLOUD_NAME", ""),
            cloudinary_api_key: or_default("CLOUDINARY_API_KEY", ""),
            cloudinary_api_secret: or_default("CLOUDINARY_API_SECRET", ""),
            app_url,
        })
    }

    pub fn stripe_enabled(&self) -> bool {
        !self.stripe_secret_key.is_empty()
    }

    pub fn khalti_enabled(&self) -> bool {
        !self.khalti_secret_key.is_empty()
    }

    pub fn cloudinary_enabled(&self) -> bool {
        !self.cloudinary_cloud_name.is_empty()
            && !self.cloudinary_api_key.is_empty()
            && !self.cloudinary_api_secret.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/servicehub"),
            ("FIREBASE_PROJECT_ID", "servicehub-dev"),
        ]))
        .unwrap();

        assert_eq!(config.port, 8000);
        assert_eq!(config.database_max_connections, 10);
        assert!(config.run_migrations);
        assert_eq!(config.log_level, LevelFilter::INFO);
        assert_eq!(config.stripe_currency, "usd");
        assert_eq!(config.cors_origins, vec!["http://localhost:5173".to_string()]);
        assert_eq!(
            config.khalti_return_url,
            "http://localhost:5173/payment/khalti/return"
        );
        assert!(!config.stripe_enabled());
        assert!(!config.khalti_enabled());
        assert!(!config.cloudinary_enabled());
    }

    #[test]
    fn test_missing_required_keys() {
        let err = Config::from_lookup(lookup_from(&[("FIREBASE_PROJECT_ID", "p")])).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));

        let err = Config::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://x")])).unwrap_err();
        assert!(err.to_string().contains("FIREBASE_PROJECT_ID"));
    }

    #[test]
    fn test_cors_origins_split_and_port_parse() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://x"),
            ("FIREBASE_PROJECT_ID", "p"),
            ("PORT", "3000"),
            ("CORS_ORIGINS", "https://a.example, https://b.example,"),
            ("STRIPE_SECRET_KEY", "sk_test_123"),
            ("STRIPE_CURRENCY", "NPR"),
        ]))
        .unwrap();

        assert_eq!(config.port, 3000);
        assert_eq!(
            config.cors_origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
        assert!(config.stripe_enabled());
        assert_eq!(config.stripe_currency, "npr");
    }

    #[test]
    fn test_bad_port_is_an_error() {
        let result = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://x"),
            ("FIREBASE_PROJECT_ID", "p"),
            ("PORT", "not-a-port"),
        ]));
        assert!(result.is_err());
    }
}
