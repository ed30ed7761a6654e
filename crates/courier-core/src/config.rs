//! Configuration module
//!
//! Server configuration loaded from the environment (and `.env` via dotenvy).

use std::env;
use std::time::Duration;

use crate::storage_types::StorageBackend;

const DEFAULT_PORT: u16 = 3000;
const SIGNED_URL_TTL_SECS: u64 = 3600;
const MIN_SIGNING_SECRET_LEN: usize = 32;
const DEV_SIGNING_SECRET: &str = "courier-development-signing-secret-change-me";

/// Server configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub server_port: u16,
    pub environment: String,
    pub cors_origins: Vec<String>,
    pub storage_backend: StorageBackend,
    pub local_storage_path: String,
    /// Base URL clients use to reach this service; signed local URLs are built on it.
    pub public_base_url: String,
    pub url_signing_secret: String,
    pub signed_url_ttl_secs: u64,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());
        let is_production = is_production_name(&environment);

        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        if is_production && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }
        let cors_origins = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let server_port: u16 = env::var("PORT")
            .unwrap_or_else(|_| DEFAULT_PORT.to_string())
            .parse()
            .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?;

        let storage_backend = match env::var("STORAGE_BACKEND") {
            Ok(s) => s.parse()?,
            Err(_) => StorageBackend::Local,
        };

        let url_signing_secret = match env::var("URL_SIGNING_SECRET") {
            Ok(secret) => secret,
            Err(_) if is_production => {
                return Err(anyhow::anyhow!(
                    "URL_SIGNING_SECRET must be set in production"
                ))
            }
            Err(_) => {
                tracing::warn!("URL_SIGNING_SECRET not set, using development secret");
                DEV_SIGNING_SECRET.to_string()
            }
        };

        Ok(Config {
            server_port,
            environment,
            cors_origins,
            storage_backend,
            local_storage_path: env::var("LOCAL_STORAGE_PATH")
                .unwrap_or_else(|_| "./data/uploads".to_string()),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| format!("http://localhost:{}", server_port)),
            url_signing_secret,
            signed_url_ttl_secs: env::var("SIGNED_URL_TTL_SECS")
                .unwrap_or_else(|_| SIGNED_URL_TTL_SECS.to_string())
                .parse()
                .unwrap_or(SIGNED_URL_TTL_SECS),
            s3_bucket: env::var("S3_BUCKET")
                .or_else(|_| env::var("AWS_S3_BUCKET"))
                .ok(),
            s3_region: env::var("S3_REGION")
                .or_else(|_| env::var("AWS_REGION"))
                .ok(),
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
        })
    }

    /// Configuration for a local-filesystem deployment with development defaults.
    pub fn local(storage_path: impl Into<String>, public_base_url: impl Into<String>) -> Self {
        Config {
            server_port: DEFAULT_PORT,
            environment: "development".to_string(),
            cors_origins: vec!["*".to_string()],
            storage_backend: StorageBackend::Local,
            local_storage_path: storage_path.into(),
            public_base_url: public_base_url.into(),
            url_signing_secret: DEV_SIGNING_SECRET.to_string(),
            signed_url_ttl_secs: SIGNED_URL_TTL_SECS,
            s3_bucket: None,
            s3_region: None,
            s3_endpoint: None,
        }
    }

    /// Fail fast on misconfiguration.
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.url_signing_secret.len() < MIN_SIGNING_SECRET_LEN {
            return Err(anyhow::anyhow!(
                "URL_SIGNING_SECRET must be at least {} characters long",
                MIN_SIGNING_SECRET_LEN
            ));
        }
        if self.signed_url_ttl_secs == 0 {
            return Err(anyhow::anyhow!("SIGNED_URL_TTL_SECS must be greater than 0"));
        }
        if self.storage_backend == StorageBackend::S3 {
            if self.s3_bucket.is_none() {
                return Err(anyhow::anyhow!(
                    "S3_BUCKET (or AWS_S3_BUCKET) must be set for the s3 backend"
                ));
            }
            if self.s3_region.is_none() {
                return Err(anyhow::anyhow!(
                    "S3_REGION (or AWS_REGION) must be set for the s3 backend"
                ));
            }
        }
        Ok(())
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        is_production_name(&self.environment)
    }

    pub fn signed_url_ttl(&self) -> Duration {
        Duration::from_secs(self.signed_url_ttl_secs)
    }
}

fn is_production_name(environment: &str) -> bool {
    let env = environment.to_lowercase();
    env == "production" || env == "prod"
}
