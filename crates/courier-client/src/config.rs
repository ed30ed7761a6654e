//! Client configuration from the environment.

use std::env;
use std::time::Duration;

const DEFAULT_API_URL: &str = "http://localhost:3000";
const DEFAULT_MAX_CONCURRENT_UPLOADS: usize = 3;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub api_url: String,
    /// Transfers allowed in flight at once; 1 uploads sequentially.
    pub max_concurrent_uploads: usize,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            max_concurrent_uploads: DEFAULT_MAX_CONCURRENT_UPLOADS,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl ClientConfig {
    /// Read `COURIER_API_URL`, `COURIER_MAX_CONCURRENT_UPLOADS`, and
    /// `COURIER_REQUEST_TIMEOUT_SECS`, falling back to defaults.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let api_url = env::var("COURIER_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());

        let max_concurrent_uploads = match env::var("COURIER_MAX_CONCURRENT_UPLOADS") {
            Ok(raw) => raw.parse::<usize>().map_err(|_| {
                anyhow::anyhow!("COURIER_MAX_CONCURRENT_UPLOADS must be a positive number")
            })?,
            Err(_) => DEFAULT_MAX_CONCURRENT_UPLOADS,
        };
        if max_concurrent_uploads == 0 {
            return Err(anyhow::anyhow!(
                "COURIER_MAX_CONCURRENT_UPLOADS must be greater than 0"
            ));
        }

        let request_timeout_secs = env::var("COURIER_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);

        Ok(Self {
            api_url,
            max_concurrent_uploads,
            request_timeout: Duration::from_secs(request_timeout_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.api_url, "http://localhost:3000");
        assert_eq!(config.max_concurrent_uploads, 3);
        assert_eq!(config.request_timeout, Duration::from_secs(120));
    }
}
