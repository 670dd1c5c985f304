//! Service configuration.
//!
//! Everything comes from the environment and is read once at startup.
//! The token store defaults to `~/.garminconnect`, the same place the
//! provider's own tooling keeps its tokens.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::auth::token_store::expand_home;

/// Token store path
pub const ENV_TOKEN_STORE: &str = "GARMINTOKENS";
/// Listen address, e.g. `127.0.0.1:8080`
pub const ENV_BIND_ADDR: &str = "FITGATE_BIND_ADDR";
/// `*` or a comma-separated list of allowed origins
pub const ENV_CORS_ORIGINS: &str = "FITGATE_CORS_ORIGINS";
/// Provider domain (`garmin.com`, or `garmin.cn` for China accounts)
pub const ENV_PROVIDER_DOMAIN: &str = "GARMIN_DOMAIN";
/// Timeout for each provider request, in seconds
pub const ENV_REQUEST_TIMEOUT: &str = "FITGATE_REQUEST_TIMEOUT_SECS";
/// Where the OAuth consumer key/secret document is fetched from
pub const ENV_OAUTH_CONSUMER_URL: &str = "GARMIN_OAUTH_CONSUMER_URL";

const DEFAULT_TOKEN_STORE: &str = "~/.garminconnect";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";
const DEFAULT_PROVIDER_DOMAIN: &str = "garmin.com";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_OAUTH_CONSUMER_URL: &str = "https://thegarth.s3.amazonaws.com/oauth_consumer.json";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} is not a valid socket address: {value}")]
    InvalidBindAddr { var: &'static str, value: String },

    #[error("{var} must be a positive number of seconds, got {value}")]
    InvalidTimeout { var: &'static str, value: String },
}

/// Which origins may call the service from a browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsOrigins {
    Any,
    List(Vec<String>),
}

impl CorsOrigins {
    fn parse(raw: &str) -> Self {
        let origins: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(String::from)
            .collect();
        if origins.is_empty() || origins.iter().any(|o| o == "*") {
            CorsOrigins::Any
        } else {
            CorsOrigins::List(origins)
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub token_store: PathBuf,
    pub bind_addr: SocketAddr,
    pub cors_origins: CorsOrigins,
    pub provider_domain: String,
    pub request_timeout: Duration,
    pub oauth_consumer_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            token_store: expand_home(DEFAULT_TOKEN_STORE),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            cors_origins: CorsOrigins::Any,
            provider_domain: DEFAULT_PROVIDER_DOMAIN.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            oauth_consumer_url: DEFAULT_OAUTH_CONSUMER_URL.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable lookup. Unset and blank variables
    /// take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let token_store = expand_home(
            get(ENV_TOKEN_STORE)
                .as_deref()
                .unwrap_or(DEFAULT_TOKEN_STORE)
                .trim(),
        );

        let bind_raw = get(ENV_BIND_ADDR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw
            .trim()
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidBindAddr {
                var: ENV_BIND_ADDR,
                value: bind_raw.clone(),
            })?;

        let cors_origins = get(ENV_CORS_ORIGINS)
            .map(|raw| CorsOrigins::parse(&raw))
            .unwrap_or(CorsOrigins::Any);

        let provider_domain = get(ENV_PROVIDER_DOMAIN)
            .map(|d| d.trim().to_string())
            .unwrap_or_else(|| DEFAULT_PROVIDER_DOMAIN.to_string());

        let request_timeout = match get(ENV_REQUEST_TIMEOUT) {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::InvalidTimeout {
                        var: ENV_REQUEST_TIMEOUT,
                        value: raw,
                    })
                }
            },
            None => Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        };

        let oauth_consumer_url = get(ENV_OAUTH_CONSUMER_URL)
            .map(|u| u.trim().to_string())
            .unwrap_or_else(|| DEFAULT_OAUTH_CONSUMER_URL.to_string());

        Ok(Self {
            token_store,
            bind_addr,
            cors_origins,
            provider_domain,
            request_timeout,
            oauth_consumer_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).expect("defaults are valid");
        assert_eq!(config.bind_addr, "0.0.0.0:5000".parse::<SocketAddr>().expect("addr"));
        assert_eq!(config.cors_origins, CorsOrigins::Any);
        assert_eq!(config.provider_domain, "garmin.com");
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert!(config.token_store.ends_with(".garminconnect"));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            (ENV_TOKEN_STORE, "/var/lib/fitgate/tokens"),
            (ENV_BIND_ADDR, "127.0.0.1:8080"),
            (ENV_CORS_ORIGINS, "http://localhost:3000, https://app.example.com"),
            (ENV_PROVIDER_DOMAIN, "garmin.cn"),
            (ENV_REQUEST_TIMEOUT, "30"),
        ]))
        .expect("valid overrides");

        assert_eq!(config.token_store, PathBuf::from("/var/lib/fitgate/tokens"));
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(
            config.cors_origins,
            CorsOrigins::List(vec![
                "http://localhost:3000".to_string(),
                "https://app.example.com".to_string()
            ])
        );
        assert_eq!(config.provider_domain, "garmin.cn");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let config = Config::from_lookup(lookup(&[(ENV_TOKEN_STORE, "  "), (ENV_CORS_ORIGINS, "")]))
            .expect("blank values are ignored");
        assert!(config.token_store.ends_with(".garminconnect"));
        assert_eq!(config.cors_origins, CorsOrigins::Any);
    }

    #[test]
    fn test_invalid_values_name_the_variable() {
        let err = Config::from_lookup(lookup(&[(ENV_BIND_ADDR, "not-an-addr")]))
            .err()
            .expect("bad addr");
        assert!(err.to_string().contains(ENV_BIND_ADDR));

        let err = Config::from_lookup(lookup(&[(ENV_REQUEST_TIMEOUT, "0")]))
            .err()
            .expect("zero timeout");
        assert!(err.to_string().contains(ENV_REQUEST_TIMEOUT));
    }

    #[test]
    fn test_wildcard_in_list_allows_any() {
        assert_eq!(CorsOrigins::parse("http://a.test,*"), CorsOrigins::Any);
    }
}
