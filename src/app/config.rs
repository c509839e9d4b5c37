use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub primary_provider_url: String,
    pub fallback_provider_url: String,
    pub http: HttpConfig,
    pub retry: RetryConfig,
    pub circuit_breaker: CircuitBreakerConfig,
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub attempts: u32,
    pub delay_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub max_requests: u32,
    pub interval_seconds: u64,
    pub timeout_seconds: u64,
    pub min_requests: u32,
    pub failure_ratio: f64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            server_port: env_or("SERVER_PORT", 8080),
            primary_provider_url: env::var("PRIMARY_PROVIDER_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:3001".to_string()),
            fallback_provider_url: env::var("FALLBACK_PROVIDER_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:3002".to_string()),
            http: HttpConfig {
                timeout_seconds: env_or("HTTP_TIMEOUT_SECONDS", 10),
            },
            retry: RetryConfig {
                attempts: env_or("RETRY_ATTEMPTS", 3),
                delay_seconds: env_or("RETRY_DELAY_SECONDS", 1),
            },
            circuit_breaker: CircuitBreakerConfig {
                max_requests: env_or("CIRCUIT_BREAKER_MAX_REQUESTS", 3),
                interval_seconds: env_or("CIRCUIT_BREAKER_INTERVAL_SECONDS", 10),
                timeout_seconds: env_or("CIRCUIT_BREAKER_TIMEOUT_SECONDS", 30),
                min_requests: env_or("CIRCUIT_BREAKER_MIN_REQUESTS", 3),
                failure_ratio: env_or("CIRCUIT_BREAKER_FAILURE_RATIO", 0.6),
            },
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_seconds)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry.delay_seconds)
    }

    pub fn circuit_breaker_interval(&self) -> Duration {
        Duration::from_secs(self.circuit_breaker.interval_seconds)
    }

    pub fn circuit_breaker_timeout(&self) -> Duration {
        Duration::from_secs(self.circuit_breaker.timeout_seconds)
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}
