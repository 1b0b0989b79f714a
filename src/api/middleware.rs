//! Security middleware for API authentication and rate limiting.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use std::{
    collections::HashMap,
    net::{IpAddr, Ipv4Addr},
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use crate::context::GUEST;

const DEFAULT_RATE_LIMIT: u32 = 100;

/// Security configuration loaded from environment variables.
#[derive(Clone, Debug, Default)]
pub struct SecurityConfig {
    /// Bearer token required on `/api/v1` (from STUDIO_API_KEY)
    pub api_key: Option<String>,
    /// Allowed CORS origins (from STUDIO_CORS_ORIGINS, comma-separated)
    pub cors_origins: Option<Vec<String>>,
    pub rate_limiter: Option<RateLimiter>,
    /// Principal for requests that name no user (from STUDIO_DEFAULT_USER)
    pub default_user: Option<String>,
    /// Whether `X-Studio-User` and `X-Studio-Permissions` are honoured (from
    /// STUDIO_TRUST_USER_HEADERS). Unset means trusted only without an API
    /// key; set it when a proxy that authenticates users fills the headers.
    pub trust_user_headers: Option<bool>,
}

impl SecurityConfig {
    /// Without an API key the server runs in local mode: no rate limit, and
    /// anonymous requests act as Administrator. With a key, anonymous
    /// requests act as Guest unless STUDIO_DEFAULT_USER says otherwise.
    pub fn from_env() -> Self {
        let api_key = std::env::var("STUDIO_API_KEY").ok().filter(|k| !k.is_empty());

        let cors_origins = std::env::var("STUDIO_CORS_ORIGINS")
            .ok()
            .map(|s| s.split(',').map(|s| s.trim().to_string()).collect());

        let rate_limit = std::env::var("STUDIO_RATE_LIMIT")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_RATE_LIMIT);

        let rate_limiter = api_key
            .as_ref()
            .map(|_| RateLimiter::new(rate_limit, Duration::from_secs(60)));

        let default_user = std::env::var("STUDIO_DEFAULT_USER")
            .ok()
            .filter(|u| !u.is_empty())
            .or_else(|| api_key.as_ref().map(|_| GUEST.to_string()));

        let trust_user_headers = std::env::var("STUDIO_TRUST_USER_HEADERS")
            .ok()
            .and_then(|v| match v.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => Some(true),
                "0" | "false" | "no" => Some(false),
                _ => None,
            });

        Self {
            api_key,
            cors_origins,
            rate_limiter,
            default_user,
            trust_user_headers,
        }
    }

    pub fn user_headers_trusted(&self) -> bool {
        self.trust_user_headers.unwrap_or(self.api_key.is_none())
    }

    /// No authentication (local development and tests).
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Requires `key`; anonymous requests act as Guest.
    pub fn with_api_key(key: impl Into<String>) -> Self {
        Self {
            api_key: Some(key.into()),
            default_user: Some(GUEST.to_string()),
            ..Self::default()
        }
    }

    pub fn with_rate_limit(max_requests: u32) -> Self {
        Self {
            rate_limiter: Some(RateLimiter::new(max_requests, Duration::from_secs(60))),
            ..Self::default()
        }
    }

    pub fn with_default_user(mut self, user: impl Into<String>) -> Self {
        self.default_user = Some(user.into());
        self
    }

    pub fn with_trusted_user_headers(mut self, trusted: bool) -> Self {
        self.trust_user_headers = Some(trusted);
        self
    }
}

/// In-memory per-IP sliding-window rate limiter.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    requests: Arc<Mutex<HashMap<IpAddr, Vec<Instant>>>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            requests: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Records a request from `ip`. Returns false when over the limit.
    pub fn check(&self, ip: IpAddr) -> bool {
        let now = Instant::now();
        let cutoff = now.checked_sub(self.window).unwrap_or(now);

        let mut requests = self.requests.lock().expect("rate limiter lock poisoned");
        let entry = requests.entry(ip).or_default();
        entry.retain(|&t| t > cutoff);

        if entry.len() < self.max_requests as usize {
            entry.push(now);
            true
        } else {
            false
        }
    }

    /// Drops IPs with no requests inside the window.
    pub fn cleanup(&self) {
        let now = Instant::now();
        let cutoff = now.checked_sub(self.window).unwrap_or(now);
        let mut requests = self.requests.lock().expect("rate limiter lock poisoned");

        requests.retain(|_, timestamps| {
            timestamps.retain(|&t| t > cutoff);
            !timestamps.is_empty()
        });
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    fn tracked_ips(&self) -> usize {
        self.requests.lock().expect("rate limiter lock poisoned").len()
    }
}

pub async fn auth_middleware(
    State(config): State<SecurityConfig>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected_key) = config.api_key.as_deref() else {
        return Ok(next.run(request).await);
    };

    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok());

    match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) if token == expected_key => Ok(next.run(request).await),
        Some(_) => {
            tracing::warn!("Invalid API key provided");
            Err(StatusCode::UNAUTHORIZED)
        }
        None => {
            tracing::warn!("Missing or malformed Authorization header");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

pub async fn rate_limit_middleware(
    State(rate_limiter): State<RateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let ip = extract_client_ip(&request);

    if rate_limiter.check(ip) {
        Ok(next.run(request).await)
    } else {
        tracing::warn!("Rate limit exceeded for IP: {}", ip);
        Err(StatusCode::TOO_MANY_REQUESTS)
    }
}

/// Client IP from proxy headers, else localhost.
fn extract_client_ip(request: &Request<Body>) -> IpAddr {
    let header = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
    };

    header("X-Forwarded-For")
        .and_then(|value| value.split(',').next())
        .or_else(|| header("X-Real-IP"))
        .and_then(|ip| ip.trim().parse().ok())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}
