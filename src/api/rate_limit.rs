//! Per-client token bucket in front of `/api`.
//!
//! Every client IP gets a bucket of `burst` tokens refilled at
//! `per_second`. Requests presenting the configured service token skip the
//! bucket entirely. Idle buckets are dropped by the maintenance loop.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;
use tokio::time::Instant;

use super::{ApiError, AppState};
use crate::config::ServerConfig;
use crate::constants::headers;

const MAX_VISITORS: usize = 9999;

const CROWDED_IDLE: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: f64,
    refilled_at: Instant,
    last_seen: Instant,
}

pub struct IpRateLimiter {
    per_second: f64,
    burst: f64,
    visitors: Mutex<HashMap<String, Bucket>>,
}

impl IpRateLimiter {
    #[must_use]
    pub fn new(per_second: u32, burst: u32) -> Self {
        Self {
            per_second: f64::from(per_second.max(1)),
            burst: f64::from(burst.max(1)),
            visitors: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(config.rate_limit_per_second, config.rate_limit_burst)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Bucket>> {
        self.visitors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Takes one token for `client`, returning false when its bucket is empty.
    pub fn check(&self, client: &str) -> bool {
        let now = Instant::now();
        let mut visitors = self.lock();

        if !visitors.contains_key(client) && visitors.len() >= MAX_VISITORS {
            visitors.retain(|_, bucket| now.duration_since(bucket.last_seen) < CROWDED_IDLE);
            if visitors.len() >= MAX_VISITORS {
                // Table full of active clients: a fresh bucket would hold a token.
                return true;
            }
        }

        let bucket = visitors.entry(client.to_string()).or_insert(Bucket {
            tokens: self.burst,
            refilled_at: now,
            last_seen: now,
        });

        let elapsed = now.duration_since(bucket.refilled_at).as_secs_f64();
        bucket.tokens = elapsed.mul_add(self.per_second, bucket.tokens).min(self.burst);
        bucket.refilled_at = now;
        bucket.last_seen = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Drops clients not seen for `idle`, returning how many were removed.
    pub fn retain_recent(&self, idle: Duration) -> usize {
        let mut visitors = self.lock();
        let before = visitors.len();
        visitors.retain(|_, bucket| bucket.last_seen.elapsed() < idle);
        before - visitors.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// True when `presented` equals the configured service token. An empty
/// configured token never matches.
#[must_use]
pub fn is_service_request(configured: &str, presented: Option<&str>) -> bool {
    if configured.is_empty() {
        return false;
    }
    presented.is_some_and(|token| bool::from(token.as_bytes().ct_eq(configured.as_bytes())))
}

/// Resolves the client address. Forwarded headers are honoured only when the
/// socket peer is a trusted proxy.
#[must_use]
pub fn client_ip(peer: Option<IpAddr>, headers: &HeaderMap, trusted_proxies: &[String]) -> String {
    let Some(peer) = peer else {
        return "unknown".to_string();
    };

    let trusted = trusted_proxies
        .iter()
        .filter_map(|ip| ip.trim().parse::<IpAddr>().ok())
        .any(|ip| ip == peer);

    if trusted {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| v.parse::<IpAddr>().is_ok());

        let real_ip = headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| v.parse::<IpAddr>().is_ok());

        if let Some(ip) = forwarded.or(real_ip) {
            return ip.to_string();
        }
    }

    peer.to_string()
}

pub async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let server = &state.shared.config.server;

    let presented = req
        .headers()
        .get(headers::SERVICE_TOKEN)
        .and_then(|v| v.to_str().ok());
    if is_service_request(&server.service_token, presented) {
        return next.run(req).await;
    }

    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let ip = client_ip(peer, req.headers(), &server.trusted_proxy_ips);

    if !state.shared.rate_limiter.check(&ip) {
        tracing::warn!(client_ip = %ip, "Rate limit exceeded");
        metrics::counter!("rate_limit_rejections_total").increment(1);
        return ApiError::RateLimited("Too many requests".to_string()).into_response();
    }

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[tokio::test(start_paused = true)]
    async fn test_burst_then_refill() {
        let limiter = IpRateLimiter::new(3, 9);
        for _ in 0..9 {
            assert!(limiter.check("1.2.3.4"));
        }
        assert!(!limiter.check("1.2.3.4"));
        assert!(limiter.check("5.6.7.8"));

        tokio::time::advance(Duration::from_millis(340)).await;
        assert!(limiter.check("1.2.3.4"));
        assert!(!limiter.check("1.2.3.4"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retain_recent_drops_idle_clients() {
        let limiter = IpRateLimiter::new(3, 9);
        limiter.check("idle");
        tokio::time::advance(Duration::from_secs(301)).await;
        limiter.check("active");

        assert_eq!(limiter.retain_recent(Duration::from_secs(300)), 1);
        assert_eq!(limiter.len(), 1);
    }

    #[test]
    fn test_service_token_bypass() {
        assert!(is_service_request("secret", Some("secret")));
        assert!(!is_service_request("secret", Some("secreT")));
        assert!(!is_service_request("secret", None));
        assert!(!is_service_request("", Some("")));
    }

    #[test]
    fn test_forwarded_headers_need_trusted_peer() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        let proxy: IpAddr = "10.0.0.2".parse().unwrap();

        assert_eq!(client_ip(Some(proxy), &headers, &[]), "10.0.0.2");
        assert_eq!(
            client_ip(Some(proxy), &headers, &["10.0.0.2".to_string()]),
            "203.0.113.7"
        );
        assert_eq!(client_ip(None, &headers, &[]), "unknown");
    }
}
