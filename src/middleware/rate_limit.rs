use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};

use crate::{
    cache::{Cache, keys},
    config::Config,
    error::AppError,
};

#[derive(Clone)]
pub struct RateLimiter {
    cache: Arc<dyn Cache>,
    enabled: bool,
    max_requests: u64,
    window: Duration,
}

impl RateLimiter {
    pub fn new(cache: Arc<dyn Cache>, config: &Config) -> Self {
        Self {
            cache,
            enabled: config.rate_limit_enabled,
            max_requests: config.rate_limit_requests as u64,
            window: config.rate_limit_window(),
        }
    }

    pub async fn check_rate_limit(&self, req: Request, next: Next) -> Result<Response, AppError> {
        if !self.enabled {
            return Ok(next.run(req).await);
        }

        let ip = client_ip(&req);
        let key = keys::rate_limit_key(&ip);

        // Fail open on cache errors.
        let count = match self.cache.incr(&key, self.window).await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(error = %e, "rate limit counter unavailable");
                return Ok(next.run(req).await);
            }
        };

        if count > self.max_requests {
            tracing::info!(ip = %ip, count, "rate limit exceeded");
            return Err(AppError::RateLimited {
                window_secs: self.window.as_secs(),
            });
        }

        Ok(next.run(req).await)
    }
}

/// Client address from `x-real-ip`, then `x-forwarded-for`, then the socket.
fn client_ip(req: &Request) -> String {
    let remote_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string());

    req.headers()
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .filter(|s| !s.trim().is_empty())
        .or_else(|| {
            req.headers()
                .get("x-forwarded-for")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.split(',').find(|ip| !ip.trim().is_empty()))
        })
        .or(remote_ip.as_deref())
        .unwrap_or("unknown")
        .trim()
        .to_string()
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    limiter.check_rate_limit(req, next).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request(headers: &[(&str, &str)]) -> Request {
        let mut builder = axum::http::Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn prefers_real_ip() {
        let req = request(&[("x-real-ip", "10.0.0.1"), ("x-forwarded-for", "10.0.0.2")]);
        assert_eq!(client_ip(&req), "10.0.0.1");
    }

    #[test]
    fn takes_first_forwarded_hop() {
        let req = request(&[("x-forwarded-for", " 203.0.113.9 , 10.0.0.2")]);
        assert_eq!(client_ip(&req), "203.0.113.9");
    }

    #[test]
    fn falls_back_to_socket_then_unknown() {
        let mut req = request(&[]);
        assert_eq!(client_ip(&req), "unknown");

        let addr: SocketAddr = "192.0.2.7:4000".parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(addr));
        assert_eq!(client_ip(&req), "192.0.2.7");
    }
}
