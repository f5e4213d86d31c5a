//! Cross-cutting HTTP concerns: per-IP rate limiting and security headers.
//!
//! Authentication is deliberately not implemented here — it is an
//! external-collaborator concern (reverse proxy, API gateway) sitting in
//! front of this service, not part of the orchestrator itself.

use axum::{extract::Request, http::StatusCode, middleware::Next, response::Response};

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};

use std::{
    net::IpAddr,
    num::NonZeroU32,
    sync::{Arc, OnceLock},
};

use dashmap::DashMap;

type IpRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;
static RATE_LIMITERS: OnceLock<DashMap<IpAddr, IpRateLimiter>> = OnceLock::new();

fn get_rate_limiter_for_ip(ip: IpAddr) -> IpRateLimiter {
    let limiters = RATE_LIMITERS.get_or_init(DashMap::new);

    if let Some(limiter) = limiters.get(&ip) {
        Arc::clone(&limiter)
    } else {
        let quota = Quota::per_minute(NonZeroU32::new(100).unwrap());
        let limiter = Arc::new(RateLimiter::direct(quota));
        limiters.insert(ip, Arc::clone(&limiter));
        limiter
    }
}

fn extract_client_ip(request: &Request) -> IpAddr {
    if let Some(forwarded_for) = request.headers().get("x-forwarded-for") {
        if let Ok(forwarded_str) = forwarded_for.to_str() {
            if let Some(last_ip) = forwarded_str.split(',').next_back() {
                if let Ok(ip) = last_ip.trim().parse::<IpAddr>() {
                    return ip;
                }
            }
        }
    }

    if let Some(real_ip) = request.headers().get("x-real-ip") {
        if let Ok(real_ip_str) = real_ip.to_str() {
            if let Ok(ip) = real_ip_str.parse::<IpAddr>() {
                return ip;
            }
        }
    }

    "127.0.0.1".parse().unwrap()
}

/// Per-IP token-bucket rate limiting: 100 requests per minute, limiters
/// created on demand and kept in a process-wide concurrent map.
pub async fn rate_limit_middleware(request: Request, next: Next) -> Result<Response, StatusCode> {
    let client_ip = extract_client_ip(&request);
    let rate_limiter = get_rate_limiter_for_ip(client_ip);

    match rate_limiter.check() {
        Ok(_) => Ok(next.run(request).await),
        Err(_) => {
            tracing::warn!(ip = %client_ip, "rate limit exceeded");
            Err(StatusCode::TOO_MANY_REQUESTS)
        }
    }
}

/// Adds baseline hardening headers to every response.
pub async fn security_headers_middleware(request: Request, next: Next) -> Result<Response, StatusCode> {
    use axum::http::HeaderValue;

    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert("strict-transport-security", HeaderValue::from_static("max-age=63072000; includeSubDomains; preload"));
    headers.insert("x-content-type-options", HeaderValue::from_static("nosniff"));
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert("content-security-policy", HeaderValue::from_static("default-src 'self'; frame-ancestors 'none'"));

    Ok(response)
}
