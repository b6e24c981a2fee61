//! HTTP API handlers for dhub-api

use axum::http::HeaderMap;

pub mod accounts;
pub mod agency;
pub mod auth;
pub mod billing;
pub mod health;
pub mod letters;
pub mod notifications;
pub mod reports;
pub mod users;

pub use auth::auth_middleware;
pub use health::health_routes;

/// Best-effort client IP for rate limiting: first hop of X-Forwarded-For,
/// else X-Real-IP, else a sentinel. All unidentifiable clients share one
/// bucket, which errs on the strict side.
pub fn client_ip(headers: &HeaderMap) -> String {
    if let Some(forwarded) = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip").and_then(|value| value.to_str().ok()) {
        if !real_ip.trim().is_empty() {
            return real_ip.trim().to_string();
        }
    }

    "unknown".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn forwarded_for_takes_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        assert_eq!(client_ip(&headers), "203.0.113.9");
    }

    #[test]
    fn real_ip_is_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.7"));
        assert_eq!(client_ip(&headers), "198.51.100.7");
    }

    #[test]
    fn missing_headers_share_a_bucket() {
        assert_eq!(client_ip(&HeaderMap::new()), "unknown");
    }
}
