use std::{convert::Infallible, net::SocketAddr};

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, request::Parts},
};

const FALLBACK_IP: &str = "127.0.0.1";

/// Address of the end customer, as seen through any reverse proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(ClientIp(resolve(&parts.headers, peer)))
    }
}

/// First `X-Forwarded-For` hop, then `X-Real-IP`, then the socket peer.
pub fn resolve(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    if let Some(first) = header("x-forwarded-for")
        .and_then(|list| list.split(',').next())
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
    {
        return first.to_string();
    }
    if let Some(real) = header("x-real-ip") {
        return real.to_string();
    }
    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| FALLBACK_IP.to_string())
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn forwarded_for_wins_over_everything() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.2"));
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.1"));
        let peer = "10.0.0.9:4000".parse().ok();
        assert_eq!(resolve(&headers, peer), "203.0.113.7");
    }

    #[test]
    fn falls_back_to_real_ip_then_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.1"));
        assert_eq!(resolve(&headers, None), "198.51.100.1");

        let peer = "192.0.2.4:5123".parse().ok();
        assert_eq!(resolve(&HeaderMap::new(), peer), "192.0.2.4");
        assert_eq!(resolve(&HeaderMap::new(), None), FALLBACK_IP);
    }
}
