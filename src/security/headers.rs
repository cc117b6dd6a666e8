//! Client identification from connection and forwarding headers.
//!
//! # Responsibilities
//! - Derive the client key used to bucket rate-limit counters
//! - Honor X-Forwarded-For only from trusted proxies
//!
//! # Design Decisions
//! - Never trust existing X-Forwarded-* from untrusted sources
//! - Configurable trusted proxy list for header trust

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use crate::config::RateLimitConfig;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Identifier of the caller, attached to every request as an extension.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientKey(pub String);

impl ClientKey {
    pub fn unknown() -> Self {
        ClientKey("unknown".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which peers may speak for the client through `X-Forwarded-For`.
#[derive(Debug, Clone, Default)]
pub struct ForwardedPolicy {
    trust_forwarded_for: bool,
    trusted_proxies: Vec<IpAddr>,
}

impl ForwardedPolicy {
    pub fn new(trust_forwarded_for: bool, trusted_proxies: Vec<IpAddr>) -> Self {
        Self {
            trust_forwarded_for,
            trusted_proxies,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.trust_forwarded_for, config.trusted_proxies.clone())
    }

    fn trusts(&self, peer: IpAddr) -> bool {
        self.trust_forwarded_for
            && (self.trusted_proxies.is_empty() || self.trusted_proxies.contains(&peer))
    }

    /// Resolve the client address for a request from `peer`.
    pub fn client_ip(&self, headers: &HeaderMap, peer: IpAddr) -> IpAddr {
        if !self.trusts(peer) {
            return peer;
        }

        headers
            .get(X_FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').find_map(parse_forwarded_addr))
            .unwrap_or(peer)
    }
}

fn parse_forwarded_addr(entry: &str) -> Option<IpAddr> {
    let entry = entry.trim();
    entry
        .parse::<IpAddr>()
        .ok()
        .or_else(|| entry.parse::<SocketAddr>().ok().map(|s| s.ip()))
}

/// Attach a [`ClientKey`] to the request for the limiters and handlers.
pub async fn client_key_middleware(
    State(policy): State<Arc<ForwardedPolicy>>,
    mut request: Request,
    next: Next,
) -> Response {
    let key = match request.extensions().get::<ConnectInfo<SocketAddr>>() {
        Some(ConnectInfo(peer)) => {
            ClientKey(policy.client_ip(request.headers(), peer.ip()).to_string())
        }
        None => ClientKey::unknown(),
    };

    request.extensions_mut().insert(key);
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn forwarded(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_peer_address_by_default() {
        let policy = ForwardedPolicy::default();
        let peer: IpAddr = "10.0.0.7".parse().unwrap();
        assert_eq!(policy.client_ip(&forwarded("203.0.113.9"), peer), peer);
    }

    #[test]
    fn test_forwarded_for_from_any_peer_when_list_empty() {
        let policy = ForwardedPolicy::new(true, Vec::new());
        let peer: IpAddr = "10.0.0.7".parse().unwrap();
        assert_eq!(
            policy.client_ip(&forwarded("203.0.113.9, 10.0.0.1"), peer),
            "203.0.113.9".parse::<IpAddr>().unwrap()
        );
    }

    #[test]
    fn test_forwarded_for_ignored_from_untrusted_peer() {
        let proxy: IpAddr = "10.0.0.1".parse().unwrap();
        let policy = ForwardedPolicy::new(true, vec![proxy]);

        let stranger: IpAddr = "198.51.100.4".parse().unwrap();
        assert_eq!(policy.client_ip(&forwarded("203.0.113.9"), stranger), stranger);
        assert_eq!(
            policy.client_ip(&forwarded("203.0.113.9"), proxy),
            "203.0.113.9".parse::<IpAddr>().unwrap()
        );
    }

    #[test]
    fn test_garbage_forwarded_for_falls_back_to_peer() {
        let policy = ForwardedPolicy::new(true, Vec::new());
        let peer: IpAddr = "10.0.0.7".parse().unwrap();
        assert_eq!(policy.client_ip(&forwarded("unknown, nonsense"), peer), peer);
        assert_eq!(
            policy.client_ip(&forwarded("bogus, 203.0.113.9:5000"), peer),
            "203.0.113.9".parse::<IpAddr>().unwrap()
        );
        assert_eq!(policy.client_ip(&HeaderMap::new(), peer), peer);
    }
}
