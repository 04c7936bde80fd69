use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request, StatusCode};
use ipnetwork::IpNetwork;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use tower_governor::GovernorError;
use tower_governor::key_extractor::KeyExtractor;
use tracing::warn;

/// Governor bucket a route belongs to. Credential endpoints (register, login, refresh)
/// hash passwords or mint tokens and get their own, stricter bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitTier {
    Auth,
    Standard,
}

impl RateLimitTier {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Standard => "standard",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Throttled,
}

impl RateLimitDecision {
    #[must_use]
    pub fn from_status(status: StatusCode) -> Self {
        if status == StatusCode::TOO_MANY_REQUESTS { Self::Throttled } else { Self::Allowed }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Allowed => "allowed",
            Self::Throttled => "throttled",
        }
    }
}

fn decision_attributes(tier: RateLimitTier, decision: RateLimitDecision) -> [KeyValue; 2] {
    [KeyValue::new("tier", tier.as_str()), KeyValue::new("decision", decision.as_str())]
}

#[derive(Clone)]
struct LimiterMetrics {
    decisions: Counter<u64>,
}

impl LimiterMetrics {
    fn new() -> Self {
        let meter = global::meter("vidagent-server");
        Self {
            decisions: meter
                .u64_counter("vidagent_rate_limit_decisions_total")
                .with_description("Rate limiter decisions by tier")
                .build(),
        }
    }
}

/// Keys limiter buckets by client IP. `X-Forwarded-For` is only consulted when the
/// peer is a trusted proxy; the rightmost untrusted hop is the client.
#[derive(Clone, Debug)]
pub struct IpKeyExtractor {
    trusted_proxies: Vec<IpNetwork>,
}

impl IpKeyExtractor {
    #[must_use]
    pub fn new(trusted_proxies: Vec<IpNetwork>) -> Self {
        Self { trusted_proxies }
    }

    #[must_use]
    pub fn identify_client_ip(&self, headers: &HeaderMap, peer: IpAddr) -> IpAddr {
        if !self.is_trusted(peer) {
            return peer;
        }

        headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|chain| {
                chain.rsplit(',').filter_map(|hop| hop.trim().parse::<IpAddr>().ok()).find(|ip| !self.is_trusted(*ip))
            })
            .unwrap_or(peer)
    }

    fn is_trusted(&self, ip: IpAddr) -> bool {
        self.trusted_proxies.iter().any(|net| net.contains(ip))
    }
}

impl KeyExtractor for IpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        let ConnectInfo(peer) =
            req.extensions().get::<ConnectInfo<SocketAddr>>().ok_or(GovernorError::UnableToExtractKey)?;
        Ok(self.identify_client_ip(req.headers(), peer.ip()))
    }
}

#[derive(Clone)]
pub struct RateLimitService {
    pub extractor: IpKeyExtractor,
    metrics: LimiterMetrics,
}

impl fmt::Debug for RateLimitService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimitService").field("extractor", &self.extractor).finish_non_exhaustive()
    }
}

impl RateLimitService {
    #[must_use]
    pub fn new(trusted_proxies: Vec<IpNetwork>) -> Self {
        Self { extractor: IpKeyExtractor::new(trusted_proxies), metrics: LimiterMetrics::new() }
    }

    /// Counts the limiter outcome of a finished request against its tier.
    pub fn record(&self, tier: RateLimitTier, status: StatusCode, retry_after: Option<&str>) -> RateLimitDecision {
        let decision = RateLimitDecision::from_status(status);
        if decision == RateLimitDecision::Throttled {
            warn!(tier = tier.as_str(), retry_after_secs = retry_after.unwrap_or("unknown"), "Rate limit exceeded");
        }
        self.metrics.decisions.add(1, &decision_attributes(tier, decision));
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> IpKeyExtractor {
        IpKeyExtractor::new(vec!["10.0.0.0/8".parse().unwrap(), "127.0.0.1/32".parse().unwrap()])
    }

    #[test]
    fn test_untrusted_peer_ignores_forwarded_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "1.2.3.4".parse().unwrap());

        let peer: IpAddr = "8.8.8.8".parse().unwrap();
        assert_eq!(extractor().identify_client_ip(&headers, peer), peer);
    }

    #[test]
    fn test_trusted_proxy_chain_resolves_client() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.1.2.3".parse().unwrap());

        let peer: IpAddr = "127.0.0.1".parse().unwrap();
        let expected: IpAddr = "203.0.113.7".parse().unwrap();
        assert_eq!(extractor().identify_client_ip(&headers, peer), expected);
    }

    #[test]
    fn test_missing_header_falls_back_to_peer() {
        let peer: IpAddr = "10.0.0.9".parse().unwrap();
        assert_eq!(extractor().identify_client_ip(&HeaderMap::new(), peer), peer);
    }

    #[test]
    fn test_fully_trusted_chain_falls_back_to_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "10.0.0.1, garbage, 10.0.0.2".parse().unwrap());

        let peer: IpAddr = "127.0.0.1".parse().unwrap();
        assert_eq!(extractor().identify_client_ip(&headers, peer), peer);
    }

    #[test]
    fn test_decisions_are_labelled_by_tier() {
        let service = RateLimitService::new(Vec::new());

        assert_eq!(
            service.record(RateLimitTier::Auth, StatusCode::TOO_MANY_REQUESTS, Some("3")),
            RateLimitDecision::Throttled
        );
        assert_eq!(service.record(RateLimitTier::Standard, StatusCode::UNAUTHORIZED, None), RateLimitDecision::Allowed);

        assert_eq!(
            decision_attributes(RateLimitTier::Auth, RateLimitDecision::Throttled),
            [KeyValue::new("tier", "auth"), KeyValue::new("decision", "throttled")]
        );
        assert_eq!(
            decision_attributes(RateLimitTier::Standard, RateLimitDecision::Allowed),
            [KeyValue::new("tier", "standard"), KeyValue::new("decision", "allowed")]
        );
    }
}
