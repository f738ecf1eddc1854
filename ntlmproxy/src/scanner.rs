//! The "ISA scanner" compatibility hook: a narrow escape hatch for one
//! upstream content-scanner behavior that otherwise breaks streaming
//! responses, not a general content-inspection feature.

use crate::model::ResponseRecord;
use crate::noproxy::NoProxyPattern;

#[derive(Debug, Clone, Default)]
pub struct ScannerConfig {
    user_agents: Vec<NoProxyPattern>,
    max_prefetch_bytes: u64,
}

impl ScannerConfig {
    pub fn new(user_agent_patterns: impl IntoIterator<Item = String>, max_prefetch_bytes: u64) -> Self {
        Self {
            user_agents: user_agent_patterns.into_iter().map(NoProxyPattern::new).collect(),
            max_prefetch_bytes,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.user_agents.is_empty()
    }

    fn matches_user_agent(&self, user_agent: &str) -> bool {
        self.user_agents.iter().any(|p| p.matches(user_agent))
    }

    /// True when this request/response pair should be fully buffered
    /// before the client sees headers: the configured User-Agent sent
    /// the request, and the response body is small enough to prefetch
    /// synchronously without stalling the client noticeably.
    pub fn should_prefetch(&self, request_user_agent: Option<&str>, response: &ResponseRecord) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let Some(ua) = request_user_agent else { return false };
        if !self.matches_user_agent(ua) {
            return false;
        }
        match response.headers.get("Content-Length").and_then(|v| v.parse::<u64>().ok()) {
            Some(len) => len <= self.max_prefetch_bytes,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BodyFraming, HttpVersion};
    use crate::util::headers::HeaderMap;

    fn response_with_length(len: &str) -> ResponseRecord {
        let mut headers = HeaderMap::new();
        headers.push("Content-Length", len);
        ResponseRecord {
            version: HttpVersion::Http11,
            status: 200,
            reason: "OK".into(),
            headers,
            framing: BodyFraming::Length(len.parse().unwrap_or(0)),
        }
    }

    #[test]
    fn disabled_scanner_never_prefetches() {
        let scanner = ScannerConfig::default();
        assert!(!scanner.should_prefetch(Some("ISA-Scanner/1.0"), &response_with_length("10")));
    }

    #[test]
    fn matches_configured_agent_under_threshold() {
        let scanner = ScannerConfig::new(["ISA-Scanner*".to_string()], 1024);
        assert!(scanner.should_prefetch(Some("ISA-Scanner/1.0"), &response_with_length("512")));
    }

    #[test]
    fn rejects_over_threshold_response() {
        let scanner = ScannerConfig::new(["ISA-Scanner*".to_string()], 1024);
        assert!(!scanner.should_prefetch(Some("ISA-Scanner/1.0"), &response_with_length("2048")));
    }

    #[test]
    fn non_matching_agent_is_skipped() {
        let scanner = ScannerConfig::new(["ISA-Scanner*".to_string()], 1024);
        assert!(!scanner.should_prefetch(Some("curl/8.0"), &response_with_length("10")));
    }
}
