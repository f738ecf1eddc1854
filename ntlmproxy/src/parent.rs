//! Parent proxy selection: a sticky round-robin list, or a per-request
//! list computed from a PAC verdict.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::model::{ParentKind, ParentProxy};

/// An ordered list of parents, remembering the last index that
/// succeeded so the next request tries it first. On failure the caller
/// calls `advance` to move to the next entry; after a full rotation
/// without success the caller treats the request as unroutable.
pub struct ParentSelector {
    parents: Vec<ParentProxy>,
    sticky_index: AtomicUsize,
}

impl ParentSelector {
    pub fn new(parents: Vec<ParentProxy>) -> Self {
        Self { parents, sticky_index: AtomicUsize::new(0) }
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    /// Returns an iterator starting at the sticky index and wrapping
    /// around, paired with its absolute index in the list (needed by
    /// `advance_from` / `record_success`).
    pub fn rotation(&self) -> impl Iterator<Item = (usize, &ParentProxy)> {
        let start = self.sticky_index.load(Ordering::Relaxed) % self.parents.len().max(1);
        let n = self.parents.len();
        (0..n).map(move |i| {
            let idx = (start + i) % n;
            (idx, &self.parents[idx])
        })
    }

    pub fn record_success(&self, index: usize) {
        self.sticky_index.store(index, Ordering::Relaxed);
    }

    pub fn get(&self, index: usize) -> &ParentProxy {
        &self.parents[index]
    }
}

/// Parses a PAC verdict string (semicolon-separated `PROXY host:port` or
/// `DIRECT` tokens) into an ordered parent list. Unrecognized token kinds
/// (`SOCKS`, `HTTPS`, ...) are silently skipped, matching the upstream
/// behavior this proxy preserves rather than extends.
pub fn parse_pac_verdict(verdict: &str) -> Vec<ParentProxy> {
    verdict
        .split(';')
        .filter_map(|token| {
            let token = token.trim();
            if token.eq_ignore_ascii_case("DIRECT") {
                return Some(ParentProxy::direct());
            }
            let rest = token.strip_prefix("PROXY ")?;
            let (host, port_str) = rest.trim().rsplit_once(':')?;
            let port: u16 = port_str.parse().ok()?;
            Some(ParentProxy::proxy(host, port))
        })
        .collect()
}

impl ParentProxy {
    pub fn describe(&self) -> String {
        match &self.kind {
            ParentKind::Proxy { host, port } => format!("{host}:{port}"),
            ParentKind::Direct => "DIRECT".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_starts_at_sticky_index() {
        let selector = ParentSelector::new(vec![
            ParentProxy::proxy("a", 1),
            ParentProxy::proxy("b", 2),
            ParentProxy::proxy("c", 3),
        ]);
        selector.record_success(1);
        let order: Vec<usize> = selector.rotation().map(|(i, _)| i).collect();
        assert_eq!(order, vec![1, 2, 0]);
    }

    #[test]
    fn parses_mixed_pac_verdict() {
        let parents = parse_pac_verdict("PROXY proxy1.example.com:8080; PROXY proxy2.example.com:3128; DIRECT");
        assert_eq!(parents.len(), 3);
        assert_eq!(parents[0].describe(), "proxy1.example.com:8080");
        assert!(parents[2].is_direct());
    }

    #[test]
    fn unrecognized_tokens_are_skipped() {
        let parents = parse_pac_verdict("SOCKS proxy1.example.com:1080; DIRECT");
        assert_eq!(parents.len(), 1);
        assert!(parents[0].is_direct());
    }
}
