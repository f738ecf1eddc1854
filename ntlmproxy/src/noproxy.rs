//! Wildcard host matcher routing matched hosts to a direct TCP connect,
//! bypassing the parent proxy entirely.

/// A single `*`-glob pattern over a hostname, e.g. `*.local` or
/// `intra.example.com`. Matching is case-insensitive.
#[derive(Debug, Clone)]
pub struct NoProxyPattern {
    pattern: String,
}

impl NoProxyPattern {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self { pattern: pattern.into().to_ascii_lowercase() }
    }

    pub(crate) fn matches(&self, host: &str) -> bool {
        glob_match(&self.pattern, &host.to_ascii_lowercase())
    }
}

/// Minimal `*`-only glob matcher: any number of `*` tokens, no `?` or
/// character classes, matching cntlm's NoProxy pattern language.
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern_bytes: Vec<&str> = pattern.split('*').collect();
    if pattern_bytes.len() == 1 {
        return pattern == text;
    }

    let mut cursor = text;
    for (i, segment) in pattern_bytes.iter().enumerate() {
        if segment.is_empty() {
            continue;
        }
        if i == 0 {
            if !cursor.starts_with(segment) {
                return false;
            }
            cursor = &cursor[segment.len()..];
        } else if i == pattern_bytes.len() - 1 {
            return cursor.ends_with(segment);
        } else {
            match cursor.find(segment) {
                Some(pos) => cursor = &cursor[pos + segment.len()..],
                None => return false,
            }
        }
    }
    true
}

#[derive(Debug, Clone, Default)]
pub struct NoProxyList {
    patterns: Vec<NoProxyPattern>,
}

impl NoProxyList {
    pub fn new(patterns: impl IntoIterator<Item = String>) -> Self {
        Self { patterns: patterns.into_iter().map(NoProxyPattern::new).collect() }
    }

    pub fn matches(&self, host: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(host))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_suffix_matches_subdomain() {
        let list = NoProxyList::new(["*.local".to_string()]);
        assert!(list.matches("intra.local"));
        assert!(!list.matches("intra.example.com"));
    }

    #[test]
    fn exact_pattern_matches_only_exact_host() {
        let list = NoProxyList::new(["intra.example.com".to_string()]);
        assert!(list.matches("intra.example.com"));
        assert!(!list.matches("other.example.com"));
    }

    #[test]
    fn matching_is_case_insensitive() {
        let list = NoProxyList::new(["*.LOCAL".to_string()]);
        assert!(list.matches("Intra.Local"));
    }

    #[test]
    fn empty_list_matches_nothing() {
        let list = NoProxyList::default();
        assert!(!list.matches("anything"));
    }
}
