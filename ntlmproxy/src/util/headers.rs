//! Case-insensitive, order-preserving, duplicate-tolerant header map.
//! Insertion order is preserved so headers round-trip unchanged when a
//! request or response is forwarded unmodified.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Removes every entry with `name` (case-insensitive) and inserts one
    /// fresh entry at the end. Used for operator header substitutions.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.remove(&name);
        self.push(name, value);
    }

    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> {
        self.entries
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The hop-by-hop headers HTTP/1.1 defines as connection-scoped;
    /// stripped before forwarding to the next hop.
    pub fn strip_hop_by_hop(&mut self) {
        const HOP_BY_HOP: &[&str] = &[
            "Connection",
            "Proxy-Connection",
            "Keep-Alive",
            "Proxy-Authorization",
            "Proxy-Authenticate",
            "TE",
            "Trailers",
            "Transfer-Encoding",
            "Upgrade",
        ];
        for name in HOP_BY_HOP {
            self.remove(name);
        }
    }

    /// Serializes as `Name: value\r\n` lines, no trailing blank line.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        for (name, value) in &self.entries {
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let mut h = HeaderMap::new();
        h.push("Content-Length", "42");
        assert_eq!(h.get("content-length"), Some("42"));
        assert_eq!(h.get("CONTENT-LENGTH"), Some("42"));
    }

    #[test]
    fn insertion_order_round_trips() {
        let mut h = HeaderMap::new();
        h.push("Host", "example.com");
        h.push("Accept", "*/*");
        let mut out = Vec::new();
        h.write_to(&mut out);
        assert_eq!(out, b"Host: example.com\r\nAccept: */*\r\n");
    }

    #[test]
    fn duplicate_keys_are_preserved() {
        let mut h = HeaderMap::new();
        h.push("X-Forwarded-For", "1.1.1.1");
        h.push("X-Forwarded-For", "2.2.2.2");
        let all: Vec<_> = h.get_all("x-forwarded-for").collect();
        assert_eq!(all, vec!["1.1.1.1", "2.2.2.2"]);
    }

    #[test]
    fn strip_hop_by_hop_removes_proxy_headers() {
        let mut h = HeaderMap::new();
        h.push("Proxy-Authorization", "NTLM abcd");
        h.push("Connection", "keep-alive");
        h.push("Host", "example.com");
        h.strip_hop_by_hop();
        assert!(!h.contains("Proxy-Authorization"));
        assert!(!h.contains("Connection"));
        assert!(h.contains("Host"));
    }
}
