//! Core data model: credentials, parent proxies, request records, and the
//! pool/listener/join bookkeeping types the dispatcher and forwarder share.

use std::net::SocketAddr;
use std::sync::Mutex;

use crate::util::headers::HeaderMap;
use crate::util::ntlm::NTLMFlags;

/// Authentication scheme requested by the operator, mirrors the `--auth`
/// CLI values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    Ntlm,
    Nt,
    Lm,
    NtlmV2,
    Ntlm2Sr,
    Gss,
}

/// Credentials, built once at startup and never mutated afterward. The
/// hash slots are populated from a plaintext password (then the password
/// is dropped) or supplied pre-computed via `--hash`.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub user: String,
    pub domain: String,
    pub workstation: String,
    pub scheme: AuthScheme,
    pub lm_hash: Option<[u8; 16]>,
    pub nt_hash: Option<[u8; 16]>,
    pub ntlmv2_hash: Option<[u8; 16]>,
    pub negotiate_flags: Option<NTLMFlags>,
    pub kerberos_available: bool,
}

impl Credentials {
    /// Hashes are either entirely absent or exactly their declared width;
    /// there is no representation for a "partial" hash.
    pub fn has_lm(&self) -> bool {
        self.lm_hash.is_some()
    }

    pub fn has_nt(&self) -> bool {
        self.nt_hash.is_some()
    }

    pub fn has_ntlmv2(&self) -> bool {
        self.ntlmv2_hash.is_some()
    }

    pub fn effective_flags(&self, key_exchange: bool) -> NTLMFlags {
        self.negotiate_flags.unwrap_or_else(|| {
            NTLMFlags::for_scheme(
                self.scheme == AuthScheme::NtlmV2,
                key_exchange,
                &self.domain,
                &self.workstation,
            )
        })
    }
}

/// One entry of the parent list, or a PAC `DIRECT` verdict at that
/// position. Lifetime = process; the address list is resolved lazily and
/// cached on first use.
#[derive(Debug)]
pub struct ParentProxy {
    pub kind: ParentKind,
    pub resolved: Mutex<Option<Vec<SocketAddr>>>,
}

/// `Mutex` has no `Clone` impl regardless of its contents, so this clones
/// the cached resolution snapshot instead of sharing the lock.
impl Clone for ParentProxy {
    fn clone(&self) -> Self {
        let cached = self.resolved.lock().expect("parent resolve cache poisoned").clone();
        Self { kind: self.kind.clone(), resolved: Mutex::new(cached) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentKind {
    Proxy { host: String, port: u16 },
    Direct,
}

impl ParentProxy {
    pub fn proxy(host: impl Into<String>, port: u16) -> Self {
        Self {
            kind: ParentKind::Proxy { host: host.into(), port },
            resolved: Mutex::new(None),
        }
    }

    pub fn direct() -> Self {
        Self { kind: ParentKind::Direct, resolved: Mutex::new(None) }
    }

    pub fn is_direct(&self) -> bool {
        matches!(self.kind, ParentKind::Direct)
    }
}

/// How a request or response body's length is determined on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFraming {
    Length(u64),
    Chunked,
    None,
    UntilClose,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpVersion {
    Http10,
    Http11,
}

impl HttpVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpVersion::Http10 => "HTTP/1.0",
            HttpVersion::Http11 => "HTTP/1.1",
        }
    }
}

/// A parsed request preamble: method, target, version, and headers.
/// Body framing is derived separately since it depends on the method for
/// requests and on the status for responses.
#[derive(Debug, Clone)]
pub struct RequestRecord {
    pub method: String,
    pub uri: String,
    pub version: HttpVersion,
    pub headers: HeaderMap,
    pub host: String,
    pub port: u16,
    pub framing: BodyFraming,
}

impl RequestRecord {
    pub fn is_connect(&self) -> bool {
        self.method.eq_ignore_ascii_case("CONNECT")
    }

    pub fn keep_alive_requested(&self) -> bool {
        match self.headers.get("Proxy-Connection").or_else(|| self.headers.get("Connection")) {
            Some(value) => !value.eq_ignore_ascii_case("close"),
            None => matches!(self.version, HttpVersion::Http11),
        }
    }
}

/// A parsed response preamble.
#[derive(Debug, Clone)]
pub struct ResponseRecord {
    pub version: HttpVersion,
    pub status: u16,
    pub reason: String,
    pub headers: HeaderMap,
    pub framing: BodyFraming,
}

impl ResponseRecord {
    pub fn connection_close(&self) -> bool {
        matches!(self.headers.get("Connection"), Some(v) if v.eq_ignore_ascii_case("close"))
    }
}

/// Authentication state of a pooled upstream socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    Fresh,
    Authenticated,
    Dirty,
}
