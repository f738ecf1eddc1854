//! The immutable, startup-built value every worker holds by reference.
//! Per the "global mutable state maps to an immutable startup context"
//! design note: only the pool, join queue, and PAC engine need real
//! synchronization; everything else here is frozen after `Context::new`.

use crate::model::Credentials;
use crate::noproxy::NoProxyList;
use crate::pac::PacEngine;
use crate::parent::ParentSelector;
use crate::pool::Pool;
use crate::scanner::ScannerConfig;
use crate::util::headers::HeaderMap;

pub struct Context {
    pub credentials: Credentials,
    pub parents: ParentSelector,
    pub pool: Pool,
    pub pac: Option<PacEngine>,
    pub noproxy: NoProxyList,
    pub header_substitutions: HeaderMap,
    pub socks_users: Vec<(String, String)>,
    pub scanner: ScannerConfig,
    pub request_log_level: u8,
    pub basic_to_ntlm_bridging: bool,
}

impl Context {
    pub fn socks_user_ok(&self, user: &str, pass: &str) -> bool {
        self.socks_users
            .iter()
            .any(|(u, p)| constant_time_eq(u.as_bytes(), user.as_bytes()) && constant_time_eq(p.as_bytes(), pass.as_bytes()))
    }
}

/// Plain equality against a configured user/password map is a timing
/// side channel; this hardens it at negligible cost.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
