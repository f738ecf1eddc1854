//! CLI parsing (`clap::Parser`) plus a hand-rolled line-oriented config
//! file reader, merged into one `ResolvedConfig` that builds the
//! immutable `Context` every worker shares. CLI values win over config
//! file values wherever both are given; unknown config keys are logged
//! and otherwise ignored rather than treated as fatal.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::warn;

use ntlmproxy_core::error::ProxyError;
use ntlmproxy_core::ProxyResult;

use crate::context::Context;
use crate::model::{AuthScheme, Credentials, ParentProxy};
use crate::noproxy::NoProxyList;
use crate::pac::PacEngine;
use crate::parent::ParentSelector;
use crate::pool::Pool;
use crate::scanner::ScannerConfig;
use crate::util::bytes::decode_hex;
use crate::util::crypto::hash::{lm_hash, nt_hash};
use crate::util::crypto::v2::ntlmv2_key;
use crate::util::headers::HeaderMap;
use crate::util::ntlm::flags::NTLMFlags;

#[derive(Parser, Debug)]
#[command(name = "ntlmproxy", about = "Authenticating NTLM/NTLMv2 forward proxy")]
pub struct Cli {
    /// Authentication scheme to present to the parent proxy.
    #[arg(long, value_enum)]
    pub auth: Option<AuthSchemeArg>,

    #[arg(long)]
    pub domain: Option<String>,

    /// Accepts `user` or `user@domain`; the latter overrides `--domain`.
    #[arg(long)]
    pub user: Option<String>,

    #[arg(long)]
    pub workstation: Option<String>,

    #[arg(long, env = "NTLMPROXY_PASSWORD")]
    pub password: Option<String>,

    /// Pre-computed `lm:nt:ntlmv2` hash triple in hex, any slot empty.
    #[arg(long)]
    pub hash: Option<String>,

    /// Raw NTLM negotiate-flags override, decimal or `0x`-prefixed hex.
    #[arg(long)]
    pub flags: Option<String>,

    #[arg(long = "listen")]
    pub listen: Vec<String>,

    #[arg(long = "socks-listen")]
    pub socks_listen: Vec<String>,

    #[arg(long = "tunnel")]
    pub tunnel: Vec<String>,

    #[arg(long = "noproxy")]
    pub noproxy: Vec<String>,

    #[arg(long = "socks-user")]
    pub socks_user: Vec<String>,

    #[arg(long = "header")]
    pub header: Vec<String>,

    #[arg(long = "isa-scanner-agent")]
    pub isa_scanner_agent: Vec<String>,

    #[arg(long)]
    pub pidfile: Option<PathBuf>,

    #[arg(long)]
    pub uid: Option<u32>,

    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub daemonize: bool,

    /// Decode the client's `Proxy-Authorization: Basic` header into
    /// per-request credentials instead of using the configured identity.
    #[arg(long = "basic-bridge", action = clap::ArgAction::SetTrue)]
    pub basic_bridge: bool,

    #[arg(long = "request-log")]
    pub request_log: Option<u8>,

    #[arg(long = "trace-file")]
    pub trace_file: Option<PathBuf>,

    /// Iterates auth schemes against `--parent`/positional parents and
    /// reports which ones authenticate successfully for this URL, then
    /// exits without starting the proxy.
    #[arg(long = "magic-detect")]
    pub magic_detect: Option<String>,

    /// Prints the LM/NT/NTLMv2 hash triple for the configured credentials
    /// and exits without starting the proxy.
    #[arg(long = "hash-print", action = clap::ArgAction::SetTrue)]
    pub hash_print: bool,

    #[arg(long)]
    pub pac: Option<PathBuf>,

    /// Bind all listeners on every interface instead of loopback only.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub gateway: bool,

    #[arg(long = "config")]
    pub config_file: Option<PathBuf>,

    /// Worker thread stack size in bytes; default is the platform default.
    #[arg(long = "stack-size")]
    pub stack_size: Option<usize>,

    /// Serializes all work on the dispatcher thread instead of spawning a
    /// worker per connection. Troubleshooting only; disables the join queue.
    #[arg(long = "debug-serial", action = clap::ArgAction::SetTrue)]
    pub debug_serial: bool,

    /// Parent proxies, `host:port`, tried in order.
    #[arg(value_name = "PARENT")]
    pub parents: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum AuthSchemeArg {
    Ntlm,
    Nt,
    Lm,
    Ntlmv2,
    Ntlm2sr,
    Gss,
}

impl From<AuthSchemeArg> for AuthScheme {
    fn from(value: AuthSchemeArg) -> Self {
        match value {
            AuthSchemeArg::Ntlm => AuthScheme::Ntlm,
            AuthSchemeArg::Nt => AuthScheme::Nt,
            AuthSchemeArg::Lm => AuthScheme::Lm,
            AuthSchemeArg::Ntlmv2 => AuthScheme::NtlmV2,
            AuthSchemeArg::Ntlm2sr => AuthScheme::Ntlm2Sr,
            AuthSchemeArg::Gss => AuthScheme::Gss,
        }
    }
}

fn auth_scheme_from_str(raw: &str) -> ProxyResult<AuthScheme> {
    match raw.to_ascii_lowercase().as_str() {
        "ntlm" => Ok(AuthScheme::Ntlm),
        "nt" => Ok(AuthScheme::Nt),
        "lm" => Ok(AuthScheme::Lm),
        "ntlmv2" => Ok(AuthScheme::NtlmV2),
        "ntlm2sr" => Ok(AuthScheme::Ntlm2Sr),
        "gss" => Ok(AuthScheme::Gss),
        other => Err(ProxyError::config(format!("unknown auth scheme: {other:?}"))),
    }
}

/// Everything the config file can hold, one field/vec per repeatable or
/// single-valued key. `None`/empty means "not set in the file".
#[derive(Default, Debug)]
pub struct ConfigFile {
    pub auth: Option<String>,
    pub domain: Option<String>,
    pub user: Option<String>,
    pub workstation: Option<String>,
    pub password: Option<String>,
    pub hash: Option<String>,
    pub flags: Option<String>,
    pub listen: Vec<String>,
    pub socks_listen: Vec<String>,
    pub tunnel: Vec<String>,
    pub noproxy: Vec<String>,
    pub parent: Vec<String>,
    pub socks_users: Vec<String>,
    pub header: Vec<String>,
    pub isa_scanner_agent: Vec<String>,
    pub pidfile: Option<String>,
    pub uid: Option<u32>,
    pub daemonize: Option<bool>,
    pub request_log: Option<u8>,
    pub trace_file: Option<String>,
    pub pac: Option<String>,
    pub gateway: Option<bool>,
    pub basic_bridge: Option<bool>,
    pub stack_size: Option<usize>,
    pub debug_serial: Option<bool>,
}

pub fn read_config_file(path: &Path) -> ProxyResult<ConfigFile> {
    let text = fs::read_to_string(path).map_err(|e| ProxyError::config(format!("reading {path:?}: {e}")))?;
    let mut file = ConfigFile::default();

    for (lineno, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (key, value) = match line.split_once(char::is_whitespace) {
            Some((k, v)) => (k, v.trim()),
            None => (line, ""),
        };
        match key {
            "Auth" => file.auth = Some(value.to_string()),
            "Domain" => file.domain = Some(value.to_string()),
            "User" => file.user = Some(value.to_string()),
            "Workstation" => file.workstation = Some(value.to_string()),
            "Password" => file.password = Some(value.to_string()),
            "Hash" => file.hash = Some(value.to_string()),
            "Flags" => file.flags = Some(value.to_string()),
            "Listen" => file.listen.push(value.to_string()),
            "SOCKS5Proxy" => file.socks_listen.push(value.to_string()),
            "Tunnel" => file.tunnel.push(value.to_string()),
            "NoProxy" => file.noproxy.push(value.to_string()),
            "Proxy" => file.parent.push(value.to_string()),
            "SOCKS5Users" => file.socks_users.push(value.to_string()),
            "Header" => file.header.push(value.to_string()),
            "ISAScannerAgent" => file.isa_scanner_agent.push(value.to_string()),
            "PidFile" => file.pidfile = Some(value.to_string()),
            "Uid" => file.uid = value.parse().ok(),
            "Daemonize" => file.daemonize = Some(parse_bool(value)),
            "RequestLog" => file.request_log = value.parse().ok(),
            "TraceFile" => file.trace_file = Some(value.to_string()),
            "PAC" => file.pac = Some(value.to_string()),
            "Gateway" => file.gateway = Some(parse_bool(value)),
            "BasicBridge" => file.basic_bridge = Some(parse_bool(value)),
            "StackSize" => file.stack_size = value.parse().ok(),
            "DebugSerial" => file.debug_serial = Some(parse_bool(value)),
            other => warn!(line = lineno + 1, key = other, "unknown config key, ignoring"),
        }
    }
    Ok(file)
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// `[addr:]port`, defaulting the address to loopback unless `gateway` asks
/// for every interface.
#[derive(Debug, Clone)]
pub struct ListenSpec {
    pub addr: String,
    pub port: u16,
}

pub fn parse_listen_spec(raw: &str, gateway: bool) -> ProxyResult<ListenSpec> {
    let default_addr = if gateway { "0.0.0.0" } else { "127.0.0.1" };
    match raw.rsplit_once(':') {
        Some((addr, port)) => Ok(ListenSpec { addr: addr.to_string(), port: parse_port(port)? }),
        None => Ok(ListenSpec { addr: default_addr.to_string(), port: parse_port(raw)? }),
    }
}

fn parse_port(raw: &str) -> ProxyResult<u16> {
    raw.parse().map_err(|_| ProxyError::config(format!("bad port: {raw:?}")))
}

/// `[laddr:]lport:rhost:rport`.
#[derive(Debug, Clone)]
pub struct TunnelSpec {
    pub listen_addr: String,
    pub listen_port: u16,
    pub target_host: String,
    pub target_port: u16,
}

pub fn parse_tunnel_spec(raw: &str, gateway: bool) -> ProxyResult<TunnelSpec> {
    let default_addr = if gateway { "0.0.0.0" } else { "127.0.0.1" };
    let parts: Vec<&str> = raw.split(':').collect();
    match parts.as_slice() {
        [lport, rhost, rport] => Ok(TunnelSpec {
            listen_addr: default_addr.to_string(),
            listen_port: parse_port(lport)?,
            target_host: rhost.to_string(),
            target_port: parse_port(rport)?,
        }),
        [laddr, lport, rhost, rport] => Ok(TunnelSpec {
            listen_addr: laddr.to_string(),
            listen_port: parse_port(lport)?,
            target_host: rhost.to_string(),
            target_port: parse_port(rport)?,
        }),
        _ => Err(ProxyError::config(format!("bad tunnel spec: {raw:?}"))),
    }
}

pub fn parse_parent_spec(raw: &str) -> ProxyResult<ParentProxy> {
    if raw.eq_ignore_ascii_case("DIRECT") {
        return Ok(ParentProxy::direct());
    }
    let (host, port) = raw
        .rsplit_once(':')
        .ok_or_else(|| ProxyError::config(format!("bad parent spec: {raw:?}")))?;
    Ok(ParentProxy::proxy(host, parse_port(port)?))
}

pub fn parse_socks_user(raw: &str) -> ProxyResult<(String, String)> {
    raw.split_once(':')
        .map(|(u, p)| (u.to_string(), p.to_string()))
        .ok_or_else(|| ProxyError::config(format!("bad SOCKS5 user spec: {raw:?}")))
}

pub fn parse_header_spec(raw: &str) -> ProxyResult<(String, String)> {
    raw.split_once(':')
        .map(|(n, v)| (n.trim().to_string(), v.trim().to_string()))
        .ok_or_else(|| ProxyError::config(format!("bad header substitution: {raw:?}")))
}

/// `user` or `user@domain`; the latter's domain wins over any separately
/// configured domain.
pub fn split_user_domain(raw: &str, fallback_domain: &str) -> (String, String) {
    match raw.split_once('@') {
        Some((user, domain)) => (user.to_string(), domain.to_string()),
        None => (raw.to_string(), fallback_domain.to_string()),
    }
}

pub struct HashTriple {
    pub lm: Option<[u8; 16]>,
    pub nt: Option<[u8; 16]>,
    pub ntlmv2: Option<[u8; 16]>,
}

pub fn parse_hash_triple(raw: &str) -> ProxyResult<HashTriple> {
    let parts: Vec<&str> = raw.split(':').collect();
    if parts.len() != 3 {
        return Err(ProxyError::config("hash triple must be lm:nt:ntlmv2, any slot empty"));
    }
    Ok(HashTriple {
        lm: parse_hex16(parts[0])?,
        nt: parse_hex16(parts[1])?,
        ntlmv2: parse_hex16(parts[2])?,
    })
}

fn parse_hex16(token: &str) -> ProxyResult<Option<[u8; 16]>> {
    if token.is_empty() {
        return Ok(None);
    }
    let bytes = decode_hex(token).ok_or_else(|| ProxyError::config(format!("bad hex in hash: {token:?}")))?;
    let array: [u8; 16] = bytes
        .try_into()
        .map_err(|_| ProxyError::config(format!("hash must be 32 hex chars: {token:?}")))?;
    Ok(Some(array))
}

pub fn parse_flags_override(raw: &str) -> ProxyResult<NTLMFlags> {
    let trimmed = raw.trim();
    let value = if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else {
        trimmed.parse::<u32>()
    }
    .map_err(|_| ProxyError::config(format!("bad flags override: {raw:?}")))?;
    Ok(NTLMFlags::from_bits_truncate(value))
}

/// Fully merged, validated startup configuration. Distinct from `Context`
/// because it still carries listener/tunnel specs the dispatcher needs
/// but the per-request forwarder never touches.
#[derive(Clone)]
pub struct ResolvedConfig {
    pub credentials: Credentials,
    pub password: Option<String>,
    pub parents: Vec<ParentProxy>,
    pub pac_script: Option<String>,
    pub noproxy: Vec<String>,
    pub headers: Vec<(String, String)>,
    pub socks_users: Vec<(String, String)>,
    pub scanner_agents: Vec<String>,
    pub listeners: Vec<ListenSpec>,
    pub socks_listeners: Vec<ListenSpec>,
    pub tunnels: Vec<TunnelSpec>,
    pub pidfile: Option<PathBuf>,
    pub uid: Option<u32>,
    pub daemonize: bool,
    pub request_log_level: u8,
    pub basic_to_ntlm_bridging: bool,
    pub stack_size: Option<usize>,
    pub debug_serial: bool,
}

/// Merges `cli` over an optional parsed config file. Repeatable values
/// are CLI-list-replaces-file-list when the CLI gave any entries at all;
/// singular values are CLI-if-present else file else a hardcoded default.
pub fn merge(cli: &Cli, file: Option<ConfigFile>) -> ProxyResult<ResolvedConfig> {
    let file = file.unwrap_or_default();
    let gateway = cli.gateway || file.gateway.unwrap_or(false);

    let auth_raw = cli
        .auth
        .map(|a| format!("{a:?}"))
        .or(file.auth.clone())
        .unwrap_or_else(|| "ntlm".to_string());
    let scheme = auth_scheme_from_str(&auth_raw)?;

    let domain_raw = cli.domain.clone().or(file.domain.clone()).unwrap_or_default();
    let user_raw = cli
        .user
        .clone()
        .or(file.user.clone())
        .ok_or_else(|| ProxyError::config("no user configured (--user or User in config file)"))?;
    let (user, domain) = split_user_domain(&user_raw, &domain_raw);

    let workstation = cli
        .workstation
        .clone()
        .or(file.workstation.clone())
        .unwrap_or_else(|| "localhost".to_string());

    let password = cli.password.clone().or(file.password.clone());

    let hash = match cli.hash.clone().or(file.hash.clone()) {
        Some(raw) => Some(parse_hash_triple(&raw)?),
        None => None,
    };

    let flags_override = match cli.flags.clone().or(file.flags.clone()) {
        Some(raw) => Some(parse_flags_override(&raw)?),
        None => None,
    };

    // Neither `--password` nor `--hash` is required here: the caller
    // prompts interactively when both are absent, then re-checks before
    // starting the proxy. Merging is pure and does no I/O of its own.
    let credentials = Credentials {
        user,
        domain,
        workstation,
        scheme,
        lm_hash: hash.as_ref().and_then(|h| h.lm),
        nt_hash: hash.as_ref().and_then(|h| h.nt),
        ntlmv2_hash: hash.as_ref().and_then(|h| h.ntlmv2),
        negotiate_flags: flags_override,
        kerberos_available: false,
    };

    let parent_raw: Vec<String> = if !cli.parents.is_empty() {
        cli.parents.clone()
    } else {
        file.parent.clone()
    };
    let parents = parent_raw
        .iter()
        .map(|raw| parse_parent_spec(raw))
        .collect::<ProxyResult<Vec<_>>>()?;

    let pac_script = match cli.pac.clone().or_else(|| file.pac.clone().map(PathBuf::from)) {
        Some(path) => {
            Some(fs::read_to_string(&path).map_err(|e| ProxyError::config(format!("reading PAC file {path:?}: {e}")))?)
        }
        None => None,
    };

    let noproxy = if !cli.noproxy.is_empty() { cli.noproxy.clone() } else { file.noproxy.clone() };

    let header_raw = if !cli.header.is_empty() { cli.header.clone() } else { file.header.clone() };
    let headers = header_raw.iter().map(|raw| parse_header_spec(raw)).collect::<ProxyResult<Vec<_>>>()?;

    let socks_user_raw = if !cli.socks_user.is_empty() { cli.socks_user.clone() } else { file.socks_users.clone() };
    let socks_users = socks_user_raw
        .iter()
        .map(|raw| parse_socks_user(raw))
        .collect::<ProxyResult<Vec<_>>>()?;

    let scanner_agents = if !cli.isa_scanner_agent.is_empty() {
        cli.isa_scanner_agent.clone()
    } else {
        file.isa_scanner_agent.clone()
    };

    let listen_raw = if !cli.listen.is_empty() { cli.listen.clone() } else { file.listen.clone() };
    let listeners = listen_raw
        .iter()
        .map(|raw| parse_listen_spec(raw, gateway))
        .collect::<ProxyResult<Vec<_>>>()?;

    let socks_listen_raw = if !cli.socks_listen.is_empty() { cli.socks_listen.clone() } else { file.socks_listen.clone() };
    let socks_listeners = socks_listen_raw
        .iter()
        .map(|raw| parse_listen_spec(raw, gateway))
        .collect::<ProxyResult<Vec<_>>>()?;

    let tunnel_raw = if !cli.tunnel.is_empty() { cli.tunnel.clone() } else { file.tunnel.clone() };
    let tunnels = tunnel_raw
        .iter()
        .map(|raw| parse_tunnel_spec(raw, gateway))
        .collect::<ProxyResult<Vec<_>>>()?;

    if listeners.is_empty() && socks_listeners.is_empty() && tunnels.is_empty() {
        return Err(ProxyError::config("no listener configured (--listen, --socks-listen, or --tunnel)"));
    }

    let pidfile = cli.pidfile.clone().or_else(|| file.pidfile.clone().map(PathBuf::from));
    let uid = cli.uid.or(file.uid);
    let daemonize = cli.daemonize || file.daemonize.unwrap_or(false);
    let request_log_level = cli.request_log.or(file.request_log).unwrap_or(0);
    let basic_to_ntlm_bridging = cli.basic_bridge || file.basic_bridge.unwrap_or(false);
    let stack_size = cli.stack_size.or(file.stack_size);
    let debug_serial = cli.debug_serial || file.debug_serial.unwrap_or(false);

    Ok(ResolvedConfig {
        credentials,
        password,
        parents,
        pac_script,
        noproxy,
        headers,
        socks_users,
        scanner_agents,
        listeners,
        socks_listeners,
        tunnels,
        pidfile,
        uid,
        daemonize,
        request_log_level,
        basic_to_ntlm_bridging,
        stack_size,
        debug_serial,
    })
}

/// Fills whichever of `lm_hash`/`nt_hash`/`ntlmv2_hash` the password can
/// supply and isn't already populated from `--hash`. LM hashing is
/// undefined past 14 characters and simply leaves that slot empty rather
/// than failing startup for schemes that don't need it.
fn hash_password_into_credentials(creds: &mut Credentials, password: &str) {
    if creds.lm_hash.is_none() {
        creds.lm_hash = lm_hash(password).ok();
    }
    if creds.nt_hash.is_none() {
        creds.nt_hash = Some(nt_hash(password));
    }
    if creds.ntlmv2_hash.is_none() {
        let nt = creds.nt_hash.unwrap_or_else(|| nt_hash(password));
        creds.ntlmv2_hash = ntlmv2_key(&nt, &creds.user, &creds.domain).ok();
    }
}

impl ResolvedConfig {
    /// Builds the immutable, shared `Context` the dispatcher hands to
    /// every worker. Takes `&self` rather than consuming it because the
    /// dispatcher still needs the listener/tunnel specs and process
    /// settings (`pidfile`, `uid`, `stack_size`, ...) that live alongside
    /// these fields on the same `ResolvedConfig`. Any plaintext password is
    /// hashed into the missing credential slots here; `Context` itself
    /// never carries it.
    pub fn build_context(&self) -> ProxyResult<Context> {
        let mut header_substitutions = HeaderMap::new();
        for (name, value) in &self.headers {
            header_substitutions.push(name, value);
        }

        let pac = match &self.pac_script {
            Some(script) => Some(PacEngine::parse(script)?),
            None => None,
        };

        let mut credentials = self.credentials.clone();
        if let Some(password) = &self.password {
            hash_password_into_credentials(&mut credentials, password);
        }

        Ok(Context {
            credentials,
            parents: ParentSelector::new(self.parents.clone()),
            pool: Pool::new(),
            pac,
            noproxy: NoProxyList::new(self.noproxy.clone()),
            header_substitutions,
            socks_users: self.socks_users.clone(),
            scanner: ScannerConfig::new(self.scanner_agents.clone(), 64 * 1024),
            request_log_level: self.request_log_level,
            basic_to_ntlm_bridging: self.basic_to_ntlm_bridging,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listen_spec_defaults_to_loopback() {
        let spec = parse_listen_spec("3128", false).unwrap();
        assert_eq!(spec.addr, "127.0.0.1");
        assert_eq!(spec.port, 3128);
    }

    #[test]
    fn listen_spec_honors_gateway_default() {
        let spec = parse_listen_spec("3128", true).unwrap();
        assert_eq!(spec.addr, "0.0.0.0");
    }

    #[test]
    fn listen_spec_with_explicit_addr() {
        let spec = parse_listen_spec("10.0.0.5:3128", false).unwrap();
        assert_eq!(spec.addr, "10.0.0.5");
        assert_eq!(spec.port, 3128);
    }

    #[test]
    fn tunnel_spec_three_part_defaults_addr() {
        let spec = parse_tunnel_spec("2525:mail.example.com:25", false).unwrap();
        assert_eq!(spec.listen_addr, "127.0.0.1");
        assert_eq!(spec.listen_port, 2525);
        assert_eq!(spec.target_host, "mail.example.com");
        assert_eq!(spec.target_port, 25);
    }

    #[test]
    fn tunnel_spec_four_part_explicit_addr() {
        let spec = parse_tunnel_spec("0.0.0.0:2525:mail.example.com:25", false).unwrap();
        assert_eq!(spec.listen_addr, "0.0.0.0");
    }

    #[test]
    fn tunnel_spec_rejects_malformed_input() {
        assert!(parse_tunnel_spec("not-enough-parts", false).is_err());
    }

    #[test]
    fn user_at_domain_splits_correctly() {
        let (user, domain) = split_user_domain("alice@CORP", "");
        assert_eq!(user, "alice");
        assert_eq!(domain, "CORP");
    }

    #[test]
    fn bare_user_keeps_fallback_domain() {
        let (user, domain) = split_user_domain("alice", "CORP");
        assert_eq!(user, "alice");
        assert_eq!(domain, "CORP");
    }

    #[test]
    fn hash_triple_allows_empty_slots() {
        let triple = parse_hash_triple("::").unwrap();
        assert!(triple.lm.is_none() && triple.nt.is_none() && triple.ntlmv2.is_none());
    }

    #[test]
    fn hash_triple_rejects_wrong_length() {
        assert!(parse_hash_triple("abcd::").is_err());
    }

    #[test]
    fn flags_override_parses_hex_and_decimal() {
        assert_eq!(parse_flags_override("0x200").unwrap().bits(), 0x200);
        assert_eq!(parse_flags_override("512").unwrap().bits(), 512);
    }

    #[test]
    fn parent_spec_parses_direct_and_proxy() {
        assert!(parse_parent_spec("DIRECT").unwrap().is_direct());
        let p = parse_parent_spec("proxy.example.com:8080").unwrap();
        assert!(!p.is_direct());
    }

    #[test]
    fn config_file_ignores_unknown_keys_without_failing() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("ntlmproxy-config-test-{}", std::process::id()));
        fs::write(&path, "User alice\nSomeFutureKey value\nDomain CORP\n").unwrap();
        let parsed = read_config_file(&path).unwrap();
        let _ = fs::remove_file(&path);
        assert_eq!(parsed.user.as_deref(), Some("alice"));
        assert_eq!(parsed.domain.as_deref(), Some("CORP"));
    }
}
