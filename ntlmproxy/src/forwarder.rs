//! Per-request forwarding state machine. Decides direct-vs-upstream
//! routing, drives the NTLM probe/challenge/authenticate dance on a fresh
//! upstream connection, and relays the response — or, for `CONNECT`,
//! switches the client socket into a raw bidirectional tunnel.
//!
//! States: `Deciding -> Connecting -> Authenticating -> Relaying ->
//! {Deciding | Done | Abort}`. This module flattens that into a function
//! per state rather than an explicit state value, since every transition
//! here is a tail call with no need to suspend and resume mid-state.

use std::io::{self, BufReader, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};

use ntlmproxy_core::error::ProxyError;
use ntlmproxy_core::ProxyResult;

use crate::auth;
use crate::context::Context;
use crate::http;
use crate::model::{
    BodyFraming, Credentials, HttpVersion, ParentKind, ParentProxy, PoolState, RequestRecord,
    ResponseRecord,
};
use crate::pac::PacEngine;
use crate::parent::{parse_pac_verdict, ParentSelector};
use crate::tunnel;
use crate::util::headers::HeaderMap;
use crate::util::ntlm::challenge::ChallengeMessage;

/// What the client-facing read loop should do after one request/response
/// exchange completes.
pub enum Outcome {
    /// Exchange finished on a connection the client wants to keep alive;
    /// read and process another request.
    Continue,
    /// The exchange (or a tunnel established from it) ended the
    /// connection's useful life; close the client socket.
    Done,
    /// Unrecoverable failure already reported to the client as best as
    /// possible; close the client socket. Distinguished from `Done` only
    /// for callers that want to log the two cases differently.
    Abort,
    /// Like `Continue`, but the route just taken came from a PAC verdict:
    /// the next request may resolve to an entirely different parent list,
    /// so the caller must not assume anything cached about this one still
    /// applies.
    Rebuild,
}

/// Reads requests from `client` in a loop and forwards each one until the
/// connection ends (client close, upstream-unroutable, or a `Connection:
/// close` either side honors).
pub fn handle_proxy_connection(ctx: &Context, client: TcpStream) -> ProxyResult<()> {
    client.set_nodelay(true).ok();
    let mut reader = BufReader::new(client.try_clone().map_err(ProxyError::client_io)?);
    let mut writer = client;

    loop {
        // A malformed preamble and a clean connection close both surface
        // as an error from read_request with no way to tell them apart
        // at the very start of an exchange; treat both as "done", since
        // there's no reliable way to address a 400 at a peer that may
        // already be gone.
        let request = match http::read_request(&mut reader) {
            Ok(request) => request,
            Err(_) => return Ok(()),
        };

        match forward(ctx, &mut writer, &mut reader, &request) {
            Ok(Outcome::Continue) | Ok(Outcome::Rebuild) => continue,
            Ok(Outcome::Done) | Ok(Outcome::Abort) => return Ok(()),
            Err(error) => {
                respond_error(&mut writer, &error);
                return Ok(());
            }
        }
    }
}

fn forward(
    ctx: &Context,
    client: &mut TcpStream,
    client_reader: &mut BufReader<TcpStream>,
    request: &RequestRecord,
) -> ProxyResult<Outcome> {
    if ctx.noproxy.matches(&request.host) {
        return direct(ctx, client, client_reader, request);
    }

    if let Some(pac) = &ctx.pac {
        return forward_via_pac(ctx, pac, client, client_reader, request);
    }

    if ctx.parents.is_empty() {
        return Err(ProxyError::connect("no parent proxies configured"));
    }

    let mut last_err = None;
    for (index, parent) in ctx.parents.rotation() {
        let attempt = if parent.is_direct() {
            direct(ctx, client, client_reader, request)
        } else {
            via_parent(ctx, index, parent, client, client_reader, request)
        };
        match attempt {
            Ok(outcome) => {
                ctx.parents.record_success(index);
                return Ok(outcome);
            }
            Err(error) if error.is_recoverable_before_headers() => {
                last_err = Some(error);
                continue;
            }
            Err(error) => return Err(error),
        }
    }
    Err(last_err.unwrap_or_else(|| ProxyError::connect("parent rotation exhausted")))
}

/// PAC-driven routing: evaluates the script fresh for this request's host,
/// parses the verdict into an ordered parent list, and walks it exactly
/// like the static-list path — except nothing about the list (including
/// any pooled connection) survives to the next request, since the next
/// request's host may produce an entirely different verdict.
fn forward_via_pac(
    ctx: &Context,
    pac: &PacEngine,
    client: &mut TcpStream,
    client_reader: &mut BufReader<TcpStream>,
    request: &RequestRecord,
) -> ProxyResult<Outcome> {
    let verdict = pac.find_proxy_for_url(&request.host)?;
    let parents = parse_pac_verdict(&verdict);
    if parents.is_empty() {
        return Err(ProxyError::connect("PAC verdict named no usable parent"));
    }
    let selector = ParentSelector::new(parents);

    let mut last_err = None;
    for (_, parent) in selector.rotation() {
        let attempt = if parent.is_direct() {
            direct(ctx, client, client_reader, request)
        } else {
            via_parent_adhoc(ctx, parent, client, client_reader, request)
        };
        match attempt {
            Ok(Outcome::Continue) => return Ok(Outcome::Rebuild),
            Ok(outcome) => return Ok(outcome),
            Err(error) if error.is_recoverable_before_headers() => {
                last_err = Some(error);
                continue;
            }
            Err(error) => return Err(error),
        }
    }
    Err(last_err.unwrap_or_else(|| ProxyError::connect("PAC parent rotation exhausted")))
}

/// NoProxy-matched or PAC-`DIRECT` path: connects straight to the
/// request's own host, skipping authentication entirely.
fn direct(
    ctx: &Context,
    client: &mut TcpStream,
    client_reader: &mut BufReader<TcpStream>,
    request: &RequestRecord,
) -> ProxyResult<Outcome> {
    let mut upstream = TcpStream::connect((request.host.as_str(), request.port))
        .map_err(|e| ProxyError::connect(e.to_string()))?;

    if request.is_connect() {
        let leftover = client_reader.buffer().to_vec();
        if !leftover.is_empty() {
            upstream.write_all(&leftover).map_err(ProxyError::upstream_io)?;
        }
        http::write_status_line(client, &HttpVersion::Http11, 200, "Connection Established")?;
        http::write_headers(client, &HeaderMap::new())?;
        client.flush().map_err(ProxyError::client_io)?;

        let client_stream = client.try_clone().map_err(ProxyError::client_io)?;
        tunnel::bridge(client_stream, upstream).map_err(ProxyError::client_io)?;
        return Ok(Outcome::Done);
    }

    let mut headers = request.headers.clone();
    headers.strip_hop_by_hop();
    for (name, value) in ctx.header_substitutions.iter() {
        headers.set(name, value);
    }

    http::write_request_line(&mut upstream, &request.method, &request.uri, &request.version)?;
    http::write_headers(&mut upstream, &headers)?;
    http::relay_body(client_reader, &mut upstream, request.framing)?;
    upstream.flush().map_err(ProxyError::upstream_io)?;

    let mut reader = BufReader::new(upstream.try_clone().map_err(ProxyError::upstream_io)?);
    let response = http::read_response(&mut reader, request.method.eq_ignore_ascii_case("HEAD"))?;
    relay_response_to_client(ctx, client, request, &response, &mut reader)?;

    let keep_alive = request.keep_alive_requested() && !response.connection_close();
    Ok(if keep_alive { Outcome::Continue } else { Outcome::Done })
}

fn via_parent(
    ctx: &Context,
    index: usize,
    parent: &ParentProxy,
    client: &mut TcpStream,
    client_reader: &mut BufReader<TcpStream>,
    request: &RequestRecord,
) -> ProxyResult<Outcome> {
    let (mut upstream, needs_auth) = match ctx.pool.try_take_idle(index) {
        Some(stream) => (stream, false),
        None => (connect_parent(parent)?, true),
    };

    let (response, mut reader) = if needs_auth {
        authenticate_and_exchange(ctx, &mut upstream, client_reader, request)?
    } else {
        plain_exchange(ctx, &mut upstream, client_reader, request)?
    };

    if request.is_connect() {
        if response.status == 200 {
            let leftover = reader.buffer().to_vec();
            drop(reader);
            if !leftover.is_empty() {
                client.write_all(&leftover).map_err(ProxyError::client_io)?;
            }
            let client_leftover = client_reader.buffer().to_vec();
            if !client_leftover.is_empty() {
                upstream.write_all(&client_leftover).map_err(ProxyError::upstream_io)?;
            }

            let mut headers = response.headers.clone();
            headers.strip_hop_by_hop();
            http::write_status_line(client, &response.version, response.status, &response.reason)?;
            http::write_headers(client, &headers)?;
            client.flush().map_err(ProxyError::client_io)?;

            let client_stream = client.try_clone().map_err(ProxyError::client_io)?;
            tunnel::bridge(client_stream, upstream).map_err(ProxyError::client_io)?;
            return Ok(Outcome::Done);
        }

        relay_response_to_client(ctx, client, request, &response, &mut reader)?;
        ctx.pool.release(upstream, index, PoolState::Dirty);
        return Ok(Outcome::Done);
    }

    relay_response_to_client(ctx, client, request, &response, &mut reader)?;
    let keep_alive = request.keep_alive_requested() && !response.connection_close();
    let pool_state = if keep_alive { PoolState::Authenticated } else { PoolState::Dirty };
    ctx.pool.release(upstream, index, pool_state);
    Ok(if keep_alive { Outcome::Continue } else { Outcome::Done })
}

/// Same dance as `via_parent`, for a parent that came out of a per-request
/// PAC verdict rather than the static list. There is no stable index to
/// key a pooled connection against here, so every PAC-routed request
/// authenticates a fresh upstream and lets it drop at the end of this
/// call rather than handing it to `ctx.pool`.
fn via_parent_adhoc(
    ctx: &Context,
    parent: &ParentProxy,
    client: &mut TcpStream,
    client_reader: &mut BufReader<TcpStream>,
    request: &RequestRecord,
) -> ProxyResult<Outcome> {
    let mut upstream = connect_parent(parent)?;
    let (response, mut reader) = authenticate_and_exchange(ctx, &mut upstream, client_reader, request)?;

    if request.is_connect() {
        if response.status == 200 {
            let leftover = reader.buffer().to_vec();
            drop(reader);
            if !leftover.is_empty() {
                client.write_all(&leftover).map_err(ProxyError::client_io)?;
            }
            let client_leftover = client_reader.buffer().to_vec();
            if !client_leftover.is_empty() {
                upstream.write_all(&client_leftover).map_err(ProxyError::upstream_io)?;
            }

            let mut headers = response.headers.clone();
            headers.strip_hop_by_hop();
            http::write_status_line(client, &response.version, response.status, &response.reason)?;
            http::write_headers(client, &headers)?;
            client.flush().map_err(ProxyError::client_io)?;

            let client_stream = client.try_clone().map_err(ProxyError::client_io)?;
            tunnel::bridge(client_stream, upstream).map_err(ProxyError::client_io)?;
            return Ok(Outcome::Done);
        }

        relay_response_to_client(ctx, client, request, &response, &mut reader)?;
        return Ok(Outcome::Done);
    }

    relay_response_to_client(ctx, client, request, &response, &mut reader)?;
    let keep_alive = request.keep_alive_requested() && !response.connection_close();
    Ok(if keep_alive { Outcome::Continue } else { Outcome::Done })
}

/// Sends the request on an already-authenticated pooled connection and
/// reads the response, no NTLM dance needed.
fn plain_exchange(
    ctx: &Context,
    upstream: &mut TcpStream,
    client_reader: &mut BufReader<TcpStream>,
    request: &RequestRecord,
) -> ProxyResult<(ResponseRecord, BufReader<TcpStream>)> {
    let headers = outgoing_headers(ctx, request, None);
    http::write_request_line(upstream, &request.method, &request.uri, &request.version)?;
    http::write_headers(upstream, &headers)?;
    if !request.is_connect() {
        http::relay_body(client_reader, upstream, request.framing)?;
    }
    upstream.flush().map_err(ProxyError::upstream_io)?;

    let mut reader = BufReader::new(upstream.try_clone().map_err(ProxyError::upstream_io)?);
    let response = http::read_response(&mut reader, request.method.eq_ignore_ascii_case("HEAD"))?;
    Ok((response, reader))
}

/// Drives the three-leg NTLM dance on a freshly connected upstream: a
/// probe carrying Type-1, the parent's 407 challenge carrying Type-2,
/// then the real request carrying Type-3 on the same socket.
fn authenticate_and_exchange(
    ctx: &Context,
    upstream: &mut TcpStream,
    client_reader: &mut BufReader<TcpStream>,
    request: &RequestRecord,
) -> ProxyResult<(ResponseRecord, BufReader<TcpStream>)> {
    let creds = effective_credentials(ctx, request)?;
    let negotiate = auth::build_negotiate(&creds.credentials);
    let base_headers = outgoing_headers(ctx, request, None);

    let mut probe_headers = base_headers.clone();
    if !matches!(request.framing, BodyFraming::None) {
        probe_headers.set("Content-Length", "0");
    }
    probe_headers.set("Proxy-Authorization", format!("NTLM {}", base64::encode(negotiate.as_bytes())));

    http::write_request_line(upstream, &request.method, &request.uri, &request.version)?;
    http::write_headers(upstream, &probe_headers)?;
    upstream.flush().map_err(ProxyError::upstream_io)?;

    let mut reader = BufReader::new(upstream.try_clone().map_err(ProxyError::upstream_io)?);
    let probe_response = http::read_response(&mut reader, request.method.eq_ignore_ascii_case("HEAD"))?;
    http::relay_body(&mut reader, &mut io::sink(), probe_response.framing)?;

    if probe_response.status != 407 {
        // The parent let the probe through without a challenge (some
        // parents allow anonymous access to certain hosts); treat it as
        // the real answer instead of forcing a handshake it didn't ask for.
        return Ok((probe_response, reader));
    }

    let challenge_header = probe_response
        .headers
        .get("Proxy-Authenticate")
        .and_then(|value| value.strip_prefix("NTLM "))
        .ok_or_else(|| ProxyError::protocol("407 response missing NTLM challenge header"))?;
    let challenge_bytes = base64::decode(challenge_header.trim())
        .map_err(|_| ProxyError::protocol("malformed base64 in NTLM challenge"))?;
    let (_, challenge) = ChallengeMessage::parse(&challenge_bytes)
        .map_err(|_| ProxyError::protocol("malformed NTLM challenge message"))?;

    let authenticate = auth::build_authenticate(&creds.credentials, &challenge, creds.password.as_deref())?;
    let mut final_headers = base_headers;
    final_headers.set("Proxy-Authorization", format!("NTLM {}", base64::encode(authenticate.as_bytes())));

    http::write_request_line(upstream, &request.method, &request.uri, &request.version)?;
    http::write_headers(upstream, &final_headers)?;
    if !request.is_connect() {
        http::relay_body(client_reader, upstream, request.framing)?;
    }
    upstream.flush().map_err(ProxyError::upstream_io)?;

    let final_response = http::read_response(&mut reader, request.method.eq_ignore_ascii_case("HEAD"))?;
    if final_response.status == 407 {
        return Err(ProxyError::auth_failed("parent rejected NTLM credentials after Type-3"));
    }
    Ok((final_response, reader))
}

struct EffectiveCredentials {
    credentials: Credentials,
    password: Option<String>,
}

/// Resolves which credentials drive this exchange's NTLM dance: the
/// global operator-configured identity — whose password, if any, was
/// already hashed into its LM/NT/NTLMv2 slots at startup and is not kept
/// around — or, in basic-to-NTLM bridging mode, the identity the client
/// itself sent as `Proxy-Authorization: Basic`, decoded fresh per call.
fn effective_credentials(ctx: &Context, request: &RequestRecord) -> ProxyResult<EffectiveCredentials> {
    if ctx.basic_to_ntlm_bridging {
        if let Some(value) = request.headers.get("Proxy-Authorization") {
            if let Some(encoded) = value.strip_prefix("Basic ") {
                let decoded = base64::decode(encoded.trim())
                    .map_err(|_| ProxyError::protocol("malformed Basic credentials"))?;
                let text = String::from_utf8(decoded)
                    .map_err(|_| ProxyError::protocol("non-UTF-8 Basic credentials"))?;
                let (user, password) = text
                    .split_once(':')
                    .ok_or_else(|| ProxyError::protocol("malformed Basic credentials"))?;
                let mut credentials = ctx.credentials.clone();
                credentials.user = user.to_string();
                return Ok(EffectiveCredentials { credentials, password: Some(password.to_string()) });
            }
        }
    }
    Ok(EffectiveCredentials { credentials: ctx.credentials.clone(), password: None })
}

fn outgoing_headers(ctx: &Context, request: &RequestRecord, proxy_authorization: Option<&str>) -> HeaderMap {
    let mut headers = request.headers.clone();
    headers.strip_hop_by_hop();
    for (name, value) in ctx.header_substitutions.iter() {
        headers.set(name, value);
    }
    if let Some(value) = proxy_authorization {
        headers.set("Proxy-Authorization", value);
    }
    headers.set("Proxy-Connection", "Keep-Alive");
    headers
}

/// Writes the response preamble and relays its body, applying the
/// optional synchronous ISA-scanner prefetch when configured and the
/// response qualifies.
fn relay_response_to_client(
    ctx: &Context,
    client: &mut TcpStream,
    request: &RequestRecord,
    response: &ResponseRecord,
    upstream_reader: &mut BufReader<TcpStream>,
) -> ProxyResult<()> {
    let mut headers = response.headers.clone();
    headers.strip_hop_by_hop();

    if ctx.scanner.should_prefetch(request.headers.get("User-Agent"), response) {
        let mut body = Vec::new();
        http::relay_body(upstream_reader, &mut body, response.framing)?;
        http::write_status_line(client, &response.version, response.status, &response.reason)?;
        http::write_headers(client, &headers)?;
        client.write_all(&body).map_err(ProxyError::client_io)?;
    } else {
        http::write_status_line(client, &response.version, response.status, &response.reason)?;
        http::write_headers(client, &headers)?;
        http::relay_body(upstream_reader, client, response.framing)?;
    }
    client.flush().map_err(ProxyError::client_io)
}

/// Establishes a raw, bridgeable connection to `host:port` — directly if
/// `NoProxy` matches, otherwise via the parent list using a synthetic
/// `CONNECT` and the same NTLM dance `via_parent` uses for real client
/// traffic. Shared by the SOCKS5 handler and fixed tunnel workers, which
/// both just need a connected socket to hand to `tunnel::bridge`, not a
/// response relayed to an HTTP client.
pub fn establish_tunnel(ctx: &Context, host: &str, port: u16) -> ProxyResult<TcpStream> {
    if ctx.noproxy.matches(host) {
        return TcpStream::connect((host, port)).map_err(|e| ProxyError::connect(e.to_string()));
    }
    if ctx.parents.is_empty() {
        return Err(ProxyError::connect("no parent proxies configured"));
    }

    let request = synthetic_connect_request(host, port);
    let mut last_err = None;
    for (index, parent) in ctx.parents.rotation() {
        let attempt = if parent.is_direct() {
            TcpStream::connect((host, port)).map_err(|e| ProxyError::connect(e.to_string()))
        } else {
            establish_tunnel_via_parent(ctx, index, parent, &request)
        };
        match attempt {
            Ok(stream) => {
                ctx.parents.record_success(index);
                return Ok(stream);
            }
            Err(error) if error.is_recoverable_before_headers() => {
                last_err = Some(error);
                continue;
            }
            Err(error) => return Err(error),
        }
    }
    Err(last_err.unwrap_or_else(|| ProxyError::connect("parent rotation exhausted")))
}

fn synthetic_connect_request(host: &str, port: u16) -> RequestRecord {
    RequestRecord {
        method: "CONNECT".to_string(),
        uri: format!("{host}:{port}"),
        version: HttpVersion::Http11,
        headers: HeaderMap::new(),
        host: host.to_string(),
        port,
        framing: BodyFraming::None,
    }
}

fn establish_tunnel_via_parent(
    ctx: &Context,
    index: usize,
    parent: &ParentProxy,
    request: &RequestRecord,
) -> ProxyResult<TcpStream> {
    let (mut upstream, needs_auth) = match ctx.pool.try_take_idle(index) {
        Some(stream) => (stream, false),
        None => (connect_parent(parent)?, true),
    };

    // CONNECT carries no body, so this reader is never actually read from;
    // it only exists to satisfy authenticate_and_exchange's signature.
    let mut unused_reader = BufReader::new(upstream.try_clone().map_err(ProxyError::upstream_io)?);
    let (response, reader) = if needs_auth {
        authenticate_and_exchange(ctx, &mut upstream, &mut unused_reader, request)?
    } else {
        plain_exchange(ctx, &mut upstream, &mut unused_reader, request)?
    };
    drop(reader);

    if response.status != 200 {
        ctx.pool.release(upstream, index, PoolState::Dirty);
        return Err(ProxyError::connect(format!("parent refused CONNECT with status {}", response.status)));
    }
    Ok(upstream)
}

fn connect_parent(parent: &ParentProxy) -> ProxyResult<TcpStream> {
    let addrs = resolve_parent(parent)?;
    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect(addr) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_err = Some(e),
        }
    }
    Err(ProxyError::connect(
        last_err.map(|e| e.to_string()).unwrap_or_else(|| "no addresses to try".to_string()),
    ))
}

/// Resolves and caches the parent's address list; later calls reuse the
/// cached result rather than re-resolving on every connect.
fn resolve_parent(parent: &ParentProxy) -> ProxyResult<Vec<SocketAddr>> {
    let ParentKind::Proxy { host, port } = &parent.kind else {
        return Err(ProxyError::connect("a DIRECT entry does not resolve to an address"));
    };

    let mut cached = parent.resolved.lock().expect("parent resolve cache poisoned");
    if let Some(addrs) = cached.as_ref() {
        return Ok(addrs.clone());
    }
    let addrs: Vec<SocketAddr> = (host.as_str(), *port)
        .to_socket_addrs()
        .map_err(|e| ProxyError::resolve(e.to_string()))?
        .collect();
    if addrs.is_empty() {
        return Err(ProxyError::resolve(format!("no addresses for {host}:{port}")));
    }
    *cached = Some(addrs.clone());
    Ok(addrs)
}

/// Synthesizes a best-effort error response for failures that occur
/// before or during header relay. Silent for kinds where the client is
/// already known to be unreachable or where no report is meaningful.
fn respond_error(writer: &mut TcpStream, error: &ProxyError) {
    let (status, reason) = match error {
        ProxyError::Resolve(_) | ProxyError::Connect(_) | ProxyError::UpstreamIo(_) => (502, "Bad Gateway"),
        ProxyError::AuthFailed(_) => (407, "Proxy Authentication Required"),
        ProxyError::Protocol(_) => (400, "Bad Request"),
        ProxyError::ClientIo(_) | ProxyError::ShutdownRequested | ProxyError::Config(_) => return,
    };
    let mut headers = HeaderMap::new();
    headers.push("Content-Length", "0");
    headers.push("Connection", "close");
    let _ = http::write_status_line(writer, &HttpVersion::Http11, status, reason);
    let _ = http::write_headers(writer, &headers);
    let _ = writer.flush();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AuthScheme;
    use crate::noproxy::NoProxyList;
    use crate::parent::ParentSelector;
    use crate::pool::Pool;
    use crate::scanner::ScannerConfig;
    use crate::util::headers::HeaderMap as UtilHeaderMap;
    use std::net::TcpListener;

    fn base_context() -> Context {
        Context {
            credentials: Credentials {
                user: "alice".into(),
                domain: "CORP".into(),
                workstation: "WS1".into(),
                scheme: AuthScheme::NtlmV2,
                lm_hash: None,
                nt_hash: None,
                ntlmv2_hash: None,
                negotiate_flags: None,
                kerberos_available: false,
            },
            parents: ParentSelector::new(Vec::new()),
            pool: Pool::new(),
            pac: None,
            noproxy: NoProxyList::default(),
            header_substitutions: UtilHeaderMap::new(),
            socks_users: Vec::new(),
            scanner: ScannerConfig::default(),
            request_log_level: 0,
            basic_to_ntlm_bridging: false,
        }
    }

    #[test]
    fn no_parents_and_no_noproxy_match_is_a_connect_error() {
        let ctx = base_context();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let _peer = TcpStream::connect(addr).unwrap();
        let (mut accepted, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(accepted.try_clone().unwrap());
        let request = RequestRecord {
            method: "GET".into(),
            uri: "http://example.com/".into(),
            version: HttpVersion::Http11,
            headers: UtilHeaderMap::new(),
            host: "example.com".into(),
            port: 80,
            framing: BodyFraming::None,
        };
        let err = forward(&ctx, &mut accepted, &mut reader, &request).unwrap_err();
        assert!(matches!(err, ProxyError::Connect(_)));
    }

    #[test]
    fn noproxy_match_bypasses_empty_parent_list() {
        let mut ctx = base_context();
        ctx.noproxy = NoProxyList::new(["127.0.0.1".to_string()]);
        assert!(ctx.noproxy.matches("127.0.0.1"));
    }
}
