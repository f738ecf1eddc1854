//! SOCKS5 handler (RFC 1928 method negotiation + `CONNECT`, RFC 1929
//! username/password subnegotiation) and the fixed-target tunnel worker
//! that skips negotiation entirely. Both end the same way: a connected
//! socket handed to `tunnel::bridge`.

use std::io::{Read, Write};
use std::net::TcpStream;

use ntlmproxy_core::error::ProxyError;
use ntlmproxy_core::ProxyResult;

use crate::context::Context;
use crate::forwarder;
use crate::tunnel;

const VERSION: u8 = 0x05;
const METHOD_NO_AUTH: u8 = 0x00;
const METHOD_USER_PASS: u8 = 0x02;
const METHOD_NONE_ACCEPTABLE: u8 = 0xff;
const SUBNEG_VERSION: u8 = 0x01;
const CMD_CONNECT: u8 = 0x01;
const ATYP_IPV4: u8 = 0x01;
const ATYP_DOMAIN: u8 = 0x03;
const ATYP_IPV6: u8 = 0x04;

const REP_SUCCESS: u8 = 0x00;
const REP_GENERAL_FAILURE: u8 = 0x01;
const REP_NETWORK_UNREACHABLE: u8 = 0x03;
const REP_HOST_UNREACHABLE: u8 = 0x04;
const REP_CONNECTION_REFUSED: u8 = 0x05;
const REP_COMMAND_NOT_SUPPORTED: u8 = 0x07;
const REP_ADDRESS_TYPE_NOT_SUPPORTED: u8 = 0x08;

/// Drives one SOCKS5 connection end to end: method negotiation, optional
/// USER/PASS subnegotiation, the `CONNECT` request, then bridges.
pub fn handle_socks_connection(ctx: &Context, mut client: TcpStream) -> ProxyResult<()> {
    client.set_nodelay(true).ok();

    let method = negotiate_method(ctx, &mut client)?;
    if method == METHOD_NONE_ACCEPTABLE {
        return Ok(());
    }
    if method == METHOD_USER_PASS && !authenticate_user_pass(ctx, &mut client)? {
        return Ok(());
    }

    let (host, port) = match read_connect_request(&mut client)? {
        Some(target) => target,
        None => return Ok(()),
    };

    match forwarder::establish_tunnel(ctx, &host, port) {
        Ok(upstream) => {
            send_reply(&mut client, REP_SUCCESS)?;
            tunnel::bridge(client, upstream).map_err(ProxyError::client_io)
        }
        Err(error) => {
            send_reply(&mut client, reply_code_for(&error)).ok();
            Ok(())
        }
    }
}

/// A tunnel listener's worker: fixed `host:port` configured at startup,
/// no SOCKS negotiation at all. Per-connection logic is "decide direct
/// vs upstream via NoProxy, then bridge" — exactly `establish_tunnel`.
pub fn handle_fixed_tunnel(ctx: &Context, client: TcpStream, target_host: &str, target_port: u16) -> ProxyResult<()> {
    client.set_nodelay(true).ok();
    let upstream = forwarder::establish_tunnel(ctx, target_host, target_port)?;
    tunnel::bridge(client, upstream).map_err(ProxyError::client_io)
}

fn negotiate_method(ctx: &Context, client: &mut TcpStream) -> ProxyResult<u8> {
    let mut header = [0u8; 2];
    client.read_exact(&mut header).map_err(ProxyError::client_io)?;
    if header[0] != VERSION {
        return Err(ProxyError::protocol("unsupported SOCKS version"));
    }
    let mut methods = vec![0u8; header[1] as usize];
    client.read_exact(&mut methods).map_err(ProxyError::client_io)?;

    let requires_auth = !ctx.socks_users.is_empty();
    let chosen = if requires_auth {
        if methods.contains(&METHOD_USER_PASS) { METHOD_USER_PASS } else { METHOD_NONE_ACCEPTABLE }
    } else if methods.contains(&METHOD_NO_AUTH) {
        METHOD_NO_AUTH
    } else {
        METHOD_NONE_ACCEPTABLE
    };

    client.write_all(&[VERSION, chosen]).map_err(ProxyError::client_io)?;
    client.flush().map_err(ProxyError::client_io)?;
    Ok(chosen)
}

/// RFC 1929. Returns `Ok(false)` (not an error) when credentials are
/// rejected, since that's a normal negotiation outcome, not a protocol
/// violation.
fn authenticate_user_pass(ctx: &Context, client: &mut TcpStream) -> ProxyResult<bool> {
    let mut header = [0u8; 2];
    client.read_exact(&mut header).map_err(ProxyError::client_io)?;
    if header[0] != SUBNEG_VERSION {
        return Err(ProxyError::protocol("unsupported SOCKS subnegotiation version"));
    }
    let mut user = vec![0u8; header[1] as usize];
    client.read_exact(&mut user).map_err(ProxyError::client_io)?;

    let mut pass_len = [0u8; 1];
    client.read_exact(&mut pass_len).map_err(ProxyError::client_io)?;
    let mut pass = vec![0u8; pass_len[0] as usize];
    client.read_exact(&mut pass).map_err(ProxyError::client_io)?;

    let user = String::from_utf8_lossy(&user).into_owned();
    let pass = String::from_utf8_lossy(&pass).into_owned();
    let ok = ctx.socks_user_ok(&user, &pass);

    client
        .write_all(&[SUBNEG_VERSION, if ok { 0x00 } else { 0x01 }])
        .map_err(ProxyError::client_io)?;
    client.flush().map_err(ProxyError::client_io)?;
    Ok(ok)
}

/// Reads the `CONNECT` request. A command other than `CONNECT`, or an
/// unsupported address type, is reported to the client per RFC 1928 §6
/// and returns `Ok(None)` rather than an error, since the handler has
/// already replied and there's nothing left for the caller to do.
fn read_connect_request(client: &mut TcpStream) -> ProxyResult<Option<(String, u16)>> {
    let mut header = [0u8; 4];
    client.read_exact(&mut header).map_err(ProxyError::client_io)?;
    let (version, cmd, atyp) = (header[0], header[1], header[3]);
    if version != VERSION {
        return Err(ProxyError::protocol("unsupported SOCKS version in request"));
    }
    if cmd != CMD_CONNECT {
        send_reply(client, REP_COMMAND_NOT_SUPPORTED)?;
        return Ok(None);
    }

    let host = match atyp {
        ATYP_IPV4 => {
            let mut addr = [0u8; 4];
            client.read_exact(&mut addr).map_err(ProxyError::client_io)?;
            format!("{}.{}.{}.{}", addr[0], addr[1], addr[2], addr[3])
        }
        ATYP_DOMAIN => {
            let mut len = [0u8; 1];
            client.read_exact(&mut len).map_err(ProxyError::client_io)?;
            let mut name = vec![0u8; len[0] as usize];
            client.read_exact(&mut name).map_err(ProxyError::client_io)?;
            String::from_utf8(name).map_err(|_| ProxyError::protocol("non-UTF-8 SOCKS domain name"))?
        }
        ATYP_IPV6 => {
            send_reply(client, REP_ADDRESS_TYPE_NOT_SUPPORTED)?;
            return Ok(None);
        }
        _ => {
            send_reply(client, REP_ADDRESS_TYPE_NOT_SUPPORTED)?;
            return Ok(None);
        }
    };

    let mut port_bytes = [0u8; 2];
    client.read_exact(&mut port_bytes).map_err(ProxyError::client_io)?;
    let port = u16::from_be_bytes(port_bytes);
    Ok(Some((host, port)))
}

fn send_reply(client: &mut TcpStream, rep: u8) -> ProxyResult<()> {
    // BND.ADDR/BND.PORT are meaningless for a plain forward proxy; send
    // the RFC-sanctioned all-zeros IPv4 placeholder every implementation
    // accepts.
    let reply = [VERSION, rep, 0x00, ATYP_IPV4, 0, 0, 0, 0, 0, 0];
    client.write_all(&reply).map_err(ProxyError::client_io)?;
    client.flush().map_err(ProxyError::client_io)
}

fn reply_code_for(error: &ProxyError) -> u8 {
    match error {
        ProxyError::Resolve(_) => REP_HOST_UNREACHABLE,
        ProxyError::Connect(_) => REP_CONNECTION_REFUSED,
        ProxyError::AuthFailed(_) => REP_GENERAL_FAILURE,
        ProxyError::UpstreamIo(_) | ProxyError::ClientIo(_) => REP_NETWORK_UNREACHABLE,
        ProxyError::Protocol(_) | ProxyError::Config(_) | ProxyError::ShutdownRequested => REP_GENERAL_FAILURE,
    }
}
