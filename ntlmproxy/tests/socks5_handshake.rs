//! End-to-end SOCKS5 scenarios: a client offering only `NO_AUTH` gets
//! rejected once a user/pass list is configured, and a client that
//! completes USER/PASS subnegotiation gets bridged to the target.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;

use ntlmproxy::context::Context;
use ntlmproxy::model::{AuthScheme, Credentials};
use ntlmproxy::noproxy::NoProxyList;
use ntlmproxy::parent::ParentSelector;
use ntlmproxy::pool::Pool;
use ntlmproxy::scanner::ScannerConfig;
use ntlmproxy::socks5;
use ntlmproxy::util::headers::HeaderMap;

fn base_context(socks_users: Vec<(String, String)>) -> Context {
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
        noproxy: NoProxyList::new(["127.0.0.1".to_string()]),
        header_substitutions: HeaderMap::new(),
        socks_users,
        scanner: ScannerConfig::default(),
        request_log_level: 0,
        basic_to_ntlm_bridging: false,
    }
}

#[test]
fn no_auth_only_client_is_rejected_when_users_are_configured() {
    let ctx = base_context(vec![("alice".into(), "wonderland".into())]);

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let worker = thread::spawn(move || {
        let (server, _) = listener.accept().unwrap();
        socks5::handle_socks_connection(&ctx, server).unwrap();
    });

    let mut client = TcpStream::connect(addr).unwrap();
    client.write_all(&[0x05, 0x01, 0x00]).unwrap(); // version 5, one method: NO_AUTH
    let mut reply = [0u8; 2];
    client.read_exact(&mut reply).unwrap();
    assert_eq!(reply, [0x05, 0xff]);

    // The handler returns without reading further; the socket just closes.
    let mut buf = [0u8; 1];
    assert_eq!(client.read(&mut buf).unwrap(), 0);

    worker.join().unwrap();
}

#[test]
fn user_pass_success_bridges_to_target() {
    let target = TcpListener::bind("127.0.0.1:0").unwrap();
    let target_addr = target.local_addr().unwrap();
    let target_thread = thread::spawn(move || {
        let (mut server, _) = target.accept().unwrap();
        let mut buf = [0u8; 4];
        server.read_exact(&mut buf).unwrap();
        server.write_all(&buf).unwrap();
    });

    let ctx = base_context(vec![("alice".into(), "wonderland".into())]);
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let worker = thread::spawn(move || {
        let (server, _) = listener.accept().unwrap();
        socks5::handle_socks_connection(&ctx, server).unwrap();
    });

    let mut client = TcpStream::connect(addr).unwrap();
    client.write_all(&[0x05, 0x01, 0x02]).unwrap(); // offer USER_PASS only
    let mut method_reply = [0u8; 2];
    client.read_exact(&mut method_reply).unwrap();
    assert_eq!(method_reply, [0x05, 0x02]);

    let mut subneg = vec![0x01, 5];
    subneg.extend_from_slice(b"alice");
    subneg.push(9);
    subneg.extend_from_slice(b"wonderland");
    client.write_all(&subneg).unwrap();
    let mut auth_reply = [0u8; 2];
    client.read_exact(&mut auth_reply).unwrap();
    assert_eq!(auth_reply, [0x01, 0x00]);

    let ip = target_addr.ip().to_string();
    let octets: Vec<u8> = ip.split('.').map(|s| s.parse().unwrap()).collect();
    let mut connect_req = vec![0x05, 0x01, 0x00, 0x01];
    connect_req.extend_from_slice(&octets);
    connect_req.extend_from_slice(&target_addr.port().to_be_bytes());
    client.write_all(&connect_req).unwrap();

    let mut connect_reply = [0u8; 10];
    client.read_exact(&mut connect_reply).unwrap();
    assert_eq!(connect_reply[1], 0x00, "expected SOCKS success reply");

    client.write_all(b"ping").unwrap();
    let mut echoed = [0u8; 4];
    client.read_exact(&mut echoed).unwrap();
    assert_eq!(&echoed, b"ping");

    target_thread.join().unwrap();
    worker.join().unwrap();
}
