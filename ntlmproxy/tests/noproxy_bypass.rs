//! A `NoProxy` wildcard match sends the request straight to the origin,
//! never touching the (deliberately unreachable) parent.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;

use ntlmproxy::context::Context;
use ntlmproxy::forwarder;
use ntlmproxy::model::{AuthScheme, Credentials, ParentProxy};
use ntlmproxy::noproxy::NoProxyList;
use ntlmproxy::parent::ParentSelector;
use ntlmproxy::pool::Pool;
use ntlmproxy::scanner::ScannerConfig;
use ntlmproxy::util::headers::HeaderMap;

#[test]
fn wildcard_noproxy_match_bypasses_the_parent() {
    let origin = TcpListener::bind("127.0.0.1:0").unwrap();
    let origin_addr = origin.local_addr().unwrap();
    let origin_thread = thread::spawn(move || {
        let (mut server, _) = origin.accept().unwrap();
        let mut request = [0u8; 3];
        server.read_exact(&mut request).unwrap();
        assert_eq!(&request, b"hi\n");
        server.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok").unwrap();
    });

    // A parent at a closed local port: any attempt to route through it
    // would fail the connect, proving the direct path was actually taken.
    let unreachable = TcpListener::bind("127.0.0.1:0").unwrap();
    let unreachable_addr = unreachable.local_addr().unwrap();
    drop(unreachable);

    let ctx = Context {
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
        parents: ParentSelector::new(vec![ParentProxy::proxy(
            unreachable_addr.ip().to_string(),
            unreachable_addr.port(),
        )]),
        pool: Pool::new(),
        pac: None,
        noproxy: NoProxyList::new(["*.local".to_string(), "127.0.0.1".to_string()]),
        header_substitutions: HeaderMap::new(),
        socks_users: Vec::new(),
        scanner: ScannerConfig::default(),
        request_log_level: 0,
        basic_to_ntlm_bridging: false,
    };

    let mut stream = forwarder::establish_tunnel(&ctx, "127.0.0.1", origin_addr.port()).unwrap();
    stream.write_all(b"hi\n").unwrap();
    let mut response = Vec::new();
    stream.read_to_end(&mut response).unwrap();
    assert!(String::from_utf8_lossy(&response).starts_with("HTTP/1.1 200 OK"));

    origin_thread.join().unwrap();
}
