//! Full-duplex byte relay between two sockets, used for CONNECT tunnels
//! and fixed port forwards alike. No protocol awareness: runs until
//! either side signals EOF or an I/O error.

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::thread;
use std::time::Duration;

const RELAY_BLOCK: usize = 16 * 1024;

/// Relays bytes in both directions until either side closes, then shuts
/// down both halves so the other direction's thread unblocks promptly.
pub fn bridge(a: TcpStream, b: TcpStream) -> io::Result<()> {
    let a_read = a.try_clone()?;
    let b_write = b.try_clone()?;
    let b_read = b;
    let a_write = a;

    let forward = thread::spawn(move || relay_one_way(a_read, b_write));
    let backward = relay_one_way(b_read, a_write);

    let forward_result = forward.join().unwrap_or(Ok(()));
    forward_result.and(backward)
}

fn relay_one_way(mut src: TcpStream, mut dst: TcpStream) -> io::Result<()> {
    let mut buf = [0u8; RELAY_BLOCK];
    loop {
        let n = match src.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                let _ = dst.shutdown(std::net::Shutdown::Both);
                return Err(e);
            }
        };
        if let Err(e) = dst.write_all(&buf[..n]) {
            let _ = src.shutdown(std::net::Shutdown::Both);
            return Err(e);
        }
    }
    let _ = dst.shutdown(std::net::Shutdown::Write);
    let _ = src.shutdown(std::net::Shutdown::Read);
    Ok(())
}

/// Sets read/write timeouts so a stalled bridge thread can still notice
/// a cooperative shutdown request; `None` blocks indefinitely.
pub fn set_relay_timeouts(stream: &TcpStream, timeout: Option<Duration>) -> io::Result<()> {
    stream.set_read_timeout(timeout)?;
    stream.set_write_timeout(timeout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn bridges_bytes_in_both_directions() {
        let listener_a = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr_a = listener_a.local_addr().unwrap();
        let listener_b = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr_b = listener_b.local_addr().unwrap();

        let client_a = TcpStream::connect(addr_a).unwrap();
        let client_b = TcpStream::connect(addr_b).unwrap();
        let (server_a, _) = listener_a.accept().unwrap();
        let (server_b, _) = listener_b.accept().unwrap();

        let bridge_thread = thread::spawn(move || bridge(server_a, server_b));

        let mut client_a = client_a;
        let mut client_b = client_b;
        client_a.write_all(b"hello from a").unwrap();
        client_a.shutdown(std::net::Shutdown::Write).unwrap();

        let mut received = Vec::new();
        client_b.read_to_end(&mut received).unwrap();
        assert_eq!(received, b"hello from a");

        client_b.shutdown(std::net::Shutdown::Write).unwrap();
        let _ = bridge_thread.join();
    }
}
