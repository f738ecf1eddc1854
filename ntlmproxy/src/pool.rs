//! Upstream connection pool, keyed by parent index. Guarded by a single
//! mutex whose hold time is bounded to list mutation; connect and
//! authenticate happen outside the lock.

use std::net::TcpStream;
use std::sync::Mutex;

use crate::model::PoolState;

struct PooledEntry {
    stream: TcpStream,
    parent_index: usize,
}

#[derive(Default)]
pub struct Pool {
    idle: Mutex<Vec<PooledEntry>>,
}

impl Pool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns an idle, already-authenticated socket for
    /// `parent_index`, if one exists. The pool never hands out the same
    /// socket twice: removal happens under the lock before the socket is
    /// returned to the caller.
    pub fn try_take_idle(&self, parent_index: usize) -> Option<TcpStream> {
        let mut idle = self.idle.lock().expect("pool mutex poisoned");
        let position = idle.iter().position(|e| e.parent_index == parent_index)?;
        Some(idle.remove(position).stream)
    }

    /// Returns a connection to the pool (`Authenticated`) or drops it
    /// (`Dirty`/`Fresh` is only meaningful mid-lease; by release time a
    /// connection worth keeping is always `Authenticated`).
    pub fn release(&self, stream: TcpStream, parent_index: usize, state: PoolState) {
        if state != PoolState::Authenticated {
            return; // drop(stream) closes it
        }
        let mut idle = self.idle.lock().expect("pool mutex poisoned");
        idle.push(PooledEntry { stream, parent_index });
    }

    pub fn idle_count(&self) -> usize {
        self.idle.lock().expect("pool mutex poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    fn loopback_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (server, _) = listener.accept().unwrap();
        (client, server)
    }

    #[test]
    fn release_then_take_returns_same_parent_socket() {
        let pool = Pool::new();
        let (client, _server) = loopback_pair();
        pool.release(client, 2, PoolState::Authenticated);
        assert_eq!(pool.idle_count(), 1);
        let taken = pool.try_take_idle(2);
        assert!(taken.is_some());
        assert_eq!(pool.idle_count(), 0);
    }

    #[test]
    fn dirty_release_is_not_pooled() {
        let pool = Pool::new();
        let (client, _server) = loopback_pair();
        pool.release(client, 2, PoolState::Dirty);
        assert_eq!(pool.idle_count(), 0);
    }

    #[test]
    fn take_for_wrong_parent_index_returns_none() {
        let pool = Pool::new();
        let (client, _server) = loopback_pair();
        pool.release(client, 2, PoolState::Authenticated);
        assert!(pool.try_take_idle(5).is_none());
        assert_eq!(pool.idle_count(), 1);
    }
}
