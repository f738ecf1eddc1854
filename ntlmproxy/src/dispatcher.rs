//! Owns the listener set (proxy, SOCKS5, fixed tunnels) and the join
//! queue, and turns termination signals into graceful-then-forced
//! shutdown. One worker thread per accepted connection; `--debug-serial`
//! runs every connection on this thread instead and disables the join
//! queue, for troubleshooting only.

use std::fs;
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use signal_hook::consts::{SIGHUP, SIGINT, SIGPIPE, SIGTERM};
use signal_hook::iterator::Signals;
use tracing::{error, info, warn};

use ntlmproxy_core::error::ProxyError;
use ntlmproxy_core::ProxyResult;

use crate::config::{ListenSpec, TunnelSpec};
use crate::context::Context;
use crate::forwarder;
use crate::socks5;

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// `0` running, `1` stop-accepting-and-wait, `>=2` exit without joining.
/// Flipped by repeated `SIGINT`/`SIGTERM`/`SIGHUP`.
#[derive(Clone)]
pub struct ShutdownSignal {
    generation: Arc<AtomicUsize>,
}

impl ShutdownSignal {
    pub fn install() -> ProxyResult<Self> {
        let generation = Arc::new(AtomicUsize::new(0));
        let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])
            .map_err(|e| ProxyError::config(format!("installing signal handler: {e}")))?;
        let counter = generation.clone();
        thread::spawn(move || {
            for signal in signals.forever() {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                warn!(signal, generation = n, "termination signal received");
            }
        });

        // The default SIGPIPE action (terminate) is wrong for a proxy
        // that routinely writes to a peer that already hung up; a write
        // returning EPIPE is handled like any other I/O error instead.
        unsafe {
            signal_hook::low_level::register(SIGPIPE, || {})
                .map_err(|e| ProxyError::config(format!("ignoring SIGPIPE: {e}")))?;
        }

        Ok(Self { generation })
    }

    pub fn generation(&self) -> usize {
        self.generation.load(Ordering::SeqCst)
    }
}

/// Decimal pid + newline, removed on drop. A `--daemonize` double-fork is
/// out of scope; the flag is accepted and warned about, not implemented.
pub struct PidFileGuard {
    path: Option<PathBuf>,
}

impl PidFileGuard {
    pub fn write(path: Option<&Path>) -> ProxyResult<Self> {
        match path {
            Some(path) => {
                fs::write(path, format!("{}\n", std::process::id()))
                    .map_err(|e| ProxyError::config(format!("writing PID file {path:?}: {e}")))?;
                Ok(Self { path: Some(path.to_path_buf()) })
            }
            None => Ok(Self { path: None }),
        }
    }
}

impl Drop for PidFileGuard {
    fn drop(&mut self) {
        if let Some(path) = &self.path {
            if let Err(error) = fs::remove_file(path) {
                warn!(?path, %error, "failed to remove PID file on exit");
            }
        }
    }
}

#[derive(Clone)]
enum ListenerKind {
    Proxy,
    Socks5,
    Tunnel { target_host: String, target_port: u16 },
}

struct BoundListener {
    listener: TcpListener,
    kind: ListenerKind,
}

pub struct Dispatcher {
    listeners: Vec<BoundListener>,
    stack_size: Option<usize>,
    debug_serial: bool,
}

impl Dispatcher {
    pub fn bind(
        proxy_specs: &[ListenSpec],
        socks_specs: &[ListenSpec],
        tunnel_specs: &[TunnelSpec],
        stack_size: Option<usize>,
        debug_serial: bool,
    ) -> ProxyResult<Self> {
        let mut listeners = Vec::new();
        for spec in proxy_specs {
            listeners.push(bind_one(&spec.addr, spec.port, ListenerKind::Proxy)?);
        }
        for spec in socks_specs {
            listeners.push(bind_one(&spec.addr, spec.port, ListenerKind::Socks5)?);
        }
        for spec in tunnel_specs {
            let kind = ListenerKind::Tunnel {
                target_host: spec.target_host.clone(),
                target_port: spec.target_port,
            };
            listeners.push(bind_one(&spec.listen_addr, spec.listen_port, kind)?);
        }
        Ok(Self { listeners, stack_size, debug_serial })
    }

    /// Runs until `shutdown.generation() >= 1`, then stops accepting and
    /// waits for in-flight workers to join. `generation() >= 2` (a second
    /// signal) exits immediately without joining.
    pub fn run(&self, ctx: Arc<Context>, shutdown: &ShutdownSignal) -> ProxyResult<()> {
        let mut join_queue: Vec<JoinHandle<()>> = Vec::new();

        loop {
            let generation = shutdown.generation();
            if generation >= 2 {
                info!(pending = join_queue.len(), "second signal received, exiting without joining workers");
                return Ok(());
            }
            if generation >= 1 {
                break;
            }

            let mut accepted_any = false;
            for bound in &self.listeners {
                match bound.listener.accept() {
                    Ok((stream, peer)) => {
                        accepted_any = true;
                        self.dispatch(ctx.clone(), stream, &bound.kind, peer, &mut join_queue);
                    }
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                    Err(e) => warn!(error = %e, "accept failed"),
                }
            }

            if !self.debug_serial {
                drain_join_queue(&mut join_queue);
            }

            if !accepted_any {
                thread::sleep(POLL_INTERVAL);
            }
        }

        info!(pending = join_queue.len(), "graceful shutdown: waiting for in-flight workers");
        for handle in join_queue {
            let _ = handle.join();
        }
        Ok(())
    }

    fn dispatch(
        &self,
        ctx: Arc<Context>,
        stream: TcpStream,
        kind: &ListenerKind,
        peer: SocketAddr,
        join_queue: &mut Vec<JoinHandle<()>>,
    ) {
        let kind = kind.clone();
        if self.debug_serial {
            run_worker(&ctx, stream, &kind, peer);
            return;
        }

        let mut builder = thread::Builder::new().name(format!("worker-{peer}"));
        if let Some(size) = self.stack_size {
            builder = builder.stack_size(size);
        }
        match builder.spawn(move || run_worker(&ctx, stream, &kind, peer)) {
            Ok(handle) => join_queue.push(handle),
            Err(error) => error!(%error, "failed to spawn worker thread"),
        }
    }
}

fn bind_one(addr: &str, port: u16, kind: ListenerKind) -> ProxyResult<BoundListener> {
    let listener = TcpListener::bind((addr, port))
        .map_err(|e| ProxyError::config(format!("binding {addr}:{port}: {e}")))?;
    listener
        .set_nonblocking(true)
        .map_err(|e| ProxyError::config(format!("setting {addr}:{port} nonblocking: {e}")))?;
    info!(addr, port, "listening");
    Ok(BoundListener { listener, kind })
}

fn run_worker(ctx: &Context, stream: TcpStream, kind: &ListenerKind, peer: SocketAddr) {
    let result = match kind {
        ListenerKind::Proxy => forwarder::handle_proxy_connection(ctx, stream),
        ListenerKind::Socks5 => socks5::handle_socks_connection(ctx, stream),
        ListenerKind::Tunnel { target_host, target_port } => {
            socks5::handle_fixed_tunnel(ctx, stream, target_host, *target_port)
        }
    };
    if let Err(error) = result {
        warn!(%peer, %error, "worker ended with error");
    }
}

fn drain_join_queue(join_queue: &mut Vec<JoinHandle<()>>) {
    let mut i = 0;
    while i < join_queue.len() {
        if join_queue[i].is_finished() {
            let handle = join_queue.swap_remove(i);
            let _ = handle.join();
        } else {
            i += 1;
        }
    }
}
