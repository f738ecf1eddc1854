//! Entry point. Parses the CLI, merges in an optional config file, then
//! either runs a one-shot diagnostic mode (`--hash-print`,
//! `--magic-detect`) or starts the dispatcher and blocks until a second
//! termination signal or a clean join of every worker.

use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};

use ntlmproxy::config::{self, Cli, ResolvedConfig};
use ntlmproxy::dispatcher::{Dispatcher, PidFileGuard, ShutdownSignal};
use ntlmproxy::forwarder;
use ntlmproxy::model::AuthScheme;
use ntlmproxy::util::bytes::encode_hex;
use ntlmproxy::util::crypto::hash::{lm_hash, nt_hash};
use ntlmproxy::util::crypto::v2::ntlmv2_key;

use ntlmproxy_core::error::ProxyError;
use ntlmproxy_core::ProxyResult;

fn main() -> ExitCode {
    init_logging();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!(%error, "fatal startup error");
            ExitCode::FAILURE
        }
    }
}

#[cfg(feature = "logging")]
fn init_logging() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

#[cfg(not(feature = "logging"))]
fn init_logging() {}

fn run() -> ProxyResult<()> {
    let cli = Cli::parse();
    let file = match &cli.config_file {
        Some(path) => Some(config::read_config_file(path)?),
        None => None,
    };
    let mut resolved = config::merge(&cli, file)?;
    ensure_credential_material(&mut resolved)?;

    if cli.hash_print {
        return run_hash_print(&resolved);
    }
    if let Some(url) = &cli.magic_detect {
        return run_magic_detect(&resolved, url);
    }
    run_proxy(&resolved)
}

/// Prompts on stdin when neither a password nor a pre-computed hash was
/// configured. `config::merge` stays pure and does no I/O of its own;
/// this is the one place that fills the gap it deliberately leaves open.
fn ensure_credential_material(resolved: &mut ResolvedConfig) -> ProxyResult<()> {
    let has_hash =
        resolved.credentials.has_lm() || resolved.credentials.has_nt() || resolved.credentials.has_ntlmv2();
    if resolved.password.is_some() || has_hash {
        return Ok(());
    }
    print!("Password for {}: ", resolved.credentials.user);
    io::stdout().flush().ok();
    let mut line = String::new();
    io::stdin().read_line(&mut line).map_err(ProxyError::client_io)?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        return Err(ProxyError::config("no password or pre-computed hash configured"));
    }
    resolved.password = Some(password);
    Ok(())
}

/// Prints the LM/NT/NTLMv2 hash triple for the configured identity and
/// exits. A slot already supplied via `--hash` is echoed back unchanged;
/// an absent slot is derived from the password when one is available.
fn run_hash_print(resolved: &ResolvedConfig) -> ProxyResult<()> {
    let creds = &resolved.credentials;
    let password = resolved.password.as_deref();

    let lm = match creds.lm_hash {
        Some(hash) => Some(hash),
        None => password.map(lm_hash).transpose()?,
    };
    let nt = match creds.nt_hash {
        Some(hash) => Some(hash),
        None => password.map(nt_hash),
    };
    let ntlmv2 = match creds.ntlmv2_hash {
        Some(hash) => Some(hash),
        None => match nt {
            Some(nt) => Some(ntlmv2_key(&nt, &creds.user, &creds.domain)?),
            None => None,
        },
    };

    println!("User:   {}\\{}", creds.domain, creds.user);
    println!("LM:     {}", hex_or_dash(lm));
    println!("NT:     {}", hex_or_dash(nt));
    println!("NTLMv2: {}", hex_or_dash(ntlmv2));
    Ok(())
}

fn hex_or_dash(value: Option<[u8; 16]>) -> String {
    match value {
        Some(bytes) => encode_hex(&bytes),
        None => "-".to_string(),
    }
}

/// Tries every auth scheme against the configured parent(s) for one URL
/// and reports which ones the parent accepts, using the same tunnel
/// establishment (connect + NTLM dance) real traffic goes through.
fn run_magic_detect(resolved: &ResolvedConfig, url: &str) -> ProxyResult<()> {
    let (host, port) = parse_target(url)?;
    const SCHEMES: [AuthScheme; 5] =
        [AuthScheme::NtlmV2, AuthScheme::Ntlm, AuthScheme::Ntlm2Sr, AuthScheme::Nt, AuthScheme::Lm];

    for scheme in SCHEMES {
        let mut attempt = resolved.clone();
        attempt.credentials.scheme = scheme;
        let ctx = attempt.build_context()?;
        match forwarder::establish_tunnel(&ctx, &host, port) {
            Ok(_stream) => println!("{scheme:?}: OK"),
            Err(error) => println!("{scheme:?}: FAILED ({error})"),
        }
    }
    Ok(())
}

fn parse_target(url: &str) -> ProxyResult<(String, u16)> {
    let without_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    let authority = without_scheme.split(['/', '?', '#']).next().unwrap_or(without_scheme);
    let default_port = if url.starts_with("https://") { 443 } else { 80 };
    match authority.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse()
                .map_err(|_| ProxyError::config(format!("bad port in magic-detect target: {url:?}")))?;
            Ok((host.to_string(), port))
        }
        None => Ok((authority.to_string(), default_port)),
    }
}

fn run_proxy(resolved: &ResolvedConfig) -> ProxyResult<()> {
    if resolved.daemonize {
        warn!("--daemonize is accepted but not implemented; running in the foreground");
    }
    if let Some(uid) = resolved.uid {
        warn!(uid, "--uid is accepted but privilege drop is not implemented on this platform");
    }

    let pidfile = PidFileGuard::write(resolved.pidfile.as_deref())?;
    let shutdown = ShutdownSignal::install()?;
    let ctx = Arc::new(resolved.build_context()?);
    let dispatcher = Dispatcher::bind(
        &resolved.listeners,
        &resolved.socks_listeners,
        &resolved.tunnels,
        resolved.stack_size,
        resolved.debug_serial,
    )?;

    info!(
        listeners = resolved.listeners.len(),
        socks_listeners = resolved.socks_listeners.len(),
        tunnels = resolved.tunnels.len(),
        "starting"
    );
    let result = dispatcher.run(ctx, &shutdown);
    drop(pidfile);
    result
}
