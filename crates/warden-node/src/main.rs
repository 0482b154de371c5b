//! Warden directory service daemon.
//!
//! Frames JSON-lines requests off TCP connections into the RPC handler
//! layer. One task per connection; the directory engine itself is
//! synchronous and shared behind an `Arc`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::{fmt, EnvFilter};

use warden_core::Directory;
use warden_proto::{Request, Response, WireCode};
use warden_rpc::RpcServer;
use warden_store::{MemoryStore, SledStore, Storage};
use warden_token::KeyedTokenService;

/// Warden directory service.
///
/// A network-accessible identity and authorization service: entities,
/// groups, capabilities, and signed capability tokens.
#[derive(Parser, Debug)]
#[command(name = "warden-node")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to data directory
    #[arg(short, long, env = "WARDEN_DATA_DIR", default_value = "/var/lib/warden")]
    data_dir: PathBuf,

    /// Keep all records in memory (testing only; nothing survives exit)
    #[arg(long, env = "WARDEN_IN_MEMORY", default_value = "false")]
    in_memory: bool,

    /// Listen address for client connections
    #[arg(short, long, env = "WARDEN_LISTEN_ADDR", default_value = "0.0.0.0:1729")]
    listen_addr: String,

    /// Refuse all writes
    #[arg(long, env = "WARDEN_READONLY", default_value = "false")]
    readonly: bool,

    /// One-shot bootstrap as ENTITY:SECRET, run before serving
    #[arg(long, env = "WARDEN_BOOTSTRAP")]
    bootstrap: Option<String>,

    /// File holding the 32-byte hex token signing key; a random
    /// ephemeral key is used when absent
    #[arg(long, env = "WARDEN_TOKEN_KEY_FILE")]
    token_key_file: Option<PathBuf>,

    /// Lifetime of issued tokens in seconds
    #[arg(long, env = "WARDEN_TOKEN_LIFETIME", default_value = "28800")]
    token_lifetime: i64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "WARDEN_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log format (plain, json)
    #[arg(long, env = "WARDEN_LOG_FORMAT", default_value = "plain")]
    log_format: String,
}

fn setup_logging(log_level: &str, log_format: &str) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    match log_format.to_lowercase().as_str() {
        "json" => {
            let subscriber = fmt::Subscriber::builder()
                .with_env_filter(filter)
                .json()
                .flatten_event(true)
                .with_current_span(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .context("Failed to set subscriber")?;
        }
        _ => {
            let subscriber = fmt::Subscriber::builder()
                .with_env_filter(filter)
                .with_target(true)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .context("Failed to set subscriber")?;
        }
    }

    Ok(())
}

fn build_storage(args: &Args) -> Result<Arc<dyn Storage>> {
    if args.in_memory {
        warn!("Using in-memory storage; records will not survive restart");
        return Ok(Arc::new(MemoryStore::new()));
    }
    if !args.data_dir.exists() {
        std::fs::create_dir_all(&args.data_dir).context("Failed to create data directory")?;
        info!(path = %args.data_dir.display(), "Created data directory");
    }
    let store = SledStore::open(&args.data_dir.join("directory"))
        .context("Failed to open directory store")?;
    Ok(Arc::new(store))
}

fn build_token_service(args: &Args) -> Result<KeyedTokenService> {
    match &args.token_key_file {
        Some(path) => {
            let raw = std::fs::read_to_string(path).context("Failed to read token key file")?;
            let bytes = hex::decode(raw.trim()).context("Token key file is not valid hex")?;
            let key: [u8; 32] = bytes
                .try_into()
                .map_err(|_| anyhow::anyhow!("token key must be exactly 32 bytes"))?;
            Ok(KeyedTokenService::new(&key))
        }
        None => {
            warn!("No token key file; tokens will not survive restart");
            Ok(KeyedTokenService::ephemeral())
        }
    }
}

async fn serve_connection(server: Arc<RpcServer>, stream: TcpStream) {
    let peer = stream.peer_addr().ok();
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => server.handle(request),
            Err(e) => {
                debug!(peer = ?peer, error = %e, "Unparseable request");
                Response::error(WireCode::Malformed, format!("unparseable request: {e}"))
            }
        };

        let mut out = match serde_json::to_string(&response) {
            Ok(out) => out,
            Err(e) => {
                error!(error = %e, "Failed to encode response");
                break;
            }
        };
        out.push('\n');
        if write.write_all(out.as_bytes()).await.is_err() {
            break;
        }
    }
    debug!(peer = ?peer, "Connection closed");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(&args.log_level, &args.log_format)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        listen_addr = %args.listen_addr,
        readonly = args.readonly,
        "Starting warden node"
    );

    let storage = build_storage(&args)?;
    let crypto = Arc::from(warden_crypto::default_engine());
    let dir = Arc::new(Directory::new(storage, crypto).context("Failed to build directory")?);

    // Bootstrap runs before the listener exists, then the window closes
    // for the rest of the process lifetime.
    if let Some(pair) = &args.bootstrap {
        let Some((id, secret)) = pair.split_once(':') else {
            bail!("--bootstrap takes ENTITY:SECRET");
        };
        dir.make_bootstrap(id, secret)
            .context("Bootstrap failed")?;
    }
    dir.disable_bootstrap();
    dir.set_readonly(args.readonly);

    let tokens = Arc::new(build_token_service(&args)?);
    let server = Arc::new(
        RpcServer::new(dir, tokens)
            .with_token_lifetime(chrono::Duration::seconds(args.token_lifetime)),
    );

    let listener = TcpListener::bind(&args.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", args.listen_addr))?;
    info!(listen_addr = %args.listen_addr, "Node is ready to accept connections");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, "Connection accepted");
                        tokio::spawn(serve_connection(server.clone(), stream));
                    }
                    Err(e) => warn!(error = %e, "Accept failed"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
        }
    }

    info!("Warden node stopped");
    Ok(())
}
