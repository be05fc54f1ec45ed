//! ssostore server - guarded object storage over HTTP.
//!
//! Serves the storage API backed by a MinIO (or any S3-compatible) endpoint.
//! A `.env` file in the working directory is loaded before the environment
//! is read.
//!
//! # Usage
//!
//! ```text
//! MINIO_ENDPOINT=localhost:9000 \
//! MINIO_ACCESS_KEY_ID=minio \
//! MINIO_SECRET_ACCESS_KEY=minio123 \
//! ssostore-server
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `MINIO_ENDPOINT` | *(required)* | Object store `host:port` |
//! | `MINIO_ACCESS_KEY_ID` | *(required)* | Access key |
//! | `MINIO_SECRET_ACCESS_KEY` | *(required)* | Secret key |
//! | `MINIO_SECURE` | `false` | Use TLS towards the object store |
//! | `MINIO_REGION` | `us-east-1` | Signing region |
//! | `LISTEN_ADDR` | `127.0.0.1:4000` | Bind address |
//! | `GO_PORT` / `PORT` | *(unset)* | Port only, on the default host |
//! | `REQUEST_TIMEOUT_SECS` | `30` | Per-request storage deadline |
//! | `GO_ENV` | *(unset)* | `development` switches to human-readable debug logs, `production` turns off per-request logs |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

use std::net::SocketAddr;

use anyhow::{Context, Result};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use ssostore_core::{ServerConfig, StorageConfig};
use ssostore_http::{StorageHttpConfig, StorageHttpService};
use ssostore_storage::GuardedStorage;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Server version reported at startup.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config
/// value. Development mode logs human-readable lines; otherwise JSON.
fn init_tracing(log_level: &str, development: bool) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if development {
        builder.init();
    } else {
        builder.json().init();
    }

    Ok(())
}

/// Run the accept loop, serving connections until a shutdown signal is received.
///
/// On shutdown the `cancel` token is triggered so in-flight storage calls stop,
/// then open connections are drained.
async fn serve(
    listener: TcpListener,
    service: StorageHttpService,
    cancel: CancellationToken,
) -> Result<()> {
    let graceful = hyper_util::server::graceful::GracefulShutdown::new();
    let http = HttpConnBuilder::new(TokioExecutor::new());

    let shutdown = async {
        let signal = shutdown_signal().await;
        info!(signal, "received shutdown signal, draining connections");
    };

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, peer_addr) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        continue;
                    }
                };

                let svc = service.clone();
                let conn = http.serve_connection(TokioIo::new(stream), svc);
                let conn = graceful.watch(conn.into_owned());

                tokio::spawn(async move {
                    if let Err(e) = conn.await {
                        error!(peer_addr = %peer_addr, error = %e, "connection error");
                    }
                });
            }

            () = &mut shutdown => {
                info!("shutting down gracefully");
                break;
            }
        }
    }

    cancel.cancel();
    graceful.shutdown().await;
    info!("all connections drained, exiting");

    Ok(())
}

/// Wait for ctrl-c or, on unix, SIGTERM. Returns the signal's name.
async fn shutdown_signal() -> &'static str {
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => "SIGINT",
        () = terminate => "SIGTERM",
    }
}

/// Address the health probe should dial for a given bind address.
fn probe_addr(listen_addr: &str) -> String {
    listen_addr.replace("0.0.0.0", "127.0.0.1")
}

/// Whether a raw HTTP response reports a healthy server.
fn is_healthy_response(response: &str) -> bool {
    response.contains("200 OK") && response.contains("\"running\"")
}

/// Perform a health check by connecting to the server and requesting `/health`.
async fn run_health_check(addr: &str) -> Result<()> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("cannot connect to {addr}"))?;

    let (mut reader, mut writer) = stream.into_split();

    let request = format!("GET /health HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    writer.write_all(request.as_bytes()).await?;
    writer.shutdown().await?;

    let mut response = String::new();
    reader.read_to_string(&mut response).await?;

    if is_healthy_response(&response) {
        Ok(())
    } else {
        anyhow::bail!("unhealthy response from {addr}")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let server_config = ServerConfig::from_env().context("invalid server configuration")?;

    // Handle --health-check flag for container health probes.
    if std::env::args().any(|a| a == "--health-check") {
        let healthy = run_health_check(&probe_addr(&server_config.listen_addr))
            .await
            .is_ok();
        std::process::exit(i32::from(!healthy));
    }

    init_tracing(&server_config.log_level, server_config.development)?;

    let storage_config = StorageConfig::from_env().context("invalid storage configuration")?;
    info!(
        endpoint = %storage_config.endpoint,
        secure = storage_config.secure,
        region = %storage_config.region,
        "initializing storage client",
    );
    let storage =
        GuardedStorage::connect(&storage_config).context("failed to build storage client")?;

    let cancel = CancellationToken::new();
    let service = StorageHttpService::new(
        storage,
        StorageHttpConfig {
            request_timeout: server_config.request_timeout(),
            log_requests: server_config.request_logging,
        },
    )
    .with_shutdown(cancel.clone());

    let addr: SocketAddr = server_config
        .listen_addr
        .parse()
        .with_context(|| format!("invalid bind address: {}", server_config.listen_addr))?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(
        %addr,
        version = VERSION,
        request_timeout_secs = server_config.request_timeout_secs,
        development = server_config.development,
        "starting ssostore server",
    );

    serve(listener, service, cancel).await
}
