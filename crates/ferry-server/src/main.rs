use std::io;
use std::net::{SocketAddr, TcpListener};
use std::path::PathBuf;
use std::sync::Arc;

use socket2::{Domain, Protocol, Socket, Type};
use tracing::{error, info};

use ferry_transfer::{SenderConfig, load_catalog, run_sender};

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ferry_server=debug,ferry_transfer=info".into()),
        )
        .init();

    // Config
    let host = std::env::var("FERRY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("FERRY_PORT")
        .unwrap_or_else(|_| "8080".into())
        .parse()?;
    let catalog_path: PathBuf = std::env::var("FERRY_CATALOG")
        .unwrap_or_else(|_| "file_list.txt".into())
        .into();
    let storage_dir: PathBuf = std::env::var("FERRY_STORAGE_DIR")
        .unwrap_or_else(|_| ".".into())
        .into();

    let catalog = load_catalog(&catalog_path)?;
    info!(files = catalog.len(), path = %catalog_path.display(), "catalog loaded");

    let config = Arc::new(SenderConfig {
        storage_dir,
        catalog,
    });

    let bind_addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    let listener = create_listener(bind_addr)?;
    info!(%bind_addr, "listening");

    // One thread per connection; each owns its transfer table exclusively.
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let config = config.clone();
                std::thread::spawn(move || {
                    let peer = stream
                        .peer_addr()
                        .map(|a| a.to_string())
                        .unwrap_or_else(|_| "?".into());
                    if let Err(e) = run_sender(stream, &config) {
                        error!(%peer, error = %e, "connection failed");
                    }
                });
            }
            Err(e) => error!(error = %e, "accept failed"),
        }
    }
    Ok(())
}

/// TCP listener with SO_REUSEADDR so restarts do not trip over
/// TIME_WAIT sockets.
fn create_listener(addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(128)?;
    Ok(socket.into())
}
