mod producer;

use std::net::TcpStream;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use ferry_transfer::{CompletedLedger, DownloadQueue, Receiver, ReceiverConfig};

/// How long a quiet server may stall the stream before this end declares
/// the connection lost (covers server-side source failures mid-round).
const READ_TIMEOUT: Duration = Duration::from_secs(30);

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ferry_client=debug,ferry_transfer=info".into()),
        )
        .init();

    // Config
    let server_addr =
        std::env::var("FERRY_SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".into());
    let request_file: PathBuf = std::env::var("FERRY_REQUEST_FILE")
        .unwrap_or_else(|_| "input.txt".into())
        .into();
    let completed_log: PathBuf = std::env::var("FERRY_COMPLETED_LOG")
        .unwrap_or_else(|_| "downloaded_files.txt".into())
        .into();
    let output_dir: PathBuf = std::env::var("FERRY_OUTPUT_DIR")
        .unwrap_or_else(|_| "output".into())
        .into();
    let client_name =
        std::env::var("FERRY_CLIENT_NAME").unwrap_or_else(|_| "ferry-client".into());

    let ledger = Arc::new(CompletedLedger::load(&completed_log)?);
    info!(
        already_completed = ledger.len(),
        log = %completed_log.display(),
        "completed log loaded"
    );
    let queue = Arc::new(DownloadQueue::new());

    let stream = TcpStream::connect(&server_addr)?;
    stream.set_read_timeout(Some(READ_TIMEOUT))?;
    info!(server = %server_addr, "connected");

    {
        let queue = queue.clone();
        let ledger = ledger.clone();
        std::thread::spawn(move || producer::run(request_file, queue, ledger));
    }

    let mut receiver = Receiver::new(
        stream,
        ReceiverConfig {
            output_dir,
            client_name,
        },
        queue,
        ledger,
    );

    let listing = receiver.handshake()?;
    info!("available files:\n{}", listing.trim_end());

    // Runs until the connection is lost; no reconnection at this layer.
    receiver.run()?;
    Ok(())
}
