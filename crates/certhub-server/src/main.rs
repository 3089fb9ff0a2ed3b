//! CertHub Server
//!
//! HTTP service for certificate issuance, public verification, and staged
//! approval of externally-submitted certificate rows.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use certhub_core::tracing_init::init_tracing;
use certhub_server::minter::CertificateMinter;
use certhub_server::notify::Notifier;
use certhub_server::objectstore::FsObjectStore;
use certhub_server::qr::QrBinder;
use certhub_server::routes::{AppState, build_router};
use certhub_server::storage::CertDatabase;

#[derive(Parser, Debug)]
#[command(name = "certhub-server")]
#[command(
    version,
    about = "CertHub server - certificate issuance and verification"
)]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0:8080", env = "CERTHUB_ADDR")]
    addr: SocketAddr,

    /// Path to SQLite database file.
    #[arg(long, env = "CERTHUB_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Public base URL embedded in QR codes, e.g. "https://certs.example.org".
    #[arg(
        long,
        default_value = "http://localhost:8080",
        env = "CERTHUB_BASE_URL"
    )]
    base_url: String,

    /// Directory for stored QR images.
    #[arg(long, env = "CERTHUB_QR_DIR")]
    qr_dir: Option<PathBuf>,

    /// Public base URL under which the QR directory is served.
    /// Defaults to "{base_url}/qr-codes".
    #[arg(long, env = "CERTHUB_QR_PUBLIC_URL")]
    qr_public_url: Option<String>,

    /// Bearer secret for the spreadsheet integration endpoints. When unset,
    /// the `sheets_webhook_secret` row of the secrets store is used.
    #[arg(long, env = "SHEETS_WEBHOOK_SECRET")]
    sheets_secret: Option<String>,

    /// Webhook URL for operational notifications (optional).
    #[arg(long, env = "ERRORS_WEBHOOK_URL")]
    webhook_url: Option<String>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_tracing("certhub_server=info", args.log_json);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %args.addr,
        "Starting certhub-server"
    );

    let db_path = match args.db_path {
        Some(path) => path,
        None => default_data_path()?.join("certhub.db"),
    };
    info!(path = %db_path.display(), "Opening certificate database");
    let db = CertDatabase::open(&db_path).await?;

    let qr_dir = match args.qr_dir {
        Some(dir) => dir,
        None => default_data_path()?.join("qr-codes"),
    };
    let qr_public_url = args
        .qr_public_url
        .unwrap_or_else(|| format!("{}/qr-codes", args.base_url.trim_end_matches('/')));
    let store: Arc<dyn certhub_server::objectstore::ObjectStore> =
        Arc::new(FsObjectStore::new(qr_dir, qr_public_url));

    let minter =
        CertificateMinter::new(db.clone(), QrBinder::new(args.base_url, Arc::clone(&store)));
    let notifier = Notifier::new(args.webhook_url);
    let state = AppState::new(db, minter, store, notifier, args.sheets_secret);

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(args.addr).await?;
    info!(addr = %args.addr, "CertHub server listening");

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("Server stopped");
    Ok(())
}

fn default_data_path() -> anyhow::Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(home.join(".certhub"))
}
