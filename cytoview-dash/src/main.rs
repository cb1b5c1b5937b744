//! cytoview-dash - Main entry point
//!
//! Startup sequence: resolve configuration, create the store and load the
//! CSV if the store is absent (or --reload was passed), reopen the store
//! read-only, then serve the dashboard over local HTTP.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cytoview_common::{config, db};
use cytoview_dash::{build_router, ingest, AppState};

/// Command-line arguments for cytoview-dash
#[derive(Parser, Debug)]
#[command(name = "cytoview-dash")]
#[command(about = "Clinical-trial cell-count dashboard")]
#[command(version)]
struct Args {
    /// Root folder for the store and default CSV location
    #[arg(short, long)]
    root_folder: Option<String>,

    /// Path to the denormalized cell-count CSV
    #[arg(long)]
    csv: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Delete the store and reload it from the CSV
    #[arg(long)]
    reload: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cytoview=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!(
        "Starting cytoview-dash v{}",
        env!("CARGO_PKG_VERSION")
    );

    // 4-tier resolution: CLI -> env -> TOML -> compiled default
    let root_folder =
        config::resolve_root_folder(args.root_folder.as_deref(), "CYTOVIEW_ROOT_FOLDER");
    std::fs::create_dir_all(&root_folder)
        .with_context(|| format!("Failed to create root folder {}", root_folder.display()))?;
    info!("Root folder: {}", root_folder.display());

    let csv_path = config::resolve_csv_path(args.csv.as_deref(), &root_folder);
    let port = config::resolve_port(args.port);
    let db_path = config::database_path(&root_folder);

    if args.reload && db_path.exists() {
        info!("--reload: removing existing store {}", db_path.display());
        std::fs::remove_file(&db_path)
            .with_context(|| format!("Failed to remove {}", db_path.display()))?;
        let _ = std::fs::remove_file(db_path.with_extension("db-wal"));
        let _ = std::fs::remove_file(db_path.with_extension("db-shm"));
    }

    // Load once, only when the store is absent
    let needs_load = !db_path.exists();
    let pool = db::init_database(&db_path)
        .await
        .context("Failed to initialize database")?;

    if needs_load {
        info!("Loading CSV: {}", csv_path.display());
        match ingest::load_csv(&pool, &csv_path).await {
            Ok(summary) => {
                info!(
                    "Load complete: {} projects, {} subjects, {} samples, {} cell counts",
                    summary.projects, summary.subjects, summary.samples, summary.cell_counts
                );
            }
            Err(e) => {
                // Fatal: the transaction rolled back, remove the empty store
                // so the next run retries the load
                error!("CSV load failed: {}", e);
                pool.close().await;
                let _ = std::fs::remove_file(&db_path);
                let _ = std::fs::remove_file(db_path.with_extension("db-wal"));
                let _ = std::fs::remove_file(db_path.with_extension("db-shm"));
                return Err(e).context("CSV load failed");
            }
        }
    } else {
        info!("Store already loaded, skipping CSV load (use --reload to replace)");
    }

    // Writes are done; serve from a read-only connection
    pool.close().await;
    let pool = db::connect_readonly(&db_path)
        .await
        .context("Failed to reopen store read-only")?;
    info!("Store reopened read-only");

    let state = AppState::new(pool);
    let app = build_router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("cytoview-dash listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
