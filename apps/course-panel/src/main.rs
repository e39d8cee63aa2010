mod cli;
mod config;
mod handlers;
mod routes;
mod services;
mod state;
mod utils;

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::PanelConfig;
use state::AppState;

#[derive(Parser)]
#[command(name = "course-panel")]
#[command(about = "Course registration and discount code panel", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web server
    Serve,
    /// Issue a batch of discount codes to a reseller
    GenerateCodes {
        reseller_id: String,
        quantity: u32,
        #[arg(long, default_value = "syria-paid")]
        ticket_type: String,
    },
    /// Dump all registrations as CSV
    ExportRegistrations {
        /// Output file; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Check whether a code would be accepted, without redeeming it
    CheckCode {
        code: String,
        #[arg(long, default_value = "cli")]
        requester: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("No .env file loaded: {}", e);
    }

    let cli = Cli::parse();
    let config = PanelConfig::load()?;

    let file_appender = tracing_appender::rolling::never(&config.log_dir, "course-panel.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "course_panel=debug,course_db=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stdout))
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    let store = course_db::store::open_store(&config.store)
        .await
        .context("Failed to open store")?;
    let state = AppState::new(config, store);

    match cli.command {
        Commands::Serve => run_server(state).await?,
        Commands::GenerateCodes {
            reseller_id,
            quantity,
            ticket_type,
        } => cli::generate_codes(&state, &reseller_id, quantity, &ticket_type).await?,
        Commands::ExportRegistrations { output } => {
            cli::export_registrations(&state, output.as_deref()).await?
        }
        Commands::CheckCode { code, requester } => cli::check_code(&state, &code, &requester).await?,
    }

    Ok(())
}

async fn run_server(state: AppState) -> Result<()> {
    let addr: SocketAddr = state
        .config
        .listen_addr
        .parse()
        .with_context(|| format!("Invalid listen address {}", state.config.listen_addr))?;

    info!("Store backend: {}", state.store_backend);
    let app = routes::app_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Course panel listening on {}", addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
