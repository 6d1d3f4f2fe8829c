//! Campus Wallet service
//!
//! # Usage
//!
//! ```bash
//! cargo run
//! cargo run -- --config config/campus-wallet.toml --port 8080
//! CAMPUS_WALLET__ENGINE__TIMEZONE=UTC cargo run -- --log-level debug
//! ```
//!
//! Starts the HTTP server, opens wallets for the configured sandbox users,
//! runs the pending-expiry sweep in the background and stops on Ctrl-C.
//!
//! # Exit Codes
//!
//! - 0: Clean shutdown
//! - 1: Configuration or startup error

use std::process;
use std::sync::Arc;

use campus_wallet::cli;
use campus_wallet::collaborators::{PinDirectory, SandboxGateway};
use campus_wallet::core::{spawn_expiry_sweeper, ProgressionRules, TransactionOrchestrator};
use campus_wallet::server::{self, ServerState};
use campus_wallet::settings::Settings;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let args = cli::parse_args();

    let mut settings = match Settings::load(&args.config) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
    args.apply(&mut settings);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&settings.log.level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(settings).await {
        tracing::error!("{e}");
        process::exit(1);
    }
}

async fn run(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let addr = settings.listen_addr()?;
    let sweep_every = settings.sweep_interval()?;

    let pins = Arc::new(PinDirectory::new());
    for user in &settings.users {
        pins.enroll(&user.id, &user.pin)?;
    }
    let gateway = Arc::new(SandboxGateway::new(
        &settings.gateway.checkout_base_url,
        &settings.gateway.return_base_url,
    ));

    let orchestrator = Arc::new(
        TransactionOrchestrator::builder()
            .identity(pins)
            .gateway(gateway.clone())
            .rules(ProgressionRules {
                timezone: settings.timezone()?,
                ..ProgressionRules::default()
            })
            .config(settings.engine_config()?)
            .build(),
    );
    for user in &settings.users {
        orchestrator.register_user(&user.id)?;
    }
    tracing::info!(users = settings.users.len(), "sandbox users registered");

    let sweeper = spawn_expiry_sweeper(Arc::clone(&orchestrator), sweep_every);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    if settings.gateway.sandbox {
        tracing::warn!("sandbox checkout routes enabled; anyone can settle a session");
    }
    let state = ServerState {
        orchestrator,
        sandbox: settings.gateway.sandbox.then_some(gateway),
    };
    let served = server::run_with_listener(state, listener, shutdown_signal()).await;

    sweeper.abort();
    tracing::info!("server stopped");
    Ok(served?)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
