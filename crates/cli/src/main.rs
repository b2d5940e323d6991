//! Inkwell server binary.
//!
//! Composition root for the workspace:
//!
//! 1. **Wire observability**: install the `tracing` subscriber (see
//!    [`telemetry`]).
//! 2. **Select the backend**: read the active [`domain::BackendConfig`] from
//!    the environment (see [`config`]) and resolve it once through the
//!    gateway, so a degraded start is visible in the logs.
//! 3. **Assemble the engine**: classifier (default rules or `--rules`),
//!    built-in specialists, stores.
//! 4. **Serve** the HTTP API until Ctrl-C or SIGTERM.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use domain::{Classifier, RuleTable};
use engine::{
    register_builtin_specialists, ConversationStore, DispatchEngine, DocumentVersionStore,
    GatewayContext, SpecialistRegistry, UsageTracker,
};
use server::AppState;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

mod config;
mod telemetry;

#[derive(Debug, Parser)]
#[command(
    name = "inkwell",
    about = "Intent-routed document generation server",
    version
)]
struct Args {
    /// Address to bind to.
    #[arg(long, env = "INKWELL_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on.
    #[arg(short, long, env = "INKWELL_PORT", default_value_t = 8000)]
    port: u16,

    /// JSON intent rule table replacing the built-in rules.
    #[arg(long, env = "INKWELL_RULES")]
    rules: Option<PathBuf>,

    /// Upper bound on one dispatch, in seconds.
    #[arg(long, env = "INKWELL_DISPATCH_TIMEOUT_SECS")]
    dispatch_timeout_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let telemetry = telemetry::init()?;
    let result = run(args).await;
    if let Err(err) = &result {
        tracing::error!(error = %err, "inkwell exited with an error");
    }
    telemetry.shutdown();
    result
}

async fn run(args: Args) -> anyhow::Result<()> {
    let classifier = match &args.rules {
        Some(path) => Classifier::new(load_rules(path)?),
        None => Classifier::default(),
    };

    let backend = config::backend_config_from_env();
    let gateway = Arc::new(GatewayContext::new(
        llm::builtin_registry(),
        Arc::new(UsageTracker::new()),
        backend,
    ));
    let handle = gateway.active_handle().await;
    if handle.is_degraded() {
        warn!(
            configured = %gateway.active_config().kind(),
            "active backend unavailable, serving stub responses"
        );
    }
    info!(backend = %handle.kind(), model = %handle.model(), "model backend ready");

    let mut specialists = SpecialistRegistry::new();
    register_builtin_specialists(&mut specialists)?;
    let mut engine = DispatchEngine::new(classifier, specialists, Arc::clone(&gateway))?;
    if let Some(secs) = args.dispatch_timeout_secs {
        engine = engine.with_deadline(Duration::from_secs(secs));
    }

    let state = Arc::new(AppState::new(
        Arc::new(engine),
        Arc::new(ConversationStore::new()),
        Arc::new(DocumentVersionStore::new()),
    ));

    let addr = format!("{}:{}", args.host, args.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(address = %addr, "inkwell listening");

    server::serve(listener, state, shutdown_signal()).await?;

    handle.close().await;
    info!("inkwell stopped");
    Ok(())
}

fn load_rules(path: &Path) -> anyhow::Result<RuleTable> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading rule table {}", path.display()))?;
    let table = RuleTable::from_json(&json)
        .with_context(|| format!("parsing rule table {}", path.display()))?;
    info!(path = %path.display(), rules = table.len(), "loaded intent rules");
    Ok(table)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("shutdown signal received");
}
