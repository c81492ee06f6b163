//! Wiring & DI. Entry point: bootstrap adapters, inject into services, run server or dashboard.
//! No business logic here.

mod cli;

use anyhow::Context;
use clap::Parser;
use cli::{Args, Command};
use dotenv::dotenv;
use ghl_recordings::adapters::ghl::{GhlGateway, MockCrmGateway};
use ghl_recordings::adapters::http::{AppState, build_router};
use ghl_recordings::adapters::storage::MemoryRecordingStore;
use ghl_recordings::adapters::ui::tui::TuiDashboard;
use ghl_recordings::ports::{CrmGateway, InputPort, RecordingStore};
use ghl_recordings::shared::AppConfig;
use ghl_recordings::usecases::{NoteService, RecordingJanitor, RecordingsService};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let env_loaded = dotenv();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match &env_loaded {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(_) => info!(cwd = %cwd.display(), "no .env found (check CWD)"),
    }

    let args = Args::parse();
    let cfg = AppConfig::load().context("invalid GHL_* configuration")?;

    match args.command_or_default() {
        Command::Serve { bind } => {
            let bind_addr = bind.unwrap_or_else(|| cfg.bind_addr_or_default());
            let listener = TcpListener::bind(&bind_addr)
                .await
                .with_context(|| format!("failed to bind to {}", bind_addr))?;
            let state = build_state(&cfg, cfg.public_base_url_or_default())?;
            info!(addr = %bind_addr, "recordings server listening");
            axum::serve(listener, build_router(state)).await?;
        }
        Command::Dashboard { location, bind } => {
            // /media links printed by the dashboard are served from here
            let bind_addr = bind.unwrap_or_else(|| cfg.bind_addr_or_default());
            let (listener, media_base_url) = match TcpListener::bind(&bind_addr).await {
                Ok(listener) => {
                    let base = listener
                        .local_addr()
                        .map(|addr| cfg.media_base_url_for(addr))
                        .unwrap_or_else(|_| cfg.public_base_url_or_default());
                    (Some(listener), base)
                }
                Err(e) => {
                    warn!(addr = %bind_addr, error = %e, "cannot serve recording links");
                    (None, cfg.public_base_url_or_default())
                }
            };
            let state = build_state(&cfg, media_base_url.clone())?;

            if let Some(listener) = listener {
                info!(base = %media_base_url, "serving recording links");
                let app = build_router(state.clone());
                tokio::spawn(async move {
                    if let Err(e) = axum::serve(listener, app).await {
                        warn!(error = %e, "recording link server stopped");
                    }
                });
            }

            ghl_recordings::adapters::ui::init_ui();
            let input_port: Arc<dyn InputPort> =
                Arc::new(TuiDashboard::new(state.recordings, state.notes, location));
            input_port
                .run()
                .await
                .map_err(|e| anyhow::anyhow!("{}", e))?;
        }
    }

    Ok(())
}

/// Recording store + janitor, CRM gateway and services. Links are prefixed with `media_base_url`.
fn build_state(cfg: &AppConfig, media_base_url: String) -> anyhow::Result<AppState> {
    // --- Recording store + janitor (links expire after GHL_RECORDING_TTL_SECS) ---
    let store: Arc<dyn RecordingStore> = Arc::new(
        MemoryRecordingStore::new(cfg.recording_ttl(), media_base_url)
            .with_max_bytes(cfg.recording_store_max_bytes_or_default()),
    );
    info!(
        ttl_secs = cfg.recording_ttl().as_secs(),
        max_bytes = cfg.recording_store_max_bytes_or_default(),
        "recording store ready"
    );
    let janitor = RecordingJanitor::new(Arc::clone(&store), cfg.sweep_interval());
    tokio::spawn(async move {
        janitor.run().await;
    });

    // --- CRM gateway: real API when a token is configured, demo data otherwise ---
    let gateway: Arc<dyn CrmGateway> = match cfg.ghl_client_config() {
        Some(client_cfg) => {
            info!(
                api_base = %client_cfg.api_base,
                max_in_flight = client_cfg.max_in_flight,
                "GoHighLevel gateway enabled"
            );
            Arc::new(GhlGateway::new(client_cfg)?)
        }
        None => {
            warn!("GHL_TOKEN not set, using demo CRM gateway");
            Arc::new(MockCrmGateway::demo())
        }
    };

    // --- Services ---
    let options = cfg.aggregation_options();
    info!(
        contacts = options.contact_concurrency,
        conversations = options.conversation_concurrency,
        recordings = options.recording_concurrency,
        policy = ?options.failure_policy,
        "aggregation fan-out"
    );
    let recordings = Arc::new(RecordingsService::new(
        Arc::clone(&gateway),
        Arc::clone(&store),
        cfg.default_location_id_or_default(),
        options,
    ));
    let notes = Arc::new(NoteService::new(gateway));

    Ok(AppState {
        recordings,
        notes,
        store,
    })
}
