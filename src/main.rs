use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ledgerlink::store::{FileLinkStore, LinkStore};
use ledgerlink::{config, jobs, AppState};

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use opentelemetry::KeyValue;
    use opentelemetry_sdk::{trace as sdktrace, Resource};

    // OTLP export only when an endpoint is configured; a broken exporter
    // downgrades to plain logging instead of aborting startup.
    let mut otel_error = None;
    let telemetry_layer = if std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
        match opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(opentelemetry_otlp::new_exporter().tonic())
            .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
                KeyValue::new("service.name", "ledgerlink"),
            ])))
            .install_batch(opentelemetry_sdk::runtime::Tokio)
        {
            Ok(tracer) => Some(tracing_opentelemetry::layer().with_tracer(tracer)),
            Err(e) => {
                otel_error = Some(e);
                None
            }
        }
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "ledgerlink=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .with(telemetry_layer)
        .init();

    if let Some(e) = otel_error {
        tracing::warn!("OpenTelemetry disabled, exporter failed to start: {}", e);
    }

    let cfg = config::load()?;
    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::Serve { port }) => {
            let port = port.unwrap_or(cfg.port);
            run_server(cfg, port).await
        }
        Some(cli::Commands::Links { command }) => handle_links_command(cfg, command).await,
        Some(cli::Commands::Sync { account_id }) => {
            let state = AppState::from_config(cfg)?;
            run_sync(&state, account_id.as_deref()).await
        }
        None => {
            let port = cfg.port;
            run_server(cfg, port).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

async fn run_server(cfg: config::Config, port: u16) -> anyhow::Result<()> {
    tracing::info!(data_dir = %cfg.data_dir.display(), "Initializing state...");
    let state = AppState::from_config(cfg)?;

    // a crash mid-sync leaves accounts flagged as syncing forever
    let reset = state.sync_status.reset_in_progress().await?;
    if reset > 0 {
        tracing::warn!(accounts = reset, "cleared stale in-progress sync flags");
    }

    match jobs::sync::spawn(state.sync.clone()) {
        Some(_) => tracing::info!(
            next_run = ?state.sync.next_run_after(Utc::now()),
            "Background sync job started"
        ),
        None => tracing::info!("Background sync job disabled"),
    }

    let app = ledgerlink::app(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("ledgerlink listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn handle_links_command(cfg: config::Config, cmd: cli::LinkCommands) -> anyhow::Result<()> {
    // only the link file is touched, no upstream credentials needed
    let store = FileLinkStore::in_dir(cfg.data_dir.clone());
    match cmd {
        cli::LinkCommands::List => {
            let record = store.read_links().await?;
            if record.links.is_empty() {
                println!("No links in {}", store.path().display());
                return Ok(());
            }
            println!("{:<12} {:<40} {}", "LEDGER ID", "ACCOUNT ID", "LINKED AT");
            for link in &record.links {
                println!(
                    "{:<12} {:<40} {}",
                    link.ledger_asset_id,
                    link.aggregator_account_id,
                    link.created_at.to_rfc3339()
                );
            }
        }
        cli::LinkCommands::Add {
            ledger_id,
            account_id,
        } => {
            let mut record = store.read_links().await?;
            record.link(ledger_id, &account_id, Utc::now());
            store.write_links(&record).await?;
            println!("Linked ledger asset {} to account {}", ledger_id, account_id);
        }
        cli::LinkCommands::Remove {
            ledger_id,
            account_id,
        } => {
            let mut record = store.read_links().await?;
            if record.unlink(ledger_id, account_id.as_deref()) == 0 {
                println!("Ledger asset {} was not linked", ledger_id);
            } else {
                store.write_links(&record).await?;
                println!("Unlinked ledger asset {}", ledger_id);
            }
        }
    }
    Ok(())
}

async fn run_sync(state: &Arc<AppState>, account_id: Option<&str>) -> anyhow::Result<()> {
    let outcomes = state.sync.sync(account_id).await?;
    if outcomes.is_empty() {
        println!("Nothing to sync");
        return Ok(());
    }
    for o in &outcomes {
        match &o.error {
            None if o.rate_limited => println!(
                "{} -> {}: rate limited, nothing synced",
                o.gocardless_id, o.lunchmoney_id
            ),
            None => println!(
                "{} -> {}: ok, fetched {}, inserted {}",
                o.gocardless_id, o.lunchmoney_id, o.fetched, o.inserted
            ),
            Some(err) => println!("{} -> {}: error: {}", o.gocardless_id, o.lunchmoney_id, err),
        }
    }
    Ok(())
}
