//! Herald server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) overlaid by
//! `HERALD__*` environment variables, opens the SQLite store, starts the
//! event consumer and the manager-alert sweep, and serves the intake over
//! HTTP until interrupted.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use herald_agent::{
  Agent, AgentConfig,
  agent::run_sweeps,
  config::{SentCacheBackend, expand_tilde},
  intake::{self, Intake},
};
use herald_core::{
  cache::MemorySentCache, dispatch::Mailer, event::Registry, rules::RuleEngine,
  store::SentCache,
};
use herald_mail::SmtpMailer;
use herald_mo::MoClient;
use herald_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Herald notification agent")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let config = AgentConfig::load(&cli.config).context("failed to load configuration")?;

  let store_path = expand_tilde(&config.store_path);
  if let Some(parent) = store_path.parent() {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?
    .with_sent_ttl(config.sent_ttl());

  match config.sent_cache.backend {
    SentCacheBackend::Memory => {
      let sent = MemorySentCache::new(config.sent_cache.capacity, config.sent_ttl());
      serve(config, store, sent).await
    }
    SentCacheBackend::Sqlite => {
      let sent = store.clone();
      serve(config, store, sent).await
    }
  }
}

async fn serve<C>(config: AgentConfig, store: SqliteStore, sent: C) -> anyhow::Result<()>
where
  C: SentCache + 'static,
{
  let source = MoClient::new(config.mo.clone()).context("failed to build MO client")?;
  let transport = SmtpMailer::new(&config.smtp).context("failed to build SMTP transport")?;
  let mailer = Mailer::new(config.composer(), transport, config.email.dry_run);
  let engine = RuleEngine::new(source, store, sent, config.rule_settings())
    .context("failed to load templates")?;

  let registry = Registry::from_active(&config.active_agents);
  if registry.is_empty() {
    tracing::warn!("no agents are active; every event will be ignored");
  }
  for agent in &config.active_agents {
    tracing::info!(%agent, "agent registered");
  }
  if config.email.dry_run {
    tracing::warn!("dry run: no email will be sent");
  }

  let agent = Arc::new(Agent::new(registry, engine, mailer, config.sweep_schedule()));

  let (intake, jobs) = Intake::channel(config.queue_capacity);
  let consumer = tokio::spawn(intake::consume(agent.clone(), jobs));
  let sweeper = tokio::spawn(run_sweeps(agent, config.sweep_interval()));

  let app = intake::router(intake);
  let address = format!("{}:{}", config.host, config.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  sweeper.abort();
  consumer.await.context("event consumer panicked")?;
  tracing::info!("shut down");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(error = %e, "failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  tracing::info!("shutdown requested");
}
