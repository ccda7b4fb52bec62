//! Server dependencies
//!
//! Everything the HTTP layer, the scheduler and the CLI share: the
//! repository, the notifier and the orchestrator wired over them.

use std::sync::Arc;

use anyhow::{Context, Result};
use signal_pipeline::{
    Notifier, Orchestrator, PostgresStore, Producer, Repository, Scorer, SqliteStore,
};
use telegram::{TelegramOptions, TelegramService};

use crate::config::Config;
use crate::kernel::producers::{self, RemoteOkProducer, SampleProducer, WeWorkRemotelyProducer};
use crate::kernel::telegram_notifier::{DisabledNotifier, TelegramNotifier};

/// Open the store named by `database_url`; the schema is created on connect.
pub async fn connect_repository(database_url: &str) -> Result<Arc<dyn Repository>> {
    if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        let store = PostgresStore::new(database_url)
            .await
            .context("Failed to connect to PostgreSQL")?;
        tracing::info!("Using PostgreSQL store");
        Ok(Arc::new(store))
    } else {
        let store = SqliteStore::new(database_url)
            .await
            .context("Failed to open SQLite database")?;
        tracing::info!("Using SQLite store");
        Ok(Arc::new(store))
    }
}

/// Server dependencies shared across triggers
#[derive(Clone)]
pub struct ServerDeps {
    pub config: Config,
    pub repository: Arc<dyn Repository>,
    pub notifier: Arc<dyn Notifier>,
    pub orchestrator: Arc<Orchestrator>,
}

impl ServerDeps {
    pub fn new(
        config: Config,
        repository: Arc<dyn Repository>,
        notifier: Arc<dyn Notifier>,
        orchestrator: Arc<Orchestrator>,
    ) -> Self {
        Self {
            config,
            repository,
            notifier,
            orchestrator,
        }
    }

    /// Connect the store and build notifier, producers and orchestrator.
    pub async fn from_config(config: Config) -> Result<Self> {
        let repository = connect_repository(&config.database_url).await?;
        let notifier = build_notifier(&config)?;
        let producers = build_producers(&config)?;

        let mut orchestrator = Orchestrator::new(
            repository.clone(),
            notifier.clone(),
            Scorer::new(config.scoring_rules()),
        )
        .with_config(config.pipeline_config());
        for producer in producers {
            orchestrator = orchestrator.with_shared_producer(producer);
        }

        tracing::info!(
            producers = ?orchestrator.producer_names(),
            alert_threshold = config.alert_threshold,
            alerts_enabled = config.enable_alerts,
            "Server dependencies ready"
        );

        Ok(Self::new(config, repository, notifier, Arc::new(orchestrator)))
    }
}

/// The Telegram notifier, when alerts are enabled and fully configured.
pub fn telegram_notifier(config: &Config) -> Result<Option<TelegramNotifier>> {
    match (
        config.enable_alerts,
        config.telegram_token.as_ref(),
        config.telegram_chat_id.as_ref(),
    ) {
        (true, Some(token), Some(chat_id)) => {
            let service = TelegramService::new(TelegramOptions::new(token, chat_id))
                .context("Failed to build Telegram client")?;
            Ok(Some(TelegramNotifier::new(service)))
        }
        _ => Ok(None),
    }
}

fn build_notifier(config: &Config) -> Result<Arc<dyn Notifier>> {
    match telegram_notifier(config)? {
        Some(notifier) => Ok(Arc::new(notifier)),
        None => {
            tracing::warn!("Telegram alerts disabled");
            Ok(Arc::new(DisabledNotifier))
        }
    }
}

fn build_producers(config: &Config) -> Result<Vec<Arc<dyn Producer>>> {
    if config.use_sample_collectors {
        return Ok(vec![Arc::new(SampleProducer::new())]);
    }

    let client = producers::http_client().context("Failed to build HTTP client")?;
    Ok(vec![
        Arc::new(RemoteOkProducer::new(client.clone())),
        Arc::new(WeWorkRemotelyProducer::new(client)),
    ])
}
