//! Pawprint server binary.
//!
//! Builds the backends selected on the command line, starts the services, and
//! runs until interrupted. The RPC transport attaches to [`Services`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use clap::Parser;
use pawprint_server::config::StoreBackend;
use pawprint_server::service::{
    BackgroundRunnable, BackgroundWorker, WorkerConfig, SEARCHABLE_USER_FIELDS,
};
use pawprint_server::storage::engines::{
    MemoryCounterStore, MemoryDocumentStore, TantivySearchIndex,
};
use pawprint_server::storage::{DocumentStore, SearchIndex};
use pawprint_server::telemetry::init_tracing;
use pawprint_server::{Backends, ServiceArgs, ServiceConfig, Services};

const COUNTER_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Drops expired streak counters so idle subjects do not pin memory.
struct CounterSweep {
    counters: Arc<MemoryCounterStore>,
}

#[async_trait]
impl BackgroundRunnable for CounterSweep {
    type Task = ();

    async fn run(&mut self, _task: ()) {}

    async fn on_tick(&mut self) {
        let purged = self.counters.purge_expired();
        if purged > 0 {
            tracing::debug!(purged, "expired streak counters removed");
        }
    }
}

fn document_store(args: &ServiceArgs) -> Result<Arc<dyn DocumentStore>> {
    match args.store {
        StoreBackend::Memory => Ok(Arc::new(MemoryDocumentStore::new())),
        #[cfg(feature = "redb")]
        StoreBackend::Redb => {
            let path = args
                .data_path
                .as_deref()
                .context("--data-path is required for the redb store")?;
            let store = pawprint_server::storage::engines::RedbDocumentStore::open(path)
                .with_context(|| format!("opening {}", path.display()))?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "redb"))]
        StoreBackend::Redb => bail!("built without the redb feature"),
    }
}

fn search_index(args: &ServiceArgs) -> Result<Arc<dyn SearchIndex>> {
    match &args.index_path {
        Some(dir) => {
            let index = TantivySearchIndex::open(dir, &SEARCHABLE_USER_FIELDS)
                .with_context(|| format!("opening search index at {}", dir.display()))?;
            Ok(Arc::new(index))
        }
        None => Ok(Arc::new(TantivySearchIndex::in_memory(&SEARCHABLE_USER_FIELDS))),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = ServiceArgs::parse();
    init_tracing(args.log_format)?;

    let config = ServiceConfig::from(&args);
    if config.reward.like_times < 0 {
        bail!("--like-times must not be negative");
    }

    let counters = Arc::new(MemoryCounterStore::new());
    let backends = Backends {
        docs: document_store(&args)?,
        index: search_index(&args)?,
        counters: Arc::clone(&counters) as _,
        ..Backends::in_memory(&config)
    };

    let services = Services::start(&config, backends);
    let mut sweep = BackgroundWorker::start(
        CounterSweep { counters },
        WorkerConfig {
            queue_capacity: 1,
            tick_interval: Some(COUNTER_SWEEP_INTERVAL),
        },
    );

    tracing::info!(
        database = %config.database,
        store = ?args.store,
        timeout_ms = config.operation_timeout_ms,
        "pawprint server ready"
    );

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    tracing::info!("shutdown signal received, draining");

    services.shutdown().await;
    sweep.stop().await;
    tracing::info!("pawprint server stopped");
    Ok(())
}
