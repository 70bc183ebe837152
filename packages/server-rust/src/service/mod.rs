//! Service assembly.
//!
//! 1. **Backends** ([`Backends`]): the capability objects every service shares
//! 2. **Domain services** (`domain`): like and user operations
//! 3. **Background workers** (`worker`): bounded queues behind fire-and-forget work
//!
//! [`Services::start`] wires all collaborators through constructors; nothing
//! is registered globally.

pub mod domain;
pub mod worker;

use std::sync::Arc;

use pawprint_core::fields;
use tokio_util::sync::CancellationToken;

pub use domain::{LikeService, UserService};
pub use worker::{BackgroundRunnable, BackgroundWorker, SubmitError, WorkerConfig};

use crate::config::ServiceConfig;
use crate::context::OperationContext;
use crate::mapper::{LikeMapper, UserMapper};
use crate::notify::{LogPublisher, MessagePublisher, Notifier};
use crate::storage::engines::{
    LocalCache, MemoryCounterStore, MemoryDocumentStore, TantivySearchIndex,
};
use crate::storage::{CacheBackend, CounterStore, DocumentStore, SearchIndex};
use crate::streak::{Clock, StreakTracker, SystemClock};

/// Fields of a user source that get a full-text index.
pub const SEARCHABLE_USER_FIELDS: [&str; 1] = [fields::NICKNAME];

/// Backing stores and outbound collaborators shared by the services.
#[derive(Clone)]
pub struct Backends {
    pub docs: Arc<dyn DocumentStore>,
    pub cache: Arc<dyn CacheBackend>,
    pub counters: Arc<dyn CounterStore>,
    pub index: Arc<dyn SearchIndex>,
    pub publisher: Arc<dyn MessagePublisher>,
    pub clock: Arc<dyn Clock>,
}

impl Backends {
    /// Process-local backends: memory documents and counters, an in-RAM
    /// search index, and a logging publisher.
    #[must_use]
    pub fn in_memory(config: &ServiceConfig) -> Self {
        Self {
            docs: Arc::new(MemoryDocumentStore::new()),
            cache: Arc::new(LocalCache::new(config.cache.capacity)),
            counters: Arc::new(MemoryCounterStore::new()),
            index: Arc::new(TantivySearchIndex::in_memory(&SEARCHABLE_USER_FIELDS)),
            publisher: Arc::new(LogPublisher),
            clock: Arc::new(SystemClock),
        }
    }
}

/// The like and user services plus the notifier they share.
pub struct Services {
    pub likes: LikeService,
    pub users: UserService,
    notifier: Arc<Notifier>,
    operation_timeout_ms: u64,
    /// Parent of every issued context; cancelled on shutdown.
    shutdown: CancellationToken,
}

impl Services {
    /// Builds every service and starts the notification worker.
    /// Must be called inside a tokio runtime.
    #[must_use]
    pub fn start(config: &ServiceConfig, backends: Backends) -> Self {
        let notifier = Arc::new(Notifier::start(backends.publisher, config.notify.clone()));
        let streaks = Arc::new(StreakTracker::new(
            backends.counters,
            backends.clock,
            config.reward.timezone(),
        ));

        let likes = LikeService::new(
            LikeMapper::new(Arc::clone(&backends.docs), Arc::clone(&backends.cache), &config.cache),
            Arc::clone(&streaks),
            Arc::clone(&notifier),
            config.reward.like_times,
        );
        let users = UserService::new(
            UserMapper::new(backends.docs, backends.cache, backends.index, config),
            streaks,
            Arc::clone(&notifier),
            config,
        );

        Self {
            likes,
            users,
            notifier,
            operation_timeout_ms: config.operation_timeout_ms,
            shutdown: CancellationToken::new(),
        }
    }

    /// A fresh context carrying the configured call timeout. It is cancelled
    /// when the services shut down.
    #[must_use]
    pub fn context(&self) -> OperationContext {
        OperationContext::with_parent(self.operation_timeout_ms, &self.shutdown)
    }

    /// Cancels in-flight calls, flushes queued notifications, and stops the
    /// worker.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.notifier.shutdown().await;
    }
}
