//! Outbound message bus side channel.
//!
//! Handlers hand messages to [`Notifier`], which queues them on a bounded
//! background worker without waiting. The worker publishes each message,
//! retrying synchronously up to the configured number of extra attempts, and
//! then gives up. A full queue drops the message. Nothing here ever fails the
//! calling operation.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use pawprint_core::messages::Notification;
use serde::Serialize;

use crate::config::NotifyConfig;
use crate::service::worker::{BackgroundRunnable, BackgroundWorker, SubmitError, WorkerConfig};

const DROPPED: &str = "pawprint_notifications_dropped_total";

/// Message bus producer.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    async fn publish(&self, topic: &str, body: &str) -> anyhow::Result<()>;
}

/// Publisher that writes every message to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPublisher;

#[async_trait]
impl MessagePublisher for LogPublisher {
    async fn publish(&self, topic: &str, body: &str) -> anyhow::Result<()> {
        tracing::info!(topic, body, "published message");
        Ok(())
    }
}

/// Payloads published by the services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    Notification(Notification),
    /// Object URLs that became referenced and must not be reclaimed.
    UsedUrls(Vec<String>),
}

#[derive(Serialize)]
struct UsedUrls<'a> {
    urls: &'a [String],
}

impl OutboundMessage {
    fn kind(&self) -> &'static str {
        match self {
            Self::Notification(_) => "notification",
            Self::UsedUrls(_) => "used_urls",
        }
    }
}

// ---------------------------------------------------------------------------
// Publish runnable
// ---------------------------------------------------------------------------

/// Publishes queued messages with bounded retry.
pub struct PublishRunnable {
    publisher: Arc<dyn MessagePublisher>,
    config: NotifyConfig,
}

impl PublishRunnable {
    fn topic(&self, message: &OutboundMessage) -> &str {
        match message {
            OutboundMessage::Notification(_) => &self.config.notification_topic,
            OutboundMessage::UsedUrls(_) => &self.config.used_url_topic,
        }
    }
}

fn encode(message: &OutboundMessage) -> serde_json::Result<String> {
    match message {
        OutboundMessage::Notification(n) => serde_json::to_string(n),
        OutboundMessage::UsedUrls(urls) => serde_json::to_string(&UsedUrls { urls }),
    }
}

#[async_trait]
impl BackgroundRunnable for PublishRunnable {
    type Task = OutboundMessage;

    async fn run(&mut self, message: OutboundMessage) {
        let body = match encode(&message) {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(kind = message.kind(), error = %e, "unencodable message dropped");
                return;
            }
        };
        let topic = self.topic(&message).to_string();

        let attempts = self.config.retries + 1;
        for attempt in 1..=attempts {
            match self.publisher.publish(&topic, &body).await {
                Ok(()) => return,
                Err(e) => {
                    tracing::warn!(%topic, attempt, attempts, error = %e, "publish failed");
                }
            }
        }
        metrics::counter!(DROPPED, "reason" => "publish_failed").increment(1);
    }
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

/// Non-blocking handle used by the services to emit messages.
pub struct Notifier {
    worker: Mutex<BackgroundWorker<PublishRunnable>>,
}

impl Notifier {
    /// Starts the publish worker. Must be called inside a tokio runtime.
    #[must_use]
    pub fn start(publisher: Arc<dyn MessagePublisher>, config: NotifyConfig) -> Self {
        let worker_config = WorkerConfig {
            queue_capacity: config.queue_capacity,
            tick_interval: None,
        };
        let runnable = PublishRunnable { publisher, config };
        Self {
            worker: Mutex::new(BackgroundWorker::start(runnable, worker_config)),
        }
    }

    /// Queues a message. Drops it if the queue is full or the worker stopped.
    pub fn send(&self, message: OutboundMessage) {
        let Err(rejected) = self.worker.lock().try_submit(message) else {
            return;
        };
        let reason = match rejected {
            SubmitError::Full(_) => "queue_full",
            SubmitError::Stopped(_) => "stopped",
        };
        let kind = rejected.into_task().kind();
        metrics::counter!(DROPPED, "reason" => reason).increment(1);
        tracing::warn!(kind, reason, "notification dropped");
    }

    /// Publishes everything already queued, then stops the worker.
    pub async fn shutdown(&self) {
        let mut worker = {
            let mut guard = self.worker.lock();
            std::mem::replace(&mut *guard, BackgroundWorker::stopped())
        };
        worker.stop().await;
    }
}
