//! Background intent classification
//!
//! Customer messages are tagged asynchronously. The send path only pushes a
//! job onto a bounded queue; a supervised worker drains it with bounded
//! concurrency and a per-job timeout. Every outcome is counted and logged:
//!
//! - queue full: the job is dropped at enqueue time
//! - gateway failure or timeout: logged and dropped, never retried
//! - message deleted meanwhile: skipped
//! - worker panic: caught by the `JoinSet` and counted

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chatdesk_shared::{
    AuditEntryId, IntentAuditEntry, Message, MessageId, StoreResult, CLASSIFIED_BY_MODEL,
};
use serde::Serialize;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinError, JoinHandle, JoinSet};

use crate::chat::{ChatResult, MonotonicClock};
use crate::gateway::ModelGateway;
use crate::store::ChatStore;

/// Append an audit entry, then refresh the message's cached intent fields.
/// The audit trail is append-only; the cache is last-writer-wins.
pub(crate) async fn record_intent(
    store: &dyn ChatStore,
    clock: &MonotonicClock,
    message: &Message,
    intent: &str,
    confidence: f64,
    classified_by: &str,
    note: Option<String>,
) -> StoreResult<IntentAuditEntry> {
    let entry = IntentAuditEntry {
        id: AuditEntryId::new(),
        message_id: message.id,
        room_id: message.room_id,
        intent: intent.to_string(),
        confidence,
        classified_by: classified_by.to_string(),
        created_at: clock.now(),
        note,
    };
    store.insert_intent_entry(&entry).await?;
    store.set_message_intent(message.id, intent, confidence).await?;
    Ok(entry)
}

/// Tags one message using the classifier gateway
pub struct Classifier {
    store: Arc<dyn ChatStore>,
    models: Arc<dyn ModelGateway>,
    clock: Arc<MonotonicClock>,
}

impl Classifier {
    pub fn new(store: Arc<dyn ChatStore>, models: Arc<dyn ModelGateway>, clock: Arc<MonotonicClock>) -> Self {
        Self { store, models, clock }
    }

    /// Returns `None` when the message is gone or soft-deleted by the time
    /// the prediction arrives.
    pub async fn classify(&self, message_id: MessageId, content: &str) -> ChatResult<Option<IntentAuditEntry>> {
        let prediction = self.models.classify_intent(content).await?;

        let Some(message) = self.store.find_message(message_id).await? else {
            return Ok(None);
        };
        if message.is_deleted {
            return Ok(None);
        }

        let entry = record_intent(
            self.store.as_ref(),
            &self.clock,
            &message,
            &prediction.label,
            prediction.confidence,
            CLASSIFIED_BY_MODEL,
            None,
        )
        .await?;
        Ok(Some(entry))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CoordinatorSettings {
    pub queue_capacity: usize,
    pub max_concurrency: usize,
    /// Bound on one job, gateway call and writes included
    pub job_timeout: Duration,
}

#[derive(Debug)]
struct Job {
    message_id: MessageId,
    content: String,
}

#[derive(Debug, Default)]
struct Counters {
    scheduled: AtomicU64,
    rejected: AtomicU64,
    completed: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
    panicked: AtomicU64,
}

/// Snapshot of coordinator counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClassificationStats {
    pub scheduled: u64,
    /// Dropped because the queue was full or the worker had stopped
    pub rejected: u64,
    pub completed: u64,
    pub skipped: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub panicked: u64,
}

impl ClassificationStats {
    /// Scheduled jobs without an outcome yet
    pub fn pending(&self) -> u64 {
        self.scheduled.saturating_sub(
            self.completed + self.skipped + self.failed + self.timed_out + self.panicked,
        )
    }
}

/// Handle for queueing classification work. Cheap to clone.
#[derive(Clone)]
pub struct ClassificationCoordinator {
    tx: mpsc::Sender<Job>,
    counters: Arc<Counters>,
}

impl ClassificationCoordinator {
    /// Start the worker. It runs until every coordinator handle is dropped,
    /// then finishes in-flight jobs and exits.
    pub fn spawn(classifier: Classifier, settings: CoordinatorSettings) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(settings.queue_capacity.max(1));
        let counters = Arc::new(Counters::default());

        let worker = tokio::spawn(run_worker(
            rx,
            Arc::new(classifier),
            settings,
            Arc::clone(&counters),
        ));

        (Self { tx, counters }, worker)
    }

    /// Queue a message for classification. Never waits; returns false if the
    /// job was dropped.
    pub fn schedule(&self, message_id: MessageId, content: String) -> bool {
        match self.tx.try_send(Job { message_id, content }) {
            Ok(()) => {
                self.counters.scheduled.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(mpsc::error::TrySendError::Full(job)) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(message_id = %job.message_id, "Classification queue full, dropping job");
                false
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                tracing::error!(message_id = %job.message_id, "Classification worker stopped, dropping job");
                false
            }
        }
    }

    pub fn stats(&self) -> ClassificationStats {
        let c = &self.counters;
        ClassificationStats {
            scheduled: c.scheduled.load(Ordering::Relaxed),
            rejected: c.rejected.load(Ordering::Relaxed),
            completed: c.completed.load(Ordering::Relaxed),
            skipped: c.skipped.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            timed_out: c.timed_out.load(Ordering::Relaxed),
            panicked: c.panicked.load(Ordering::Relaxed),
        }
    }
}

async fn run_worker(
    mut rx: mpsc::Receiver<Job>,
    classifier: Arc<Classifier>,
    settings: CoordinatorSettings,
    counters: Arc<Counters>,
) {
    let semaphore = Arc::new(Semaphore::new(settings.max_concurrency.max(1)));
    let mut tasks = JoinSet::new();

    tracing::info!(
        max_concurrency = settings.max_concurrency,
        queue_capacity = settings.queue_capacity,
        "Classification worker started"
    );

    loop {
        tokio::select! {
            job = rx.recv() => {
                let Some(job) = job else { break };
                let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else { break };

                let classifier = Arc::clone(&classifier);
                let counters = Arc::clone(&counters);
                let timeout = settings.job_timeout;
                tasks.spawn(async move {
                    let _permit = permit;
                    run_job(&classifier, job, timeout, &counters).await;
                });
            }
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                reap(joined, &counters);
            }
        }
    }

    while let Some(joined) = tasks.join_next().await {
        reap(joined, &counters);
    }
    tracing::info!("Classification worker stopped");
}

async fn run_job(classifier: &Classifier, job: Job, timeout: Duration, counters: &Counters) {
    let message_id = job.message_id;
    tracing::debug!(message_id = %message_id, "Classification started");

    match tokio::time::timeout(timeout, classifier.classify(message_id, &job.content)).await {
        Ok(Ok(Some(entry))) => {
            counters.completed.fetch_add(1, Ordering::Relaxed);
            tracing::info!(
                message_id = %message_id,
                intent = %entry.intent,
                confidence = entry.confidence,
                "Classification finished"
            );
        }
        Ok(Ok(None)) => {
            counters.skipped.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(message_id = %message_id, "Message gone before classification landed");
        }
        Ok(Err(e)) => {
            counters.failed.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(message_id = %message_id, error = %e, "Classification dropped");
        }
        Err(_) => {
            counters.timed_out.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                message_id = %message_id,
                timeout_ms = timeout.as_millis() as u64,
                "Classification timed out"
            );
        }
    }
}

fn reap(joined: Result<(), JoinError>, counters: &Counters) {
    if let Err(e) = joined {
        if e.is_panic() {
            counters.panicked.fetch_add(1, Ordering::Relaxed);
            tracing::error!(error = %e, "Classification task panicked");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::gateway::{GatewayError, GatewayResult, IntentPrediction};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use chatdesk_shared::{Room, UserId, UserType};

    struct FixedModel;

    #[async_trait]
    impl ModelGateway for FixedModel {
        async fn classify_intent(&self, _text: &str) -> GatewayResult<IntentPrediction> {
            Ok(IntentPrediction {
                label: "refund".to_string(),
                confidence: 0.9,
            })
        }

        async fn generate_reply(&self, _text: &str, _style: &str, _model_version: &str) -> GatewayResult<String> {
            Err(GatewayError::ModelUnavailable("unused".to_string()))
        }
    }

    struct HangingModel;

    #[async_trait]
    impl ModelGateway for HangingModel {
        async fn classify_intent(&self, _text: &str) -> GatewayResult<IntentPrediction> {
            std::future::pending().await
        }

        async fn generate_reply(&self, _text: &str, _style: &str, _model_version: &str) -> GatewayResult<String> {
            std::future::pending().await
        }
    }

    struct CrashingModel;

    #[async_trait]
    impl ModelGateway for CrashingModel {
        async fn classify_intent(&self, _text: &str) -> GatewayResult<IntentPrediction> {
            panic!("model client crashed")
        }

        async fn generate_reply(&self, _text: &str, _style: &str, _model_version: &str) -> GatewayResult<String> {
            Err(GatewayError::ModelUnavailable("unused".to_string()))
        }
    }

    async fn seeded_store(clock: &MonotonicClock) -> (Arc<MemoryStore>, Message) {
        let store = Arc::new(MemoryStore::new());
        let room = Room::new(UserId::new(), "Ada".to_string(), clock.now());
        store.insert_room(&room).await.unwrap();
        let message = Message::new(
            room.id,
            room.customer_id,
            UserType::Customer,
            "I want my money back".to_string(),
            clock.now(),
            None,
        );
        store.insert_message(&message).await.unwrap();
        (store, message)
    }

    async fn settle(coordinator: &ClassificationCoordinator) -> ClassificationStats {
        for _ in 0..200 {
            let stats = coordinator.stats();
            if stats.pending() == 0 {
                return stats;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        coordinator.stats()
    }

    fn settings(job_timeout: Duration) -> CoordinatorSettings {
        CoordinatorSettings {
            queue_capacity: 8,
            max_concurrency: 2,
            job_timeout,
        }
    }

    #[tokio::test]
    async fn test_classify_appends_audit_and_updates_cache() {
        let clock = Arc::new(MonotonicClock::new());
        let (store, message) = seeded_store(&clock).await;
        let classifier = Classifier::new(store.clone(), Arc::new(FixedModel), clock);

        let entry = classifier.classify(message.id, &message.content).await.unwrap().unwrap();
        assert_eq!(entry.classified_by, CLASSIFIED_BY_MODEL);
        assert_eq!(entry.room_id, message.room_id);

        classifier.classify(message.id, &message.content).await.unwrap();
        let history = store.list_intent_entries_for_message(message.id).await.unwrap();
        assert_eq!(history.len(), 2);

        let stored = store.find_message(message.id).await.unwrap().unwrap();
        assert_eq!(stored.intent.as_deref(), Some("refund"));
        assert_eq!(stored.intent_confidence, Some(0.9));
    }

    #[tokio::test]
    async fn test_deleted_message_is_skipped() {
        let clock = Arc::new(MonotonicClock::new());
        let (store, message) = seeded_store(&clock).await;
        store.soft_delete_message(message.id).await.unwrap();

        let (coordinator, _worker) = ClassificationCoordinator::spawn(
            Classifier::new(store.clone(), Arc::new(FixedModel), clock),
            settings(Duration::from_secs(5)),
        );
        assert!(coordinator.schedule(message.id, message.content.clone()));

        let stats = settle(&coordinator).await;
        assert_eq!(stats.skipped, 1);
        assert!(store.list_intent_entries_for_message(message.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_hanging_gateway_times_out() {
        let clock = Arc::new(MonotonicClock::new());
        let (store, message) = seeded_store(&clock).await;

        let (coordinator, _worker) = ClassificationCoordinator::spawn(
            Classifier::new(store, Arc::new(HangingModel), clock),
            settings(Duration::from_millis(50)),
        );
        coordinator.schedule(message.id, message.content.clone());
        coordinator.schedule(message.id, message.content.clone());

        let stats = settle(&coordinator).await;
        assert_eq!(stats.timed_out, 2);
        assert_eq!(stats.pending(), 0);
    }

    #[tokio::test]
    async fn test_full_queue_drops_without_waiting() {
        let clock = Arc::new(MonotonicClock::new());
        let (store, message) = seeded_store(&clock).await;

        let (coordinator, _worker) = ClassificationCoordinator::spawn(
            Classifier::new(store, Arc::new(HangingModel), clock),
            CoordinatorSettings {
                queue_capacity: 1,
                max_concurrency: 1,
                job_timeout: Duration::from_secs(60),
            },
        );

        let accepted = (0..10)
            .filter(|_| coordinator.schedule(message.id, message.content.clone()))
            .count();
        assert!(accepted < 10);
        assert_eq!(coordinator.stats().rejected, (10 - accepted) as u64);
    }

    #[tokio::test]
    async fn test_job_panic_is_counted_and_worker_survives() {
        let clock = Arc::new(MonotonicClock::new());
        let (store, message) = seeded_store(&clock).await;

        let (coordinator, worker) = ClassificationCoordinator::spawn(
            Classifier::new(store, Arc::new(CrashingModel), clock),
            settings(Duration::from_secs(1)),
        );
        assert!(coordinator.schedule(message.id, message.content.clone()));
        let stats = settle(&coordinator).await;
        assert_eq!(stats.panicked, 1);
        assert!(!worker.is_finished());

        assert!(coordinator.schedule(message.id, message.content.clone()));
        let stats = settle(&coordinator).await;
        assert_eq!(stats.panicked, 2);
        assert_eq!(stats.pending(), 0);
    }

    #[tokio::test]
    async fn test_worker_exits_when_handles_dropped() {
        let clock = Arc::new(MonotonicClock::new());
        let (store, _message) = seeded_store(&clock).await;

        let (coordinator, worker) = ClassificationCoordinator::spawn(
            Classifier::new(store, Arc::new(FixedModel), clock),
            settings(Duration::from_secs(1)),
        );
        drop(coordinator);

        tokio::time::timeout(Duration::from_secs(1), worker)
            .await
            .unwrap()
            .unwrap();
    }
}
