use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{Notify, RwLock};

use pbis_collector::{
    email::{EmailError, EmailMessage, EmailSender},
    pbis::{
        models::{CollectionDate, CollectionSnapshot, StaffMember},
        BackendSeed, InMemoryPbisBackend, NewCollection, PbisBackend, PbisError,
        RecalculationTarget,
    },
};

// ============================================================================
// Recording backend
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    CollectionDates,
    Snapshot,
    CreateCollectionStarted,
    CollectionCreated(String),
    Recalculate(String),
    Revalidate(String),
    StaffMembers,
    AddStaffWinner(String),
}

/// In-memory backend that logs every call and can be told to fail
#[derive(Clone)]
pub struct RecordingBackend {
    inner: InMemoryPbisBackend,
    calls: Arc<RwLock<Vec<BackendCall>>>,
    create_failures: Arc<RwLock<usize>>,
    failing_targets: Arc<RwLock<HashSet<String>>>,
    create_gate: Arc<RwLock<Option<Arc<Notify>>>>,
}

impl RecordingBackend {
    pub fn new(seed: BackendSeed) -> Self {
        Self {
            inner: InMemoryPbisBackend::with_seed(seed),
            calls: Arc::new(RwLock::new(Vec::new())),
            create_failures: Arc::new(RwLock::new(0)),
            failing_targets: Arc::new(RwLock::new(HashSet::new())),
            create_gate: Arc::new(RwLock::new(None)),
        }
    }

    pub fn inner(&self) -> &InMemoryPbisBackend {
        &self.inner
    }

    pub async fn calls(&self) -> Vec<BackendCall> {
        self.calls.read().await.clone()
    }

    pub async fn clear_calls(&self) {
        self.calls.write().await.clear();
    }

    pub async fn create_calls(&self) -> usize {
        self.calls
            .read()
            .await
            .iter()
            .filter(|call| matches!(call, BackendCall::CreateCollectionStarted))
            .count()
    }

    pub async fn recalculation_calls(&self) -> usize {
        self.calls
            .read()
            .await
            .iter()
            .filter(|call| matches!(call, BackendCall::Recalculate(_)))
            .count()
    }

    /// The next `count` create calls are rejected
    pub async fn fail_next_creates(&self, count: usize) {
        *self.create_failures.write().await = count;
    }

    pub async fn fail_recalculation_for(&self, id: &str) {
        self.failing_targets.write().await.insert(id.to_string());
    }

    /// Create calls wait on the returned handle before completing
    pub async fn hold_creates(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.create_gate.write().await = Some(gate.clone());
        gate
    }

    async fn record(&self, call: BackendCall) {
        self.calls.write().await.push(call);
    }
}

#[async_trait]
impl PbisBackend for RecordingBackend {
    async fn collection_dates(&self) -> Result<Vec<CollectionDate>, PbisError> {
        self.record(BackendCall::CollectionDates).await;
        self.inner.collection_dates().await
    }

    async fn collection_snapshot(
        &self,
        since: DateTime<Utc>,
    ) -> Result<CollectionSnapshot, PbisError> {
        self.record(BackendCall::Snapshot).await;
        self.inner.collection_snapshot(since).await
    }

    async fn create_collection(&self, collection: &NewCollection) -> Result<String, PbisError> {
        self.record(BackendCall::CreateCollectionStarted).await;

        let gate = self.create_gate.read().await.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        {
            let mut failures = self.create_failures.write().await;
            if *failures > 0 {
                *failures -= 1;
                return Err(PbisError::Backend("create collection rejected".to_string()));
            }
        }

        let id = self.inner.create_collection(collection).await?;
        self.record(BackendCall::CollectionCreated(id.clone())).await;
        Ok(id)
    }

    async fn recalculate(&self, target: &RecalculationTarget) -> Result<(), PbisError> {
        self.record(BackendCall::Recalculate(target.id().to_string()))
            .await;
        if self.failing_targets.read().await.contains(target.id()) {
            return Err(PbisError::Backend(format!("{} is locked", target)));
        }
        self.inner.recalculate(target).await
    }

    async fn revalidate(&self, path: &str) -> Result<(), PbisError> {
        self.record(BackendCall::Revalidate(path.to_string())).await;
        self.inner.revalidate(path).await
    }

    async fn staff_members(&self) -> Result<Vec<StaffMember>, PbisError> {
        self.record(BackendCall::StaffMembers).await;
        self.inner.staff_members().await
    }

    async fn add_staff_winner(
        &self,
        collection_id: &str,
        staff_id: &str,
    ) -> Result<(), PbisError> {
        self.record(BackendCall::AddStaffWinner(staff_id.to_string()))
            .await;
        self.inner.add_staff_winner(collection_id, staff_id).await
    }
}

// ============================================================================
// Recording email sender
// ============================================================================

#[derive(Default)]
pub struct RecordingEmailSender {
    sent: RwLock<Vec<EmailMessage>>,
    failing_addresses: RwLock<HashSet<String>>,
}

impl RecordingEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fail_for(&self, address: &str) {
        self.failing_addresses
            .write()
            .await
            .insert(address.to_string());
    }

    pub async fn sent(&self) -> Vec<EmailMessage> {
        self.sent.read().await.clone()
    }

    pub async fn sent_to(&self, address: &str) -> Vec<EmailMessage> {
        self.sent
            .read()
            .await
            .iter()
            .filter(|message| message.to_address == address)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        if self
            .failing_addresses
            .read()
            .await
            .contains(&message.to_address)
        {
            return Err(EmailError::Transport("mailbox unavailable".to_string()));
        }
        self.sent.write().await.push(message.clone());
        Ok(())
    }
}
