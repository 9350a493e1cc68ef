use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use uuid::Uuid;

use crate::error::{Result, SyncError};
use crate::lifecycle::job::JobId;
use crate::queue::{QueueItem, QueueStore};

fn retryable(items: &[QueueItem], threshold: u32) -> Vec<QueueItem> {
    items
        .iter()
        .filter(|i| i.retry_count < threshold)
        .cloned()
        .collect()
}

fn increment(items: &mut [QueueItem], id: &Uuid, error: &str) -> bool {
    if let Some(item) = items.iter_mut().find(|i| i.id == *id) {
        item.retry_count += 1;
        item.last_error = Some(error.to_string());
        true
    } else {
        false
    }
}

fn mark_failed(items: &mut [QueueItem], id: &Uuid, error: &str, threshold: u32) -> bool {
    if let Some(item) = items.iter_mut().find(|i| i.id == *id) {
        item.retry_count = item.retry_count.max(threshold);
        item.last_error = Some(error.to_string());
        true
    } else {
        false
    }
}

fn reset_failed(items: &mut [QueueItem], threshold: u32) {
    for item in items.iter_mut().filter(|i| i.retry_count >= threshold) {
        item.retry_count = 0;
    }
}

fn retarget(items: &mut [QueueItem], old: &JobId, new: &JobId) {
    for item in items.iter_mut() {
        let id = item.mutation.job_id_mut();
        if id == old {
            *id = new.clone();
        }
    }
}

/// Volatile queue store for tests and single-session use.
pub struct MemoryQueueStore {
    items: Mutex<Vec<QueueItem>>,
    threshold: u32,
    revision: watch::Sender<u64>,
}

impl MemoryQueueStore {
    pub fn new(threshold: u32) -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            threshold,
            revision: watch::Sender::new(0),
        }
    }

    fn bump(&self) {
        self.revision.send_modify(|r| *r += 1);
    }

    // Every mutation under the lock either completes or is rolled back,
    // so a poisoned lock still guards a consistent list.
    fn lock(&self) -> MutexGuard<'_, Vec<QueueItem>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl QueueStore for MemoryQueueStore {
    fn append(&self, item: QueueItem) -> Result<()> {
        self.lock().push(item);
        self.bump();
        Ok(())
    }

    fn list_retryable(&self) -> Result<Vec<QueueItem>> {
        Ok(retryable(&self.lock(), self.threshold))
    }

    fn remove(&self, id: &Uuid) -> Result<()> {
        self.lock().retain(|i| i.id != *id);
        self.bump();
        Ok(())
    }

    fn increment_retry(&self, id: &Uuid, error: &str) -> Result<()> {
        increment(&mut self.lock(), id, error);
        self.bump();
        Ok(())
    }

    fn mark_failed(&self, id: &Uuid, error: &str) -> Result<()> {
        mark_failed(&mut self.lock(), id, error, self.threshold);
        self.bump();
        Ok(())
    }

    fn count(&self) -> usize {
        self.lock().len()
    }

    fn failed_count(&self) -> usize {
        self.lock()
            .iter()
            .filter(|i| i.retry_count >= self.threshold)
            .count()
    }

    fn reset_failed(&self) -> Result<()> {
        reset_failed(&mut self.lock(), self.threshold);
        self.bump();
        Ok(())
    }

    fn retarget(&self, old: &JobId, new: &JobId) -> Result<()> {
        retarget(&mut self.lock(), old, new);
        self.bump();
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}

/// Queue store persisted as a JSON snapshot, written through on every
/// change so the queue survives process restarts.
///
/// Every mutation hits disk before it becomes visible in memory: a failed
/// write leaves both sides unchanged, so what replay sees is exactly what
/// a restart would reload.
pub struct FileQueueStore {
    path: PathBuf,
    items: Mutex<Vec<QueueItem>>,
    threshold: u32,
    revision: watch::Sender<u64>,
}

impl FileQueueStore {
    pub fn open(path: impl Into<PathBuf>, threshold: u32) -> Result<Self> {
        let path = path.into();
        let items = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| SyncError::Store(format!("corrupt queue file: {e}")))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(SyncError::Store(e.to_string())),
        };
        Ok(Self {
            path,
            items: Mutex::new(items),
            threshold,
            revision: watch::Sender::new(0),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Vec<QueueItem>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, items: &[QueueItem]) -> Result<()> {
        let bytes =
            serde_json::to_vec_pretty(items).map_err(|e| SyncError::Store(e.to_string()))?;
        std::fs::write(&self.path, bytes).map_err(|e| SyncError::Store(e.to_string()))?;
        self.revision.send_modify(|r| *r += 1);
        Ok(())
    }

    /// Apply a mutation to a scratch copy, persist it, and only then swap
    /// it into memory.
    fn commit(&self, mutate: impl FnOnce(&mut Vec<QueueItem>)) -> Result<()> {
        let mut items = self.lock();
        let mut next = items.clone();
        mutate(&mut next);
        self.persist(&next)?;
        *items = next;
        Ok(())
    }
}

impl QueueStore for FileQueueStore {
    fn append(&self, item: QueueItem) -> Result<()> {
        self.commit(|items| items.push(item))
    }

    fn list_retryable(&self) -> Result<Vec<QueueItem>> {
        Ok(retryable(&self.lock(), self.threshold))
    }

    fn remove(&self, id: &Uuid) -> Result<()> {
        self.commit(|items| items.retain(|i| i.id != *id))
    }

    fn increment_retry(&self, id: &Uuid, error: &str) -> Result<()> {
        self.commit(|items| {
            increment(items, id, error);
        })
    }

    fn mark_failed(&self, id: &Uuid, error: &str) -> Result<()> {
        let threshold = self.threshold;
        self.commit(|items| {
            mark_failed(items, id, error, threshold);
        })
    }

    fn count(&self) -> usize {
        self.lock().len()
    }

    fn failed_count(&self) -> usize {
        self.lock()
            .iter()
            .filter(|i| i.retry_count >= self.threshold)
            .count()
    }

    fn reset_failed(&self) -> Result<()> {
        let threshold = self.threshold;
        self.commit(|items| reset_failed(items, threshold))
    }

    fn retarget(&self, old: &JobId, new: &JobId) -> Result<()> {
        self.commit(|items| retarget(items, old, new))
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}
