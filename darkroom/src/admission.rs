use shared::{Error, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::trace;

/// Number of previews generated at once unless configured otherwise
pub const DEFAULT_PREVIEW_CONCURRENCY: usize = 2;

/// Bounds how many preview generations run at the same time.
///
/// Waiters queue on a fair semaphore. A ticket is held for the whole wrapped
/// operation and handed back when it finishes, fails, or is dropped.
#[derive(Clone, Debug)]
pub struct AdmissionLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// One unit of admission. Dropping it returns the ticket to the pool.
#[derive(Debug)]
pub struct AdmissionTicket {
    _permit: OwnedSemaphorePermit,
}

impl Drop for AdmissionTicket {
    fn drop(&mut self) {
        trace!("Admission ticket released");
    }
}

impl AdmissionLimiter {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Tickets not currently held
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn in_flight(&self) -> usize {
        self.capacity.saturating_sub(self.available())
    }

    /// Wait for a ticket. Cancelling the wait consumes nothing.
    pub async fn acquire(&self) -> Result<AdmissionTicket> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| Error::ResourceExhausted(format!("admission pool closed: {}", e)))?;
        trace!(
            available = self.semaphore.available_permits(),
            capacity = self.capacity,
            "Admission ticket acquired"
        );
        Ok(AdmissionTicket { _permit: permit })
    }

    /// Run `operation` while holding a ticket and return its outcome untouched
    pub async fn run_with_admission<F, T>(&self, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let _ticket = self.acquire().await?;
        operation.await
    }

    /// Like `run_with_admission`, but hands the ticket to the operation so it
    /// can outlive the calling future (e.g. moved into blocking work that keeps
    /// running after the caller is cancelled)
    pub async fn run_with_ticket<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: FnOnce(AdmissionTicket) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let ticket = self.acquire().await?;
        operation(ticket).await
    }
}

impl Default for AdmissionLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_PREVIEW_CONCURRENCY)
    }
}
