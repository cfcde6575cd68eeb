//! Sequence number pool.
//!
//! Sequence numbers are the only admission control for outstanding requests:
//! at most 15 requests can be in flight per connection. Waiters are served in
//! FIFO order.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use brickwire_frame::SequenceNumber;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Bounded pool of sequence numbers shared by all callers of one session.
#[derive(Debug, Clone)]
pub struct SequencePool {
    inner: Arc<PoolInner>,
}

#[derive(Debug)]
struct PoolInner {
    free: Mutex<VecDeque<SequenceNumber>>,
    permits: Arc<Semaphore>,
}

impl PoolInner {
    fn free(&self) -> std::sync::MutexGuard<'_, VecDeque<SequenceNumber>> {
        self.free.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SequencePool {
    fn default() -> Self {
        Self::new()
    }
}

impl SequencePool {
    /// A pool with all of 1..=15 available, handed out in ascending order.
    pub fn new() -> Self {
        let free: VecDeque<_> = SequenceNumber::all().collect();
        let permits = Arc::new(Semaphore::new(free.len()));
        Self {
            inner: Arc::new(PoolInner {
                free: Mutex::new(free),
                permits,
            }),
        }
    }

    /// Wait for a free sequence number.
    ///
    /// Returns `None` once the pool has been closed.
    pub async fn acquire(&self) -> Option<SequenceLease> {
        let permit = Arc::clone(&self.inner.permits).acquire_owned().await.ok()?;
        self.lease(permit)
    }

    /// Take a sequence number without waiting.
    pub fn try_acquire(&self) -> Option<SequenceLease> {
        let permit = Arc::clone(&self.inner.permits).try_acquire_owned().ok()?;
        self.lease(permit)
    }

    fn lease(&self, permit: OwnedSemaphorePermit) -> Option<SequenceLease> {
        // A permit guarantees a free number.
        let number = self.inner.free().pop_front()?;
        Some(SequenceLease {
            number,
            pool: Arc::clone(&self.inner),
            _permit: permit,
        })
    }

    /// Numbers currently available.
    pub fn available(&self) -> usize {
        self.inner.permits.available_permits()
    }

    /// Wake every waiter with `None` and refuse further acquisitions.
    pub fn close(&self) {
        self.inner.permits.close();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.permits.is_closed()
    }
}

/// Exclusive hold on one sequence number.
///
/// The number returns to the pool when the lease is dropped, however the
/// request ended.
#[derive(Debug)]
pub struct SequenceLease {
    number: SequenceNumber,
    pool: Arc<PoolInner>,
    _permit: OwnedSemaphorePermit,
}

impl SequenceLease {
    pub fn number(&self) -> SequenceNumber {
        self.number
    }

    /// Return the number to the pool.
    pub fn release(self) {}
}

impl Drop for SequenceLease {
    fn drop(&mut self) {
        // Push the number back before the permit is released so the next
        // permit holder always finds it.
        self.pool.free().push_back(self.number);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn hands_out_each_number_once() {
        let pool = SequencePool::new();
        let mut leases = Vec::new();
        for _ in 0..15 {
            leases.push(pool.acquire().await.unwrap());
        }

        let numbers: HashSet<u8> = leases.iter().map(|l| l.number().get()).collect();
        assert_eq!(numbers.len(), 15);
        assert!(numbers.iter().all(|n| (1..=15).contains(n)));
        assert_eq!(leases[0].number().get(), 1);
        assert_eq!(pool.available(), 0);
        assert!(pool.try_acquire().is_none());
    }

    #[tokio::test]
    async fn released_number_is_immediately_reusable() {
        let pool = SequencePool::new();
        let mut leases = Vec::new();
        for _ in 0..15 {
            leases.push(pool.acquire().await.unwrap());
        }

        let released = leases.remove(6);
        let number = released.number();
        released.release();

        let again = pool.try_acquire().unwrap();
        assert_eq!(again.number(), number);
    }

    #[tokio::test(start_paused = true)]
    async fn sixteenth_acquire_waits_for_release() {
        let pool = SequencePool::new();
        let mut leases = Vec::new();
        for _ in 0..15 {
            leases.push(pool.acquire().await.unwrap());
        }

        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.acquire().await.map(|l| l.number()) })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!waiter.is_finished());

        let freed = leases.pop().unwrap();
        let number = freed.number();
        drop(freed);

        assert_eq!(waiter.await.unwrap(), Some(number));
    }

    #[tokio::test]
    async fn close_wakes_waiters() {
        let pool = SequencePool::new();
        let _leases: Vec<_> = (0..15).filter_map(|_| pool.try_acquire()).collect();

        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.acquire().await.is_none() })
        };
        tokio::task::yield_now().await;

        pool.close();
        assert!(waiter.await.unwrap());
        assert!(pool.is_closed());
    }
}
