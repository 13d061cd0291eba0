//! Strict-ordering admission control.
//!
//! A [`Gate`] bounds how many operations may be in flight and admits waiters
//! in arrival order. It backs two very different policies:
//! - 1 permit during capture: the render engine holds a single mutable scene
//!   and may only serve one timestamp at a time.
//! - N permits during encoding: independent batches run side by side.
//!
//! Every gate is tied to the session's cancellation token, so nobody can sit
//! in `acquire()` forever after the export was cancelled.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use kinetype_common::error::{ExportError, ExportResult};

/// FIFO counting gate observing a cancellation token.
#[derive(Debug, Clone)]
pub struct Gate {
    name: &'static str,
    permits: usize,
    // tokio's semaphore queues waiters fairly, which is what gives FIFO order.
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
}

/// Proof of admission. Dropping it returns the permit to the gate.
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

impl GatePermit {
    /// Return the permit, waking the oldest waiter.
    pub fn release(self) {}
}

impl Gate {
    /// Create a gate with `permits` slots (at least one).
    pub fn new(name: &'static str, permits: usize, cancel: CancellationToken) -> Self {
        let permits = permits.max(1);
        Self {
            name,
            permits,
            semaphore: Arc::new(Semaphore::new(permits)),
            cancel,
        }
    }

    /// Wait for a permit in arrival order.
    ///
    /// Fails with [`ExportError::Cancelled`] immediately if the token is
    /// already cancelled, or as soon as it is cancelled while waiting.
    pub async fn acquire(&self) -> ExportResult<GatePermit> {
        if self.cancel.is_cancelled() {
            return Err(ExportError::Cancelled);
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                tracing::debug!(gate = self.name, "Gate acquire interrupted by cancellation");
                Err(ExportError::Cancelled)
            }
            permit = self.semaphore.clone().acquire_owned() => {
                let permit = permit
                    .map_err(|_| ExportError::session(format!("{} gate closed", self.name)))?;
                Ok(GatePermit { _permit: permit })
            }
        }
    }

    /// Permits currently free.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Configured permit count.
    pub fn capacity(&self) -> usize {
        self.permits
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_waiters_admitted_in_fifo_order() {
        let gate = Gate::new("test", 1, CancellationToken::new());
        let held = gate.acquire().await.unwrap();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let mut handles = Vec::new();
        for id in 0..5u32 {
            let gate = gate.clone();
            let tx = tx.clone();
            handles.push(tokio::spawn(async move {
                let permit = gate.acquire().await.unwrap();
                tx.send(id).unwrap();
                tokio::time::sleep(Duration::from_millis(1)).await;
                permit.release();
            }));
            // Let this waiter enqueue before the next one arrives.
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        drop(tx);

        held.release();
        for handle in handles {
            handle.await.unwrap();
        }

        let mut order = Vec::new();
        while let Some(id) = rx.recv().await {
            order.push(id);
        }
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_bounded_parallelism() {
        let gate = Gate::new("encode", 2, CancellationToken::new());
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let gate = gate.clone();
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                let _permit = gate.acquire().await.unwrap();
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 2);
        assert_eq!(gate.available(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_gate_fails_fast() {
        let cancel = CancellationToken::new();
        let gate = Gate::new("capture", 1, cancel.clone());
        cancel.cancel();
        assert!(matches!(gate.acquire().await, Err(ExportError::Cancelled)));
        // The permit was never handed out.
        assert_eq!(gate.available(), 1);
    }

    #[tokio::test]
    async fn test_blocked_waiter_wakes_on_cancel() {
        let cancel = CancellationToken::new();
        let gate = Gate::new("capture", 1, cancel.clone());
        let _held = gate.acquire().await.unwrap();

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.acquire().await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        cancel.cancel();

        let result = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake promptly")
            .unwrap();
        assert!(matches!(result, Err(ExportError::Cancelled)));
    }

    #[test]
    fn test_zero_permits_rounds_up() {
        let gate = Gate::new("encode", 0, CancellationToken::new());
        assert_eq!(gate.capacity(), 1);
    }
}
