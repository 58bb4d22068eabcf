//! Background write-back synchronizer for the hot tier.
//!
//! Once activated, a task wakes on a fixed interval, pushes every dirty
//! entry to the downstream layer, and then evicts expired entries. Entries
//! that fail to flush keep their dirty flag and are retried on the next
//! cycle.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use super::memory::TierState;
use super::traits::CacheTier;

// ============================================================================
// METRICS
// ============================================================================

/// Counters recorded by the flush task.
#[derive(Debug)]
pub struct FlushMetrics {
    pub flush_cycles: AtomicU64,
    pub entries_flushed: AtomicU64,
    pub flush_failures: AtomicU64,
    pub entries_expired: AtomicU64,
}

impl FlushMetrics {
    pub fn new() -> Self {
        Self {
            flush_cycles: AtomicU64::new(0),
            entries_flushed: AtomicU64::new(0),
            flush_failures: AtomicU64::new(0),
            entries_expired: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> FlushSnapshot {
        FlushSnapshot {
            flush_cycles: self.flush_cycles.load(Ordering::Relaxed),
            entries_flushed: self.entries_flushed.load(Ordering::Relaxed),
            flush_failures: self.flush_failures.load(Ordering::Relaxed),
            entries_expired: self.entries_expired.load(Ordering::Relaxed),
        }
    }
}

impl Default for FlushMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`FlushMetrics`].
#[derive(Debug, Clone)]
pub struct FlushSnapshot {
    pub flush_cycles: u64,
    pub entries_flushed: u64,
    pub flush_failures: u64,
    pub entries_expired: u64,
}

// ============================================================================
// TASK CONTROL
// ============================================================================

/// Handle to a running flush task.
pub(crate) struct FlushControl {
    shutdown_tx: watch::Sender<bool>,
    metrics: Arc<FlushMetrics>,
    handle: Mutex<Option<JoinHandle<Arc<FlushMetrics>>>>,
}

impl FlushControl {
    /// Spawns the flush task and returns the handle controlling it.
    pub(crate) fn spawn(
        state: Arc<Mutex<TierState>>,
        layer: Arc<dyn CacheTier>,
        period: Duration,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let metrics = Arc::new(FlushMetrics::new());
        let handle = tokio::spawn(flush_task(
            state,
            layer,
            period,
            shutdown_rx,
            Arc::clone(&metrics),
        ));

        Self {
            shutdown_tx,
            metrics,
            handle: Mutex::new(Some(handle)),
        }
    }

    pub(crate) fn snapshot(&self) -> FlushSnapshot {
        self.metrics.snapshot()
    }

    /// Signals shutdown and waits for the task to finish. Returns the final
    /// metrics; `None` only if the task panicked or the handle is unusable.
    pub(crate) async fn stop(&self) -> Option<FlushSnapshot> {
        let _ = self.shutdown_tx.send(true);

        let handle = {
            let mut slot = match self.handle.lock() {
                Ok(slot) => slot,
                Err(_) => return None,
            };
            slot.take()
        };

        match handle {
            Some(handle) => match handle.await {
                Ok(metrics) => Some(metrics.snapshot()),
                Err(_) => None,
            },
            // Already stopped; the shared counters hold the final values.
            None => Some(self.metrics.snapshot()),
        }
    }
}

impl Drop for FlushControl {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

/// Periodically pushes dirty entries downstream and evicts expired ones.
///
/// Runs until `shutdown_rx` flips to `true` or its sender is dropped.
pub(crate) async fn flush_task(
    state: Arc<Mutex<TierState>>,
    layer: Arc<dyn CacheTier>,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
    metrics: Arc<FlushMetrics>,
) -> Arc<FlushMetrics> {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        interval_ms = period.as_millis() as u64,
        "Cache flush task started"
    );

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                run_flush_cycle(&state, layer.as_ref(), &metrics).await;
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        flush_cycles = snapshot.flush_cycles,
        entries_flushed = snapshot.entries_flushed,
        flush_failures = snapshot.flush_failures,
        entries_expired = snapshot.entries_expired,
        "Cache flush task stopped"
    );

    metrics
}

/// One pass: push every dirty entry downstream, then evict expired entries.
///
/// The dirty set is captured up front so the tier lock is not held across
/// downstream writes. Each entry's flag is cleared only if it has not been
/// overwritten since the capture.
pub(crate) async fn run_flush_cycle(
    state: &Mutex<TierState>,
    layer: &dyn CacheTier,
    metrics: &FlushMetrics,
) {
    metrics.flush_cycles.fetch_add(1, Ordering::Relaxed);

    let dirty = {
        let state = match state.lock() {
            Ok(state) => state,
            Err(_) => {
                tracing::error!("Tier state lock poisoned, skipping flush cycle");
                metrics.flush_failures.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };
        state.dirty_snapshot()
    };

    let mut flushed = 0usize;
    for entry in dirty {
        match layer.set(&entry.key, entry.payload).await {
            Ok(()) => {
                if let Ok(mut state) = state.lock() {
                    state.clear_dirty_if(&entry.key, entry.generation);
                }
                flushed += 1;
                metrics.entries_flushed.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                tracing::warn!(
                    key = %entry.key,
                    error = %err,
                    "Failed to flush entry, will retry next cycle"
                );
                metrics.flush_failures.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    let expired = match state.lock() {
        Ok(mut state) => state.purge_expired(Instant::now()),
        Err(_) => 0,
    };
    if expired > 0 {
        metrics
            .entries_expired
            .fetch_add(expired as u64, Ordering::Relaxed);
    }

    if flushed > 0 || expired > 0 {
        tracing::debug!(flushed, expired, "Flush cycle complete");
    }
}

// ============================================================================
// TESTS
// ============================================================================
