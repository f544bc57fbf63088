//! The daemon's main control loop.
//!
//! Runs reconciliation iterations at a fixed polling interval: a pending
//! full-resync flag is consumed at the top of each iteration, pending
//! local work is processed, and the loop sleeps out the remainder of the
//! interval. Shutdown is cooperative: the termination signal flips a flag
//! and the loop exits after finishing its current iteration.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use dvs_agent_common::AgentResult;

/// Feed of locally pending reconciliation work.
///
/// Implemented by the event-transport integration; the loop only decides
/// when to drain it and when to request a full resync.
#[async_trait]
pub trait PollSource: Send {
    /// Requests a full resync of all managed resources from the control
    /// plane on the next poll.
    fn force_full_sync(&mut self);

    /// Returns true when device polling reports pending work.
    fn polling_required(&self) -> bool;

    /// Returns true when deferred security-rule refreshes are pending.
    fn firewall_refresh_needed(&self) -> bool;

    /// Drains and processes pending work.
    async fn process_updates(&mut self) -> AgentResult<()>;
}

/// Cooperative shutdown flag for the daemon loop.
///
/// Cloneable so the signal handler can own one end; flipping it never
/// interrupts an in-flight iteration.
#[derive(Debug, Clone)]
pub struct ShutdownHandle(Arc<AtomicBool>);

impl ShutdownHandle {
    /// Requests that the loop exit after its current iteration.
    pub fn request_shutdown(&self) {
        self.0.store(false, Ordering::Relaxed);
    }

    /// Returns true while the loop should keep running.
    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Shared full-resync request flag.
///
/// Written by the heartbeat task and consumed by the loop. A benign race
/// at worst triggers one extra resync.
#[derive(Debug, Clone)]
pub struct FullSyncFlag(Arc<AtomicBool>);

impl FullSyncFlag {
    /// Marks the agent out of sync.
    pub fn set(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Consumes the flag, returning whether it was set.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::Relaxed)
    }

    /// Reads the flag without consuming it.
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// The polling control loop.
pub struct PollingLoop {
    polling_interval: Duration,
    running: Arc<AtomicBool>,
    full_sync: FullSyncFlag,
    iter_num: u64,
}

impl PollingLoop {
    /// Creates a loop that starts out of sync: the first iteration always
    /// requests a full resync.
    pub fn new(polling_interval: Duration) -> Self {
        Self {
            polling_interval,
            running: Arc::new(AtomicBool::new(true)),
            full_sync: FullSyncFlag(Arc::new(AtomicBool::new(true))),
            iter_num: 0,
        }
    }

    /// Returns a handle for requesting shutdown.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(Arc::clone(&self.running))
    }

    /// Returns the shared full-resync flag.
    pub fn full_sync_flag(&self) -> FullSyncFlag {
        self.full_sync.clone()
    }

    /// Returns the number of completed iterations.
    pub fn iterations(&self) -> u64 {
        self.iter_num
    }

    /// Runs until shutdown is requested.
    pub async fn run<P: PollSource>(&mut self, source: &mut P) {
        info!(
            polling_interval_secs = self.polling_interval.as_secs_f64(),
            "daemon loop started"
        );
        while self.running.load(Ordering::Relaxed) {
            let start = Instant::now();

            if self.full_sync.take() {
                info!("agent out of sync with control plane, requesting full resync");
                source.force_full_sync();
            }

            if source.polling_required() || source.firewall_refresh_needed() {
                debug!(iteration = self.iter_num, "processing pending updates");
                if let Err(err) = source.process_updates().await {
                    warn!(
                        error = %err,
                        "failed processing updates, next full resync will recover"
                    );
                }
            }

            self.wait_for_next_iteration(start.elapsed()).await;
        }
        info!(iterations = self.iter_num, "daemon loop exited");
    }

    /// Sleeps out the remainder of the polling interval, or logs the
    /// overrun and proceeds immediately.
    async fn wait_for_next_iteration(&mut self, elapsed: Duration) {
        debug!(
            iteration = self.iter_num,
            elapsed_ms = elapsed.as_millis() as u64,
            "iteration completed"
        );
        if elapsed < self.polling_interval {
            tokio::time::sleep(self.polling_interval - elapsed).await;
        } else {
            warn!(
                polling_interval_secs = self.polling_interval.as_secs_f64(),
                elapsed_secs = elapsed.as_secs_f64(),
                "loop iteration exceeded polling interval"
            );
        }
        self.iter_num += 1;
    }
}
