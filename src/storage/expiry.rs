//! Background Expiry Sweeper
//!
//! This module implements a background task that periodically removes expired
//! entries from a partition. This is called "active expiry" as opposed to
//! "lazy expiry" (which happens on access).
//!
//! ## Why Do We Need This?
//!
//! Lazy expiry (checking on access) is efficient but has a problem:
//! if a key expires and is never read again, it stays in memory forever.
//! The sweeper reclaims those entries on a fixed interval.
//!
//! ## Lifecycle
//!
//! ```text
//!   Sweeper::new ──> Idle ──run()──> Running ──stop() / drop──> Stopped
//!                     │                                           ▲
//!                     └───────────────stop()──────────────────────┘
//! ```
//!
//! Each running sweeper owns exactly one task. The task waits one full
//! interval, calls [`CleanupTarget::cleanup`] and waits for it to return
//! before the next tick can fire, so cleanups of the same target never
//! overlap. Stopping is fire-and-forget: `stop()` returns immediately and
//! the task exits the next time it is polled.
//!
//! The task runs on the ambient Tokio runtime when there is one. Sweepers
//! started from synchronous code share one small background runtime, built on
//! first use, so a table of many shards does not cost a thread per shard.

use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, trace};

const IDLE: u8 = 0;
const RUNNING: u8 = 1;
const STOPPED: u8 = 2;

/// Periods are capped here, about thirty years, so deadlines stay representable
const LONGEST_PERIOD: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

/// Something a [`Sweeper`] can periodically clean.
pub trait CleanupTarget: Send + Sync + 'static {
    /// Removes expired entries and returns how many were removed.
    fn cleanup(&self) -> usize;
}

/// Observable state of a [`Sweeper`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweeperState {
    /// Constructed, not started.
    Idle,
    /// A background task is ticking.
    Running,
    /// Terminal. No further ticks will happen.
    Stopped,
}

impl SweeperState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            IDLE => SweeperState::Idle,
            RUNNING => SweeperState::Running,
            _ => SweeperState::Stopped,
        }
    }
}

/// A handle to a background expiry sweeper.
///
/// When this handle is dropped, the sweeper task will be stopped.
#[derive(Debug)]
pub struct Sweeper {
    /// Time between two cleanups
    interval: Duration,

    /// Shared with the task so it can report its own exit
    state: Arc<AtomicU8>,

    /// Sender to signal shutdown
    shutdown_tx: watch::Sender<bool>,
}

impl Sweeper {
    /// Creates an idle sweeper. Nothing runs until [`Sweeper::run`].
    pub fn new(interval: Duration) -> Self {
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            interval,
            state: Arc::new(AtomicU8::new(IDLE)),
            shutdown_tx,
        }
    }

    /// Returns the configured interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns the current state.
    pub fn state(&self) -> SweeperState {
        SweeperState::from_raw(self.state.load(Ordering::Acquire))
    }

    /// Starts sweeping `target` in the background.
    ///
    /// The sweeper only holds a weak reference: once the target is dropped the
    /// task exits on its next tick.
    ///
    /// # Returns
    ///
    /// Returns `true` if a task was started. A sweeper runs at most once, so
    /// this returns `false` when it is not idle. A zero interval never starts.
    pub fn run<T: CleanupTarget>(&self, target: Weak<T>) -> bool {
        if self.interval.is_zero() {
            debug!("Sweeper interval is zero, not starting");
            return false;
        }

        if self
            .state
            .compare_exchange(IDLE, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(state = ?self.state(), "Sweeper is not idle, not starting");
            return false;
        }

        let shutdown_rx = self.shutdown_tx.subscribe();
        let guard = StopOnExit(Arc::clone(&self.state));
        spawn_task(sweeper_loop(target, self.interval, shutdown_rx, guard));

        debug!(
            interval_ms = self.interval.as_millis() as u64,
            "Background sweeper started"
        );
        true
    }

    /// Stops the sweeper.
    ///
    /// Returns without waiting for the task to observe the signal. Calling it
    /// again, or on a sweeper that never ran, is a no-op.
    pub fn stop(&self) {
        let previous = self.state.swap(STOPPED, Ordering::AcqRel);
        if previous == STOPPED {
            return;
        }

        self.shutdown_tx.send_replace(true);

        if previous == RUNNING {
            debug!("Background sweeper stopped");
        }
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Marks the sweeper stopped when its task ends, however it ends.
struct StopOnExit(Arc<AtomicU8>);

impl Drop for StopOnExit {
    fn drop(&mut self) {
        self.0.store(STOPPED, Ordering::Release);
    }
}

/// The main sweeper loop.
async fn sweeper_loop<T: CleanupTarget>(
    target: Weak<T>,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
    _guard: StopOnExit,
) {
    let period = period.min(LONGEST_PERIOD);
    let Some(start) = time::Instant::now().checked_add(period) else {
        debug!("Sweep interval out of range, waiting for shutdown");
        let _ = shutdown_rx.wait_for(|stop| *stop).await;
        return;
    };

    let mut ticker = time::interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        // Stop may have been requested before this task was first polled
        if *shutdown_rx.borrow() {
            debug!("Sweeper received shutdown signal");
            return;
        }

        tokio::select! {
            biased;
            result = shutdown_rx.changed() => {
                if result.is_err() {
                    debug!("Sweeper handle dropped");
                    return;
                }
                continue;
            }
            _ = ticker.tick() => {}
        }

        let Some(strong) = target.upgrade() else {
            debug!("Sweep target dropped, stopping sweeper");
            return;
        };

        let removed = strong.cleanup();
        if removed > 0 {
            trace!(removed = removed, "Expired entries swept");
        }
    }
}

/// Runtime shared by every sweeper started outside of Tokio.
fn background_runtime() -> Option<&'static Runtime> {
    static RUNTIME: OnceLock<Option<Runtime>> = OnceLock::new();

    RUNTIME
        .get_or_init(|| {
            let built = Builder::new_multi_thread()
                .worker_threads(num_cpus::get().clamp(2, 4))
                .thread_name("stripecache-sweeper")
                .enable_time()
                .build();

            match built {
                Ok(runtime) => {
                    debug!("Background sweeper runtime started");
                    Some(runtime)
                }
                Err(e) => {
                    error!(error = %e, "Failed to build sweeper runtime");
                    None
                }
            }
        })
        .as_ref()
}

/// Spawns onto the current runtime, or onto the shared background runtime.
fn spawn_task<F>(task: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(handle) = Handle::try_current() {
        handle.spawn(task);
        return;
    }

    // Without a runtime the task is dropped, which marks the sweeper stopped
    if let Some(runtime) = background_runtime() {
        runtime.spawn(task);
    }
}
