//! Background sweeping of idle pooled connections
//!
//! An [`IdleReaper`] is bound to exactly one pool through a non-owning
//! reference and periodically closes connections that sat idle past the idle
//! TTL, outlived their keep-alive deadline, reported themselves closed, or
//! exceeded the maximum connection age.
//!
//! The sweep loop runs either on a dedicated thread or as a task on a tokio
//! runtime. Both wait interruptibly, so a stop is observed immediately rather
//! than at the next interval boundary. Close failures and panics inside a
//! sweep are logged and counted; they never reach the thread owning the pool.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::ReaperConfig;
use crate::pool::{CloseReport, ConnectionPool, Poolable, deadline_after};

const THREAD_NAME: &str = "transit-idle-reaper";

/// The sweep operations a reaper drives.
pub trait IdleSweep: Send + Sync {
    /// Close connections idle longer than `ttl` or otherwise unusable.
    fn close_expired(&self, ttl: Duration) -> CloseReport;

    /// Close idle connections opened more than `max_age` ago.
    fn close_idle_older_than(&self, max_age: Duration) -> CloseReport;
}

impl<C: Poolable> IdleSweep for ConnectionPool<C> {
    fn close_expired(&self, ttl: Duration) -> CloseReport {
        ConnectionPool::close_expired(self, ttl)
    }

    fn close_idle_older_than(&self, max_age: Duration) -> CloseReport {
        ConnectionPool::close_idle_older_than(self, max_age)
    }
}

/// Lifecycle of a reaper. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum ReaperState {
    Created = 0,
    Running = 1,
    Stopping = 2,
    Stopped = 3,
}

impl ReaperState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ReaperState::Created,
            1 => ReaperState::Running,
            2 => ReaperState::Stopping,
            _ => ReaperState::Stopped,
        }
    }
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Closed for idling past the TTL, keep-alive expiry, or being closed
    pub expired: CloseReport,
    /// Closed for exceeding the maximum connection age
    pub aged: CloseReport,
    /// The sweep panicked and was abandoned
    pub panicked: bool,
}

impl SweepReport {
    #[must_use]
    pub fn closed(&self) -> usize {
        self.expired.closed + self.aged.closed
    }

    #[must_use]
    pub fn failures(&self) -> usize {
        self.expired.failed + self.aged.failed + usize::from(self.panicked)
    }
}

/// Running totals over the reaper's lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReaperStats {
    pub sweeps: u64,
    pub closed: u64,
    /// Failed closes plus panicked sweeps
    pub failures: u64,
}

struct Shared {
    state: AtomicU8,
    sweeps: AtomicU64,
    closed: AtomicU64,
    failures: AtomicU64,
    terminated: Mutex<bool>,
    terminated_cv: Condvar,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(ReaperState::Created as u8),
            sweeps: AtomicU64::new(0),
            closed: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            terminated: Mutex::new(false),
            terminated_cv: Condvar::new(),
        }
    }

    fn state(&self) -> ReaperState {
        ReaperState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn transition(&self, from: ReaperState, to: ReaperState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn record(&self, report: &SweepReport) {
        self.sweeps.fetch_add(1, Ordering::Relaxed);
        self.closed.fetch_add(report.closed() as u64, Ordering::Relaxed);
        self.failures.fetch_add(report.failures() as u64, Ordering::Relaxed);
    }

    fn terminated(&self) -> MutexGuard<'_, bool> {
        self.terminated.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn finish(&self) {
        self.state.store(ReaperState::Stopped as u8, Ordering::Release);
        *self.terminated() = true;
        self.terminated_cv.notify_all();
    }
}

/// Marks the reaper stopped when the sweep loop ends, however it ends.
struct FinishGuard(Arc<Shared>);

impl Drop for FinishGuard {
    fn drop(&mut self) {
        self.0.finish();
        debug!("idle reaper stopped");
    }
}

#[derive(Clone)]
struct Sweeper {
    target: Weak<dyn IdleSweep>,
    config: ReaperConfig,
    shared: Arc<Shared>,
}

impl Sweeper {
    fn sweep(&self) -> SweepReport {
        let Some(target) = self.target.upgrade() else {
            return SweepReport::default();
        };
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let expired = target.close_expired(self.config.idle_ttl);
            let aged = self
                .config
                .max_connection_age
                .map(|age| target.close_idle_older_than(age))
                .unwrap_or_default();
            (expired, aged)
        }));
        let report = match outcome {
            Ok((expired, aged)) => SweepReport {
                expired,
                aged,
                panicked: false,
            },
            Err(_) => {
                error!("idle connection sweep panicked");
                SweepReport {
                    panicked: true,
                    ..SweepReport::default()
                }
            }
        };
        if report.failures() > 0 {
            warn!(failures = report.failures(), "idle sweep could not close every connection");
        } else if report.closed() > 0 {
            debug!(closed = report.closed(), "idle sweep closed connections");
        }
        self.shared.record(&report);
        report
    }

    /// One scheduled sweep; false once the loop should end.
    fn tick(&self) -> bool {
        if self.shared.state() != ReaperState::Running {
            return false;
        }
        if self.target.strong_count() == 0 {
            debug!("pool dropped, idle reaper exiting");
            return false;
        }
        self.sweep();
        true
    }

    fn run_blocking(self, stop: Receiver<()>) {
        let _finish = FinishGuard(Arc::clone(&self.shared));
        loop {
            match stop.recv_timeout(self.config.sweep_interval) {
                Err(RecvTimeoutError::Timeout) => {
                    if !self.tick() {
                        break;
                    }
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    async fn run_task(self, stop: Arc<Notify>) {
        let interval = self.config.sweep_interval;
        let first = tokio::time::Instant::from_std(deadline_after(Instant::now(), interval));
        let mut ticker = tokio::time::interval_at(first, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = stop.notified() => break,
                _ = ticker.tick() => {
                    if !self.tick() {
                        break;
                    }
                }
            }
        }
    }
}

enum Driver {
    Thread(Sender<()>),
    Task(Arc<Notify>),
}

impl Driver {
    fn signal(self) {
        match self {
            // Dropping the only sender disconnects the channel.
            Driver::Thread(stop) => drop(stop),
            Driver::Task(stop) => stop.notify_one(),
        }
    }
}

/// Periodic sweeper of one pool's idle connections.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use transit_client::{ConnectionPool, IdleReaper, PoolSettings, ReaperConfig};
/// # use transit_client::HttpConnection;
/// # use std::time::Duration;
///
/// let pool: Arc<ConnectionPool<HttpConnection>> =
///     Arc::new(ConnectionPool::new(PoolSettings::new(10, 2, Duration::from_secs(5))));
/// let reaper = IdleReaper::for_pool(&pool, ReaperConfig::default());
/// reaper.start()?;
/// // ...
/// reaper.stop();
/// # Ok::<(), std::io::Error>(())
/// ```
pub struct IdleReaper {
    sweeper: Sweeper,
    driver: Mutex<Option<Driver>>,
}

impl IdleReaper {
    #[must_use]
    pub fn new(target: Weak<dyn IdleSweep>, config: ReaperConfig) -> Self {
        Self {
            sweeper: Sweeper {
                target,
                config,
                shared: Arc::new(Shared::new()),
            },
            driver: Mutex::new(None),
        }
    }

    /// Bind a reaper to `pool` without keeping the pool alive.
    #[must_use]
    pub fn for_pool<C: Poolable>(pool: &Arc<ConnectionPool<C>>, config: ReaperConfig) -> Self {
        let weak: Weak<ConnectionPool<C>> = Arc::downgrade(pool);
        let target: Weak<dyn IdleSweep> = weak;
        Self::new(target, config)
    }

    /// Start sweeping on a dedicated thread. Only the first call on a
    /// `Created` reaper does anything; later calls return `Ok(())`.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the sweep thread cannot be spawned; the
    /// reaper is `Stopped` afterwards.
    pub fn start(&self) -> io::Result<()> {
        let mut driver = self.driver();
        if !self.sweeper.shared.transition(ReaperState::Created, ReaperState::Running) {
            return Ok(());
        }
        let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
        let sweeper = self.sweeper.clone();
        let spawned = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || sweeper.run_blocking(stop_rx));
        match spawned {
            Ok(_) => {
                *driver = Some(Driver::Thread(stop_tx));
                info!(
                    interval = ?self.sweeper.config.sweep_interval,
                    idle_ttl = ?self.sweeper.config.idle_ttl,
                    "idle reaper started on thread"
                );
                Ok(())
            }
            Err(err) => {
                self.sweeper.shared.finish();
                error!(error = %err, "failed to spawn idle reaper thread");
                Err(err)
            }
        }
    }

    /// Start sweeping as a task on `handle`'s runtime. Same once-only rule
    /// as [`start`](Self::start).
    pub fn start_on(&self, handle: &Handle) {
        let mut driver = self.driver();
        if !self.sweeper.shared.transition(ReaperState::Created, ReaperState::Running) {
            return;
        }
        let stop = Arc::new(Notify::new());
        let sweeper = self.sweeper.clone();
        let finish = FinishGuard(Arc::clone(&self.sweeper.shared));
        let task_stop = Arc::clone(&stop);
        handle.spawn(async move {
            let _finish = finish;
            sweeper.run_task(task_stop).await;
        });
        *driver = Some(Driver::Task(stop));
        info!(
            interval = ?self.sweeper.config.sweep_interval,
            idle_ttl = ?self.sweeper.config.idle_ttl,
            "idle reaper started on runtime"
        );
    }

    /// Ask the sweep loop to exit without waiting for it. Safe in any state
    /// and any number of times.
    pub fn stop(&self) {
        let driver = self.driver().take();
        let shared = &self.sweeper.shared;
        if shared.transition(ReaperState::Running, ReaperState::Stopping) {
            if let Some(driver) = driver {
                driver.signal();
            }
            debug!("idle reaper stopping");
        } else if shared.transition(ReaperState::Created, ReaperState::Stopped) {
            shared.finish();
        }
    }

    /// Stop and wait up to `timeout` for the sweep loop to terminate.
    /// Returns whether the reaper reached `Stopped` in time.
    pub fn stop_and_wait(&self, timeout: Duration) -> bool {
        self.stop();
        let shared = &self.sweeper.shared;
        let guard = shared.terminated();
        let (guard, _) = shared
            .terminated_cv
            .wait_timeout_while(guard, timeout, |terminated| !*terminated)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }

    /// Run one sweep on the calling thread, whatever the lifecycle state.
    pub fn sweep_now(&self) -> SweepReport {
        self.sweeper.sweep()
    }

    #[must_use]
    pub fn state(&self) -> ReaperState {
        self.sweeper.shared.state()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state() == ReaperState::Running
    }

    #[must_use]
    pub fn config(&self) -> &ReaperConfig {
        &self.sweeper.config
    }

    #[must_use]
    pub fn stats(&self) -> ReaperStats {
        let shared = &self.sweeper.shared;
        ReaperStats {
            sweeps: shared.sweeps.load(Ordering::Relaxed),
            closed: shared.closed.load(Ordering::Relaxed),
            failures: shared.failures.load(Ordering::Relaxed),
        }
    }

    fn driver(&self) -> MutexGuard<'_, Option<Driver>> {
        self.driver.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for IdleReaper {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for IdleReaper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdleReaper")
            .field("state", &self.state())
            .field("config", &self.sweeper.config)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[derive(Default)]
    struct CountingSweep {
        expired: AtomicUsize,
        aged: AtomicUsize,
        fail_every_close: bool,
    }

    impl IdleSweep for CountingSweep {
        fn close_expired(&self, _ttl: Duration) -> CloseReport {
            self.expired.fetch_add(1, Ordering::SeqCst);
            if self.fail_every_close {
                CloseReport { closed: 0, failed: 1 }
            } else {
                CloseReport { closed: 1, failed: 0 }
            }
        }

        fn close_idle_older_than(&self, _max_age: Duration) -> CloseReport {
            self.aged.fetch_add(1, Ordering::SeqCst);
            CloseReport::default()
        }
    }

    struct PanickingSweep;

    impl IdleSweep for PanickingSweep {
        fn close_expired(&self, _ttl: Duration) -> CloseReport {
            panic!("sweep exploded");
        }

        fn close_idle_older_than(&self, _max_age: Duration) -> CloseReport {
            CloseReport::default()
        }
    }

    fn fast_config() -> ReaperConfig {
        ReaperConfig::default().with_sweep_interval(Duration::from_millis(10))
    }

    fn reaper_for(target: &Arc<dyn IdleSweep>) -> IdleReaper {
        IdleReaper::new(Arc::downgrade(target), fast_config())
    }

    #[test]
    fn thread_driver_sweeps_until_stopped() {
        let sweep = Arc::new(CountingSweep::default());
        let target: Arc<dyn IdleSweep> = sweep.clone();
        let reaper = reaper_for(&target);

        reaper.start().unwrap();
        assert_eq!(reaper.state(), ReaperState::Running);
        thread::sleep(Duration::from_millis(80));
        assert!(reaper.stop_and_wait(Duration::from_secs(2)));
        assert_eq!(reaper.state(), ReaperState::Stopped);

        let sweeps = reaper.stats().sweeps;
        assert!(sweeps > 0);
        assert_eq!(sweep.expired.load(Ordering::SeqCst) as u64, sweeps);
        assert_eq!(sweep.aged.load(Ordering::SeqCst) as u64, sweeps);

        thread::sleep(Duration::from_millis(40));
        assert_eq!(reaper.stats().sweeps, sweeps);
    }

    #[test]
    fn stop_before_start_is_terminal() {
        let target: Arc<dyn IdleSweep> = Arc::new(CountingSweep::default());
        let reaper = reaper_for(&target);

        reaper.stop();
        reaper.stop();
        assert_eq!(reaper.state(), ReaperState::Stopped);
        reaper.start().unwrap();
        assert_eq!(reaper.state(), ReaperState::Stopped);
        assert!(reaper.stop_and_wait(Duration::from_millis(10)));
    }

    #[test]
    fn second_start_is_a_no_op() {
        let target: Arc<dyn IdleSweep> = Arc::new(CountingSweep::default());
        let reaper = reaper_for(&target);
        reaper.start().unwrap();
        reaper.start().unwrap();
        assert!(reaper.stop_and_wait(Duration::from_secs(2)));
    }

    #[test]
    fn stop_is_observed_before_the_next_interval() {
        let target: Arc<dyn IdleSweep> = Arc::new(CountingSweep::default());
        let reaper = IdleReaper::new(
            Arc::downgrade(&target),
            ReaperConfig::default().with_sweep_interval(Duration::from_secs(3600)),
        );
        reaper.start().unwrap();
        let started = Instant::now();
        assert!(reaper.stop_and_wait(Duration::from_secs(2)));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(reaper.stats().sweeps, 0);
    }

    #[test]
    fn unbounded_interval_starts_and_stops_on_a_thread() {
        let target: Arc<dyn IdleSweep> = Arc::new(CountingSweep::default());
        let reaper = IdleReaper::new(
            Arc::downgrade(&target),
            ReaperConfig::default().with_sweep_interval(Duration::MAX),
        );
        reaper.start().unwrap();
        assert_eq!(reaper.state(), ReaperState::Running);
        assert!(reaper.stop_and_wait(Duration::from_secs(2)));
        assert_eq!(reaper.stats().sweeps, 0);
    }

    #[tokio::test]
    async fn unbounded_interval_starts_and_stops_on_a_task() {
        let target: Arc<dyn IdleSweep> = Arc::new(CountingSweep::default());
        let reaper = IdleReaper::new(
            Arc::downgrade(&target),
            ReaperConfig::default().with_sweep_interval(Duration::MAX),
        );
        reaper.start_on(&Handle::current());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(reaper.state(), ReaperState::Running);
        reaper.stop();

        let deadline = Instant::now() + Duration::from_secs(2);
        while reaper.state() != ReaperState::Stopped && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(reaper.state(), ReaperState::Stopped);
        assert_eq!(reaper.stats().sweeps, 0);
    }

    #[test]
    fn close_failures_are_counted_not_raised() {
        let sweep = Arc::new(CountingSweep {
            fail_every_close: true,
            ..CountingSweep::default()
        });
        let target: Arc<dyn IdleSweep> = sweep;
        let reaper = reaper_for(&target);

        let report = reaper.sweep_now();
        assert_eq!(report.failures(), 1);
        assert_eq!(report.closed(), 0);
        assert_eq!(reaper.stats(), ReaperStats { sweeps: 1, closed: 0, failures: 1 });
    }

    #[test]
    fn panicking_sweep_does_not_kill_the_loop() {
        let target: Arc<dyn IdleSweep> = Arc::new(PanickingSweep);
        let reaper = reaper_for(&target);

        reaper.start().unwrap();
        thread::sleep(Duration::from_millis(60));
        assert_eq!(reaper.state(), ReaperState::Running);
        assert!(reaper.stop_and_wait(Duration::from_secs(2)));

        let stats = reaper.stats();
        assert!(stats.sweeps >= 2);
        assert_eq!(stats.failures, stats.sweeps);
    }

    #[test]
    fn loop_exits_once_the_pool_is_gone() {
        let target: Arc<dyn IdleSweep> = Arc::new(CountingSweep::default());
        let reaper = reaper_for(&target);
        reaper.start().unwrap();
        drop(target);

        let deadline = Instant::now() + Duration::from_secs(2);
        while reaper.state() != ReaperState::Stopped && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(reaper.state(), ReaperState::Stopped);
        assert_eq!(reaper.sweep_now(), SweepReport::default());
    }

    #[tokio::test]
    async fn task_driver_sweeps_and_stops() {
        let sweep = Arc::new(CountingSweep::default());
        let target: Arc<dyn IdleSweep> = sweep.clone();
        let reaper = reaper_for(&target);

        reaper.start_on(&Handle::current());
        tokio::time::sleep(Duration::from_millis(60)).await;
        reaper.stop();
        reaper.stop();

        let deadline = Instant::now() + Duration::from_secs(2);
        while reaper.state() != ReaperState::Stopped && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(reaper.state(), ReaperState::Stopped);
        assert!(sweep.expired.load(Ordering::SeqCst) > 0);
    }
}
