//! Idle reaper lifecycle against a live pool

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use transit_client::{
    CloseHandle, ConnectionPool, IdleReaper, PoolSettings, Poolable, ReaperConfig, ReaperState,
    Route,
};

struct Conn(Arc<AtomicUsize>);

impl Poolable for Conn {
    fn is_open(&self) -> bool {
        true
    }

    fn close(self) -> io::Result<()> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close_handle(&self) -> CloseHandle {
        let closed = Arc::clone(&self.0);
        CloseHandle::new(move || {
            closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

fn pool() -> Arc<ConnectionPool<Conn>> {
    Arc::new(ConnectionPool::new(PoolSettings::new(
        8,
        4,
        Duration::from_millis(100),
    )))
}

fn park_idle(pool: &Arc<ConnectionPool<Conn>>, closed: &Arc<AtomicUsize>, count: usize) {
    let route = Route::http("idle.test", 80);
    let leases: Vec<_> = (0..count)
        .map(|_| {
            pool.acquire(&route, |_| Ok(Conn(Arc::clone(closed))))
                .expect("lease")
        })
        .collect();
    for lease in leases {
        lease.release();
    }
}

fn wait_until(deadline: Duration, mut done: impl FnMut() -> bool) -> bool {
    let until = Instant::now() + deadline;
    while Instant::now() < until {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    done()
}

#[test]
fn start_then_immediate_stop_leaves_pool_closable() {
    for _ in 0..20 {
        let pool = pool();
        let closed = Arc::new(AtomicUsize::new(0));
        park_idle(&pool, &closed, 2);

        let reaper = IdleReaper::for_pool(&pool, ReaperConfig::default());
        reaper.start().expect("start");
        reaper.stop();
        assert!(reaper.stop_and_wait(Duration::from_secs(2)));
        assert_eq!(reaper.state(), ReaperState::Stopped);

        pool.close_all();
        assert_eq!(closed.load(Ordering::SeqCst), 2);
    }
}

#[test]
fn stop_is_idempotent_in_every_state() {
    let pool = pool();
    let reaper = IdleReaper::for_pool(&pool, ReaperConfig::default());

    reaper.stop();
    reaper.stop();
    assert_eq!(reaper.state(), ReaperState::Stopped);

    // Once stopped, starting is a no-op
    reaper.start().expect("start after stop");
    assert_eq!(reaper.state(), ReaperState::Stopped);
    assert!(reaper.stop_and_wait(Duration::from_millis(10)));
}

#[test]
fn concurrent_stops_all_return() {
    let pool = pool();
    let reaper = Arc::new(IdleReaper::for_pool(&pool, ReaperConfig::default()));
    reaper.start().expect("start");

    let stoppers: Vec<_> = (0..4)
        .map(|_| {
            let reaper = Arc::clone(&reaper);
            thread::spawn(move || reaper.stop_and_wait(Duration::from_secs(2)))
        })
        .collect();
    for stopper in stoppers {
        assert!(stopper.join().expect("stopper panicked"));
    }
    assert_eq!(reaper.state(), ReaperState::Stopped);
}

#[test]
fn background_sweeps_close_idle_connections() {
    let pool = pool();
    let closed = Arc::new(AtomicUsize::new(0));
    let config = ReaperConfig::default()
        .with_sweep_interval(Duration::from_millis(20))
        .with_idle_ttl(Duration::from_millis(30))
        .with_max_connection_age(None);
    let reaper = IdleReaper::for_pool(&pool, config);
    reaper.start().expect("start");

    park_idle(&pool, &closed, 3);
    assert!(wait_until(Duration::from_secs(2), || pool.stats().idle == 0));
    assert_eq!(closed.load(Ordering::SeqCst), 3);
    assert!(reaper.stats().closed >= 3);
    assert!(reaper.stats().sweeps >= 1);

    assert!(reaper.stop_and_wait(Duration::from_secs(2)));
}

#[test]
fn max_age_closes_connections_that_are_still_fresh_idle() {
    let pool = pool();
    let closed = Arc::new(AtomicUsize::new(0));
    let config = ReaperConfig::default()
        .with_sweep_interval(Duration::from_secs(60))
        .with_idle_ttl(Duration::from_secs(60))
        .with_max_connection_age(Some(Duration::from_millis(10)));
    let reaper = IdleReaper::for_pool(&pool, config);

    park_idle(&pool, &closed, 2);
    thread::sleep(Duration::from_millis(30));

    let report = reaper.sweep_now();
    assert_eq!(report.expired.closed, 0);
    assert_eq!(report.aged.closed, 2);
    assert_eq!(report.closed(), 2);
    assert_eq!(pool.stats().idle, 0);
}

#[test]
fn reaper_stops_by_itself_once_the_pool_is_gone() {
    let pool = pool();
    let config = ReaperConfig::default().with_sweep_interval(Duration::from_millis(10));
    let reaper = IdleReaper::for_pool(&pool, config);
    reaper.start().expect("start");
    drop(pool);

    assert!(wait_until(Duration::from_secs(2), || {
        reaper.state() == ReaperState::Stopped
    }));
}
