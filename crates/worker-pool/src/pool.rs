//! Elastic thread pool: `Start`/`Execute`/`Stop` over a bounded FIFO
//! queue, with low/high watermarks and idle-time contraction.
//!
//! Grounded on the original Afina `Concurrency::Executor`
//! (`original_source/include/afina/concurrency/Executor.h` and
//! `src/concurrency/Executor.cpp`), restructured per Design Notes §9
//! bullet 3: the original's `perform()` decrements `_current_workers`
//! in two separate branches of a nested wait loop (the idle-timeout
//! contraction branch and the `kStopping`-drain branch). This
//! implementation computes a worker's fate exactly once per loop
//! iteration (`next_action`) and funnels every exit through the single
//! `on_worker_exit` path, which is the only place `current_workers` is
//! decremented.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::thread;
use std::time::Duration;

use crate::config::PoolConfig;
use crate::task::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Run,
    Stopping,
    Stopped,
}

struct Inner {
    queue: VecDeque<Task>,
    state: State,
    current_workers: usize,
}

struct Shared {
    config: PoolConfig,
    inner: Mutex<Inner>,
    /// Signaled whenever the queue gains a task, or the pool starts
    /// stopping with an empty queue (see §9 open question below).
    not_empty: Condvar,
    /// Signaled when the pool reaches `Stopped`.
    stopped: Condvar,
}

enum Action {
    Run(Task),
    Exit,
}

/// An elastic thread pool bounded by `low_watermark`/`high_watermark`
/// with a bounded task queue (spec §4.3).
///
/// Starts in the `Stopped` state; call [`WorkerPool::start`] to spawn
/// the baseline workers.
pub struct WorkerPool {
    shared: std::sync::Arc<Shared>,
}

impl WorkerPool {
    pub fn new(config: PoolConfig) -> Self {
        let shared = Shared {
            config,
            inner: Mutex::new(Inner {
                queue: VecDeque::new(),
                state: State::Stopped,
                current_workers: 0,
            }),
            not_empty: Condvar::new(),
            stopped: Condvar::new(),
        };
        Self {
            shared: std::sync::Arc::new(shared),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    /// Current worker count, for stats/metrics callers.
    pub fn current_workers(&self) -> usize {
        self.shared.inner.lock().unwrap().current_workers
    }

    /// Valid from any state; idempotent if already `Run`. Spawns
    /// exactly `low_watermark` workers.
    pub fn start(&self) {
        {
            let mut inner = self.shared.inner.lock().unwrap();
            if inner.state == State::Run {
                return;
            }
            inner.state = State::Run;
            inner.current_workers = 0;
        }
        for _ in 0..self.shared.config.low_watermark {
            {
                let mut inner = self.shared.inner.lock().unwrap();
                inner.current_workers += 1;
            }
            spawn_worker(self.shared.clone());
        }
        log::debug!(
            "worker-pool: started with {} workers (low={}, high={})",
            self.shared.config.low_watermark,
            self.shared.config.low_watermark,
            self.shared.config.high_watermark
        );
    }

    /// Submits `task`. Returns `false` (without side effect) if the
    /// pool is not `Run`, or if the queue already holds
    /// `max_queue_size` entries — the admission predicate is the
    /// strict `len() > max_queue_size`, so the queue may briefly hold
    /// `max_queue_size + 1` at peak (spec §9, retained verbatim).
    pub fn execute<F>(&self, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let mut inner = self.shared.inner.lock().unwrap();
        if inner.state != State::Run {
            return false;
        }
        if inner.queue.len() > self.shared.config.max_queue_size {
            return false;
        }
        inner.queue.push_back(Box::new(task));
        self.shared.not_empty.notify_one();
        true
    }

    /// Transitions `Run -> Stopping`. If `await` is true, blocks until
    /// every task submitted before this call has finished executing
    /// and `current_workers == 0`.
    pub fn stop(&self, await_completion: bool) {
        let mut inner = self.shared.inner.lock().unwrap();
        if inner.state == State::Stopped {
            return;
        }
        inner.state = State::Stopping;
        // Open question (spec §9): a worker parked with an empty queue
        // needs to notice `Stopping` without necessarily waiting out a
        // full `idle_time`. We broadcast whenever the queue is observed
        // empty at `Stop` time so every currently-parked worker wakes
        // and re-checks state immediately; workers mid-task notice on
        // their next loop iteration regardless.
        if inner.queue.is_empty() {
            self.shared.not_empty.notify_all();
        }
        if await_completion {
            while inner.state != State::Stopped {
                inner = self.shared.stopped.wait(inner).unwrap();
            }
        }
    }
}

fn spawn_worker(shared: std::sync::Arc<Shared>) {
    thread::Builder::new()
        .name("worker-pool-worker".into())
        .spawn(move || worker_loop(shared))
        .expect("worker-pool: failed to spawn worker thread");
}

fn worker_loop(shared: std::sync::Arc<Shared>) {
    loop {
        match next_action(&shared) {
            Action::Run(task) => {
                task();
                maybe_grow(&shared);
            }
            Action::Exit => {
                on_worker_exit(&shared);
                return;
            }
        }
    }
}

/// Single decision point per iteration: pop a task, decide to exit, or
/// park. Folds the original's nested `while (tasks.empty())` timeout
/// loop into one re-checked `loop`.
fn next_action(shared: &Shared) -> Action {
    let mut inner = shared.inner.lock().unwrap();
    loop {
        if let Some(task) = inner.queue.pop_front() {
            return Action::Run(task);
        }
        if inner.state == State::Stopping {
            return Action::Exit;
        }
        let (guard, timeout) = shared
            .not_empty
            .wait_timeout(inner, shared.config.idle_time)
            .unwrap();
        inner = guard;
        if timeout.timed_out() && inner.queue.is_empty() && inner.state == State::Run {
            if inner.current_workers > shared.config.low_watermark {
                return Action::Exit;
            }
        }
        // Spurious wake, a task arrived, or state changed: loop back
        // and re-evaluate from the top.
    }
}

fn on_worker_exit(shared: &Shared) {
    let mut inner = shared.inner.lock().unwrap();
    inner.current_workers -= 1;
    log::debug!(
        "worker-pool: worker exited, {} remaining",
        inner.current_workers
    );
    if inner.state == State::Stopping && inner.current_workers == 0 {
        inner.state = State::Stopped;
        shared.stopped.notify_all();
    }
}

/// After executing a task: if the queue is still backed up and there's
/// headroom under `high_watermark`, spawn one more worker (spec §4.3
/// step 5).
fn maybe_grow(shared: &std::sync::Arc<Shared>) {
    let should_spawn = {
        let mut inner = shared.inner.lock().unwrap();
        if !inner.queue.is_empty()
            && inner.state == State::Run
            && inner.current_workers < shared.config.high_watermark
        {
            inner.current_workers += 1;
            true
        } else {
            false
        }
    };
    if should_spawn {
        log::debug!("worker-pool: growing under sustained load");
        spawn_worker(shared.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration as StdDuration;

    fn cfg(low: usize, high: usize, queue: usize, idle_ms: u64) -> PoolConfig {
        PoolConfig::new(low, high, queue, StdDuration::from_millis(idle_ms))
    }

    #[test]
    fn start_spawns_exactly_low_watermark_workers() {
        let pool = WorkerPool::new(cfg(3, 6, 10, 50));
        pool.start();
        // Give threads a moment to register themselves as spawned;
        // current_workers is incremented before the thread body runs,
        // so this is deterministic without a sleep.
        assert_eq!(pool.current_workers(), 3);
        pool.stop(true);
    }

    #[test]
    fn execute_before_start_returns_false() {
        let pool = WorkerPool::new(cfg(1, 2, 4, 50));
        assert!(!pool.execute(|| {}));
    }

    #[test]
    fn execute_after_stopping_returns_false() {
        let pool = WorkerPool::new(cfg(1, 2, 4, 50));
        pool.start();
        pool.stop(false);
        // Stop(false) returns immediately; state is already Stopping.
        assert!(!pool.execute(|| {}));
        pool.stop(true);
    }

    #[test]
    fn stop_await_drains_all_submitted_work() {
        let pool = Arc::new(WorkerPool::new(cfg(2, 4, 8, 50)));
        pool.start();
        let completed = Arc::new(AtomicUsize::new(0));
        for _ in 0..5 {
            let completed = completed.clone();
            assert!(pool.execute(move || {
                thread::sleep(StdDuration::from_millis(20));
                completed.fetch_add(1, Ordering::SeqCst);
            }));
        }
        pool.stop(true);
        assert_eq!(completed.load(Ordering::SeqCst), 5);
        assert_eq!(pool.current_workers(), 0);
    }

    #[test]
    fn pool_contracts_to_low_watermark_when_idle() {
        let pool = Arc::new(WorkerPool::new(cfg(1, 4, 8, 30)));
        pool.start();
        let barrier_count = Arc::new(AtomicUsize::new(0));
        for _ in 0..4 {
            let c = barrier_count.clone();
            pool.execute(move || {
                thread::sleep(StdDuration::from_millis(10));
                c.fetch_add(1, Ordering::SeqCst);
            });
        }
        // Wait for tasks to finish and workers to notice sustained
        // idleness (several multiples of idle_time).
        thread::sleep(StdDuration::from_millis(300));
        assert_eq!(barrier_count.load(Ordering::SeqCst), 4);
        assert_eq!(pool.current_workers(), 1);
        pool.stop(true);
    }

    #[test]
    fn queue_admits_strictly_more_than_max_queue_size() {
        // low=1 high=1 so nothing is ever popped; queue bound is easy
        // to observe precisely. max_queue_size=2 admits up to 2 queued
        // plus whatever a worker has already dequeued.
        let pool = WorkerPool::new(PoolConfig::new(1, 2, 2, StdDuration::from_secs(10)));
        // Don't start the pool — no worker will drain the queue, so we
        // can probe the admission predicate deterministically. Execute
        // on a non-Run pool returns false regardless, so instead start
        // then immediately saturate with slow tasks.
        pool.start();
        let (tx, rx) = std::sync::mpsc::channel::<()>();
        let rx = Arc::new(Mutex::new(rx));
        // Occupy the sole worker with a task that blocks until we say so.
        let rx_clone = rx.clone();
        assert!(pool.execute(move || {
            let _ = rx_clone.lock().unwrap().recv();
        }));
        thread::sleep(StdDuration::from_millis(20));
        // Now queue up to max_queue_size + 1 more (the strict-inequality
        // soft cap) and expect the next one to be rejected.
        assert!(pool.execute(|| {}));
        assert!(pool.execute(|| {}));
        assert!(pool.execute(|| {}));
        assert!(!pool.execute(|| {}));
        tx.send(()).unwrap();
        pool.stop(true);
    }
}
