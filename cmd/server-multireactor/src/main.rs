//! Multi-reactor non-blocking memtext-cache server, backed by the
//! worker pool.
//!
//! The acceptor (this thread) blocks in `accept()` and round-robins
//! each connection onto one of `low_watermark` long-running "reactor
//! worker" closures submitted to [`worker_pool::WorkerPool`] — each
//! closure owns one [`connection::EventLoop`] for its lifetime, so a
//! connection is pinned to whichever reactor it lands on, matching
//! spec §5 ("a given connection is pinned to one reactor for its
//! lifetime"). This is a deliberate reading of spec §2's "backed by a
//! worker pool": rather than treating the pool as a generic short-task
//! executor, each of its workers *is* one reactor for the server's
//! lifetime (see DESIGN.md). Expensive storage calls inside each
//! reactor's connections are synchronous against the one shared
//! [`cache_core::LockingCache`], per spec §2.

use std::net::TcpStream;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use cache_core::env::env_get;
use cache_core::{LockingCache, Storage};
use connection::{bind_listener, set_nodelay, EventLoop};
use worker_pool::{PoolConfig, WorkerPool};

struct Config {
    port: u16,
    cache_max_size: usize,
    pool: PoolConfig,
    poll_timeout: Duration,
}

impl Config {
    fn from_env() -> Self {
        Self {
            port: env_get("SERVER_PORT", 11211u16),
            cache_max_size: env_get("CACHE_MAX_SIZE", 64 * 1024 * 1024),
            pool: PoolConfig::from_env(),
            poll_timeout: Duration::from_millis(env_get("SERVER_POLL_TIMEOUT_MS", 50u64)),
        }
    }
}

/// Body of one reactor-worker task: owns an `epoll` instance and the
/// connections the acceptor has assigned it, forever.
fn reactor_worker(rx: mpsc::Receiver<TcpStream>, storage: Arc<dyn Storage + Send + Sync>, poll_timeout_ms: i32) {
    let mut event_loop = match EventLoop::new() {
        Ok(ev) => ev,
        Err(e) => {
            log::error!("server-multireactor: reactor worker failed to start: {e}");
            return;
        }
    };
    loop {
        while let Ok(stream) = rx.try_recv() {
            if let Err(e) = event_loop.register(stream, storage.clone()) {
                log::warn!("server-multireactor: failed to register connection: {e}");
            }
        }
        if let Err(e) = event_loop.run_once(poll_timeout_ms) {
            log::warn!("server-multireactor: reactor tick failed: {e}");
        }
    }
}

fn main() -> std::io::Result<()> {
    env_logger::init();
    let config = Config::from_env();
    let storage: Arc<dyn Storage + Send + Sync> = Arc::new(LockingCache::new(config.cache_max_size));

    let listener = bind_listener(config.port)?;
    log::info!(
        "server-multireactor: listening on 0.0.0.0:{} (cache_max_size={}, reactors={})",
        config.port,
        config.cache_max_size,
        config.pool.low_watermark
    );

    let pool = WorkerPool::new(config.pool);
    pool.start();

    let poll_timeout_ms = config.poll_timeout.as_millis() as i32;
    let mut senders = Vec::with_capacity(config.pool.low_watermark);
    for i in 0..config.pool.low_watermark {
        let (tx, rx) = mpsc::channel::<TcpStream>();
        let storage = storage.clone();
        if !pool.execute(move || reactor_worker(rx, storage, poll_timeout_ms)) {
            panic!("server-multireactor: failed to submit reactor worker {i} — pool not running");
        }
        senders.push(tx);
    }

    let mut next = 0usize;
    for incoming in listener.incoming() {
        match incoming {
            Ok(stream) => {
                stream.set_nonblocking(true)?;
                set_nodelay(&stream);
                let idx = next % senders.len();
                next = next.wrapping_add(1);
                if senders[idx].send(stream).is_err() {
                    log::warn!("server-multireactor: reactor worker {idx} is gone, dropping connection");
                }
            }
            Err(e) => log::warn!("server-multireactor: accept failed: {e}"),
        }
    }
    Ok(())
}
