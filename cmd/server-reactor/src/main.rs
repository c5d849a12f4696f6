//! Single-reactor non-blocking memtext-cache server.
//!
//! Grounded on `Afina::Network::STnonblock::Connection`
//! (`original_source/src/network/st_nonblocking/Connection.h`): one
//! `epoll` loop, on one thread, multiplexing every connection plus a
//! non-blocking accept poll. `connection::EventLoop` is the reusable
//! half of this (spec §4.6 calls the acceptor "thin"); this binary is
//! just the wiring: bind, poll-accept, hand off, run the loop.

use std::sync::Arc;
use std::time::Duration;

use cache_core::env::env_get;
use cache_core::{LockingCache, Storage};
use connection::{bind_listener, set_nodelay, EventLoop};

struct Config {
    port: u16,
    cache_max_size: usize,
    /// Upper bound on how long a reactor tick blocks in `epoll_wait`
    /// before re-checking the listener for a pending accept.
    poll_timeout: Duration,
}

impl Config {
    fn from_env() -> Self {
        Self {
            port: env_get("SERVER_PORT", 11211u16),
            cache_max_size: env_get("CACHE_MAX_SIZE", 64 * 1024 * 1024),
            poll_timeout: Duration::from_millis(env_get("SERVER_POLL_TIMEOUT_MS", 50u64)),
        }
    }
}

fn main() -> std::io::Result<()> {
    env_logger::init();
    let config = Config::from_env();
    let storage: Arc<dyn Storage + Send + Sync> = Arc::new(LockingCache::new(config.cache_max_size));

    let listener = bind_listener(config.port)?;
    listener.set_nonblocking(true)?;
    log::info!(
        "server-reactor: listening on 0.0.0.0:{} (cache_max_size={})",
        config.port,
        config.cache_max_size
    );

    let mut event_loop = EventLoop::new()?;
    let timeout_ms = config.poll_timeout.as_millis() as i32;

    loop {
        match listener.accept() {
            Ok((stream, peer)) => {
                stream.set_nonblocking(true)?;
                set_nodelay(&stream);
                log::debug!("server-reactor: accepted {peer}");
                if let Err(e) = event_loop.register(stream, storage.clone()) {
                    log::warn!("server-reactor: failed to register connection: {e}");
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(e) => log::warn!("server-reactor: accept failed: {e}"),
        }
        event_loop.run_once(timeout_ms)?;
    }
}
