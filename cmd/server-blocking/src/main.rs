//! Thread-per-connection blocking memtext-cache server.
//!
//! Grounded on `Afina::Network::MTblocking::ServerImpl`
//! (`original_source/src/network/mt_blocking/ServerImpl.h`): an
//! acceptor thread that blocks in `accept()` and spawns one OS thread
//! per connection, each running a blocking read/execute/write cycle
//! against the shared [`connection::Connection`] state machine until
//! the peer closes or errors.

use std::net::TcpStream;
use std::sync::Arc;
use std::thread;

use cache_core::env::env_get;
use cache_core::{LockingCache, Storage};
use connection::{bind_listener, set_nodelay, Connection};

struct Config {
    port: u16,
    cache_max_size: usize,
}

impl Config {
    fn from_env() -> Self {
        Self {
            port: env_get("SERVER_PORT", 11211u16),
            cache_max_size: env_get("CACHE_MAX_SIZE", 64 * 1024 * 1024),
        }
    }
}

fn handle_connection(stream: TcpStream, storage: Arc<dyn Storage + Send + Sync>) {
    set_nodelay(&stream);
    let peer = stream.peer_addr().ok();
    let mut conn = Connection::new(stream, storage);
    log::debug!("server-blocking: accepted {peer:?}");
    while conn.is_alive() {
        if conn.do_read_blocking().is_err() {
            break;
        }
        if conn.interest().wants_write() && conn.do_write_blocking().is_err() {
            break;
        }
    }
    log::debug!("server-blocking: closed {peer:?}");
}

fn main() -> std::io::Result<()> {
    env_logger::init();
    let config = Config::from_env();
    let storage: Arc<dyn Storage + Send + Sync> = Arc::new(LockingCache::new(config.cache_max_size));

    let listener = bind_listener(config.port)?;
    log::info!(
        "server-blocking: listening on 0.0.0.0:{} (cache_max_size={})",
        config.port,
        config.cache_max_size
    );

    for incoming in listener.incoming() {
        match incoming {
            Ok(stream) => {
                let storage = storage.clone();
                thread::spawn(move || handle_connection(stream, storage));
            }
            Err(e) => log::warn!("server-blocking: accept failed: {e}"),
        }
    }
    Ok(())
}
