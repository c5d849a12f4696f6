//! # connection
//!
//! The per-connection streaming protocol parser + command executor
//! that drives event-loop interest masks — the third of the three core
//! subsystems this workspace implements (see `SPEC_FULL.md`).

pub mod connection;
pub mod interest;
pub mod listener;
pub mod reactor;
pub mod socket;

pub use connection::Connection;
pub use interest::{Interest, READABLE, WRITABLE};
pub use listener::{bind_listener, set_nodelay};
pub use reactor::EventLoop;
pub use socket::Socket;
