//! # memtext-protocol
//!
//! The incremental memcached-text-protocol driver: a header scanner,
//! header-line builder, and the command vocabulary that executes
//! against `cache_core::Storage` (spec §4.4).

pub mod command;
pub mod error;
pub mod parser;

pub use command::Command;
pub use error::{ProtocolError, Result};
pub use parser::Parser;
