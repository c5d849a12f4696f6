//! The connection state machine (spec §4.5).
//!
//! Grounded on `Afina::Network::MTnonblock::Connection`
//! (`original_source/src/network/mt_nonblocking/Connection.{h,cpp}`):
//! same fields (read buffer, parser, in-flight command + argument
//! accumulator, pending replies, liveness flag, interest mask), same
//! `DoRead`/`DoWrite` event handlers. Two behavioral differences from
//! the original, both deliberate:
//!
//! - The read accumulator here is a growing `Vec<u8>` drained with
//!   [`Vec::drain`] instead of a fixed `char[4096]` shifted with
//!   `memmove`; the original's approach relies on no single command
//!   header plus argument ever exceeding 4 KiB, which this
//!   implementation doesn't need to assume.
//! - I/O readiness is generic over [`crate::Socket`] rather than tied
//!   to `epoll`+`read`/`writev` directly, so the same state machine
//!   drives both the non-blocking reactor path (`do_read`/`do_write`,
//!   looping until the socket would block) and the blocking
//!   thread-per-connection path (`do_read_blocking`/`do_write_blocking`,
//!   one syscall per call) — the reactor owns readiness, the
//!   connection owns protocol progress, exactly as spec §4.5 describes,
//!   regardless of which server variant drives it.

use std::collections::VecDeque;
use std::io::{self, IoSlice, Read, Write};
use std::sync::Arc;

use cache_core::Storage;
use memtext_protocol::{Command, Parser};

use crate::interest::{Interest, READABLE, WRITABLE};
use crate::socket::Socket;

/// Bytes read per `read()` call. Matches the original's
/// `client_buffer[4096]`.
const READ_CHUNK_SIZE: usize = 4096;

struct InFlight {
    command: Command,
    /// Remaining bytes to read for the bulk argument, including the
    /// trailing `+2` CRLF framing (spec §4.4/§4.5).
    arg_remains: usize,
    argument: Vec<u8>,
}

/// One client connection: owns its socket, read buffer, parser
/// progress, pending replies, liveness, and interest mask.
pub struct Connection<S: Socket> {
    socket: S,
    storage: Arc<dyn Storage + Send + Sync>,
    buf: Vec<u8>,
    parser: Parser,
    in_flight: Option<InFlight>,
    pending_replies: VecDeque<Vec<u8>>,
    alive: bool,
    closed: bool,
    interest: Interest,
}

impl<S: Socket> Connection<S> {
    pub fn new(socket: S, storage: Arc<dyn Storage + Send + Sync>) -> Self {
        Self {
            socket,
            storage,
            buf: Vec::with_capacity(READ_CHUNK_SIZE),
            parser: Parser::new(),
            in_flight: None,
            pending_replies: VecDeque::new(),
            alive: true,
            closed: false,
            interest: Interest::initial(),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn interest(&self) -> Interest {
        self.interest
    }

    /// Access to the underlying socket, e.g. for registering with a
    /// reactor by raw fd.
    pub fn socket(&self) -> &S {
        &self.socket
    }

    // ── Non-blocking reactor path ───────────────────────────────────

    /// Repeatedly reads until the socket would block, hits EOF, or
    /// errors — spec §4.5 `DoRead`.
    pub fn do_read(&mut self) -> io::Result<()> {
        if !self.alive {
            return Ok(());
        }
        loop {
            match self.read_once() {
                Ok(0) => {
                    self.on_peer_close();
                    return Ok(());
                }
                Ok(_) => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.on_error();
                    return Err(e);
                }
            }
        }
        if self.interest.is_idle() {
            self.transition_closed();
        }
        Ok(())
    }

    /// Issues one vectored write from the pending-replies list,
    /// draining fully-written entries and trimming a partially-written
    /// leading entry in place — spec §4.5 `DoWrite`.
    pub fn do_write(&mut self) -> io::Result<()> {
        if !self.alive {
            return Ok(());
        }
        loop {
            if self.pending_replies.is_empty() {
                break;
            }
            let slices: Vec<IoSlice> = self.pending_replies.iter().map(|r| IoSlice::new(r)).collect();
            match self.socket.write_vectored(&slices) {
                Ok(0) => {
                    self.on_error();
                    return Ok(());
                }
                Ok(mut written) => self.drain_written(&mut written),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.on_error();
                    return Err(e);
                }
            }
        }
        if self.pending_replies.is_empty() {
            self.interest.clear(WRITABLE);
        }
        if self.interest.is_idle() {
            self.transition_closed();
        }
        Ok(())
    }

    // ── Blocking thread-per-connection path ─────────────────────────

    /// One blocking `read()` + protocol-progress cycle.
    pub fn do_read_blocking(&mut self) -> io::Result<()> {
        if !self.alive {
            return Ok(());
        }
        match self.read_once() {
            Ok(0) => self.on_peer_close(),
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                self.on_error();
                return Err(e);
            }
        }
        Ok(())
    }

    /// Flushes the entire pending-replies list with blocking
    /// `write_all` calls, in order.
    pub fn do_write_blocking(&mut self) -> io::Result<()> {
        if !self.alive {
            return Ok(());
        }
        while let Some(front) = self.pending_replies.pop_front() {
            if let Err(e) = self.socket.write_all(&front) {
                self.on_error();
                return Err(e);
            }
        }
        self.interest.clear(WRITABLE);
        if self.interest.is_idle() {
            self.transition_closed();
        }
        Ok(())
    }

    // ── Error / hang-up events ──────────────────────────────────────

    pub fn on_error(&mut self) {
        log::warn!("connection: I/O error, closing");
        self.alive = false;
        self.close();
    }

    pub fn on_hangup(&mut self) {
        log::debug!("connection: peer hung up");
        self.alive = false;
        self.close();
    }

    // ── Internals ────────────────────────────────────────────────────

    fn on_peer_close(&mut self) {
        self.process_buffer();
        log::debug!("connection: peer closed");
        self.alive = false;
        self.close();
    }

    fn transition_closed(&mut self) {
        log::debug!("connection: idle interest mask, closing");
        self.alive = false;
        self.close();
    }

    /// Closes the socket exactly once over the connection's lifetime
    /// (spec §4.5/§8: "a socket is close()'d exactly once").
    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let _ = self.socket.shutdown();
    }

    fn read_once(&mut self) -> io::Result<usize> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let n = self.socket.read(&mut chunk)?;
        if n > 0 {
            self.buf.extend_from_slice(&chunk[..n]);
            self.process_buffer();
        }
        Ok(n)
    }

    fn drain_written(&mut self, written: &mut usize) {
        while *written > 0 {
            let Some(front_len) = self.pending_replies.front().map(Vec::len) else {
                break;
            };
            if *written >= front_len {
                self.pending_replies.pop_front();
                *written -= front_len;
            } else {
                let front = self.pending_replies.front_mut().unwrap();
                front.drain(..*written);
                *written = 0;
            }
        }
    }

    /// Drives the parser over `self.buf` until it can't make further
    /// progress without more bytes, queuing a reply each time a
    /// command completes (spec §4.5 `DoRead` inner loop).
    fn process_buffer(&mut self) {
        loop {
            if self.in_flight.is_none() {
                let consumed = self.parser.parse(&self.buf);
                if consumed == 0 {
                    break;
                }
                let header = self.buf[..consumed - 2].to_vec();
                self.buf.drain(..consumed);
                match self.parser.build(&header) {
                    Ok(command) => {
                        let bytes = command.arg_bytes();
                        let arg_remains = if bytes > 0 { bytes + 2 } else { 0 };
                        self.in_flight = Some(InFlight {
                            command,
                            arg_remains,
                            argument: Vec::new(),
                        });
                    }
                    Err(e) => {
                        log::debug!("connection: protocol error: {e}");
                        self.queue_reply(b"ERROR");
                        self.parser.reset();
                        continue;
                    }
                }
            }

            let flight = self.in_flight.as_mut().expect("checked above");
            if flight.arg_remains > 0 {
                let take = flight.arg_remains.min(self.buf.len());
                if take == 0 {
                    break;
                }
                flight.argument.extend_from_slice(&self.buf[..take]);
                self.buf.drain(..take);
                flight.arg_remains -= take;
                if flight.arg_remains > 0 {
                    break;
                }
            }

            let InFlight { command, mut argument, .. } = self.in_flight.take().expect("checked above");
            if argument.len() >= 2 {
                let trimmed = argument.len() - 2;
                argument.truncate(trimmed);
            }
            let reply = command.execute(self.storage.as_ref(), &argument);
            self.queue_reply(&reply);
            self.parser.reset();
        }
    }

    fn queue_reply(&mut self, body: &[u8]) {
        let mut reply = Vec::with_capacity(body.len() + 2);
        reply.extend_from_slice(body);
        reply.extend_from_slice(b"\r\n");
        self.pending_replies.push_back(reply);
        self.interest.set(WRITABLE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socket::mock::MockSocket;
    use cache_core::LockingCache;

    fn conn(inbound: &[u8]) -> Connection<MockSocket> {
        let storage: Arc<dyn Storage + Send + Sync> = Arc::new(LockingCache::new(1024));
        Connection::new(MockSocket::with_inbound(inbound), storage)
    }

    #[test]
    fn scenario_5_set_produces_stored_and_stores_value() {
        // spec §8 concrete scenario 5, the real-memcached `key flags
        // exptime bytes` grammar.
        let mut c = conn(b"set foo 0 0 3\r\nbar\r\n");
        c.do_read().unwrap();
        assert_eq!(c.pending_replies.len(), 1);
        assert_eq!(c.pending_replies[0], b"STORED\r\n");

        let mut out = Vec::new();
        assert!(c.storage.get("foo", &mut out));
        assert_eq!(out, b"bar");
    }

    #[test]
    fn scenario_5_literal_bare_key_bytes_grammar_also_stores() {
        // spec.md §8 concrete scenario 5's literal byte string —
        // `set foo 3\r\nbar\r\n`, with no `flags`/`exptime` fields.
        let mut c = conn(b"set foo 3\r\nbar\r\n");
        c.do_read().unwrap();
        assert_eq!(c.pending_replies.len(), 1);
        assert_eq!(c.pending_replies[0], b"STORED\r\n");

        let mut out = Vec::new();
        assert!(c.storage.get("foo", &mut out));
        assert_eq!(out, b"bar");
    }

    #[test]
    fn get_roundtrips_through_set() {
        let mut c = conn(b"set k 0 0 1\r\nv\r\nget k\r\n");
        c.do_read().unwrap();
        assert_eq!(c.pending_replies.len(), 2);
        assert_eq!(c.pending_replies[0], b"STORED\r\n");
        assert_eq!(c.pending_replies[1], b"VALUE k 0 1\r\nv\r\nEND\r\n");
    }

    #[test]
    fn partial_header_waits_for_more_bytes() {
        let mut c = conn(b"get fo");
        c.do_read().unwrap();
        assert!(c.pending_replies.is_empty());
        assert!(c.is_alive());
        c.socket.push_inbound(b"o\r\n");
        c.do_read().unwrap();
        assert_eq!(c.pending_replies.len(), 1);
        assert_eq!(c.pending_replies[0], b"END\r\n");
    }

    #[test]
    fn partial_argument_waits_for_more_bytes() {
        let mut c = conn(b"set k 0 0 5\r\nhel");
        c.do_read().unwrap();
        assert!(c.pending_replies.is_empty());
        c.socket.push_inbound(b"lo\r\n");
        c.do_read().unwrap();
        assert_eq!(c.pending_replies[0], b"STORED\r\n");
        let mut out = Vec::new();
        c.storage.get("k", &mut out);
        assert_eq!(out, b"hello");
    }

    #[test]
    fn malformed_header_yields_error_reply_and_stays_alive() {
        let mut c = conn(b"bogus\r\nget k\r\n");
        c.do_read().unwrap();
        assert!(c.is_alive());
        assert_eq!(c.pending_replies.len(), 2);
        assert_eq!(c.pending_replies[0], b"ERROR\r\n");
        assert_eq!(c.pending_replies[1], b"END\r\n");
    }

    #[test]
    fn replies_are_emitted_in_request_order() {
        let mut c = conn(b"set a 0 0 1\r\nx\r\nset b 0 0 1\r\ny\r\ndelete a\r\n");
        c.do_read().unwrap();
        let replies: Vec<_> = c.pending_replies.iter().cloned().collect();
        assert_eq!(
            replies,
            vec![
                b"STORED\r\n".to_vec(),
                b"STORED\r\n".to_vec(),
                b"DELETED\r\n".to_vec(),
            ]
        );
    }

    #[test]
    fn peer_close_with_no_pending_work_transitions_closed() {
        let storage: Arc<dyn Storage + Send + Sync> = Arc::new(LockingCache::new(1024));
        let mut c = Connection::new(MockSocket::with_inbound_then_eof(b""), storage);
        c.do_read().unwrap();
        assert!(!c.is_alive());
        assert_eq!(c.socket.shutdown_count.get(), 1);
    }

    #[test]
    fn do_write_drains_pending_replies_and_clears_writable() {
        let mut c = conn(b"get k\r\n");
        c.do_read().unwrap();
        assert!(c.interest().wants_write());
        c.do_write().unwrap();
        assert!(!c.interest().wants_write());
        assert_eq!(c.socket.outbound, b"END\r\n");
    }

    #[test]
    fn socket_is_closed_exactly_once() {
        let storage: Arc<dyn Storage + Send + Sync> = Arc::new(LockingCache::new(1024));
        let mut c = Connection::new(MockSocket::with_inbound_then_eof(b""), storage);
        c.do_read().unwrap(); // peer close already closes the socket once
        c.on_error(); // must be a no-op on the counter
        assert_eq!(c.socket.shutdown_count.get(), 1);
    }

    #[test]
    fn blocking_path_reads_and_writes_one_cycle_at_a_time() {
        let storage: Arc<dyn Storage + Send + Sync> = Arc::new(LockingCache::new(1024));
        let mut c = Connection::new(MockSocket::with_inbound(b"get k\r\n"), storage);
        c.do_read_blocking().unwrap();
        assert_eq!(c.pending_replies.len(), 1);
        c.do_write_blocking().unwrap();
        assert_eq!(c.socket.outbound, b"END\r\n");
        assert!(c.pending_replies.is_empty());
    }
}
