//! Acceptor glue: socket creation with the option set the spec's
//! acceptor needs, shared by all three server binaries.
//!
//! Grounded directly on `ksvc_gvthread::net::GvtListener::bind_socket`
//! (raw `socket`/`setsockopt`/`bind`/`listen`), minus `SO_REUSEPORT` —
//! a single-process server binding one port doesn't need it, unlike
//! the teacher's multi-process io_uring workers.

use std::io;
use std::net::TcpListener;
use std::os::unix::io::FromRawFd;

/// Binds a `TcpListener` on `port` with `SO_REUSEADDR` and
/// `TCP_NODELAY`-by-default-on-accept semantics matching spec §4.6.
/// Built via raw `libc` calls rather than `std::net::TcpListener::bind`
/// because `std` has no portable way to set `SO_REUSEADDR` before
/// `bind()`.
pub fn bind_listener(port: u16) -> io::Result<TcpListener> {
    unsafe {
        let fd = libc::socket(libc::AF_INET, libc::SOCK_STREAM | libc::SOCK_CLOEXEC, 0);
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }

        let opt: i32 = 1;
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_REUSEADDR,
            &opt as *const _ as *const libc::c_void,
            std::mem::size_of::<i32>() as u32,
        );

        let mut addr: libc::sockaddr_in = std::mem::zeroed();
        addr.sin_family = libc::AF_INET as u16;
        addr.sin_addr.s_addr = 0; // INADDR_ANY
        addr.sin_port = port.to_be();

        let ret = libc::bind(
            fd,
            &addr as *const _ as *const libc::sockaddr,
            std::mem::size_of_val(&addr) as u32,
        );
        if ret != 0 {
            let err = io::Error::last_os_error();
            libc::close(fd);
            return Err(err);
        }

        if libc::listen(fd, 1024) != 0 {
            let err = io::Error::last_os_error();
            libc::close(fd);
            return Err(err);
        }

        Ok(TcpListener::from_raw_fd(fd))
    }
}

/// Sets `TCP_NODELAY` on an accepted stream — interactive line-protocol
/// traffic benefits from disabling Nagle's algorithm, same as
/// `GvtListener::accept`.
pub fn set_nodelay(stream: &std::net::TcpStream) {
    let _ = stream.set_nodelay(true);
}
