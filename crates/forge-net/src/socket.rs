use std::ffi::CString;
use std::os::fd::{AsRawFd, RawFd};

use forge_core::error::{Error, Result};
use forge_io::Reader;

/// Mirrors the original's `HM_SOCKET_MAX_TIMEOUT`: a generous ceiling so a
/// misconfigured caller can't accidentally block forever via an unbounded cast.
pub const SOCKET_MAX_TIMEOUT_MS: u64 = 5 * 60 * 1000;

fn unix_error_to_forge(errno: i32) -> Error {
    match errno {
        libc::EACCES | libc::EPERM => Error::AccessDenied,
        libc::ENOENT | libc::ECONNREFUSED => Error::NotFound,
        libc::EPIPE | libc::ECONNRESET | libc::ENOTCONN => Error::Disconnected,
        libc::EINVAL => Error::InvalidArgument,
        libc::EAGAIN => Error::Timeout,
        _ => Error::PlatformDependent,
    }
}

fn last_os_error() -> Error {
    unix_error_to_forge(std::io::Error::last_os_error().raw_os_error().unwrap_or(0))
}

fn set_timeout(fd: RawFd, timeout_ms: u64) -> Result<()> {
    if timeout_ms == 0 {
        return Ok(());
    }
    let timeval = libc::timeval {
        tv_sec: (timeout_ms / 1000) as libc::time_t,
        tv_usec: ((timeout_ms % 1000) * 1000) as libc::suseconds_t,
    };
    unsafe {
        let size = std::mem::size_of::<libc::timeval>() as libc::socklen_t;
        if libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_RCVTIMEO,
            &timeval as *const _ as *const libc::c_void,
            size,
        ) == -1
        {
            return Err(last_os_error());
        }
        if libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_SNDTIMEO,
            &timeval as *const _ as *const libc::c_void,
            size,
        ) == -1
        {
            return Err(last_os_error());
        }
    }
    Ok(())
}

/// A blocking, connection-oriented network socket.
///
/// Construction resolves `(host, port)` via the OS resolver (`getaddrinfo`), connects,
/// and applies `timeout_ms` to both directions (0 disables the timeout). `send` uses
/// `MSG_NOSIGNAL` so a broken pipe surfaces as [`Error::Disconnected`] rather than
/// `SIGPIPE`. `read` returning `Ok(0)` signals the peer closed its end.
pub struct Socket {
    fd: RawFd,
}

impl Socket {
    pub fn connect(host: &str, port: u16, timeout_ms: u64) -> Result<Self> {
        if timeout_ms > SOCKET_MAX_TIMEOUT_MS {
            return Err(Error::InvalidArgument);
        }
        let host_c = CString::new(host).map_err(|_| Error::InvalidArgument)?;
        let port_c = CString::new(port.to_string()).expect("port string has no NUL bytes");

        let mut hints: libc::addrinfo = unsafe { std::mem::zeroed() };
        hints.ai_family = libc::AF_UNSPEC;
        hints.ai_socktype = libc::SOCK_STREAM;
        hints.ai_flags = libc::AI_PASSIVE;

        let mut addrinfo_ptr: *mut libc::addrinfo = std::ptr::null_mut();
        let rc = unsafe {
            libc::getaddrinfo(host_c.as_ptr(), port_c.as_ptr(), &hints, &mut addrinfo_ptr)
        };
        if rc != 0 {
            return Err(if rc == libc::EAI_NONAME || rc == libc::EAI_AGAIN {
                Error::NotFound
            } else {
                Error::PlatformDependent
            });
        }
        let addrinfo = unsafe { &*addrinfo_ptr };
        let fd = unsafe { libc::socket(addrinfo.ai_family, libc::SOCK_STREAM, 0) };
        if fd == -1 {
            unsafe { libc::freeaddrinfo(addrinfo_ptr) };
            return Err(last_os_error());
        }
        let result = set_timeout(fd, timeout_ms).and_then(|()| {
            if unsafe { libc::connect(fd, addrinfo.ai_addr, addrinfo.ai_addrlen) } == -1 {
                Err(last_os_error())
            } else {
                Ok(())
            }
        });
        unsafe { libc::freeaddrinfo(addrinfo_ptr) };
        if let Err(e) = result {
            unsafe { libc::close(fd) };
            return Err(e);
        }
        Ok(Socket { fd })
    }

    /// Wraps an already-connected file descriptor (used by `ServerSocket::accept`).
    pub(crate) fn from_raw_fd(fd: RawFd, timeout_ms: u64) -> Result<Self> {
        set_timeout(fd, timeout_ms)?;
        Ok(Socket { fd })
    }

    pub fn send(&self, buffer: &[u8]) -> Result<usize> {
        let n = unsafe {
            libc::send(self.fd, buffer.as_ptr() as *const libc::c_void, buffer.len(), libc::MSG_NOSIGNAL)
        };
        if n == -1 { Err(last_os_error()) } else { Ok(n as usize) }
    }

    pub fn read(&self, buffer: &mut [u8]) -> Result<usize> {
        let n = unsafe {
            libc::read(self.fd, buffer.as_mut_ptr() as *mut libc::c_void, buffer.len())
        };
        if n == -1 { Err(last_os_error()) } else { Ok(n as usize) }
    }

    /// Adapter exposing this socket through the streaming I/O layer. `seek` is
    /// unsupported (`NotImplemented`), matching a live network stream.
    pub fn as_reader(&self) -> SocketReader<'_> {
        SocketReader { socket: self }
    }
}

impl Drop for Socket {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}

impl AsRawFd for Socket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

pub struct SocketReader<'a> {
    socket: &'a Socket,
}

impl Reader for SocketReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.socket.read(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server_socket::ServerSocket;

    #[test]
    fn connect_send_and_echo_roundtrip() {
        let server = ServerSocket::bind(0, 1000).unwrap();
        let port = server.local_port().unwrap();
        let handle = std::thread::spawn(move || {
            let conn = server.accept().unwrap();
            let mut buf = [0u8; 32];
            let n = conn.read(&mut buf).unwrap();
            conn.send(&buf[..n]).unwrap();
        });
        let client = Socket::connect("127.0.0.1", port, 1000).unwrap();
        client.send(b"ping").unwrap();
        let mut buf = [0u8; 32];
        let n = client.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"ping");
        handle.join().unwrap();
    }

    #[test]
    fn read_returns_zero_on_peer_close() {
        let server = ServerSocket::bind(0, 1000).unwrap();
        let port = server.local_port().unwrap();
        let handle = std::thread::spawn(move || {
            let _conn = server.accept().unwrap();
        });
        let client = Socket::connect("127.0.0.1", port, 1000).unwrap();
        handle.join().unwrap();
        let mut buf = [0u8; 8];
        // peer dropped its accepted Socket already, closing the connection.
        let n = client.read(&mut buf).unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn connect_to_unresolvable_host_is_not_found() {
        let result = Socket::connect("this-host-does-not-resolve.invalid", 80, 100);
        assert_eq!(result.err(), Some(Error::NotFound));
    }

    #[test]
    fn timeout_over_max_is_invalid_argument() {
        let result = Socket::connect("127.0.0.1", 1, SOCKET_MAX_TIMEOUT_MS + 1);
        assert_eq!(result.err(), Some(Error::InvalidArgument));
    }
}
