use std::os::fd::{AsRawFd, RawFd};
use std::sync::OnceLock;

use forge_core::error::{Error, Result};

use crate::socket::{Socket, SOCKET_MAX_TIMEOUT_MS};

fn unix_error_to_forge(errno: i32) -> Error {
    match errno {
        libc::EACCES | libc::EPERM => Error::AccessDenied,
        libc::EADDRINUSE => Error::InvalidState,
        libc::EAGAIN => Error::Timeout,
        libc::EINVAL => Error::InvalidArgument,
        _ => Error::PlatformDependent,
    }
}

fn last_os_error() -> Error {
    unix_error_to_forge(std::io::Error::last_os_error().raw_os_error().unwrap_or(0))
}

/// Cached per process: the kernel's connection backlog is vanishingly unlikely to
/// change at runtime, so it's read from `/proc/sys/net/core/somaxconn` once.
static CACHED_BACKLOG: OnceLock<i32> = OnceLock::new();

fn max_connection_backlog() -> i32 {
    *CACHED_BACKLOG.get_or_init(|| {
        std::fs::read_to_string("/proc/sys/net/core/somaxconn")
            .ok()
            .and_then(|s| s.trim().parse::<i32>().ok())
            .filter(|&v| v > 0)
            .unwrap_or(libc::SOMAXCONN)
    })
}

/// A listening socket. Construction binds `AF_INET` with `SO_REUSEADDR | SO_REUSEPORT`
/// and applies `timeout_ms` to `accept` (via `SO_RCVTIMEO`, which affects `accept` on
/// Linux).
pub struct ServerSocket {
    fd: RawFd,
    timeout_ms: u64,
}

impl ServerSocket {
    pub fn bind(port: u16, timeout_ms: u64) -> Result<Self> {
        if timeout_ms > SOCKET_MAX_TIMEOUT_MS {
            return Err(Error::InvalidArgument);
        }
        let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_STREAM, 0) };
        if fd == -1 {
            return Err(last_os_error());
        }
        let result = Self::configure_and_listen(fd, port, timeout_ms);
        if let Err(e) = result {
            unsafe { libc::close(fd) };
            return Err(e);
        }
        Ok(ServerSocket { fd, timeout_ms })
    }

    fn configure_and_listen(fd: RawFd, port: u16, timeout_ms: u64) -> Result<()> {
        unsafe {
            let opt: libc::c_int = 1;
            let opt_size = std::mem::size_of::<libc::c_int>() as libc::socklen_t;
            if libc::setsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_REUSEADDR | libc::SO_REUSEPORT,
                &opt as *const _ as *const libc::c_void,
                opt_size,
            ) == -1
            {
                return Err(last_os_error());
            }
            if timeout_ms != 0 {
                let timeval = libc::timeval {
                    tv_sec: (timeout_ms / 1000) as libc::time_t,
                    tv_usec: ((timeout_ms % 1000) * 1000) as libc::suseconds_t,
                };
                if libc::setsockopt(
                    fd,
                    libc::SOL_SOCKET,
                    libc::SO_RCVTIMEO,
                    &timeval as *const _ as *const libc::c_void,
                    std::mem::size_of::<libc::timeval>() as libc::socklen_t,
                ) == -1
                {
                    return Err(last_os_error());
                }
            }
            let mut address: libc::sockaddr_in = std::mem::zeroed();
            address.sin_family = libc::AF_INET as libc::sa_family_t;
            address.sin_addr.s_addr = libc::INADDR_ANY.to_be();
            address.sin_port = port.to_be();
            let address_ptr = &address as *const _ as *const libc::sockaddr;
            let address_len = std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;
            if libc::bind(fd, address_ptr, address_len) == -1 {
                return Err(last_os_error());
            }
            if libc::listen(fd, max_connection_backlog()) == -1 {
                return Err(last_os_error());
            }
        }
        Ok(())
    }

    /// Accepts one connection, blocking up to this socket's configured timeout. Returns
    /// [`Error::Timeout`] if no connection arrived in the window.
    pub fn accept(&self) -> Result<Socket> {
        let mut address: libc::sockaddr_in = unsafe { std::mem::zeroed() };
        let mut address_len = std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;
        let fd = unsafe {
            libc::accept(
                self.fd,
                &mut address as *mut _ as *mut libc::sockaddr,
                &mut address_len,
            )
        };
        if fd == -1 {
            return Err(last_os_error());
        }
        Socket::from_raw_fd(fd, self.timeout_ms)
    }

    /// Returns the port actually bound, useful when constructed with port 0.
    pub fn local_port(&self) -> Result<u16> {
        let mut address: libc::sockaddr_in = unsafe { std::mem::zeroed() };
        let mut address_len = std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;
        let rc = unsafe {
            libc::getsockname(self.fd, &mut address as *mut _ as *mut libc::sockaddr, &mut address_len)
        };
        if rc == -1 {
            return Err(last_os_error());
        }
        Ok(u16::from_be(address.sin_port))
    }
}

impl Drop for ServerSocket {
    fn drop(&mut self) {
        unsafe {
            libc::shutdown(self.fd, libc::SHUT_RDWR);
            libc::close(self.fd);
        }
    }
}

impl AsRawFd for ServerSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_without_a_connection_times_out() {
        let server = ServerSocket::bind(0, 100).unwrap();
        let start = std::time::Instant::now();
        let result = server.accept();
        assert_eq!(result.err(), Some(Error::Timeout));
        assert!(start.elapsed() >= std::time::Duration::from_millis(80));
    }

    #[test]
    fn timeout_over_max_is_invalid_argument() {
        let result = ServerSocket::bind(0, SOCKET_MAX_TIMEOUT_MS + 1);
        assert_eq!(result.err(), Some(Error::InvalidArgument));
    }
}
