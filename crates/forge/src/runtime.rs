use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;

use forge_core::error::{Error, Result};
use forge_io::Reader;
use forge_metadata::{ImageFileMetadataLoader, ModuleRegistry};
use forge_net::{HttpRequest, ServerSocket, Socket};
use forge_worker::WorkerPool;

/// Gives [`HttpRequest::parse`] an owned, `'static` reader while keeping a handle to
/// send the response afterward -- `Socket::as_reader` borrows and so can't satisfy
/// that bound on its own.
struct OwnedSocketReader(Rc<Socket>);

impl Reader for OwnedSocketReader {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.0.read(buf)
    }
}

/// Built with a plain struct literal, matching the teacher's typed-config-by-value
/// idiom rather than an external config-file format.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub image_path: PathBuf,
    pub listen_port: u16,
    pub worker_pool_size: usize,
    pub socket_timeout_ms: u64,
    pub http_max_headers_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            image_path: PathBuf::new(),
            listen_port: 0,
            worker_pool_size: 4,
            socket_timeout_ms: 30_000,
            http_max_headers_size: forge_net::DEFAULT_MAX_HEADERS_SIZE,
        }
    }
}

/// Wires a module registry, a listening socket and a worker pool together: each
/// accepted connection is handed to the pool, which parses an HTTP request off it and
/// answers introspection queries against the loaded metadata (`GET
/// /<module>/<class>/<method>` returns the method's signature and code size). Actually
/// executing method bodies is outside this crate's scope (no VM, no bytecode
/// interpreter — see `spec.md`'s non-goals).
pub struct Runtime {
    server: ServerSocket,
    pool: WorkerPool<Socket>,
}

impl Runtime {
    /// Installs a `tracing_subscriber::fmt` subscriber configured via `RUST_LOG`
    /// (idempotent — safe to call once per process; a second call is a no-op since
    /// `tracing`'s global subscriber can only be set once).
    pub fn install_logging() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }

    pub fn new(config: RuntimeConfig) -> Result<Self> {
        Self::install_logging();
        let loader = ImageFileMetadataLoader::open(&config.image_path)?;
        let registry = Arc::new(ModuleRegistry::load(&loader)?);
        let server = ServerSocket::bind(config.listen_port, config.socket_timeout_ms)?;
        let max_headers_size = config.http_max_headers_size;
        let pool = WorkerPool::spawn(config.worker_pool_size, None, move |socket: Socket| {
            handle_connection(&registry, socket, max_headers_size)
        })?;
        Ok(Runtime { server, pool })
    }

    pub fn local_port(&self) -> Result<u16> {
        self.server.local_port()
    }

    /// Accepts one connection and hands it to the worker pool. Returns
    /// [`Error::Timeout`] if none arrived within the server socket's configured
    /// window, matching `ServerSocket::accept`'s own contract.
    pub fn accept_one(&self) -> Result<()> {
        let socket = self.server.accept()?;
        self.pool.enqueue(socket)
    }

    pub fn stop(&self, drain: bool) {
        self.pool.stop(drain);
    }

    pub fn wait(&self, timeout: std::time::Duration) -> Result<()> {
        self.pool.wait(timeout)
    }
}

fn handle_connection(registry: &ModuleRegistry, socket: Socket, max_headers_size: usize) -> Result<()> {
    let socket = Rc::new(socket);
    let reader = OwnedSocketReader(socket.clone());
    let request = HttpRequest::parse(reader, max_headers_size, forge_net::MAX_READ_BUFFER_SIZE)?;
    let body = introspect(registry, &request.url);
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        if body.is_some() { "200 OK" } else { "404 Not Found" },
        body.as_deref().unwrap_or("").len(),
        body.as_deref().unwrap_or(""),
    );
    socket.send(response.as_bytes())?;
    Ok(())
}

fn introspect(registry: &ModuleRegistry, url: &str) -> Option<String> {
    let mut parts = url.trim_start_matches('/').splitn(3, '/');
    let module_name = parts.next()?;
    let class_name = parts.next()?;
    let method_name = parts.next()?;
    let module = registry.get_module_by_name(module_name).ok()?;
    let class = module.get_class_by_name(class_name).ok()?;
    let method_id = method_name.parse::<u32>().ok()?;
    let method = class.get_method_by_id(method_id).ok()?;
    Some(format!(
        "{{\"name\":\"{}\",\"signature\":\"{}\",\"code_len\":{}}}",
        method.name,
        method.signature,
        method.code.len()
    ))
}
