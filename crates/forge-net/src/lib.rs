pub mod http;
pub mod server_socket;
pub mod socket;

pub use http::{HttpMethod, HttpRequest, DEFAULT_MAX_HEADERS_SIZE, MAX_READ_BUFFER_SIZE};
pub use server_socket::ServerSocket;
pub use socket::{Socket, SocketReader, SOCKET_MAX_TIMEOUT_MS};
