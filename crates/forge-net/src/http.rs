use std::cell::RefCell;
use std::rc::Rc;

use forge_collections::HashMap;
use forge_core::error::{Error, Result};
use forge_io::{CompositeReader, LimitedReader, LineReader, NewlineMode, Reader};

/// Owns the bytes the `LineReader` had already buffered past the blank line ending the
/// headers. Shared with the boundary callback so the buffer can be freed the instant
/// it's drained, rather than held for the rest of the body's lifetime.
struct ResidualReader {
    data: Rc<RefCell<Vec<u8>>>,
    pos: usize,
}

impl Reader for ResidualReader {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let data = self.data.borrow();
        let n = buf.len().min(data.len().saturating_sub(self.pos));
        buf[..n].copy_from_slice(&data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Conservative default; RFC9112 recommends servers support at least 8000 octets of
/// combined request-line + header bytes.
pub const DEFAULT_MAX_HEADERS_SIZE: usize = 8 * 1024;
/// Ceiling for both `max_headers_size` and the caller-supplied read buffer.
pub const MAX_READ_BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Head,
}

const fn is_http_whitespace(c: u8) -> bool {
    c == b' ' || c == b'\t'
}

/// Marks permissible bytes in an RFC9110 HTTP header field name (`token` grammar).
/// Transcribed from the original's 256-entry lookup table.
static VALID_HEADER_NAME_CHAR: [bool; 256] = build_header_name_table();

const fn build_header_name_table() -> [bool; 256] {
    let mut table = [false; 256];
    // !#$%&'*+-.^_`|~
    let punctuation: &[u8] = b"!#$%&'*+-.^_`|~";
    let mut i = 0;
    while i < punctuation.len() {
        table[punctuation[i] as usize] = true;
        i += 1;
    }
    let mut c = b'0';
    while c <= b'9' {
        table[c as usize] = true;
        c += 1;
    }
    let mut c = b'A';
    while c <= b'Z' {
        table[c as usize] = true;
        c += 1;
    }
    let mut c = b'a';
    while c <= b'z' {
        table[c as usize] = true;
        c += 1;
    }
    table
}

struct MethodLiteral {
    method: HttpMethod,
    literal: &'static str,
}

const METHOD_LITERALS: &[MethodLiteral] = &[
    MethodLiteral { method: HttpMethod::Get, literal: "GET " },
    MethodLiteral { method: HttpMethod::Post, literal: "POST " },
    MethodLiteral { method: HttpMethod::Put, literal: "PUT " },
    MethodLiteral { method: HttpMethod::Delete, literal: "DELETE " },
    MethodLiteral { method: HttpMethod::Head, literal: "HEAD " },
];

const HTTP_VERSION_SUFFIX: &str = " HTTP/1.1";

fn parse_method(line: &str) -> Result<(HttpMethod, usize)> {
    for candidate in METHOD_LITERALS {
        if let Some(rest) = line.strip_prefix(candidate.literal) {
            let _ = rest;
            return Ok((candidate.method, candidate.literal.len()));
        }
    }
    Err(Error::InvalidData)
}

fn parse_request_line(line: &str) -> Result<(HttpMethod, String)> {
    let (method, method_len) = parse_method(line)?;
    if !line.ends_with(HTTP_VERSION_SUFFIX) {
        return Err(Error::InvalidData);
    }
    let url_end = line.len() - HTTP_VERSION_SUFFIX.len();
    if url_end < method_len {
        return Err(Error::InvalidData);
    }
    Ok((method, line[method_len..url_end].to_string()))
}

/// "request-id" => "Request-Id": capitalize the first byte and every byte following
/// '-', lowercase everything else. ASCII only.
fn canonicalize_header_name(name: &str) -> String {
    let mut bytes = name.as_bytes().to_vec();
    let mut should_capitalize = true;
    for b in &mut bytes {
        if should_capitalize {
            if b.is_ascii_lowercase() {
                *b = b.to_ascii_uppercase();
            }
            should_capitalize = false;
        } else if b.is_ascii_uppercase() {
            *b = b.to_ascii_lowercase();
        }
        if *b == b'-' {
            should_capitalize = true;
        }
    }
    String::from_utf8(bytes).expect("ASCII-only transform preserves UTF-8 validity")
}

fn create_header_name(line: &str, colon_index: usize) -> Result<String> {
    if colon_index == 0 {
        return Err(Error::InvalidData);
    }
    let bytes = line.as_bytes();
    for &b in &bytes[..colon_index] {
        if !VALID_HEADER_NAME_CHAR[b as usize] {
            return Err(Error::InvalidData);
        }
    }
    Ok(canonicalize_header_name(&line[..colon_index]))
}

fn create_header_value(line: &str, colon_index: usize) -> Result<String> {
    let bytes = line.as_bytes();
    let mut start = colon_index + 1;
    if bytes.is_empty() || start > bytes.len() {
        return Err(Error::InvalidData);
    }
    while start < bytes.len() && is_http_whitespace(bytes[start]) {
        start += 1;
    }
    let mut end = bytes.len();
    while end > start && is_http_whitespace(bytes[end - 1]) {
        end -= 1;
    }
    if start >= end {
        return Err(Error::InvalidData);
    }
    Ok(line[start..end].to_string())
}

fn parse_header_field(line: &str) -> Result<(String, String)> {
    let colon_index = line.find(':').ok_or(Error::InvalidData)?;
    let name = create_header_name(line, colon_index)?;
    let value = create_header_value(line, colon_index)?;
    Ok((name, value))
}

/// A parsed HTTP/1.1 request: method, URL, headers (name -> ordered list of values),
/// and a body reader stitched from whatever bytes the header parser had already
/// buffered plus the live transport.
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    headers: HashMap<String, Vec<String>>,
    body_reader: CompositeReader,
}

impl HttpRequest {
    /// Parses a request from `reader`. `max_headers_size` bounds the combined
    /// request-line + header bytes (`LimitExceeded` if exceeded); `read_buffer_size`
    /// sizes the internal line-reading scratch buffer. Both must be in
    /// `1..=MAX_READ_BUFFER_SIZE`.
    pub fn parse<R: Reader + 'static>(
        mut reader: R,
        max_headers_size: usize,
        read_buffer_size: usize,
    ) -> Result<Self> {
        if max_headers_size == 0
            || max_headers_size > MAX_READ_BUFFER_SIZE
            || read_buffer_size == 0
            || read_buffer_size > MAX_READ_BUFFER_SIZE
        {
            return Err(Error::InvalidArgument);
        }

        let mut method = HttpMethod::Get;
        let mut url = String::new();
        let mut headers: HashMap<String, Vec<String>> = HashMap::new();
        let mut header_count = 0usize;
        let mut residual = Vec::new();

        {
            // Headers are parsed over a borrow of `reader`, so the transport is still
            // ours to reuse for the body once the borrow ends.
            let limited = LimitedReader::new(&mut reader, max_headers_size as u64);
            let mut line_reader = LineReader::new(limited, read_buffer_size, NewlineMode::CrLf)?;

            loop {
                let line = match line_reader.next_line() {
                    Ok(line) => line,
                    Err(Error::InvalidState) => break,
                    Err(e) => return Err(e),
                };
                if line.is_empty() {
                    residual = line_reader.residual().to_vec();
                    break;
                }
                if line.contains('\r') {
                    return Err(Error::InvalidData);
                }
                if header_count == 0 {
                    let (m, u) = parse_request_line(&line)?;
                    method = m;
                    url = u;
                } else {
                    let (name, value) = parse_header_field(&line)?;
                    match headers.get_mut(&name) {
                        Ok(values) => values.push(value),
                        Err(_) => headers.put(name, vec![value]),
                    }
                }
                header_count += 1;
            }
        }
        if header_count == 0 {
            return Err(Error::InvalidData);
        }

        let residual_handle = Rc::new(RefCell::new(residual));
        let boundary_handle = residual_handle.clone();
        let sources: Vec<Box<dyn Reader>> =
            vec![Box::new(ResidualReader { data: residual_handle, pos: 0 }), Box::new(reader)];
        let body_reader = CompositeReader::with_boundary_callback(sources, move |finished| {
            if finished == 0 {
                // Frees the residual scratch buffer the instant the header parser's
                // leftover bytes are exhausted, instead of holding it for the rest of
                // the body's lifetime.
                let mut buf = boundary_handle.borrow_mut();
                *buf = Vec::new();
            }
        });

        Ok(HttpRequest { method, url, headers, body_reader })
    }

    pub fn body_reader(&mut self) -> &mut CompositeReader {
        &mut self.body_reader
    }

    /// `name` must already be in canonicalized form (e.g. `"Content-Type"`), matching
    /// how header names are stored after parsing.
    pub fn header(&self, name: &str, index: usize) -> Result<&str> {
        let values = self.headers.get(&name.to_string())?;
        values.get(index).map(String::as_str).ok_or(Error::NotFound)
    }
}
