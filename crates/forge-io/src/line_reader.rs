use forge_core::error::{Error, Result};

use crate::reader::Reader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewlineMode {
    Lf,
    CrLf,
}

/// Stateful wrapper producing one line per call over an underlying reader.
///
/// Owns a caller-supplied fixed-size scratch buffer plus an accumulator for lines that
/// span refill boundaries. Non-restartable: once end of stream is observed, every
/// subsequent call returns `InvalidState`.
pub struct LineReader<R> {
    source: R,
    buffer: Vec<u8>,
    buffer_index: usize,
    bytes_in_buffer: usize,
    accumulator: Vec<u8>,
    mode: NewlineMode,
    done: bool,
    any_bytes_ever: bool,
}

impl<R: Reader> LineReader<R> {
    pub fn new(source: R, buffer_size: usize, mode: NewlineMode) -> Result<Self> {
        if buffer_size == 0 {
            return Err(Error::InvalidArgument);
        }
        Ok(LineReader {
            source,
            buffer: vec![0u8; buffer_size],
            buffer_index: 0,
            bytes_in_buffer: 0,
            accumulator: Vec::new(),
            mode,
            done: false,
            any_bytes_ever: false,
        })
    }

    /// Bytes already pulled from the source but not yet consumed by a completed line —
    /// used by the HTTP parser to stitch onto the live transport when building the
    /// body reader.
    pub fn residual(&self) -> &[u8] {
        &self.buffer[self.buffer_index..self.bytes_in_buffer]
    }

    fn refill(&mut self) -> Result<usize> {
        let n = self.source.read(&mut self.buffer)?;
        self.buffer_index = 0;
        self.bytes_in_buffer = n;
        Ok(n)
    }

    /// Finds the first newline in `buffer[buffer_index..bytes_in_buffer]`. In CRLF
    /// mode, only an LF preceded by a CR counts (the CR may sit in the current chunk or
    /// at the accumulator's tail); any other LF is ordinary content.
    fn find_newline(&self) -> Option<usize> {
        for i in self.buffer_index..self.bytes_in_buffer {
            if self.buffer[i] != b'\n' {
                continue;
            }
            match self.mode {
                NewlineMode::Lf => return Some(i),
                NewlineMode::CrLf => {
                    let preceded_by_cr = if i > self.buffer_index {
                        self.buffer[i - 1] == b'\r'
                    } else {
                        self.accumulator.last() == Some(&b'\r')
                    };
                    if preceded_by_cr {
                        return Some(i);
                    }
                }
            }
        }
        None
    }

    pub fn next_line(&mut self) -> Result<String> {
        if self.done {
            return Err(Error::InvalidState);
        }
        loop {
            if self.buffer_index == self.bytes_in_buffer {
                let n = self.refill()?;
                if n == 0 {
                    self.done = true;
                    // A stream that never produced a single byte has no final line to
                    // flush. Otherwise this is the first EOF after real content, so one
                    // more line is flushed (possibly empty — a trailing newline in the
                    // source yields a trailing empty line here, matching split-style
                    // semantics).
                    if !self.any_bytes_ever {
                        return Err(Error::InvalidState);
                    }
                    let line = String::from_utf8_lossy(&self.accumulator).into_owned();
                    self.accumulator.clear();
                    return Ok(line);
                }
                self.any_bytes_ever = true;
            }

            if let Some(newline_at) = self.find_newline() {
                let content_end = if self.mode == NewlineMode::CrLf && newline_at > self.buffer_index
                {
                    newline_at - 1
                } else {
                    newline_at
                };
                self.accumulator.extend_from_slice(&self.buffer[self.buffer_index..content_end]);
                if self.mode == NewlineMode::CrLf
                    && newline_at == self.buffer_index
                    && self.accumulator.last() == Some(&b'\r')
                {
                    self.accumulator.pop();
                }
                self.buffer_index = newline_at + 1;
                let line = String::from_utf8_lossy(&self.accumulator).into_owned();
                self.accumulator.clear();
                return Ok(line);
            }

            self.accumulator.extend_from_slice(&self.buffer[self.buffer_index..self.bytes_in_buffer]);
            self.buffer_index = self.bytes_in_buffer;
        }
    }
}

/// Invokes a `LineReader` to EOF, returning every produced line.
pub fn read_all_lines<R: Reader>(
    source: R,
    buffer_size: usize,
    mode: NewlineMode,
) -> Result<Vec<String>> {
    let mut reader = LineReader::new(source, buffer_size, mode)?;
    let mut lines = Vec::new();
    loop {
        match reader.next_line() {
            Ok(line) => lines.push(line),
            Err(Error::InvalidState) => return Ok(lines),
            Err(e) => return Err(e),
        }
    }
}
