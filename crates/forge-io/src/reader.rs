use forge_core::error::{Error, Result};

/// Byte-stream source. `read` is short-read-legal: `bytes_read <= buf.len()`. Reaching
/// end of stream is signaled by `read` returning `Ok(0)` on a subsequent call, not by an
/// error — mirroring POSIX `read(2)`.
pub trait Reader {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Optional; readers that can't seek return `NotImplemented`.
    fn seek(&mut self, _offset: u64) -> Result<()> {
        Err(Error::NotImplemented)
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<R: Reader + ?Sized> Reader for &mut R {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }

    fn seek(&mut self, offset: u64) -> Result<()> {
        (**self).seek(offset)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

impl Reader for Box<dyn Reader> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.as_mut().read(buf)
    }

    fn seek(&mut self, offset: u64) -> Result<()> {
        self.as_mut().seek(offset)
    }

    fn close(&mut self) -> Result<()> {
        self.as_mut().close()
    }
}

/// Reads from a fixed byte slice.
pub struct MemoryReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> MemoryReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        MemoryReader { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

impl Reader for MemoryReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let n = buf.len().min(self.remaining());
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    fn seek(&mut self, offset: u64) -> Result<()> {
        let offset = offset as usize;
        if offset > self.data.len() {
            return Err(Error::InvalidArgument);
        }
        self.pos = offset;
        Ok(())
    }
}

/// Wraps a source, enforcing a byte cap; overrun returns `LimitExceeded`.
pub struct LimitedReader<R> {
    inner: R,
    remaining: u64,
}

impl<R: Reader> LimitedReader<R> {
    pub fn new(inner: R, limit: u64) -> Self {
        LimitedReader { inner, remaining: limit }
    }
}

impl<R: Reader> Reader for LimitedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.remaining == 0 {
            return Err(Error::LimitExceeded);
        }
        let to_request = (buf.len() as u64).min(self.remaining) as usize;
        let n = self.inner.read(&mut buf[..to_request])?;
        self.remaining -= n as u64;
        Ok(n)
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }
}

/// An ordered chain of readers. Reads drain the current source; on EOF it advances to
/// the next, invoking `on_boundary(finished_index)` before switching. Used by the HTTP
/// request parser to stitch "residual already-buffered bytes" onto "the live
/// transport".
pub struct CompositeReader {
    sources: Vec<Box<dyn Reader>>,
    current: usize,
    on_boundary: Option<Box<dyn FnMut(usize)>>,
}

impl CompositeReader {
    pub fn new(sources: Vec<Box<dyn Reader>>) -> Self {
        CompositeReader { sources, current: 0, on_boundary: None }
    }

    pub fn with_boundary_callback(
        sources: Vec<Box<dyn Reader>>,
        on_boundary: impl FnMut(usize) + 'static,
    ) -> Self {
        CompositeReader { sources, current: 0, on_boundary: Some(Box::new(on_boundary)) }
    }
}

impl Reader for CompositeReader {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            if self.current >= self.sources.len() {
                return Ok(0);
            }
            let n = self.sources[self.current].read(buf)?;
            if n > 0 {
                return Ok(n);
            }
            let finished = self.current;
            self.current += 1;
            if let Some(cb) = self.on_boundary.as_mut() {
                cb(finished);
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        let mut err = Error::Ok;
        for source in &mut self.sources {
            err = forge_core::error::merge(err, source.close().err().unwrap_or(Error::Ok));
        }
        if err.is_ok() { Ok(()) } else { Err(err) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_reader_truncates_past_end() {
        let mut r = MemoryReader::new(b"hello");
        let mut buf = [0u8; 16];
        let n = r.read(&mut buf).unwrap();
        assert_eq!(n, 5);
        assert_eq!(&buf[..n], b"hello");
        assert_eq!(r.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn memory_reader_seek_past_end_is_invalid_argument() {
        let mut r = MemoryReader::new(b"hi");
        assert_eq!(r.seek(10), Err(Error::InvalidArgument));
    }

    #[test]
    fn limited_reader_enforces_cap() {
        let mut r = LimitedReader::new(MemoryReader::new(b"hello world"), 5);
        let mut buf = [0u8; 16];
        let n = r.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello");
        assert_eq!(r.read(&mut buf), Err(Error::LimitExceeded));
    }

    #[test]
    fn composite_reader_chains_and_signals_boundary() {
        let crossed = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let crossed2 = crossed.clone();
        let mut r = CompositeReader::with_boundary_callback(
            vec![Box::new(MemoryReader::new(b"ab")), Box::new(MemoryReader::new(b"cd"))],
            move |i| crossed2.borrow_mut().push(i),
        );
        let mut out = Vec::new();
        let mut buf = [0u8; 1];
        loop {
            let n = r.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        assert_eq!(out, b"abcd");
        assert_eq!(*crossed.borrow(), vec![0]);
    }
}
