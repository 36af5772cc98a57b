use std::borrow::Cow;
use std::cell::Cell;

/// Owned-or-view string with a lazily computed, cached 32-bit hash.
///
/// `Cow<str>` already gives us the owned/view split for free: `Owned` copies and frees
/// its bytes on drop, `Borrowed` aliases and drops as a no-op — exactly the contract the
/// spec describes, without a manual tag.
#[derive(Debug, Clone)]
pub struct ForgeString<'a> {
    data: Cow<'a, str>,
    hash: Cell<Option<u32>>,
}

const HASH_UNCOMPUTED: Option<u32> = None;

impl<'a> ForgeString<'a> {
    pub fn owned(s: impl Into<String>) -> Self {
        ForgeString { data: Cow::Owned(s.into()), hash: Cell::new(HASH_UNCOMPUTED) }
    }

    pub fn view(s: &'a str) -> Self {
        ForgeString { data: Cow::Borrowed(s), hash: Cell::new(HASH_UNCOMPUTED) }
    }

    pub fn as_str(&self) -> &str {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_owned(&self) -> bool {
        matches!(self.data, Cow::Owned(_))
    }

    /// Hashed with the per-process salt from [`crate::hashmap`]; cached after first use.
    pub fn hash(&self, salt: u64) -> u32 {
        if let Some(h) = self.hash.get() {
            return h;
        }
        let h = hash_bytes_with_salt(self.data.as_bytes(), salt);
        self.hash.set(Some(h));
        h
    }
}

fn hash_bytes_with_salt(bytes: &[u8], salt: u64) -> u32 {
    let mut state = salt;
    for &b in bytes {
        state ^= u64::from(b);
        state = state.wrapping_mul(0x0000_0100_0000_01b3);
    }
    (state ^ (state >> 32)) as u32
}

/// An `Array<u8>` with convenience appenders, mirroring the spec's description of
/// `StringBuilder` as "an Array<byte> with convenience appenders".
#[derive(Debug, Default, Clone)]
pub struct StringBuilder {
    buf: Vec<u8>,
}

impl StringBuilder {
    pub fn new() -> Self {
        StringBuilder { buf: Vec::new() }
    }

    pub fn append_str(&mut self, s: &str) {
        self.buf.extend_from_slice(s.as_bytes());
    }

    pub fn append_byte(&mut self, b: u8) {
        self.buf.push(b);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn to_forge_string(&self) -> ForgeString<'static> {
        ForgeString::owned(String::from_utf8_lossy(&self.buf).into_owned())
    }

    /// Substring by byte range, as an owned copy.
    pub fn substring(&self, range: std::ops::Range<usize>) -> ForgeString<'static> {
        ForgeString::owned(String::from_utf8_lossy(&self.buf[range]).into_owned())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }
}

/// Deduplicating string interner. Canonical copies live in a pool-local bump-pointer
/// arena (`BumpPointerAllocator`), not as individually heap-allocated strings — bytes
/// are copied in once and never move again, so `get_ref` can hand back a pointer that
/// stays valid (and stable across further interning) for the pool's whole lifetime.
/// The arena only grows; interned strings are freed all at once when the pool drops.
#[derive(Debug, Default)]
pub struct StringPool {
    arena: forge_core::allocator::BumpPointerAllocator,
    entries: std::collections::HashMap<String, *const str>,
}

impl StringPool {
    pub fn new() -> Self {
        StringPool {
            arena: forge_core::allocator::BumpPointerAllocator::default(),
            entries: std::collections::HashMap::new(),
        }
    }

    /// Returns a reference to the canonical stored copy of `s`, interning it if absent.
    pub fn get_ref(&mut self, s: &str) -> &str {
        use forge_core::allocator::Allocator;

        if let Some(&ptr) = self.entries.get(s) {
            return unsafe { &*ptr };
        }
        let bytes = s.as_bytes();
        let block = self.arena.allocate(bytes.len()).expect("bump arena exhausted");
        // SAFETY: `block` is a fresh, `bytes.len()`-byte region this call just got from
        // the arena, which keeps it alive (and never moves it) for as long as `self`
        // does -- nothing else can alias it until it's handed out below.
        let str_ptr: *const str = unsafe {
            block.as_ptr().copy_from_nonoverlapping(bytes.as_ptr(), bytes.len());
            std::str::from_utf8_unchecked(std::slice::from_raw_parts(block.as_ptr(), bytes.len()))
        };
        self.entries.insert(s.to_string(), str_ptr);
        unsafe { &*str_ptr }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
