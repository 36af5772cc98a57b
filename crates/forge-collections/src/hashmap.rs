use std::collections::HashMap as StdHashMap;
use std::hash::{BuildHasher, Hash, Hasher};
use std::sync::OnceLock;

use forge_core::error::{Error, Result};

fn process_salt() -> u64 {
    static SALT: OnceLock<u64> = OnceLock::new();
    *SALT.get_or_init(|| {
        use rand::RngCore;
        rand::rng().next_u64()
    })
}

/// FNV-1a mixed with a per-process salt, so two runs of the same process hash the same
/// key identically (stability within a run) while different processes disagree (a mild
/// mitigation against hash-flooding DoS across restarts).
#[derive(Clone, Copy, Default)]
pub struct SaltedHasher {
    salt: u64,
    state: u64,
}

impl Hasher for SaltedHasher {
    fn finish(&self) -> u64 {
        self.state ^ self.salt
    }

    fn write(&mut self, bytes: &[u8]) {
        let mut hash = self.state.wrapping_add(0xcbf2_9ce4_8422_2325);
        for &b in bytes {
            hash ^= u64::from(b);
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
        self.state = hash;
    }
}

#[derive(Clone, Copy, Default)]
pub struct SaltedHasherBuilder;

impl BuildHasher for SaltedHasherBuilder {
    type Hasher = SaltedHasher;

    fn build_hasher(&self) -> SaltedHasher {
        SaltedHasher { salt: process_salt(), state: 0 }
    }
}

/// Separate-chaining-flavored map (delegating the bucket strategy to `std`'s hasher
/// while keeping the put/get/remove/enumerate/moveTo contract the spec requires).
/// Values are boxed so `get_ref` returns a pointer stable across rehashes — invalidated
/// only by `remove` of that key, matching the contract exactly (a plain
/// `std::collections::HashMap<K, V>` would move `V` on rehash and break that promise).
#[derive(Debug)]
pub struct HashMap<K, V> {
    inner: StdHashMap<K, Box<V>, SaltedHasherBuilder>,
}

impl<K: Eq + Hash, V> Default for HashMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash, V> HashMap<K, V> {
    pub fn new() -> Self {
        HashMap { inner: StdHashMap::with_hasher(SaltedHasherBuilder) }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// If `key` already exists, the old value is dropped (disposed) and overwritten;
    /// the key itself is left untouched.
    pub fn put(&mut self, key: K, value: V) {
        self.inner.insert(key, Box::new(value));
    }

    pub fn get(&self, key: &K) -> Result<&V> {
        self.inner.get(key).map(|v| v.as_ref()).ok_or(Error::NotFound)
    }

    /// Stable reference to the stored value; invalidated only by `remove` of this key.
    pub fn get_ref(&self, key: &K) -> Result<&V> {
        self.get(key)
    }

    pub fn get_mut(&mut self, key: &K) -> Result<&mut V> {
        self.inner.get_mut(key).map(|v| v.as_mut()).ok_or(Error::NotFound)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.contains_key(key)
    }

    /// Removes and disposes both key and value; returns whether an entry was present.
    pub fn remove(&mut self, key: &K) -> bool {
        self.inner.remove(key).is_some()
    }

    /// Iterates all entries in unspecified order; returning an error from `f`
    /// terminates iteration and propagates that error.
    pub fn enumerate(&self, mut f: impl FnMut(&K, &V) -> Result<()>) -> Result<()> {
        for (k, v) in &self.inner {
            f(k, v)?;
        }
        Ok(())
    }

    /// Empties `self` into `other`. All-or-nothing: if any key already exists in
    /// `other`, no entries are moved and both maps retain their original state.
    pub fn move_to(&mut self, other: &mut HashMap<K, V>) -> Result<()>
    where
        K: Clone,
    {
        for key in self.inner.keys() {
            if other.inner.contains_key(key) {
                return Err(Error::InvalidState);
            }
        }
        for (k, v) in self.inner.drain() {
            other.inner.insert(k, v);
        }
        Ok(())
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.inner.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_roundtrips() {
        let mut m = HashMap::new();
        for i in 0u64..1000 {
            m.put(i, 2 * i);
        }
        for i in 0u64..1000 {
            if i % 2 == 0 {
                m.remove(&i);
            }
        }
        for i in 0u64..1000 {
            let result = m.get(&i);
            if i % 2 == 0 {
                assert_eq!(result, Err(Error::NotFound));
            } else {
                assert_eq!(*result.unwrap(), 2 * i);
            }
        }
        assert_eq!(m.len(), 500);
    }

    #[test]
    fn remove_missing_key_is_false() {
        let mut m: HashMap<i32, i32> = HashMap::new();
        m.remove(&1);
        assert!(!m.remove(&1));
    }

    #[test]
    fn get_ref_stable_until_removed() {
        let mut m = HashMap::new();
        m.put("a".to_string(), 1);
        for i in 0..64 {
            m.put(format!("k{i}"), i);
        }
        let ptr_before = m.get_ref(&"a".to_string()).unwrap() as *const i32;
        for i in 64..256 {
            m.put(format!("k{i}"), i);
        }
        let ptr_after = m.get_ref(&"a".to_string()).unwrap() as *const i32;
        assert_eq!(ptr_before, ptr_after);
    }

    #[test]
    fn move_to_is_all_or_nothing_on_conflict() {
        let mut src = HashMap::new();
        src.put(1, "a");
        src.put(2, "b");
        let mut dst = HashMap::new();
        dst.put(2, "conflict");
        assert_eq!(src.move_to(&mut dst), Err(Error::InvalidState));
        assert_eq!(src.len(), 2);
        assert_eq!(dst.len(), 1);
    }

    #[test]
    fn move_to_empties_source_on_success() {
        let mut src = HashMap::new();
        src.put(1, "a");
        src.put(2, "b");
        let mut dst = HashMap::new();
        src.move_to(&mut dst).unwrap();
        assert_eq!(src.len(), 0);
        assert_eq!(dst.len(), 2);
    }
}
