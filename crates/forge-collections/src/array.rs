use forge_core::error::{Error, Result};

/// Contiguous, owned sequence of `T` with amortized doubling growth.
///
/// Growth, bounds-checking and the unstable sort are implemented explicitly (rather
/// than deferring entirely to `Vec`'s own growth policy) so the doubling/`addRange`/
/// `expand` contract below is exact and independently testable.
#[derive(Debug, Default, Clone)]
pub struct Array<T> {
    buf: Vec<T>,
}

impl<T> Array<T> {
    pub fn new() -> Self {
        Array { buf: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Array { buf: Vec::with_capacity(capacity) }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    /// Appends `value`; capacity doubles (checked for overflow) when full.
    pub fn add(&mut self, value: T) -> Result<()> {
        if self.buf.len() == self.buf.capacity() {
            let new_cap = forge_core::math::doubled_capacity(self.buf.capacity())?;
            self.buf.reserve_exact(new_cap - self.buf.capacity());
        }
        self.buf.push(value);
        Ok(())
    }

    pub fn get(&self, index: usize) -> Result<&T> {
        self.buf.get(index).ok_or(Error::OutOfRange)
    }

    pub fn set(&mut self, index: usize, value: T) -> Result<()> {
        let slot = self.buf.get_mut(index).ok_or(Error::OutOfRange)?;
        *slot = value;
        Ok(())
    }

    /// Appends `n` contiguous elements. Unlike `add`, the new capacity is computed
    /// directly from the new count (not via repeated doubling), so one call can grow
    /// arbitrarily in a single allocation.
    pub fn add_range(&mut self, values: &[T]) -> Result<()>
    where
        T: Clone,
    {
        let new_count = forge_core::math::checked_add(self.buf.len(), values.len())?;
        if new_count > self.buf.capacity() {
            self.buf.reserve_exact(new_count - self.buf.len());
        }
        self.buf.extend_from_slice(values);
        Ok(())
    }

    /// Grows the count by `n`, initializing each new slot via `init(index, slot)`.
    pub fn expand(&mut self, n: usize, mut init: impl FnMut(usize, &mut T))
    where
        T: Default,
    {
        let start = self.buf.len();
        self.buf.resize_with(start + n, T::default);
        for i in start..self.buf.len() {
            let (idx, slot) = (i, &mut self.buf[i]);
            init(idx, slot);
        }
    }

    /// Disposes every element (via `Drop`) and resets count to 0, retaining capacity.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn as_slice(&self) -> &[T] {
        &self.buf
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.buf
    }

    pub fn sort_unstable_by(&mut self, compare: impl FnMut(&T, &T) -> std::cmp::Ordering) {
        self.buf.sort_unstable_by(compare);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.buf.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_roundtrips() {
        let mut a = Array::new();
        for i in 0..8 {
            a.add(i).unwrap();
        }
        a.set(3, 99).unwrap();
        assert_eq!(*a.get(3).unwrap(), 99);
    }

    #[test]
    fn get_out_of_range() {
        let a: Array<i32> = Array::new();
        assert_eq!(a.get(0), Err(Error::OutOfRange));
    }

    #[test]
    fn add_range_grows_in_one_shot() {
        let mut a = Array::new();
        a.add_range(&[1, 2, 3, 4, 5]).unwrap();
        assert_eq!(a.len(), 5);
        assert_eq!(a.as_slice(), &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn expand_initializes_new_slots() {
        let mut a: Array<i32> = Array::new();
        a.expand(4, |i, slot| *slot = i as i32 * 10);
        assert_eq!(a.as_slice(), &[0, 10, 20, 30]);
    }

    #[test]
    fn clear_retains_capacity() {
        let mut a = Array::new();
        a.add_range(&[1, 2, 3]).unwrap();
        let cap = a.capacity();
        a.clear();
        assert_eq!(a.len(), 0);
        assert_eq!(a.capacity(), cap);
    }

    #[test]
    fn sort_is_idempotent() {
        let mut a = Array::new();
        a.add_range(&[5, 3, 1, 4, 2]).unwrap();
        a.sort_unstable_by(|x, y| x.cmp(y));
        let once = a.as_slice().to_vec();
        a.sort_unstable_by(|x, y| x.cmp(y));
        assert_eq!(a.as_slice(), once.as_slice());
    }
}
