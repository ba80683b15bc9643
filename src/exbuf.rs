use std::collections::TryReserveError;
use thiserror::Error;

/// The buffer never allocates less than this, to avoid really small allocs.
const MIN_CAPACITY: usize = 1;

#[derive(Debug, Error)]
#[error("buffer allocation failed")]
pub struct OutOfMemory(#[from] TryReserveError);

/// Growable byte accumulator used to assemble one outgoing message before a
/// single write. Capacity only ever doubles, so n appended bytes cost at most
/// O(log n) reallocations.
#[derive(Debug)]
pub struct ExBuffer {
    data: Vec<u8>,
}

impl ExBuffer {
    pub fn new() -> Result<Self, OutOfMemory> {
        Self::with_capacity(MIN_CAPACITY)
    }

    /// Allocates at least `max(min_capacity, 1)` bytes up front.
    pub fn with_capacity(min_capacity: usize) -> Result<Self, OutOfMemory> {
        let mut data = Vec::new();
        data.try_reserve_exact(min_capacity.max(MIN_CAPACITY))?;
        Ok(Self { data })
    }

    /// Doubles the capacity until it is at least `min_capacity_after`.
    /// Contents are intact whether or not the allocation succeeds.
    pub fn reserve(&mut self, min_capacity_after: usize) -> Result<(), OutOfMemory> {
        let mut target = self.data.capacity().max(MIN_CAPACITY);
        while target < min_capacity_after {
            target *= 2;
        }
        if target > self.data.capacity() {
            self.data.try_reserve_exact(target - self.data.len())?;
        }
        Ok(())
    }

    pub fn append(&mut self, bytes: &[u8]) -> Result<(), OutOfMemory> {
        self.reserve(self.data.len() + bytes.len())?;
        self.data.extend_from_slice(bytes);
        debug_assert!(self.data.len() <= self.data.capacity());
        Ok(())
    }

    /// Overwrites `len` bytes starting at `at`; the range must already be
    /// within the used length. Used to patch a length field once the payload
    /// size is known.
    pub fn overwrite(&mut self, at: usize, bytes: &[u8]) {
        self.data[at..at + bytes.len()].copy_from_slice(bytes);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}
