//! Engine-managed linear memory.
//!
//! Script callers stage data in a single growable byte arena and pass
//! `(offset, len)` regions to the engine, the way a wasm module hands out
//! pointers into its linear memory. Growing the arena reallocates the
//! backing store, so nothing may hold on to a region's bytes across an
//! allocation. Descriptors built from a region therefore copy it.

use std::collections::BTreeMap;

use anyhow::{Result, bail, ensure};

const ALIGNMENT: usize = 8;
const INITIAL_SIZE: usize = 64 * 1024;

/// A region of the heap, comparable to a pointer plus a byte length.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HeapRegion {
    pub offset: usize,
    pub len: usize,
}

impl HeapRegion {
    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}

#[derive(Debug)]
pub struct Heap {
    memory: Vec<u8>,
    // offset -> reserved size (len rounded up to ALIGNMENT)
    allocations: BTreeMap<usize, usize>,
}

impl Default for Heap {
    fn default() -> Self {
        Self::with_capacity(INITIAL_SIZE)
    }
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            memory: vec![0; bytes],
            allocations: BTreeMap::new(),
        }
    }

    /// Current size of the backing store in bytes.
    pub fn len(&self) -> usize {
        self.memory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memory.is_empty()
    }

    /// Reserve `len` zeroed bytes using first-fit, growing the heap if no gap
    /// is large enough.
    pub fn alloc(&mut self, len: usize) -> Result<HeapRegion> {
        ensure!(len > 0, "cannot allocate an empty heap region");
        let reserved = len.div_ceil(ALIGNMENT) * ALIGNMENT;

        let mut cursor = 0;
        for (&offset, &size) in &self.allocations {
            if offset - cursor >= reserved {
                break;
            }
            cursor = offset + size;
        }

        let end = cursor + reserved;
        if end > self.memory.len() {
            let grown = end.max(self.memory.len() * 2).next_power_of_two();
            log::debug!("heap: growing from {} to {} bytes", self.memory.len(), grown);
            self.memory.resize(grown, 0);
        }

        self.memory[cursor..end].fill(0);
        self.allocations.insert(cursor, reserved);
        Ok(HeapRegion {
            offset: cursor,
            len,
        })
    }

    /// Allocate a region and fill it with `data`.
    pub fn alloc_bytes(&mut self, data: &[u8]) -> Result<HeapRegion> {
        let region = self.alloc(data.len())?;
        self.memory[region.offset..region.end()].copy_from_slice(data);
        Ok(region)
    }

    pub fn free(&mut self, region: HeapRegion) -> Result<()> {
        match self.allocations.remove(&region.offset) {
            Some(_) => Ok(()),
            None => bail!("no heap allocation at offset {}", region.offset),
        }
    }

    pub fn write(&mut self, region: HeapRegion, data: &[u8]) -> Result<()> {
        ensure!(
            data.len() <= region.len,
            "writing {} bytes into a {} byte region",
            data.len(),
            region.len
        );
        let bytes = self.bytes_mut(region)?;
        bytes[..data.len()].copy_from_slice(data);
        Ok(())
    }

    /// Borrow a region's bytes. The borrow ends before the heap can grow.
    pub fn bytes(&self, region: HeapRegion) -> Result<&[u8]> {
        self.check(region)?;
        Ok(&self.memory[region.offset..region.end()])
    }

    pub fn bytes_mut(&mut self, region: HeapRegion) -> Result<&mut [u8]> {
        self.check(region)?;
        Ok(&mut self.memory[region.offset..region.end()])
    }

    fn check(&self, region: HeapRegion) -> Result<()> {
        let end = region.offset.checked_add(region.len);
        ensure!(
            end.is_some_and(|end| end <= self.memory.len()),
            "heap access ({} bytes at {}) exceeds bounds ({})",
            region.len,
            region.offset,
            self.memory.len()
        );
        Ok(())
    }
}
