//! Managed heap extent as exposed to device code.

use std::fmt;

/// Committed extent of the VM's managed heap: `[base, base + size)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeapRegion {
    pub base: usize,
    pub size: usize,
}

impl HeapRegion {
    pub fn new(base: usize, size: usize) -> Self {
        Self { base, size }
    }

    /// Region covering a host byte slice.
    pub fn from_slice(bytes: &[u8]) -> Self {
        Self {
            base: bytes.as_ptr() as usize,
            size: bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// One past the last byte, saturating at the top of the address space.
    pub fn end(&self) -> usize {
        self.base.saturating_add(self.size)
    }

    pub fn contains(&self, addr: usize) -> bool {
        addr >= self.base && addr < self.end()
    }
}

impl fmt::Display for HeapRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:#x}, {:#x})", self.base, self.end())
    }
}

/// The VM heap manager, queried whenever the bridge (re)registers the heap.
pub trait HeapSource {
    fn committed_region(&self) -> HeapRegion;
}

impl HeapSource for HeapRegion {
    fn committed_region(&self) -> HeapRegion {
        *self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains() {
        let r = HeapRegion::new(0x1000, 0x100);
        assert!(r.contains(0x1000));
        assert!(r.contains(0x10ff));
        assert!(!r.contains(0x1100));
        assert!(!r.contains(0xfff));
        assert_eq!(r.end(), 0x1100);
    }

    #[test]
    fn test_empty_contains_nothing() {
        let r = HeapRegion::new(0x1000, 0);
        assert!(r.is_empty());
        assert!(!r.contains(0x1000));
    }

    #[test]
    fn test_from_slice() {
        let buf = vec![0u8; 64];
        let r = HeapRegion::from_slice(&buf);
        assert_eq!(r.size, 64);
        assert!(r.contains(buf.as_ptr() as usize + 63));
        assert_eq!(r.committed_region(), r);
    }

    #[test]
    fn test_saturating_end() {
        let r = HeapRegion::new(usize::MAX - 4, 16);
        assert_eq!(r.end(), usize::MAX);
        assert!(r.contains(usize::MAX - 1));
    }
}
