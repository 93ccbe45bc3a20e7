use crate::utils::checked_align_up;
use std::collections::BTreeMap;

/// A managed range of GPU virtual address space.
///
/// Occupied ranges are tracked as start -> size; everything else in
/// `[base, limit)` is free.
#[derive(Debug)]
pub struct Aperture {
    base: u64,
    limit: u64,
    align: u64,

    allocations: BTreeMap<u64, u64>,
}

impl Aperture {
    /// Creates an aperture covering `[base, base + size)`.
    #[must_use]
    pub fn new(base: u64, size: u64, align: u64) -> Self {
        debug_assert!(align.is_power_of_two());
        Self {
            base,
            limit: base.saturating_add(size),
            align,
            allocations: BTreeMap::new(),
        }
    }

    /// Total bytes currently reserved.
    #[must_use]
    pub fn reserved_bytes(&self) -> u64 {
        self.allocations.values().sum()
    }

    /// Iterates reserved ranges in ascending address order.
    pub fn ranges(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.allocations.iter().map(|(&start, &size)| (start, size))
    }

    fn fits(start: u64, size: u64, end: u64) -> bool {
        start.checked_add(size).is_some_and(|req_end| req_end <= end)
    }

    /// Reserves a range of `size` bytes aligned to at least `align`, first-fit.
    ///
    /// Returns `None` when no hole is large enough, including requests too
    /// large to represent.
    pub fn allocate_va(&mut self, size: u64, align: u64) -> Option<u64> {
        if size == 0 {
            return None;
        }
        let align = align.max(self.align);
        let size = checked_align_up(size, self.align)?;

        let mut candidate = checked_align_up(self.base, align)?;

        for (&alloc_start, &alloc_size) in &self.allocations {
            if Self::fits(candidate, size, alloc_start) {
                break;
            }
            candidate = checked_align_up(alloc_start + alloc_size, align)?;
        }

        if !Self::fits(candidate, size, self.limit) {
            return None;
        }

        self.allocations.insert(candidate, size);
        Some(candidate)
    }

    /// Releases a range returned by [`Aperture::allocate_va`].
    ///
    /// Returns false, leaving the tracked ranges untouched, if `(addr, size)` was not reserved.
    pub fn free_va(&mut self, addr: u64, size: u64) -> bool {
        let Some(size) = checked_align_up(size, self.align) else {
            log::error!("Aperture: release of 0x{addr:x} with oversized length 0x{size:x}");
            return false;
        };
        match self.allocations.get(&addr) {
            Some(&tracked) if tracked == size => {
                self.allocations.remove(&addr);
                true
            }
            Some(&tracked) => {
                log::error!(
                    "Aperture: release of 0x{addr:x} with size 0x{size:x} does not match reserved size 0x{tracked:x}"
                );
                false
            }
            None => {
                log::error!("Aperture: tried to free VA 0x{addr:x} which was not tracked");
                false
            }
        }
    }
}
