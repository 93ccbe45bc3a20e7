use super::aperture::Aperture;
use crate::nv::GpuAddr;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// The bounded region of GPU address space that holds shader code.
///
/// Code is referenced through 32-bit offsets from the region base, so all
/// executable memory blocks are placed here instead of wherever the driver likes.
/// The allocator is shared by every memory block of a device and locks internally.
#[derive(Debug)]
pub struct CodeSegment {
    base: GpuAddr,
    size: u64,
    aperture: Mutex<Aperture>,
}

impl CodeSegment {
    /// Alignment of every reservation in the code segment.
    pub const ALIGNMENT: u64 = 0x100;

    /// Largest region addressable through 32-bit offsets.
    pub const MAX_SIZE: u64 = 1 << 32;

    /// Creates a code segment covering `[base, base + size)`.
    ///
    /// Regions larger than [`CodeSegment::MAX_SIZE`] are clamped to it.
    #[must_use]
    pub fn new(base: GpuAddr, size: u64) -> Self {
        let size = if size > Self::MAX_SIZE {
            log::warn!(
                "CodeSegment: clamping region of 0x{size:x} bytes to 0x{:x}",
                Self::MAX_SIZE
            );
            Self::MAX_SIZE
        } else {
            size
        };
        Self {
            base,
            size,
            aperture: Mutex::new(Aperture::new(base, size, Self::ALIGNMENT)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Aperture> {
        self.aperture.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub const fn base(&self) -> GpuAddr {
        self.base
    }

    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Reserves `size` bytes, returning the base address of the range.
    #[must_use]
    pub fn alloc_space(&self, size: u64) -> Option<GpuAddr> {
        let addr = self.lock().allocate_va(size, Self::ALIGNMENT);
        match addr {
            Some(addr) => log::trace!("CodeSegment: reserved 0x{size:x} bytes at 0x{addr:x}"),
            None => log::debug!("CodeSegment: no room for 0x{size:x} bytes"),
        }
        addr
    }

    /// Returns a range obtained from [`CodeSegment::alloc_space`].
    ///
    /// A mismatched `(addr, size)` pair is logged and ignored; the free set is left untouched.
    pub fn free_space(&self, addr: GpuAddr, size: u64) -> bool {
        self.lock().free_va(addr, size)
    }

    /// Offset of `addr` relative to the start of the segment, or `None` if
    /// `addr` lies outside it.
    #[must_use]
    pub fn calc_offset(&self, addr: GpuAddr) -> Option<u32> {
        let offset = addr.checked_sub(self.base)?;
        if offset >= self.size {
            return None;
        }
        u32::try_from(offset).ok()
    }

    /// Total bytes currently reserved.
    #[must_use]
    pub fn reserved_bytes(&self) -> u64 {
        self.lock().reserved_bytes()
    }

    /// Snapshot of reserved ranges as `(start, size)`, in ascending order.
    #[must_use]
    pub fn reserved_ranges(&self) -> Vec<(GpuAddr, u64)> {
        self.lock().ranges().collect()
    }
}
