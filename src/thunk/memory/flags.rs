use bitflags::bitflags;

pub const CPU_ACCESS_SHIFT: u32 = 0;
pub const GPU_ACCESS_SHIFT: u32 = 2;
pub const MEM_ACCESS_MASK: u32 = 3;

/// Access level for one side (CPU or GPU) of a memory block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum MemAccess {
    None = 0,
    Uncached = 1,
    Cached = 2,
}

impl MemAccess {
    /// Decodes a two-bit access field. The reserved encoding `3` is treated as cached.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        match bits & MEM_ACCESS_MASK {
            0 => Self::None,
            1 => Self::Uncached,
            _ => Self::Cached,
        }
    }
}

bitflags! {
    /// Creation flags of a memory block.
    ///
    /// Bits `0..2` hold the CPU [`MemAccess`] level and bits `2..4` the GPU level.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MemBlockFlags: u32 {
        const CPU_UNCACHED = (MemAccess::Uncached as u32) << CPU_ACCESS_SHIFT;
        const CPU_CACHED = (MemAccess::Cached as u32) << CPU_ACCESS_SHIFT;
        const CPU_ACCESS_MASK = MEM_ACCESS_MASK << CPU_ACCESS_SHIFT;

        const GPU_UNCACHED = (MemAccess::Uncached as u32) << GPU_ACCESS_SHIFT;
        const GPU_CACHED = (MemAccess::Cached as u32) << GPU_ACCESS_SHIFT;
        const GPU_ACCESS_MASK = MEM_ACCESS_MASK << GPU_ACCESS_SHIFT;

        /// Block holds shader code and must live in the code segment.
        const CODE = 1 << 4;
        /// Block backs images (swizzled/compressed mappings). Not supported.
        const IMAGE = 1 << 5;
    }
}

impl Default for MemBlockFlags {
    fn default() -> Self {
        Self::CPU_UNCACHED | Self::GPU_CACHED
    }
}

impl MemBlockFlags {
    /// Re-packs the access fields into their canonical positions.
    ///
    /// Every other bit is carried through untouched.
    #[must_use]
    pub const fn normalize(self) -> Self {
        let raw = self.bits();
        let cpu_access = (raw >> CPU_ACCESS_SHIFT) & MEM_ACCESS_MASK;
        let gpu_access = (raw >> GPU_ACCESS_SHIFT) & MEM_ACCESS_MASK;

        let mut out = raw & !(Self::CPU_ACCESS_MASK.bits() | Self::GPU_ACCESS_MASK.bits());
        out |= cpu_access << CPU_ACCESS_SHIFT;
        out |= gpu_access << GPU_ACCESS_SHIFT;
        Self::from_bits_retain(out)
    }

    #[must_use]
    pub const fn cpu_access(self) -> MemAccess {
        MemAccess::from_bits(self.bits() >> CPU_ACCESS_SHIFT)
    }

    #[must_use]
    pub const fn gpu_access(self) -> MemAccess {
        MemAccess::from_bits(self.bits() >> GPU_ACCESS_SHIFT)
    }

    #[must_use]
    pub const fn is_cpu_cached(self) -> bool {
        matches!(self.cpu_access(), MemAccess::Cached)
    }

    #[must_use]
    pub const fn is_gpu_cached(self) -> bool {
        matches!(self.gpu_access(), MemAccess::Cached)
    }

    #[must_use]
    pub const fn is_gpu_no_access(self) -> bool {
        matches!(self.gpu_access(), MemAccess::None)
    }

    #[must_use]
    pub const fn is_code(self) -> bool {
        self.contains(Self::CODE)
    }

    #[must_use]
    pub const fn is_image(self) -> bool {
        self.contains(Self::IMAGE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_keeps_canonical_flags() {
        let flags = MemBlockFlags::CPU_CACHED | MemBlockFlags::GPU_UNCACHED | MemBlockFlags::CODE;
        assert_eq!(flags.normalize(), flags);
    }

    #[test]
    fn normalize_preserves_unknown_bits() {
        let flags = MemBlockFlags::from_bits_retain(0x8000_0100 | 0b1001);
        let norm = flags.normalize();
        assert_eq!(norm.bits(), 0x8000_0100 | 0b1001);
        assert_eq!(norm.cpu_access(), MemAccess::Uncached);
        assert_eq!(norm.gpu_access(), MemAccess::Cached);
    }

    #[test]
    fn access_queries() {
        let flags = MemBlockFlags::CPU_CACHED;
        assert!(flags.is_cpu_cached());
        assert!(flags.is_gpu_no_access());
        assert!(!flags.is_gpu_cached());

        let flags = MemBlockFlags::default();
        assert!(!flags.is_cpu_cached());
        assert!(flags.is_gpu_cached());
        assert!(!flags.is_code());
        assert!(!flags.is_image());
    }

    #[test]
    fn reserved_access_encoding_reads_as_cached() {
        let flags = MemBlockFlags::CPU_ACCESS_MASK;
        assert_eq!(flags.cpu_access(), MemAccess::Cached);
    }
}
