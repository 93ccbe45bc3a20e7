use super::{GpuAddr, NvKind, NvMapHandle, NvResult};

/// A GPU virtual address space that memory objects can be bound into.
pub trait AddressSpace: Send + Sync {
    /// Map a memory object at an address chosen by the driver.
    fn map(&self, handle: NvMapHandle, cached: bool, kind: NvKind) -> NvResult<GpuAddr>;

    /// Map a memory object at a caller-reserved address.
    fn map_fixed(
        &self,
        handle: NvMapHandle,
        cached: bool,
        kind: NvKind,
        addr: GpuAddr,
    ) -> NvResult<()>;

    fn unmap(&self, addr: GpuAddr);
}
