use super::MEMBLOCK_ALIGNMENT;
use super::flags::MemBlockFlags;
use crate::error::{Error, Result};
use crate::nv::{GPU_ADDR_INVALID, GpuAddr, NvKind, NvMap};
use crate::thunk::device::Device;
use crate::thunk::host_alloc::HostMemory;
use crate::utils::is_aligned;
use std::ptr::{self, NonNull};
use std::sync::Arc;

/// Describes a memory block to be created.
#[derive(Debug)]
pub struct MemBlockMaker<'a> {
    device: &'a Arc<Device>,
    size: u32,
    flags: MemBlockFlags,
    storage: Option<NonNull<u8>>,
}

impl<'a> MemBlockMaker<'a> {
    #[must_use]
    pub fn new(device: &'a Arc<Device>, size: u32) -> Self {
        Self {
            device,
            size,
            flags: MemBlockFlags::default(),
            storage: None,
        }
    }

    #[must_use]
    pub const fn with_flags(mut self, flags: MemBlockFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Use caller-provided memory instead of allocating it.
    ///
    /// # Safety
    /// `storage` must point to at least `size` writable bytes that outlive the
    /// created block. The block never frees it.
    #[must_use]
    pub const unsafe fn with_storage(mut self, storage: NonNull<u8>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Creates the memory block.
    ///
    /// On failure everything acquired so far is released, the error is reported
    /// to the device's error sink and returned.
    ///
    /// # Errors
    /// - [`Error::MisalignedSize`] / [`Error::MisalignedData`] in debug builds when
    ///   the size or storage violate [`MEMBLOCK_ALIGNMENT`].
    /// - [`Error::NotImplemented`] for image memory blocks.
    /// - [`Error::OutOfMemory`] if host storage could not be allocated.
    /// - [`Error::Fail`] if any driver call fails.
    pub fn create(self) -> Result<MemBlock> {
        const CONTEXT: &str = "MemBlockMaker::create";

        if let Err(err) = self.check_alignment() {
            self.device.raise_error(CONTEXT, &err);
            return Err(err);
        }

        let mut block = MemBlock::new(Arc::clone(self.device), self.size);
        if let Err(err) = block.initialize(self.flags, self.storage) {
            block.release();
            self.device.raise_error(CONTEXT, &err);
            return Err(err);
        }
        Ok(block)
    }

    fn check_alignment(&self) -> Result<()> {
        if !cfg!(debug_assertions) {
            return Ok(());
        }
        let align = u64::from(MEMBLOCK_ALIGNMENT);
        if !is_aligned(u64::from(self.size), align) {
            return Err(Error::MisalignedSize);
        }
        if let Some(storage) = self.storage {
            if !is_aligned(storage.as_ptr() as u64, align) {
                return Err(Error::MisalignedData);
            }
        }
        Ok(())
    }
}

/// Host memory that is simultaneously visible to the CPU and mapped into the
/// GPU address space.
///
/// Dropping the block unmaps it, returns its code segment range (if any),
/// closes the driver object and frees owned storage, in that order.
#[derive(Debug)]
pub struct MemBlock {
    device: Arc<Device>,
    flags: MemBlockFlags,
    size: u32,

    owned_mem: Option<HostMemory>,
    cpu_addr: Option<NonNull<u8>>,
    map_obj: NvMap,
    gpu_addr_pitch: GpuAddr,
    code_seg_offset: Option<u32>,
}

// The raw storage pointer is only handed out, never dereferenced by the block.
unsafe impl Send for MemBlock {}
unsafe impl Sync for MemBlock {}

impl MemBlock {
    fn new(device: Arc<Device>, size: u32) -> Self {
        Self {
            device,
            flags: MemBlockFlags::empty(),
            size,
            owned_mem: None,
            cpu_addr: None,
            map_obj: NvMap::new(),
            gpu_addr_pitch: GPU_ADDR_INVALID,
            code_seg_offset: None,
        }
    }

    fn initialize(&mut self, flags: MemBlockFlags, storage: Option<NonNull<u8>>) -> Result<()> {
        let flags = flags.normalize();
        if flags.is_image() {
            return Err(Error::NotImplemented);
        }
        self.flags = flags;

        let device = Arc::clone(&self.device);

        let storage = match storage {
            Some(storage) => storage,
            None => {
                let mem = HostMemory::alloc(
                    device.host_allocator(),
                    self.size as usize,
                    MEMBLOCK_ALIGNMENT as usize,
                )
                .ok_or(Error::OutOfMemory)?;
                let ptr = mem.as_ptr();
                self.owned_mem = Some(mem);
                ptr
            }
        };
        self.cpu_addr = Some(storage);

        let big_page_size = device.gpu_info().big_page_size;
        let handle = self
            .map_obj
            .create(
                device.map_driver(),
                storage,
                self.size,
                big_page_size,
                NvKind::Pitch,
                flags.is_cpu_cached(),
            )
            .map_err(|e| {
                log::debug!("MemBlock: nvmap registration failed: {e}");
                Error::Fail
            })?;

        if flags.is_gpu_no_access() {
            return Ok(());
        }

        let addr_space = device.addr_space();

        if flags.is_code() {
            let code_seg = device.code_segment();
            let size = u64::from(self.size);

            self.gpu_addr_pitch = code_seg.alloc_space(size).ok_or(Error::Fail)?;

            if let Err(e) = addr_space.map_fixed(
                handle,
                flags.is_gpu_cached(),
                NvKind::Pitch,
                self.gpu_addr_pitch,
            ) {
                log::debug!(
                    "MemBlock: fixed mapping at 0x{:x} failed: {e}",
                    self.gpu_addr_pitch
                );
                code_seg.free_space(self.gpu_addr_pitch, size);
                self.gpu_addr_pitch = GPU_ADDR_INVALID;
                return Err(Error::Fail);
            }

            self.code_seg_offset = code_seg.calc_offset(self.gpu_addr_pitch);
        } else {
            self.gpu_addr_pitch = addr_space
                .map(handle, flags.is_gpu_cached(), NvKind::Pitch)
                .map_err(|e| {
                    log::debug!("MemBlock: address space mapping failed: {e}");
                    Error::Fail
                })?;
        }

        // TODO: swizzled/compressed mappings once image memory blocks are supported.
        Ok(())
    }

    /// Tears down whatever has been acquired so far. Safe to call repeatedly.
    fn release(&mut self) {
        let device = &self.device;

        if self.gpu_addr_pitch != GPU_ADDR_INVALID {
            device.addr_space().unmap(self.gpu_addr_pitch);
            if self.flags.is_code() {
                device
                    .code_segment()
                    .free_space(self.gpu_addr_pitch, u64::from(self.size));
            }
            self.gpu_addr_pitch = GPU_ADDR_INVALID;
            self.code_seg_offset = None;
        }

        self.map_obj.close(device.map_driver());

        if let Some(mem) = self.owned_mem.take() {
            mem.free(device.host_allocator());
        }
        self.cpu_addr = None;
    }

    /// Destroys the block. Equivalent to dropping it.
    pub fn destroy(self) {
        drop(self);
    }

    #[must_use]
    pub fn cpu_addr(&self) -> *mut u8 {
        self.cpu_addr.map_or(ptr::null_mut(), NonNull::as_ptr)
    }

    /// GPU address of the pitch mapping, or [`GPU_ADDR_INVALID`] for GPU no-access blocks.
    #[must_use]
    pub const fn gpu_addr(&self) -> GpuAddr {
        self.gpu_addr_pitch
    }

    #[must_use]
    pub const fn size(&self) -> u32 {
        self.size
    }

    #[must_use]
    pub const fn flags(&self) -> MemBlockFlags {
        self.flags
    }

    /// Offset of the block within the device's code segment. `None` unless the block is code.
    #[must_use]
    pub const fn code_seg_offset(&self) -> Option<u32> {
        self.code_seg_offset
    }

    #[must_use]
    pub fn owns_storage(&self) -> bool {
        self.owned_mem.is_some()
    }

    /// # Errors
    /// Returns [`Error::NotImplemented`] for CPU-cached blocks.
    pub fn flush_cpu_cache(&self, _offset: u32, _size: u32) -> Result<()> {
        if !self.flags.is_cpu_cached() {
            return Ok(());
        }
        Err(Error::NotImplemented)
    }

    /// # Errors
    /// Returns [`Error::NotImplemented`] for CPU-cached blocks.
    pub fn invalidate_cpu_cache(&self, _offset: u32, _size: u32) -> Result<()> {
        if !self.flags.is_cpu_cached() {
            return Ok(());
        }
        Err(Error::NotImplemented)
    }
}

impl Drop for MemBlock {
    fn drop(&mut self) {
        self.release();
    }
}
