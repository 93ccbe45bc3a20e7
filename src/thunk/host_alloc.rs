use std::ptr::{self, NonNull};

/// Source of host memory for blocks that do not bring their own storage.
pub trait HostAllocator: Send + Sync {
    fn alloc(&self, size: usize, align: usize) -> Option<NonNull<u8>>;

    /// # Safety
    /// `ptr` must come from [`HostAllocator::alloc`] on the same allocator and
    /// must not be used afterwards.
    unsafe fn free(&self, ptr: NonNull<u8>);
}

/// Default allocator backed by `posix_memalign`/`free`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LibcAllocator;

impl HostAllocator for LibcAllocator {
    fn alloc(&self, size: usize, align: usize) -> Option<NonNull<u8>> {
        let align = align.max(std::mem::size_of::<usize>());
        let mut out: *mut libc::c_void = ptr::null_mut();
        let ret = unsafe { libc::posix_memalign(&raw mut out, align, size) };
        if ret != 0 {
            return None;
        }
        NonNull::new(out.cast::<u8>())
    }

    unsafe fn free(&self, ptr: NonNull<u8>) {
        unsafe { libc::free(ptr.as_ptr().cast()) };
    }
}

/// Host memory owned by a memory block.
#[derive(Debug)]
pub(crate) struct HostMemory {
    ptr: NonNull<u8>,
}

impl HostMemory {
    pub(crate) fn alloc(allocator: &dyn HostAllocator, size: usize, align: usize) -> Option<Self> {
        allocator.alloc(size, align).map(|ptr| Self { ptr })
    }

    pub(crate) const fn as_ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    pub(crate) fn free(self, allocator: &dyn HostAllocator) {
        unsafe { allocator.free(self.ptr) };
    }
}
