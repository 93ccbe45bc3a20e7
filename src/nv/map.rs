use super::{NvKind, NvResult};
use std::ptr::NonNull;

/// Opaque driver handle for a registered memory object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NvMapHandle(pub u32);

/// Registration of host memory with the driver's address translation bookkeeping.
pub trait NvMapDriver: Send + Sync {
    /// Register `size` bytes at `storage` as a memory object of the given kind.
    fn create(
        &self,
        storage: NonNull<u8>,
        size: u32,
        align: u32,
        kind: NvKind,
        cpu_cached: bool,
    ) -> NvResult<NvMapHandle>;

    /// Release a memory object previously returned by [`NvMapDriver::create`].
    fn close(&self, handle: NvMapHandle);
}

/// An owned, possibly uninitialized, driver memory object.
///
/// Closing an `NvMap` that was never created is a no-op, so owners can close
/// unconditionally during teardown.
#[derive(Debug, Default)]
pub struct NvMap {
    handle: Option<NvMapHandle>,
}

impl NvMap {
    #[must_use]
    pub const fn new() -> Self {
        Self { handle: None }
    }

    /// Register memory with the driver and return the new handle.
    /// Any previously held handle is closed first.
    pub fn create(
        &mut self,
        driver: &dyn NvMapDriver,
        storage: NonNull<u8>,
        size: u32,
        align: u32,
        kind: NvKind,
        cpu_cached: bool,
    ) -> NvResult<NvMapHandle> {
        self.close(driver);
        let handle = driver.create(storage, size, align, kind, cpu_cached)?;
        self.handle = Some(handle);
        Ok(handle)
    }

    pub fn close(&mut self, driver: &dyn NvMapDriver) {
        if let Some(handle) = self.handle.take() {
            driver.close(handle);
        }
    }

    #[must_use]
    pub const fn handle(&self) -> Option<NvMapHandle> {
        self.handle
    }
}
