//! Interfaces to the GPU driver transport.
//!
//! Nothing in this module talks to the kernel directly. The runtime objects in
//! [`crate::thunk`] consume these traits, and an embedder plugs in the actual
//! ioctl-backed implementation (or a mock, in tests).

pub mod address_space;
pub mod channel;
pub mod map;

use thiserror::Error;

pub use address_space::AddressSpace;
pub use channel::{GpuChannel, NvErrorInfo, NvNotification};
pub use map::{NvMap, NvMapDriver, NvMapHandle};

/// A GPU virtual address.
pub type GpuAddr = u64;

/// Sentinel meaning "not mapped into the GPU address space".
pub const GPU_ADDR_INVALID: GpuAddr = !0;

/// Page kind passed to the driver when registering or mapping memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NvKind {
    Pitch = 0x00,
}

/// Raw status code returned by a failed driver call.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("NV Driver Error: 0x{code:x}")]
pub struct NvError {
    pub code: u32,
}

impl NvError {
    #[must_use]
    pub const fn new(code: u32) -> Self {
        Self { code }
    }
}

pub type NvResult<T> = Result<T, NvError>;
