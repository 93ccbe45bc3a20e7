use super::NvResult;

/// Hardware error notifier written by the GPU when a channel faults.
#[repr(C)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct NvNotification {
    pub timestamp: u64,
    pub info32: u32,
    pub info16: u16,
    pub status: u16,
}

/// Extended error record for a faulted channel.
///
/// The meaning of `info` depends on `type_`; see [`crate::thunk::queue::QueueFault`]
/// for the decoded form.
#[repr(C)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct NvErrorInfo {
    pub type_: u32,
    pub info: [u32; 31],
}

const _: () = assert!(std::mem::size_of::<NvNotification>() == 16);
const _: () = assert!(std::mem::size_of::<NvErrorInfo>() == 128);

/// The driver-level command channel backing a queue.
pub trait GpuChannel: Send + Sync {
    fn error_notification(&self) -> NvResult<NvNotification>;

    fn error_info(&self) -> NvResult<NvErrorInfo>;
}
