pub mod device;
pub mod host_alloc;
pub mod memory;
pub mod queue;
pub mod semaphore;

pub use device::{Device, DeviceMaker, ErrorSink, GpuInfo, LogErrorSink, MAX_QUEUES};
pub use host_alloc::{HostAllocator, LibcAllocator};
pub use memory::{CodeSegment, MEMBLOCK_ALIGNMENT, MemAccess, MemBlock, MemBlockFlags, MemBlockMaker};
pub use queue::{AccessType, Queue, QueueFault, QueueState};
pub use semaphore::{Fence, Semaphore};
