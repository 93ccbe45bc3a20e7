use crate::error::{Error, Result};
use crate::nv::{AddressSpace, GpuAddr, GpuChannel, NvMapDriver};
use crate::thunk::host_alloc::{HostAllocator, LibcAllocator};
use crate::thunk::memory::CodeSegment;
use crate::thunk::queue::Queue;
use crate::thunk::semaphore::{Fence, Semaphore, SemaphoreTable};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Number of queue slots (and completion semaphores) per device.
pub const MAX_QUEUES: usize = 64;

const DEFAULT_BIG_PAGE_SIZE: u32 = 0x2_0000;
const DEFAULT_CODE_SEG_BASE: GpuAddr = 0x1_0000_0000;
const DEFAULT_CODE_SEG_SIZE: u64 = 4 * 1024 * 1024 * 1024;

/// Hardware properties reported by the GPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuInfo {
    pub big_page_size: u32,
}

impl Default for GpuInfo {
    fn default() -> Self {
        Self {
            big_page_size: DEFAULT_BIG_PAGE_SIZE,
        }
    }
}

/// Receives every failure surfaced to a caller of the public API.
pub trait ErrorSink: Send + Sync {
    fn raise_error(&self, device: &Device, context: &str, error: &Error);
}

/// Default sink: logs the failure and carries on.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogErrorSink;

impl ErrorSink for LogErrorSink {
    fn raise_error(&self, _device: &Device, context: &str, error: &Error) {
        log::error!("{context}: {error}");
    }
}

type QueueTable = [Option<Arc<Queue>>; MAX_QUEUES];

/// Builds a [`Device`].
pub struct DeviceMaker {
    map_driver: Arc<dyn NvMapDriver>,
    addr_space: Arc<dyn AddressSpace>,
    gpu_info: GpuInfo,
    code_seg_base: GpuAddr,
    code_seg_size: u64,
    host_allocator: Arc<dyn HostAllocator>,
    error_sink: Arc<dyn ErrorSink>,
}

impl DeviceMaker {
    pub fn new(map_driver: Arc<dyn NvMapDriver>, addr_space: Arc<dyn AddressSpace>) -> Self {
        Self {
            map_driver,
            addr_space,
            gpu_info: GpuInfo::default(),
            code_seg_base: DEFAULT_CODE_SEG_BASE,
            code_seg_size: DEFAULT_CODE_SEG_SIZE,
            host_allocator: Arc::new(LibcAllocator),
            error_sink: Arc::new(LogErrorSink),
        }
    }

    #[must_use]
    pub const fn with_gpu_info(mut self, gpu_info: GpuInfo) -> Self {
        self.gpu_info = gpu_info;
        self
    }

    #[must_use]
    pub const fn with_code_segment(mut self, base: GpuAddr, size: u64) -> Self {
        self.code_seg_base = base;
        self.code_seg_size = size;
        self
    }

    #[must_use]
    pub fn with_host_allocator(mut self, allocator: Arc<dyn HostAllocator>) -> Self {
        self.host_allocator = allocator;
        self
    }

    #[must_use]
    pub fn with_error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.error_sink = sink;
        self
    }

    #[must_use]
    pub fn create(self) -> Arc<Device> {
        log::debug!(
            "Device: code segment at 0x{:x} (0x{:x} bytes)",
            self.code_seg_base,
            self.code_seg_size
        );
        Arc::new(Device {
            map_driver: self.map_driver,
            addr_space: self.addr_space,
            gpu_info: self.gpu_info,
            code_seg: CodeSegment::new(self.code_seg_base, self.code_seg_size),
            host_allocator: self.host_allocator,
            error_sink: self.error_sink,
            semaphores: SemaphoreTable::new(MAX_QUEUES),
            queue_table: Mutex::new(std::array::from_fn(|_| None)),
        })
    }
}

/// Device-wide context shared by memory blocks and queues.
pub struct Device {
    map_driver: Arc<dyn NvMapDriver>,
    addr_space: Arc<dyn AddressSpace>,
    gpu_info: GpuInfo,
    code_seg: CodeSegment,
    host_allocator: Arc<dyn HostAllocator>,
    error_sink: Arc<dyn ErrorSink>,
    semaphores: SemaphoreTable,
    queue_table: Mutex<QueueTable>,
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("gpu_info", &self.gpu_info)
            .field("code_seg", &self.code_seg)
            .finish_non_exhaustive()
    }
}

impl Device {
    #[must_use]
    pub const fn gpu_info(&self) -> &GpuInfo {
        &self.gpu_info
    }

    #[must_use]
    pub fn map_driver(&self) -> &dyn NvMapDriver {
        self.map_driver.as_ref()
    }

    #[must_use]
    pub fn addr_space(&self) -> &dyn AddressSpace {
        self.addr_space.as_ref()
    }

    #[must_use]
    pub const fn code_segment(&self) -> &CodeSegment {
        &self.code_seg
    }

    #[must_use]
    pub fn host_allocator(&self) -> &dyn HostAllocator {
        self.host_allocator.as_ref()
    }

    pub fn raise_error(&self, context: &str, error: &Error) {
        self.error_sink.raise_error(self, context, error);
    }

    /// CPU-visible completion semaphore of queue slot `id`.
    #[must_use]
    pub fn semaphore_cpu(&self, id: u32) -> &Semaphore {
        self.semaphores.cpu(id)
    }

    /// Last sequence number scheduled on queue slot `id`.
    #[must_use]
    pub fn semaphore_value(&self, id: u32) -> u32 {
        self.semaphores.value(id)
    }

    pub(crate) fn next_semaphore_value(&self, id: u32) -> u32 {
        self.semaphores.next_value(id)
    }

    fn lock_queues(&self) -> MutexGuard<'_, QueueTable> {
        self.queue_table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // ===========================================================================================
    // Queue Table
    // ===========================================================================================

    /// Creates a queue on the lowest free slot.
    ///
    /// # Errors
    /// Returns [`Error::Fail`] if every slot is taken.
    pub fn create_queue(&self, channel: Box<dyn GpuChannel>) -> Result<Arc<Queue>> {
        let mut table = self.lock_queues();
        let Some(slot) = table.iter().position(Option::is_none) else {
            drop(table);
            let err = Error::Fail;
            self.raise_error("Device::create_queue", &err);
            return Err(err);
        };

        #[allow(clippy::cast_possible_truncation)]
        let id = slot as u32;
        self.semaphores.reset(id);

        let queue = Arc::new(Queue::new(id, channel));
        table[slot] = Some(Arc::clone(&queue));
        log::debug!("Device: created queue {id}");
        Ok(queue)
    }

    /// Removes a queue from the table. Unknown ids are ignored.
    pub fn destroy_queue(&self, id: u32) {
        let removed = self
            .lock_queues()
            .get_mut(id as usize)
            .and_then(Option::take);
        if removed.is_some() {
            log::debug!("Device: destroyed queue {id}");
        }
    }

    /// Looks up a live queue by slot.
    #[must_use]
    pub fn queue(&self, id: u32) -> Option<Arc<Queue>> {
        self.lock_queues().get(id as usize).cloned().flatten()
    }

    /// Polls every live queue for hardware faults while holding the queue table lock.
    /// Returns the number of queues whose notifier reported a fault on this sweep.
    pub fn check_queue_errors(&self) -> usize {
        let table = self.lock_queues();
        table
            .iter()
            .flatten()
            .filter(|queue| queue.check_error(self))
            .count()
    }

    // ===========================================================================================
    // Fences
    // ===========================================================================================

    /// Waits until `fence` is reached or `timeout` elapses (`None` waits forever).
    ///
    /// Queue faults are swept between polls; a faulted queue releases its waiters.
    ///
    /// # Errors
    /// Returns [`Error::Timeout`] if the deadline passes first, or
    /// [`Error::BadInput`] if the fence does not name a queue slot.
    pub fn wait_fence(&self, fence: Fence, timeout: Option<Duration>) -> Result<()> {
        if fence.queue_id as usize >= MAX_QUEUES {
            return Err(Error::BadInput(format!(
                "fence names queue slot {}",
                fence.queue_id
            )));
        }
        let semaphore = self.semaphore_cpu(fence.queue_id);
        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            if semaphore.is_reached(fence.value) {
                return Ok(());
            }

            self.check_queue_errors();
            if semaphore.is_reached(fence.value) {
                return Ok(());
            }

            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(Error::Timeout);
            }
            std::thread::sleep(Duration::from_micros(50));
        }
    }
}
