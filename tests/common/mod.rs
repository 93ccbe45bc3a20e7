#![allow(dead_code)]

use nvgpu_rs::Error;
use nvgpu_rs::nv::{
    AddressSpace, GpuAddr, GpuChannel, NvError, NvErrorInfo, NvKind, NvMapDriver, NvMapHandle,
    NvNotification, NvResult,
};
use nvgpu_rs::thunk::{Device, DeviceMaker, ErrorSink, HostAllocator, LibcAllocator};
use std::collections::{HashMap, HashSet};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const CODE_SEG_BASE: GpuAddr = 0x1_0000_0000;
pub const CODE_SEG_SIZE: u64 = 0x10_0000;
const AUTO_MAP_BASE: GpuAddr = 0x4_0000_0000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create { size: u32, align: u32, cpu_cached: bool },
    Close(NvMapHandle),
    Map { handle: NvMapHandle, cached: bool },
    MapFixed { handle: NvMapHandle, addr: GpuAddr },
    Unmap(GpuAddr),
}

/// In-memory nvmap + address space that records every call.
#[derive(Debug, Default)]
pub struct MockDriver {
    pub fail_create: AtomicBool,
    pub fail_map: AtomicBool,
    pub fail_map_fixed: AtomicBool,

    next_handle: AtomicU32,
    open: Mutex<HashMap<NvMapHandle, u32>>,
    mapped: Mutex<HashSet<GpuAddr>>,
    next_auto: Mutex<GpuAddr>,
    calls: Mutex<Vec<Call>>,
}

impl MockDriver {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn open_handles(&self) -> usize {
        self.open.lock().unwrap().len()
    }

    pub fn mapped_count(&self) -> usize {
        self.mapped.lock().unwrap().len()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl NvMapDriver for MockDriver {
    fn create(
        &self,
        _storage: NonNull<u8>,
        size: u32,
        align: u32,
        kind: NvKind,
        cpu_cached: bool,
    ) -> NvResult<NvMapHandle> {
        assert_eq!(kind, NvKind::Pitch);
        self.record(Call::Create {
            size,
            align,
            cpu_cached,
        });
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(NvError::new(0x3));
        }
        let handle = NvMapHandle(self.next_handle.fetch_add(1, Ordering::SeqCst) + 1);
        self.open.lock().unwrap().insert(handle, size);
        Ok(handle)
    }

    fn close(&self, handle: NvMapHandle) {
        self.record(Call::Close(handle));
        assert!(
            self.open.lock().unwrap().remove(&handle).is_some(),
            "closed handle {handle:?} twice"
        );
    }
}

impl AddressSpace for MockDriver {
    fn map(&self, handle: NvMapHandle, cached: bool, _kind: NvKind) -> NvResult<GpuAddr> {
        self.record(Call::Map { handle, cached });
        if self.fail_map.load(Ordering::SeqCst) {
            return Err(NvError::new(0x5));
        }
        let size = *self.open.lock().unwrap().get(&handle).expect("unknown handle");
        let mut next = self.next_auto.lock().unwrap();
        let addr = AUTO_MAP_BASE + *next;
        *next += u64::from(size);
        self.mapped.lock().unwrap().insert(addr);
        Ok(addr)
    }

    fn map_fixed(
        &self,
        handle: NvMapHandle,
        _cached: bool,
        _kind: NvKind,
        addr: GpuAddr,
    ) -> NvResult<()> {
        self.record(Call::MapFixed { handle, addr });
        if self.fail_map_fixed.load(Ordering::SeqCst) {
            return Err(NvError::new(0x5));
        }
        assert!(self.open.lock().unwrap().contains_key(&handle));
        assert!(self.mapped.lock().unwrap().insert(addr), "address mapped twice");
        Ok(())
    }

    fn unmap(&self, addr: GpuAddr) {
        self.record(Call::Unmap(addr));
        assert!(self.mapped.lock().unwrap().remove(&addr), "unmapped unknown address");
    }
}

/// Host allocator that counts live allocations and can be told to fail.
#[derive(Debug, Default)]
pub struct CountingAllocator {
    pub fail: AtomicBool,
    pub allocs: AtomicUsize,
    pub frees: AtomicUsize,
}

impl CountingAllocator {
    pub fn live(&self) -> usize {
        self.allocs.load(Ordering::SeqCst) - self.frees.load(Ordering::SeqCst)
    }
}

impl HostAllocator for CountingAllocator {
    fn alloc(&self, size: usize, align: usize) -> Option<NonNull<u8>> {
        if self.fail.load(Ordering::SeqCst) {
            return None;
        }
        let ptr = LibcAllocator.alloc(size, align)?;
        self.allocs.fetch_add(1, Ordering::SeqCst);
        Some(ptr)
    }

    unsafe fn free(&self, ptr: NonNull<u8>) {
        self.frees.fetch_add(1, Ordering::SeqCst);
        unsafe { LibcAllocator.free(ptr) };
    }
}

#[derive(Debug, Default)]
pub struct RecordingSink {
    pub errors: Mutex<Vec<(String, Error)>>,
}

impl RecordingSink {
    pub fn errors(&self) -> Vec<(String, Error)> {
        self.errors.lock().unwrap().clone()
    }
}

impl ErrorSink for RecordingSink {
    fn raise_error(&self, _device: &Device, context: &str, error: &Error) {
        self.errors
            .lock()
            .unwrap()
            .push((context.to_string(), error.clone()));
    }
}

pub struct Harness {
    pub driver: Arc<MockDriver>,
    pub allocator: Arc<CountingAllocator>,
    pub sink: Arc<RecordingSink>,
    pub device: Arc<Device>,
}

pub fn harness() -> Harness {
    let driver = Arc::new(MockDriver::default());
    let allocator = Arc::new(CountingAllocator::default());
    let sink = Arc::new(RecordingSink::default());
    let device = DeviceMaker::new(driver.clone(), driver.clone())
        .with_code_segment(CODE_SEG_BASE, CODE_SEG_SIZE)
        .with_host_allocator(allocator.clone())
        .with_error_sink(sink.clone())
        .create();
    Harness {
        driver,
        allocator,
        sink,
        device,
    }
}

#[derive(Debug, Default)]
struct ChannelState {
    notification: Option<NvNotification>,
    error_info: Option<NvErrorInfo>,
    polls: usize,
}

/// A GPU channel whose notifier is controlled by the test.
#[derive(Debug, Clone, Default)]
pub struct MockChannel {
    state: Arc<Mutex<ChannelState>>,
}

impl MockChannel {
    pub fn raise(&self, notification: NvNotification, error_info: Option<NvErrorInfo>) {
        let mut state = self.state.lock().unwrap();
        state.notification = Some(notification);
        state.error_info = error_info;
    }

    pub fn polls(&self) -> usize {
        self.state.lock().unwrap().polls
    }
}

impl GpuChannel for MockChannel {
    fn error_notification(&self) -> NvResult<NvNotification> {
        let mut state = self.state.lock().unwrap();
        state.polls += 1;
        Ok(state.notification.unwrap_or_default())
    }

    fn error_info(&self) -> NvResult<NvErrorInfo> {
        self.state
            .lock()
            .unwrap()
            .error_info
            .ok_or(NvError::new(0x1))
    }
}
