pub mod fault;

use crate::error::{Error, Result};
use crate::nv::GpuChannel;
use crate::thunk::device::Device;
use crate::thunk::semaphore::Fence;
use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::{Mutex, PoisonError};

pub use fault::{AccessType, QueueFault};

/// Lifecycle of a queue. `Error` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    Active,
    Error,
}

#[derive(Debug)]
struct QueueStatus {
    state: QueueState,
    last_fault: Option<QueueFault>,
}

/// A command queue bound to a GPU channel and a completion semaphore slot.
pub struct Queue {
    id: u32,
    channel: Box<dyn GpuChannel>,
    status: Mutex<QueueStatus>,
}

impl fmt::Debug for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("id", &self.id)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl Queue {
    pub(crate) fn new(id: u32, channel: Box<dyn GpuChannel>) -> Self {
        Self {
            id,
            channel,
            status: Mutex::new(QueueStatus {
                state: QueueState::Active,
                last_fault: None,
            }),
        }
    }

    #[must_use]
    pub const fn id(&self) -> u32 {
        self.id
    }

    #[must_use]
    pub fn state(&self) -> QueueState {
        self.status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .state
    }

    #[must_use]
    pub fn is_in_error_state(&self) -> bool {
        self.state() == QueueState::Error
    }

    /// The decoded fault that put the queue into the error state, if the driver provided one.
    #[must_use]
    pub fn last_fault(&self) -> Option<QueueFault> {
        self.status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last_fault
    }

    /// Schedules the next sequence number on this queue's semaphore.
    ///
    /// # Errors
    /// Returns [`Error::Fail`] once the queue has entered the error state.
    pub fn signal_fence(&self, device: &Device) -> Result<Fence> {
        if self.is_in_error_state() {
            let err = Error::Fail;
            log::error!("Queue ({}): attempted to signal a fence in error state", self.id);
            device.raise_error("Queue::signal_fence", &err);
            return Err(err);
        }
        Ok(Fence {
            queue_id: self.id,
            value: device.next_semaphore_value(self.id),
        })
    }

    /// Polls the channel's error notifier. Returns true if the queue has faulted.
    ///
    /// The first detected fault is logged, moves the queue to [`QueueState::Error`]
    /// and publishes the latest scheduled sequence number to the queue's
    /// semaphore so that waiters on this queue are released.
    pub fn check_error(&self, device: &Device) -> bool {
        let notif = match self.channel.error_notification() {
            Ok(notif) if notif.status != 0 => notif,
            _ => return false,
        };

        let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);

        if status.state == QueueState::Active {
            log::warn!("Queue ({}) entered error state", self.id);
            log::warn!("  timestamp: {}", notif.timestamp);
            log::warn!("  info32: {}", notif.info32);
            log::warn!("  info16: {}", notif.info16);
            log::warn!("  status: {}", notif.status);

            match self.channel.error_info() {
                Ok(error) => {
                    let fault = QueueFault::decode(&error);
                    log::warn!("  --");
                    log::warn!("  {fault}");
                    status.last_fault = Some(fault);
                }
                Err(e) => log::warn!("  (Failed to retrieve error info: {e})"),
            }

            status.state = QueueState::Error;
        }

        device
            .semaphore_cpu(self.id)
            .sequence
            .store(device.semaphore_value(self.id), Ordering::Release);
        true
    }
}
