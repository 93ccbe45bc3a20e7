use crate::nv::NvErrorInfo;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessType {
    Read,
    Write,
}

/// A decoded channel error record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueFault {
    /// The driver had nothing beyond the notifier.
    NoInfo,
    PageFault {
        info: u32,
        address: u64,
        access: AccessType,
    },
    MethodError {
        irq: u32,
        subchannel: u32,
        method: u32,
        data: u32,
        aux_lo: u32,
        aux_hi: u32,
    },
    CommandListRejected,
    Timeout,
    Unknown(u32),
}

impl QueueFault {
    const TYPE_NO_INFO: u32 = 0;
    const TYPE_PAGE_FAULT: u32 = 1;
    const TYPE_METHOD_ERROR: u32 = 2;
    const TYPE_CMDLIST_REJECTED: u32 = 3;
    const TYPE_TIMEOUT: u32 = 4;

    const ACCESS_WRITE: u32 = 2;

    #[must_use]
    pub const fn decode(error: &NvErrorInfo) -> Self {
        let info = &error.info;
        match error.type_ {
            Self::TYPE_NO_INFO => Self::NoInfo,
            Self::TYPE_PAGE_FAULT => Self::PageFault {
                info: info[0],
                address: ((info[1] as u64) << 32) | info[2] as u64,
                access: if info[3] == Self::ACCESS_WRITE {
                    AccessType::Write
                } else {
                    AccessType::Read
                },
            },
            // info[1] packs the method byte offset (low half) with unidentified data (high half).
            Self::TYPE_METHOD_ERROR => Self::MethodError {
                irq: info[0],
                subchannel: info[4],
                method: (info[1] & 0xFFFF) / 4,
                data: info[3],
                aux_lo: info[2],
                aux_hi: info[1] >> 16,
            },
            Self::TYPE_CMDLIST_REJECTED => Self::CommandListRejected,
            Self::TYPE_TIMEOUT => Self::Timeout,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for AccessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => f.write_str("Read"),
            Self::Write => f.write_str("Write"),
        }
    }
}

impl fmt::Display for QueueFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoInfo => write!(f, "No error information available"),
            Self::PageFault {
                info,
                address,
                access,
            } => write!(
                f,
                "GPU page fault (info 0x{info:08x}) at 0x{address:010x}, access type: {access}"
            ),
            Self::MethodError {
                irq,
                subchannel,
                method,
                data,
                aux_lo,
                aux_hi,
            } => write!(
                f,
                "GPU method error (irq 0x{irq:08x}) [{subchannel:04x}:{method:03x}] = 0x{data:08x}; unknown data: 0x{aux_lo:08x}; 0x{aux_hi:04x}"
            ),
            Self::CommandListRejected => write!(f, "GPU rejected command list"),
            Self::Timeout => write!(f, "GPU timeout"),
            Self::Unknown(ty) => write!(f, "Unknown ({ty})"),
        }
    }
}
