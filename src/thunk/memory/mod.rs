pub mod aperture;
pub mod block;
pub mod code_segment;
pub mod flags;

/// Memory block sizes and external storage must be aligned to this.
pub const MEMBLOCK_ALIGNMENT: u32 = 0x1000;

pub use block::{MemBlock, MemBlockMaker};
pub use code_segment::CodeSegment;
pub use flags::{MemAccess, MemBlockFlags};
