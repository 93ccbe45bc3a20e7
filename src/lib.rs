//! GPU-visible memory blocks and queue fault tracking for NVIDIA-style GPU
//! channels.
//!
//! [`nv`] describes the driver transport this crate consumes; [`thunk`] holds
//! the runtime objects built on top of it.

pub mod error;
pub mod nv;
pub mod thunk;
pub mod utils;

pub use error::{Error, Result};
