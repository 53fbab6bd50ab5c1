//! Frame codec module
//!
//! JPEG is the only wire codec; the trait seam exists for tests and
//! for swapping in a hardware encoder later.

pub mod jpeg;

pub use jpeg::{FrameEncoder, JpegFrameEncoder};
