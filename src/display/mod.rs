//! Local preview: grid compositing plus an optional SDL2 window

pub mod compositor;
#[cfg(feature = "display")]
pub mod preview;

pub use compositor::{compose_grid, CompositeImage};
#[cfg(feature = "display")]
pub use preview::PreviewWindow;
