//! Network subsystem for the TCP frame stream

pub mod client;
pub mod queue;

pub use client::{LinkState, StreamClient, StreamClientStats};
pub use queue::{SharedTransmitQueue, TransmitQueue};
