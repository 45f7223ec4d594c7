//! Log processing for klances
//!
//! This crate provides bounded per-pod log buffers and the tailer that keeps
//! one log stream open per watched pod.

mod backoff;
mod buffer;
mod store;
mod stream;
mod tailer;

pub use backoff::{BackoffConfig, StreamBackoff};
pub use buffer::LogBuffer;
pub use store::{LogStore, StreamFault};
pub use tailer::{LogTailer, TailerConfig, WatchState};

// Re-export types used in our public API
pub use klances_types::{LogLine, PodKey};
