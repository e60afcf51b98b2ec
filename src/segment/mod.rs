//! Stream segmentation and recognition worker.
//!
//! The reader side slices decoder bytes into exact fixed-size segments
//! (`buffer`); the worker side turns segments into transcript lines
//! (`processor`). The two halves share nothing but a bounded queue.

pub mod buffer;
pub mod processor;
pub mod types;

pub use buffer::{SegmentBuffer, SegmentBufferConfig};
pub use processor::{ProcessorConfig, SegmentProcessor, bytes_to_samples, rms};
pub use types::{Segment, TranscriptLine};
