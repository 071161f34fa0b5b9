//! Audio buffering between acquisition and recognition.

pub mod ring_buffer;

pub use ring_buffer::SampleRingBuffer;
