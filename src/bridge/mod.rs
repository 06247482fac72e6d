//! Frame bridges between the native engine and the managed runtime
//!
//! Two parallel bridges, one per media type, each registering as the engine's
//! sole observer for that type and converting every native callback into one
//! synchronous managed invocation: ensure the calling thread is attached,
//! marshal the frame payload into transferable containers, construct the
//! managed frame object, invoke the consumer, copy mutations back into the
//! native buffers under the original geometry, and hand the keep/drop flag
//! back to the engine.

pub mod audio;
pub mod handles;
pub mod marshal;
pub mod video;

pub use audio::AudioFrameBridge;
pub use video::VideoFrameBridge;

use crate::runtime::RuntimeError;

/// Errors local to one bridge invocation (or to construction, the only place
/// they are allowed to be fatal). None of these ever cross the engine
/// boundary: frame events degrade to "drop" and property queries to neutral
/// defaults.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("managed runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("callback table has been invalidated")]
    Invalidated,

    #[error("unsupported pixel format code: {0}")]
    UnsupportedFormat(i32),

    #[error("invalid frame geometry: {0}")]
    InvalidGeometry(&'static str),

    #[error("frame buffer is {actual} bytes but geometry implies {expected}")]
    GeometryMismatch { expected: usize, actual: usize },
}

pub type BridgeResult<T> = Result<T, BridgeError>;
