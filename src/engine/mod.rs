//! Engine-facing data model and contracts
//!
//! Type-safe mirror of the native media engine's frame structures and
//! observer interfaces. Frames are engine-owned and ephemeral: the engine
//! lends them to an observer by `&mut` for the duration of one synchronous
//! callback and reclaims them when it returns.

pub mod frame;
pub mod observer;

pub use frame::{
    AudioFrame, AudioFrameType, PixelFormat, PlanarBuffers, PlanarFormat, TextureFormat,
    VideoFrame, VideoPayload,
};
pub use observer::{
    AudioFrameObserver, AudioParams, MediaEngine, VideoFrameObserver, VideoFrameProcessMode,
    POSITION_POST_CAPTURER, POSITION_PRE_ENCODER, POSITION_PRE_RENDERER,
};
