#![deny(clippy::all)]

//! Raw frame bridge between a native media engine and a managed runtime
//!
//! The engine produces audio and video frames on its own internal threads
//! and invokes observers synchronously; the application's frame-processing
//! logic lives in a managed runtime with its own object model and
//! thread-registration rules. This crate carries each frame across that
//! boundary and back: it attaches the calling thread for exactly one
//! invocation, marshals the native buffers into transferable containers,
//! constructs the managed frame object, invokes the consumer, and copies
//! in-place mutations back under the original geometry.

// Managed-runtime boundary primitives (handles, invocation, thread binding)
pub mod runtime;

// Engine-facing frame model and observer contracts
pub mod engine;

// The audio and video bridges and their marshaling logic
pub mod bridge;

// Re-export the public surface at the crate root
pub use bridge::{AudioFrameBridge, BridgeError, BridgeResult, VideoFrameBridge};
pub use engine::{
    AudioFrame, AudioFrameObserver, AudioFrameType, AudioParams, MediaEngine, PixelFormat,
    PlanarBuffers, PlanarFormat, TextureFormat, VideoFrame, VideoFrameObserver,
    VideoFrameProcessMode, VideoPayload, POSITION_POST_CAPTURER, POSITION_PRE_ENCODER,
    POSITION_PRE_RENDERER,
};
pub use runtime::{
    ClassHandle, MethodHandle, ObjectId, Runtime, RuntimeEnv, RuntimeError, RuntimeResult,
    ScopedThreadBinding, Value,
};
