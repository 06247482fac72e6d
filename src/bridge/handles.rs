//! Callback handle tables
//!
//! Every method handle and the consumer reference are resolved once, at
//! bridge construction, and cached for the bridge's lifetime. Teardown
//! releases the consumer reference and then overwrites every cached handle
//! with the invalid sentinel, so an accidental post-teardown invocation fails
//! fast instead of operating on stale handles.
//!
//! Slots are atomics rather than locked fields: after construction they are
//! only ever read until teardown, and teardown runs strictly after the engine
//! has stopped delivering callbacks, so the frame path stays lock-free.

use super::{BridgeError, BridgeResult};
use crate::runtime::{ClassHandle, MethodHandle, ObjectId, RuntimeEnv, RuntimeResult};
use std::sync::atomic::{AtomicU64, Ordering};

/// Cached method handle with a fail-fast invalid state.
pub(crate) struct MethodSlot(AtomicU64);

impl MethodSlot {
    fn new(handle: MethodHandle) -> Self {
        Self(AtomicU64::new(handle.0))
    }

    pub(crate) fn get(&self) -> BridgeResult<MethodHandle> {
        match self.0.load(Ordering::Acquire) {
            0 => Err(BridgeError::Invalidated),
            raw => Ok(MethodHandle(raw)),
        }
    }

    fn invalidate(&self) {
        self.0.store(MethodHandle::INVALID.0, Ordering::Release);
    }
}

/// Cached global object reference (the consumer instance).
pub(crate) struct RefSlot(AtomicU64);

impl RefSlot {
    fn new(obj: ObjectId) -> Self {
        Self(AtomicU64::new(obj.0))
    }

    pub(crate) fn get(&self) -> BridgeResult<ObjectId> {
        match self.0.load(Ordering::Acquire) {
            0 => Err(BridgeError::Invalidated),
            raw => Ok(ObjectId(raw)),
        }
    }

    /// Clear the slot, returning the previous reference if it was still live.
    fn take(&self) -> Option<ObjectId> {
        match self.0.swap(ObjectId::INVALID.0, Ordering::AcqRel) {
            0 => None,
            raw => Some(ObjectId(raw)),
        }
    }
}

/// Cached class handle.
pub(crate) struct ClassSlot(AtomicU64);

impl ClassSlot {
    fn new(class: ClassHandle) -> Self {
        Self(AtomicU64::new(class.0))
    }

    pub(crate) fn get(&self) -> BridgeResult<ClassHandle> {
        match self.0.load(Ordering::Acquire) {
            0 => Err(BridgeError::Invalidated),
            raw => Ok(ClassHandle(raw)),
        }
    }

    fn invalidate(&self) {
        self.0.store(ClassHandle::INVALID.0, Ordering::Release);
    }
}

/// Managed class names the bridges construct objects from.
pub(crate) const AUDIO_FRAME_CLASS: &str = "media/rawdata/AudioFrame";
pub(crate) const VIDEO_FRAME_CLASS: &str = "media/rawdata/VideoFrame";
pub(crate) const PIXEL_FORMAT_CLASS: &str = "media/rawdata/VideoPixelFormat";

/// Handles for the audio bridge: four frame callbacks plus the managed frame
/// class and its constructor.
pub(crate) struct AudioCallbackTable {
    pub(crate) consumer: RefSlot,
    pub(crate) on_record: MethodSlot,
    pub(crate) on_playback: MethodSlot,
    pub(crate) on_mixed: MethodSlot,
    pub(crate) on_before_mixing: MethodSlot,
    pub(crate) frame_class: ClassSlot,
    pub(crate) frame_ctor: MethodSlot,
}

impl AudioCallbackTable {
    /// Resolve every handle, promoting the consumer to a global reference.
    /// A missing method is fatal: the partially-built table is rolled back
    /// and construction aborts.
    pub(crate) fn resolve<E: RuntimeEnv>(env: &E, consumer: ObjectId) -> BridgeResult<Self> {
        let consumer = env.new_global_ref(consumer)?;
        match Self::resolve_handles(env, consumer) {
            Ok(table) => Ok(table),
            Err(err) => {
                env.delete_global_ref(consumer);
                Err(err.into())
            }
        }
    }

    fn resolve_handles<E: RuntimeEnv>(env: &E, consumer: ObjectId) -> RuntimeResult<Self> {
        let consumer_class = env.object_class(consumer)?;
        let frame_class = env.find_class(AUDIO_FRAME_CLASS)?;
        Ok(Self {
            on_record: MethodSlot::new(env.resolve_method(consumer_class, "onRecordAudioFrame")?),
            on_playback: MethodSlot::new(
                env.resolve_method(consumer_class, "onPlaybackAudioFrame")?,
            ),
            on_mixed: MethodSlot::new(env.resolve_method(consumer_class, "onMixedAudioFrame")?),
            on_before_mixing: MethodSlot::new(
                env.resolve_method(consumer_class, "onPlaybackAudioFrameBeforeMixing")?,
            ),
            frame_ctor: MethodSlot::new(env.resolve_constructor(frame_class)?),
            frame_class: ClassSlot::new(frame_class),
            consumer: RefSlot::new(consumer),
        })
    }

    /// Release the consumer reference, then invalidate every cached handle.
    /// Callers must have unregistered from the engine first.
    pub(crate) fn release<E: RuntimeEnv>(&self, env: &E) {
        if let Some(consumer) = self.consumer.take() {
            env.delete_global_ref(consumer);
        }
        self.invalidate();
    }

    /// Invalidate without touching the runtime. Used when teardown cannot
    /// attach a thread; the consumer reference leaks but no handle stays
    /// usable.
    pub(crate) fn invalidate(&self) {
        self.consumer.take();
        self.on_record.invalidate();
        self.on_playback.invalidate();
        self.on_mixed.invalidate();
        self.on_before_mixing.invalidate();
        self.frame_class.invalidate();
        self.frame_ctor.invalidate();
    }
}

/// Handles for the video bridge: three frame callbacks, four property
/// queries, the frame class with its constructor and readback accessors, and
/// the pixel-format enumeration.
pub(crate) struct VideoCallbackTable {
    pub(crate) consumer: RefSlot,
    pub(crate) on_capture: MethodSlot,
    pub(crate) on_render: MethodSlot,
    pub(crate) on_pre_encode: MethodSlot,
    pub(crate) get_format_preference: MethodSlot,
    pub(crate) get_rotation_applied: MethodSlot,
    pub(crate) get_mirror_applied: MethodSlot,
    pub(crate) get_frame_position: MethodSlot,
    pub(crate) frame_class: ClassSlot,
    pub(crate) frame_ctor: MethodSlot,
    pub(crate) frame_get_type: MethodSlot,
    pub(crate) frame_get_texture_id: MethodSlot,
    pub(crate) frame_get_matrix: MethodSlot,
    pub(crate) format_get_value: MethodSlot,
}

impl VideoCallbackTable {
    pub(crate) fn resolve<E: RuntimeEnv>(env: &E, consumer: ObjectId) -> BridgeResult<Self> {
        let consumer = env.new_global_ref(consumer)?;
        match Self::resolve_handles(env, consumer) {
            Ok(table) => Ok(table),
            Err(err) => {
                env.delete_global_ref(consumer);
                Err(err.into())
            }
        }
    }

    fn resolve_handles<E: RuntimeEnv>(env: &E, consumer: ObjectId) -> RuntimeResult<Self> {
        let consumer_class = env.object_class(consumer)?;
        let frame_class = env.find_class(VIDEO_FRAME_CLASS)?;
        let format_class = env.find_class(PIXEL_FORMAT_CLASS)?;
        Ok(Self {
            on_capture: MethodSlot::new(env.resolve_method(consumer_class, "onCaptureVideoFrame")?),
            on_render: MethodSlot::new(env.resolve_method(consumer_class, "onRenderVideoFrame")?),
            on_pre_encode: MethodSlot::new(
                env.resolve_method(consumer_class, "onPreEncodeVideoFrame")?,
            ),
            get_format_preference: MethodSlot::new(
                env.resolve_method(consumer_class, "getVideoFormatPreference")?,
            ),
            get_rotation_applied: MethodSlot::new(
                env.resolve_method(consumer_class, "getRotationApplied")?,
            ),
            get_mirror_applied: MethodSlot::new(
                env.resolve_method(consumer_class, "getMirrorApplied")?,
            ),
            get_frame_position: MethodSlot::new(
                env.resolve_method(consumer_class, "getObservedFramePosition")?,
            ),
            frame_ctor: MethodSlot::new(env.resolve_constructor(frame_class)?),
            frame_get_type: MethodSlot::new(env.resolve_method(frame_class, "getType")?),
            frame_get_texture_id: MethodSlot::new(env.resolve_method(frame_class, "getTextureId")?),
            frame_get_matrix: MethodSlot::new(
                env.resolve_method(frame_class, "getTextureMatrix")?,
            ),
            format_get_value: MethodSlot::new(env.resolve_method(format_class, "getValue")?),
            frame_class: ClassSlot::new(frame_class),
            consumer: RefSlot::new(consumer),
        })
    }

    pub(crate) fn release<E: RuntimeEnv>(&self, env: &E) {
        if let Some(consumer) = self.consumer.take() {
            env.delete_global_ref(consumer);
        }
        self.invalidate();
    }

    pub(crate) fn invalidate(&self) {
        self.consumer.take();
        self.on_capture.invalidate();
        self.on_render.invalidate();
        self.on_pre_encode.invalidate();
        self.get_format_preference.invalidate();
        self.get_rotation_applied.invalidate();
        self.get_mirror_applied.invalidate();
        self.get_frame_position.invalidate();
        self.frame_class.invalidate();
        self.frame_ctor.invalidate();
        self.frame_get_type.invalidate();
        self.frame_get_texture_id.invalidate();
        self.frame_get_matrix.invalidate();
        self.format_get_value.invalidate();
    }
}
