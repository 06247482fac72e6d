//! Video frame bridge
//!
//! Registers as the engine's sole video observer and marshals each frame
//! event according to its pixel representation: planar frames cross as up to
//! three byte containers copied back per plane after the callback, texture
//! frames cross as a texture id plus a 16-element transform matrix with no
//! plane containers at all.
//!
//! The capture event is special: after the callback returns, the managed
//! frame object's type is inspected, and if the consumer switched it to a
//! texture format the native frame is rewritten to the new representation.
//! This is the only channel through which a callback changes a frame's shape
//! rather than its contents, and it exists on no other event.

use super::handles::{MethodSlot, VideoCallbackTable};
use super::marshal;
use super::{BridgeError, BridgeResult};
use crate::engine::{
    MediaEngine, PixelFormat, TextureFormat, VideoFrame, VideoFrameObserver, VideoPayload,
};
use crate::runtime::{ObjectId, Runtime, RuntimeEnv, ScopedThreadBinding, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Bridge from the engine's video observer contract to a managed consumer.
pub struct VideoFrameBridge<R: Runtime> {
    engine: Arc<dyn MediaEngine>,
    runtime: Arc<R>,
    table: VideoCallbackTable,
    closed: AtomicBool,
}

impl<R: Runtime + 'static> VideoFrameBridge<R> {
    /// Resolve the consumer's callbacks and register with the engine.
    pub fn new(
        engine: Arc<dyn MediaEngine>,
        runtime: Arc<R>,
        consumer: ObjectId,
    ) -> BridgeResult<Arc<Self>> {
        let table = {
            let binding = ScopedThreadBinding::attach(&*runtime)?;
            VideoCallbackTable::resolve(binding.env(), consumer)?
        };
        let bridge = Arc::new(Self {
            engine: engine.clone(),
            runtime,
            table,
            closed: AtomicBool::new(false),
        });
        engine.register_video_observer(Some(bridge.clone()));
        Ok(bridge)
    }
}

impl<R: Runtime> VideoFrameBridge<R> {
    /// Unregister from the engine, then release the cached handles.
    /// Idempotent; ordering matches the audio bridge.
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.engine.register_video_observer(None);
        match ScopedThreadBinding::attach(&*self.runtime) {
            Ok(binding) => self.table.release(binding.env()),
            Err(err) => {
                tracing::warn!(
                    target: "rawframe",
                    error = %err,
                    "video bridge teardown could not attach; consumer reference leaked"
                );
                self.table.invalidate();
            }
        }
    }

    fn try_capture(&self, source_type: i32, frame: &mut VideoFrame) -> BridgeResult<bool> {
        let method = self.table.on_capture.get()?;
        let consumer = self.table.consumer.get()?;
        let binding = ScopedThreadBinding::attach(&*self.runtime)?;
        let env = binding.env();

        let (containers, matrix_container) = match &frame.payload {
            VideoPayload::Texture { matrix, .. } => {
                (Vec::new(), Some(marshal::marshal_matrix(env, matrix)?))
            }
            VideoPayload::Planar { format, planes } => {
                let lengths = marshal::plane_lengths(
                    *format,
                    frame.width,
                    frame.height,
                    planes.y_stride,
                    planes.u_stride,
                    planes.v_stride,
                )?;
                (marshal::marshal_planes(env, planes, lengths)?, None)
            }
        };

        let obj = self.build_frame_object(env, frame, &containers, matrix_container)?;
        let keep = env.invoke_bool(
            consumer,
            method,
            &[Value::Int(source_type), Value::Object(Some(obj))],
        )?;

        if let VideoPayload::Planar { planes, .. } = &mut frame.payload {
            marshal::copy_back_planes(env, &containers, planes)?;
        }
        if let Some(matrix) = matrix_container {
            // Matrices are read-only round-trip artifacts; nothing flows back
            // through the container itself.
            env.delete_local_ref(matrix);
        }

        self.apply_texture_replacement(env, obj, frame)?;
        env.delete_local_ref(obj);
        Ok(keep)
    }

    /// Capture-exclusive: adopt a texture representation the consumer put
    /// into the returned frame object.
    fn apply_texture_replacement<E: RuntimeEnv>(
        &self,
        env: &E,
        obj: ObjectId,
        frame: &mut VideoFrame,
    ) -> BridgeResult<()> {
        let new_type = env.invoke_int(obj, self.table.frame_get_type.get()?, &[])?;
        if let Some(format) = TextureFormat::from_code(new_type) {
            let texture_id = env.invoke_int(obj, self.table.frame_get_texture_id.get()?, &[])?;
            let matrix_obj = env.invoke_object(obj, self.table.frame_get_matrix.get()?, &[])?;
            let matrix = marshal::read_matrix(env, matrix_obj)?;
            env.delete_local_ref(matrix_obj);
            frame.replace_with_texture(format, texture_id, matrix);
        }
        Ok(())
    }

    /// Render and pre-encode delivery: planar marshal and copy-back only, no
    /// representation change. `ctx` is the remote uid (render) or the source
    /// type (pre-encode).
    fn try_planar_deliver(
        &self,
        slot: &MethodSlot,
        ctx: i32,
        frame: &mut VideoFrame,
    ) -> BridgeResult<bool> {
        let method = slot.get()?;
        let consumer = self.table.consumer.get()?;
        let binding = ScopedThreadBinding::attach(&*self.runtime)?;
        let env = binding.env();

        let containers = match &frame.payload {
            VideoPayload::Planar { format, planes } => {
                let lengths = marshal::plane_lengths(
                    *format,
                    frame.width,
                    frame.height,
                    planes.y_stride,
                    planes.u_stride,
                    planes.v_stride,
                )?;
                marshal::marshal_planes(env, planes, lengths)?
            }
            VideoPayload::Texture { .. } => {
                return Err(BridgeError::UnsupportedFormat(frame.pixel_format().code()))
            }
        };

        let obj = self.build_frame_object(env, frame, &containers, None)?;
        let keep = env.invoke_bool(
            consumer,
            method,
            &[Value::Int(ctx), Value::Object(Some(obj))],
        )?;

        if let VideoPayload::Planar { planes, .. } = &mut frame.payload {
            marshal::copy_back_planes(env, &containers, planes)?;
        }
        env.delete_local_ref(obj);
        Ok(keep)
    }

    /// Construct the managed frame object. Plane containers fill the buffer
    /// constructor slots positionally in Y, U, V order; a texture frame
    /// passes the matrix instead, never both.
    fn build_frame_object<E: RuntimeEnv>(
        &self,
        env: &E,
        frame: &VideoFrame,
        containers: &[ObjectId],
        matrix: Option<ObjectId>,
    ) -> BridgeResult<ObjectId> {
        let class = self.table.frame_class.get()?;
        let ctor = self.table.frame_ctor.get()?;
        let (y_stride, u_stride, v_stride) = match &frame.payload {
            VideoPayload::Planar { planes, .. } => {
                (planes.y_stride, planes.u_stride, planes.v_stride)
            }
            VideoPayload::Texture { .. } => (0, 0, 0),
        };
        let texture_id = match &frame.payload {
            VideoPayload::Texture { texture_id, .. } => *texture_id,
            VideoPayload::Planar { .. } => 0,
        };
        Ok(env.new_object(
            class,
            ctor,
            &[
                Value::Int(frame.pixel_format().code()),
                Value::Int(frame.width),
                Value::Int(frame.height),
                Value::Int(y_stride),
                Value::Int(u_stride),
                Value::Int(v_stride),
                Value::Object(containers.first().copied()),
                Value::Object(containers.get(1).copied()),
                Value::Object(containers.get(2).copied()),
                Value::Int(frame.rotation),
                Value::Int(texture_id),
                Value::Object(matrix),
                Value::Long(frame.render_time_ms),
                Value::Int(frame.avsync_type),
            ],
        )?)
    }

    fn reject_on_error(&self, event: &'static str, result: BridgeResult<bool>) -> bool {
        match result {
            Ok(keep) => keep,
            Err(err) => {
                tracing::warn!(
                    target: "rawframe",
                    event,
                    error = %err,
                    "video frame dropped at the bridge boundary"
                );
                false
            }
        }
    }

    fn try_format_preference(&self) -> BridgeResult<PixelFormat> {
        let method = self.table.get_format_preference.get()?;
        let consumer = self.table.consumer.get()?;
        let binding = ScopedThreadBinding::attach(&*self.runtime)?;
        let env = binding.env();
        let pref = env.invoke_object(consumer, method, &[])?;
        let code = env.invoke_int(pref, self.table.format_get_value.get()?, &[])?;
        env.delete_local_ref(pref);
        PixelFormat::from_code(code).ok_or(BridgeError::UnsupportedFormat(code))
    }

    fn try_query_bool(&self, slot: &MethodSlot) -> BridgeResult<bool> {
        let method = slot.get()?;
        let consumer = self.table.consumer.get()?;
        let binding = ScopedThreadBinding::attach(&*self.runtime)?;
        binding.env().invoke_bool(consumer, method, &[]).map_err(Into::into)
    }

    fn try_query_position(&self) -> BridgeResult<u32> {
        let method = self.table.get_frame_position.get()?;
        let consumer = self.table.consumer.get()?;
        let binding = ScopedThreadBinding::attach(&*self.runtime)?;
        let position = binding.env().invoke_int(consumer, method, &[])?;
        Ok(position as u32)
    }
}

impl<R: Runtime> VideoFrameObserver for VideoFrameBridge<R> {
    fn on_capture_frame(&self, source_type: i32, frame: &mut VideoFrame) -> bool {
        let result = self.try_capture(source_type, frame);
        self.reject_on_error("capture", result)
    }

    fn on_pre_encode_frame(&self, source_type: i32, frame: &mut VideoFrame) -> bool {
        let result = self.try_planar_deliver(&self.table.on_pre_encode, source_type, frame);
        self.reject_on_error("pre_encode", result)
    }

    fn on_render_frame(&self, _channel_id: &str, remote_uid: u32, frame: &mut VideoFrame) -> bool {
        let result = self.try_planar_deliver(&self.table.on_render, remote_uid as i32, frame);
        self.reject_on_error("render", result)
    }

    fn format_preference(&self) -> PixelFormat {
        // Property queries degrade to neutral defaults rather than failing
        // across the engine boundary.
        self.try_format_preference().unwrap_or(PixelFormat::I420)
    }

    fn rotation_applied(&self) -> bool {
        self.try_query_bool(&self.table.get_rotation_applied)
            .unwrap_or(false)
    }

    fn mirror_applied(&self) -> bool {
        self.try_query_bool(&self.table.get_mirror_applied)
            .unwrap_or(false)
    }

    fn observed_frame_position(&self) -> u32 {
        self.try_query_position()
            .unwrap_or(crate::engine::POSITION_POST_CAPTURER)
    }
}

impl<R: Runtime> Drop for VideoFrameBridge<R> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
