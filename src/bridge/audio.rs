//! Audio frame bridge
//!
//! Registers as the engine's sole audio observer and forwards each of the
//! four audio frame events into one synchronous managed invocation, copying
//! the (possibly mutated) payload back into the native buffer afterwards.

use super::handles::{AudioCallbackTable, MethodSlot};
use super::marshal;
use super::BridgeResult;
use crate::engine::{AudioFrame, AudioFrameObserver, MediaEngine};
use crate::runtime::{ObjectId, Runtime, RuntimeEnv, ScopedThreadBinding, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Bridge from the engine's audio observer contract to a managed consumer.
///
/// Construction resolves every callback handle up front and registers the
/// bridge with the engine; a consumer missing an expected method aborts
/// construction. Teardown unregisters first, then releases the handle table —
/// that ordering is what makes teardown safe without a lock on the frame
/// path.
pub struct AudioFrameBridge<R: Runtime> {
    engine: Arc<dyn MediaEngine>,
    runtime: Arc<R>,
    table: AudioCallbackTable,
    closed: AtomicBool,
}

impl<R: Runtime + 'static> AudioFrameBridge<R> {
    /// Resolve the consumer's callbacks and register with the engine.
    pub fn new(
        engine: Arc<dyn MediaEngine>,
        runtime: Arc<R>,
        consumer: ObjectId,
    ) -> BridgeResult<Arc<Self>> {
        let table = {
            let binding = ScopedThreadBinding::attach(&*runtime)?;
            AudioCallbackTable::resolve(binding.env(), consumer)?
        };
        let bridge = Arc::new(Self {
            engine: engine.clone(),
            runtime,
            table,
            closed: AtomicBool::new(false),
        });
        engine.register_audio_observer(Some(bridge.clone()));
        Ok(bridge)
    }
}

impl<R: Runtime> AudioFrameBridge<R> {
    /// Unregister from the engine, then release the cached handles.
    ///
    /// Unregistration is synchronous and blocking on the engine side: once it
    /// returns, no further callbacks arrive, so releasing the consumer
    /// reference afterwards cannot race an in-flight invocation. Idempotent.
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.engine.register_audio_observer(None);
        match ScopedThreadBinding::attach(&*self.runtime) {
            Ok(binding) => self.table.release(binding.env()),
            Err(err) => {
                tracing::warn!(
                    target: "rawframe",
                    error = %err,
                    "audio bridge teardown could not attach; consumer reference leaked"
                );
                self.table.invalidate();
            }
        }
    }

    fn deliver(&self, slot: &MethodSlot, uid: Option<u32>, frame: &mut AudioFrame) -> bool {
        match self.try_deliver(slot, uid, frame) {
            Ok(keep) => keep,
            Err(err) => {
                tracing::warn!(
                    target: "rawframe",
                    error = %err,
                    "audio frame dropped at the bridge boundary"
                );
                false
            }
        }
    }

    fn try_deliver(
        &self,
        slot: &MethodSlot,
        uid: Option<u32>,
        frame: &mut AudioFrame,
    ) -> BridgeResult<bool> {
        let method = slot.get()?;
        let consumer = self.table.consumer.get()?;
        let binding = ScopedThreadBinding::attach(&*self.runtime)?;
        let env = binding.env();

        // Geometry first: length is fixed by the scalar fields and never
        // changes across the boundary.
        let len = marshal::audio_payload_len(frame)?;
        let container = marshal::marshal_bytes(env, &frame.buffer[..len])?;
        let obj = self.build_frame_object(env, frame, container)?;

        let keep = match uid {
            Some(uid) => env.invoke_bool(
                consumer,
                method,
                &[Value::Int(uid as i32), Value::Object(Some(obj))],
            )?,
            None => env.invoke_bool(consumer, method, &[Value::Object(Some(obj))])?,
        };

        // Contents may have changed; the length cannot.
        marshal::copy_back_bytes(env, container, &mut frame.buffer)?;
        env.delete_local_ref(container);
        env.delete_local_ref(obj);
        Ok(keep)
    }

    fn build_frame_object<E: RuntimeEnv>(
        &self,
        env: &E,
        frame: &AudioFrame,
        container: ObjectId,
    ) -> BridgeResult<ObjectId> {
        let class = self.table.frame_class.get()?;
        let ctor = self.table.frame_ctor.get()?;
        Ok(env.new_object(
            class,
            ctor,
            &[
                Value::Int(frame.frame_type as i32),
                Value::Int(frame.samples_per_channel),
                Value::Int(frame.bytes_per_sample),
                Value::Int(frame.channels),
                Value::Int(frame.samples_per_sec),
                Value::Object(Some(container)),
                Value::Long(frame.render_time_ms),
                Value::Int(frame.avsync_type),
            ],
        )?)
    }
}

impl<R: Runtime + 'static> AudioFrameObserver for AudioFrameBridge<R> {
    fn on_record_frame(&self, frame: &mut AudioFrame) -> bool {
        self.deliver(&self.table.on_record, None, frame)
    }

    fn on_playback_frame(&self, frame: &mut AudioFrame) -> bool {
        self.deliver(&self.table.on_playback, None, frame)
    }

    fn on_mixed_frame(&self, frame: &mut AudioFrame) -> bool {
        self.deliver(&self.table.on_mixed, None, frame)
    }

    fn on_playback_frame_before_mixing(&self, uid: u32, frame: &mut AudioFrame) -> bool {
        self.deliver(&self.table.on_before_mixing, Some(uid), frame)
    }
}

impl<R: Runtime> Drop for AudioFrameBridge<R> {
    fn drop(&mut self) {
        // Backstop for consumers that never called shutdown explicitly; the
        // ordering guarantees are the same.
        self.shutdown();
    }
}
