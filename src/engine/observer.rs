//! Observer contracts invoked by the engine
//!
//! The engine calls these synchronously on its own internal threads, one
//! thread per event type, sequentially within an event type. Every frame
//! event returns a keep/drop flag: `true` keeps the frame in the pipeline,
//! `false` drops it.

use super::frame::{AudioFrame, PixelFormat, VideoFrame};
use std::sync::Arc;

/// Observation position bit flags polled via
/// [`VideoFrameObserver::observed_frame_position`].
pub const POSITION_POST_CAPTURER: u32 = 1 << 0;
pub const POSITION_PRE_RENDERER: u32 = 1 << 1;
pub const POSITION_PRE_ENCODER: u32 = 1 << 2;

/// Whether the observer intends to mutate frame contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoFrameProcessMode {
    ReadOnly,
    #[default]
    ReadWrite,
}

/// Requested audio parameters for one observation point. All zeros means "no
/// preference, keep the engine's defaults".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AudioParams {
    pub sample_rate: i32,
    pub channels: i32,
    pub samples_per_call: i32,
}

/// Audio observer contract. Default implementations cover the events and
/// queries an observer may leave unhandled.
pub trait AudioFrameObserver: Send + Sync {
    /// Captured microphone frame, before encoding.
    fn on_record_frame(&self, frame: &mut AudioFrame) -> bool;

    /// Mixed playback frame, after mixing, before the device sink.
    fn on_playback_frame(&self, frame: &mut AudioFrame) -> bool;

    /// Frame containing both recorded and playback audio.
    fn on_mixed_frame(&self, frame: &mut AudioFrame) -> bool;

    /// Per-remote-user playback frame, before mixing.
    fn on_playback_frame_before_mixing(&self, uid: u32, frame: &mut AudioFrame) -> bool;

    fn on_ear_monitoring_frame(&self, _frame: &mut AudioFrame) -> bool {
        false
    }

    fn observed_frame_position(&self) -> u32 {
        0
    }

    fn record_params(&self) -> AudioParams {
        AudioParams::default()
    }

    fn playback_params(&self) -> AudioParams {
        AudioParams::default()
    }

    fn mixed_params(&self) -> AudioParams {
        AudioParams::default()
    }

    fn ear_monitoring_params(&self) -> AudioParams {
        AudioParams::default()
    }
}

/// Video observer contract.
pub trait VideoFrameObserver: Send + Sync {
    /// Locally captured frame. The only event after which the observer may
    /// have switched the frame to a texture representation.
    fn on_capture_frame(&self, source_type: i32, frame: &mut VideoFrame) -> bool;

    /// Local frame about to be encoded.
    fn on_pre_encode_frame(&self, source_type: i32, frame: &mut VideoFrame) -> bool;

    /// Remote frame about to be rendered.
    fn on_render_frame(&self, channel_id: &str, remote_uid: u32, frame: &mut VideoFrame) -> bool;

    fn on_media_player_frame(&self, _frame: &mut VideoFrame, _media_player_id: i32) -> bool {
        false
    }

    fn on_transcoded_frame(&self, _frame: &mut VideoFrame) -> bool {
        false
    }

    fn process_mode(&self) -> VideoFrameProcessMode {
        VideoFrameProcessMode::ReadWrite
    }

    fn format_preference(&self) -> PixelFormat {
        PixelFormat::I420
    }

    fn rotation_applied(&self) -> bool {
        false
    }

    fn mirror_applied(&self) -> bool {
        false
    }

    fn observed_frame_position(&self) -> u32 {
        POSITION_POST_CAPTURER | POSITION_PRE_RENDERER
    }
}

/// Observer registration surface of the native engine.
///
/// Both calls are synchronous and blocking: after `register_*_observer(None)`
/// returns, the engine has stopped invoking the previous observer and will
/// never invoke it again. The bridges' teardown ordering depends on this.
pub trait MediaEngine: Send + Sync {
    fn register_audio_observer(&self, observer: Option<Arc<dyn AudioFrameObserver>>);

    fn register_video_observer(&self, observer: Option<Arc<dyn VideoFrameObserver>>);
}
