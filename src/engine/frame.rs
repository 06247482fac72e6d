//! Audio and video frame structures
//!
//! Numeric codes match the engine's enumerations exactly; they cross the
//! boundary as raw integers, never as symbolic names.

/// Audio frame type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum AudioFrameType {
    /// 16-bit interleaved PCM.
    Pcm16 = 0,
}

/// Video pixel format codes, covering both planar and texture
/// representations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum PixelFormat {
    I420 = 1,
    Rgba = 4,
    Texture2d = 10,
    TextureOes = 11,
    I422 = 16,
}

impl PixelFormat {
    /// Decode an engine/consumer numeric code. Unknown codes are rejected
    /// rather than mapped onto undefined geometry.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(PixelFormat::I420),
            4 => Some(PixelFormat::Rgba),
            10 => Some(PixelFormat::Texture2d),
            11 => Some(PixelFormat::TextureOes),
            16 => Some(PixelFormat::I422),
            _ => None,
        }
    }

    #[inline]
    pub fn code(&self) -> i32 {
        *self as i32
    }

    #[inline]
    pub fn is_texture(&self) -> bool {
        matches!(self, PixelFormat::Texture2d | PixelFormat::TextureOes)
    }
}

/// Pixel formats carried as raw planes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanarFormat {
    I420,
    I422,
    Rgba,
}

impl PlanarFormat {
    pub fn pixel_format(&self) -> PixelFormat {
        match self {
            PlanarFormat::I420 => PixelFormat::I420,
            PlanarFormat::I422 => PixelFormat::I422,
            PlanarFormat::Rgba => PixelFormat::Rgba,
        }
    }
}

/// Pixel formats carried as an opaque texture handle plus transform matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFormat {
    TwoD,
    Oes,
}

impl TextureFormat {
    pub fn from_code(code: i32) -> Option<Self> {
        match PixelFormat::from_code(code)? {
            PixelFormat::Texture2d => Some(TextureFormat::TwoD),
            PixelFormat::TextureOes => Some(TextureFormat::Oes),
            _ => None,
        }
    }

    pub fn pixel_format(&self) -> PixelFormat {
        match self {
            TextureFormat::TwoD => PixelFormat::Texture2d,
            TextureFormat::Oes => PixelFormat::TextureOes,
        }
    }
}

/// One audio frame, owned by the engine for the duration of one callback.
///
/// The buffer is sized exactly `samples_per_channel * channels *
/// bytes_per_sample`; a callback may rewrite its contents but the geometry
/// fields and the buffer length never change across the boundary.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub frame_type: AudioFrameType,
    pub samples_per_channel: i32,
    pub bytes_per_sample: i32,
    pub channels: i32,
    pub samples_per_sec: i32,
    pub buffer: Vec<u8>,
    pub render_time_ms: i64,
    pub avsync_type: i32,
}

impl AudioFrame {
    /// Byte length implied by the geometry fields.
    pub fn payload_len(&self) -> Option<usize> {
        let samples = usize::try_from(self.samples_per_channel).ok()?;
        let channels = usize::try_from(self.channels).ok()?;
        let bytes = usize::try_from(self.bytes_per_sample).ok()?;
        samples.checked_mul(channels)?.checked_mul(bytes)
    }
}

/// Raw pixel planes with their strides. For RGBA only the first plane is
/// populated; `u` and `v` stay empty.
#[derive(Debug, Clone)]
pub struct PlanarBuffers {
    pub y: Vec<u8>,
    pub u: Vec<u8>,
    pub v: Vec<u8>,
    pub y_stride: i32,
    pub u_stride: i32,
    pub v_stride: i32,
}

/// Format-dependent frame payload. The two shapes are mutually exclusive: a
/// planar frame has no texture id and a texture frame has no planes.
#[derive(Debug, Clone)]
pub enum VideoPayload {
    Planar {
        format: PlanarFormat,
        planes: PlanarBuffers,
    },
    Texture {
        format: TextureFormat,
        texture_id: i32,
        matrix: [f32; 16],
    },
}

/// One video frame, owned by the engine for the duration of one callback.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub width: i32,
    pub height: i32,
    pub rotation: i32,
    pub render_time_ms: i64,
    pub avsync_type: i32,
    pub payload: VideoPayload,
}

impl VideoFrame {
    /// Numeric pixel-format code of the current representation.
    pub fn pixel_format(&self) -> PixelFormat {
        match &self.payload {
            VideoPayload::Planar { format, .. } => format.pixel_format(),
            VideoPayload::Texture { format, .. } => format.pixel_format(),
        }
    }

    /// Switch the frame to a texture representation, discarding any planes.
    ///
    /// This is the one operation that changes a frame's shape, not just its
    /// contents, across the callback boundary; the capture path of the video
    /// bridge is its sole caller.
    pub fn replace_with_texture(
        &mut self,
        format: TextureFormat,
        texture_id: i32,
        matrix: [f32; 16],
    ) {
        self.payload = VideoPayload::Texture {
            format,
            texture_id,
            matrix,
        };
    }
}
