//! Frame buffer marshaling
//!
//! Pure conversion between native frame buffers and the managed runtime's
//! transferable containers. No state is carried between invocations; every
//! container is allocated, filled, drained, and released within one callback.
//!
//! Geometry is always computed before any allocation or copy, so an
//! unsupported or degenerate format is rejected up front instead of turning
//! into an undefined buffer length.

use super::{BridgeError, BridgeResult};
use crate::engine::frame::{AudioFrame, PlanarBuffers, PlanarFormat};
use crate::runtime::{ObjectId, RuntimeEnv};

/// Byte length of each plane for one planar frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneLengths {
    pub y: usize,
    pub u: usize,
    pub v: usize,
}

fn checked_len(a: i32, b: i32, what: &'static str) -> BridgeResult<usize> {
    let a = usize::try_from(a).map_err(|_| BridgeError::InvalidGeometry(what))?;
    let b = usize::try_from(b).map_err(|_| BridgeError::InvalidGeometry(what))?;
    a.checked_mul(b).ok_or(BridgeError::InvalidGeometry(what))
}

/// Per-plane byte lengths implied by a planar format's geometry.
///
/// | Format | Y   | U     | V     |
/// |--------|-----|-------|-------|
/// | I420   | s·h | s·h/2 | s·h/2 |
/// | I422   | s·h | s·h   | s·h   |
/// | RGBA   | w·h·4 | 0   | 0     |
pub fn plane_lengths(
    format: PlanarFormat,
    width: i32,
    height: i32,
    y_stride: i32,
    u_stride: i32,
    v_stride: i32,
) -> BridgeResult<PlaneLengths> {
    match format {
        PlanarFormat::I420 => Ok(PlaneLengths {
            y: checked_len(y_stride, height, "y stride * height")?,
            u: checked_len(u_stride, height, "u stride * height")? / 2,
            v: checked_len(v_stride, height, "v stride * height")? / 2,
        }),
        PlanarFormat::I422 => Ok(PlaneLengths {
            y: checked_len(y_stride, height, "y stride * height")?,
            u: checked_len(u_stride, height, "u stride * height")?,
            v: checked_len(v_stride, height, "v stride * height")?,
        }),
        PlanarFormat::Rgba => {
            let pixels = checked_len(width, height, "width * height")?;
            let y = pixels
                .checked_mul(4)
                .ok_or(BridgeError::InvalidGeometry("width * height * 4"))?;
            Ok(PlaneLengths { y, u: 0, v: 0 })
        }
    }
}

/// Byte length of an audio frame implied by its geometry, validated against
/// the actual native buffer. The buffer is required to be sized exactly by
/// the geometry fields; a mismatch rejects the frame.
pub fn audio_payload_len(frame: &AudioFrame) -> BridgeResult<usize> {
    let expected = frame
        .payload_len()
        .ok_or(BridgeError::InvalidGeometry("audio sample geometry"))?;
    if frame.buffer.len() != expected {
        return Err(BridgeError::GeometryMismatch {
            expected,
            actual: frame.buffer.len(),
        });
    }
    Ok(expected)
}

/// Allocate a byte container of exactly `data.len()` bytes and fill it.
/// An empty slice produces an empty container with no copy.
pub fn marshal_bytes<E: RuntimeEnv>(env: &E, data: &[u8]) -> BridgeResult<ObjectId> {
    let container = env.new_byte_container(data.len())?;
    if !data.is_empty() {
        env.write_bytes(container, data)?;
    }
    Ok(container)
}

/// Copy the container's contents back into the existing native buffer.
///
/// Exactly the container's declared length is copied, capped by the native
/// buffer; the native buffer is never reallocated or resized.
pub fn copy_back_bytes<E: RuntimeEnv>(
    env: &E,
    container: ObjectId,
    dest: &mut [u8],
) -> BridgeResult<()> {
    let len = env.container_len(container)?.min(dest.len());
    if len > 0 {
        env.read_bytes(container, &mut dest[..len])?;
    }
    Ok(())
}

/// Marshal a 16-element texture transform matrix.
pub fn marshal_matrix<E: RuntimeEnv>(env: &E, matrix: &[f32; 16]) -> BridgeResult<ObjectId> {
    Ok(env.new_float_container(matrix)?)
}

/// Read a 16-element matrix back out of a float container.
pub fn read_matrix<E: RuntimeEnv>(env: &E, container: ObjectId) -> BridgeResult<[f32; 16]> {
    let mut matrix = [0.0f32; 16];
    env.read_floats(container, &mut matrix)?;
    Ok(matrix)
}

/// Marshal the populated planes of a planar frame, in Y, U, V order.
///
/// Planes that are empty or have a computed length of zero are skipped, so
/// the result holds between zero and three containers. A populated plane
/// shorter than its geometry-implied length rejects the frame before any
/// container is allocated, same as the audio path. Copy-back pairs
/// containers with native planes by this construction order (0→Y, 1→U, 2→V);
/// both sides of the round trip depend on the ordering and it must not be
/// rearranged.
pub fn marshal_planes<E: RuntimeEnv>(
    env: &E,
    planes: &PlanarBuffers,
    lengths: PlaneLengths,
) -> BridgeResult<Vec<ObjectId>> {
    let roles = [
        (&planes.y, lengths.y),
        (&planes.u, lengths.u),
        (&planes.v, lengths.v),
    ];
    for (buffer, len) in roles {
        if !buffer.is_empty() && buffer.len() < len {
            return Err(BridgeError::GeometryMismatch {
                expected: len,
                actual: buffer.len(),
            });
        }
    }
    let mut containers = Vec::with_capacity(3);
    for (buffer, len) in roles {
        if !buffer.is_empty() && len > 0 {
            containers.push(marshal_bytes(env, &buffer[..len])?);
        }
    }
    Ok(containers)
}

/// Copy marshaled plane containers back into the native planes, matching
/// container index to plane role by construction order.
pub fn copy_back_planes<E: RuntimeEnv>(
    env: &E,
    containers: &[ObjectId],
    planes: &mut PlanarBuffers,
) -> BridgeResult<()> {
    for (i, &container) in containers.iter().enumerate() {
        let dest = match i {
            0 => &mut planes.y,
            1 => &mut planes.u,
            _ => &mut planes.v,
        };
        copy_back_bytes(env, container, dest)?;
        env.delete_local_ref(container);
    }
    Ok(())
}
