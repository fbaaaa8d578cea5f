//! Per-frame uniform payloads.
//!
//! Plain-old-data structures uploaded into the current frame slot's
//! uniform buffer each frame. `#[repr(C)]` plus `bytemuck::Pod` gives a
//! stable byte layout matching std140 rules for these field types.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2};

/// Frame-global uniform data.
///
/// # Memory Layout (std140)
///
/// | Offset | Size | Field |
/// |--------|------|-------|
/// | 0      | 64   | view_projection |
/// | 64     | 8    | viewport |
/// | 72     | 4    | time |
/// | 76     | 4    | _padding |
///
/// Total size: 80 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct FrameUniforms {
    /// Combined view-projection matrix supplied by the application.
    pub view_projection: Mat4,
    /// Viewport size in pixels.
    pub viewport: Vec2,
    /// Seconds since startup.
    pub time: f32,
    /// Padding to a 16-byte multiple.
    pub _padding: f32,
}

impl FrameUniforms {
    /// Creates frame uniforms for one frame.
    #[inline]
    pub fn new(view_projection: Mat4, viewport: Vec2, time: f32) -> Self {
        Self {
            view_projection,
            viewport,
            time,
            _padding: 0.0,
        }
    }

    /// Size of this structure in bytes, for buffer creation.
    #[inline]
    pub const fn size() -> usize {
        std::mem::size_of::<Self>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_uniforms_layout() {
        // std140-compatible: 16-byte aligned total size
        assert_eq!(FrameUniforms::size(), 80);
        assert_eq!(FrameUniforms::size() % 16, 0);
    }

    #[test]
    fn test_frame_uniforms_round_trip() {
        let uniforms = FrameUniforms::new(Mat4::IDENTITY, Vec2::new(1280.0, 720.0), 1.5);
        let bytes = bytemuck::bytes_of(&uniforms);
        assert_eq!(bytes.len(), FrameUniforms::size());

        let restored: FrameUniforms = *bytemuck::from_bytes(bytes);
        assert_eq!(restored.viewport, Vec2::new(1280.0, 720.0));
        assert_eq!(restored.time, 1.5);
    }
}
