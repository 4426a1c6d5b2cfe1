//! Typed uniform blocks, one per material kind. Layouts mirror the WGSL structs
//! under `shaders/` (every member is a vec4 so no implicit padding exists).

use crate::tasks::carousel::{CarouselState, Panel};
use crate::tasks::sections::LayerFrame;

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SectionUniforms {
    pub clip: [[f32; 4]; 2],
    pub overlay_clip: [[f32; 4]; 2],
    /// Cover transform of the background layer.
    pub background_uv: [f32; 4],
    /// Cover transform of the overlay layer.
    pub overlay_uv: [f32; 4],
    /// Section backdrop colour.
    pub color: [f32; 4],
    /// x: background offset (fraction of height), y: has background, z: has overlay.
    pub params: [f32; 4],
}

impl SectionUniforms {
    pub fn from_frame(
        frame: &LayerFrame,
        background_uv: Option<[f32; 4]>,
        overlay_uv: Option<[f32; 4]>,
        color: [f32; 3],
    ) -> Self {
        let flag = |present: bool| if present { 1.0 } else { 0.0 };
        Self {
            clip: frame.clip.to_uniform(),
            overlay_clip: frame.overlay_clip.to_uniform(),
            background_uv: background_uv.unwrap_or([1.0, 1.0, 0.0, 0.0]),
            overlay_uv: overlay_uv.unwrap_or([1.0, 1.0, 0.0, 0.0]),
            color: [color[0], color[1], color[2], 1.0],
            params: [
                frame.background_offset / 100.0,
                flag(background_uv.is_some()),
                flag(overlay_uv.is_some()),
                0.0,
            ],
        }
    }
}

/// Ripple material parameters for one panel slot.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PanelUniforms {
    /// World centre (xy) and size (zw).
    pub transform: [f32; 4],
    /// Camera half extents (xy).
    pub camera: [f32; 4],
    /// Ripple origin (xy), start time (z), strength (w).
    pub ripple: [f32; 4],
    /// Time (x), opacity (y), ripple radius (z), ripple lifetime (w).
    pub params: [f32; 4],
}

impl PanelUniforms {
    pub fn for_slot(state: &CarouselState, slot: usize, panel: &Panel, camera: [f32; 2]) -> Self {
        let cfg = state.config();
        let [cx, cy] = state.panel_center(slot);
        let [w, h] = state.panel_size(slot);
        Self {
            transform: [cx, cy, w, h],
            camera: [camera[0], camera[1], 0.0, 0.0],
            ripple: [
                panel.ripple.origin_uv[0],
                panel.ripple.origin_uv[1],
                panel.ripple.start_time,
                cfg.ripple.strength,
            ],
            params: [
                state.clock(),
                cfg.opacity,
                cfg.ripple.radius,
                cfg.ripple.lifetime,
            ],
        }
    }
}

/// Shared particle material parameters.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BubbleUniforms {
    /// Camera half extents (xy).
    pub camera: [f32; 4],
    /// Bubble colour (rgb), bubble opacity (a).
    pub bubble: [f32; 4],
    /// Highlight colour (rgb), highlight opacity (a).
    pub highlight: [f32; 4],
    /// Time (x).
    pub params: [f32; 4],
}

/// One sprite; `kind` is 0 for the bubble body and 1 for its highlight.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SpriteInstance {
    pub center: [f32; 2],
    pub scale: f32,
    pub kind: f32,
}

impl SpriteInstance {
    pub const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

pub const HIGHLIGHT_OFFSET: [f32; 2] = [-0.18, 0.18];
pub const HIGHLIGHT_SCALE: f32 = 0.18;

/// Sprites for every particle, split into those behind (`z < 0`) and in front of
/// the panel plane.
pub fn sprite_instances(state: &CarouselState) -> (Vec<SpriteInstance>, Vec<SpriteInstance>) {
    let mut back = Vec::new();
    let mut front = Vec::new();
    for particle in state.particles() {
        let [x, y, z] = particle.position;
        let target = if z < 0.0 { &mut back } else { &mut front };
        target.push(SpriteInstance {
            center: [x, y],
            scale: particle.size,
            kind: 0.0,
        });
        target.push(SpriteInstance {
            center: [x + HIGHLIGHT_OFFSET[0], y + HIGHLIGHT_OFFSET[1]],
            scale: particle.size * HIGHLIGHT_SCALE,
            kind: 1.0,
        });
    }
    (back, front)
}
