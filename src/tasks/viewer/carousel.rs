//! GPU side of the carousel: ripple panels and bubbles rendered into an
//! offscreen target that the compositor shows as the carousel section's
//! background.

use tracing::{debug, info};
use wgpu::util::DeviceExt;

use super::gpu::{self, GpuTexture, OFFSCREEN_FORMAT};
use super::uniforms::{BubbleUniforms, PanelUniforms, SpriteInstance, sprite_instances};
use crate::config::{CarouselConfig, HexColor};
use crate::events::DecodedTexture;
use crate::processing::layout::view_half_extents;
use crate::tasks::carousel::CarouselState;

const BUBBLE_COLOR: [f32; 3] = [0.8, 0.9, 1.0];
const HIGHLIGHT_COLOR: &str = "#e0f7fa";
const MAX_ANISOTROPY: u16 = 16;

struct PanelSlot {
    uniform: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

pub struct CarouselRenderer {
    target: GpuTexture,
    panel_pipeline: wgpu::RenderPipeline,
    panel_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    textures: Vec<GpuTexture>,
    slots: Vec<PanelSlot>,
    bubble_pipeline: wgpu::RenderPipeline,
    bubble_uniform: wgpu::Buffer,
    bubble_bind_group: wgpu::BindGroup,
    instances: wgpu::Buffer,
    highlight: [f32; 3],
}

impl CarouselRenderer {
    pub fn new(device: &wgpu::Device, cfg: &CarouselConfig, width: u32, height: u32) -> Self {
        let panel_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("panel-bind-layout"),
            entries: &[
                gpu::uniform_entry(0, wgpu::ShaderStages::VERTEX_FRAGMENT),
                gpu::texture_entry(1),
                gpu::sampler_entry(2),
            ],
        });
        let panel_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("panel-shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/panel.wgsl").into()),
        });
        let panel_pipeline = gpu::blended_pipeline(
            device,
            "panel-pipeline",
            &panel_shader,
            &panel_layout,
            &[],
            wgpu::PrimitiveTopology::TriangleStrip,
            OFFSCREEN_FORMAT,
        );

        let bubble_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("bubble-bind-layout"),
            entries: &[gpu::uniform_entry(0, wgpu::ShaderStages::VERTEX_FRAGMENT)],
        });
        let bubble_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("bubble-shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/bubble.wgsl").into()),
        });
        let bubble_pipeline = gpu::blended_pipeline(
            device,
            "bubble-pipeline",
            &bubble_shader,
            &bubble_layout,
            &[SpriteInstance::layout()],
            wgpu::PrimitiveTopology::TriangleStrip,
            OFFSCREEN_FORMAT,
        );
        let bubble_uniform = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("bubble-uniforms"),
            contents: bytemuck::bytes_of(&BubbleUniforms::default()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bubble_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("bubble-bind-group"),
            layout: &bubble_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: bubble_uniform.as_entire_binding(),
            }],
        });
        let instances = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("bubble-instances"),
            size: (cfg.particles.count.max(1) * 2 * std::mem::size_of::<SpriteInstance>())
                as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let highlight = HIGHLIGHT_COLOR
            .parse::<HexColor>()
            .map(HexColor::rgb_f32)
            .unwrap_or(BUBBLE_COLOR);

        Self {
            target: gpu::render_target(device, width, height),
            panel_pipeline,
            panel_layout,
            sampler: gpu::linear_sampler(device, "panel-sampler", MAX_ANISOTROPY),
            textures: Vec::new(),
            slots: Vec::new(),
            bubble_pipeline,
            bubble_uniform,
            bubble_bind_group,
            instances,
            highlight,
        }
    }

    /// View of the offscreen target; changes after [`Self::resize`].
    pub fn target_view(&self) -> wgpu::TextureView {
        self.target.view.clone()
    }

    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        if self.target.width == width.max(1) && self.target.height == height.max(1) {
            return;
        }
        self.target = gpu::render_target(device, width, height);
        debug!(width, height, "carousel target resized");
    }

    /// Uploads a loaded batch and builds one bind group per strip slot.
    pub fn set_textures(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        decoded: &[DecodedTexture],
    ) {
        self.textures = decoded
            .iter()
            .map(|tex| gpu::upload_texture(device, queue, tex, "carousel-panel"))
            .collect();
        let slot_count = self.textures.len() * 2;
        self.slots = (0..slot_count)
            .map(|slot| {
                let texture = &self.textures[slot % self.textures.len()];
                let uniform = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("panel-uniforms"),
                    contents: bytemuck::bytes_of(&PanelUniforms::default()),
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                });
                let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("panel-bind-group"),
                    layout: &self.panel_layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: uniform.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::TextureView(&texture.view),
                        },
                        wgpu::BindGroupEntry {
                            binding: 2,
                            resource: wgpu::BindingResource::Sampler(&self.sampler),
                        },
                    ],
                });
                PanelSlot {
                    uniform,
                    bind_group,
                }
            })
            .collect();
        info!(
            textures = self.textures.len(),
            slots = slot_count,
            "carousel textures uploaded"
        );
    }

    /// Drops every panel texture; the particle field keeps rendering.
    pub fn clear_textures(&mut self) {
        self.slots.clear();
        self.textures.clear();
    }

    pub fn render(
        &self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        state: &CarouselState,
        clear: [f32; 3],
    ) {
        let cfg = state.config();
        let camera = view_half_extents(cfg.view_height, self.target.width, self.target.height);

        let panels = state.panels();
        let drawn = panels.len().min(self.slots.len());
        for (slot, panel) in panels.iter().enumerate().take(drawn) {
            let uniforms = PanelUniforms::for_slot(state, slot, panel, camera);
            queue.write_buffer(&self.slots[slot].uniform, 0, bytemuck::bytes_of(&uniforms));
        }

        let bubble = BubbleUniforms {
            camera: [camera[0], camera[1], 0.0, 0.0],
            bubble: [
                BUBBLE_COLOR[0],
                BUBBLE_COLOR[1],
                BUBBLE_COLOR[2],
                cfg.particles.opacity,
            ],
            highlight: [
                self.highlight[0],
                self.highlight[1],
                self.highlight[2],
                cfg.particles.highlight_opacity,
            ],
            params: [state.clock(), 0.0, 0.0, 0.0],
        };
        queue.write_buffer(&self.bubble_uniform, 0, bytemuck::bytes_of(&bubble));

        let (back, front) = sprite_instances(state);
        let back_count = back.len() as u32;
        let total = (back.len() + front.len()) as u32;
        let mut sprites = back;
        sprites.extend(front);
        if !sprites.is_empty() {
            queue.write_buffer(&self.instances, 0, bytemuck::cast_slice(&sprites));
        }

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("carousel-pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.target.view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: clear[0] as f64,
                        g: clear[1] as f64,
                        b: clear[2] as f64,
                        a: 1.0,
                    }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        // Particles behind the panel plane, panels, then particles in front.
        pass.set_pipeline(&self.bubble_pipeline);
        pass.set_bind_group(0, &self.bubble_bind_group, &[]);
        pass.set_vertex_buffer(0, self.instances.slice(..));
        if back_count > 0 {
            pass.draw(0..4, 0..back_count);
        }

        pass.set_pipeline(&self.panel_pipeline);
        for slot in &self.slots[..drawn] {
            pass.set_bind_group(0, &slot.bind_group, &[]);
            pass.draw(0..4, 0..1);
        }

        if total > back_count {
            pass.set_pipeline(&self.bubble_pipeline);
            pass.set_bind_group(0, &self.bubble_bind_group, &[]);
            pass.set_vertex_buffer(0, self.instances.slice(..));
            pass.draw(0..4, back_count..total);
        }
    }
}
