//! Draws the visible section layers back to front onto the swapchain.

use tracing::debug;
use wgpu::util::DeviceExt;

use super::gpu::{self, GpuTexture};
use super::uniforms::SectionUniforms;
use crate::processing::layout::cover_uv;
use crate::tasks::sections::LayerFrame;

/// What fills a section layer's background slot.
enum Background {
    None,
    Image(GpuTexture),
    /// The carousel's offscreen target, already viewport sized.
    Target(wgpu::TextureView),
}

struct SectionSlot {
    uniform: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    background: Background,
    overlay: Option<GpuTexture>,
    color: [f32; 3],
}

pub struct SectionCompositor {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    placeholder: GpuTexture,
    slots: Vec<SectionSlot>,
}

impl SectionCompositor {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        format: wgpu::TextureFormat,
        colors: &[[f32; 3]],
    ) -> Self {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("section-bind-layout"),
            entries: &[
                gpu::uniform_entry(0, wgpu::ShaderStages::FRAGMENT),
                gpu::texture_entry(1),
                gpu::texture_entry(2),
                gpu::sampler_entry(3),
            ],
        });
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("section-shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/section.wgsl").into()),
        });
        let pipeline = gpu::blended_pipeline(
            device,
            "section-pipeline",
            &shader,
            &layout,
            &[],
            wgpu::PrimitiveTopology::TriangleList,
            format,
        );
        let sampler = gpu::linear_sampler(device, "section-sampler", 1);
        let placeholder = gpu::placeholder_texture(device, queue);

        let mut compositor = Self {
            pipeline,
            layout,
            sampler,
            placeholder,
            slots: Vec::with_capacity(colors.len()),
        };
        for (index, color) in colors.iter().enumerate() {
            let uniform = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("section-uniforms"),
                contents: bytemuck::bytes_of(&SectionUniforms::default()),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
            let bind_group = compositor.bind(device, &uniform, None, None);
            compositor.slots.push(SectionSlot {
                uniform,
                bind_group,
                background: Background::None,
                overlay: None,
                color: *color,
            });
            debug!(index, "section slot created");
        }
        compositor
    }

    fn bind(
        &self,
        device: &wgpu::Device,
        uniform: &wgpu::Buffer,
        background: Option<&wgpu::TextureView>,
        overlay: Option<&wgpu::TextureView>,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("section-bind-group"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(
                        background.unwrap_or(&self.placeholder.view),
                    ),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(
                        overlay.unwrap_or(&self.placeholder.view),
                    ),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        })
    }

    fn rebind(&mut self, device: &wgpu::Device, index: usize) {
        let Some(slot) = self.slots.get(index) else {
            return;
        };
        let background = match &slot.background {
            Background::None => None,
            Background::Image(tex) => Some(&tex.view),
            Background::Target(view) => Some(view),
        };
        let bind_group = self.bind(
            device,
            &slot.uniform,
            background,
            slot.overlay.as_ref().map(|t| &t.view),
        );
        self.slots[index].bind_group = bind_group;
    }

    pub fn set_background(&mut self, device: &wgpu::Device, index: usize, texture: GpuTexture) {
        if let Some(slot) = self.slots.get_mut(index) {
            slot.background = Background::Image(texture);
            self.rebind(device, index);
        }
    }

    pub fn set_overlay(&mut self, device: &wgpu::Device, index: usize, texture: GpuTexture) {
        if let Some(slot) = self.slots.get_mut(index) {
            slot.overlay = Some(texture);
            self.rebind(device, index);
        }
    }

    /// Binds the carousel's offscreen target as a section background.
    pub fn set_target(&mut self, device: &wgpu::Device, index: usize, view: wgpu::TextureView) {
        if let Some(slot) = self.slots.get_mut(index) {
            slot.background = Background::Target(view);
            self.rebind(device, index);
        }
    }

    /// Clears to `clear` and draws `frames` in order.
    pub fn render(
        &self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        frames: &[LayerFrame],
        viewport: [u32; 2],
        clear: [f32; 3],
    ) {
        for frame in frames {
            let Some(slot) = self.slots.get(frame.index) else {
                continue;
            };
            let background_uv = match &slot.background {
                Background::None => None,
                Background::Image(tex) => {
                    Some(cover_uv(tex.width, tex.height, viewport[0], viewport[1]))
                }
                Background::Target(_) => Some([1.0, 1.0, 0.0, 0.0]),
            };
            let overlay_uv = slot
                .overlay
                .as_ref()
                .map(|tex| cover_uv(tex.width, tex.height, viewport[0], viewport[1]));
            let uniforms = SectionUniforms::from_frame(frame, background_uv, overlay_uv, slot.color);
            queue.write_buffer(&slot.uniform, 0, bytemuck::bytes_of(&uniforms));
        }

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("section-pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
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
        pass.set_pipeline(&self.pipeline);
        for frame in frames {
            if let Some(slot) = self.slots.get(frame.index) {
                pass.set_bind_group(0, &slot.bind_group, &[]);
                pass.draw(0..3, 0..1);
            }
        }
    }
}
