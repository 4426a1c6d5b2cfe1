mod carousel;
mod compositor;
mod gpu;
pub mod uniforms;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use wgpu::{self, SurfaceError};
use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, MouseButton, TouchPhase, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy},
    keyboard::{KeyCode, PhysicalKey},
    window::{Fullscreen, Window, WindowAttributes},
};

use crate::{
    config::{Configuration, HexColor, SectionKind},
    events::{SectionStatus, TextureBatch, ViewerCommand},
    processing::layout::pixel_to_world,
    tasks::{
        carousel::{CarouselState, MountState, frame_delta},
        gesture::{GestureRecognizer, InputSample, key_command, wheel_delta_px},
        loader,
        sections::{SectionController, SectionEvent},
    },
};
use carousel::CarouselRenderer;
use compositor::SectionCompositor;
use gpu::upload_texture;

/// Generation tag of the one-off section image batch.
const SECTION_BATCH: u64 = 0;
/// Colour behind sections that set none.
const SECTION_BACKDROP: [f32; 3] = [0.0, 0.0, 0.0];

#[derive(Debug)]
enum ViewerEvent {
    Cancelled,
    SectionTextures(TextureBatch),
    CarouselTextures(TextureBatch),
    Command(ViewerCommand),
}

type CommandReceiver = mpsc::Receiver<ViewerCommand>;
type StatusSender = watch::Sender<SectionStatus>;

/// Startup overrides taken from the command line.
#[derive(Debug, Clone, Default)]
pub struct ViewerOptions {
    pub start_section: Option<usize>,
    pub particle_seed: Option<u64>,
}

struct GpuState {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    device: wgpu::Device,
    queue: wgpu::Queue,
    compositor: SectionCompositor,
    carousel: CarouselRenderer,
}

/// Carousel simulation plus its mount lifecycle.
struct CarouselHost {
    section: usize,
    mount: MountState,
    state: Option<CarouselState>,
    last_tick: Option<Instant>,
}

struct ViewerApp {
    cfg: Configuration,
    options: ViewerOptions,
    cancel: CancellationToken,
    runtime: Handle,
    proxy: EventLoopProxy<ViewerEvent>,
    window: Option<Arc<Window>>,
    gpu: Option<GpuState>,
    controller: SectionController,
    gestures: GestureRecognizer,
    carousel: Option<CarouselHost>,
    pending_sections: Option<TextureBatch>,
    pending_start: Option<usize>,
    started: bool,
    cursor: Option<[f32; 2]>,
    pressed: bool,
    status: StatusSender,
    pending_redraw: bool,
}

impl ViewerApp {
    fn new(
        cfg: Configuration,
        options: ViewerOptions,
        cancel: CancellationToken,
        runtime: Handle,
        proxy: EventLoopProxy<ViewerEvent>,
        status: StatusSender,
    ) -> Self {
        let controller = SectionController::new(
            cfg.sections.len(),
            cfg.transition.clone(),
            cfg.reveal.clone(),
        );
        let gestures = GestureRecognizer::new(cfg.gesture.clone());
        let carousel = cfg.carousel_section().map(|section| CarouselHost {
            section,
            mount: MountState::default(),
            state: None,
            last_tick: None,
        });
        let pending_start = options.start_section.filter(|&idx| idx != 0);
        Self {
            cfg,
            options,
            cancel,
            runtime,
            proxy,
            window: None,
            gpu: None,
            controller,
            gestures,
            carousel,
            pending_sections: None,
            pending_start,
            started: false,
            cursor: None,
            pressed: false,
            status,
            pending_redraw: false,
        }
    }

    fn ensure_window(&mut self, event_loop: &ActiveEventLoop) -> Option<Arc<Window>> {
        if let Some(window) = self.window.as_ref() {
            return Some(window.clone());
        }

        let attrs = WindowAttributes::default()
            .with_title("Ghibli Showcase")
            .with_fullscreen(Some(Fullscreen::Borderless(None)));
        match event_loop.create_window(attrs) {
            Ok(window) => {
                let window = Arc::new(window);
                self.window = Some(window.clone());
                Some(window)
            }
            Err(err) => {
                error!(error = %err, "failed to create viewer window");
                None
            }
        }
    }

    fn init_gpu(&mut self, window: Arc<Window>) -> Result<()> {
        let instance = wgpu::Instance::default();
        let surface = instance
            .create_surface(window.clone())
            .context("failed to create surface")?;
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("failed to acquire GPU adapter")?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|fmt| !fmt.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .context("surface reports no supported formats")?;

        let limits = adapter.limits();
        let (device, queue) = pollster::block_on(adapter.request_device(&device_descriptor(limits)))
            .context("failed to acquire GPU device")?;

        let size = window.inner_size();
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        info!(
            width = config.width,
            height = config.height,
            format = ?config.format,
            "viewer surface configured",
        );

        let colors: Vec<[f32; 3]> = self
            .cfg
            .sections
            .iter()
            .map(|s| s.color.map_or(SECTION_BACKDROP, HexColor::rgb_f32))
            .collect();
        let mut compositor = SectionCompositor::new(&device, &queue, format, &colors);
        let carousel = CarouselRenderer::new(&device, &self.cfg.carousel, config.width, config.height);
        if let Some(host) = self.carousel.as_ref() {
            compositor.set_target(&device, host.section, carousel.target_view());
        }

        self.gpu = Some(GpuState {
            surface,
            config,
            device,
            queue,
            compositor,
            carousel,
        });
        if let Some(batch) = self.pending_sections.take() {
            self.apply_section_textures(batch);
        }
        Ok(())
    }

    fn handle_resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        let Some(gpu) = self.gpu.as_mut() else {
            return;
        };
        gpu.config.width = new_size.width.max(1);
        gpu.config.height = new_size.height.max(1);
        gpu.surface.configure(&gpu.device, &gpu.config);
        gpu.carousel
            .resize(&gpu.device, gpu.config.width, gpu.config.height);
        if let Some(host) = self.carousel.as_ref() {
            gpu.compositor
                .set_target(&gpu.device, host.section, gpu.carousel.target_view());
        }
        debug!(
            width = gpu.config.width,
            height = gpu.config.height,
            "viewer surface resized",
        );
        self.request_redraw();
    }

    fn apply_section_textures(&mut self, batch: TextureBatch) {
        let Some(gfx) = self.gpu.as_mut() else {
            self.pending_sections = Some(batch);
            return;
        };
        let by_source: HashMap<PathBuf, _> = batch
            .textures
            .into_iter()
            .map(|tex| (tex.source.clone(), tex))
            .collect();
        for (index, section) in self.cfg.sections.iter().enumerate() {
            if let Some(tex) = section
                .background
                .as_ref()
                .and_then(|p| by_source.get(&self.cfg.resolve_asset(p)))
            {
                let uploaded = upload_texture(&gfx.device, &gfx.queue, tex, "section-background");
                gfx.compositor.set_background(&gfx.device, index, uploaded);
            }
            if let Some(tex) = section
                .clip_overlay
                .as_ref()
                .and_then(|p| by_source.get(&self.cfg.resolve_asset(p)))
            {
                let uploaded = upload_texture(&gfx.device, &gfx.queue, tex, "section-overlay");
                gfx.compositor.set_overlay(&gfx.device, index, uploaded);
            }
        }
        info!("section images uploaded");
        self.request_redraw();
    }

    fn apply_carousel_textures(&mut self, batch: TextureBatch) {
        let Some(host) = self.carousel.as_mut() else {
            return;
        };
        if !host.mount.accepts(batch.generation) {
            debug!(
                generation = batch.generation,
                current = host.mount.generation(),
                "discarding stale carousel textures"
            );
            return;
        }
        let Some(state) = host.state.as_mut() else {
            return;
        };
        let aspects: Vec<f32> = batch.textures.iter().map(|t| t.aspect_ratio()).collect();
        state.set_textures(&aspects);
        if let Some(gpu) = self.gpu.as_mut() {
            gpu.carousel
                .set_textures(&gpu.device, &gpu.queue, &batch.textures);
        }
        if batch.textures.is_empty() {
            warn!("no carousel textures loaded; showing particles only");
        }
    }

    fn mount_carousel(&mut self) {
        let Some(host) = self.carousel.as_mut() else {
            return;
        };
        let (generation, token) = host.mount.mount(&self.cancel);
        host.state = Some(CarouselState::new(
            self.cfg.carousel.clone(),
            self.options.particle_seed,
        ));
        host.last_tick = None;

        let sources = self.cfg.carousel_sources();
        let max_in_flight = self.cfg.loader_max_concurrent_decodes;
        let proxy = self.proxy.clone();
        self.runtime.spawn(async move {
            if let Some(batch) = loader::load_batch(sources, generation, max_in_flight, token).await
            {
                let _ = proxy.send_event(ViewerEvent::CarouselTextures(batch));
            }
        });
    }

    fn unmount_carousel(&mut self) {
        let Some(host) = self.carousel.as_mut() else {
            return;
        };
        host.mount.unmount();
        host.state = None;
        if let Some(gpu) = self.gpu.as_mut() {
            gpu.carousel.clear_textures();
        }
    }

    /// Mounts on first visibility; unmounts on hide when configured to.
    fn sync_carousel_mount(&mut self) {
        let Some(host) = self.carousel.as_ref() else {
            return;
        };
        let visible = self
            .controller
            .layer(host.section)
            .is_some_and(|layer| layer.visible);
        let mounted = host.mount.is_mounted();
        if visible && !mounted {
            self.mount_carousel();
        } else if !visible && mounted && self.cfg.carousel.unmount_when_hidden {
            self.unmount_carousel();
        }
    }

    fn log_section_event(&self, event: Option<SectionEvent>) {
        if let Some(event) = event {
            debug!(?event, "section event");
        }
    }

    fn publish_status(&self) {
        let status = self.controller.status();
        self.status.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }

    fn handle_command(&mut self, command: ViewerCommand) {
        let now = Instant::now();
        let event = match command {
            ViewerCommand::GoToSection(index) => self.controller.navigate_to(index, now),
            ViewerCommand::Step(intent) => self.controller.on_intent(intent, now),
        };
        self.log_section_event(event);
        self.after_mutation();
    }

    fn feed_gesture(&mut self, sample: InputSample) {
        let now = Instant::now();
        let event = self.controller.advance(now);
        self.log_section_event(event);
        let suppressed = self.controller.is_animating();
        if let Some(intent) = self.gestures.feed(sample, suppressed) {
            let event = self.controller.on_intent(intent, now);
            self.log_section_event(event);
        }
        self.after_mutation();
    }

    fn after_mutation(&mut self) {
        self.sync_carousel_mount();
        self.publish_status();
        self.request_redraw();
    }

    /// Routes the cursor to the carousel while its section is on screen.
    fn update_pointer(&mut self) {
        let Some(gpu) = self.gpu.as_ref() else {
            return;
        };
        let Some(host) = self.carousel.as_mut() else {
            return;
        };
        let Some(state) = host.state.as_mut() else {
            return;
        };
        let active = self.controller.current_index() == Some(host.section);
        let world = self.cursor.filter(|_| active).map(|px| {
            pixel_to_world(
                px,
                gpu.config.width,
                gpu.config.height,
                self.cfg.carousel.view_height,
            )
        });
        state.pointer_at(world);
    }

    fn tick(&mut self, now: Instant) {
        if !self.started {
            self.started = true;
            let event = self.controller.start(now);
            self.log_section_event(event);
        }
        let event = self.controller.advance(now);
        self.log_section_event(event);

        if let Some(target) = self.pending_start {
            if !self.controller.is_animating() {
                self.pending_start = None;
                let event = self.controller.navigate_to(target as i64, now);
                self.log_section_event(event);
            }
        }

        self.sync_carousel_mount();
        if let Some(host) = self.carousel.as_mut() {
            if let Some(state) = host.state.as_mut() {
                let delta = host
                    .last_tick
                    .map_or(0.0, |last| frame_delta(now.duration_since(last)));
                host.last_tick = Some(now);
                state.update(delta);
            }
        }
        self.publish_status();
    }

    fn draw(&mut self, event_loop: &ActiveEventLoop) {
        let now = Instant::now();
        self.tick(now);

        let Some(gpu) = self.gpu.as_ref() else {
            return;
        };
        let Some(window) = self.window.clone() else {
            return;
        };

        let frame = match gpu.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(SurfaceError::Outdated) | Err(SurfaceError::Lost) => {
                info!("viewer surface lost; reconfiguring");
                self.handle_resize(window.inner_size());
                return;
            }
            Err(SurfaceError::OutOfMemory) => {
                error!("viewer surface out of memory; exiting event loop");
                event_loop.exit();
                return;
            }
            Err(SurfaceError::Timeout) => {
                warn!("viewer surface acquisition timed out");
                return;
            }
            Err(SurfaceError::Other) => {
                warn!("viewer surface reported an unknown error; retrying");
                self.handle_resize(window.inner_size());
                return;
            }
        };

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("viewer-encoder"),
            });

        let mut carousel_live = false;
        if let Some(host) = self.carousel.as_ref() {
            let visible = self
                .controller
                .layer(host.section)
                .is_some_and(|layer| layer.visible);
            if let (true, Some(state)) = (visible, host.state.as_ref()) {
                gpu.carousel.render(
                    &gpu.queue,
                    &mut encoder,
                    state,
                    self.cfg.background_color.rgb_f32(),
                );
                carousel_live = true;
            }
        }

        let frames = self.controller.frame(now);
        gpu.compositor.render(
            &gpu.queue,
            &mut encoder,
            &view,
            &frames,
            [gpu.config.width, gpu.config.height],
            SECTION_BACKDROP,
        );

        gpu.queue.submit(std::iter::once(encoder.finish()));
        window.pre_present_notify();
        frame.present();

        // A mounted carousel keeps simulating while its section is hidden.
        let carousel_mounted = self
            .carousel
            .as_ref()
            .is_some_and(|host| host.mount.is_mounted());
        self.pending_redraw = carousel_live
            || carousel_mounted
            || self.controller.is_animating()
            || !self.started;
    }

    fn request_redraw(&mut self) {
        self.pending_redraw = true;
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, event: KeyEvent) {
        if event.state != ElementState::Pressed || event.repeat {
            return;
        }
        let PhysicalKey::Code(code) = event.physical_key else {
            return;
        };
        if code == KeyCode::Escape {
            info!("escape pressed; exiting viewer");
            event_loop.exit();
            return;
        }
        if let Some(command) = key_command(code) {
            debug!(?command, "keyboard command");
            self.handle_command(command);
        }
    }
}

impl ApplicationHandler<ViewerEvent> for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.cancel.is_cancelled() {
            event_loop.exit();
            return;
        }

        let Some(window) = self.ensure_window(event_loop) else {
            event_loop.exit();
            return;
        };

        if self.gpu.is_none() {
            if let Err(err) = self.init_gpu(window) {
                error!(error = ?err, "failed to initialize GPU state");
                event_loop.exit();
                return;
            }
        }

        self.request_redraw();
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let Some(window) = self.window.as_ref() else {
            return;
        };
        if window.id() != window_id {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("viewer window close requested");
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                self.handle_resize(new_size);
            }
            WindowEvent::ScaleFactorChanged {
                mut inner_size_writer,
                ..
            } => {
                let size = window.inner_size();
                let _ = inner_size_writer.request_inner_size(size);
                self.handle_resize(size);
            }
            WindowEvent::RedrawRequested => {
                self.draw(event_loop);
            }
            WindowEvent::KeyboardInput { event, .. } => {
                self.handle_key(event_loop, event);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let delta_y = wheel_delta_px(delta, self.cfg.gesture.wheel_line_px);
                self.feed_gesture(InputSample::Wheel { delta_y });
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => match state {
                ElementState::Pressed => {
                    self.pressed = true;
                    if let Some([_, y]) = self.cursor {
                        self.feed_gesture(InputSample::DragStart { y });
                    }
                }
                ElementState::Released => {
                    self.pressed = false;
                    self.feed_gesture(InputSample::DragEnd);
                }
            },
            WindowEvent::CursorMoved { position, .. } => {
                let px = [position.x as f32, position.y as f32];
                self.cursor = Some(px);
                if self.pressed {
                    self.feed_gesture(InputSample::DragMove { y: px[1] });
                }
                self.update_pointer();
            }
            WindowEvent::CursorLeft { .. } => {
                self.cursor = None;
                self.update_pointer();
            }
            WindowEvent::Touch(touch) => {
                let y = touch.location.y as f32;
                let sample = match touch.phase {
                    TouchPhase::Started => InputSample::DragStart { y },
                    TouchPhase::Moved => InputSample::DragMove { y },
                    TouchPhase::Ended | TouchPhase::Cancelled => InputSample::DragEnd,
                };
                self.feed_gesture(sample);
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if self.pending_redraw {
            if let Some(window) = self.window.as_ref() {
                window.request_redraw();
            }
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: ViewerEvent) {
        match event {
            ViewerEvent::Cancelled => {
                info!("viewer received cancellation event");
                event_loop.exit();
            }
            ViewerEvent::SectionTextures(batch) => self.apply_section_textures(batch),
            ViewerEvent::CarouselTextures(batch) => self.apply_carousel_textures(batch),
            ViewerEvent::Command(command) => self.handle_command(command),
        }
    }
}

fn device_descriptor(limits: wgpu::Limits) -> wgpu::DeviceDescriptor<'static> {
    wgpu::DeviceDescriptor {
        label: Some("viewer-device"),
        required_features: wgpu::Features::empty(),
        required_limits: limits,
        memory_hints: wgpu::MemoryHints::default(),
        experimental_features: wgpu::ExperimentalFeatures::disabled(),
        trace: wgpu::Trace::default(),
    }
}

fn section_sources(cfg: &Configuration) -> Vec<PathBuf> {
    let mut sources = Vec::new();
    for section in &cfg.sections {
        if section.kind == SectionKind::Carousel {
            continue;
        }
        for path in [&section.background, &section.clip_overlay].into_iter().flatten() {
            let resolved = cfg.resolve_asset(path);
            if !sources.contains(&resolved) {
                sources.push(resolved);
            }
        }
    }
    sources
}

/// Runs the viewer on the calling (main) thread until the window closes or
/// `cancel` fires. Must be called from within a Tokio runtime.
pub fn run_windowed(
    cfg: Configuration,
    options: ViewerOptions,
    cancel: CancellationToken,
    mut control: CommandReceiver,
    status: StatusSender,
) -> Result<()> {
    let runtime = Handle::current();
    let event_loop = EventLoop::<ViewerEvent>::with_user_event()
        .build()
        .context("failed to build viewer event loop")?;
    let proxy = event_loop.create_proxy();

    let cancel_task = {
        let cancel = cancel.clone();
        let proxy = proxy.clone();
        runtime.spawn(async move {
            cancel.cancelled().await;
            let _ = proxy.send_event(ViewerEvent::Cancelled);
        })
    };

    let control_task = {
        let cancel = cancel.clone();
        let proxy = proxy.clone();
        runtime.spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    command = control.recv() => match command {
                        Some(command) => {
                            if proxy.send_event(ViewerEvent::Command(command)).is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                }
            }
        })
    };

    let section_task = {
        let sources = section_sources(&cfg);
        let max_in_flight = cfg.loader_max_concurrent_decodes;
        let cancel = cancel.child_token();
        let proxy = proxy.clone();
        runtime.spawn(async move {
            if let Some(batch) =
                loader::load_batch(sources, SECTION_BATCH, max_in_flight, cancel).await
            {
                let _ = proxy.send_event(ViewerEvent::SectionTextures(batch));
            }
        })
    };

    let mut app = ViewerApp::new(cfg, options, cancel, runtime, proxy, status);
    let run_result = event_loop.run_app(&mut app);
    app.unmount_carousel();
    cancel_task.abort();
    control_task.abort();
    section_task.abort();

    run_result.context("viewer event loop failed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_request_uses_adapter_limits_without_extras() {
        let limits = wgpu::Limits::downlevel_defaults();
        let desc = device_descriptor(limits.clone());
        assert_eq!(desc.label, Some("viewer-device"));
        assert!(desc.required_features.is_empty());
        assert_eq!(desc.required_limits, limits);
    }

    #[test]
    fn section_sources_skip_carousel_and_dedupe() {
        let yaml = r#"
asset-root: /assets
sections:
  - kind: image
    background: a.webp
    clip-overlay: b.webp
  - kind: carousel
  - kind: image
    background: a.webp
"#;
        let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
        let sources = section_sources(&cfg);
        assert_eq!(
            sources,
            vec![PathBuf::from("/assets/a.webp"), PathBuf::from("/assets/b.webp")]
        );
    }
}
