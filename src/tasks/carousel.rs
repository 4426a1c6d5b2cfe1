//! Simulation state of the shaded carousel: scrolling panel strip, per-panel
//! ripples and the floating particle field.
//!
//! [`CarouselState::update`] is the only writer of per-frame values; the GPU
//! renderer reads a snapshot afterwards.

use std::f32::consts::TAU;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::config::CarouselConfig;
use crate::processing::ripple::ripple_active;

/// Start time used before any pointer interaction; far enough in the past to be inactive.
pub const IDLE_RIPPLE_START: f32 = -100.0;

/// Longest step fed to [`CarouselState::update`] from wall-clock time.
pub const MAX_FRAME_DELTA: f32 = 0.1;

/// Simulation step for a frame that follows `elapsed` of wall time.
///
/// Stalls (occluded window, debugger, suspended process) advance the
/// simulation by at most [`MAX_FRAME_DELTA`].
pub fn frame_delta(elapsed: Duration) -> f32 {
    elapsed.as_secs_f32().min(MAX_FRAME_DELTA)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ripple {
    /// Image-space origin (v downward) in `[0, 1]^2`.
    pub origin_uv: [f32; 2],
    pub start_time: f32,
}

impl Default for Ripple {
    fn default() -> Self {
        Self {
            origin_uv: [-1.0, -1.0],
            start_time: IDLE_RIPPLE_START,
        }
    }
}

impl Ripple {
    pub fn elapsed(&self, now: f32) -> f32 {
        now - self.start_time
    }

    pub fn is_active(&self, now: f32, lifetime: f32) -> bool {
        ripple_active(self.elapsed(now), lifetime)
    }
}

/// One textured plane in the strip. The strip holds every texture twice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Panel {
    pub texture: usize,
    pub aspect_ratio: f32,
    pub ripple: Ripple,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub position: [f32; 3],
    pub size: f32,
    pub speed: f32,
    pub phase: f32,
}

/// What a pointer sample did to the panel under it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerOutcome {
    Entered(usize),
    Moved(usize),
    Outside,
}

#[derive(Debug)]
pub struct CarouselState {
    cfg: CarouselConfig,
    clock: f32,
    strip_offset: f32,
    texture_count: usize,
    panels: Vec<Panel>,
    particles: Vec<Particle>,
    hovered: Option<usize>,
    rng: StdRng,
}

impl CarouselState {
    /// Creates the particle field; the strip stays empty until textures arrive.
    pub fn new(cfg: CarouselConfig, seed: Option<u64>) -> Self {
        let mut rng = match seed.or(cfg.particles.seed) {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let p = &cfg.particles;
        let particles = (0..p.count)
            .map(|_| Particle {
                position: [
                    (rng.random::<f32>() - 0.5) * p.spread[0],
                    (rng.random::<f32>() - 0.5) * p.spread[1],
                    (rng.random::<f32>() - 0.5) * p.spread[2],
                ],
                size: p.size[0] + rng.random::<f32>() * (p.size[1] - p.size[0]),
                speed: p.speed[0] + rng.random::<f32>() * (p.speed[1] - p.speed[0]),
                phase: rng.random::<f32>() * TAU,
            })
            .collect();

        Self {
            cfg,
            clock: 0.0,
            strip_offset: 0.0,
            texture_count: 0,
            panels: Vec::new(),
            particles,
            hovered: None,
            rng,
        }
    }

    /// Rebuilds the strip from loaded texture aspect ratios, concatenated twice.
    pub fn set_textures(&mut self, aspect_ratios: &[f32]) {
        self.texture_count = aspect_ratios.len();
        self.panels = aspect_ratios
            .iter()
            .chain(aspect_ratios.iter())
            .enumerate()
            .map(|(slot, aspect)| Panel {
                texture: slot % aspect_ratios.len().max(1),
                aspect_ratio: if aspect.is_finite() && *aspect > 0.0 {
                    *aspect
                } else {
                    16.0 / 9.0
                },
                ripple: Ripple::default(),
            })
            .collect();
        self.hovered = None;
        debug!(
            textures = self.texture_count,
            panels = self.panels.len(),
            "carousel strip rebuilt"
        );
    }

    pub fn config(&self) -> &CarouselConfig {
        &self.cfg
    }

    pub fn clock(&self) -> f32 {
        self.clock
    }

    pub fn strip_offset(&self) -> f32 {
        self.strip_offset
    }

    pub fn panels(&self) -> &[Panel] {
        &self.panels
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn texture_count(&self) -> usize {
        self.texture_count
    }

    fn pitch(&self) -> f32 {
        self.cfg.panel_width + self.cfg.spacing
    }

    /// Distance scrolled before the strip wraps: one copy of the texture list.
    pub fn loop_width(&self) -> f32 {
        self.pitch() * self.texture_count as f32
    }

    /// Total extent of the doubled strip.
    pub fn strip_length(&self) -> f32 {
        2.0 * self.loop_width()
    }

    /// World-space centre of a panel slot.
    pub fn panel_center(&self, slot: usize) -> [f32; 2] {
        [self.strip_offset + slot as f32 * self.pitch(), 0.0]
    }

    /// World-space width and height of a panel slot.
    pub fn panel_size(&self, slot: usize) -> [f32; 2] {
        let width = self.cfg.panel_width;
        let aspect = self.panels.get(slot).map_or(16.0 / 9.0, |p| p.aspect_ratio);
        [width, width / aspect]
    }

    /// One frame of simulation: clock, particles, strip scroll.
    pub fn update(&mut self, delta: f32) {
        self.clock += delta.max(0.0);
        let clock = self.clock;

        let p = &self.cfg.particles;
        for particle in &mut self.particles {
            particle.position[1] += delta * particle.speed;
            particle.position[0] += (clock + particle.phase).sin() * delta * p.drift;
            if particle.position[1] > p.bound {
                particle.position[1] = -p.bound;
                particle.position[0] = (self.rng.random::<f32>() - 0.5) * p.spread[0];
            }
        }

        if self.panels.is_empty() {
            return;
        }
        self.strip_offset -= delta * self.cfg.scroll_speed;
        let loop_width = self.loop_width();
        if self.strip_offset < -loop_width {
            // Each wrap lands `spacing - overshoot`, i.e. moves by one period.
            let period = loop_width + self.cfg.spacing;
            let wraps = ((-loop_width - self.strip_offset) / period).ceil();
            self.strip_offset += wraps * period;
            trace!(offset = self.strip_offset, wraps, "carousel strip wrapped");
        }
    }

    /// Resolves the panel slot under a world-space point and its image-space UV.
    pub fn hit_test(&self, world: [f32; 2]) -> Option<(usize, [f32; 2])> {
        (0..self.panels.len()).find_map(|slot| {
            let [cx, cy] = self.panel_center(slot);
            let [w, h] = self.panel_size(slot);
            let u = (world[0] - (cx - w / 2.0)) / w;
            let v = ((cy + h / 2.0) - world[1]) / h;
            ((0.0..=1.0).contains(&u) && (0.0..=1.0).contains(&v)).then_some((slot, [u, v]))
        })
    }

    /// Fresh hover: restarts the ripple at `uv`.
    pub fn pointer_enter(&mut self, slot: usize, uv: [f32; 2]) {
        let now = self.clock;
        if let Some(panel) = self.panels.get_mut(slot) {
            panel.ripple = Ripple {
                origin_uv: uv,
                start_time: now,
            };
            self.hovered = Some(slot);
            debug!(slot, u = uv[0], v = uv[1], "ripple started");
        }
    }

    /// Motion over the hovered panel moves the origin without restarting the fade.
    pub fn pointer_move(&mut self, slot: usize, uv: [f32; 2]) {
        if let Some(panel) = self.panels.get_mut(slot) {
            panel.ripple.origin_uv = uv;
        }
    }

    /// Routes a pointer position (or `None` when it left the surface) to enter/move.
    pub fn pointer_at(&mut self, world: Option<[f32; 2]>) -> PointerOutcome {
        match world.and_then(|w| self.hit_test(w)) {
            Some((slot, uv)) if self.hovered == Some(slot) => {
                self.pointer_move(slot, uv);
                PointerOutcome::Moved(slot)
            }
            Some((slot, uv)) => {
                self.pointer_enter(slot, uv);
                PointerOutcome::Entered(slot)
            }
            None => {
                // Ripples are left to fade on their own.
                self.hovered = None;
                PointerOutcome::Outside
            }
        }
    }

    pub fn active_ripples(&self) -> usize {
        let lifetime = self.cfg.ripple.lifetime;
        self.panels
            .iter()
            .filter(|p| p.ripple.is_active(self.clock, lifetime))
            .count()
    }
}

/// Tracks whether the carousel is mounted and which texture batch it expects.
///
/// Every mount and unmount bumps the generation, so a batch started by an
/// earlier mount can never be applied to a later one.
#[derive(Debug, Default)]
pub struct MountState {
    generation: u64,
    cancel: Option<CancellationToken>,
}

impl MountState {
    /// Starts a new mount under `parent`; returns the batch generation and its token.
    pub fn mount(&mut self, parent: &CancellationToken) -> (u64, CancellationToken) {
        self.unmount();
        self.generation += 1;
        let token = parent.child_token();
        self.cancel = Some(token.clone());
        info!(generation = self.generation, "carousel mounted");
        (self.generation, token)
    }

    /// Cancels any in-flight load; idempotent.
    pub fn unmount(&mut self) {
        if let Some(token) = self.cancel.take() {
            token.cancel();
            self.generation += 1;
            info!(generation = self.generation, "carousel unmounted");
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.cancel.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether a batch tagged `generation` belongs to the current mount.
    pub fn accepts(&self, generation: u64) -> bool {
        self.is_mounted() && generation == self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_batches_are_rejected() {
        let root = CancellationToken::new();
        let mut mount = MountState::default();
        let (first, token) = mount.mount(&root);
        assert!(mount.accepts(first));

        mount.unmount();
        assert!(token.is_cancelled());
        assert!(!mount.accepts(first));

        let (second, _) = mount.mount(&root);
        assert_ne!(first, second);
        assert!(!mount.accepts(first));
        assert!(mount.accepts(second));
    }

    #[test]
    fn unmount_without_mount_is_noop() {
        let mut mount = MountState::default();
        mount.unmount();
        assert_eq!(mount.generation(), 0);
        assert!(!mount.is_mounted());
    }

    fn state(textures: usize) -> CarouselState {
        let mut s = CarouselState::new(CarouselConfig::default(), Some(7));
        s.set_textures(&vec![1.5; textures]);
        s
    }

    #[test]
    fn strip_concatenates_textures_twice() {
        let s = state(3);
        let textures: Vec<usize> = s.panels().iter().map(|p| p.texture).collect();
        assert_eq!(textures, vec![0, 1, 2, 0, 1, 2]);
        assert!((s.strip_length() - 2.0 * 4.4 * 3.0).abs() < 1e-5);
    }

    #[test]
    fn empty_strip_does_not_scroll() {
        let mut s = state(0);
        s.update(1.0);
        assert_eq!(s.strip_offset(), 0.0);
        assert!(s.panels().is_empty());
        assert_eq!(s.particles().len(), 25);
    }

    #[test]
    fn hit_test_reports_image_space_uv() {
        let s = state(2);
        // slot 1 centred at x = 4.4, height 4 / 1.5
        let (slot, uv) = s.hit_test([4.4 - 1.0, 0.5]).unwrap();
        assert_eq!(slot, 1);
        assert!((uv[0] - 0.25).abs() < 1e-5);
        let h = 4.0 / 1.5;
        assert!((uv[1] - (h / 2.0 - 0.5) / h).abs() < 1e-5);
        // gap between panels
        assert!(s.hit_test([2.2, 0.0]).is_none());
    }
}
