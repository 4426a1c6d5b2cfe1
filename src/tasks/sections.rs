//! Section transition controller.
//!
//! Owns which full-viewport section is active and serializes every animation
//! (section transitions and the section-0 overlay reveal) so that at most one is
//! in flight. All mutation goes through the controller methods; callers pass the
//! current `Instant` so completion is evaluated lazily against the clock.

use std::time::Instant;

use tracing::{debug, info};

use crate::animation::{Tween, lerp};
use crate::config::{RevealConfig, TransitionConfig};
use crate::events::{SectionStatus, StepIntent};

/// Four-point mask in percent of the viewport (x right, y down).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipPolygon(pub [[f32; 2]; 4]);

impl ClipPolygon {
    /// Whole viewport visible.
    pub const FULL: Self = Self([[0.0, 0.0], [100.0, 0.0], [100.0, 100.0], [0.0, 100.0]]);
    /// Horizontal sliver along the vertical centre line; incoming sections start here.
    pub const SLIVER: Self = Self([[0.0, 50.0], [100.0, 50.0], [100.0, 50.0], [0.0, 50.0]]);
    /// Resting shape of the section-0 overlay before it is revealed.
    pub const OVERLAY_COLLAPSED: Self =
        Self([[0.0, 0.0], [100.0, 0.0], [100.0, 30.0], [40.0, 0.0]]);

    pub fn lerp(&self, to: &Self, t: f32) -> Self {
        let mut out = self.0;
        for (dst, (a, b)) in out.iter_mut().zip(self.0.iter().zip(to.0.iter())) {
            dst[0] = lerp(a[0], b[0], t);
            dst[1] = lerp(a[1], b[1], t);
        }
        Self(out)
    }

    /// Nonzero-winding containment test, in percent.
    ///
    /// The quad is split into the fan `(p0, p1, p2)` and `(p0, p2, p3)`; folded
    /// shapes such as [`Self::OVERLAY_COLLAPSED`] cancel out where the two
    /// triangles overlap with opposite orientation.
    pub fn contains(&self, point: [f32; 2]) -> bool {
        let [p0, p1, p2, p3] = self.0;
        triangle_winding(p0, p1, p2, point) + triangle_winding(p0, p2, p3, point) != 0
    }

    /// Vertices scaled into `[0, 1]`, packed as two vec4s for uniform upload.
    pub fn to_uniform(&self) -> [[f32; 4]; 2] {
        let p = self.0;
        [
            [p[0][0] / 100.0, p[0][1] / 100.0, p[1][0] / 100.0, p[1][1] / 100.0],
            [p[2][0] / 100.0, p[2][1] / 100.0, p[3][0] / 100.0, p[3][1] / 100.0],
        ]
    }
}

fn cross(o: [f32; 2], a: [f32; 2], b: [f32; 2]) -> f32 {
    (a[0] - o[0]) * (b[1] - o[1]) - (a[1] - o[1]) * (b[0] - o[0])
}

/// Orientation sign of the triangle if it covers `q`, zero otherwise.
fn triangle_winding(a: [f32; 2], b: [f32; 2], c: [f32; 2], q: [f32; 2]) -> i32 {
    let area = cross(a, b, c);
    if area.abs() < 1e-6 {
        return 0;
    }
    let sign = area.signum();
    let inside = cross(a, b, q) * sign >= -1e-4
        && cross(b, c, q) * sign >= -1e-4
        && cross(c, a, q) * sign >= -1e-4;
    if inside { sign as i32 } else { 0 }
}

/// Settled per-section presentation state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectionLayer {
    pub visible: bool,
    pub z_order: i32,
    /// Background layer vertical offset in percent of its height.
    pub background_offset: f32,
    pub clip: ClipPolygon,
    pub overlay_clip: ClipPolygon,
}

impl Default for SectionLayer {
    fn default() -> Self {
        Self {
            visible: false,
            z_order: 0,
            background_offset: 0.0,
            clip: ClipPolygon::FULL,
            overlay_clip: ClipPolygon::OVERLAY_COLLAPSED,
        }
    }
}

/// A visible section sampled at a point in time, ready to draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerFrame {
    pub index: usize,
    pub z_order: i32,
    pub background_offset: f32,
    pub clip: ClipPolygon,
    pub overlay_clip: ClipPolygon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionEvent {
    TransitionStarted {
        from: Option<usize>,
        to: usize,
        direction: i32,
    },
    TransitionFinished {
        from: Option<usize>,
        to: usize,
    },
    RevealStarted {
        expand: bool,
    },
    RevealFinished {
        expand: bool,
    },
}

#[derive(Debug, Clone, Copy)]
enum Track {
    BackgroundOffset { section: usize, from: f32, to: f32 },
    Clip { section: usize, from: ClipPolygon, to: ClipPolygon },
    OverlayClip { section: usize, from: ClipPolygon, to: ClipPolygon },
}

#[derive(Debug, Clone, Copy)]
enum AnimationKind {
    Transition { from: Option<usize>, to: usize },
    Reveal { expand: bool },
}

#[derive(Debug, Clone)]
struct Animation {
    kind: AnimationKind,
    tween: Tween,
    tracks: Vec<Track>,
}

#[derive(Debug)]
pub struct SectionController {
    layers: Vec<SectionLayer>,
    current: Option<usize>,
    sub_phase: u8,
    animation: Option<Animation>,
    transition: TransitionConfig,
    reveal: RevealConfig,
}

impl SectionController {
    /// Creates a controller for `count` sections with nothing shown yet.
    pub fn new(count: usize, transition: TransitionConfig, reveal: RevealConfig) -> Self {
        Self {
            layers: vec![SectionLayer::default(); count.max(1)],
            current: None,
            sub_phase: 0,
            animation: None,
            transition,
            reveal,
        }
    }

    /// Forced initial `go_to(0, +1)`.
    pub fn start(&mut self, now: Instant) -> Option<SectionEvent> {
        self.go_to(0, 1, now)
    }

    pub fn section_count(&self) -> usize {
        self.layers.len()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn sub_phase(&self) -> u8 {
        self.sub_phase
    }

    /// Whether an animation was in flight at the last call that observed the clock.
    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    pub fn status(&self) -> SectionStatus {
        SectionStatus {
            index: self.current,
            animating: self.is_animating(),
            sub_phase: self.sub_phase,
        }
    }

    pub fn layer(&self, index: usize) -> Option<&SectionLayer> {
        self.layers.get(index)
    }

    /// Completes the in-flight animation once its duration has elapsed.
    pub fn advance(&mut self, now: Instant) -> Option<SectionEvent> {
        if !self
            .animation
            .as_ref()
            .is_some_and(|anim| anim.tween.is_complete(now))
        {
            return None;
        }
        let anim = self.animation.take()?;
        match anim.kind {
            AnimationKind::Transition { from, to } => {
                if let Some(layer) = from.and_then(|idx| self.layers.get_mut(idx)) {
                    layer.visible = false;
                    layer.z_order = 0;
                }
                info!(from = ?from, to, "section transition finished");
                Some(SectionEvent::TransitionFinished { from, to })
            }
            AnimationKind::Reveal { expand } => {
                debug!(expand, "section reveal finished");
                Some(SectionEvent::RevealFinished { expand })
            }
        }
    }

    /// Starts a transition to `index` (normalized modulo the section count).
    ///
    /// No-op while animating or when the normalized target is already current.
    pub fn go_to(&mut self, index: i64, direction: i32, now: Instant) -> Option<SectionEvent> {
        self.advance(now);
        let count = self.layers.len() as i64;
        let target = index.rem_euclid(count) as usize;
        if self.is_animating() || self.current == Some(target) {
            debug!(target, animating = self.is_animating(), "go_to ignored");
            return None;
        }

        let d = if direction == -1 { -1.0 } else { 1.0 };
        let parallax = self.transition.parallax_percent;
        let mut tracks = Vec::with_capacity(3);

        if let Some(outgoing) = self.current {
            let layer = &mut self.layers[outgoing];
            layer.z_order = 0;
            let to = -parallax * d;
            tracks.push(Track::BackgroundOffset {
                section: outgoing,
                from: layer.background_offset,
                to,
            });
            layer.background_offset = to;
        }

        let incoming = &mut self.layers[target];
        incoming.visible = true;
        incoming.z_order = 1;
        incoming.clip = ClipPolygon::FULL;
        incoming.background_offset = 0.0;
        tracks.push(Track::Clip {
            section: target,
            from: ClipPolygon::SLIVER,
            to: ClipPolygon::FULL,
        });
        tracks.push(Track::BackgroundOffset {
            section: target,
            from: parallax * d,
            to: 0.0,
        });

        let from = self.current.replace(target);
        self.animation = Some(Animation {
            kind: AnimationKind::Transition { from, to: target },
            tween: Tween::new(now, self.transition.duration, self.transition.ease),
            tracks,
        });
        info!(from = ?from, to = target, direction, "section transition started");
        Some(SectionEvent::TransitionStarted {
            from,
            to: target,
            direction,
        })
    }

    /// Navigation-style jump: the direction follows the sign of the move.
    pub fn navigate_to(&mut self, index: i64, now: Instant) -> Option<SectionEvent> {
        self.advance(now);
        let current = self.current.map_or(-1, |c| c as i64);
        if self.is_animating() || index == current {
            return None;
        }
        let direction = if index > current { 1 } else { -1 };
        self.go_to(index, direction, now)
    }

    /// Applies a discrete step gesture.
    pub fn on_intent(&mut self, intent: StepIntent, now: Instant) -> Option<SectionEvent> {
        self.advance(now);
        if self.is_animating() {
            debug!(?intent, "intent dropped while animating");
            return None;
        }
        let last = self.layers.len() - 1;
        match (intent, self.current) {
            (_, None) => self.go_to(0, intent.direction(), now),
            (StepIntent::Forward, Some(0)) => {
                if self.sub_phase == 0 {
                    self.sub_phase = 1;
                    Some(self.start_reveal(true, now))
                } else {
                    self.sub_phase = 0;
                    self.go_to(1, 1, now)
                }
            }
            (StepIntent::Forward, Some(idx)) if idx < last => self.go_to(idx as i64 + 1, 1, now),
            (StepIntent::Forward, Some(_)) => None,
            (StepIntent::Backward, Some(0)) => {
                if self.sub_phase == 1 {
                    self.sub_phase = 0;
                    Some(self.start_reveal(false, now))
                } else {
                    None
                }
            }
            (StepIntent::Backward, Some(idx)) => self.go_to(idx as i64 - 1, -1, now),
        }
    }

    fn start_reveal(&mut self, expand: bool, now: Instant) -> SectionEvent {
        let target = if expand {
            ClipPolygon::FULL
        } else {
            ClipPolygon::OVERLAY_COLLAPSED
        };
        let layer = &mut self.layers[0];
        let from = layer.overlay_clip;
        layer.overlay_clip = target;
        self.animation = Some(Animation {
            kind: AnimationKind::Reveal { expand },
            tween: Tween::new(now, self.reveal.duration, self.reveal.ease),
            tracks: vec![Track::OverlayClip {
                section: 0,
                from,
                to: target,
            }],
        });
        debug!(expand, "section reveal started");
        SectionEvent::RevealStarted { expand }
    }

    /// Visible sections sampled at `now`, ordered back to front.
    pub fn frame(&self, now: Instant) -> Vec<LayerFrame> {
        let mut frames: Vec<LayerFrame> = self
            .layers
            .iter()
            .enumerate()
            .filter(|(_, layer)| layer.visible)
            .map(|(index, layer)| LayerFrame {
                index,
                z_order: layer.z_order,
                background_offset: layer.background_offset,
                clip: layer.clip,
                overlay_clip: layer.overlay_clip,
            })
            .collect();

        if let Some(anim) = &self.animation {
            let t = anim.tween.progress(now);
            for track in &anim.tracks {
                match *track {
                    Track::BackgroundOffset { section, from, to } => {
                        if let Some(f) = frames.iter_mut().find(|f| f.index == section) {
                            f.background_offset = lerp(from, to, t);
                        }
                    }
                    Track::Clip { section, from, to } => {
                        if let Some(f) = frames.iter_mut().find(|f| f.index == section) {
                            f.clip = from.lerp(&to, t);
                        }
                    }
                    Track::OverlayClip { section, from, to } => {
                        if let Some(f) = frames.iter_mut().find(|f| f.index == section) {
                            f.overlay_clip = from.lerp(&to, t);
                        }
                    }
                }
            }
        }

        frames.sort_by_key(|f| f.z_order);
        frames
    }
}
